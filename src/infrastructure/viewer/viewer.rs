use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::models::ViewerId;

/// Identity of the actor making a request, as resolved by the identity
/// provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewer {
    pub id: ViewerId,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

impl Viewer {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: ViewerId(id.into()),
            display_name: display_name.into(),
            avatar_url: None,
        }
    }
}

/// Request-scoped context passed explicitly into every service call.
#[derive(Debug, Clone)]
pub struct ViewerContext {
    pub viewer: Option<Viewer>,
    pub request_id: String,
}

impl ViewerContext {
    pub fn authenticated(viewer: Viewer, request_id: String) -> Self {
        Self {
            viewer: Some(viewer),
            request_id,
        }
    }

    pub fn anonymous(request_id: String) -> Self {
        Self {
            viewer: None,
            request_id,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.viewer.is_some()
    }

    pub fn viewer_id(&self) -> Option<&ViewerId> {
        self.viewer.as_ref().map(|v| &v.id)
    }

    /// Guests may read threads but every write needs an identified viewer.
    pub fn require_viewer(&self) -> AppResult<&Viewer> {
        self.viewer
            .as_ref()
            .ok_or_else(|| AppError::Unauthorized("Sign in to comment or like".to_string()))
    }
}
