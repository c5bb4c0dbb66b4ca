// Identity provider boundary. Authentication itself happens upstream; this
// crate only turns request metadata into a Viewer.

use async_trait::async_trait;
use axum::http::HeaderMap;

use super::viewer::Viewer;
use crate::error::{AppError, AppResult};

pub const VIEWER_ID_HEADER: &str = "x-viewer-id";
pub const VIEWER_NAME_HEADER: &str = "x-viewer-name";
pub const VIEWER_AVATAR_HEADER: &str = "x-viewer-avatar";

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// `Ok(None)` for a guest. Errors mean the provider itself failed.
    async fn resolve(&self, headers: &HeaderMap) -> AppResult<Option<Viewer>>;
}

/// Reads the identity an authenticating gateway stamped onto the request.
#[derive(Debug, Clone, Default)]
pub struct TrustedHeaderIdentity;

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> AppResult<Option<&'a str>> {
    match headers.get(name) {
        Some(value) => {
            let value = value
                .to_str()
                .map_err(|_| AppError::Validation(format!("Header {} is not valid text", name)))?
                .trim();
            Ok((!value.is_empty()).then_some(value))
        }
        None => Ok(None),
    }
}

#[async_trait]
impl IdentityProvider for TrustedHeaderIdentity {
    async fn resolve(&self, headers: &HeaderMap) -> AppResult<Option<Viewer>> {
        let Some(id) = header_str(headers, VIEWER_ID_HEADER)? else {
            return Ok(None);
        };
        let display_name = header_str(headers, VIEWER_NAME_HEADER)?.unwrap_or(id);
        let mut viewer = Viewer::new(id, display_name);
        viewer.avatar_url = header_str(headers, VIEWER_AVATAR_HEADER)?.map(str::to_string);
        Ok(Some(viewer))
    }
}
