// ViewerContext Extractor - hands the request-scoped context to handlers

use crate::error::AppError;
use crate::infrastructure::viewer::ViewerContext;
use axum::{extract::FromRequestParts, http::request::Parts};
use std::sync::Arc;

/// Cheap-to-clone handle on the request's `ViewerContext`.
///
/// ```ignore
/// async fn handler(vc: Vc, Path(id): Path<i64>) -> AppResult<Json<Vec<CommentNode>>> {
///     service.fetch_tree(&vc, SubjectId(id)).await.map(Json)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Vc(Arc<ViewerContext>);

impl Vc {
    pub fn new(vc: Arc<ViewerContext>) -> Self {
        Self(vc)
    }

    pub fn arc(self) -> Arc<ViewerContext> {
        self.0
    }
}

// Field access goes straight through: vc.viewer, vc.request_id, vc.require_viewer()
impl std::ops::Deref for Vc {
    type Target = ViewerContext;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<S> FromRequestParts<S> for Vc
where
    S: Send + Sync,
{
    type Rejection = AppError;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let vc = parts
            .extensions
            .get::<Arc<ViewerContext>>()
            .map(|vc| Vc(vc.clone()))
            .ok_or_else(|| {
                AppError::Internal("Viewer context missing, is the middleware installed?".to_string())
            });

        async move { vc }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::viewer::Viewer;
    use axum::http::Request;

    #[tokio::test]
    async fn test_extracts_injected_context() {
        let (mut parts, _) = Request::new(()).into_parts();
        let context = ViewerContext::authenticated(Viewer::new("v1", "Vee"), "req-9".to_string());
        parts.extensions.insert(Arc::new(context));

        let vc = Vc::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(vc.request_id, "req-9");
        assert!(vc.is_authenticated());
        assert_eq!(vc.arc().viewer.as_ref().unwrap().display_name, "Vee");
    }

    #[tokio::test]
    async fn test_missing_context_is_internal_error() {
        let (mut parts, _) = Request::new(()).into_parts();
        let err = Vc::from_request_parts(&mut parts, &()).await.unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }
}
