// ViewerContext Middleware
// Resolves the viewer once per request and injects the context into request extensions

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::{
    error::AppError,
    infrastructure::viewer::{IdentityProvider, ViewerContext},
};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Trait for application state that carries an identity provider
pub trait HasIdentityProvider {
    fn identity_provider(&self) -> &Arc<dyn IdentityProvider>;
}

pub async fn viewer_context_middleware<T>(
    State(app_state): State<T>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError>
where
    T: HasIdentityProvider + Clone + Send + Sync + 'static,
{
    let request_id = request_id_from_headers(request.headers());

    let viewer = app_state
        .identity_provider()
        .resolve(request.headers())
        .await
        .map_err(|e| match e {
            AppError::Validation(_) => e,
            other => AppError::Upstream(format!("Identity provider failed: {}", other)),
        })?;

    let viewer_context = match viewer {
        Some(viewer) => {
            debug!(request_id = %request_id, viewer = %viewer.id, "authenticated request");
            ViewerContext::authenticated(viewer, request_id)
        }
        None => ViewerContext::anonymous(request_id),
    };

    request.extensions_mut().insert(Arc::new(viewer_context));
    Ok(next.run(request).await)
}

/// Reuse the caller's request id when it sent one, otherwise mint one.
fn request_id_from_headers(headers: &HeaderMap) -> String {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("req-{}", Uuid::new_v4()))
}
