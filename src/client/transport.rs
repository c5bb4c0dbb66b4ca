// Transports a ThreadView talks through: HTTP for remote servers, direct
// service calls for embedding and tests.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::{
    error::{AppError, AppResult},
    infrastructure::{
        viewer::identity::{VIEWER_AVATAR_HEADER, VIEWER_ID_HEADER, VIEWER_NAME_HEADER},
        Viewer, ViewerContext,
    },
    models::{CommentId, CommentNode, LikeState, LikeableKind, SubjectId},
    services::ThreadService,
    thread_interface::ContentRequest,
};

#[async_trait]
pub trait ThreadTransport: Send + Sync {
    async fn fetch_tree(&self, subject_id: SubjectId) -> AppResult<Vec<CommentNode>>;

    async fn submit_comment(&self, subject_id: SubjectId, content: &str) -> AppResult<CommentNode>;

    async fn submit_reply(
        &self,
        subject_id: SubjectId,
        parent_id: CommentId,
        content: &str,
    ) -> AppResult<CommentNode>;

    async fn toggle_like(&self, entity_id: i64, kind: LikeableKind) -> AppResult<LikeState>;
}

/// Talks to a running server over its JSON API.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
    viewer: Option<Viewer>,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            viewer: None,
        }
    }

    /// Send identity headers as an authenticating gateway would.
    pub fn with_viewer(mut self, viewer: Viewer) -> Self {
        self.viewer = Some(viewer);
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1/{}", self.base_url, path)
    }

    fn identify(&self, mut req: RequestBuilder) -> RequestBuilder {
        if let Some(viewer) = &self.viewer {
            req = req
                .header(VIEWER_ID_HEADER, viewer.id.0.as_str())
                .header(VIEWER_NAME_HEADER, viewer.display_name.as_str());
            if let Some(avatar) = &viewer.avatar_url {
                req = req.header(VIEWER_AVATAR_HEADER, avatar.as_str());
            }
        }
        req
    }
}

async fn handle_json_res<T: DeserializeOwned>(req: RequestBuilder) -> AppResult<T> {
    let res = req
        .send()
        .await
        .map_err(|e| AppError::Upstream(format!("Request failed: {}", e)))?;
    let status = res.status();
    let text = res
        .text()
        .await
        .map_err(|e| AppError::Upstream(format!("Reading response failed: {}", e)))?;

    if status.is_success() {
        serde_json::from_str(&text)
            .map_err(|e| AppError::Internal(format!("Json error on {}: {}", text, e)))
    } else {
        debug!("Server answered {}: {}", status, text);
        let message = serde_json::from_str::<Value>(&text)
            .ok()
            .and_then(|body| body.get("error")?.as_str().map(str::to_string))
            .unwrap_or(text);
        Err(AppError::from_status(status.as_u16(), message))
    }
}

#[async_trait]
impl ThreadTransport for HttpTransport {
    async fn fetch_tree(&self, subject_id: SubjectId) -> AppResult<Vec<CommentNode>> {
        let url = self.url(&format!("subjects/{}/comments", subject_id));
        handle_json_res(self.identify(self.client.get(url))).await
    }

    async fn submit_comment(&self, subject_id: SubjectId, content: &str) -> AppResult<CommentNode> {
        let url = self.url(&format!("subjects/{}/comments", subject_id));
        let body = ContentRequest {
            content: content.to_string(),
        };
        handle_json_res(self.identify(self.client.post(url)).json(&body)).await
    }

    async fn submit_reply(
        &self,
        subject_id: SubjectId,
        parent_id: CommentId,
        content: &str,
    ) -> AppResult<CommentNode> {
        let url = self.url(&format!(
            "subjects/{}/comments/{}/replies",
            subject_id, parent_id
        ));
        let body = ContentRequest {
            content: content.to_string(),
        };
        handle_json_res(self.identify(self.client.post(url)).json(&body)).await
    }

    async fn toggle_like(&self, entity_id: i64, kind: LikeableKind) -> AppResult<LikeState> {
        let url = self.url(&format!("likes/{}/{}", kind, entity_id));
        handle_json_res(self.identify(self.client.post(url))).await
    }
}

/// Calls the service directly with a fixed viewer context.
#[derive(Clone)]
pub struct ServiceTransport {
    service: ThreadService,
    vc: Arc<ViewerContext>,
}

impl ServiceTransport {
    pub fn new(service: ThreadService, vc: Arc<ViewerContext>) -> Self {
        Self { service, vc }
    }
}

#[async_trait]
impl ThreadTransport for ServiceTransport {
    async fn fetch_tree(&self, subject_id: SubjectId) -> AppResult<Vec<CommentNode>> {
        self.service.fetch_tree(&self.vc, subject_id).await
    }

    async fn submit_comment(&self, subject_id: SubjectId, content: &str) -> AppResult<CommentNode> {
        self.service.submit_comment(&self.vc, subject_id, content).await
    }

    async fn submit_reply(
        &self,
        subject_id: SubjectId,
        parent_id: CommentId,
        content: &str,
    ) -> AppResult<CommentNode> {
        self.service
            .submit_reply(&self.vc, subject_id, parent_id, content)
            .await
    }

    async fn toggle_like(&self, entity_id: i64, kind: LikeableKind) -> AppResult<LikeState> {
        self.service.toggle_like(&self.vc, entity_id, kind).await
    }
}
