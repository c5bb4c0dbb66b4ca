// Thread Service - the operations exposed to HTTP handlers and in-process callers.
// Validates input, checks the viewer, then delegates to the store, ledger and assembler.

use std::sync::Arc;
use tracing::{info, instrument};

use crate::{
    config::{Config, ThreadConfig},
    error::{AppError, AppResult},
    infrastructure::{IdGenerator, ThreadDatabase, ViewerContext},
    models::{
        Comment, CommentId, CommentNode, Like, LikeState, LikeableKind, Subject, SubjectId,
        SubjectKind,
    },
    services::{
        comment_store::CommentStore, like_ledger::LikeLedger, subject_registry::SubjectRegistry,
        tree_assembly::ThreadAssembler,
    },
    validation::validate_content,
};

#[derive(Clone)]
pub struct ThreadService {
    store: Arc<CommentStore>,
    ledger: Arc<LikeLedger>,
    assembler: Arc<ThreadAssembler>,
    subjects: Arc<SubjectRegistry>,
    limits: ThreadConfig,
}

impl ThreadService {
    pub fn new(db: Arc<ThreadDatabase>, config: &Config) -> Self {
        let limits = config.threads.clone();
        let ids = Arc::new(IdGenerator::new(config.server.node_id));
        Self {
            store: Arc::new(CommentStore::new(
                db.clone(),
                ids,
                config.cache.capacity,
                limits.max_depth,
            )),
            ledger: Arc::new(LikeLedger::new(db.clone())),
            assembler: Arc::new(ThreadAssembler::new(
                db.clone(),
                limits.max_depth,
                limits.tree_fetch_timeout(),
            )),
            subjects: Arc::new(SubjectRegistry::new(db)),
            limits,
        }
    }

    pub fn ledger(&self) -> &LikeLedger {
        &self.ledger
    }

    pub fn store(&self) -> &CommentStore {
        &self.store
    }

    pub async fn fetch_tree(
        &self,
        vc: &ViewerContext,
        subject_id: SubjectId,
    ) -> AppResult<Vec<CommentNode>> {
        self.assembler.assemble(vc, subject_id).await
    }

    /// Returns the new comment as a childless node so the client can prepend it.
    #[instrument(skip(self, vc, content), fields(request_id = %vc.request_id))]
    pub async fn submit_comment(
        &self,
        vc: &ViewerContext,
        subject_id: SubjectId,
        content: &str,
    ) -> AppResult<CommentNode> {
        let viewer = vc.require_viewer()?;
        validate_content(content, self.limits.max_content_length)?;

        let comment = self
            .store
            .create_comment(&viewer.id, subject_id, content)
            .await?;
        Ok(CommentNode::leaf(comment, false))
    }

    #[instrument(skip(self, vc, content), fields(request_id = %vc.request_id))]
    pub async fn submit_reply(
        &self,
        vc: &ViewerContext,
        subject_id: SubjectId,
        parent_id: CommentId,
        content: &str,
    ) -> AppResult<CommentNode> {
        let viewer = vc.require_viewer()?;
        validate_content(content, self.limits.max_content_length)?;

        let reply = self
            .store
            .create_reply(&viewer.id, subject_id, parent_id, content)
            .await?;
        Ok(CommentNode::leaf(reply, false))
    }

    #[instrument(skip(self, vc), fields(request_id = %vc.request_id))]
    pub async fn toggle_like(
        &self,
        vc: &ViewerContext,
        entity_id: i64,
        kind: LikeableKind,
    ) -> AppResult<LikeState> {
        let viewer = vc.require_viewer()?;
        self.ledger.toggle_like(&viewer.id, entity_id, kind).await
    }

    pub async fn like_state(
        &self,
        vc: &ViewerContext,
        entity_id: i64,
        kind: LikeableKind,
    ) -> AppResult<LikeState> {
        self.ledger.like_state(vc.viewer_id(), entity_id, kind).await
    }

    pub async fn recent_likes(
        &self,
        entity_id: i64,
        kind: LikeableKind,
        limit: u32,
    ) -> AppResult<Vec<Like>> {
        self.ledger.recent_likes(entity_id, kind, limit.min(100)).await
    }

    /// Direct replies of one comment, oldest first.
    pub async fn find_children(&self, parent_id: CommentId) -> AppResult<Vec<Comment>> {
        if self.store.get(parent_id).await?.is_none() {
            return Err(AppError::NotFound(format!("Comment {} not found", parent_id)));
        }
        self.store.find_children(parent_id).await
    }

    pub async fn register_subject(&self, id: SubjectId, kind: SubjectKind) -> AppResult<Subject> {
        self.subjects.register(id, kind).await
    }

    pub async fn get_subject(&self, id: SubjectId) -> AppResult<Subject> {
        self.subjects.get_enforce(id).await
    }

    pub async fn reconcile_counters(&self) -> AppResult<u64> {
        let repaired = self.ledger.reconcile_counters().await?;
        info!("Counter reconciliation finished, {} repaired", repaired);
        Ok(repaired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::Viewer;

    async fn service() -> ThreadService {
        let db = Arc::new(ThreadDatabase::new_in_memory().await.unwrap());
        let service = ThreadService::new(db, &Config::in_memory());
        service
            .register_subject(SubjectId(1), SubjectKind::Event)
            .await
            .unwrap();
        service
    }

    fn alice() -> ViewerContext {
        ViewerContext::authenticated(Viewer::new("alice", "Alice"), "req-a".to_string())
    }

    fn bob() -> ViewerContext {
        ViewerContext::authenticated(Viewer::new("bob", "Bob"), "req-b".to_string())
    }

    fn guest() -> ViewerContext {
        ViewerContext::anonymous("req-g".to_string())
    }

    #[tokio::test]
    async fn test_comment_then_reply_shows_in_tree() {
        let service = service().await;
        let root = service
            .submit_comment(&alice(), SubjectId(1), "Hello")
            .await
            .unwrap();
        assert_eq!(root.comment.likes_count, 0);
        assert!(!root.liked);
        assert!(root.replies.is_empty());

        service
            .submit_reply(&bob(), SubjectId(1), root.id(), "Hi back")
            .await
            .unwrap();

        let tree = service.fetch_tree(&alice(), SubjectId(1)).await.unwrap();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].comment.content, "Hello");
        assert_eq!(tree[0].replies.len(), 1);
        assert_eq!(tree[0].replies[0].comment.content, "Hi back");

        let subject = service.get_subject(SubjectId(1)).await.unwrap();
        assert_eq!(subject.comments_count, 2);
    }

    #[tokio::test]
    async fn test_like_reflected_per_viewer() {
        let service = service().await;
        let root = service
            .submit_comment(&alice(), SubjectId(1), "Likeable")
            .await
            .unwrap();

        let state = service
            .toggle_like(&bob(), root.id().0, LikeableKind::Comment)
            .await
            .unwrap();
        assert_eq!(state, LikeState::new(true, 1));

        let bob_tree = service.fetch_tree(&bob(), SubjectId(1)).await.unwrap();
        assert!(bob_tree[0].liked);
        assert_eq!(bob_tree[0].comment.likes_count, 1);

        let alice_tree = service.fetch_tree(&alice(), SubjectId(1)).await.unwrap();
        assert!(!alice_tree[0].liked);
        assert_eq!(alice_tree[0].comment.likes_count, 1);

        let guest_tree = service.fetch_tree(&guest(), SubjectId(1)).await.unwrap();
        assert!(!guest_tree[0].liked);
    }

    #[tokio::test]
    async fn test_guest_cannot_write() {
        let service = service().await;
        let err = service
            .submit_comment(&guest(), SubjectId(1), "Hello")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));

        let err = service
            .toggle_like(&guest(), 1, LikeableKind::Post)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_rejected_content_is_not_stored() {
        let service = service().await;
        for content in ["", "   ", "<p><br></p>"] {
            let err = service
                .submit_comment(&alice(), SubjectId(1), content)
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::Validation(_)));
        }
        let too_long = "x".repeat(Config::in_memory().threads.max_content_length + 1);
        assert!(service
            .submit_comment(&alice(), SubjectId(1), &too_long)
            .await
            .is_err());
        assert!(service
            .fetch_tree(&alice(), SubjectId(1))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_find_children_of_unknown_comment() {
        let service = service().await;
        assert!(matches!(
            service.find_children(CommentId(5)).await,
            Err(AppError::NotFound(_))
        ));
    }
}
