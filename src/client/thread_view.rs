// Client-side view of one thread: the tree on screen, unsent drafts and the
// notices to surface. Like toggles are applied before the server answers.

use std::collections::{HashMap, HashSet};
use tracing::warn;

use super::{
    optimistic::{LikeTicket, OptimisticLikes},
    transport::ThreadTransport,
};
use crate::{
    error::AppResult,
    models::{comment::find_node_mut, CommentId, CommentNode, LikeState, LikeableKind, SubjectId},
    validation::is_visibly_empty,
};

/// Something the user should be told about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    LoadFailed(String),
    CommentFailed(String),
    ReplyFailed(String),
    LikeFailed(String),
}

pub struct ThreadView<T: ThreadTransport> {
    transport: T,
    subject_id: SubjectId,
    tree: Vec<CommentNode>,
    likes: OptimisticLikes,
    draft: String,
    reply_drafts: HashMap<CommentId, String>,
    notices: Vec<Notice>,
}

impl<T: ThreadTransport> ThreadView<T> {
    pub fn new(transport: T, subject_id: SubjectId) -> Self {
        Self {
            transport,
            subject_id,
            tree: Vec::new(),
            likes: OptimisticLikes::new(),
            draft: String::new(),
            reply_drafts: HashMap::new(),
            notices: Vec::new(),
        }
    }

    pub fn tree(&self) -> &[CommentNode] {
        &self.tree
    }

    pub fn like_state(&self, comment_id: CommentId) -> Option<LikeState> {
        self.likes.state(comment_id)
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    pub fn reply_draft(&self, parent_id: CommentId) -> Option<&str> {
        self.reply_drafts.get(&parent_id).map(String::as_str)
    }

    pub fn set_reply_draft(&mut self, parent_id: CommentId, text: impl Into<String>) {
        self.reply_drafts.insert(parent_id, text.into());
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// Replace the tree with the server's. The old tree stays on failure.
    pub async fn refresh(&mut self) -> bool {
        match self.transport.fetch_tree(self.subject_id).await {
            Ok(tree) => {
                self.tree = tree;
                self.seed_likes();
                true
            }
            Err(e) => {
                warn!("Loading thread {} failed: {}", self.subject_id, e);
                self.notices.push(Notice::LoadFailed(e.user_message()));
                false
            }
        }
    }

    /// Post the draft as a root comment and prepend it. The draft survives
    /// any failure.
    pub async fn submit_comment(&mut self) -> bool {
        if is_visibly_empty(&self.draft) {
            self.notices.push(Notice::CommentFailed(
                "Comment content must not be empty".to_string(),
            ));
            return false;
        }

        match self.transport.submit_comment(self.subject_id, &self.draft).await {
            Ok(node) => {
                self.likes
                    .seed(node.id(), LikeState::new(node.liked, node.comment.likes_count));
                self.tree.insert(0, node);
                self.draft.clear();
                true
            }
            Err(e) => {
                self.notices.push(Notice::CommentFailed(e.user_message()));
                false
            }
        }
    }

    /// Post a reply, then reload the whole tree so it lands in place.
    pub async fn submit_reply(&mut self, parent_id: CommentId) -> bool {
        let content = self.reply_drafts.get(&parent_id).cloned().unwrap_or_default();
        if is_visibly_empty(&content) {
            self.notices.push(Notice::ReplyFailed(
                "Reply content must not be empty".to_string(),
            ));
            return false;
        }

        match self
            .transport
            .submit_reply(self.subject_id, parent_id, &content)
            .await
        {
            Ok(_) => {
                self.reply_drafts.remove(&parent_id);
                self.refresh().await;
                true
            }
            Err(e) => {
                self.notices.push(Notice::ReplyFailed(e.user_message()));
                false
            }
        }
    }

    /// Flip the like locally. Pair with `finish_like` once the server answers.
    pub fn begin_like(&mut self, comment_id: CommentId) -> Option<LikeTicket> {
        let ticket = self.likes.begin(comment_id)?;
        self.sync_node(comment_id);
        Some(ticket)
    }

    pub fn finish_like(&mut self, ticket: LikeTicket, result: AppResult<LikeState>) {
        let comment_id = ticket.comment_id();
        self.likes.settle(ticket, &result);
        if let Err(e) = result {
            self.notices.push(Notice::LikeFailed(e.user_message()));
        }
        self.sync_node(comment_id);
    }

    pub async fn toggle_like(&mut self, comment_id: CommentId) -> bool {
        let Some(ticket) = self.begin_like(comment_id) else {
            return false;
        };
        let result = self
            .transport
            .toggle_like(comment_id.0, LikeableKind::Comment)
            .await;
        let ok = result.is_ok();
        self.finish_like(ticket, result);
        ok
    }

    fn seed_likes(&mut self) {
        let mut pending = Vec::new();
        let mut live = HashSet::new();
        let mut stack: Vec<&CommentNode> = self.tree.iter().collect();
        while let Some(node) = stack.pop() {
            self.likes
                .seed(node.id(), LikeState::new(node.liked, node.comment.likes_count));
            if self.likes.in_flight(node.id()) > 0 {
                pending.push(node.id());
            }
            live.insert(node.id());
            stack.extend(node.replies.iter());
        }
        self.likes.retain(&live);
        // Toggles still in flight keep their optimistic look after a reload
        for id in pending {
            self.sync_node(id);
        }
    }

    fn sync_node(&mut self, comment_id: CommentId) {
        let Some(state) = self.likes.state(comment_id) else {
            return;
        };
        if let Some(node) = find_node_mut(&mut self.tree, comment_id) {
            node.liked = state.liked;
            node.comment.likes_count = state.likes_count;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        app_state::AppState,
        client::transport::ServiceTransport,
        error::AppError,
        infrastructure::{Viewer, ViewerContext},
        models::SubjectKind,
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    /// Delegates to the service until told to fail.
    struct FlakyTransport {
        inner: ServiceTransport,
        offline: AtomicBool,
    }

    impl FlakyTransport {
        fn go_offline(&self) {
            self.offline.store(true, Ordering::SeqCst);
        }

        fn check(&self) -> AppResult<()> {
            if self.offline.load(Ordering::SeqCst) {
                Err(AppError::Upstream("connection reset".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl ThreadTransport for FlakyTransport {
        async fn fetch_tree(&self, subject_id: SubjectId) -> AppResult<Vec<CommentNode>> {
            self.check()?;
            self.inner.fetch_tree(subject_id).await
        }

        async fn submit_comment(
            &self,
            subject_id: SubjectId,
            content: &str,
        ) -> AppResult<CommentNode> {
            self.check()?;
            self.inner.submit_comment(subject_id, content).await
        }

        async fn submit_reply(
            &self,
            subject_id: SubjectId,
            parent_id: CommentId,
            content: &str,
        ) -> AppResult<CommentNode> {
            self.check()?;
            self.inner.submit_reply(subject_id, parent_id, content).await
        }

        async fn toggle_like(&self, entity_id: i64, kind: LikeableKind) -> AppResult<LikeState> {
            self.check()?;
            self.inner.toggle_like(entity_id, kind).await
        }
    }

    async fn view() -> ThreadView<FlakyTransport> {
        let state = AppState::in_memory().await.unwrap();
        state
            .service
            .register_subject(SubjectId(7), SubjectKind::Event)
            .await
            .unwrap();
        let vc = Arc::new(ViewerContext::authenticated(
            Viewer::new("alice", "Alice"),
            "req-view".to_string(),
        ));
        let transport = FlakyTransport {
            inner: ServiceTransport::new(state.service, vc),
            offline: AtomicBool::new(false),
        };
        ThreadView::new(transport, SubjectId(7))
    }

    #[tokio::test]
    async fn test_new_comment_is_prepended_and_draft_cleared() {
        let mut view = view().await;
        view.set_draft("first");
        assert!(view.submit_comment().await);
        view.set_draft("second");
        assert!(view.submit_comment().await);

        assert_eq!(view.draft(), "");
        assert_eq!(view.tree()[0].comment.content, "second");
        assert_eq!(view.tree()[1].comment.content, "first");

        assert!(view.refresh().await);
        assert_eq!(view.tree()[0].comment.content, "second");
    }

    #[tokio::test]
    async fn test_failed_submission_keeps_draft() {
        let mut view = view().await;
        view.set_draft("Important thought");
        view.transport.go_offline();

        assert!(!view.submit_comment().await);
        assert_eq!(view.draft(), "Important thought");
        assert!(view.tree().is_empty());
        assert!(matches!(view.notices(), [Notice::CommentFailed(_)]));
    }

    #[tokio::test]
    async fn test_blank_draft_never_leaves_client() {
        let mut view = view().await;
        view.set_draft("<p> </p>");
        assert!(!view.submit_comment().await);
        assert!(view.refresh().await);
        assert!(view.tree().is_empty());
    }

    #[tokio::test]
    async fn test_reply_refetches_tree() {
        let mut view = view().await;
        view.set_draft("root");
        assert!(view.submit_comment().await);
        let root_id = view.tree()[0].id();

        view.set_reply_draft(root_id, "child");
        assert!(view.submit_reply(root_id).await);
        assert!(view.reply_draft(root_id).is_none());
        assert_eq!(view.tree()[0].replies[0].comment.content, "child");
    }

    #[tokio::test]
    async fn test_failed_reply_keeps_reply_draft() {
        let mut view = view().await;
        view.set_draft("root");
        assert!(view.submit_comment().await);
        let root_id = view.tree()[0].id();

        view.set_reply_draft(root_id, "child");
        view.transport.go_offline();
        assert!(!view.submit_reply(root_id).await);
        assert_eq!(view.reply_draft(root_id), Some("child"));
        assert!(matches!(view.take_notices().as_slice(), [Notice::ReplyFailed(_)]));
    }

    #[tokio::test]
    async fn test_like_applies_immediately_and_confirms() {
        let mut view = view().await;
        view.set_draft("likeable");
        assert!(view.submit_comment().await);
        let id = view.tree()[0].id();

        let ticket = view.begin_like(id).unwrap();
        assert!(view.tree()[0].liked);
        assert_eq!(view.tree()[0].comment.likes_count, 1);

        let result = view.transport.toggle_like(id.0, LikeableKind::Comment).await;
        view.finish_like(ticket, result);
        assert_eq!(view.like_state(id), Some(LikeState::new(true, 1)));
        assert!(view.notices().is_empty());
    }

    #[tokio::test]
    async fn test_failed_like_rolls_back() {
        let mut view = view().await;
        view.set_draft("likeable");
        assert!(view.submit_comment().await);
        let id = view.tree()[0].id();
        view.transport.go_offline();

        assert!(!view.toggle_like(id).await);
        assert!(!view.tree()[0].liked);
        assert_eq!(view.tree()[0].comment.likes_count, 0);
        assert!(matches!(view.notices(), [Notice::LikeFailed(_)]));
    }

    #[tokio::test]
    async fn test_refresh_forgets_comments_no_longer_in_tree() {
        let mut view = view().await;
        view.set_draft("kept");
        assert!(view.submit_comment().await);
        let kept = view.tree()[0].id();
        view.likes.seed(CommentId(424242), LikeState::new(true, 3));

        assert!(view.refresh().await);
        assert_eq!(view.like_state(kept), Some(LikeState::new(false, 0)));
        assert_eq!(view.like_state(CommentId(424242)), None);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_old_tree() {
        let mut view = view().await;
        view.set_draft("still here");
        assert!(view.submit_comment().await);
        view.transport.go_offline();

        assert!(!view.refresh().await);
        assert_eq!(view.tree().len(), 1);
        assert!(matches!(view.notices(), [Notice::LoadFailed(_)]));
    }
}
