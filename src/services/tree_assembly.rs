// Tree Assembly - builds the nested thread a viewer sees for one subject.
// All rows are read in one transaction, then nested in memory.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

use crate::{
    error::{AppError, AppResult},
    infrastructure::{ThreadDatabase, ViewerContext},
    models::{Comment, CommentId, CommentNode, SubjectId},
    services::{comment_store::CommentStore, like_ledger::LikeLedger},
};

pub struct ThreadAssembler {
    db: Arc<ThreadDatabase>,
    max_depth: i32,
    timeout: Duration,
}

impl ThreadAssembler {
    pub fn new(db: Arc<ThreadDatabase>, max_depth: i32, timeout: Duration) -> Self {
        Self {
            db,
            max_depth,
            timeout,
        }
    }

    /// The full thread of a subject, or an error. Never a partial tree.
    #[instrument(skip(self, vc), fields(request_id = %vc.request_id))]
    pub async fn assemble(
        &self,
        vc: &ViewerContext,
        subject_id: SubjectId,
    ) -> AppResult<Vec<CommentNode>> {
        let started = Instant::now();
        let tree = tokio::time::timeout(self.timeout, self.load(vc, subject_id))
            .await
            .map_err(|_| {
                AppError::TimeoutError(format!(
                    "Thread for subject {} not assembled within {:?}",
                    subject_id, self.timeout
                ))
            })??;

        debug!(
            "Assembled {} roots for subject {} in {:?}",
            tree.len(),
            subject_id,
            started.elapsed()
        );
        Ok(tree)
    }

    async fn load(&self, vc: &ViewerContext, subject_id: SubjectId) -> AppResult<Vec<CommentNode>> {
        let mut tx = self.db.pool.begin().await?;

        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM subjects WHERE id = ?")
            .bind(subject_id.0)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(AppError::NotFound(format!("Subject {} not found", subject_id)));
        }

        let comments = CommentStore::find_by_subject_with(&mut *tx, subject_id).await?;
        let liked = match vc.viewer_id() {
            Some(viewer_id) => {
                LikeLedger::liked_comments_with(&mut *tx, viewer_id, subject_id).await?
            }
            None => HashSet::new(),
        };

        tx.commit().await?;
        Ok(build_tree(comments, &liked, self.max_depth))
    }
}

/// Nest a flat list of comments.
///
/// Roots come out newest first, replies oldest first at every level. Replies
/// deeper than `max_depth` and replies whose parent is not in the list are
/// dropped. Runs without recursion so thread depth never touches the call
/// stack.
pub fn build_tree(
    comments: Vec<Comment>,
    liked: &HashSet<CommentId>,
    max_depth: i32,
) -> Vec<CommentNode> {
    let known: HashSet<CommentId> = comments.iter().map(|c| c.id).collect();
    let mut roots = Vec::new();
    let mut children: HashMap<CommentId, Vec<Comment>> = HashMap::new();

    for comment in comments {
        match comment.parent_id {
            None => roots.push(comment),
            Some(parent_id) if known.contains(&parent_id) && parent_id != comment.id => {
                children.entry(parent_id).or_default().push(comment)
            }
            Some(parent_id) => warn!("Dropping comment {} with missing parent {}", comment.id, parent_id),
        }
    }

    roots.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    for replies in children.values_mut() {
        replies.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    }

    struct Frame {
        node: CommentNode,
        pending: std::vec::IntoIter<Comment>,
        level: i32,
    }

    let mut forest = Vec::with_capacity(roots.len());
    for root in roots {
        let pending = children.remove(&root.id).unwrap_or_default().into_iter();
        let liked_root = liked.contains(&root.id);
        let mut stack = vec![Frame {
            node: CommentNode::leaf(root, liked_root),
            pending,
            level: 0,
        }];

        while let Some(frame) = stack.last_mut() {
            match frame.pending.next() {
                Some(child) => {
                    let level = frame.level + 1;
                    let grandchildren = children.remove(&child.id).unwrap_or_default();
                    if level > max_depth {
                        let mut cut = grandchildren;
                        let mut dropped = 1;
                        while let Some(below) = cut.pop() {
                            dropped += 1;
                            cut.extend(children.remove(&below.id).unwrap_or_default());
                        }
                        warn!(
                            "Dropping {} comments under {} below max depth {}",
                            dropped, child.id, max_depth
                        );
                        continue;
                    }
                    let is_liked = liked.contains(&child.id);
                    stack.push(Frame {
                        node: CommentNode::leaf(child, is_liked),
                        pending: grandchildren.into_iter(),
                        level,
                    });
                }
                None => {
                    let Some(done) = stack.pop() else { break };
                    match stack.last_mut() {
                        Some(parent) => parent.node.replies.push(done.node),
                        None => forest.push(done.node),
                    }
                }
            }
        }
    }

    if !children.is_empty() {
        // Only reachable through a parent cycle, which the store never writes
        let stranded: usize = children.values().map(Vec::len).sum();
        warn!("Dropping {} comments not reachable from any root", stranded);
    }

    forest
}
