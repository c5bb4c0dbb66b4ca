// Optimistic like state kept by a thread client between server round trips

use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::{
    error::AppResult,
    models::{CommentId, LikeState},
};

/// Last state the server confirmed, plus the toggles still awaiting an answer.
///
/// Toggles are numbered per comment. `confirmed_seq` is the newest toggle
/// whose answer has been adopted; answers to older toggles arrive stale and
/// are dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    confirmed: LikeState,
    confirmed_seq: u64,
    next_seq: u64,
    pending: Vec<u64>,
}

impl Entry {
    fn new(confirmed: LikeState) -> Self {
        Self {
            confirmed,
            confirmed_seq: 0,
            next_seq: 1,
            pending: Vec::new(),
        }
    }

    // Every toggle flips, so only the parity of toggles newer than the
    // confirmed answer matters
    fn displayed(&self) -> LikeState {
        let unanswered = self
            .pending
            .iter()
            .filter(|&&seq| seq > self.confirmed_seq)
            .count();
        if unanswered % 2 == 1 {
            self.confirmed.flipped()
        } else {
            self.confirmed
        }
    }
}

/// Proof that a toggle was applied locally. Settle it exactly once.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "an unsettled ticket leaves the like pending forever"]
pub struct LikeTicket {
    comment_id: CommentId,
    seq: u64,
}

impl LikeTicket {
    pub fn comment_id(&self) -> CommentId {
        self.comment_id
    }
}

#[derive(Debug, Default)]
pub struct OptimisticLikes {
    entries: HashMap<CommentId, Entry>,
}

impl OptimisticLikes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record server state from a fetched tree. Ignored while a toggle for
    /// the same comment is pending.
    pub fn seed(&mut self, comment_id: CommentId, state: LikeState) {
        let entry = self
            .entries
            .entry(comment_id)
            .or_insert_with(|| Entry::new(state));
        if entry.pending.is_empty() {
            entry.confirmed = state;
        }
    }

    /// Forget comments that left the tree. Entries with a toggle in flight
    /// are kept until it settles.
    pub fn retain(&mut self, live: &HashSet<CommentId>) {
        let before = self.entries.len();
        self.entries
            .retain(|id, entry| !entry.pending.is_empty() || live.contains(id));
        if self.entries.len() < before {
            debug!("Pruned {} stale like entries", before - self.entries.len());
        }
    }

    pub fn state(&self, comment_id: CommentId) -> Option<LikeState> {
        self.entries.get(&comment_id).map(Entry::displayed)
    }

    pub fn in_flight(&self, comment_id: CommentId) -> usize {
        self.entries.get(&comment_id).map_or(0, |e| e.pending.len())
    }

    /// Flip the displayed state right away. `None` for comments never seeded.
    pub fn begin(&mut self, comment_id: CommentId) -> Option<LikeTicket> {
        let entry = self.entries.get_mut(&comment_id)?;
        let seq = entry.next_seq;
        entry.next_seq += 1;
        entry.pending.push(seq);
        debug!(
            "Optimistic toggle #{} on {} ({} in flight)",
            seq,
            comment_id,
            entry.pending.len()
        );
        Some(LikeTicket { comment_id, seq })
    }

    /// Apply the server's answer to one toggle and return what to display.
    ///
    /// A success becomes the new baseline unless a newer toggle has already
    /// been answered. A failure only drops this ticket's flip, so other
    /// pending toggles keep their effect.
    pub fn settle(&mut self, ticket: LikeTicket, result: &AppResult<LikeState>) -> LikeState {
        let entry = self
            .entries
            .entry(ticket.comment_id)
            .or_insert_with(|| Entry::new(LikeState::new(false, 0)));
        entry.pending.retain(|&seq| seq != ticket.seq);
        match result {
            Ok(server) if ticket.seq > entry.confirmed_seq => {
                entry.confirmed = *server;
                entry.confirmed_seq = ticket.seq;
            }
            Ok(_) => debug!(
                "Ignoring stale answer #{} on {} (have #{})",
                ticket.seq, ticket.comment_id, entry.confirmed_seq
            ),
            Err(e) => debug!("Rolling back toggle on {}: {}", ticket.comment_id, e),
        }
        entry.displayed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    fn seeded(liked: bool, count: i64) -> OptimisticLikes {
        let mut likes = OptimisticLikes::new();
        likes.seed(CommentId(1), LikeState::new(liked, count));
        likes
    }

    #[test]
    fn test_begin_flips_immediately() {
        let mut likes = seeded(false, 3);
        let _ticket = likes.begin(CommentId(1)).unwrap();
        assert_eq!(likes.state(CommentId(1)), Some(LikeState::new(true, 4)));
        assert_eq!(likes.in_flight(CommentId(1)), 1);
    }

    #[test]
    fn test_unknown_comment_has_no_ticket() {
        let mut likes = OptimisticLikes::new();
        assert!(likes.begin(CommentId(9)).is_none());
    }

    #[test]
    fn test_success_adopts_server_state() {
        let mut likes = seeded(false, 3);
        let ticket = likes.begin(CommentId(1)).unwrap();
        // Someone else liked it meanwhile
        let shown = likes.settle(ticket, &Ok(LikeState::new(true, 5)));
        assert_eq!(shown, LikeState::new(true, 5));
        assert_eq!(likes.in_flight(CommentId(1)), 0);
    }

    #[test]
    fn test_failure_rolls_back() {
        let mut likes = seeded(true, 1);
        let ticket = likes.begin(CommentId(1)).unwrap();
        assert_eq!(likes.state(CommentId(1)), Some(LikeState::new(false, 0)));

        let shown = likes.settle(ticket, &Err(AppError::Upstream("offline".into())));
        assert_eq!(shown, LikeState::new(true, 1));
    }

    #[test]
    fn test_failure_of_first_of_two_rapid_toggles() {
        let mut likes = seeded(false, 5);
        let first = likes.begin(CommentId(1)).unwrap();
        let second = likes.begin(CommentId(1)).unwrap();
        assert_eq!(likes.state(CommentId(1)), Some(LikeState::new(false, 5)));

        // First never reached the server, so the second one liked
        likes.settle(first, &Err(AppError::Upstream("offline".into())));
        assert_eq!(likes.state(CommentId(1)), Some(LikeState::new(true, 6)));

        let shown = likes.settle(second, &Ok(LikeState::new(true, 6)));
        assert_eq!(shown, LikeState::new(true, 6));
    }

    #[test]
    fn test_seed_does_not_clobber_pending_toggle() {
        let mut likes = seeded(false, 0);
        let ticket = likes.begin(CommentId(1)).unwrap();
        likes.seed(CommentId(1), LikeState::new(false, 0));
        assert_eq!(likes.state(CommentId(1)), Some(LikeState::new(true, 1)));
        let _ = likes.settle(ticket, &Ok(LikeState::new(true, 1)));
    }

    #[test]
    fn test_out_of_order_answers_keep_newest() {
        let mut likes = seeded(false, 5);
        let like = likes.begin(CommentId(1)).unwrap();
        let unlike = likes.begin(CommentId(1)).unwrap();

        // The server applied both in order but the like's answer arrives last
        let shown = likes.settle(unlike, &Ok(LikeState::new(false, 5)));
        assert_eq!(shown, LikeState::new(false, 5));
        let shown = likes.settle(like, &Ok(LikeState::new(true, 6)));
        assert_eq!(shown, LikeState::new(false, 5));
        assert_eq!(likes.state(CommentId(1)), Some(LikeState::new(false, 5)));
        assert_eq!(likes.in_flight(CommentId(1)), 0);
    }

    #[test]
    fn test_newer_answer_while_older_still_pending() {
        let mut likes = seeded(false, 5);
        let like = likes.begin(CommentId(1)).unwrap();
        let unlike = likes.begin(CommentId(1)).unwrap();
        let relike = likes.begin(CommentId(1)).unwrap();
        assert_eq!(likes.state(CommentId(1)), Some(LikeState::new(true, 6)));

        let shown = likes.settle(unlike, &Ok(LikeState::new(false, 5)));
        // The third toggle is still unanswered
        assert_eq!(shown, LikeState::new(true, 6));

        let _ = likes.settle(like, &Err(AppError::Upstream("offline".into())));
        let shown = likes.settle(relike, &Ok(LikeState::new(true, 6)));
        assert_eq!(shown, LikeState::new(true, 6));
    }

    #[test]
    fn test_retain_prunes_only_settled_entries() {
        let mut likes = seeded(false, 0);
        likes.seed(CommentId(2), LikeState::new(true, 2));
        likes.seed(CommentId(3), LikeState::new(false, 1));
        let ticket = likes.begin(CommentId(2)).unwrap();

        likes.retain(&HashSet::from([CommentId(1)]));
        assert!(likes.state(CommentId(1)).is_some());
        assert_eq!(likes.state(CommentId(2)), Some(LikeState::new(false, 1)));
        assert!(likes.state(CommentId(3)).is_none());

        let _ = likes.settle(ticket, &Ok(LikeState::new(false, 1)));
        likes.retain(&HashSet::from([CommentId(1)]));
        assert!(likes.state(CommentId(2)).is_none());
    }
}
