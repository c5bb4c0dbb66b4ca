pub mod comment_store; // Comment persistence and ordered lookups
pub mod like_ledger; // Like rows and denormalized counters
pub mod subject_registry; // Posts and events threads attach to
pub mod thread_service; // Entry point for handlers and in-process clients
pub mod tree_assembly; // Nested thread assembly per viewer

pub use comment_store::CommentStore;
pub use like_ledger::LikeLedger;
pub use subject_registry::SubjectRegistry;
pub use thread_service::ThreadService;
pub use tree_assembly::{build_tree, ThreadAssembler};
