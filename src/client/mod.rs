pub mod optimistic; // Pending like toggles and rollback
pub mod thread_view; // Tree, drafts and notices for one subject
pub mod transport; // HTTP and in-process transports

pub use optimistic::{LikeTicket, OptimisticLikes};
pub use thread_view::{Notice, ThreadView};
pub use transport::{HttpTransport, ServiceTransport, ThreadTransport};
