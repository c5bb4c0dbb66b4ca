pub mod identity;
pub mod viewer;

pub use identity::{IdentityProvider, TrustedHeaderIdentity};
pub use viewer::{Viewer, ViewerContext};
