pub mod cache; // LRU cache wrapper
pub mod database; // SQLite pool and schema
pub mod id_generator; // Time-ordered comment ids
pub mod middleware; // Viewer context resolution for HTTP requests
pub mod viewer; // Viewer context and identity provider

pub use cache::Cache;
pub use database::ThreadDatabase;
pub use id_generator::IdGenerator;
pub use viewer::{IdentityProvider, TrustedHeaderIdentity, Viewer, ViewerContext};
