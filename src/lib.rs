// Event Threads - threaded comments and likes for posts and events

// Domain types
pub mod models;

// Database, caching, ids and viewer context
pub mod infrastructure;

// Like ledger, comment store, tree assembly
pub mod services;

// HTTP surface
pub mod app_state;
pub mod thread_interface;

// Optimistic client state and transports
pub mod client;

// Common utilities
pub mod config;
pub mod error;
pub mod validation;

// Re-exports for convenience
pub use error::{AppError, AppResult};
