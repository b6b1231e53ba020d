// Social API - accounts, follow graph, posts, likes, comments and notifications

// Core types and primitives
pub mod core;

// Storage, credentials, media hosting and request plumbing
pub mod infrastructure;

// Entity records and wire views
pub mod models;

// Business logic
pub mod services;

// HTTP surface
pub mod api;

// Common utilities
pub mod app_state;
pub mod config;
pub mod error;

// Re-exports for convenience
pub use app_state::AppState;
pub use config::Config;
pub use error::{AppError, AppResult};
