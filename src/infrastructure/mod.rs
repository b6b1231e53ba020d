// Infrastructure - storage, ids, credentials, media hosting and request plumbing
pub mod database;              // SQLite store and edge toggles
pub mod id_generator;          // Snowflake-style id generation
pub mod media;                 // Image hosting
pub mod middleware;            // Auth gate and viewer extractor
pub mod monitoring;            // Tracing subscriber and shutdown signal
pub mod security;              // Password hashing and session tokens
pub mod viewer;                // Viewer context

pub use database::Database;
pub use id_generator::IdGenerator;
pub use media::{ImageHost, LocalImageHost};
pub use middleware::{viewer_context_middleware, Vc};
pub use monitoring::{initialize_monitoring, shutdown_signal};
pub use security::{PasswordService, SessionIssuer, SESSION_COOKIE};
pub use viewer::ViewerContext;
