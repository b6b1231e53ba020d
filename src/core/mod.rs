// Core types and primitives shared across the service

pub mod inverse_associations;
pub mod strong_types;
pub mod validation;

// Re-export commonly used types
pub use inverse_associations::{AssociationType, EdgeToggle};
pub use strong_types::{current_time_millis, millis_to_datetime, EntityId};
