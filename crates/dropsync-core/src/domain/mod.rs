//! Domain entities and business logic
//!
//! This module contains the core domain types for dropsync:
//! - Newtypes for the normalized source root and destination key prefix
//! - Source items and destination object metadata
//! - The key mapper turning source-relative paths into destination keys
//! - Domain-specific error types

pub mod errors;
pub mod item;
pub mod key;
pub mod newtypes;

// Re-export commonly used types
pub use errors::DomainError;
pub use item::{
    DestinationObjectMeta, ProvenanceMetadata, SourceItem, UploadDecision, DEFAULT_ORIGIN,
};
pub use key::key_for;
pub use newtypes::{KeyPrefix, SourceRoot};
