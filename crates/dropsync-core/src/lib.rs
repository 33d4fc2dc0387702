//! dropsync Core - Domain logic and business rules
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `SourceItem`, `DestinationObjectMeta`, `ProvenanceMetadata`
//! - **Key mapping** - `key_for` and the normalized `KeyPrefix`
//! - **Port definitions** - Traits for adapters: `ISourceLister`, `IDestinationStore`
//! - **Configuration** - Layered YAML / `.env` / environment configuration
//!
//! # Architecture
//!
//! This crate follows the hexagonal (ports & adapters) architecture pattern.
//! The domain module contains pure business logic with no I/O.
//! Ports define trait interfaces that adapter crates implement
//! (`dropsync-dropbox` for the source, `dropsync-s3` for the destination).
//! The reconciliation pass itself lives in `dropsync-sync`.

pub mod config;
pub mod domain;
pub mod ports;
