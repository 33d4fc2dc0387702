//! Port definitions (hexagonal architecture interfaces)
//!
//! The reconciler depends on these two traits only. Implementations live in
//! adapter crates (`dropsync-dropbox`, `dropsync-s3`) or in test fakes.
//!
//! ## Ports Overview
//!
//! - [`ISourceLister`] - Enumerate and download files from the source drive
//! - [`IDestinationStore`] - Inspect, write, list and delete destination objects

pub mod destination_store;
pub mod source_lister;

pub use destination_store::IDestinationStore;
pub use source_lister::{ContentStream, ISourceLister};
