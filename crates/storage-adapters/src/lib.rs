//! # storage-adapters
//!
//! `IssueStore` and `MediaStore` implementations.
//!
//! - [`memory::MemoryIssueStore`]: always compiled; tests and `STORAGE=memory` runs.
//! - [`postgres::PgIssueStore`]: feature `db-postgres`.
//! - [`media_local::LocalMediaStore`]: feature `media-local`.

pub mod memory;

#[cfg(feature = "db-postgres")]
pub mod postgres;

#[cfg(feature = "media-local")]
pub mod media_local;

pub use memory::MemoryIssueStore;

#[cfg(feature = "db-postgres")]
pub use postgres::PgIssueStore;

#[cfg(feature = "media-local")]
pub use media_local::LocalMediaStore;
