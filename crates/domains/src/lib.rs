//! civic-bot/crates/domains/src/lib.rs
//!
//! The central domain model and interface definitions for civic-bot.
//! Nothing in here performs I/O; adapters implement the ports.

pub mod catalog;
pub mod errors;
pub mod models;
pub mod ports;

// Re-exporting for easier access in other crates
pub use errors::*;
pub use models::*;
pub use ports::*;
