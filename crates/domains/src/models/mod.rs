//! # Domain Models
//!
//! These structs represent the core entities of civic-bot.
//! Identities are the storage-assigned `i64` keys; transport identities
//! (chat ids, user ids) are `i64` too and are named `external_id` where
//! the two could be confused.

mod action;
mod actor;
mod event;
mod issue;
mod outbound;

pub use action::*;
pub use actor::*;
pub use event::*;
pub use issue::*;
pub use outbound::*;
