#![deny(missing_debug_implementations)]

//! Data model for the Sieve mail-filtering core.
//!
//! This crate holds the types that are shared between a Sieve script's
//! parsed form and its evaluated effects: the [`Action`] tagged union, the
//! [`StatusCode`] the engine's public operations return, the
//! [`Extension`]/[`ExtensionSet`] capability bitset, and the error type
//! wrapping all of the above. It has no opinion on parsing, bytecode or
//! evaluation; see the `sieve` crate for those.

pub mod action;
pub mod capability;
pub mod duptrack;
pub mod error;
pub mod notify;
pub mod status;

pub use action::{Action, ActionKind};
pub use capability::{Extension, ExtensionSet};
pub use duptrack::DuptrackEntry;
pub use error::{Error, Result};
pub use notify::{NotifyEntry, NotifyMethod};
pub use status::StatusCode;
