#![deny(missing_debug_implementations)]

//! Core engine for parsing, compiling and evaluating Sieve mail-filtering
//! scripts (RFC 5228 and the extensions named in `sieve_types`).
//!
//! A script's life cycle runs through four stages, each its own module:
//! [`frontend`] turns source text into a [`frontend::Script`];
//! [`compiler`]/[`bytecode`] turn that into a portable blob; [`cache`]
//! memory-maps compiled blobs, deduplicating by inode; [`eval`] walks a
//! mapped blob against a message into an action list; [`dispatch`] drives
//! that list through the host capabilities registered on [`interp::Capabilities`].

pub mod ast;
pub mod bytecode;
pub mod cache;
pub mod compiler;
pub mod dispatch;
pub mod error;
pub mod eval;
pub mod frontend;
pub mod interp;
pub mod lexer;
pub mod notify_template;
pub mod parser;
pub mod variables;

pub use cache::{load, unload, CompiledScript};
pub use dispatch::{run as dispatch, DispatchOutcome};
pub use error::{EngineError, Result};
pub use eval::{execute, EvalOutcome};
pub use frontend::{parse, parse_only, parse_string, Script};
pub use interp::{Capabilities, CapabilitiesBuilder, MessageContext, ScriptContext};

pub use sieve_types::action::{Action, ActionKind};
pub use sieve_types::capability::{Extension, ExtensionSet};
pub use sieve_types::duptrack::DuptrackEntry;
pub use sieve_types::notify::{NotifyEntry, NotifyMethod};
pub use sieve_types::status::StatusCode;
