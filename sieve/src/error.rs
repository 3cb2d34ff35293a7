//! Error type for the `sieve` crate: wraps [`sieve_types::Error`] with the
//! I/O failures the bytecode cache and script frontend can hit.

use thiserror::Error;

pub use sieve_types::status::StatusCode;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Core(#[from] sieve_types::Error),

    #[error("{0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Core(e) => e.code,
            Self::Io(_) => StatusCode::Fail,
        }
    }

    #[must_use]
    pub fn internal(detail: impl Into<String>) -> Self {
        Self::Core(sieve_types::Error::internal(detail))
    }

    #[must_use]
    pub fn run(detail: impl Into<String>) -> Self {
        Self::Core(sieve_types::Error::run(detail))
    }

    #[must_use]
    pub fn parse(detail: impl Into<String>) -> Self {
        Self::Core(sieve_types::Error::parse(detail))
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
