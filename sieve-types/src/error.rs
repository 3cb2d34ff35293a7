//! Error type shared by both crates.

use thiserror::Error;

use crate::status::StatusCode;

/// A failure of one of the core's public operations.
///
/// Carries the [`StatusCode`] a host would have seen in the original C
/// API alongside a human-readable detail string, so the two can be
/// reported together (the dispatcher's `execute_err` callback wants both).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{code}: {detail}")]
pub struct Error {
    pub code: StatusCode,
    pub detail: String,
}

impl Error {
    #[must_use]
    pub fn new(code: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            code,
            detail: detail.into(),
        }
    }

    #[must_use]
    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::InternalError, detail)
    }

    #[must_use]
    pub fn run(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::RunError, detail)
    }

    #[must_use]
    pub fn parse(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::ParseError, detail)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_format() {
        let e = Error::internal("missing fileinto capability");
        assert_eq!(
            e.to_string(),
            "internal error: missing fileinto capability"
        );
    }
}
