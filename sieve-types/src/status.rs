//! Status codes returned by the core's public operations.

use std::fmt;

/// Outcome of a public operation (`parse`, `load`, `execute`, `unload`, ...).
///
/// `Done` is not an error: it is the "suppress this response" sentinel used
/// by vacation's `autorespond` phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StatusCode {
    Ok,
    Done,
    ScriptReloaded,
    Fail,
    NotFinalized,
    ParseError,
    RunError,
    InternalError,
    NoMem,
}

impl StatusCode {
    /// Whether this code represents a successful (or deliberately
    /// suppressed) outcome.
    #[must_use]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok | Self::Done | Self::ScriptReloaded)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Ok => "ok",
            Self::Done => "done",
            Self::ScriptReloaded => "script reloaded",
            Self::Fail => "fail",
            Self::NotFinalized => "not finalized",
            Self::ParseError => "parse error",
            Self::RunError => "run error",
            Self::InternalError => "internal error",
            Self::NoMem => "no memory",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_variants() {
        assert!(StatusCode::Ok.is_ok());
        assert!(StatusCode::Done.is_ok());
        assert!(StatusCode::ScriptReloaded.is_ok());
        assert!(!StatusCode::RunError.is_ok());
        assert!(!StatusCode::InternalError.is_ok());
    }

    #[test]
    fn display_is_lowercase() {
        assert_eq!(StatusCode::InternalError.to_string(), "internal error");
    }
}
