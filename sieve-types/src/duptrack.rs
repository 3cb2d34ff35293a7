//! Duplicate-suppression records written by a successful delivery path so
//! the host can later suppress repeats of the same logical message.

use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DuptrackEntry {
    pub id: String,
    pub seconds: u64,
}

impl DuptrackEntry {
    #[must_use]
    pub const fn new(id: String, seconds: u64) -> Self {
        Self { id, seconds }
    }

    #[must_use]
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_converts_seconds() {
        let entry = DuptrackEntry::new("msg-1".into(), 3600);
        assert_eq!(entry.window(), Duration::from_secs(3600));
    }
}
