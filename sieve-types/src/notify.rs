//! Pending notifications accumulated during evaluation and drained by the
//! dispatcher after all actions run.

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NotifyMethod(pub String);

impl NotifyMethod {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_mailto(&self) -> bool {
        self.0.eq_ignore_ascii_case("mailto")
    }
}

/// One notification queued by a `notify` action. `denotify` flips
/// `isactive` to `false` on entries matching its method/priority
/// criteria instead of removing them, so a later `notify` re-adding the
/// same logical notification still shows up in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NotifyEntry {
    pub method: NotifyMethod,
    pub from: Option<String>,
    pub options: Vec<String>,
    pub priority: Option<String>,
    pub message: String,
    pub isactive: bool,
}

impl NotifyEntry {
    #[must_use]
    pub fn new(method: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            method: NotifyMethod(method.into()),
            from: None,
            options: Vec::new(),
            priority: None,
            message: message.into(),
            isactive: true,
        }
    }

    /// Whether this entry matches a `denotify` filter. `None` filter
    /// components match any entry (RFC 5435's "denotify without
    /// arguments cancels all pending notifications").
    #[must_use]
    pub fn matches_denotify(&self, method: Option<&str>, priority: Option<&str>) -> bool {
        let method_matches =
            method.map_or(true, |m| self.method.as_str().eq_ignore_ascii_case(m));
        let priority_matches = priority.map_or(true, |p| {
            self.priority
                .as_deref()
                .map_or(false, |mine| mine.eq_ignore_ascii_case(p))
        });
        method_matches && priority_matches
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_entry_is_active() {
        let entry = NotifyEntry::new("mailto", "hello");
        assert!(entry.isactive);
        assert!(entry.method.is_mailto());
    }

    #[test]
    fn denotify_without_filter_matches_everything() {
        let entry = NotifyEntry::new("mailto", "hello");
        assert!(entry.matches_denotify(None, None));
    }

    #[test]
    fn denotify_by_method_is_case_insensitive() {
        let entry = NotifyEntry::new("Mailto", "hello");
        assert!(entry.matches_denotify(Some("mailto"), None));
        assert!(!entry.matches_denotify(Some("xmpp"), None));
    }
}
