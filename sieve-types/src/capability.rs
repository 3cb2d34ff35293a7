//! Sieve extensions requestable via `require "...";`, and the bitset a
//! parsed [`crate::action`]-producing script carries to record which ones
//! it used.

use std::fmt;

/// A single named Sieve capability/extension.
///
/// Closed by design (Design Note: "forbid the Unknown default" applies
/// here too — an unrecognized `require` name is rejected at parse time
/// rather than represented as a variant of this enum).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Extension {
    Fileinto = 0,
    Reject = 1,
    Ereject = 2,
    Redirect = 3,
    Discard = 4,
    Envelope = 5,
    Body = 6,
    Imap4Flags = 7,
    Vacation = 8,
    Notify = 9,
    Duplicate = 10,
    Snooze = 11,
    Copy = 12,
    Variables = 13,
    Relational = 14,
    Subaddress = 15,
    Regex = 16,
    EncodedCharacter = 17,
    Mailbox = 18,
    MailboxId = 19,
    SpecialUse = 20,
    Metadata = 21,
    Editheader = 22,
    Date = 23,
    Index = 24,
    Environment = 25,
    SpamTest = 26,
    VirusTest = 27,
    ExtLists = 28,
    Imip = 29,
    Jmapquery = 30,
}

impl Extension {
    /// The `require "..."` name for this extension, used both when
    /// validating scripts and when reporting an unsupported one.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Fileinto => "fileinto",
            Self::Reject => "reject",
            Self::Ereject => "ereject",
            Self::Redirect => "redirect" ,
            Self::Discard => "discard",
            Self::Envelope => "envelope",
            Self::Body => "body",
            Self::Imap4Flags => "imap4flags",
            Self::Vacation => "vacation",
            Self::Notify => "notify",
            Self::Duplicate => "duplicate",
            Self::Snooze => "snooze",
            Self::Copy => "copy",
            Self::Variables => "variables",
            Self::Relational => "relational",
            Self::Subaddress => "subaddress",
            Self::Regex => "regex",
            Self::EncodedCharacter => "encoded-character",
            Self::Mailbox => "mailbox",
            Self::MailboxId => "mailboxid",
            Self::SpecialUse => "special-use",
            Self::Metadata => "imap4metadata",
            Self::Editheader => "editheader",
            Self::Date => "date",
            Self::Index => "index",
            Self::Environment => "environment",
            Self::SpamTest => "spamtest",
            Self::VirusTest => "virustest",
            Self::ExtLists => "extlists",
            Self::Imip => "imip",
            Self::Jmapquery => "jmapquery",
        }
    }

    /// Look up an extension by its `require` name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        const ALL: [Extension; 31] = [
            Extension::Fileinto,
            Extension::Reject,
            Extension::Ereject,
            Extension::Redirect,
            Extension::Discard,
            Extension::Envelope,
            Extension::Body,
            Extension::Imap4Flags,
            Extension::Vacation,
            Extension::Notify,
            Extension::Duplicate,
            Extension::Snooze,
            Extension::Copy,
            Extension::Variables,
            Extension::Relational,
            Extension::Subaddress,
            Extension::Regex,
            Extension::EncodedCharacter,
            Extension::Mailbox,
            Extension::MailboxId,
            Extension::SpecialUse,
            Extension::Metadata,
            Extension::Editheader,
            Extension::Date,
            Extension::Index,
            Extension::Environment,
            Extension::SpamTest,
            Extension::VirusTest,
            Extension::ExtLists,
            Extension::Imip,
            Extension::Jmapquery,
        ];
        ALL.into_iter().find(|ext| ext.name() == name)
    }
}

impl fmt::Display for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A compact bitset of [`Extension`]s, used both by the interpreter's
/// active-extension registry and by a parsed [`crate::action`] script's
/// recorded `support` mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExtensionSet(u64);

impl ExtensionSet {
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    #[must_use]
    pub const fn contains(self, ext: Extension) -> bool {
        self.0 & (1 << ext as u64) != 0
    }

    pub fn insert(&mut self, ext: Extension) {
        self.0 |= 1 << ext as u64;
    }

    #[must_use]
    pub const fn with(mut self, ext: Extension) -> Self {
        self.0 |= 1 << ext as u64;
        self
    }

    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl FromIterator<Extension> for ExtensionSet {
    fn from_iter<I: IntoIterator<Item = Extension>>(iter: I) -> Self {
        let mut set = Self::empty();
        for ext in iter {
            set.insert(ext);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_name() {
        for ext in [
            Extension::Fileinto,
            Extension::Vacation,
            Extension::Imap4Flags,
            Extension::Jmapquery,
        ] {
            assert_eq!(Extension::from_name(ext.name()), Some(ext));
        }
    }

    #[test]
    fn unknown_name_is_none() {
        assert_eq!(Extension::from_name("nosuchthing"), None);
    }

    #[test]
    fn set_contains_only_inserted() {
        let set = ExtensionSet::empty()
            .with(Extension::Fileinto)
            .with(Extension::Imap4Flags);
        assert!(set.contains(Extension::Fileinto));
        assert!(set.contains(Extension::Imap4Flags));
        assert!(!set.contains(Extension::Vacation));
    }
}
