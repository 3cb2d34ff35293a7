//! The [`Action`] tagged union produced by evaluation and consumed by the
//! dispatcher, one entry per delivery effect queued while a script ran.

use std::fmt;

/// Which kind of [`Action`] this is, without its payload. Exposed
/// separately because the dispatcher records `lastaction` by kind for
/// error formatting, and payloads are not `Copy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ActionKind {
    Reject,
    EReject,
    FileInto,
    Snooze,
    Keep,
    Redirect,
    Discard,
    Vacation,
    SetFlag,
    AddFlag,
    RemoveFlag,
    Mark,
    Unmark,
    Notify,
    Denotify,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Reject => "reject",
            Self::EReject => "ereject",
            Self::FileInto => "fileinto",
            Self::Snooze => "snooze",
            Self::Keep => "keep",
            Self::Redirect => "redirect",
            Self::Discard => "discard",
            Self::Vacation => "vacation",
            Self::SetFlag => "setflag",
            Self::AddFlag => "addflag",
            Self::RemoveFlag => "removeflag",
            Self::Mark => "mark",
            Self::Unmark => "unmark",
            Self::Notify => "notify",
            Self::Denotify => "denotify",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FileIntoAction {
    pub mailbox: String,
    pub flags: Vec<String>,
    pub copy: bool,
    pub create: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RedirectAction {
    pub address: String,
    pub copy: bool,
    pub list_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RejectAction {
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VacationAction {
    pub reason: String,
    pub subject: Option<String>,
    pub from: Option<String>,
    pub handle: Option<String>,
    pub days: u32,
    pub addresses: Vec<String>,
    pub mime: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FlagAction {
    pub flags: Vec<String>,
    pub variable: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NotifyAction {
    pub method: String,
    pub from: Option<String>,
    pub options: Vec<String>,
    pub priority: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DenotifyAction {
    pub method: Option<String>,
    pub priority: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SnoozeAction {
    pub mailbox: Option<String>,
    pub flags: Vec<String>,
    pub addflags: bool,
    pub tzid: Option<String>,
    pub times: Vec<String>,
    pub days: Option<u8>,
}

/// One queued delivery effect, together with the `cancel_keep` bit the
/// dispatcher ANDs into its implicit-keep state.
///
/// Payload-carrying variants use a dedicated struct rather than inline
/// fields so the dispatcher's exhaustive `match` stays readable and so
/// each payload can be constructed independently by the compiler.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Action {
    Reject(RejectAction),
    EReject(RejectAction),
    FileInto(FileIntoAction),
    Snooze(SnoozeAction),
    Keep(FlagAction),
    Redirect(RedirectAction),
    Discard,
    Vacation(VacationAction),
    SetFlag(FlagAction),
    AddFlag(FlagAction),
    RemoveFlag(FlagAction),
    Mark,
    Unmark,
    Notify(NotifyAction),
    Denotify(DenotifyAction),
}

impl Action {
    /// The kind tag for this action, used by the dispatcher to record
    /// `lastaction` and by tests that only care about the shape produced.
    #[must_use]
    pub const fn kind(&self) -> ActionKind {
        match self {
            Self::Reject(_) => ActionKind::Reject,
            Self::EReject(_) => ActionKind::EReject,
            Self::FileInto(_) => ActionKind::FileInto,
            Self::Snooze(_) => ActionKind::Snooze,
            Self::Keep(_) => ActionKind::Keep,
            Self::Redirect(_) => ActionKind::Redirect,
            Self::Discard => ActionKind::Discard,
            Self::Vacation(_) => ActionKind::Vacation,
            Self::SetFlag(_) => ActionKind::SetFlag,
            Self::AddFlag(_) => ActionKind::AddFlag,
            Self::RemoveFlag(_) => ActionKind::RemoveFlag,
            Self::Mark => ActionKind::Mark,
            Self::Unmark => ActionKind::Unmark,
            Self::Notify(_) => ActionKind::Notify,
            Self::Denotify(_) => ActionKind::Denotify,
        }
    }

    /// Whether executing this action, on success, suppresses implicit
    /// keep (§3: reject, redirect, fileinto, discard, snooze, vacation,
    /// explicit keep all cancel it; flag-only and notify actions do not).
    #[must_use]
    pub const fn cancel_keep(&self) -> bool {
        matches!(
            self,
            Self::Reject(_)
                | Self::EReject(_)
                | Self::FileInto(_)
                | Self::Snooze(_)
                | Self::Keep(_)
                | Self::Redirect(_)
                | Self::Discard
                | Self::Vacation(_)
        )
    }
}
