//! Interpreter capability table (§4.6): the registry of host callbacks an
//! embedder supplies, plus the set of extensions it has turned on.
//!
//! Mirrors the teacher's preference for a typed, field-per-concern struct
//! (`ImapConfig`) generalized into a builder because the field count here
//! — one slot per host capability — is an order of magnitude larger than
//! anything the teacher itself builds this way.

use std::fmt;
use std::path::{Path, PathBuf};

use sieve_types::action::{
    DenotifyAction, FileIntoAction, FlagAction, RedirectAction, RejectAction, SnoozeAction,
    VacationAction,
};
use sieve_types::capability::{Extension, ExtensionSet};
use sieve_types::duptrack::DuptrackEntry;
use sieve_types::notify::NotifyEntry;

use crate::ast::AddressPart;
use crate::error::Result;

/// Read-only accessors into the message being filtered. Implemented by
/// the host; the engine never constructs one itself.
pub trait MessageContext {
    fn header(&self, name: &str) -> Vec<String>;
    fn envelope(&self, part: AddressPart, name: &str) -> Vec<String>;
    fn size(&self) -> u64;

    /// Plain-text body used by the notification builder's `$text$` /
    /// `$text[N]$` tokens. Hosts that don't support body access (or
    /// don't use `notify`/`vacation`) can leave this at its default.
    fn body_text(&self) -> String {
        String::new()
    }
}

/// Opaque per-script context handle (§3: "opaque script-context pointer
/// supplied by the caller"). The default `script_path` is `None`; hosts
/// that support `include` override it so relative paths resolve.
pub trait ScriptContext {
    fn script_path(&self) -> Option<&Path> {
        None
    }
}

type Logger = Box<dyn Fn(&str) + Send + Sync>;
type ParseErrorCb = Box<dyn Fn(usize, &str) + Send + Sync>;
type ExecuteErrCb = Box<dyn Fn(&str) + Send + Sync>;
type GetFname = Box<dyn Fn(&dyn MessageContext) -> String + Send + Sync>;

type KeepCb = Box<dyn Fn(&FlagAction, &dyn MessageContext) -> Result<()> + Send + Sync>;
type DiscardCb = Box<dyn Fn(&dyn MessageContext) -> Result<()> + Send + Sync>;
type RejectCb =
    Box<dyn Fn(&RejectAction, bool, &dyn MessageContext) -> Result<()> + Send + Sync>;
type FileIntoCb = Box<dyn Fn(&FileIntoAction, &dyn MessageContext) -> Result<()> + Send + Sync>;
type RedirectCb = Box<dyn Fn(&RedirectAction, &dyn MessageContext) -> Result<()> + Send + Sync>;
type SnoozeCb = Box<dyn Fn(&SnoozeAction, &dyn MessageContext) -> Result<()> + Send + Sync>;
type NotifyCb = Box<dyn Fn(&NotifyEntry, &dyn MessageContext) -> Result<()> + Send + Sync>;
type DenotifyCb = Box<dyn Fn(&DenotifyAction, &dyn MessageContext) -> Result<()> + Send + Sync>;

type MailboxExistsCb = Box<dyn Fn(&str, &dyn MessageContext) -> bool + Send + Sync>;
type HeaderCb = Box<dyn Fn(&str, &dyn MessageContext) -> Vec<String> + Send + Sync>;
type EnvelopeCb =
    Box<dyn Fn(AddressPart, &str, &dyn MessageContext) -> Vec<String> + Send + Sync>;
type SizeCb = Box<dyn Fn(&dyn MessageContext) -> u64 + Send + Sync>;
type IncludeCb =
    Box<dyn Fn(&str, &dyn ScriptContext) -> std::io::Result<PathBuf> + Send + Sync>;

type VacationAutorespondCb =
    Box<dyn Fn(&VacationAction, &dyn MessageContext) -> Result<bool> + Send + Sync>;
type VacationSendResponseCb =
    Box<dyn Fn(&VacationAction, &dyn MessageContext) -> Result<()> + Send + Sync>;
type DuplicateCheckCb = Box<dyn Fn(&str, &dyn MessageContext) -> bool + Send + Sync>;
type DuplicateTrackCb = Box<dyn Fn(&DuptrackEntry, &dyn MessageContext) -> Result<()> + Send + Sync>;

/// Reserved slots for extensions outside the implemented grammar subset
/// (metadata, environment, special-use, editheader, ext-lists, imip,
/// jmapquery, body). No code path in `eval`/`dispatch` ever calls these;
/// they exist so a host assembling a full `Capabilities` table has
/// somewhere to put them, and so `Capabilities::stub()` has a uniform
/// "everything poisoned" shape.
type ReservedCb = Box<dyn Fn(&dyn MessageContext) -> bool + Send + Sync>;

/// A mutable registry built once per interpreter instance, then treated
/// as read-only for the lifetime of every `parse`/`execute`/`dispatch`
/// call it is passed to (§4.6: "read-only during evaluation").
pub struct Capabilities {
    pub(crate) active: ExtensionSet,

    logger: Option<Logger>,
    parse_error: Option<ParseErrorCb>,
    execute_err: Option<ExecuteErrCb>,
    getfname: Option<GetFname>,

    keep: Option<KeepCb>,
    discard: Option<DiscardCb>,
    reject: Option<RejectCb>,
    fileinto: Option<FileIntoCb>,
    redirect: Option<RedirectCb>,
    snooze: Option<SnoozeCb>,
    notify: Option<NotifyCb>,
    denotify: Option<DenotifyCb>,

    mailboxexists: Option<MailboxExistsCb>,
    header: Option<HeaderCb>,
    envelope: Option<EnvelopeCb>,
    size: Option<SizeCb>,
    include: Option<IncludeCb>,

    vacation_autorespond: Option<VacationAutorespondCb>,
    vacation_send_response: Option<VacationSendResponseCb>,
    duplicate_check: Option<DuplicateCheckCb>,
    duplicate_track: Option<DuplicateTrackCb>,

    mailboxidexists: Option<ReservedCb>,
    specialuseexists: Option<ReservedCb>,
    metadata: Option<ReservedCb>,
    environment: Option<ReservedCb>,
    body: Option<ReservedCb>,
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capabilities")
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}

macro_rules! accessor {
    ($name:ident, $field:ident, $ty:ty) => {
        pub(crate) fn $name(&self) -> Option<&$ty> {
            self.$field.as_ref()
        }
    };
}

impl Capabilities {
    #[must_use]
    pub fn builder() -> CapabilitiesBuilder {
        CapabilitiesBuilder::new()
    }

    /// A parse-only table: every mandatory slot is a "poison" closure
    /// that panics if ever invoked (§9: "share the evaluation capability
    /// structure, but install poison values"). Logger/`parse_error` are
    /// the two real, safe capabilities `parse_only` needs; every other
    /// slot stays `None`, which dispatch treats as "capability absent"
    /// rather than invoking anything.
    #[must_use]
    pub fn stub() -> Self {
        CapabilitiesBuilder::new()
            .register_logger(|_| {})
            .register_parse_error(|_, _| {})
            .register_keep(|_, _| {
                panic!("parse-only interpreter: keep capability must not be invoked")
            })
            .build()
    }

    #[must_use]
    pub fn active_extensions(&self) -> ExtensionSet {
        self.active
    }

    #[must_use]
    pub fn has(&self, ext: Extension) -> bool {
        self.active.contains(ext)
    }

    pub(crate) fn log(&self, message: &str) {
        if let Some(logger) = &self.logger {
            logger(message);
        }
    }

    pub(crate) fn has_logger(&self) -> bool {
        self.logger.is_some()
    }

    pub(crate) fn has_parse_error_reporter(&self) -> bool {
        self.parse_error.is_some()
    }

    pub(crate) fn report_parse_error(&self, line: usize, message: &str) {
        if let Some(cb) = &self.parse_error {
            cb(line, message);
        }
    }

    pub(crate) fn report_execute_err(&self, message: &str) {
        if let Some(cb) = &self.execute_err {
            cb(message);
        }
    }

    accessor!(keep_fn, keep, KeepCb);
    accessor!(discard_fn, discard, DiscardCb);
    accessor!(reject_fn, reject, RejectCb);
    accessor!(fileinto_fn, fileinto, FileIntoCb);
    accessor!(redirect_fn, redirect, RedirectCb);
    accessor!(snooze_fn, snooze, SnoozeCb);
    accessor!(notify_fn, notify, NotifyCb);
    accessor!(denotify_fn, denotify, DenotifyCb);
    accessor!(mailboxexists_fn, mailboxexists, MailboxExistsCb);
    accessor!(header_fn, header, HeaderCb);
    accessor!(envelope_fn, envelope, EnvelopeCb);
    accessor!(size_fn, size, SizeCb);
    accessor!(include_fn, include, IncludeCb);
    accessor!(
        vacation_autorespond_fn,
        vacation_autorespond,
        VacationAutorespondCb
    );
    accessor!(
        vacation_send_response_fn,
        vacation_send_response,
        VacationSendResponseCb
    );
    accessor!(duplicate_check_fn, duplicate_check, DuplicateCheckCb);
    accessor!(duplicate_track_fn, duplicate_track, DuplicateTrackCb);

    pub(crate) fn getfname(&self, ctx: &dyn MessageContext) -> Option<String> {
        self.getfname.as_ref().map(|cb| cb(ctx))
    }
}

/// Builds a [`Capabilities`] table one callback at a time.
#[derive(Default)]
pub struct CapabilitiesBuilder {
    active: ExtensionSet,
    logger: Option<Logger>,
    parse_error: Option<ParseErrorCb>,
    execute_err: Option<ExecuteErrCb>,
    getfname: Option<GetFname>,
    keep: Option<KeepCb>,
    discard: Option<DiscardCb>,
    reject: Option<RejectCb>,
    fileinto: Option<FileIntoCb>,
    redirect: Option<RedirectCb>,
    snooze: Option<SnoozeCb>,
    notify: Option<NotifyCb>,
    denotify: Option<DenotifyCb>,
    mailboxexists: Option<MailboxExistsCb>,
    header: Option<HeaderCb>,
    envelope: Option<EnvelopeCb>,
    size: Option<SizeCb>,
    include: Option<IncludeCb>,
    vacation_autorespond: Option<VacationAutorespondCb>,
    vacation_send_response: Option<VacationSendResponseCb>,
    duplicate_check: Option<DuplicateCheckCb>,
    duplicate_track: Option<DuplicateTrackCb>,
    mailboxidexists: Option<ReservedCb>,
    specialuseexists: Option<ReservedCb>,
    metadata: Option<ReservedCb>,
    environment: Option<ReservedCb>,
    body: Option<ReservedCb>,
}

impl fmt::Debug for CapabilitiesBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilitiesBuilder")
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}

impl CapabilitiesBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn enable(mut self, ext: Extension) -> Self {
        self.active.insert(ext);
        self
    }

    #[must_use]
    pub fn enable_all(mut self, exts: impl IntoIterator<Item = Extension>) -> Self {
        for ext in exts {
            self.active.insert(ext);
        }
        self
    }

    #[must_use]
    pub fn build(self) -> Capabilities {
        Capabilities {
            active: self.active,
            logger: self.logger,
            parse_error: self.parse_error,
            execute_err: self.execute_err,
            getfname: self.getfname,
            keep: self.keep,
            discard: self.discard,
            reject: self.reject,
            fileinto: self.fileinto,
            redirect: self.redirect,
            snooze: self.snooze,
            notify: self.notify,
            denotify: self.denotify,
            mailboxexists: self.mailboxexists,
            header: self.header,
            envelope: self.envelope,
            size: self.size,
            include: self.include,
            vacation_autorespond: self.vacation_autorespond,
            vacation_send_response: self.vacation_send_response,
            duplicate_check: self.duplicate_check,
            duplicate_track: self.duplicate_track,
            mailboxidexists: self.mailboxidexists,
            specialuseexists: self.specialuseexists,
            metadata: self.metadata,
            environment: self.environment,
            body: self.body,
        }
    }
}

impl CapabilitiesBuilder {
    #[must_use]
    pub fn register_logger(mut self, callback: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.logger = Some(Box::new(callback));
        self
    }

    #[must_use]
    pub fn register_parse_error(
        mut self,
        callback: impl Fn(usize, &str) + Send + Sync + 'static,
    ) -> Self {
        self.parse_error = Some(Box::new(callback));
        self
    }

    #[must_use]
    pub fn register_execute_err(
        mut self,
        callback: impl Fn(&str) + Send + Sync + 'static,
    ) -> Self {
        self.execute_err = Some(Box::new(callback));
        self
    }

    #[must_use]
    pub fn register_getfname(
        mut self,
        callback: impl Fn(&dyn MessageContext) -> String + Send + Sync + 'static,
    ) -> Self {
        self.getfname = Some(Box::new(callback));
        self
    }

    #[must_use]
    pub fn register_keep(
        mut self,
        callback: impl Fn(&FlagAction, &dyn MessageContext) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.keep = Some(Box::new(callback));
        self
    }

    #[must_use]
    pub fn register_discard(
        mut self,
        callback: impl Fn(&dyn MessageContext) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.discard = Some(Box::new(callback));
        self
    }

    #[must_use]
    pub fn register_reject(
        mut self,
        callback: impl Fn(&RejectAction, bool, &dyn MessageContext) -> Result<()>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.reject = Some(Box::new(callback));
        self
    }

    #[must_use]
    pub fn register_fileinto(
        mut self,
        callback: impl Fn(&FileIntoAction, &dyn MessageContext) -> Result<()>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.fileinto = Some(Box::new(callback));
        self
    }

    #[must_use]
    pub fn register_redirect(
        mut self,
        callback: impl Fn(&RedirectAction, &dyn MessageContext) -> Result<()>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.redirect = Some(Box::new(callback));
        self
    }

    #[must_use]
    pub fn register_snooze(
        mut self,
        callback: impl Fn(&SnoozeAction, &dyn MessageContext) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.snooze = Some(Box::new(callback));
        self
    }

    #[must_use]
    pub fn register_notify(
        mut self,
        callback: impl Fn(&NotifyEntry, &dyn MessageContext) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.notify = Some(Box::new(callback));
        self
    }

    #[must_use]
    pub fn register_denotify(
        mut self,
        callback: impl Fn(&DenotifyAction, &dyn MessageContext) -> Result<()>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.denotify = Some(Box::new(callback));
        self
    }

    #[must_use]
    pub fn register_mailboxexists(
        mut self,
        callback: impl Fn(&str, &dyn MessageContext) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.mailboxexists = Some(Box::new(callback));
        self
    }

    #[must_use]
    pub fn register_header(
        mut self,
        callback: impl Fn(&str, &dyn MessageContext) -> Vec<String> + Send + Sync + 'static,
    ) -> Self {
        self.header = Some(Box::new(callback));
        self
    }

    #[must_use]
    pub fn register_envelope(
        mut self,
        callback: impl Fn(AddressPart, &str, &dyn MessageContext) -> Vec<String>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.envelope = Some(Box::new(callback));
        self
    }

    #[must_use]
    pub fn register_size(
        mut self,
        callback: impl Fn(&dyn MessageContext) -> u64 + Send + Sync + 'static,
    ) -> Self {
        self.size = Some(Box::new(callback));
        self
    }

    #[must_use]
    pub fn register_include(
        mut self,
        callback: impl Fn(&str, &dyn ScriptContext) -> std::io::Result<PathBuf>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.include = Some(Box::new(callback));
        self
    }

    #[must_use]
    pub fn register_vacation_autorespond(
        mut self,
        callback: impl Fn(&VacationAction, &dyn MessageContext) -> Result<bool>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.vacation_autorespond = Some(Box::new(callback));
        self
    }

    #[must_use]
    pub fn register_vacation_send_response(
        mut self,
        callback: impl Fn(&VacationAction, &dyn MessageContext) -> Result<()>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.vacation_send_response = Some(Box::new(callback));
        self
    }

    #[must_use]
    pub fn register_duplicate_check(
        mut self,
        callback: impl Fn(&str, &dyn MessageContext) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.duplicate_check = Some(Box::new(callback));
        self
    }

    #[must_use]
    pub fn register_duplicate_track(
        mut self,
        callback: impl Fn(&DuptrackEntry, &dyn MessageContext) -> Result<()>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.duplicate_track = Some(Box::new(callback));
        self
    }

    #[must_use]
    pub fn register_mailboxidexists(
        mut self,
        callback: impl Fn(&dyn MessageContext) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.mailboxidexists = Some(Box::new(callback));
        self
    }

    #[must_use]
    pub fn register_specialuseexists(
        mut self,
        callback: impl Fn(&dyn MessageContext) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.specialuseexists = Some(Box::new(callback));
        self
    }

    #[must_use]
    pub fn register_metadata(
        mut self,
        callback: impl Fn(&dyn MessageContext) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.metadata = Some(Box::new(callback));
        self
    }

    #[must_use]
    pub fn register_environment(
        mut self,
        callback: impl Fn(&dyn MessageContext) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.environment = Some(Box::new(callback));
        self
    }

    #[must_use]
    pub fn register_body(
        mut self,
        callback: impl Fn(&dyn MessageContext) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.body = Some(Box::new(callback));
        self
    }
}
