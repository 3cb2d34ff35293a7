//! Evaluation engine (§4.3, C4): walks compiled bytecode against a
//! message, building the three out-lists the dispatcher consumes.
//!
//! `execute` never mutates `handle`: every blob an `include` chain might
//! need is expected to already be mapped into it via repeated
//! [`crate::cache::load`] calls made ahead of time by the host, so
//! evaluation stays a pure, concurrently-shareable read over `handle`'s
//! mmap'd bytes (§5).

use std::collections::HashSet;
use std::os::unix::fs::MetadataExt;

use sieve_types::action::{
    Action, DenotifyAction, FileIntoAction, FlagAction, NotifyAction, RedirectAction,
    RejectAction, SnoozeAction, VacationAction,
};
use sieve_types::duptrack::DuptrackEntry;
use sieve_types::notify::{NotifyEntry, NotifyMethod};
use sieve_types::status::StatusCode;

use crate::ast::{AddressPart, Block, Command, MatchType, Test};
use crate::cache::CompiledScript;
use crate::compiler;
use crate::interp::{Capabilities, MessageContext, ScriptContext};
use crate::variables::Variables;

/// Default duplicate-suppression window (RFC 7352 §3: implementations
/// default to seven days when `:seconds` is omitted).
const DEFAULT_DUPLICATE_WINDOW_SECS: u64 = 7 * 24 * 60 * 60;

/// Default vacation cool-down period (RFC 5230 §4.4's implementation
/// note default of seven days).
const DEFAULT_VACATION_DAYS: u32 = 7;

#[derive(Debug)]
pub struct EvalOutcome {
    pub status: StatusCode,
    pub actions: Vec<Action>,
    pub notifications: Vec<NotifyEntry>,
    pub duptrack: Vec<DuptrackEntry>,
}

impl EvalOutcome {
    fn empty(status: StatusCode) -> Self {
        Self {
            status,
            actions: Vec::new(),
            notifications: Vec::new(),
            duptrack: Vec::new(),
        }
    }
}

struct EvalState<'a> {
    interp: &'a Capabilities,
    handle: &'a CompiledScript,
    script_ctx: &'a dyn ScriptContext,
    msg_ctx: &'a dyn MessageContext,
    vars: Variables,
    actions: Vec<Action>,
    notifications: Vec<NotifyEntry>,
    duptrack: Vec<DuptrackEntry>,
    active_includes: Vec<u64>,
    once_seen: HashSet<u64>,
    stop: bool,
    aborted: Option<String>,
    /// RFC 5232 §3's unnamed internal flag variable: the flag set that
    /// `keep`/`fileinto` pick up when called with no `:flags` tag of
    /// their own. A `setflag`/`addflag`/`removeflag` naming a variable
    /// writes that variable instead and leaves this alone.
    internal_flags: Vec<String>,
}

impl EvalState<'_> {
    fn halted(&self) -> bool {
        self.stop || self.aborted.is_some()
    }

    fn interpolate(&self, s: &str) -> String {
        self.vars.interpolate(s)
    }

    fn interpolate_list(&self, list: &[String]) -> Vec<String> {
        list.iter().map(|s| self.interpolate(s)).collect()
    }

    fn interpolate_opt(&self, s: &Option<String>) -> Option<String> {
        s.as_deref().map(|s| self.interpolate(s))
    }

    /// `keep`/`fileinto`'s own `:flags` tag wins when present; otherwise
    /// they pick up the unnamed internal flag variable.
    fn effective_flags(&self, own: &[String]) -> Vec<String> {
        if own.is_empty() {
            self.internal_flags.clone()
        } else {
            self.interpolate_list(own)
        }
    }

    fn named_flags(&self, name: &str) -> Vec<String> {
        self.vars
            .lookup(name)
            .map(|v| v.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }

    fn store_named_flags(&mut self, name: &str, flags: &[String]) {
        self.vars.set(name, flags.join(" "));
    }

    fn assign_flag_variable(&mut self, variable: Option<&str>, flags: Vec<String>) {
        match variable {
            Some(name) => self.store_named_flags(name, &flags),
            None => self.internal_flags = flags,
        }
    }

    fn add_flag_variable(&mut self, variable: Option<&str>, flags: &[String]) {
        match variable {
            Some(name) => {
                let mut current = self.named_flags(name);
                for flag in flags {
                    if !current.contains(flag) {
                        current.push(flag.clone());
                    }
                }
                self.store_named_flags(name, &current);
            }
            None => {
                for flag in flags {
                    if !self.internal_flags.contains(flag) {
                        self.internal_flags.push(flag.clone());
                    }
                }
            }
        }
    }

    fn remove_flag_variable(&mut self, variable: Option<&str>, flags: &[String]) {
        match variable {
            Some(name) => {
                let mut current = self.named_flags(name);
                current.retain(|f| !flags.contains(f));
                self.store_named_flags(name, &current);
            }
            None => self.internal_flags.retain(|f| !flags.contains(f)),
        }
    }
}

/// Evaluates `handle`'s currently-selected bytecode blob against
/// `msg_ctx`, producing an [`EvalOutcome`] the dispatcher consumes.
/// `is_include` is informational only (it does not change behavior
/// here; the dispatcher uses it to decide whether to run the implicit-
/// keep/notification phases, which only apply to a top-level script).
#[must_use]
pub fn execute(
    handle: &CompiledScript,
    interp: &Capabilities,
    script_ctx: &dyn ScriptContext,
    msg_ctx: &dyn MessageContext,
    is_include: bool,
) -> EvalOutcome {
    let _ = is_include;

    let Some(bytes) = handle.current_bytes() else {
        return EvalOutcome::empty(StatusCode::NotFinalized);
    };

    let block = match compiler::decompile(bytes) {
        Ok(block) => block,
        Err(e) => {
            interp.log(&format!("malformed bytecode: {e:?}"));
            return EvalOutcome::empty(StatusCode::RunError);
        }
    };

    let mut state = EvalState {
        interp,
        handle,
        script_ctx,
        msg_ctx,
        vars: Variables::new(),
        actions: Vec::new(),
        notifications: Vec::new(),
        duptrack: Vec::new(),
        active_includes: Vec::new(),
        once_seen: HashSet::new(),
        stop: false,
        aborted: None,
        internal_flags: Vec::new(),
    };

    eval_block(&mut state, &block);

    let status = if let Some(reason) = &state.aborted {
        interp.log(&format!("evaluation aborted: {reason}"));
        StatusCode::RunError
    } else {
        StatusCode::Ok
    };

    EvalOutcome {
        status,
        actions: state.actions,
        notifications: state.notifications,
        duptrack: state.duptrack,
    }
}

fn eval_block(state: &mut EvalState<'_>, block: &Block) {
    for command in block {
        if state.halted() {
            break;
        }
        eval_command(state, command);
    }
}

fn eval_command(state: &mut EvalState<'_>, command: &Command) {
    match command {
        Command::If { branches, otherwise } => {
            for (test, body) in branches {
                if eval_test(state, test) {
                    eval_block(state, body);
                    return;
                }
            }
            if let Some(body) = otherwise {
                eval_block(state, body);
            }
        }
        Command::Require(_) => {}
        Command::Stop => state.stop = true,
        Command::Keep { flags } => state.actions.push(Action::Keep(FlagAction {
            flags: state.effective_flags(flags),
            variable: None,
        })),
        Command::Discard => state.actions.push(Action::Discard),
        Command::FileInto {
            mailbox,
            flags,
            copy,
            create,
        } => state.actions.push(Action::FileInto(FileIntoAction {
            mailbox: state.interpolate(mailbox),
            flags: state.effective_flags(flags),
            copy: *copy,
            create: *create,
        })),
        Command::Redirect {
            address,
            copy,
            list_id,
        } => state.actions.push(Action::Redirect(RedirectAction {
            address: state.interpolate(address),
            copy: *copy,
            list_id: state.interpolate_opt(list_id),
        })),
        Command::Reject { reason, extended } => {
            let action = RejectAction {
                reason: state.interpolate(reason),
            };
            state.actions.push(if *extended {
                Action::EReject(action)
            } else {
                Action::Reject(action)
            });
        }
        Command::SetFlag(args) => {
            let flags = state.interpolate_list(&args.flags);
            state.assign_flag_variable(args.variable.as_deref(), flags.clone());
            state.actions.push(Action::SetFlag(FlagAction {
                flags,
                variable: args.variable.clone(),
            }));
        }
        Command::AddFlag(args) => {
            let flags = state.interpolate_list(&args.flags);
            state.add_flag_variable(args.variable.as_deref(), &flags);
            state.actions.push(Action::AddFlag(FlagAction {
                flags,
                variable: args.variable.clone(),
            }));
        }
        Command::RemoveFlag(args) => {
            let flags = state.interpolate_list(&args.flags);
            state.remove_flag_variable(args.variable.as_deref(), &flags);
            state.actions.push(Action::RemoveFlag(FlagAction {
                flags,
                variable: args.variable.clone(),
            }));
        }
        Command::Mark => state.actions.push(Action::Mark),
        Command::Unmark => state.actions.push(Action::Unmark),
        Command::Vacation(args) => state.actions.push(Action::Vacation(VacationAction {
            reason: state.interpolate(&args.reason),
            subject: state.interpolate_opt(&args.subject),
            from: state.interpolate_opt(&args.from),
            handle: args.handle.clone(),
            days: args.days.unwrap_or(DEFAULT_VACATION_DAYS),
            addresses: state.interpolate_list(&args.addresses),
            mime: args.mime,
        })),
        Command::Notify(args) => {
            let entry = NotifyEntry {
                method: NotifyMethod(state.interpolate(&args.method)),
                from: state.interpolate_opt(&args.from),
                options: state.interpolate_list(&args.options),
                priority: args.priority.clone(),
                message: state.interpolate_opt(&args.message).unwrap_or_default(),
                isactive: true,
            };
            state.actions.push(Action::Notify(NotifyAction {
                method: entry.method.as_str().to_string(),
                from: entry.from.clone(),
                options: entry.options.clone(),
                priority: entry.priority.clone(),
                message: Some(entry.message.clone()),
            }));
            state.notifications.push(entry);
        }
        Command::Denotify(args) => {
            let method = args.method.as_deref();
            let priority = args.priority.as_deref();
            for entry in &mut state.notifications {
                if entry.matches_denotify(method, priority) {
                    entry.isactive = false;
                }
            }
            state.actions.push(Action::Denotify(DenotifyAction {
                method: args.method.clone(),
                priority: args.priority.clone(),
            }));
        }
        Command::Snooze(args) => state.actions.push(Action::Snooze(SnoozeAction {
            mailbox: state.interpolate_opt(&args.mailbox),
            flags: state.interpolate_list(&args.flags),
            addflags: args.addflags,
            tzid: args.tzid.clone(),
            times: args.times.clone(),
            days: args.days,
        })),
        Command::Set { variable, value } => {
            let interpolated = state.interpolate(value);
            state.vars.set(variable, interpolated);
        }
        Command::Include { path, once } => eval_include(state, path, *once),
    }
}

fn eval_include(state: &mut EvalState<'_>, path: &str, once: bool) {
    let Some(resolve) = state.interp.include_fn() else {
        log::warn!("include capability not registered; skipping include {path}");
        return;
    };

    let resolved = match resolve(path, state.script_ctx) {
        Ok(p) => p,
        Err(e) => {
            log::warn!("include {path} could not be resolved: {e}; skipping, keeping prior actions");
            return;
        }
    };

    let inode = match std::fs::metadata(&resolved) {
        Ok(meta) => meta.ino(),
        Err(e) => {
            log::warn!("include {path} ({}) not found: {e}; skipping", resolved.display());
            return;
        }
    };

    if state.active_includes.contains(&inode) {
        log::warn!("include cycle detected at {path}; skipping");
        return;
    }
    if once && state.once_seen.contains(&inode) {
        return;
    }

    let Some(bytes) = state.handle.bytes_for_inode(inode) else {
        log::warn!(
            "include {path} ({}) is not pre-loaded into the bytecode cache; skipping",
            resolved.display()
        );
        return;
    };

    let block = match compiler::decompile(bytes) {
        Ok(block) => block,
        Err(e) => {
            state.aborted = Some(format!("include {path}: malformed bytecode ({e:?})"));
            return;
        }
    };

    state.once_seen.insert(inode);
    state.active_includes.push(inode);
    eval_block(state, &block);
    state.active_includes.pop();
}

fn eval_test(state: &mut EvalState<'_>, test: &Test) -> bool {
    match test {
        Test::True => true,
        Test::False => false,
        Test::Not(inner) => !eval_test(state, inner),
        Test::AnyOf(tests) => tests.iter().any(|t| eval_test(state, t)),
        Test::AllOf(tests) => tests.iter().all(|t| eval_test(state, t)),
        Test::Header {
            names,
            match_type,
            keys,
        } => names.iter().any(|name| {
            header_values(state, name)
                .iter()
                .any(|value| match_any(match_type, value, keys))
        }),
        Test::Address {
            part,
            names,
            match_type,
            keys,
        }
        | Test::Envelope {
            part,
            names,
            match_type,
            keys,
        } => names.iter().any(|name| {
            envelope_values(state, *part, name)
                .iter()
                .any(|value| match_any(match_type, value, keys))
        }),
        Test::Exists(names) => names.iter().all(|name| !header_values(state, name).is_empty()),
        Test::Size { over, limit } => {
            let size = state
                .interp
                .size_fn()
                .map_or(0, |f| f(state.msg_ctx));
            if *over {
                size > *limit
            } else {
                size < *limit
            }
        }
        Test::Duplicate {
            handle,
            seconds,
            header,
            unique_id,
        } => {
            let key = unique_id
                .clone()
                .or_else(|| header.clone())
                .or_else(|| handle.clone())
                .unwrap_or_default();
            let seen = state
                .interp
                .duplicate_check_fn()
                .is_some_and(|f| f(&key, state.msg_ctx));
            state.duptrack.push(DuptrackEntry::new(
                key,
                seconds.unwrap_or(DEFAULT_DUPLICATE_WINDOW_SECS),
            ));
            seen
        }
    }
}

fn header_values(state: &EvalState<'_>, name: &str) -> Vec<String> {
    state
        .interp
        .header_fn()
        .map_or_else(Vec::new, |f| f(name, state.msg_ctx))
}

fn envelope_values(state: &EvalState<'_>, part: AddressPart, name: &str) -> Vec<String> {
    state
        .interp
        .envelope_fn()
        .map_or_else(Vec::new, |f| f(part, name, state.msg_ctx))
}

fn match_any(match_type: &MatchType, value: &str, keys: &[String]) -> bool {
    keys.iter().any(|key| match match_type {
        MatchType::Is => value.eq_ignore_ascii_case(key),
        MatchType::Contains => value.to_ascii_lowercase().contains(&key.to_ascii_lowercase()),
        MatchType::Matches => glob_match(key, value),
    })
}

/// Sieve's `:matches` comparator: a simple case-insensitive glob with
/// `*` (any run, including empty) and `?` (exactly one character).
fn glob_match(pattern: &str, value: &str) -> bool {
    let pattern: Vec<char> = pattern.to_ascii_lowercase().chars().collect();
    let value: Vec<char> = value.to_ascii_lowercase().chars().collect();
    glob_match_inner(&pattern, &value)
}

fn glob_match_inner(pattern: &[char], value: &[char]) -> bool {
    match pattern.first() {
        None => value.is_empty(),
        Some('*') => {
            glob_match_inner(&pattern[1..], value)
                || (!value.is_empty() && glob_match_inner(pattern, &value[1..]))
        }
        Some('?') => !value.is_empty() && glob_match_inner(&pattern[1..], &value[1..]),
        Some(c) => value.first() == Some(c) && glob_match_inner(&pattern[1..], &value[1..]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile;

    struct FakeMessage {
        headers: Vec<(String, String)>,
        size: u64,
    }

    impl MessageContext for FakeMessage {
        fn header(&self, name: &str) -> Vec<String> {
            self.headers
                .iter()
                .filter(|(n, _)| n.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.clone())
                .collect()
        }

        fn envelope(&self, _part: AddressPart, _name: &str) -> Vec<String> {
            Vec::new()
        }

        fn size(&self) -> u64 {
            self.size
        }
    }

    struct NullScript;
    impl ScriptContext for NullScript {}

    fn handle_for(block: &Block) -> (CompiledScript, tempfile::TempPath) {
        let bytes = compile(block);
        let path = tempfile::write(&bytes);
        let mut handle = CompiledScript::new();
        crate::cache::load(&path, &mut handle).unwrap();
        (handle, path)
    }

    mod tempfile {
        use std::io::Write;
        use std::path::{Path, PathBuf};

        pub struct TempPath(PathBuf);
        impl std::ops::Deref for TempPath {
            type Target = Path;
            fn deref(&self) -> &Path {
                &self.0
            }
        }
        impl Drop for TempPath {
            fn drop(&mut self) {
                let _ = std::fs::remove_file(&self.0);
            }
        }

        pub fn write(bytes: &[u8]) -> TempPath {
            let mut path = std::env::temp_dir();
            path.push(format!("sieve-eval-test-{:p}", bytes.as_ptr()));
            let mut file = std::fs::File::create(&path).unwrap();
            file.write_all(bytes).unwrap();
            TempPath(path)
        }
    }

    #[test]
    fn keep_only_produces_single_keep_action() {
        let block: Block = vec![Command::Keep { flags: vec![] }];
        let (handle, _guard) = handle_for(&block);
        let interp = Capabilities::builder().build();
        let msg = FakeMessage { headers: vec![], size: 0 };
        let outcome = execute(&handle, &interp, &NullScript, &msg, false);
        assert_eq!(outcome.status, StatusCode::Ok);
        assert_eq!(outcome.actions, vec![Action::Keep(FlagAction::default())]);
    }

    #[test]
    fn discard_wins_over_later_fileinto_in_if_else() {
        let block: Block = vec![Command::If {
            branches: vec![(Test::True, vec![Command::Discard])],
            otherwise: Some(vec![Command::FileInto {
                mailbox: "INBOX".into(),
                flags: vec![],
                copy: false,
                create: false,
            }]),
        }];
        let (handle, _guard) = handle_for(&block);
        let interp = Capabilities::builder().build();
        let msg = FakeMessage { headers: vec![], size: 0 };
        let outcome = execute(&handle, &interp, &NullScript, &msg, false);
        assert_eq!(outcome.actions, vec![Action::Discard]);
    }

    #[test]
    fn size_over_test() {
        let block: Block = vec![Command::If {
            branches: vec![(
                Test::Size { over: true, limit: 100 },
                vec![Command::Discard],
            )],
            otherwise: Some(vec![Command::Keep { flags: vec![] }]),
        }];
        let (handle, _guard) = handle_for(&block);
        let interp = Capabilities::builder()
            .register_size(|ctx| ctx.size())
            .build();
        let msg = FakeMessage { headers: vec![], size: 500 };
        let outcome = execute(&handle, &interp, &NullScript, &msg, false);
        assert_eq!(outcome.actions, vec![Action::Discard]);
    }

    #[test]
    fn set_then_fileinto_interpolates_variable() {
        let block: Block = vec![
            Command::Set {
                variable: "box".into(),
                value: "Archive".into(),
            },
            Command::FileInto {
                mailbox: "INBOX/${box}".into(),
                flags: vec![],
                copy: false,
                create: false,
            },
        ];
        let (handle, _guard) = handle_for(&block);
        let interp = Capabilities::builder().build();
        let msg = FakeMessage { headers: vec![], size: 0 };
        let outcome = execute(&handle, &interp, &NullScript, &msg, false);
        match &outcome.actions[0] {
            Action::FileInto(a) => assert_eq!(a.mailbox, "INBOX/Archive"),
            other => panic!("unexpected action {other:?}"),
        }
    }

    #[test]
    fn setflag_flows_into_later_fileinto_without_its_own_flags_tag() {
        use crate::ast::FlagArgs;
        let block: Block = vec![
            Command::SetFlag(FlagArgs {
                variable: None,
                flags: vec!["\\Seen".into()],
            }),
            Command::FileInto {
                mailbox: "INBOX/x".into(),
                flags: vec![],
                copy: false,
                create: false,
            },
        ];
        let (handle, _guard) = handle_for(&block);
        let interp = Capabilities::builder().build();
        let msg = FakeMessage { headers: vec![], size: 0 };
        let outcome = execute(&handle, &interp, &NullScript, &msg, false);
        match &outcome.actions[1] {
            Action::FileInto(a) => assert_eq!(a.flags, vec!["\\Seen".to_string()]),
            other => panic!("unexpected action {other:?}"),
        }
    }

    #[test]
    fn fileinto_own_flags_tag_overrides_internal_variable() {
        use crate::ast::FlagArgs;
        let block: Block = vec![
            Command::SetFlag(FlagArgs {
                variable: None,
                flags: vec!["\\Seen".into()],
            }),
            Command::FileInto {
                mailbox: "INBOX/x".into(),
                flags: vec!["\\Flagged".into()],
                copy: false,
                create: false,
            },
        ];
        let (handle, _guard) = handle_for(&block);
        let interp = Capabilities::builder().build();
        let msg = FakeMessage { headers: vec![], size: 0 };
        let outcome = execute(&handle, &interp, &NullScript, &msg, false);
        match &outcome.actions[1] {
            Action::FileInto(a) => assert_eq!(a.flags, vec!["\\Flagged".to_string()]),
            other => panic!("unexpected action {other:?}"),
        }
    }

    #[test]
    fn named_setflag_variable_does_not_affect_internal_flags() {
        use crate::ast::FlagArgs;
        let block: Block = vec![
            Command::SetFlag(FlagArgs {
                variable: Some("myflags".into()),
                flags: vec!["\\Seen".into()],
            }),
            Command::FileInto {
                mailbox: "INBOX/x".into(),
                flags: vec![],
                copy: false,
                create: false,
            },
        ];
        let (handle, _guard) = handle_for(&block);
        let interp = Capabilities::builder().build();
        let msg = FakeMessage { headers: vec![], size: 0 };
        let outcome = execute(&handle, &interp, &NullScript, &msg, false);
        match &outcome.actions[1] {
            Action::FileInto(a) => assert!(a.flags.is_empty()),
            other => panic!("unexpected action {other:?}"),
        }
    }

    #[test]
    fn denotify_deactivates_matching_entry() {
        let block: Block = vec![
            Command::Notify(crate::ast::NotifyArgs {
                method: "mailto".into(),
                from: None,
                options: vec![],
                priority: None,
                message: Some("hi".into()),
            }),
            Command::Denotify(crate::ast::DenotifyArgs {
                method: Some("mailto".into()),
                priority: None,
            }),
        ];
        let (handle, _guard) = handle_for(&block);
        let interp = Capabilities::builder().build();
        let msg = FakeMessage { headers: vec![], size: 0 };
        let outcome = execute(&handle, &interp, &NullScript, &msg, false);
        assert_eq!(outcome.notifications.len(), 1);
        assert!(!outcome.notifications[0].isactive);
    }

    #[test]
    fn duplicate_test_records_duptrack_entry_regardless_of_outcome() {
        let block: Block = vec![Command::If {
            branches: vec![(
                Test::Duplicate {
                    handle: Some("h".into()),
                    seconds: Some(60),
                    header: None,
                    unique_id: None,
                },
                vec![Command::Discard],
            )],
            otherwise: Some(vec![Command::Keep { flags: vec![] }]),
        }];
        let (handle, _guard) = handle_for(&block);
        let interp = Capabilities::builder()
            .register_duplicate_check(|_, _| false)
            .build();
        let msg = FakeMessage { headers: vec![], size: 0 };
        let outcome = execute(&handle, &interp, &NullScript, &msg, false);
        assert_eq!(outcome.actions, vec![Action::Keep(FlagAction::default())]);
        assert_eq!(outcome.duptrack.len(), 1);
        assert_eq!(outcome.duptrack[0].seconds, 60);
    }

    #[test]
    fn matches_glob_wildcard() {
        assert!(match_any(
            &MatchType::Matches,
            "hello-world",
            &["hello-*".to_string()]
        ));
        assert!(!match_any(
            &MatchType::Matches,
            "goodbye-world",
            &["hello-*".to_string()]
        ));
    }

    #[test]
    fn missing_bytecode_blob_is_not_finalized() {
        let handle = CompiledScript::new();
        let interp = Capabilities::builder().build();
        let msg = FakeMessage { headers: vec![], size: 0 };
        let outcome = execute(&handle, &interp, &NullScript, &msg, false);
        assert_eq!(outcome.status, StatusCode::NotFinalized);
    }
}
