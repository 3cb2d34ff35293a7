//! Action dispatcher (§4.4, C5): walks an [`EvalOutcome`]'s action list in
//! order, invoking the host capability behind each one, then runs the
//! notification and duplicate-tracking passes.
//!
//! The state this carries is deliberately flat — a running `cancel_keep`
//! bit and the status of the first failure, nothing recursive — since
//! every phase (actions, implicit keep, notifications, duptrack) is a
//! single pass over a list already built by evaluation.

use sieve_types::action::{Action, FlagAction, VacationAction};
use sieve_types::duptrack::DuptrackEntry;
use sieve_types::notify::NotifyEntry;
use sieve_types::status::StatusCode;

use crate::ast::AddressPart;
use crate::error::{EngineError, Result};
use crate::eval::EvalOutcome;
use crate::interp::{Capabilities, MessageContext, ScriptContext};
use crate::notify_template::{self, NotifyAccessors};

/// Upper bound on the detail string handed to `execute_err`. The
/// original C implementation used a fixed 4 KiB trace buffer; that limit
/// was sizing detritus rather than a contract, so here it only bounds
/// what crosses the host callback boundary, not the in-memory trace.
const MAX_TRACE_LEN: usize = 4096;

#[derive(Debug)]
pub struct DispatchOutcome {
    pub status: StatusCode,
    /// `"Action(s) taken:\n"` followed by one human-readable,
    /// newline-terminated line per action/notification/duptrack entry
    /// that actually ran, in dispatch order.
    pub trace: String,
}

/// What happened when a single action was handed to its capability.
enum Effect {
    Ran,
    /// Vacation's `autorespond` phase declined to send (RFC 5230 §4.4:
    /// duplicate suppression or cool-down window) — not a failure.
    Suppressed,
    /// Actions with no host-visible capability of their own (flag-only
    /// actions, and `notify`/`denotify`, which are dispatched separately
    /// in the notification pass below).
    Noop,
}

/// Dispatches `outcome`'s actions against `interp`, then the pending
/// notifications and duplicate-tracking entries it carries.
///
/// `script_ctx` is accepted to match the engine's other two entry points
/// even though no capability invoked here needs it today.
#[must_use]
pub fn run(
    outcome: EvalOutcome,
    interp: &Capabilities,
    script_ctx: &dyn ScriptContext,
    msg_ctx: &dyn MessageContext,
) -> DispatchOutcome {
    let _ = script_ctx;

    let mut trace = String::from("Action(s) taken:\n");
    let mut cancel_keep = false;
    let mut vacation_suppressed = false;
    let mut failure: Option<StatusCode> = None;

    for action in &outcome.actions {
        if failure.is_some() {
            break;
        }
        match dispatch_one(interp, action, msg_ctx) {
            Ok(Effect::Ran) => {
                if let Some(line) = action_trace_line(action) {
                    push_trace(&mut trace, &line);
                }
                cancel_keep |= action.cancel_keep();
            }
            Ok(Effect::Suppressed) => {
                push_trace(&mut trace, "Vacation reply suppressed");
                vacation_suppressed = true;
                cancel_keep |= action.cancel_keep();
            }
            Ok(Effect::Noop) => {}
            Err(e) => {
                report_err(
                    interp,
                    &format!("{} ({}): {e}", action.kind(), describe(action)),
                );
                failure = Some(e.status());
            }
        }
    }

    // §4.4: notifications are built from the trace accumulated by the
    // action loop alone and are dispatched before implicit keep runs, so
    // the message a notify callback sees never includes the "Kept" line.
    dispatch_notifications(interp, &outcome.notifications, msg_ctx, &mut trace);

    // A failed action aborts further action dispatch, but a failure
    // earlier in the script must never suppress implicit keep — the
    // message still has to land somewhere. Tried exactly once: if the
    // implicit keep itself fails there is nothing further to fall back
    // to, so the failure simply stands.
    if !cancel_keep {
        let implicit = Action::Keep(FlagAction::default());
        match dispatch_one(interp, &implicit, msg_ctx) {
            Ok(_) => push_trace(&mut trace, "Kept"),
            Err(e) => {
                report_err(interp, &format!("keep (implicit): {e}"));
                failure = Some(e.status());
            }
        }
    }

    let mut status = failure.unwrap_or(StatusCode::Ok);
    if status == StatusCode::Ok && vacation_suppressed {
        status = StatusCode::Done;
    }

    // Duplicate tracking only commits once delivery as a whole succeeded;
    // each entry is still tracked independently of its siblings even
    // then (§4.3: tracking is non-transactional).
    if status.is_ok() {
        dispatch_duptrack(interp, &outcome.duptrack, msg_ctx, &mut trace);
    }

    DispatchOutcome { status, trace }
}

fn push_trace(trace: &mut String, line: &str) {
    trace.push_str(line);
    trace.push('\n');
}

/// The human-readable line (§4.4 step 4) appended to the trace when
/// `action` successfully runs. Actions with no host-visible delivery
/// effect of their own (flag-only actions, `notify`/`denotify`) add
/// nothing — they're dispatched as `Effect::Noop` and never reach here.
fn action_trace_line(action: &Action) -> Option<String> {
    match action {
        Action::Keep(_) => Some("Kept".to_string()),
        Action::Discard => Some("Discarded".to_string()),
        Action::Reject(r) | Action::EReject(r) => Some(format!("Rejected with: {}", r.reason)),
        Action::FileInto(a) => Some(format!("Filed into: {}", a.mailbox)),
        Action::Redirect(a) => Some(format!("Redirected to {}", a.address)),
        Action::Snooze(_) => Some("Snoozed".to_string()),
        Action::Vacation(_) => Some("Sent vacation reply".to_string()),
        Action::SetFlag(_)
        | Action::AddFlag(_)
        | Action::RemoveFlag(_)
        | Action::Mark
        | Action::Unmark
        | Action::Notify(_)
        | Action::Denotify(_) => None,
    }
}

fn report_err(interp: &Capabilities, message: &str) {
    let truncated = match message.char_indices().nth(MAX_TRACE_LEN) {
        Some((byte_idx, _)) => &message[..byte_idx],
        None => message,
    };
    interp.report_execute_err(truncated);
}

fn dispatch_one(interp: &Capabilities, action: &Action, msg_ctx: &dyn MessageContext) -> Result<Effect> {
    match action {
        Action::Keep(flags) => {
            let f = interp
                .keep_fn()
                .ok_or_else(|| EngineError::internal("keep capability not registered"))?;
            f(flags, msg_ctx)?;
            Ok(Effect::Ran)
        }
        Action::Discard => {
            let f = interp
                .discard_fn()
                .ok_or_else(|| EngineError::internal("discard capability not registered"))?;
            f(msg_ctx)?;
            Ok(Effect::Ran)
        }
        Action::Reject(r) => {
            let f = interp
                .reject_fn()
                .ok_or_else(|| EngineError::internal("reject capability not registered"))?;
            f(r, false, msg_ctx)?;
            Ok(Effect::Ran)
        }
        Action::EReject(r) => {
            let f = interp
                .reject_fn()
                .ok_or_else(|| EngineError::internal("reject capability not registered"))?;
            f(r, true, msg_ctx)?;
            Ok(Effect::Ran)
        }
        Action::FileInto(a) => {
            let f = interp
                .fileinto_fn()
                .ok_or_else(|| EngineError::internal("fileinto capability not registered"))?;
            f(a, msg_ctx)?;
            Ok(Effect::Ran)
        }
        Action::Redirect(a) => {
            let f = interp
                .redirect_fn()
                .ok_or_else(|| EngineError::internal("redirect capability not registered"))?;
            f(a, msg_ctx)?;
            Ok(Effect::Ran)
        }
        Action::Snooze(a) => {
            let f = interp
                .snooze_fn()
                .ok_or_else(|| EngineError::internal("snooze capability not registered"))?;
            f(a, msg_ctx)?;
            Ok(Effect::Ran)
        }
        Action::Vacation(a) => dispatch_vacation(interp, a, msg_ctx),
        Action::SetFlag(_)
        | Action::AddFlag(_)
        | Action::RemoveFlag(_)
        | Action::Mark
        | Action::Unmark
        | Action::Notify(_)
        | Action::Denotify(_) => Ok(Effect::Noop),
    }
}

/// RFC 5230 §4.4's two-phase protocol: the host first decides whether a
/// response is due at all (duplicate suppression, `:days` cool-down),
/// and only then is asked to actually compose and send one.
fn dispatch_vacation(
    interp: &Capabilities,
    action: &VacationAction,
    msg_ctx: &dyn MessageContext,
) -> Result<Effect> {
    let autorespond = interp
        .vacation_autorespond_fn()
        .ok_or_else(|| EngineError::internal("vacation capability not registered"))?;
    if !autorespond(action, msg_ctx)? {
        return Ok(Effect::Suppressed);
    }
    let send = interp
        .vacation_send_response_fn()
        .ok_or_else(|| EngineError::internal("vacation capability not registered"))?;
    send(action, msg_ctx)?;
    Ok(Effect::Ran)
}

fn dispatch_notifications(
    interp: &Capabilities,
    notifications: &[NotifyEntry],
    msg_ctx: &dyn MessageContext,
    trace: &mut String,
) {
    let active: Vec<&NotifyEntry> = notifications.iter().filter(|e| e.isactive).collect();
    if active.is_empty() {
        return;
    }

    let Some(notify) = interp.notify_fn() else {
        interp.log("notify capability not registered; dropping pending notifications");
        return;
    };

    let (from, env_from, subject, text) = message_fields(interp, msg_ctx);
    let accessors = NotifyAccessors {
        from: &from,
        env_from: &env_from,
        subject: &subject,
        text: &text,
    };
    // The trace a notification message is built against is the one
    // accumulated by the action loop alone, frozen here before this pass
    // (and the later implicit keep) add anything further to it.
    let actions_trace = trace.clone();

    for entry in active {
        let mut options = entry.options.clone();
        if entry.method.is_mailto() && options.first().map(String::as_str) == Some("$env-from$") {
            options[0] = env_from.clone();
        }
        let expanded = NotifyEntry {
            message: format!(
                "{}\n\n{actions_trace}",
                notify_template::expand(&entry.message, &accessors)
            ),
            from: entry
                .from
                .as_deref()
                .map(|f| notify_template::expand(f, &accessors)),
            options,
            ..entry.clone()
        };
        match notify(&expanded, msg_ctx) {
            Ok(()) => push_trace(trace, &format!("notify {}: ok", expanded.method.as_str())),
            Err(e) => {
                // Never blocks later notifications or implicit keep.
                push_trace(
                    trace,
                    &format!("notify {}: FAILED: {e}", expanded.method.as_str()),
                );
                interp.log(&format!("notification delivery failed: {e}"));
            }
        }
    }
}

fn dispatch_duptrack(
    interp: &Capabilities,
    duptrack: &[DuptrackEntry],
    msg_ctx: &dyn MessageContext,
    trace: &mut String,
) {
    let Some(track) = interp.duplicate_track_fn() else {
        return;
    };
    for entry in duptrack {
        match track(entry, msg_ctx) {
            Ok(()) => push_trace(trace, &format!("duplicate-track {}: ok", entry.id)),
            Err(e) => {
                push_trace(trace, &format!("duplicate-track {}: FAILED: {e}", entry.id));
                interp.log(&format!("duplicate tracking failed for {}: {e}", entry.id));
            }
        }
    }
}

fn message_fields(interp: &Capabilities, msg_ctx: &dyn MessageContext) -> (String, String, String, String) {
    let header = |name: &str| {
        interp
            .header_fn()
            .map_or_else(Vec::new, |f| f(name, msg_ctx))
            .into_iter()
            .next()
            .unwrap_or_default()
    };
    let env_from = interp
        .envelope_fn()
        .map_or_else(Vec::new, |f| f(AddressPart::All, "from", msg_ctx))
        .into_iter()
        .next()
        .unwrap_or_default();
    (header("From"), env_from, header("Subject"), msg_ctx.body_text())
}

/// A short identifier for `execute_err`'s `"<action> (<detail>): <reason>"`
/// format — the mailbox/address/reason a failure is about, where one
/// exists.
fn describe(action: &Action) -> String {
    match action {
        Action::Reject(r) | Action::EReject(r) => r.reason.clone(),
        Action::FileInto(a) => a.mailbox.clone(),
        Action::Redirect(a) => a.address.clone(),
        Action::Snooze(a) => a.mailbox.clone().unwrap_or_default(),
        Action::Vacation(a) => a.handle.clone().unwrap_or_default(),
        Action::Notify(a) => a.method.clone(),
        Action::Denotify(a) => a.method.clone().unwrap_or_default(),
        Action::Keep(_)
        | Action::Discard
        | Action::SetFlag(_)
        | Action::AddFlag(_)
        | Action::RemoveFlag(_)
        | Action::Mark
        | Action::Unmark => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sieve_types::action::{FileIntoAction, RejectAction};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FakeMessage;
    impl MessageContext for FakeMessage {
        fn header(&self, name: &str) -> Vec<String> {
            if name.eq_ignore_ascii_case("from") {
                vec!["alice@example.com".to_string()]
            } else {
                Vec::new()
            }
        }
        fn envelope(&self, _part: AddressPart, _name: &str) -> Vec<String> {
            Vec::new()
        }
        fn size(&self) -> u64 {
            0
        }
    }

    struct NullScript;
    impl ScriptContext for NullScript {}

    fn outcome(actions: Vec<Action>) -> EvalOutcome {
        EvalOutcome {
            status: StatusCode::Ok,
            actions,
            notifications: Vec::new(),
            duptrack: Vec::new(),
        }
    }

    #[test]
    fn explicit_keep_runs_and_suppresses_implicit_keep() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&calls);
        let interp = Capabilities::builder()
            .register_keep(move |_, _| {
                counted.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .build();
        let result = run(
            outcome(vec![Action::Keep(FlagAction::default())]),
            &interp,
            &NullScript,
            &FakeMessage,
        );
        assert_eq!(result.status, StatusCode::Ok);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn no_actions_triggers_implicit_keep() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&calls);
        let interp = Capabilities::builder()
            .register_keep(move |_, _| {
                counted.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .build();
        let result = run(outcome(vec![]), &interp, &NullScript, &FakeMessage);
        assert_eq!(result.status, StatusCode::Ok);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn fileinto_cancels_implicit_keep() {
        let keep_calls = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&keep_calls);
        let interp = Capabilities::builder()
            .register_keep(move |_, _| {
                counted.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .register_fileinto(|_, _| Ok(()))
            .build();
        let result = run(
            outcome(vec![Action::FileInto(FileIntoAction {
                mailbox: "Archive".into(),
                ..Default::default()
            })]),
            &interp,
            &NullScript,
            &FakeMessage,
        );
        assert_eq!(result.status, StatusCode::Ok);
        assert_eq!(keep_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn failed_action_still_triggers_implicit_keep() {
        let keep_calls = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&keep_calls);
        let interp = Capabilities::builder()
            .register_keep(move |_, _| {
                counted.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .register_reject(|_, _, _| Err(EngineError::run("mail store rejected it")))
            .build();
        let result = run(
            outcome(vec![Action::Reject(RejectAction {
                reason: "spam".into(),
            })]),
            &interp,
            &NullScript,
            &FakeMessage,
        );
        assert_eq!(result.status, StatusCode::RunError);
        assert_eq!(keep_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn missing_capability_is_internal_error() {
        let interp = Capabilities::builder().build();
        let result = run(
            outcome(vec![Action::FileInto(FileIntoAction {
                mailbox: "Archive".into(),
                ..Default::default()
            })]),
            &interp,
            &NullScript,
            &FakeMessage,
        );
        assert_eq!(result.status, StatusCode::InternalError);
    }

    #[test]
    fn vacation_suppressed_reports_done() {
        let interp = Capabilities::builder()
            .register_vacation_autorespond(|_, _| Ok(false))
            .register_keep(|_, _| Ok(()))
            .build();
        let action = Action::Vacation(VacationAction {
            reason: "out of office".into(),
            ..Default::default()
        });
        let result = run(outcome(vec![action]), &interp, &NullScript, &FakeMessage);
        assert_eq!(result.status, StatusCode::Done);
    }

    #[test]
    fn notify_message_is_expanded_against_message_fields() {
        let sent = Arc::new(std::sync::Mutex::new(None));
        let captured = Arc::clone(&sent);
        let interp = Capabilities::builder()
            .register_keep(|_, _| Ok(()))
            .register_header(|name, ctx| ctx.header(name))
            .register_notify(move |entry, _| {
                *captured.lock().unwrap() = Some(entry.message.clone());
                Ok(())
            })
            .build();
        let outcome = EvalOutcome {
            status: StatusCode::Ok,
            actions: vec![],
            notifications: vec![NotifyEntry::new("mailto", "new mail from $from$")],
            duptrack: vec![],
        };
        run(outcome, &interp, &NullScript, &FakeMessage);
        assert_eq!(
            sent.lock().unwrap().as_deref(),
            Some("new mail from alice@example.com\n\nAction(s) taken:\n")
        );
    }

    #[test]
    fn duptrack_only_commits_on_overall_success() {
        let tracked = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&tracked);
        let interp = Capabilities::builder()
            .register_reject(|_, _, _| Err(EngineError::run("boom")))
            .register_keep(|_, _| Ok(()))
            .register_duplicate_track(move |_, _| {
                counted.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .build();
        let outcome = EvalOutcome {
            status: StatusCode::Ok,
            actions: vec![Action::Reject(RejectAction {
                reason: "spam".into(),
            })],
            notifications: vec![],
            duptrack: vec![DuptrackEntry::new("msg-1".into(), 60)],
        };
        run(outcome, &interp, &NullScript, &FakeMessage);
        assert_eq!(tracked.load(Ordering::SeqCst), 0);
    }
}
