//! End-to-end scenarios against the fake host capability table in
//! `tests/common`: parse source, compile, load into a handle, evaluate,
//! dispatch, and assert on what the fake host actually saw.

mod common;

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use sieve::StatusCode;

use common::{compile_and_load, fake_capabilities, FakeMessage, FakeScript, Recorder, TempPath};

fn run_source(source: &str, recorder: Arc<Recorder>, msg: &FakeMessage) -> sieve::DispatchOutcome {
    let interp = fake_capabilities(Arc::clone(&recorder), HashMap::new());
    let (handle, _guard) = compile_and_load(source, &interp);
    let outcome = sieve::execute(&handle, &interp, &FakeScript::default(), msg, false);
    sieve::dispatch(outcome, &interp, &FakeScript::default(), msg)
}

#[test]
fn keep_only() {
    let recorder = Arc::new(Recorder::default());
    let msg = FakeMessage::new();
    let result = run_source("keep;", Arc::clone(&recorder), &msg);
    assert_eq!(result.status, StatusCode::Ok);
    assert_eq!(recorder.kept.load(Ordering::SeqCst), 1);
    assert_eq!(recorder.discarded.load(Ordering::SeqCst), 0);
    assert_eq!(result.trace, "Action(s) taken:\nKept\n");
}

#[test]
fn discard_wins_over_implicit_keep() {
    let recorder = Arc::new(Recorder::default());
    let msg = FakeMessage::new();
    let result = run_source("discard;", Arc::clone(&recorder), &msg);
    assert_eq!(result.status, StatusCode::Ok);
    assert_eq!(recorder.discarded.load(Ordering::SeqCst), 1);
    assert_eq!(recorder.kept.load(Ordering::SeqCst), 0);
    assert!(result.trace.contains("Discarded\n"));
}

#[test]
fn require_unknown_extension_fails_to_parse() {
    let interp = fake_capabilities(Arc::new(Recorder::default()), HashMap::new());
    let err = sieve::parse_string(r#"require "nosuchthing"; keep;"#, &interp).unwrap_err();
    assert!(err.contains("line 1: Unsupported feature nosuchthing"), "{err}");
}

#[test]
fn fileinto_with_flags() {
    let recorder = Arc::new(Recorder::default());
    let msg = FakeMessage::new();
    let source = r#"require "fileinto"; require "imap4flags"; setflag "\\Seen"; fileinto "INBOX/x";"#;
    let result = run_source(source, Arc::clone(&recorder), &msg);
    assert_eq!(result.status, StatusCode::Ok);
    assert_eq!(&*recorder.filed_into.lock().unwrap(), &["INBOX/x".to_string()]);
    assert_eq!(
        &*recorder.filed_into_flags.lock().unwrap(),
        &[vec!["\\Seen".to_string()]]
    );
    // fileinto is a cancel_keep action, so the implicit keep never runs.
    assert_eq!(recorder.kept.load(Ordering::SeqCst), 0);
    assert!(result.trace.ends_with("Filed into: INBOX/x\n"));
}

#[test]
fn notify_message_is_expanded_against_from_and_subject() {
    let recorder = Arc::new(Recorder::default());
    let msg = FakeMessage::new()
        .with_header("From", "a@b")
        .with_header("Subject", "Hello World");
    let source =
        r#"require "notify"; notify :message "From: $from$, Subj: $subject[5]$" "mailto:bob@example.com";"#;
    let result = run_source(source, Arc::clone(&recorder), &msg);
    assert_eq!(result.status, StatusCode::Ok);
    assert_eq!(
        &*recorder.notified.lock().unwrap(),
        &["From: a@b, Subj: Hello\n\nAction(s) taken:\n".to_string()]
    );
    // notify never cancels implicit keep.
    assert_eq!(recorder.kept.load(Ordering::SeqCst), 1);
}

/// A includes B, B includes A. `active_includes` only tracks ancestors
/// currently being evaluated, so the cycle is caught one level deeper
/// than the two files themselves: A's nested re-entry runs once before
/// its own re-include of B is recognized as the cycle and skipped.
/// Net effect: B's `keep` runs once, A's `discard` runs twice (the
/// re-entered copy, then the original), and evaluation terminates.
#[test]
fn include_cycle_terminates_instead_of_looping() {
    let recorder = Arc::new(Recorder::default());
    let interp_for_compile = fake_capabilities(Arc::clone(&recorder), HashMap::new());

    let script_a = r#"include "B"; discard;"#;
    let script_b = r#"include "A"; keep;"#;

    let bytes_a = sieve::compiler::compile(
        &sieve::parse_string(script_a, &interp_for_compile).unwrap().block,
    );
    let bytes_b = sieve::compiler::compile(
        &sieve::parse_string(script_b, &interp_for_compile).unwrap().block,
    );
    let path_a = TempPath::with_contents(&bytes_a);
    let path_b = TempPath::with_contents(&bytes_b);

    let mut includes = HashMap::new();
    includes.insert("A".to_string(), path_a.to_path_buf());
    includes.insert("B".to_string(), path_b.to_path_buf());

    let interp = fake_capabilities(Arc::clone(&recorder), includes);

    let mut handle = sieve::CompiledScript::new();
    // Load B first so A ends up `current` for the top-level execute call.
    sieve::load(&path_b, &mut handle).unwrap();
    sieve::load(&path_a, &mut handle).unwrap();

    let msg = FakeMessage::new();
    let script_ctx = FakeScript::default();
    let outcome = sieve::execute(&handle, &interp, &script_ctx, &msg, false);
    assert_eq!(outcome.status, StatusCode::Ok);
    assert_eq!(outcome.actions.len(), 3);

    let result = sieve::dispatch(outcome, &interp, &script_ctx, &msg);
    assert_eq!(result.status, StatusCode::Ok);
    assert_eq!(recorder.discarded.load(Ordering::SeqCst), 2);
    assert_eq!(recorder.kept.load(Ordering::SeqCst), 1);
}

#[test]
fn reloading_same_inode_reports_reloaded_through_the_public_api() {
    let interp = fake_capabilities(Arc::new(Recorder::default()), HashMap::new());
    let script = sieve::parse_string("keep;", &interp).unwrap();
    let bytes = sieve::compiler::compile(&script.block);
    let path = TempPath::with_contents(&bytes);

    let mut handle = sieve::CompiledScript::new();
    assert_eq!(sieve::load(&path, &mut handle).unwrap(), StatusCode::Ok);
    assert_eq!(
        sieve::load(&path, &mut handle).unwrap(),
        StatusCode::ScriptReloaded
    );
}

/// `cancel_keep` is ANDed in only for actions that actually dispatched;
/// a failed action aborts the action loop before its own bit is
/// applied, so a script whose sole action is a failing `reject` must
/// still fall through to implicit keep.
#[test]
fn failing_cancel_keep_action_still_triggers_implicit_keep_end_to_end() {
    let keep_calls = Arc::new(AtomicUsize::new(0));
    let counted = Arc::clone(&keep_calls);
    let interp = common::builder_with_extensions()
        .register_keep(move |_, _| {
            counted.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .register_reject(|_, _, _| Err(sieve::EngineError::run("mail store rejected it")))
        .build();

    let script = sieve::parse_string(r#"require "reject"; reject "spam";"#, &interp).unwrap();
    let bytes = sieve::compiler::compile(&script.block);
    let path = TempPath::with_contents(&bytes);
    let mut handle = sieve::CompiledScript::new();
    sieve::load(&path, &mut handle).unwrap();

    let msg = FakeMessage::new();
    let script_ctx = FakeScript::default();
    let outcome = sieve::execute(&handle, &interp, &script_ctx, &msg, false);
    let result = sieve::dispatch(outcome, &interp, &script_ctx, &msg);

    assert_eq!(result.status, StatusCode::RunError);
    assert_eq!(keep_calls.load(Ordering::SeqCst), 1);
}
