//! Script frontend (§4.1, C2): the public entry points that turn Sieve
//! source text into a [`Script`], wiring the lexer and parser together
//! and checking the one capability evaluation truly cannot run without.

use std::io::Read;

use sieve_types::capability::ExtensionSet;

use crate::ast::Block;
use crate::interp::Capabilities;
use crate::lexer::tokenize;
use crate::parser::{parse_tokens, ParseIssue};

/// A successfully parsed script: its command tree plus the extensions it
/// actually `require`d, recorded so a host can decide whether to compile
/// it at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    pub block: Block,
    pub support: ExtensionSet,
}

/// Parses a full script read from `stream`, reporting every issue found
/// (wrapped in a `"script errors:"` banner, matching how a host would
/// present a failed upload) and checking that `interp` carries the three
/// capabilities every script needs regardless of what it uses: `logger`,
/// `error reporter`, and `keep`.
///
/// # Errors
/// Returns the formatted issue list as a human-readable string; each
/// line has the form `"line N: message\r\n"`.
pub fn parse(mut stream: impl Read, interp: &Capabilities, ctx: &dyn crate::interp::ScriptContext) -> Result<Script, String> {
    let _ = ctx;
    let mut source = String::new();
    stream
        .read_to_string(&mut source)
        .map_err(|e| format!("script errors:\r\nline 0: {e}\r\n"))?;
    parse_inner(&source, interp, true, true)
}

/// Parses `source` against an already-built `interp`, without the
/// file-upload banner and without requiring `keep` to be registered —
/// used when re-validating a snippet the host already trusts to run
/// (e.g. a script fetched from storage whose capabilities were checked
/// once at `parse` time).
///
/// # Errors
/// Same format as [`parse`], without the leading banner line.
pub fn parse_string(source: &str, interp: &Capabilities) -> Result<Script, String> {
    parse_inner(source, interp, false, false)
}

/// Parses `source` for grammar validity alone — no action capability is
/// checked, since the caller only wants to know the script is
/// syntactically well-formed (§9: "share the evaluation capability
/// structure, but install poison values" so grammar checking never needs
/// a real host). A `require`d extension still has to be one the caller's
/// grammar subset supports.
///
/// # Errors
/// Same format as [`parse`], without the leading banner line.
pub fn parse_only(mut stream: impl Read) -> Result<Script, String> {
    let mut source = String::new();
    stream
        .read_to_string(&mut source)
        .map_err(|e| format!("line 0: {e}\r\n"))?;
    parse_inner_with_extensions(&source, &Capabilities::stub(), ExtensionSet::empty(), false, false)
}

fn parse_inner(source: &str, interp: &Capabilities, check_mandatory: bool, banner: bool) -> Result<Script, String> {
    parse_inner_with_extensions(source, interp, interp.active_extensions(), check_mandatory, banner)
}

/// §4.1: `logger`, `error reporter` and `keep` are checked before parsing
/// begins — a script can't be meaningfully reported on or ultimately
/// delivered without them. `parse_string`/`parse_only` skip this (see
/// their own doc comments): they re-validate a snippet the host already
/// trusts, or check grammar alone, so none of the three is needed yet.
fn parse_inner_with_extensions(
    source: &str,
    interp: &Capabilities,
    extensions: ExtensionSet,
    check_mandatory: bool,
    banner: bool,
) -> Result<Script, String> {
    if check_mandatory {
        if let Some(message) = missing_mandatory_capability(interp) {
            return Err(format_issues(&[ParseIssue { line: 0, message }], banner));
        }
    }

    let tokens = match tokenize(source) {
        Ok(tokens) => tokens,
        Err(e) => {
            interp.report_parse_error(e.line, &e.message);
            return Err(format_issues(
                &[ParseIssue {
                    line: e.line,
                    message: e.message,
                }],
                banner,
            ));
        }
    };

    let outcome = parse_tokens(&tokens, extensions);
    for issue in &outcome.issues {
        interp.report_parse_error(issue.line, &issue.message);
    }
    if !outcome.issues.is_empty() {
        return Err(format_issues(&outcome.issues, banner));
    }

    Ok(Script {
        block: outcome.block,
        support: outcome.support,
    })
}

/// Returns the name of the first unregistered mandatory capability, if
/// any, checked in the order §4.1 lists them: `logger`, `error reporter`,
/// `keep`.
fn missing_mandatory_capability(interp: &Capabilities) -> Option<String> {
    if !interp.has_logger() {
        return Some("mandatory capability not registered: logger".to_string());
    }
    if !interp.has_parse_error_reporter() {
        return Some("mandatory capability not registered: error reporter".to_string());
    }
    if interp.keep_fn().is_none() {
        return Some("mandatory capability not registered: keep".to_string());
    }
    None
}

fn format_issues(issues: &[ParseIssue], banner: bool) -> String {
    let mut out = String::new();
    if banner {
        out.push_str("script errors:\r\n");
    }
    for issue in issues {
        out.push_str(&format!("line {}: {}\r\n", issue.line, issue.message));
    }
    out
}
