//! Fake host capability table for black-box engine tests, mirroring
//! `protonmail-client`'s `tests/fake_imap` pattern: a small in-memory
//! double that records every callback invocation instead of touching
//! real storage.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use sieve::ast::AddressPart;
use sieve::{Capabilities, CapabilitiesBuilder, MessageContext, ScriptContext};

/// Actions the fake host actually performed, in call order.
#[derive(Debug, Default)]
pub struct Recorder {
    pub kept: AtomicUsize,
    pub discarded: AtomicUsize,
    pub filed_into: Mutex<Vec<String>>,
    pub filed_into_flags: Mutex<Vec<Vec<String>>>,
    pub notified: Mutex<Vec<String>>,
    pub parse_errors: Mutex<Vec<(usize, String)>>,
}

/// A message double: fixed headers, envelope and body, enough for every
/// scenario's `header`/`envelope`/`body_text` needs.
pub struct FakeMessage {
    pub headers: Vec<(String, String)>,
    pub envelope: Vec<(AddressPart, String, String)>,
    pub body: String,
    pub size: u64,
}

impl FakeMessage {
    pub fn new() -> Self {
        Self {
            headers: Vec::new(),
            envelope: Vec::new(),
            body: String::new(),
            size: 0,
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

impl MessageContext for FakeMessage {
    fn header(&self, name: &str) -> Vec<String> {
        self.headers
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.clone())
            .collect()
    }

    fn envelope(&self, part: AddressPart, name: &str) -> Vec<String> {
        self.envelope
            .iter()
            .filter(|(p, n, _)| *p == part && n.eq_ignore_ascii_case(name))
            .map(|(_, _, v)| v.clone())
            .collect()
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn body_text(&self) -> String {
        self.body.clone()
    }
}

/// Script context that resolves `include "name"` against a fixed table
/// of names to on-disk bytecode paths, for the include-cycle scenario.
#[derive(Default)]
pub struct FakeScript {
    pub includes: HashMap<String, PathBuf>,
}

impl ScriptContext for FakeScript {
    fn script_path(&self) -> Option<&Path> {
        None
    }
}

/// Builds a `Capabilities` table that records every invocation into
/// `recorder` and resolves `include` against `includes`.
pub fn fake_capabilities(
    recorder: std::sync::Arc<Recorder>,
    includes: HashMap<String, PathBuf>,
) -> Capabilities {
    let keep_rec = std::sync::Arc::clone(&recorder);
    let discard_rec = std::sync::Arc::clone(&recorder);
    let fileinto_rec = std::sync::Arc::clone(&recorder);
    let notify_rec = std::sync::Arc::clone(&recorder);
    let parse_err_rec = std::sync::Arc::clone(&recorder);

    builder_with_extensions()
        .register_keep(move |_, _| {
            keep_rec.kept.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .register_discard(move |_| {
            discard_rec.discarded.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .register_fileinto(move |a, _| {
            fileinto_rec.filed_into.lock().unwrap().push(a.mailbox.clone());
            fileinto_rec
                .filed_into_flags
                .lock()
                .unwrap()
                .push(a.flags.clone());
            Ok(())
        })
        .register_header(|name, ctx| ctx.header(name))
        .register_envelope(|part, name, ctx| ctx.envelope(part, name))
        .register_notify(move |entry, _| {
            notify_rec.notified.lock().unwrap().push(entry.message.clone());
            Ok(())
        })
        .register_parse_error(move |line, message| {
            parse_err_rec
                .parse_errors
                .lock()
                .unwrap()
                .push((line, message.to_string()));
        })
        .register_include(move |name, _| {
            includes
                .get(name)
                .cloned()
                .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, name.to_string()))
        })
        .build()
}

/// A `Capabilities::builder()` with every implemented extension active,
/// so `require` statements covering this engine's grammar subset never
/// fail for lack of host support.
pub fn builder_with_extensions() -> CapabilitiesBuilder {
    use sieve::Extension;
    Capabilities::builder().enable_all([
        Extension::Fileinto,
        Extension::Reject,
        Extension::Ereject,
        Extension::Redirect,
        Extension::Imap4Flags,
        Extension::Vacation,
        Extension::Notify,
        Extension::Variables,
        Extension::Duplicate,
        Extension::Envelope,
        Extension::Snooze,
    ])
}

/// Compiles `source` and loads it into a fresh handle, returning the
/// handle plus the backing temp file (dropped, and so removed, when the
/// caller is done with the handle).
pub fn compile_and_load(source: &str, interp: &Capabilities) -> (sieve::CompiledScript, TempPath) {
    let script = sieve::parse_string(source, interp).expect("script should parse");
    let bytes = sieve::compiler::compile(&script.block);
    let path = TempPath::with_contents(&bytes);
    let mut handle = sieve::CompiledScript::new();
    sieve::load(&path, &mut handle).expect("bytecode should load");
    (handle, path)
}

/// Scratch bytecode file, removed on drop.
pub struct TempPath(PathBuf);

impl TempPath {
    pub fn with_contents(bytes: &[u8]) -> Self {
        use std::io::Write;
        let mut path = std::env::temp_dir();
        let unique = format!(
            "sieve-scenario-test-{}-{:p}",
            std::process::id(),
            bytes.as_ptr()
        );
        path.push(unique);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(bytes).unwrap();
        Self(path)
    }
}

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
