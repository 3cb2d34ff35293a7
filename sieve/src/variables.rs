//! Variable frames and `${name}` string interpolation (RFC 5229).
//!
//! `Variables` mirrors the frame layout `SPEC_FULL.md` §3 settles on:
//! separate maps for unnamed positional captures, match-test captures,
//! parsed (`:matches`) captures, and user-named `set` variables, each a
//! string-list map since Sieve variables are always string lists even
//! when most scripts only ever store a single element.

use std::collections::HashMap;

pub type FrameMap = HashMap<String, Vec<String>>;

#[derive(Debug, Clone, Default)]
pub struct Variables {
    pub unnamed: FrameMap,
    pub match_vars: FrameMap,
    pub parsed_strings: FrameMap,
    pub named: FrameMap,
}

impl Variables {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.named.insert(name.to_string(), vec![value.into()]);
    }

    pub fn set_match_vars(&mut self, captures: Vec<String>) {
        self.match_vars.clear();
        for (i, capture) in captures.into_iter().enumerate() {
            self.match_vars.insert(i.to_string(), vec![capture]);
        }
    }

    pub(crate) fn lookup(&self, name: &str) -> Option<&str> {
        self.named
            .get(name)
            .or_else(|| self.match_vars.get(name))
            .or_else(|| self.parsed_strings.get(name))
            .or_else(|| self.unnamed.get(name))
            .and_then(|v| v.first())
            .map(String::as_str)
    }

    /// Expands every `${name}` reference in `template` against the
    /// currently active frames. An unknown name expands to the empty
    /// string (RFC 5229 §3: "if the variable is not set... it MUST be
    /// replaced with the empty string").
    #[must_use]
    pub fn interpolate(&self, template: &str) -> String {
        let mut out = String::with_capacity(template.len());
        let mut chars = template.char_indices().peekable();
        let bytes = template.as_bytes();

        while let Some((i, c)) = chars.next() {
            if c == '$' && bytes.get(i + 1) == Some(&b'{') {
                if let Some(end) = template[i + 2..].find('}') {
                    let name = &template[i + 2..i + 2 + end];
                    out.push_str(self.lookup(name).unwrap_or(""));
                    for _ in 0..(name.len() + 2) {
                        chars.next();
                    }
                    continue;
                }
            }
            out.push(c);
        }
        out
    }
}
