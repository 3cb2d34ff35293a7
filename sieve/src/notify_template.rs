//! Notification Builder (§4.5, C6): expands the fixed `$from$` /
//! `$env-from$` / `$subject$` / `$text$` token set, plus their `[N]`
//! octet-truncating forms (`$text[N]$`, `$subject[N]$`, ...), against
//! message accessors. Implemented as a small hand-rolled scanner rather
//! than pulling in a templating crate or regex — the token set is fixed
//! and case-insensitive, which a scanner handles directly.

/// Values substituted for each recognized token.
#[derive(Debug, Clone, Copy)]
pub struct NotifyAccessors<'a> {
    pub from: &'a str,
    pub env_from: &'a str,
    pub subject: &'a str,
    pub text: &'a str,
}

/// Expands every recognized `$...$` token in `template`. Unknown tokens
/// and a lone trailing `$` pass through verbatim.
#[must_use]
pub fn expand(template: &str, accessors: &NotifyAccessors<'_>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut i = 0;
    while i < template.len() {
        if template.as_bytes()[i] == b'$' {
            if let Some((consumed, replacement)) = match_token(&template[i + 1..], accessors) {
                out.push_str(&replacement);
                i += 1 + consumed;
                continue;
            }
        }
        let ch = template[i..].chars().next().expect("i is a char boundary");
        out.push(ch);
        i += ch.len_utf8();
    }
    out
}

/// Tries to match a known token at the start of `rest` (the text right
/// after a `$`). Returns how many bytes of `rest` the token consumed
/// (including its closing `$`) and the replacement text.
fn match_token(rest: &str, accessors: &NotifyAccessors<'_>) -> Option<(usize, String)> {
    let lower = rest.to_ascii_lowercase();

    for (token, value) in [
        ("from$", accessors.from),
        ("env-from$", accessors.env_from),
        ("subject$", accessors.subject),
        ("text$", accessors.text),
    ] {
        if lower.starts_with(token) {
            return Some((token.len(), value.to_string()));
        }
    }

    for (prefix, value) in [
        ("from[", accessors.from),
        ("env-from[", accessors.env_from),
        ("subject[", accessors.subject),
        ("text[", accessors.text),
    ] {
        if let Some(after) = lower.strip_prefix(prefix) {
            let end = after.find("]$")?;
            let n: usize = after[..end].parse().ok()?;
            return Some((prefix.len() + end + 2, truncate_octets(value, n)));
        }
    }

    None
}

/// Truncates `s` to at most `n` octets, rounding down to the nearest
/// UTF-8 character boundary rather than splitting a multi-byte char.
fn truncate_octets(s: &str, n: usize) -> String {
    if s.len() <= n {
        return s.to_string();
    }
    let mut end = n;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}
