//! Output text helpers shared by the compiler (literal folding) and the back end.
use chrono::{DateTime, SecondsFormat, Utc};

/// How string values are written between their quotes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum StringEscape {
    /// Standard JSON escaping of `"`, `\` and control characters.
    #[default]
    Json,
    /// Interpolate as-is. Only valid JSON when the strings are known not to need escaping.
    Trusted,
}

fn needs_escape(s: &str) -> bool {
    s.bytes().any(|b| b < 0x20 || b == b'"' || b == b'\\')
}

/// Append `s` as a JSON string literal, quotes included.
pub fn push_quoted(out: &mut String, s: &str, escape: StringEscape) {
    if escape == StringEscape::Trusted || !needs_escape(s) {
        out.push('"');
        out.push_str(s);
        out.push('"');
        return;
    }
    match serde_json::to_string(s) {
        Ok(quoted) => out.push_str(&quoted),
        // serializing a str cannot fail; keep the output well-formed regardless
        Err(_) => out.push_str("null"),
    }
}

/// Compile-time literal for an object key: always escaped.
pub fn quoted_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 2);
    push_quoted(&mut out, key, StringEscape::Json);
    out
}

/// `YYYY-MM-DDTHH:MM:SS.sssZ`, the format dates take in JSON.
pub fn iso_8601(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn push_int(out: &mut String, n: i128) {
    out.push_str(&n.to_string());
}
