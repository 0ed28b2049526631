/// Repair of LLM completions into a JSON object.
///
/// Completions may wrap the object in prose, use typographic quotes, or put raw newlines
/// inside string values. Three strategies are tried in order:
///
/// 1. outermost braces, parsed as-is when already valid, else normalization with
///    string-aware quote straightening and re-escaping of control characters
/// 2. regex brace extraction + normalization + control characters flattened to spaces
/// 3. line-by-line: first line with `{` through the first line ending in `}`
///
/// Only when all three fail does `repair` return `SanitizeError::Unrecoverable`.
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum SanitizeError {
    #[error("no JSON object found in completion")]
    NoObject,

    #[error("completion could not be repaired: {0}")]
    Unrecoverable(String),
}

pub type ParsedObject = Map<String, Value>;

static BRACED_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)\{.*\}").expect("valid regex"));

const TYPOGRAPHIC_DOUBLE_QUOTES: [char; 7] =
    ['\u{201C}', '\u{201D}', '\u{201E}', '\u{201F}', '\u{2033}', '\u{00AB}', '\u{00BB}'];

/// How typographic double quotes are straightened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quotes {
    /// Only where they delimit a string. Inside a `"`-delimited string they are kept.
    Delimiters,
    /// Everywhere, without tracking strings.
    Everywhere,
}

pub fn repair(raw: &str) -> Result<ParsedObject, SanitizeError> {
    let strategies: [(&str, fn(&str) -> Result<ParsedObject, String>); 3] = [
        ("strict", strict_pass),
        ("loose", loose_pass),
        ("line", line_pass),
    ];

    let mut failures = Vec::with_capacity(strategies.len());
    for (name, strategy) in strategies {
        match strategy(raw) {
            Ok(obj) => return Ok(obj),
            Err(e) => {
                debug!(strategy = name, error = %e, "sanitizer strategy failed");
                failures.push(format!("{name}: {e}"));
            }
        }
    }

    if !raw.contains('{') {
        return Err(SanitizeError::NoObject);
    }
    Err(SanitizeError::Unrecoverable(failures.join("; ")))
}

fn strict_pass(raw: &str) -> Result<ParsedObject, String> {
    let braced = outer_braces(raw).ok_or_else(|| "no brace pair".to_string())?;
    if let Ok(obj) = parse_object(braced) {
        return Ok(obj);
    }
    let normalized = normalize(braced, Quotes::Delimiters);
    let escaped = escape_controls_in_strings(&normalized);
    parse_object(&collapse_whitespace(&escaped))
}

fn loose_pass(raw: &str) -> Result<ParsedObject, String> {
    let found = BRACED_RE
        .find(raw)
        .ok_or_else(|| "no brace match".to_string())?
        .as_str();
    let flattened: String = normalize(found, Quotes::Everywhere)
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    parse_object(&flattened)
}

fn line_pass(raw: &str) -> Result<ParsedObject, String> {
    let lines: Vec<&str> = raw.lines().collect();
    let start = lines
        .iter()
        .position(|l| l.contains('{'))
        .ok_or_else(|| "no opening line".to_string())?;
    let end = lines[start..]
        .iter()
        .position(|l| l.trim_end().ends_with('}'))
        .map(|offset| start + offset)
        .ok_or_else(|| "no closing line".to_string())?;

    let first = &lines[start][lines[start].find('{').unwrap_or(0)..];
    let mut joined = String::from(first);
    for line in &lines[start + 1..=end] {
        joined.push(' ');
        joined.push_str(line.trim());
    }
    let cleaned: String = normalize(&joined, Quotes::Everywhere)
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    parse_object(&cleaned)
}

/// Substring from the first `{` to the last `}` inclusive.
fn outer_braces(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

/// Drop BOM and zero-width characters, straighten typographic quotes, and strip control
/// characters other than `\n`, `\r` and `\t`.
///
/// With `Quotes::Delimiters` a string opened by `"` can only be closed by `"`, so `«premio»`
/// inside a value survives. A string opened by a typographic quote closes on the next
/// typographic or straight double quote.
fn normalize(text: &str, quotes: Quotes) -> String {
    let mut out = String::with_capacity(text.len());
    let mut opener: Option<char> = None;
    let mut escaped = false;

    for c in text.chars() {
        let c = match c {
            '\u{FEFF}' | '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{2060}' => continue,
            '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' | '\u{2032}' => '\'',
            '\n' | '\r' | '\t' => c,
            c if c.is_control() => continue,
            c => c,
        };
        let typographic = TYPOGRAPHIC_DOUBLE_QUOTES.contains(&c);
        if quotes == Quotes::Everywhere {
            out.push(if typographic { '"' } else { c });
            continue;
        }

        match opener {
            None => {
                if c == '"' || typographic {
                    opener = Some(c);
                    out.push('"');
                } else {
                    out.push(c);
                }
            }
            Some(_) if escaped => {
                escaped = false;
                out.push(c);
            }
            Some(open) => match c {
                '\\' => {
                    escaped = true;
                    out.push(c);
                }
                '"' => {
                    opener = None;
                    out.push(c);
                }
                _ if typographic && open != '"' => {
                    opener = None;
                    out.push('"');
                }
                _ => out.push(c),
            },
        }
    }
    out
}

/// Escape raw `\n`, `\r` and `\t` that sit inside string literals. Characters outside
/// strings are left untouched.
fn escape_controls_in_strings(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;

    for c in text.chars() {
        if in_string {
            if escaped {
                escaped = false;
                out.push(c);
                continue;
            }
            match c {
                '\\' => {
                    escaped = true;
                    out.push(c);
                }
                '"' => {
                    in_string = false;
                    out.push(c);
                }
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                _ => out.push(c),
            }
        } else {
            if c == '"' {
                in_string = true;
            }
            out.push(c);
        }
    }
    out
}

/// Replace each run of whitespace outside string literals with a single space.
fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut pending_space = false;

    for c in text.chars() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        if c.is_whitespace() {
            pending_space = true;
            continue;
        }
        if pending_space && !out.is_empty() {
            out.push(' ');
        }
        pending_space = false;
        if c == '"' {
            in_string = true;
        }
        out.push(c);
    }
    out
}

fn parse_object(text: &str) -> Result<ParsedObject, String> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(obj)) => Ok(obj),
        Ok(other) => Err(format!("expected an object, got {}", type_name(&other))),
        Err(e) => Err(e.to_string()),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
