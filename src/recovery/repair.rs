//! Text-level helpers shared by the recovery tiers.
//!
//! Everything here is pure string manipulation; parsing happens in the tiers.

use regex::Regex;
use std::sync::OnceLock;

fn json_fence() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)```json[ \t]*\r?\n?(.*?)```").expect("valid fence pattern"))
}

fn bare_fence() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```[ \t]*\r?\n?(.*?)```").expect("valid fence pattern"))
}

fn braced_span_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\{.*\}").expect("valid span pattern"))
}

/// Interior of the first ```json fence, falling back to the first bare fence.
pub(crate) fn fenced_block(text: &str) -> Option<&str> {
    json_fence()
        .captures(text)
        .or_else(|| bare_fence().captures(text))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
}

/// Greedy span from the first `{` to the last `}`.
pub(crate) fn braced_span(text: &str) -> Option<&str> {
    braced_span_pattern().find(text).map(|m| m.as_str())
}

/// Everything from the first `{` onwards, trailing whitespace and fences removed.
pub(crate) fn object_tail(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let tail = text[start..].trim_end();
    Some(tail.strip_suffix("```").unwrap_or(tail).trim_end())
}

/// Candidate the structural repairs work on: the braced span, or the tail when
/// the output was cut before any closing brace. Because the span ends at the
/// last `}`, a partial trailing element of truncated output is already cut off.
pub(crate) fn repair_candidate(text: &str) -> Option<&str> {
    braced_span(text).or_else(|| object_tail(text))
}

/// Byte offset of the first non-whitespace character at or after `from`.
fn skip_whitespace(text: &str, from: usize) -> usize {
    let rest = &text[from..];
    from + (rest.len() - rest.trim_start().len())
}

/// Collapse `[ , ]` and `{ , }` and strip trailing commas before closers.
///
/// String literals are copied through untouched.
pub(crate) fn repair_syntax(candidate: &str) -> String {
    let mut repaired = String::with_capacity(candidate.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut i = 0;

    while let Some(c) = candidate[i..].chars().next() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            repaired.push(c);
            i += c.len_utf8();
            continue;
        }

        match c {
            '"' => in_string = true,
            ',' => {
                let next = skip_whitespace(candidate, i + 1);
                if candidate[next..].starts_with(&['}', ']'][..]) {
                    i = next;
                    continue;
                }
            }
            '{' | '[' => {
                let closer = if c == '{' { '}' } else { ']' };
                let comma = skip_whitespace(candidate, i + 1);
                if candidate[comma..].starts_with(',') {
                    let close = skip_whitespace(candidate, comma + 1);
                    if candidate[close..].starts_with(closer) {
                        repaired.push(c);
                        repaired.push(closer);
                        i = close + 1;
                        continue;
                    }
                }
            }
            _ => {}
        }
        repaired.push(c);
        i += c.len_utf8();
    }
    repaired
}

/// Append the closers an unfinished document is missing, innermost first.
///
/// Brackets inside string literals are ignored. A string left open by the
/// cut is terminated before any closer is appended.
pub(crate) fn balance_closers(candidate: &str) -> String {
    let text = candidate.trim_end();
    let mut pending: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for c in text.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => pending.push('}'),
            '[' => pending.push(']'),
            '}' | ']' => {
                if pending.last() == Some(&c) {
                    pending.pop();
                }
            }
            _ => {}
        }
    }

    let mut balanced = String::with_capacity(text.len() + pending.len() + 2);
    balanced.push_str(text);
    if in_string {
        if escaped {
            balanced.pop();
        }
        balanced.push('"');
    }
    while let Some(closer) = pending.pop() {
        balanced.push(closer);
    }
    balanced
}
