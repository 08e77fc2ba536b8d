//! Quote-aware SQL statement splitter (spec §2 item 17, §9).
//!
//! Splits a string of semicolon-separated statements while respecting
//! single-quoted strings (with `''` escaping), double-quoted identifiers,
//! and dollar-quoted blocks (`$tag$...$tag$`, tag body restricted to
//! `[A-Za-z0-9_]*`). Backslash is never treated as an escape character.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Top,
    SingleQuoted,
    DoubleQuoted,
    DollarQuoted,
}

/// Splits `sql` into individual statements on top-level semicolons.
/// Empty statements (pure whitespace) are dropped.
#[must_use]
pub fn split_statements(sql: &str) -> Vec<String> {
    let chars: Vec<char> = sql.chars().collect();
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut state = State::Top;
    let mut dollar_tag: String = String::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match state {
            State::Top => match c {
                '\'' => {
                    state = State::SingleQuoted;
                    current.push(c);
                }
                '"' => {
                    state = State::DoubleQuoted;
                    current.push(c);
                }
                '$' => {
                    if let Some((tag, consumed)) = match_dollar_tag(&chars, i) {
                        dollar_tag = tag;
                        state = State::DollarQuoted;
                        current.push_str(&chars[i..i + consumed].iter().collect::<String>());
                        i += consumed;
                        continue;
                    }
                    current.push(c);
                }
                ';' => {
                    let trimmed = current.trim();
                    if !trimmed.is_empty() {
                        statements.push(trimmed.to_string());
                    }
                    current.clear();
                }
                _ => current.push(c),
            },
            State::SingleQuoted => {
                current.push(c);
                if c == '\'' {
                    // `''` is an escaped quote, not the closing delimiter.
                    if chars.get(i + 1) == Some(&'\'') {
                        current.push('\'');
                        i += 1;
                    } else {
                        state = State::Top;
                    }
                }
            }
            State::DoubleQuoted => {
                current.push(c);
                if c == '"' {
                    state = State::Top;
                }
            }
            State::DollarQuoted => {
                if c == '$' {
                    if let Some(end_tag) = chars[i..].iter().collect::<String>().strip_prefix('$')
                    {
                        let closing = format!("${dollar_tag}$");
                        let rest: String = chars[i..].iter().collect();
                        if rest.starts_with(&closing) {
                            current.push_str(&closing);
                            i += closing.len();
                            state = State::Top;
                            continue;
                        }
                        let _ = end_tag;
                    }
                }
                current.push(c);
            }
        }
        i += 1;
    }

    let trimmed = current.trim();
    if !trimmed.is_empty() {
        statements.push(trimmed.to_string());
    }

    statements
}

/// Attempts to match a dollar-quote opening tag `$tag$` starting at `start`.
/// Returns the tag body and the number of characters consumed by the
/// opening delimiter, or `None` if this isn't a valid dollar-quote open.
fn match_dollar_tag(chars: &[char], start: usize) -> Option<(String, usize)> {
    debug_assert_eq!(chars[start], '$');
    let mut j = start + 1;
    let mut tag = String::new();
    while j < chars.len() && chars[j] != '$' {
        let c = chars[j];
        if c.is_ascii_alphanumeric() || c == '_' {
            tag.push(c);
            j += 1;
        } else {
            return None;
        }
    }
    if j < chars.len() && chars[j] == '$' {
        Some((tag, j - start + 1))
    } else {
        None
    }
}
