//! Mandatory SQL-injection heuristics (spec §4.2, §8).
//!
//! Reproduced exactly, including the single-quote proximity check's known
//! false positives on legitimate apostrophe-bearing input near `OR`/`AND` —
//! see the open question recorded in `SPEC_FULL.md`.

use regex::Regex;

const RESERVED_KEYWORDS: &[&str] = &[
    "SELECT", "INSERT", "UPDATE", "DELETE", "DROP", "TRUNCATE", "ALTER", "CREATE", "TABLE",
    "UNION", "EXEC", "EXECUTE", "SCRIPT", "DECLARE", "CAST", "CONVERT",
];

const DANGEROUS_PATTERNS: &[&str] = &[
    "';", "--", "/*", "*/", "xp_", "sp_", " OR 1=1", " OR '1'='1", "AND 1=1", "1=1", "1=2",
];

fn keyword_regex() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| {
        let alternation = RESERVED_KEYWORDS.join("|");
        Regex::new(&format!(r"(?i)\b(?:{alternation})\b")).expect("valid regex")
    })
}

/// `SELECT`, `INSERT`, ... matched as whole words, case-insensitive.
fn has_reserved_keyword(value: &str) -> bool {
    keyword_regex().is_match(value)
}

/// Any of the dangerous substrings/patterns, case-insensitively for the
/// space-prefixed keyword patterns.
fn has_dangerous_pattern(value: &str) -> bool {
    let upper = value.to_ascii_uppercase();
    DANGEROUS_PATTERNS.iter().any(|p| upper.contains(&p.to_ascii_uppercase()))
}

/// A single quote within two characters of `OR`/`AND`/`;`/`=`.
fn has_quote_near_operator(value: &str) -> bool {
    let bytes = value.as_bytes();
    let upper = value.to_ascii_uppercase();
    let upper_bytes = upper.as_bytes();

    for (i, &b) in bytes.iter().enumerate() {
        if b != b'\'' {
            continue;
        }
        let start = i.saturating_sub(2);
        let end = (i + 3).min(bytes.len());
        let window = &upper_bytes[start..end];
        let window_str = std::str::from_utf8(window).unwrap_or_default();
        if window_str.contains("OR")
            || window_str.contains("AND")
            || window_str.contains(';')
            || window_str.contains('=')
        {
            return true;
        }
    }
    false
}

/// Returns `Some("Potential SQL injection detected")` iff `value` trips any
/// of the heuristics in spec §4.2; `None` otherwise.
#[must_use]
pub fn check_sql_injection(value: &str) -> Option<String> {
    if has_reserved_keyword(value) || has_dangerous_pattern(value) || has_quote_near_operator(value) {
        Some("Potential SQL injection detected".to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_word_keyword_is_flagged() {
        assert!(check_sql_injection("1; SELECT * FROM users").is_some());
        assert!(check_sql_injection("DROP TABLE customers").is_some());
    }

    #[test]
    fn substring_updated_is_not_flagged_as_keyword() {
        assert!(check_sql_injection("UPDATED").is_none());
        assert!(check_sql_injection("last_UPDATED_at").is_none());
    }

    #[test]
    fn dangerous_patterns_are_flagged() {
        assert!(check_sql_injection("a'; DROP").is_some());
        assert!(check_sql_injection("value -- comment").is_some());
        assert!(check_sql_injection("/* block */").is_some());
        assert!(check_sql_injection("xp_cmdshell").is_some());
        assert!(check_sql_injection("1=1").is_some());
        assert!(check_sql_injection("1=2").is_some());
    }

    #[test]
    fn quote_near_operator_is_flagged() {
        assert!(check_sql_injection("x' OR 'y").is_some());
        assert!(check_sql_injection("admin' --").is_some());
    }

    #[test]
    fn benign_string_passes() {
        assert!(check_sql_injection("Jane Doe").is_none());
        assert!(check_sql_injection("a normal sentence with words").is_none());
    }
}
