//! Naming helpers: camel-casing and SQL identifier checks.

use std::sync::OnceLock;

use regex::Regex;

const IDENTIFIER_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_$]*$";

fn identifier_regex() -> Option<&'static Regex> {
    static REGEX: OnceLock<Option<Regex>> = OnceLock::new();
    REGEX
        .get_or_init(|| match Regex::new(IDENTIFIER_PATTERN) {
            Ok(regex) => Some(regex),
            Err(e) => {
                tracing::warn!(pattern = IDENTIFIER_PATTERN, error = %e, "Invalid identifier pattern");
                None
            }
        })
        .as_ref()
}

/// Whether `name` is a plain SQL identifier (table, database or column).
pub fn is_valid_identifier(name: &str) -> bool {
    identifier_regex().is_some_and(|regex| regex.is_match(name))
}

/// Convert a snake-case name to camel case.
///
/// `member_id` becomes `memberId`; names that are already camel-cased keep
/// their inner capitals, only the first character is lowered.
pub fn to_camel(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = false;
    for ch in name.chars() {
        if ch == '_' {
            upper_next = !out.is_empty();
            continue;
        }
        if out.is_empty() {
            out.extend(ch.to_lowercase());
        } else if upper_next {
            out.extend(ch.to_uppercase());
        } else {
            out.push(ch);
        }
        upper_next = false;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_camel() {
        assert_eq!(to_camel("member_id"), "memberId");
        assert_eq!(to_camel("create_time"), "createTime");
        assert_eq!(to_camel("memberId"), "memberId");
        assert_eq!(to_camel("Title"), "title");
        assert_eq!(to_camel("_private_field"), "privateField");
        assert_eq!(to_camel("id"), "id");
    }

    #[test]
    fn test_identifiers() {
        assert!(is_valid_identifier("tb_article"));
        assert!(is_valid_identifier("_x1"));
        assert!(is_valid_identifier("a$b"));
        assert!(!is_valid_identifier("1abc"));
        assert!(!is_valid_identifier("drop table"));
        assert!(!is_valid_identifier("a.b"));
        assert!(!is_valid_identifier(""));
    }
}
