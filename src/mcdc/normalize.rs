//! Decision normalization
//!
//! Rewrites `&&`/`||`/`!` and `and`/`or`/`not` into the canonical `AND`,
//! `OR`, `NOT` tokens and collapses whitespace.
//!
//! This is substring substitution, not tokenization. Whitespace is collapsed
//! first, so newlines and tabs count as spaces. Word operators are only
//! recognized when surrounded by whitespace, so `not(x)` and `(not x)` are left
//! alone. Identifiers must not be spelled `and`/`or`/`not` on their own.
//! `!=` is preserved.

/// Normalize a raw decision expression
pub fn normalize_expression(raw: &str) -> String {
    let collapsed = collapse_whitespace(raw);
    // Two-character operators first so `!` never sees half of them
    let symbolic = collapsed.replace("&&", " AND ").replace("||", " OR ");
    let symbolic = replace_bang(&symbolic);

    let mut padded = format!(" {} ", symbolic);
    for (word, token) in [(" and ", " AND "), (" or ", " OR "), (" not ", " NOT ")] {
        // Adjacent matches share a space, so repeat until stable
        loop {
            let next = padded.replace(word, token);
            if next == padded {
                break;
            }
            padded = next;
        }
    }

    collapse_whitespace(&padded)
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn replace_bang(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 8);
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '!' && chars.peek() != Some(&'=') {
            out.push_str(" NOT ");
        } else {
            out.push(c);
        }
    }
    out
}

/// Whether the normalized expression contains the given token as a word
pub(crate) fn has_token(normalized: &str, token: &str) -> bool {
    normalized
        .split(|c: char| c.is_whitespace() || c == '(' || c == ')')
        .any(|t| t == token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("a && b", "a AND b")]
    #[case("a || b", "a OR b")]
    #[case("!a", "NOT a")]
    #[case("a and b", "a AND b")]
    #[case("a or not b", "a OR NOT b")]
    #[case("not a and b", "NOT a AND b")]
    #[case("not not a", "NOT NOT a")]
    #[case("x != 3 && !y", "x != 3 AND NOT y")]
    #[case("(a&&b)||!(c)", "(a AND b) OR NOT (c)")]
    #[case("  a   and\n  b  ", "a AND b")]
    #[case("a AND b", "a AND b")]
    #[case("a\tor\tb", "a OR b")]
    #[case("(user.active and\n        not user.locked)", "(user.active AND NOT user.locked)")]
    fn test_normalize(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(normalize_expression(raw), expected);
    }

    #[test]
    fn test_word_inside_identifier_untouched() {
        assert_eq!(normalize_expression("brand and order"), "brand AND order");
        assert_eq!(normalize_expression("android"), "android");
    }

    #[test]
    fn test_unbalanced_parens_pass_through() {
        assert_eq!(normalize_expression("(a && b"), "(a AND b");
    }

    #[test]
    fn test_has_token() {
        assert!(has_token("NOT (a)", "NOT"));
        assert!(has_token("(a AND b)", "AND"));
        assert!(!has_token("ANDROID", "AND"));
    }
}
