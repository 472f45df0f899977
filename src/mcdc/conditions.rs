//! Condition extraction from normalized decisions
//!
//! Two modes:
//! - `Flat` splits on every `AND`/`OR` token regardless of nesting, then
//!   strips a leading `NOT` and unmatched outer parentheses from each
//!   fragment. `(A or B) and C` gives `A`, `B`, `C`; `f(a and b)` gives
//!   `f(a` and `b)` cleaned to `f(a` and `b`.
//! - `Structured` uses the expression tree; each leaf is one condition, so
//!   parentheses inside calls and arithmetic stay intact.

use super::expr::Expr;
use super::types::Condition;
use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// How a normalized decision is split into conditions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMode {
    /// Split on every `AND`/`OR` token, ignoring parentheses
    #[default]
    Flat,
    /// Parenthesis-aware; one condition per expression-tree leaf
    Structured,
}

/// Conditions plus any parse warnings raised while extracting them
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub conditions: Vec<Condition>,
    pub warnings: Vec<String>,
}

/// Extract ordered conditions `C1..Cn` from a normalized expression
pub fn extract_conditions(normalized: &str, mode: ExtractionMode) -> Extraction {
    match mode {
        ExtractionMode::Flat => extract_flat(normalized),
        ExtractionMode::Structured => match Expr::parse(normalized) {
            Ok(expr) => Extraction {
                conditions: number(expr.atoms().into_iter().map(str::to_string)),
                warnings: vec![],
            },
            Err(e) => {
                let mut extraction = extract_flat(normalized);
                extraction.warnings.insert(
                    0,
                    format!("structured parse failed ({}); fell back to flat split", e),
                );
                extraction
            }
        },
    }
}

fn extract_flat(normalized: &str) -> Extraction {
    let mut fragments = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for token in normalized.split(' ') {
        if token == "AND" || token == "OR" {
            fragments.push(current.join(" "));
            current.clear();
        } else {
            current.push(token);
        }
    }
    fragments.push(current.join(" "));

    let mut warnings = Vec::new();
    let mut texts = Vec::new();
    for (i, fragment) in fragments.iter().enumerate() {
        let cleaned = clean_fragment(fragment);
        if cleaned.is_empty() {
            warnings.push(format!("empty operand at position {}", i + 1));
        } else {
            texts.push(cleaned);
        }
    }

    Extraction {
        conditions: number(texts.into_iter()),
        warnings,
    }
}

fn number(texts: impl Iterator<Item = String>) -> Vec<Condition> {
    texts
        .enumerate()
        .map(|(i, expression)| Condition {
            id: format!("C{}", i + 1),
            variable_name: variable_name(&expression),
            expression,
        })
        .collect()
}

/// Strip leading `NOT`s, enclosing parentheses and unmatched edge parentheses
pub(crate) fn clean_fragment(fragment: &str) -> String {
    let mut s = fragment.trim();
    loop {
        let before = s;

        if let Some(rest) = s.strip_prefix("NOT") {
            if rest.is_empty() || rest.starts_with(' ') || rest.starts_with('(') {
                s = rest.trim();
            }
        }

        let opens = s.matches('(').count();
        let closes = s.matches(')').count();
        if s.starts_with('(') && s.ends_with(')') && encloses(s) {
            s = s[1..s.len() - 1].trim();
        } else if opens > closes && s.starts_with('(') {
            s = s[1..].trim();
        } else if closes > opens && s.ends_with(')') {
            s = s[..s.len() - 1].trim();
        }

        if s == before {
            return s.to_string();
        }
    }
}

/// The opening parenthesis at 0 closes at the last byte
fn encloses(s: &str) -> bool {
    let mut depth = 0i32;
    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return i == s.len() - 1;
                }
            }
            _ => {}
        }
    }
    false
}

fn variable_name(expression: &str) -> Option<String> {
    static IDENT: OnceLock<Regex> = OnceLock::new();
    let re = IDENT.get_or_init(|| Regex::new(r"[a-zA-Z_]\w*").expect("identifier regex is valid"));
    re.find(expression).map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn texts(normalized: &str, mode: ExtractionMode) -> Vec<String> {
        extract_conditions(normalized, mode)
            .conditions
            .into_iter()
            .map(|c| c.expression)
            .collect()
    }

    #[rstest]
    #[case("a AND b", &["a", "b"])]
    #[case("(a OR b) AND c", &["a", "b", "c"])]
    #[case("NOT (a OR b)", &["a", "b"])]
    #[case("x > 5 AND NOT y", &["x > 5", "y"])]
    #[case("is_valid(x) OR y", &["is_valid(x)", "y"])]
    #[case("(x + 1) > 2 AND y", &["(x + 1) > 2", "y"])]
    #[case("((a)) OR (NOT b)", &["a", "b"])]
    #[case("a AND a", &["a", "a"])]
    fn test_flat_extraction(#[case] normalized: &str, #[case] expected: &[&str]) {
        assert_eq!(texts(normalized, ExtractionMode::Flat), expected);
    }

    #[test]
    fn test_flat_split_ignores_nesting() {
        assert_eq!(
            texts("f(a AND b) OR c", ExtractionMode::Flat),
            vec!["f(a", "b", "c"]
        );
    }

    #[test]
    fn test_structured_keeps_call_arguments() {
        assert_eq!(
            texts("f(a AND b) OR c", ExtractionMode::Structured),
            vec!["f(a AND b)", "c"]
        );
        assert_eq!(
            texts("(a OR b) AND c", ExtractionMode::Structured),
            vec!["a", "b", "c"]
        );
    }

    #[test]
    fn test_ids_and_variable_names() {
        let extraction = extract_conditions("user.age >= 18 AND NOT 42", ExtractionMode::Flat);
        let c = &extraction.conditions;
        assert_eq!(c[0].id, "C1");
        assert_eq!(c[0].variable_name.as_deref(), Some("user"));
        assert_eq!(c[1].id, "C2");
        assert_eq!(c[1].expression, "42");
        assert_eq!(c[1].variable_name, None);
    }

    #[test]
    fn test_empty_operand_warns() {
        let extraction = extract_conditions("a AND", ExtractionMode::Flat);
        assert_eq!(extraction.conditions.len(), 1);
        assert_eq!(extraction.warnings.len(), 1);
    }

    #[test]
    fn test_structured_falls_back_on_parse_error() {
        let extraction = extract_conditions("(a AND b", ExtractionMode::Structured);
        assert_eq!(extraction.conditions.len(), 2);
        assert!(extraction.warnings[0].contains("fell back"));
    }
}
