//! Rust decisions: `if`, `while`, match guards
//!
//! `if let` / `while let` conditions are pattern matches and are skipped.

use super::Grammar;

pub(super) static GRAMMAR: Grammar = Grammar {
    condition_fields: &["if_expression", "while_expression", "match_pattern"],
    positional: &[],
    skip: &["let_condition", "let_chain"],
};

pub(super) fn language() -> tree_sitter::Language {
    tree_sitter_rust::LANGUAGE.into()
}
