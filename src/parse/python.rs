//! Python decisions: `if`, `elif`, `while`, conditional expressions

use super::Grammar;

pub(super) static GRAMMAR: Grammar = Grammar {
    condition_fields: &["if_statement", "elif_clause", "while_statement"],
    // `body if condition else alternative`
    positional: &[("conditional_expression", 1)],
    skip: &[],
};

pub(super) fn language() -> tree_sitter::Language {
    tree_sitter_python::LANGUAGE.into()
}
