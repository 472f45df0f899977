//! C# decisions: `if`, loops, conditional expressions

use super::Grammar;

pub(super) static GRAMMAR: Grammar = Grammar {
    condition_fields: &[
        "if_statement",
        "while_statement",
        "do_statement",
        "conditional_expression",
    ],
    positional: &[],
    skip: &[],
};

pub(super) fn language() -> tree_sitter::Language {
    tree_sitter_c_sharp::LANGUAGE.into()
}
