//! Java decisions: `if`, loops, ternaries

use super::Grammar;

pub(super) static GRAMMAR: Grammar = Grammar {
    condition_fields: &[
        "if_statement",
        "while_statement",
        "do_statement",
        "ternary_expression",
    ],
    positional: &[],
    skip: &[],
};

pub(super) fn language() -> tree_sitter::Language {
    tree_sitter_java::LANGUAGE.into()
}

#[cfg(test)]
mod tests {
    use crate::parse::{extract_decisions, Language};

    #[test]
    fn test_java_decisions() {
        let source = r#"
class Gate {
    int check(boolean a, boolean b) {
        if (a || b) {
            return 1;
        }
        return a && b ? 2 : 3;
    }
}
"#;
        let sites = extract_decisions(source, Language::Java).unwrap();
        let exprs: Vec<&str> = sites.iter().map(|s| s.expression.as_str()).collect();
        assert_eq!(exprs, vec!["a || b", "a && b"]);
    }
}
