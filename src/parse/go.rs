//! Go decisions: `if`

use super::Grammar;

pub(super) static GRAMMAR: Grammar = Grammar {
    condition_fields: &["if_statement"],
    positional: &[],
    skip: &[],
};

pub(super) fn language() -> tree_sitter::Language {
    tree_sitter_go::LANGUAGE.into()
}

#[cfg(test)]
mod tests {
    use crate::parse::{extract_decisions, Language};

    #[test]
    fn test_go_decisions() {
        let source = r#"
package main

func allowed(a bool, b bool) bool {
	if a && (b || !a) {
		return true
	}
	return false
}
"#;
        let sites = extract_decisions(source, Language::Go).unwrap();
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].expression, "a && (b || !a)");
        assert_eq!(sites[0].line_number, 5);
    }
}
