//! TypeScript/JavaScript decisions: `if`, loops, ternaries

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
    tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()
}

#[cfg(test)]
mod tests {
    use crate::parse::{extract_decisions, Language};

    #[test]
    fn test_typescript_decisions() {
        let source = r#"
function route(user: User, flags: Flags): string {
  if (user.isAdmin && !flags.readOnly) {
    return "admin";
  }
  const mode = flags.beta || user.tester ? "beta" : "stable";
  return mode;
}
"#;
        let sites = extract_decisions(source, Language::TypeScript).unwrap();
        let exprs: Vec<&str> = sites.iter().map(|s| s.expression.as_str()).collect();
        assert_eq!(exprs, vec!["user.isAdmin && !flags.readOnly", "flags.beta || user.tester"]);
    }
}
