//! Decision extraction from source code via tree-sitter
//!
//! Walks the syntax tree of a source file and collects branch conditions
//! (`if`, `elif`/`else if`, `while`, `do..while`, ternaries, Rust match
//! guards). Each condition is handed to an injected `McdcAnalyzer`.
//!
//! Supports: Rust, TypeScript/JavaScript, Python, Go, C#, Java

mod csharp;
mod go;
mod java;
mod python;
mod rust;
mod typescript;

use crate::error::{Error, Result};
use crate::mcdc::{McdcAnalyzer, McdcResult};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::{debug, warn};
use tree_sitter::{Node, Parser};

/// Source languages with decision extraction support
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Rust,
    TypeScript,
    Python,
    Go,
    CSharp,
    Java,
}

impl Language {
    fn grammar(&self) -> &'static Grammar {
        match self {
            Language::Rust => &rust::GRAMMAR,
            Language::TypeScript => &typescript::GRAMMAR,
            Language::Python => &python::GRAMMAR,
            Language::Go => &go::GRAMMAR,
            Language::CSharp => &csharp::GRAMMAR,
            Language::Java => &java::GRAMMAR,
        }
    }

    fn ts_language(&self) -> tree_sitter::Language {
        match self {
            Language::Rust => rust::language(),
            Language::TypeScript => typescript::language(),
            Language::Python => python::language(),
            Language::Go => go::language(),
            Language::CSharp => csharp::language(),
            Language::Java => java::language(),
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Language::Rust => "rust",
            Language::TypeScript => "typescript",
            Language::Python => "python",
            Language::Go => "go",
            Language::CSharp => "csharp",
            Language::Java => "java",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for Language {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "rust" | "rs" => Ok(Language::Rust),
            "typescript" | "ts" | "tsx" | "javascript" | "js" | "jsx" => Ok(Language::TypeScript),
            "python" | "py" => Ok(Language::Python),
            "go" | "golang" => Ok(Language::Go),
            "csharp" | "cs" | "c#" => Ok(Language::CSharp),
            "java" => Ok(Language::Java),
            other => Err(Error::UnsupportedLanguage(other.to_string())),
        }
    }
}

/// Detect language from file extension
pub fn detect_language(path: &str) -> Option<Language> {
    let ext = path.rsplit('.').next().unwrap_or("");
    match ext {
        "rs" => Some(Language::Rust),
        "ts" | "tsx" | "js" | "jsx" | "mjs" | "cjs" => Some(Language::TypeScript),
        "py" => Some(Language::Python),
        "go" => Some(Language::Go),
        "cs" => Some(Language::CSharp),
        "java" => Some(Language::Java),
        _ => None,
    }
}

/// Which syntax nodes carry a decision, per language
pub(crate) struct Grammar {
    /// Node kinds whose `condition` field is a decision
    pub condition_fields: &'static [&'static str],
    /// Node kinds whose n-th named child is the condition
    pub positional: &'static [(&'static str, usize)],
    /// Condition node kinds that are pattern matches, not boolean decisions
    pub skip: &'static [&'static str],
}

/// A raw decision expression found in source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionSite {
    pub expression: String,
    /// 1-based
    pub line_number: usize,
    /// Syntax node kind the decision belongs to (e.g. `if_statement`)
    pub kind: String,
}

/// Collect decision expressions from source, in source order
pub fn extract_decisions(source: &str, language: Language) -> Result<Vec<DecisionSite>> {
    let mut parser = Parser::new();
    parser
        .set_language(&language.ts_language())
        .map_err(|e| Error::CodeParse(format!("Failed to set language: {}", e)))?;

    let tree = parser
        .parse(source, None)
        .ok_or_else(|| Error::CodeParse("Failed to parse source".into()))?;

    let root = tree.root_node();
    if root.has_error() {
        warn!(%language, "source has syntax errors; extracting decisions from recovered tree");
    }

    let mut visitor = DecisionVisitor {
        grammar: language.grammar(),
        source,
        sites: Vec::new(),
    };
    visitor.walk(root);
    Ok(visitor.sites)
}

/// Analyze every decision in a file with a default analyzer
pub fn analyze_file(file_path: &str, code: &str, language: Language) -> Result<Vec<McdcResult>> {
    analyze_file_with(&McdcAnalyzer::new(), file_path, code, language)
}

/// Analyze every decision in a file with the given analyzer
///
/// A malformed decision never aborts the batch; its problems are carried in
/// that result's warnings.
pub fn analyze_file_with(
    analyzer: &McdcAnalyzer,
    file_path: &str,
    code: &str,
    language: Language,
) -> Result<Vec<McdcResult>> {
    let sites = extract_decisions(code, language)?;
    debug!(file = file_path, decisions = sites.len(), "extracted decisions");

    Ok(sites
        .iter()
        .map(|site| analyzer.analyze(&site.expression, file_path, site.line_number))
        .collect())
}

struct DecisionVisitor<'a> {
    grammar: &'static Grammar,
    source: &'a str,
    sites: Vec<DecisionSite>,
}

impl<'a> DecisionVisitor<'a> {
    /// Pre-order walk with an explicit stack; deep trees stay off the call stack
    fn walk(&mut self, root: Node<'_>) {
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            self.visit(node);

            let mut cursor = node.walk();
            let children: Vec<Node> = node.children(&mut cursor).collect();
            stack.extend(children.into_iter().rev());
        }
    }

    fn visit(&mut self, node: Node<'_>) {
        let kind = node.kind();
        let condition = if self.grammar.condition_fields.contains(&kind) {
            node.child_by_field_name("condition")
        } else if let Some((_, index)) = self.grammar.positional.iter().find(|(k, _)| *k == kind) {
            let mut cursor = node.walk();
            let nth = node.named_children(&mut cursor).nth(*index);
            nth
        } else {
            None
        };

        let Some(condition) = condition else {
            return;
        };
        if self.grammar.skip.contains(&condition.kind()) {
            return;
        }

        let condition = unwrap_parens(condition);
        let text = condition
            .utf8_text(self.source.as_bytes())
            .unwrap_or("")
            .trim();
        if text.is_empty() {
            return;
        }

        self.sites.push(DecisionSite {
            expression: text.to_string(),
            line_number: condition.start_position().row + 1,
            kind: kind.to_string(),
        });
    }
}

/// `(cond)` as the whole condition node → `cond`
fn unwrap_parens(node: Node<'_>) -> Node<'_> {
    if node.kind() == "parenthesized_expression" && node.named_child_count() == 1 {
        let mut cursor = node.walk();
        let inner = node.named_children(&mut cursor).next();
        if let Some(inner) = inner {
            return inner;
        }
    }
    node
}
