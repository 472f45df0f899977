//! Boolean expression tree for normalized decisions
//!
//! A normalized decision is parsed once into `Expr`. Leaves hold the atom
//! text; `bind` swaps that text for condition ids so a truth-table row can be
//! evaluated by structural recursion instead of string substitution.
//!
//! Grammar (lowest precedence first):
//!
//! ```text
//! or      := and ("OR" and)*
//! and     := unary ("AND" unary)*
//! unary   := "NOT" unary | primary
//! primary := "(" or ")" | atom
//! ```
//!
//! A parenthesis that does not close a boolean group, e.g. `(x + 1) > 2` or
//! `f(a, b)`, is treated as part of the atom.

use super::types::Condition;
use std::collections::{BTreeMap, HashMap, VecDeque};
use thiserror::Error;

/// Parse or evaluation failure for one decision
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExprError {
    #[error("unexpected end of expression")]
    UnexpectedEnd,

    #[error("unexpected input at byte {pos}: '{found}'")]
    UnexpectedToken { pos: usize, found: String },

    #[error("unbalanced parentheses")]
    UnbalancedParens,

    #[error("operand '{0}' does not match any extracted condition")]
    UnboundAtom(String),

    #[error("no value supplied for condition {0}")]
    MissingValue(String),
}

/// Boolean expression tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Atom(String),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

impl Expr {
    /// Parse a normalized expression
    pub fn parse(normalized: &str) -> Result<Expr, ExprError> {
        let mut parser = Parser {
            src: normalized,
            pos: 0,
        };
        let expr = parser.parse_or()?;
        parser.skip_ws();
        if parser.pos < parser.src.len() {
            return Err(parser.unexpected());
        }
        Ok(expr)
    }

    /// Leaf texts in left-to-right order
    pub fn atoms(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_atoms(&mut out);
        out
    }

    fn collect_atoms<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::Atom(text) => out.push(text),
            Expr::Not(inner) => inner.collect_atoms(out),
            Expr::And(l, r) | Expr::Or(l, r) => {
                l.collect_atoms(out);
                r.collect_atoms(out);
            }
        }
    }

    /// Replace atom text with condition ids
    ///
    /// The k-th occurrence of a text binds to the k-th condition carrying
    /// that text, so duplicated sub-expressions stay distinct.
    pub fn bind(self, conditions: &[Condition]) -> Result<Expr, ExprError> {
        let mut by_text: HashMap<&str, VecDeque<&str>> = HashMap::new();
        for c in conditions {
            by_text
                .entry(c.expression.as_str())
                .or_default()
                .push_back(c.id.as_str());
        }
        self.bind_with(&mut by_text)
    }

    fn bind_with(self, by_text: &mut HashMap<&str, VecDeque<&str>>) -> Result<Expr, ExprError> {
        Ok(match self {
            Expr::Atom(text) => {
                let id = by_text
                    .get_mut(text.as_str())
                    .and_then(|ids| ids.pop_front())
                    .ok_or_else(|| ExprError::UnboundAtom(text.clone()))?;
                Expr::Atom(id.to_string())
            }
            Expr::Not(inner) => Expr::Not(Box::new(inner.bind_with(by_text)?)),
            Expr::And(l, r) => Expr::And(
                Box::new(l.bind_with(by_text)?),
                Box::new(r.bind_with(by_text)?),
            ),
            Expr::Or(l, r) => Expr::Or(
                Box::new(l.bind_with(by_text)?),
                Box::new(r.bind_with(by_text)?),
            ),
        })
    }

    /// Evaluate a bound expression against condition values
    pub fn evaluate(&self, values: &BTreeMap<String, bool>) -> Result<bool, ExprError> {
        match self {
            Expr::Atom(id) => values
                .get(id)
                .copied()
                .ok_or_else(|| ExprError::MissingValue(id.clone())),
            Expr::Not(inner) => Ok(!inner.evaluate(values)?),
            Expr::And(l, r) => Ok(l.evaluate(values)? & r.evaluate(values)?),
            Expr::Or(l, r) => Ok(l.evaluate(values)? | r.evaluate(values)?),
        }
    }
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn parse_or(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_and()?;
        while self.eat_keyword("OR") {
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_unary()?;
        while self.eat_keyword("AND") {
            let right = self.parse_unary()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ExprError> {
        if self.eat_keyword("NOT") {
            return Ok(Expr::Not(Box::new(self.parse_unary()?)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, ExprError> {
        self.skip_ws();
        if self.rest().starts_with('(') {
            let save = self.pos;
            self.pos += 1;
            if let Ok(inner) = self.parse_or() {
                self.skip_ws();
                if self.rest().starts_with(')') {
                    self.pos += 1;
                    if self.at_operand_end() {
                        return Ok(inner);
                    }
                }
            }
            // Not a boolean group; reread it as part of an atom
            self.pos = save;
        }
        self.parse_atom()
    }

    fn parse_atom(&mut self) -> Result<Expr, ExprError> {
        self.skip_ws();
        let start = self.pos;
        let mut depth = 0usize;
        let mut end = self.src.len();

        for (offset, c) in self.src[start..].char_indices() {
            let i = start + offset;
            match c {
                '(' => depth += 1,
                ')' if depth == 0 => {
                    end = i;
                    break;
                }
                ')' => depth -= 1,
                ' ' if depth == 0 && self.keyword_at(i + 1, "AND") => {
                    end = i;
                    break;
                }
                ' ' if depth == 0 && self.keyword_at(i + 1, "OR") => {
                    end = i;
                    break;
                }
                _ => {}
            }
        }

        if depth > 0 {
            return Err(ExprError::UnbalancedParens);
        }

        self.pos = end;
        let text = self.src[start..end].trim();
        if text.is_empty() {
            return Err(if end >= self.src.len() {
                ExprError::UnexpectedEnd
            } else {
                self.unexpected()
            });
        }
        Ok(Expr::Atom(text.to_string()))
    }

    fn eat_keyword(&mut self, kw: &str) -> bool {
        self.skip_ws();
        if self.keyword_at(self.pos, kw) {
            self.pos += kw.len();
            true
        } else {
            false
        }
    }

    /// `kw` starts at `i` and is followed by a space, `(`, or the end
    fn keyword_at(&self, i: usize, kw: &str) -> bool {
        let Some(rest) = self.src.get(i..) else {
            return false;
        };
        if !rest.starts_with(kw) {
            return false;
        }
        match rest[kw.len()..].chars().next() {
            None => true,
            Some(c) => c == ' ' || c == '(',
        }
    }

    fn at_operand_end(&mut self) -> bool {
        self.skip_ws();
        self.pos >= self.src.len()
            || self.rest().starts_with(')')
            || self.keyword_at(self.pos, "AND")
            || self.keyword_at(self.pos, "OR")
    }

    fn skip_ws(&mut self) {
        while self.rest().starts_with(' ') {
            self.pos += 1;
        }
    }

    fn rest(&self) -> &'a str {
        let src: &'a str = self.src;
        &src[self.pos..]
    }

    fn unexpected(&self) -> ExprError {
        ExprError::UnexpectedToken {
            pos: self.pos,
            found: self.rest().chars().take(16).collect(),
        }
    }
}
