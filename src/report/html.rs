//! HTML report tree and rendering
//!
//! The report is built as plain data (sections of paragraphs, key/value
//! lists and tables) so hosts can render it themselves. `render` uses the
//! embedded MiniJinja template with HTML auto-escaping.

use crate::error::{Error, Result};
use minijinja::{context, AutoEscape, Environment};
use serde::Serialize;
use std::sync::OnceLock;

const REPORT_TEMPLATE: &str = include_str!("../../templates/report.html.jinja");
const REPORT_TEMPLATE_NAME: &str = "report.html";

/// Renderable HTML report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HtmlReport {
    pub title: String,
    pub status: String,
    pub passed: bool,
    pub sections: Vec<HtmlSection>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HtmlSection {
    pub heading: String,
    pub blocks: Vec<HtmlBlock>,
}

impl HtmlSection {
    pub fn new(heading: impl Into<String>, blocks: Vec<HtmlBlock>) -> Self {
        Self {
            heading: heading.into(),
            blocks,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HtmlBlock {
    Paragraph {
        text: String,
    },
    KeyValues {
        rows: Vec<(String, String)>,
    },
    Table {
        headers: Vec<String>,
        rows: Vec<Vec<String>>,
    },
}

impl HtmlReport {
    pub fn section(&self, heading: &str) -> Option<&HtmlSection> {
        self.sections.iter().find(|s| s.heading == heading)
    }

    /// Render a standalone HTML document
    pub fn render(&self) -> Result<String> {
        let env = engine()?;
        let template = env
            .get_template(REPORT_TEMPLATE_NAME)
            .map_err(|e| Error::Report(e.to_string()))?;
        template
            .render(context! { report => self })
            .map_err(|e| Error::Report(e.to_string()))
    }
}

static ENGINE: OnceLock<std::result::Result<Environment<'static>, String>> = OnceLock::new();

fn init_engine() -> std::result::Result<Environment<'static>, String> {
    let mut env = Environment::new();
    env.set_auto_escape_callback(|_| AutoEscape::Html);
    env.add_filter("row_class", row_class);
    env.add_template(REPORT_TEMPLATE_NAME, REPORT_TEMPLATE)
        .map_err(|e| format!("failed to load report template: {}", e))?;
    Ok(env)
}

fn engine() -> Result<&'static Environment<'static>> {
    ENGINE
        .get_or_init(init_engine)
        .as_ref()
        .map_err(|e| Error::Report(e.clone()))
}

/// CSS class for a table row, keyed on its first cell
fn row_class(first_cell: &str) -> String {
    match first_cell {
        "CRITICAL" => "critical",
        "HIGH" => "high",
        "MEDIUM" => "medium",
        "LOW" => "low",
        _ => "",
    }
    .to_string()
}
