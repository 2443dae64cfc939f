//! Output formatting utilities
//!
//! stdout carries exactly one JSON document per invocation, the result or
//! the error report. Human-facing hints go to stderr.

use crate::error::{CliError, Result};
use console::style;
use serde::Serialize;
use serde_json::{json, Value};

/// JSON printer for command results
#[derive(Debug, Clone, Copy, Default)]
pub struct Output {
    pretty: bool,
}

impl Output {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    pub fn render<T: Serialize>(&self, data: &T) -> Result<String> {
        let rendered = if self.pretty {
            serde_json::to_string_pretty(data)?
        } else {
            serde_json::to_string(data)?
        };
        Ok(rendered)
    }

    /// Output data as JSON
    pub fn print<T: Serialize>(&self, data: &T) -> Result<()> {
        println!("{}", self.render(data)?);
        Ok(())
    }

    /// Print the structured error report for `err`
    pub fn print_error(&self, err: &CliError) {
        let report = error_report(err);
        let rendered = self
            .render(&report)
            .unwrap_or_else(|_| report.to_string());
        println!("{rendered}");
    }
}

/// `{"error": {"code", "message", "details"}}`
pub fn error_report(err: &CliError) -> Value {
    json!({
        "error": {
            "code": err.code(),
            "message": err.to_string(),
            "details": err.details(),
        }
    })
}

/// Print an informational message to stderr
pub fn print_info(message: &str) {
    eprintln!("{} {}", style("ℹ").blue(), message);
}

/// Print a link/URL with label to stderr
pub fn print_link(label: &str, url: &str) {
    eprintln!("{} {}: {}", style("→").cyan(), label, style(url).dim());
}
