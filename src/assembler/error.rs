// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Diagnostics collected during the resolution passes.
//!
//! Faults raised while assembling are not returned up the call chain;
//! they are logged against the offending line and assembly continues,
//! so one broken operand does not hide every error after it. The run
//! as a whole fails if the log holds any error once the final pass
//! completes.

use std::fmt;

use serde_json::json;

use crate::core::fault::Fault;
use crate::report;

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// A fault tied to the source location that raised it.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    line: u32,
    file: Option<String>,
    column: Option<usize>,
    severity: Severity,
    fault: Fault,
    source: Option<String>,
}

impl Diagnostic {
    pub fn new(line: u32, severity: Severity, fault: Fault) -> Self {
        Diagnostic {
            line,
            file: None,
            column: None,
            severity,
            fault,
            source: None,
        }
    }

    pub fn with_file(mut self, file: Option<String>) -> Self {
        self.file = file;
        self
    }

    pub fn with_column(mut self, column: Option<usize>) -> Self {
        self.column = column;
        self
    }

    pub fn with_source(mut self, source: Option<String>) -> Self {
        self.source = source;
        self
    }

    pub fn format(&self) -> String {
        let sev = match self.severity {
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
        };
        format!("{}: {} [{}] - {}", self.line, sev, self.fault.code(), self.fault)
    }

    /// Multi-line rendering with the source line and a caret.
    pub fn format_with_context(&self, use_color: bool) -> String {
        let sev = match self.severity {
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
        };
        let header = match &self.file {
            Some(file) => format!("{file}:{}: {sev} [{}]", self.line, self.fault.code()),
            None => format!("{}: {sev} [{}]", self.line, self.fault.code()),
        };

        let mut out = String::new();
        out.push_str(&header);
        out.push('\n');
        if let Some(source) = &self.source {
            out.push_str(&format!("{:>5} | {}\n", self.line, source));
            if let Some(column) = self.column {
                out.push_str(&format!(
                    "      | {}\n",
                    report::paint(&report::caret_line(source, column), use_color)
                ));
            }
        }
        out.push_str(&format!("{sev}: {}", self.fault));
        out
    }

    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "file": self.file,
            "line": self.line,
            "column": self.column,
            "severity": match self.severity {
                Severity::Warning => "warning",
                Severity::Error => "error",
            },
            "code": self.fault.code(),
            "message": self.fault.to_string(),
        })
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn fault(&self) -> &Fault {
        &self.fault
    }

    pub fn code(&self) -> &str {
        self.fault.code()
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn file(&self) -> Option<&str> {
        self.file.as_deref()
    }

    pub fn message(&self) -> String {
        self.fault.to_string()
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format())
    }
}

/// Accumulating diagnostic log for one assembly run.
#[derive(Debug, Default)]
pub struct ErrorLog {
    entries: Vec<Diagnostic>,
    warnings_are_errors: bool,
}

impl ErrorLog {
    pub fn new() -> Self {
        ErrorLog::default()
    }

    /// Treat every subsequently logged warning as an error.
    pub fn escalate_warnings(&mut self) {
        self.warnings_are_errors = true;
    }

    pub fn log(&mut self, diagnostic: Diagnostic) {
        let mut diagnostic = diagnostic;
        if self.warnings_are_errors && diagnostic.severity == Severity::Warning {
            diagnostic.severity = Severity::Error;
        }
        self.entries.push(diagnostic);
    }

    pub fn log_error(&mut self, file: &str, line: u32, source: &str, fault: Fault) {
        self.log(
            Diagnostic::new(line, Severity::Error, fault)
                .with_file(Some(file.to_string()))
                .with_source(Some(source.to_string())),
        );
    }

    pub fn log_warning(&mut self, file: &str, line: u32, source: &str, fault: Fault) {
        self.log(
            Diagnostic::new(line, Severity::Warning, fault)
                .with_file(Some(file.to_string()))
                .with_source(Some(source.to_string())),
        );
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn has_errors(&self) -> bool {
        self.entries
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    pub fn error_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .count()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn to_json(&self) -> serde_json::Value {
        json!(self
            .entries
            .iter()
            .map(Diagnostic::to_json)
            .collect::<Vec<_>>())
    }

    pub fn dump(&self, use_color: bool) -> String {
        self.entries
            .iter()
            .map(|d| d.format_with_context(use_color))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Pass statistics.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassCounts {
    pub lines: u32,
    pub errors: u32,
    pub warnings: u32,
}

impl PassCounts {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_format_includes_line_and_code() {
        let diag = Diagnostic::new(12, Severity::Error, Fault::UndefinedSymbol("x".into()));
        assert_eq!(diag.format(), "12: ERROR [asm301] - symbol 'x' is not defined");
    }

    #[test]
    fn context_rendering_places_caret_under_column() {
        let diag = Diagnostic::new(3, Severity::Error, Fault::DivideByZero("1/0".into()))
            .with_file(Some("example.asm".to_string()))
            .with_source(Some("lda 1/0".to_string()))
            .with_column(Some(5));
        let rendered = diag.format_with_context(false);
        let expected = [
            "example.asm:3: ERROR [asm402]",
            "    3 | lda 1/0",
            "      |     ^",
            "ERROR: division by zero in '1/0'",
        ]
        .join("\n");
        assert_eq!(rendered, expected);
    }

    #[test]
    fn log_counts_by_severity() {
        let mut log = ErrorLog::new();
        log.log_error("a.asm", 1, "x", Fault::UndefinedSymbol("x".into()));
        log.log_warning("a.asm", 2, "y", Fault::UnterminatedBlock);
        assert!(log.has_errors());
        assert_eq!(log.error_count(), 1);
        assert_eq!(log.warning_count(), 1);
    }

    #[test]
    fn escalated_warnings_become_errors() {
        let mut log = ErrorLog::new();
        log.escalate_warnings();
        log.log_warning("a.asm", 2, "y", Fault::UnterminatedBlock);
        assert!(log.has_errors());
        assert_eq!(log.warning_count(), 0);
    }

    #[test]
    fn json_payload_carries_location_and_code() {
        let mut log = ErrorLog::new();
        log.log_error("a.asm", 7, "lda q", Fault::UndefinedSymbol("q".into()));
        let payload = log.to_json();
        assert_eq!(payload[0]["file"], "a.asm");
        assert_eq!(payload[0]["line"], 7);
        assert_eq!(payload[0]["code"], "asm301");
        assert_eq!(payload[0]["severity"], "error");
    }
}
