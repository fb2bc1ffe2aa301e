// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! A single parsed line of assembly source.

use std::fmt;

/// One source line after tokenization. The resolution passes rewrite
/// `pc` and `assembly` on every iteration; the token fields are owned
/// by whatever front end produced the line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceLine {
    /// Monotonic id assigned during the first pass. Anonymous label
    /// resolution orders lines by this id, not by line number, so
    /// expanded lines keep their textual position.
    pub id: usize,
    pub line_number: u32,
    /// Resolved program counter for the line, updated each pass.
    pub pc: i64,
    pub filename: String,
    /// Fully qualified scope path the line was assembled in.
    pub scope: String,
    /// Bytes emitted for this line on the final pass.
    pub assembly: Vec<u8>,
    pub source: String,
    pub label: String,
    pub instruction: String,
    pub operand: String,
    comment: bool,
    no_assemble: bool,
}

impl SourceLine {
    pub fn new(filename: &str, line_number: u32, source: &str) -> Self {
        SourceLine {
            filename: filename.to_string(),
            line_number,
            source: source.to_string(),
            ..SourceLine::default()
        }
    }

    /// Marking a line as a comment pins it as non-assembling.
    pub fn set_comment(&mut self, comment: bool) {
        self.comment = comment;
        if comment {
            self.no_assemble = true;
        }
    }

    pub fn is_comment(&self) -> bool {
        self.comment
    }

    /// Comment lines ignore attempts to re-enable assembly.
    pub fn set_do_not_assemble(&mut self, value: bool) {
        if !self.comment {
            self.no_assemble = value;
        }
    }

    pub fn do_not_assemble(&self) -> bool {
        self.no_assemble
    }

    /// `file(line)` prefix used in diagnostics.
    pub fn source_info(&self) -> String {
        format!("{}({})", self.filename, self.line_number)
    }
}

impl fmt::Display for SourceLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.source_info(), self.source)
    }
}
