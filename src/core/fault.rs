// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Fault taxonomy for expression evaluation and pass resolution.
//!
//! Every fault carries enough text to render a diagnostic on its own;
//! the log layer adds file/line context. Faults that can only be judged
//! once all symbols have settled are marked [`Fault::deferrable`] and are
//! swallowed on intermediate passes.

use std::error;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Fault {
    /// The expression text cannot be parsed or computed.
    MalformedExpression(String),
    /// A symbol reference did not resolve in any visible scope.
    UndefinedSymbol(String),
    /// Division or modulo with a zero right-hand side.
    DivideByZero(String),
    /// An evaluated value fell outside the permitted range.
    NumericOverflow { value: i64, min: i64, max: i64 },
    /// A program counter assignment or relocation directive was invalid.
    InvalidRelocation(String),
    /// A forward/backward anonymous reference ran off the label list.
    UnresolvedAnonymousLabel(String),
    /// A label was given a second, different value.
    LabelRedefinition(String),
    /// The token in label position is not a usable symbol name.
    InvalidLabel(String),
    /// No registered collaborator claims the instruction token.
    UnknownInstruction(String),
    /// End of source with an open scope or an active block handler.
    UnterminatedBlock,
    /// A block closure with no matching opener.
    UnmatchedClosure(String),
    /// The fixed-point loop failed to settle within the pass limit.
    TooManyPasses(u32),
}

impl Fault {
    /// Stable diagnostic code, grouped by area: `asm0xx` engine,
    /// `asm2xx` structure, `asm3xx` symbols, `asm4xx` expressions.
    pub fn code(&self) -> &'static str {
        match self {
            Fault::TooManyPasses(_) => "asm001",
            Fault::UnterminatedBlock => "asm201",
            Fault::UnmatchedClosure(_) => "asm202",
            Fault::UnknownInstruction(_) => "asm203",
            Fault::UndefinedSymbol(_) => "asm301",
            Fault::UnresolvedAnonymousLabel(_) => "asm302",
            Fault::LabelRedefinition(_) => "asm303",
            Fault::InvalidLabel(_) => "asm304",
            Fault::MalformedExpression(_) => "asm401",
            Fault::DivideByZero(_) => "asm402",
            Fault::NumericOverflow { .. } => "asm403",
            Fault::InvalidRelocation(_) => "asm404",
        }
    }

    /// Whether the fault may be spurious before symbols converge.
    /// Deferrable faults are only reported on the final pass.
    pub fn deferrable(&self) -> bool {
        matches!(
            self,
            Fault::DivideByZero(_)
                | Fault::NumericOverflow { .. }
                | Fault::InvalidRelocation(_)
        )
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fault::MalformedExpression(expr) => {
                write!(f, "malformed expression '{expr}'")
            }
            Fault::UndefinedSymbol(name) => {
                write!(f, "symbol '{name}' is not defined")
            }
            Fault::DivideByZero(expr) => {
                write!(f, "division by zero in '{expr}'")
            }
            Fault::NumericOverflow { value, min, max } => {
                write!(f, "value {value} outside range {min}..{max}")
            }
            Fault::InvalidRelocation(detail) => {
                write!(f, "invalid program counter assignment: {detail}")
            }
            Fault::UnresolvedAnonymousLabel(reference) => {
                write!(f, "cannot resolve anonymous label '{reference}'")
            }
            Fault::LabelRedefinition(name) => {
                write!(f, "label '{name}' is already defined")
            }
            Fault::InvalidLabel(name) => {
                write!(f, "'{name}' is not a valid label or symbol name")
            }
            Fault::UnknownInstruction(token) => {
                write!(f, "unknown instruction or directive '{token}'")
            }
            Fault::UnterminatedBlock => {
                write!(f, "missing closure for open block")
            }
            Fault::UnmatchedClosure(token) => {
                write!(f, "'{token}' does not close a block")
            }
            Fault::TooManyPasses(passes) => {
                write!(f, "source failed to resolve after {passes} passes")
            }
        }
    }
}

impl error::Error for Fault {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_grouped_by_area() {
        assert_eq!(Fault::TooManyPasses(5).code(), "asm001");
        assert_eq!(Fault::UnterminatedBlock.code(), "asm201");
        assert_eq!(Fault::UndefinedSymbol("x".into()).code(), "asm301");
        assert_eq!(Fault::MalformedExpression("(".into()).code(), "asm401");
    }

    #[test]
    fn only_value_faults_defer() {
        assert!(Fault::DivideByZero("1/0".into()).deferrable());
        assert!(Fault::NumericOverflow { value: 70000, min: 0, max: 65535 }.deferrable());
        assert!(Fault::InvalidRelocation("pc".into()).deferrable());
        assert!(!Fault::UndefinedSymbol("x".into()).deferrable());
        assert!(!Fault::MalformedExpression("".into()).deferrable());
    }

    #[test]
    fn display_is_self_contained() {
        let msg = Fault::NumericOverflow { value: 256, min: 0, max: 255 }.to_string();
        assert_eq!(msg, "value 256 outside range 0..255");
    }
}
