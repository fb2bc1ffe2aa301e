// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Resolution core for a table-driven cross-assembler.
//!
//! This crate turns a flat sequence of parsed source lines into concrete
//! byte addresses and literal values through iterative fixed-point passes,
//! and evaluates the arithmetic/logical expressions embedded in operands.
//! Instruction encoding, macro/conditional expansion, file handling and
//! output containers are collaborator concerns reached through the traits
//! in [`assembler::handlers`].

pub mod assembler;
pub mod core;
pub mod report;

pub use crate::assembler::{BlockHandler, Engine, LineAssembler, RunSummary};
pub use crate::core::eval::{Evaluator, EvaluatorConfig};
pub use crate::core::fault::Fault;
pub use crate::core::source_line::SourceLine;
