// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Collaborator traits plugged into the resolution engine.
//!
//! The engine itself only resolves addresses and symbols; everything
//! that knows an instruction table or expands source lines lives
//! behind these traits. Both are capability-driven: the engine asks
//! every collaborator whether it claims a token and dispatches to the
//! first that does, trying the most recently registered first.

use crate::core::eval::Evaluator;
use crate::core::source_line::SourceLine;

/// Encodes instructions into bytes. Registered with
/// [`crate::assembler::Engine::add_assembler`]; later registrations
/// shadow earlier ones for the tokens they claim.
pub trait LineAssembler {
    /// Whether this assembler encodes the given instruction token.
    fn assembles(&self, token: &str) -> bool;

    /// Expected encoded size of the line, in bytes. Called on sizing
    /// passes; must not require symbols to be final.
    fn size_of(&mut self, line: &SourceLine, evaluator: &mut Evaluator) -> usize;

    /// Encode the line. Only called on the final pass, with every
    /// symbol at its settled value.
    fn assemble(&mut self, line: &mut SourceLine, evaluator: &mut Evaluator) -> Vec<u8>;
}

/// Consumes a run of source lines during the first pass and hands
/// back replacement lines, e.g. repetition or macro expansion.
///
/// Once a handler claims a line the engine keeps feeding it every
/// following line until [`BlockHandler::is_processing`] turns false,
/// then splices [`BlockHandler::take_lines`] into the stream where
/// the consumed lines sat.
pub trait BlockHandler {
    /// Whether this handler processes the given instruction token.
    fn processes(&self, token: &str) -> bool;

    /// True while the handler is still consuming lines.
    fn is_processing(&self) -> bool;

    fn process(&mut self, line: SourceLine);

    /// The lines to splice back into the stream.
    fn take_lines(&mut self) -> Vec<SourceLine>;

    /// Clear per-block state so the handler can claim another block.
    fn reset(&mut self);
}
