// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! The resolution engine: shared run state, symbol definition, program
//! counter directives, and dispatch to registered collaborators.

use std::cell::RefCell;
use std::rc::Rc;

use regex::Regex;

use crate::assembler::error::{Diagnostic, ErrorLog};
use crate::assembler::handlers::{BlockHandler, LineAssembler};
use crate::assembler::output::BinaryOutput;
use crate::assembler::scope::ScopeStack;
use crate::core::anon_labels::AnonymousLabels;
use crate::core::eval::{Evaluator, EvaluatorConfig};
use crate::core::fault::Fault;
use crate::core::source_line::SourceLine;
use crate::core::symbol_table::SymbolTable;
use crate::core::text_encoding::TextEncoding;

pub(super) const OPEN_SCOPE: &str = ".block";
pub(super) const CLOSE_SCOPE: &str = ".endblock";

/// Directives the engine resolves itself; everything else must be
/// claimed by a registered collaborator.
const DIRECTIVES: &[&str] = &[
    ".end",
    ".endrelocate",
    ".equ",
    ".pseudopc",
    ".realpc",
    ".relocate",
    "=",
];

/// Mutable run state shared between the engine and the evaluator's
/// substitution resolvers. The `current_*` fields mirror the line
/// being processed so resolvers can scope lookups and attribute
/// diagnostics without a back-reference to the engine.
#[derive(Default)]
pub(super) struct EngineState {
    pub symbols: SymbolTable,
    pub anon: AnonymousLabels,
    pub lines: Vec<SourceLine>,
    pub output: BinaryOutput,
    pub log: ErrorLog,
    pub encoding: TextEncoding,
    pub passes: u32,
    pub current_id: usize,
    pub current_scope: String,
    pub current_file: String,
    pub current_line_number: u32,
    pub current_source: String,
}

pub struct Engine {
    pub(super) state: Rc<RefCell<EngineState>>,
    pub(super) evaluator: Evaluator,
    pub(super) handlers: Vec<Box<dyn BlockHandler>>,
    pub(super) assemblers: Vec<Box<dyn LineAssembler>>,
    pub(super) predefines: Vec<SourceLine>,
    pub(super) star_spacing: Regex,
}

impl Engine {
    pub fn new() -> Result<Self, Fault> {
        let state = Rc::new(RefCell::new(EngineState::default()));
        let mut evaluator = Evaluator::new(EvaluatorConfig {
            hex_patterns: vec![String::from(r"\$([a-fA-F0-9]+)")],
            ..EvaluatorConfig::default()
        })?;

        // Substitution rules run in registration order: char literals
        // first so quoted characters never look like labels, the
        // program counter star last so arithmetic stars are left for
        // the parser.
        let chars_state = Rc::clone(&state);
        evaluator.register_substitution(
            r"'(.)'",
            Some(char_literal_guard),
            Box::new(move |token| {
                let ch = token.trim_matches('\'').chars().next()?;
                Some(chars_state.borrow().encoding.encoded(ch).to_string())
            }),
        )?;

        let label_state = Rc::clone(&state);
        evaluator.register_substitution(
            r"[\p{L}_][\p{L}\p{N}_.]*",
            Some(label_guard),
            Box::new(move |token| {
                let lookup = {
                    let st = label_state.borrow();
                    let scoped = st
                        .symbols
                        .nearest_scope(token, &st.current_scope)
                        .unwrap_or_else(|| token.to_string());
                    st.symbols.value_of(&scoped).map(str::to_string)
                };
                if let Some(value) = lookup {
                    return Some(value);
                }
                // misses are expected while symbols are still being
                // collected on the first pass
                let mut st = label_state.borrow_mut();
                if st.passes > 0 {
                    let (file, number, source) = (
                        st.current_file.clone(),
                        st.current_line_number,
                        st.current_source.clone(),
                    );
                    st.log.log_error(
                        &file,
                        number,
                        &source,
                        Fault::UndefinedSymbol(token.to_string()),
                    );
                }
                Some(String::from("0"))
            }),
        )?;

        let anon_state = Rc::clone(&state);
        evaluator.register_substitution(
            r"^\++$|^-+$|\(\++\)|\(-+\)",
            None,
            Box::new(move |token| {
                let reference = token.trim_matches(|c| c == '(' || c == ')');
                let count = reference.len().saturating_sub(1);
                let address = {
                    let st = anon_state.borrow();
                    if reference.starts_with('-') {
                        st.anon
                            .resolve_backward(&st.lines, st.current_id, &st.current_scope, count)
                    } else {
                        st.anon
                            .resolve_forward(&st.lines, st.current_id, &st.current_scope, count)
                    }
                };
                match address {
                    Some(pc) => Some(pc.to_string()),
                    None => {
                        let mut st = anon_state.borrow_mut();
                        let (file, number, source) = (
                            st.current_file.clone(),
                            st.current_line_number,
                            st.current_source.clone(),
                        );
                        st.log.log_error(
                            &file,
                            number,
                            &source,
                            Fault::UnresolvedAnonymousLabel(reference.to_string()),
                        );
                        Some(String::from("0"))
                    }
                }
            }),
        )?;

        let star_state = Rc::clone(&state);
        evaluator.register_substitution(
            r"\*",
            Some(star_guard),
            Box::new(move |_| Some(star_state.borrow().output.logical_pc().to_string())),
        )?;

        Ok(Engine {
            state,
            evaluator,
            handlers: Vec::new(),
            assemblers: Vec::new(),
            predefines: Vec::new(),
            star_spacing: Regex::new(r"\s?\*\s?")
                .map_err(|_| Fault::MalformedExpression(String::from(r"\s?\*\s?")))?,
        })
    }

    /// Register an instruction encoder. Later registrations win for
    /// tokens claimed by more than one.
    pub fn add_assembler(&mut self, assembler: Box<dyn LineAssembler>) {
        self.assemblers.push(assembler);
    }

    /// Register a first-pass block handler.
    pub fn add_handler(&mut self, handler: Box<dyn BlockHandler>) {
        self.handlers.push(handler);
    }

    /// Predefine a root-scope symbol before the run, as a command
    /// line `-D name=value` would.
    pub fn define_global(&mut self, name: &str, value: &str) -> Result<(), Fault> {
        if !self.is_symbol_name(name, false, false) {
            return Err(Fault::InvalidLabel(name.to_string()));
        }
        let mut line = SourceLine::new("<predefined>", 0, &format!("{name}={value}"));
        line.label = name.to_string();
        line.instruction = String::from("=");
        line.operand = value.to_string();
        self.predefines.push(line);
        Ok(())
    }

    /// Whether any directive or collaborator claims the token.
    pub fn handles(&self, token: &str) -> bool {
        DIRECTIVES.contains(&token)
            || token == OPEN_SCOPE
            || token == CLOSE_SCOPE
            || self.handlers.iter().any(|h| h.processes(token))
            || self.assemblers.iter().any(|a| a.assembles(token))
    }

    /// Register another hexadecimal literal notation with the
    /// expression evaluator.
    pub fn add_hex_format(&mut self, pattern: &str) -> Result<(), Fault> {
        self.evaluator.add_hex_format(pattern)
    }

    /// Evaluate an expression in the current run context.
    pub fn evaluate(&mut self, expression: &str) -> Result<i64, Fault> {
        self.evaluator.evaluate(expression)
    }

    /// Register an extra token substitution with the expression
    /// evaluator, e.g. for target-specific register names.
    pub fn register_substitution(
        &mut self,
        pattern: &str,
        guard: Option<crate::core::eval::BoundaryGuard>,
        resolver: crate::core::eval::Resolver,
    ) -> Result<(), Fault> {
        self.evaluator.register_substitution(pattern, guard, resolver)
    }

    pub fn logical_pc(&self) -> i64 {
        self.state.borrow().output.logical_pc()
    }

    pub fn real_pc(&self) -> i64 {
        self.state.borrow().output.real_pc()
    }

    /// Override the encoded value of a character in char literals.
    pub fn map_char(&mut self, ch: char, value: i64) {
        self.state.borrow_mut().encoding.map_char(ch, value);
    }

    pub fn escalate_warnings(&mut self) {
        self.state.borrow_mut().log.escalate_warnings();
    }

    /// Fault sink for collaborators. Errors suppress byte emission at
    /// the end of the run; warnings never block convergence.
    pub fn report_error(&self, line: &SourceLine, fault: Fault) {
        self.log_fault(line, fault);
    }

    pub fn report_warning(&self, line: &SourceLine, fault: Fault) {
        self.state
            .borrow_mut()
            .log
            .log_warning(&line.filename, line.line_number, &line.source, fault);
    }

    pub fn has_errors(&self) -> bool {
        self.state.borrow().log.has_errors()
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.state.borrow().log.entries().to_vec()
    }

    pub fn diagnostics_json(&self) -> serde_json::Value {
        self.state.borrow().log.to_json()
    }

    pub fn dump_diagnostics(&self, use_color: bool) -> String {
        self.state.borrow().log.dump(use_color)
    }

    pub fn passes(&self) -> u32 {
        self.state.borrow().passes
    }

    /// Stored value of a fully qualified symbol, as decimal text.
    pub fn symbol_value(&self, name: &str) -> Option<String> {
        self.state.borrow().symbols.value_of(name).map(str::to_string)
    }

    /// The processed lines with their resolved counters and bytes.
    pub fn lines(&self) -> Vec<SourceLine> {
        self.state.borrow().lines.clone()
    }

    /// The assembled image, suppressed when any error was logged.
    pub fn output_bytes(&self) -> Option<Vec<u8>> {
        let st = self.state.borrow();
        if st.log.has_errors() {
            None
        } else {
            Some(st.output.bytes().to_vec())
        }
    }

    pub fn program_range(&self) -> Option<(i64, i64)> {
        let st = self.state.borrow();
        st.output.program_start().zip(st.output.program_end())
    }

    // Mirror the line into the shared state so substitution resolvers
    // see the right scope and diagnostic location.
    pub(super) fn set_context(&self, line: &SourceLine) {
        let mut st = self.state.borrow_mut();
        st.current_id = line.id;
        st.current_scope = line.scope.clone();
        st.current_file = line.filename.clone();
        st.current_line_number = line.line_number;
        st.current_source = line.source.clone();
    }

    pub(super) fn log_fault(&self, line: &SourceLine, fault: Fault) {
        self.state
            .borrow_mut()
            .log
            .log_error(&line.filename, line.line_number, &line.source, fault);
    }

    pub(super) fn nearest_scope_or_bare(&self, label: &str, scope: &str) -> String {
        self.state
            .borrow()
            .symbols
            .nearest_scope(label, scope)
            .unwrap_or_else(|| label.to_string())
    }

    /// Whether the token can name a symbol: not claimed by anything,
    /// shaped like an identifier, dots only where allowed.
    pub(super) fn is_symbol_name(
        &self,
        token: &str,
        allow_lead_underscore: bool,
        allow_dot: bool,
    ) -> bool {
        if token.is_empty() || self.handles(token) {
            return false;
        }
        if !allow_lead_underscore && token.starts_with('_') {
            return false;
        }
        if token.contains('.') && (!allow_dot || token.ends_with('.')) {
            return false;
        }
        let mut chars = token.chars();
        match chars.next() {
            Some(c) if c.is_alphabetic() || c == '_' => {}
            _ => return false,
        }
        chars.all(|c| c.is_alphanumeric() || c == '_' || c == '.')
    }

    /// Apply any program counter directive on the line. Faults from
    /// operand evaluation propagate; structural misuse is logged
    /// directly since it cannot self-correct on a later pass.
    pub(super) fn update_pc(&mut self, line: &SourceLine) -> Result<(), Fault> {
        if line.label == "*" {
            if is_defining_constant(line) {
                let value = self.evaluator.evaluate_range(&line.operand, 0, 0xFFFF)?;
                self.state.borrow_mut().output.set_pc(value)?;
            } else {
                self.log_fault(
                    line,
                    Fault::InvalidRelocation(String::from(
                        "program counter assignment requires a value",
                    )),
                );
            }
            return Ok(());
        }
        match line.instruction.as_str() {
            ".relocate" | ".pseudopc" => {
                if line.operand.is_empty() {
                    self.log_fault(
                        line,
                        Fault::InvalidRelocation(format!(
                            "'{}' requires an address",
                            line.instruction
                        )),
                    );
                    return Ok(());
                }
                let value = self.evaluator.evaluate(&line.operand)?;
                if !(0..=0xFFFF).contains(&value) {
                    self.log_fault(
                        line,
                        Fault::NumericOverflow { value, min: 0, max: 0xFFFF },
                    );
                    return Ok(());
                }
                self.state.borrow_mut().output.set_logical_pc(value);
            }
            ".endrelocate" | ".realpc" => {
                if !line.operand.is_empty() {
                    self.log_fault(
                        line,
                        Fault::InvalidRelocation(format!(
                            "'{}' takes no operand",
                            line.instruction
                        )),
                    );
                    return Ok(());
                }
                self.state.borrow_mut().output.synch_pc()?;
            }
            _ => {}
        }
        Ok(())
    }

    /// Record any label the line defines, maintaining the scope stack
    /// for `.block`/`.endblock`. Runs on the first pass only; later
    /// passes refine the recorded values in place.
    pub(super) fn define_label(
        &mut self,
        line: &mut SourceLine,
        scope: &mut ScopeStack,
        anon: &mut usize,
    ) -> Result<(), Fault> {
        let current_scope = scope.path();
        line.scope = current_scope.clone();
        self.set_context(line);

        if !line.label.is_empty() || line.instruction == OPEN_SCOPE {
            if line.label == "*" {
                // handled by update_pc
            } else if line.label.is_empty() || is_special_label(&line.label) {
                if is_defining_constant(line) {
                    line.pc = self.evaluator.evaluate(&line.operand)?;
                } else {
                    line.pc = self.state.borrow().output.logical_pc();
                }
                if line.instruction == OPEN_SCOPE {
                    let synthetic = if current_scope.is_empty() {
                        anon.to_string()
                    } else {
                        format!("{current_scope}.{anon}")
                    };
                    if line.label.is_empty() {
                        line.scope = synthetic.clone();
                    }
                    let pc_text = line.pc.to_string();
                    self.state.borrow_mut().symbols.define(&synthetic, &pc_text)?;
                    scope.push(&anon.to_string());
                    *anon += 1;
                }
                if line.label == "+" || line.label == "-" {
                    self.state.borrow_mut().anon.record(line.id, &line.label);
                }
            } else {
                line.label = line.label.trim_end_matches(':').to_string();
                if !self.is_symbol_name(&line.label, true, false) {
                    self.log_fault(line, Fault::InvalidLabel(line.label.clone()));
                    return Ok(());
                }
                let scoped = if current_scope.is_empty() {
                    line.label.clone()
                } else {
                    format!("{current_scope}.{}", line.label)
                };
                // a named line's scope is its own qualified name, so
                // nested references resolve relative to the label
                line.scope = scoped.clone();
                if line.instruction == OPEN_SCOPE {
                    let segment = line.label.clone();
                    scope.push(&segment);
                }
                let already = self.state.borrow().symbols.contains(&scoped);
                if already {
                    self.log_fault(line, Fault::LabelRedefinition(line.label.clone()));
                    return Ok(());
                }
                let value = if is_defining_constant(line) {
                    self.evaluator.evaluate(&line.operand)?.to_string()
                } else {
                    line.pc.to_string()
                };
                self.state.borrow_mut().symbols.define(&scoped, &value)?;
            }
        }

        if line.instruction == CLOSE_SCOPE && !scope.pop() {
            self.log_fault(line, Fault::UnmatchedClosure(line.instruction.clone()));
        }
        self.set_context(line);
        Ok(())
    }

    /// Expected size of the line, from the first assembler claiming
    /// its instruction. Directives and label-only lines take no room.
    pub(super) fn size_of(&mut self, line: &SourceLine) -> usize {
        match self
            .assemblers
            .iter_mut()
            .rev()
            .find(|a| a.assembles(&line.instruction))
        {
            Some(assembler) => assembler.size_of(line, &mut self.evaluator),
            None => 0,
        }
    }

    /// Final-pass encoding of a line into the output image.
    pub(super) fn assemble_line(&mut self, line: &mut SourceLine) {
        if line.instruction.is_empty() {
            if !line.operand.is_empty() {
                self.log_fault(line, Fault::MalformedExpression(line.operand.clone()));
            }
            return;
        }
        if !self.handles(&line.instruction) {
            self.log_fault(line, Fault::UnknownInstruction(line.instruction.clone()));
            return;
        }
        let Some(assembler) = self
            .assemblers
            .iter_mut()
            .rev()
            .find(|a| a.assembles(&line.instruction))
        else {
            // engine-owned directives emit nothing
            return;
        };
        let bytes = assembler.assemble(line, &mut self.evaluator);
        line.assembly = bytes.clone();
        self.state.borrow_mut().output.emit(&bytes);
    }
}

pub(super) fn is_defining_constant(line: &SourceLine) -> bool {
    let operand = line.operand.as_str();
    if operand.len() >= 2 && operand.starts_with('"') && operand.ends_with('"') {
        return false;
    }
    line.instruction == "=" || line.instruction == ".equ"
}

pub(super) fn is_special_label(label: &str) -> bool {
    !label.is_empty()
        && (label == "*"
            || label.chars().all(|c| c == '+')
            || label.chars().all(|c| c == '-'))
}

fn char_literal_guard(prev: Option<char>, next: Option<char>) -> bool {
    let wordish = |c: Option<char>| {
        c.map(|c| c.is_alphanumeric() || c == '_').unwrap_or(false)
    };
    !wordish(prev) && !wordish(next)
}

fn label_guard(prev: Option<char>, next: Option<char>) -> bool {
    let prev_blocks = prev
        .map(|c| c.is_alphanumeric() || matches!(c, '_' | '.' | '\'' | '$' | '%'))
        .unwrap_or(false);
    !prev_blocks && next != Some('(')
}

fn star_guard(prev: Option<char>, next: Option<char>) -> bool {
    let prev_blocks = prev
        .map(|c| c.is_alphanumeric() || matches!(c, '_' | '.' | ')'))
        .unwrap_or(false);
    let next_blocks = next
        .map(|c| c.is_alphanumeric() || matches!(c, '_' | '.' | '('))
        .unwrap_or(false);
    !prev_blocks && !next_blocks
}
