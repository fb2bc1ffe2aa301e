// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! The fixed-point pass driver.
//!
//! A run is one structural first pass followed by repeated resolution
//! passes. The first pass expands blocks, assigns ids and collects
//! every label at a provisional address. Each later pass re-evaluates
//! all addresses and values; when a pass changes nothing the next one
//! is final and emits bytes. Sources whose symbols keep shifting hit
//! the pass limit and fail.

use crate::assembler::engine::{is_defining_constant, is_special_label, Engine, OPEN_SCOPE};
use crate::assembler::error::PassCounts;
use crate::assembler::scope::ScopeStack;
use crate::core::fault::Fault;
use crate::core::source_line::SourceLine;

/// Passes beyond the first before an unconverged run is abandoned.
const MAX_PASSES: u32 = 4;

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub passes: u32,
    pub counts: PassCounts,
    pub program_start: Option<i64>,
    pub program_end: Option<i64>,
}

impl Engine {
    /// Resolve the source to a fixed point. Returns the summary even
    /// when lines produced diagnostics; only a run that cannot settle
    /// is an `Err`.
    pub fn run(&mut self, source: Vec<SourceLine>) -> Result<RunSummary, Fault> {
        let mut all = self.predefines.clone();
        all.extend(source);
        for line in &mut all {
            line.operand = self.star_spacing.replace_all(&line.operand, "*").into_owned();
        }
        self.first_pass(all);
        self.second_pass()?;

        let st = self.state.borrow();
        Ok(RunSummary {
            passes: st.passes,
            counts: PassCounts {
                lines: st.lines.len() as u32,
                errors: st.log.error_count() as u32,
                warnings: st.log.warning_count() as u32,
            },
            program_start: st.output.program_start(),
            program_end: st.output.program_end(),
        })
    }

    fn first_pass(&mut self, source: Vec<SourceLine>) {
        let mut work = source;
        let mut scope = ScopeStack::new();
        let mut anon = 0usize;
        let mut next_id = 0usize;
        let mut i = 0usize;

        while i < work.len() {
            if work[i].do_not_assemble() {
                if work[i].is_comment() {
                    let comment = work[i].clone();
                    self.state.borrow_mut().lines.push(comment);
                }
                i += 1;
                continue;
            }
            if work[i].instruction == ".end" {
                break;
            }

            let token = work[i].instruction.clone();
            let claimed = self
                .handlers
                .iter()
                .position(|h| h.processes(&token) || h.is_processing());
            if let Some(index) = claimed {
                let line = work.remove(i);
                let handler = &mut self.handlers[index];
                handler.process(line);
                if !handler.is_processing() {
                    let expanded = handler.take_lines();
                    handler.reset();
                    // revisit the splice point so expanded lines are
                    // processed in place
                    work.splice(i..i, expanded);
                }
                continue;
            }

            let mut line = work[i].clone();
            line.id = next_id;
            next_id += 1;
            self.set_context(&line);
            self.first_pass_line(&mut line, &mut scope, &mut anon);
            i += 1;
        }

        let handler_open = self.handlers.iter().any(|h| h.is_processing());
        if !scope.is_empty() || handler_open {
            let last = self.state.borrow().lines.last().cloned();
            match last {
                Some(line) => self.log_fault(&line, Fault::UnterminatedBlock),
                None => self
                    .state
                    .borrow_mut()
                    .log
                    .log_error("", 0, "", Fault::UnterminatedBlock),
            }
        }
    }

    fn first_pass_line(
        &mut self,
        line: &mut SourceLine,
        scope: &mut ScopeStack,
        anon: &mut usize,
    ) {
        // value faults are expected while symbols are provisional;
        // the resolution passes re-judge them
        if let Err(fault) = self.first_pass_line_inner(line, scope, anon) {
            if !fault.deferrable() {
                self.log_fault(line, fault);
            }
        }
        let done = line.clone();
        self.state.borrow_mut().lines.push(done);
    }

    fn first_pass_line_inner(
        &mut self,
        line: &mut SourceLine,
        scope: &mut ScopeStack,
        anon: &mut usize,
    ) -> Result<(), Fault> {
        self.update_pc(line)?;
        line.pc = self.state.borrow().output.logical_pc();
        self.define_label(line, scope, anon)?;
        if !is_defining_constant(line) {
            let size = self.size_of(line);
            self.state.borrow_mut().output.add_uninitialized(size);
        }
        Ok(())
    }

    fn second_pass(&mut self) -> Result<(), Fault> {
        let mut final_pass = false;
        self.state.borrow_mut().passes += 1;
        loop {
            {
                let st = self.state.borrow();
                if st.passes > MAX_PASSES || st.log.has_errors() {
                    break;
                }
            }
            self.state.borrow_mut().output.reset();
            let mut pass_needed = false;
            let mut anon = 0usize;
            let total = self.state.borrow().lines.len();
            for index in 0..total {
                let mut line = self.state.borrow().lines[index].clone();
                if line.do_not_assemble() {
                    continue;
                }
                if line.instruction == ".end" {
                    break;
                }
                self.set_context(&line);
                match self.second_pass_line(&mut line, &mut anon, final_pass) {
                    Ok(needed) => pass_needed |= needed,
                    Err(fault) => {
                        if final_pass || !fault.deferrable() {
                            self.log_fault(&line, fault);
                        }
                    }
                }
                self.state.borrow_mut().lines[index] = line;
            }
            if final_pass {
                break;
            }
            self.state.borrow_mut().passes += 1;
            final_pass = !pass_needed;
        }
        let passes = self.state.borrow().passes;
        if passes > MAX_PASSES {
            return Err(Fault::TooManyPasses(passes));
        }
        Ok(())
    }

    /// Re-resolve one line. Returns whether its address or value moved,
    /// which forces another pass.
    fn second_pass_line(
        &mut self,
        line: &mut SourceLine,
        anon: &mut usize,
        final_pass: bool,
    ) -> Result<bool, Fault> {
        self.update_pc(line)?;

        if is_defining_constant(line) {
            if line.label == "*" {
                return Ok(false);
            }
            let value = self.evaluator.evaluate(&line.operand)?;
            let needed = if is_special_label(&line.label) {
                value != line.pc
            } else {
                let scoped = self.nearest_scope_or_bare(&line.label, &line.scope);
                let text = value.to_string();
                let mut st = self.state.borrow_mut();
                let moved = st.symbols.value_of(&scoped) != Some(text.as_str());
                st.symbols.define(&scoped, &text)?;
                moved
            };
            line.pc = value;
            return Ok(needed);
        }

        let logical = self.state.borrow().output.logical_pc();
        if self.is_symbol_name(&line.label, true, false) || line.instruction == OPEN_SCOPE {
            let mut label = line.label.clone();
            if label.is_empty() {
                // unnamed blocks get the same synthetic counter
                // sequence the first pass assigned
                label = anon.to_string();
                *anon += 1;
            }
            let scoped = self.nearest_scope_or_bare(&label, &line.scope);
            let text = logical.to_string();
            self.state.borrow_mut().symbols.define(&scoped, &text)?;
        }
        let needed = line.pc != logical;
        line.pc = logical;

        if final_pass {
            self.assemble_line(line);
        } else {
            let size = self.size_of(line);
            self.state.borrow_mut().output.add_uninitialized(size);
        }
        Ok(needed)
    }
}
