// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Assembled byte buffer and program counter tracking.

use crate::core::fault::Fault;

/// Collects emitted bytes and tracks two program counters: the real
/// counter addresses where bytes land in the image, the logical
/// counter is what `*` and labels resolve to. They only diverge while
/// a relocation is active.
#[derive(Debug, Default)]
pub struct BinaryOutput {
    bytes: Vec<u8>,
    real_pc: i64,
    logical_pc: i64,
    relocating: bool,
    program_start: Option<i64>,
}

impl BinaryOutput {
    pub fn new() -> Self {
        BinaryOutput::default()
    }

    /// Clear everything for the next resolution pass.
    pub fn reset(&mut self) {
        self.bytes.clear();
        self.real_pc = 0;
        self.logical_pc = 0;
        self.relocating = false;
        self.program_start = None;
    }

    pub fn logical_pc(&self) -> i64 {
        self.logical_pc
    }

    pub fn real_pc(&self) -> i64 {
        self.real_pc
    }

    pub fn is_relocating(&self) -> bool {
        self.relocating
    }

    /// First address bytes were emitted at, if any.
    pub fn program_start(&self) -> Option<i64> {
        self.program_start
    }

    /// Address one past the last emitted byte.
    pub fn program_end(&self) -> Option<i64> {
        self.program_start
            .map(|start| start + self.bytes.len() as i64)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Move both program counters, as `* =` does. Once bytes have been
    /// emitted the counter can only move forward.
    pub fn set_pc(&mut self, value: i64) -> Result<(), Fault> {
        if self.program_start.is_some() && value < self.real_pc {
            return Err(Fault::InvalidRelocation(format!(
                "program counter cannot move backward to {value}"
            )));
        }
        self.real_pc = value;
        self.logical_pc = value;
        Ok(())
    }

    /// Start relocation: the logical counter jumps, the real counter
    /// keeps addressing the image.
    pub fn set_logical_pc(&mut self, value: i64) {
        self.logical_pc = value;
        self.relocating = true;
    }

    /// End relocation and snap the logical counter back to the real
    /// one.
    pub fn synch_pc(&mut self) -> Result<(), Fault> {
        if !self.relocating {
            return Err(Fault::InvalidRelocation(
                "no relocation is active".to_string(),
            ));
        }
        self.logical_pc = self.real_pc;
        self.relocating = false;
        Ok(())
    }

    /// Advance both counters without emitting, used on sizing passes.
    pub fn add_uninitialized(&mut self, size: usize) {
        self.real_pc += size as i64;
        self.logical_pc += size as i64;
    }

    /// Emit bytes at the real program counter. Gaps left by earlier
    /// counter moves are zero-filled.
    pub fn emit(&mut self, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        let start = *self.program_start.get_or_insert(self.real_pc);
        let offset = (self.real_pc - start).max(0) as usize;
        if self.bytes.len() < offset {
            self.bytes.resize(offset, 0);
        }
        self.bytes.extend_from_slice(data);
        self.real_pc += data.len() as i64;
        self.logical_pc += data.len() as i64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_advance_together_outside_relocation() {
        let mut out = BinaryOutput::new();
        out.set_pc(0x1000).unwrap();
        out.emit(&[1, 2]);
        assert_eq!(out.real_pc(), 0x1002);
        assert_eq!(out.logical_pc(), 0x1002);
        assert_eq!(out.program_start(), Some(0x1000));
        assert_eq!(out.program_end(), Some(0x1002));
    }

    #[test]
    fn relocation_splits_the_counters() {
        let mut out = BinaryOutput::new();
        out.set_pc(0x1000).unwrap();
        out.emit(&[0xea]);
        out.set_logical_pc(0xc000);
        assert!(out.is_relocating());
        out.emit(&[0xea, 0xea]);
        assert_eq!(out.real_pc(), 0x1003);
        assert_eq!(out.logical_pc(), 0xc002);
        out.synch_pc().unwrap();
        assert_eq!(out.logical_pc(), 0x1003);
        assert!(!out.is_relocating());
    }

    #[test]
    fn synch_without_relocation_faults() {
        let mut out = BinaryOutput::new();
        assert!(matches!(
            out.synch_pc(),
            Err(Fault::InvalidRelocation(_))
        ));
    }

    #[test]
    fn backward_counter_move_faults_after_emission() {
        let mut out = BinaryOutput::new();
        out.set_pc(0x2000).unwrap();
        out.emit(&[0]);
        assert!(matches!(
            out.set_pc(0x1000),
            Err(Fault::InvalidRelocation(_))
        ));
        // before any emission the counter is free to move anywhere
        let mut fresh = BinaryOutput::new();
        fresh.set_pc(0x2000).unwrap();
        fresh.set_pc(0x1000).unwrap();
    }

    #[test]
    fn forward_gaps_are_zero_filled() {
        let mut out = BinaryOutput::new();
        out.set_pc(0x1000).unwrap();
        out.emit(&[0xff]);
        out.add_uninitialized(2);
        out.emit(&[0xee]);
        assert_eq!(out.bytes(), &[0xff, 0, 0, 0xee]);
    }

    #[test]
    fn reset_clears_all_state() {
        let mut out = BinaryOutput::new();
        out.set_pc(0x1000).unwrap();
        out.set_logical_pc(0xc000);
        out.emit(&[1]);
        out.reset();
        assert_eq!(out.bytes(), &[] as &[u8]);
        assert_eq!(out.real_pc(), 0);
        assert_eq!(out.logical_pc(), 0);
        assert!(!out.is_relocating());
        assert_eq!(out.program_start(), None);
    }
}
