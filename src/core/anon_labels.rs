// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Anonymous (`+` / `-`) label bookkeeping and resolution.
//!
//! Anonymous labels are addressed by direction and ordinal: `+` is the
//! next forward anonymous label, `++` the one after, `-` the nearest
//! backward one, and so on. Candidates are ordered by line id so that
//! lines spliced in by block handlers keep their textual position.

use std::collections::BTreeSet;

use crate::core::source_line::SourceLine;

#[derive(Debug, Default, Clone)]
pub struct AnonymousLabels {
    forward: BTreeSet<usize>,
    backward: BTreeSet<usize>,
}

impl AnonymousLabels {
    pub fn new() -> Self {
        AnonymousLabels::default()
    }

    /// Record the line id of a label made of only `+` or only `-`.
    /// Other labels are ignored.
    pub fn record(&mut self, id: usize, label: &str) {
        if !label.is_empty() && label.chars().all(|c| c == '+') {
            self.forward.insert(id);
        } else if !label.is_empty() && label.chars().all(|c| c == '-') {
            self.backward.insert(id);
        }
    }

    /// Address of the `count`-th forward anonymous label after
    /// `from_id`, as seen from `from_scope`. `count` is zero-based:
    /// `+` asks for 0, `++` for 1.
    pub fn resolve_forward(
        &self,
        lines: &[SourceLine],
        from_id: usize,
        from_scope: &str,
        count: usize,
    ) -> Option<i64> {
        let ids: Vec<usize> = self
            .forward
            .iter()
            .copied()
            .filter(|&id| id > from_id)
            .collect();
        resolve(lines, &ids, from_scope, count)
    }

    /// Address of the `count`-th backward anonymous label before
    /// `from_id`. Candidates are walked nearest-first.
    pub fn resolve_backward(
        &self,
        lines: &[SourceLine],
        from_id: usize,
        from_scope: &str,
        count: usize,
    ) -> Option<i64> {
        let ids: Vec<usize> = self
            .backward
            .iter()
            .copied()
            .filter(|&id| id < from_id)
            .rev()
            .collect();
        resolve(lines, &ids, from_scope, count)
    }
}

// A candidate only matches if its line sits in the scope currently
// being searched. On a miss the search widens one scope segment at a
// time; once the root scope has also missed, the search restarts at
// the calling scope with the next candidate ordinal. That restart
// means a reference can skip past a same-ordinal label in an
// unrelated scope and land on a later one in its own scope.
fn resolve(lines: &[SourceLine], ids: &[usize], from_scope: &str, count: usize) -> Option<i64> {
    let mut scope = from_scope.to_string();
    let mut count = count;
    loop {
        let id = *ids.get(count)?;
        if let Some(line) = lines.iter().find(|l| l.id == id) {
            if line.scope == scope {
                return Some(line.pc);
            }
        }
        if scope.is_empty() {
            scope = from_scope.to_string();
            count += 1;
            if scope.is_empty() {
                // calling scope is root; nothing left to widen
                continue;
            }
        } else {
            scope = match scope.rfind('.') {
                Some(pos) => scope[..pos].to_string(),
                None => String::new(),
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(id: usize, scope: &str, pc: i64) -> SourceLine {
        let mut line = SourceLine::default();
        line.id = id;
        line.scope = scope.to_string();
        line.pc = pc;
        line
    }

    #[test]
    fn forward_finds_next_in_same_scope() {
        let mut anon = AnonymousLabels::new();
        anon.record(5, "+");
        anon.record(9, "+");
        let lines = vec![line(5, "", 0x1000), line(9, "", 0x2000)];
        assert_eq!(anon.resolve_forward(&lines, 3, "", 0), Some(0x1000));
        assert_eq!(anon.resolve_forward(&lines, 3, "", 1), Some(0x2000));
        assert_eq!(anon.resolve_forward(&lines, 7, "", 0), Some(0x2000));
    }

    #[test]
    fn backward_walks_nearest_first() {
        let mut anon = AnonymousLabels::new();
        anon.record(2, "-");
        anon.record(6, "-");
        let lines = vec![line(2, "", 0x100), line(6, "", 0x200)];
        assert_eq!(anon.resolve_backward(&lines, 8, "", 0), Some(0x200));
        assert_eq!(anon.resolve_backward(&lines, 8, "", 1), Some(0x100));
        assert_eq!(anon.resolve_backward(&lines, 4, "", 0), Some(0x100));
    }

    #[test]
    fn reference_past_the_last_label_is_unresolved() {
        let mut anon = AnonymousLabels::new();
        anon.record(5, "+");
        let lines = vec![line(5, "", 0x1000)];
        assert_eq!(anon.resolve_forward(&lines, 3, "", 1), None);
        assert_eq!(anon.resolve_backward(&lines, 3, "", 0), None);
    }

    #[test]
    fn mismatched_scope_widens_to_parent() {
        let mut anon = AnonymousLabels::new();
        anon.record(5, "+");
        let lines = vec![line(5, "outer", 0x1234)];
        // referencing line sits in outer.inner; the label in outer is
        // found after one widening step
        assert_eq!(anon.resolve_forward(&lines, 3, "outer.inner", 0), Some(0x1234));
    }

    #[test]
    fn root_miss_advances_to_next_candidate() {
        let mut anon = AnonymousLabels::new();
        anon.record(5, "+");
        anon.record(9, "+");
        // first candidate lives in an unrelated scope, second in ours
        let lines = vec![line(5, "elsewhere", 0x1000), line(9, "block", 0x2000)];
        assert_eq!(anon.resolve_forward(&lines, 3, "block", 0), Some(0x2000));
    }

    #[test]
    fn only_pure_plus_minus_labels_are_recorded() {
        let mut anon = AnonymousLabels::new();
        anon.record(1, "+-");
        anon.record(2, "label");
        anon.record(3, "");
        let lines: Vec<SourceLine> = Vec::new();
        assert_eq!(anon.resolve_forward(&lines, 0, "", 0), None);
        assert_eq!(anon.resolve_backward(&lines, 9, "", 0), None);
    }
}
