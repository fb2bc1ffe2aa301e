// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Scope management for qualified symbol names.

/// Stack of nested block scopes. The joined path prefixes every symbol
/// defined while the scope is open; unnamed blocks get a synthetic
/// decimal segment so their contents still live in a unique namespace.
#[derive(Debug, Default, Clone)]
pub struct ScopeStack {
    segments: Vec<String>,
}

impl ScopeStack {
    pub fn new() -> Self {
        ScopeStack::default()
    }

    pub fn push(&mut self, segment: &str) {
        self.segments.push(segment.to_string());
    }

    pub fn pop(&mut self) -> bool {
        self.segments.pop().is_some()
    }

    /// Dotted path of the current scope, empty at root.
    pub fn path(&self) -> String {
        self.segments.join(".")
    }

    pub fn qualify(&self, name: &str) -> String {
        if self.segments.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", self.path(), name)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    pub fn clear(&mut self) {
        self.segments.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_reflects_nesting() {
        let mut scope = ScopeStack::new();
        assert_eq!(scope.path(), "");
        scope.push("outer");
        scope.push("0");
        assert_eq!(scope.path(), "outer.0");
        assert_eq!(scope.qualify("loop"), "outer.0.loop");
        assert!(scope.pop());
        assert_eq!(scope.qualify("loop"), "outer.loop");
    }

    #[test]
    fn pop_on_empty_reports_failure() {
        let mut scope = ScopeStack::new();
        assert!(!scope.pop());
        assert_eq!(scope.qualify("x"), "x");
    }
}
