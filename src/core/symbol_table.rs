// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Scoped symbol storage.
//!
//! Symbols live in a flat map keyed by their fully qualified name, e.g.
//! `outer.inner.loop`. Values are stored as decimal text so they can be
//! spliced straight back into expression strings without formatting
//! round trips. Scope resolution walks the calling scope outward until
//! a match is found.

use std::collections::HashMap;

use crate::core::fault::Fault;

#[derive(Debug, Default, Clone)]
pub struct SymbolTable {
    symbols: HashMap<String, String>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable::default()
    }

    /// Store or overwrite a symbol. The name must already be fully
    /// qualified; `*` is the program counter and never a symbol.
    pub fn define(&mut self, name: &str, value: &str) -> Result<(), Fault> {
        if name.split('.').any(|seg| seg == "*") {
            return Err(Fault::LabelRedefinition(name.to_string()));
        }
        self.symbols.insert(name.to_string(), value.to_string());
        Ok(())
    }

    pub fn value_of(&self, name: &str) -> Option<&str> {
        self.symbols.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.symbols.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Find the innermost definition of `label` visible from
    /// `calling_scope`, returning its fully qualified name. The search
    /// tries `calling_scope.label`, then peels one scope segment at a
    /// time, and finally the bare label at root.
    pub fn nearest_scope(&self, label: &str, calling_scope: &str) -> Option<String> {
        let mut segments: Vec<&str> = if calling_scope.is_empty() {
            Vec::new()
        } else {
            calling_scope.split('.').collect()
        };
        while !segments.is_empty() {
            let candidate = format!("{}.{}", segments.join("."), label);
            if self.symbols.contains_key(&candidate) {
                return Some(candidate);
            }
            segments.pop();
        }
        if self.symbols.contains_key(label) {
            Some(label.to_string())
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inner_definition_shadows_outer() {
        let mut table = SymbolTable::new();
        table.define("target", "1").unwrap();
        table.define("block.target", "2").unwrap();
        let found = table.nearest_scope("target", "block").unwrap();
        assert_eq!(found, "block.target");
        assert_eq!(table.value_of(&found), Some("2"));
    }

    #[test]
    fn search_peels_scopes_until_root() {
        let mut table = SymbolTable::new();
        table.define("outer.target", "7").unwrap();
        let found = table.nearest_scope("target", "outer.inner.deep").unwrap();
        assert_eq!(found, "outer.target");
    }

    #[test]
    fn root_fallback_and_miss() {
        let mut table = SymbolTable::new();
        table.define("target", "9").unwrap();
        assert_eq!(
            table.nearest_scope("target", "a.b").as_deref(),
            Some("target")
        );
        assert_eq!(table.nearest_scope("absent", "a.b"), None);
        assert_eq!(table.nearest_scope("absent", ""), None);
    }

    #[test]
    fn dotted_labels_resolve_from_sibling_scopes() {
        let mut table = SymbolTable::new();
        table.define("routine.done", "100").unwrap();
        let found = table.nearest_scope("routine.done", "other").unwrap();
        assert_eq!(found, "routine.done");
    }

    #[test]
    fn star_segments_are_rejected() {
        let mut table = SymbolTable::new();
        assert!(table.define("*", "0").is_err());
        assert!(table.define("scope.*", "0").is_err());
    }
}
