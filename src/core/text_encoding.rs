// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Character-to-byte translation for char literals in expressions.

use std::collections::HashMap;

/// Maps source characters to target byte values. Unmapped characters
/// fall through to their Unicode scalar value, which covers ASCII
/// targets without any setup.
#[derive(Debug, Default, Clone)]
pub struct TextEncoding {
    map: HashMap<char, i64>,
}

impl TextEncoding {
    pub fn new() -> Self {
        TextEncoding::default()
    }

    /// Override the encoded value of a single character.
    pub fn map_char(&mut self, ch: char, value: i64) {
        self.map.insert(ch, value);
    }

    pub fn unmap_char(&mut self, ch: char) {
        self.map.remove(&ch);
    }

    pub fn encoded(&self, ch: char) -> i64 {
        self.map.get(&ch).copied().unwrap_or(ch as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_by_default() {
        let enc = TextEncoding::new();
        assert_eq!(enc.encoded('A'), 65);
        assert_eq!(enc.encoded(' '), 32);
    }

    #[test]
    fn overrides_win_and_can_be_removed() {
        let mut enc = TextEncoding::new();
        enc.map_char('A', 0xc1);
        assert_eq!(enc.encoded('A'), 0xc1);
        enc.unmap_char('A');
        assert_eq!(enc.encoded('A'), 65);
    }
}
