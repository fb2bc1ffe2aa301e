// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

// Shared rendering helpers used by the diagnostic log.

/// Build a caret row pointing at `column` (1-based) of a source line.
pub fn caret_line(line: &str, column: usize) -> String {
    let idx = column.saturating_sub(1).min(line.len());
    let mut out = String::with_capacity(idx + 1);
    for ch in line.chars().take(idx) {
        // keep tabs so the caret stays aligned with tabbed source
        out.push(if ch == '\t' { '\t' } else { ' ' });
    }
    out.push('^');
    out
}

/// Wrap `text` in ANSI red when color output is requested.
pub fn paint(text: &str, use_color: bool) -> String {
    if use_color {
        format!("\x1b[31m{text}\x1b[0m")
    } else {
        text.to_string()
    }
}
