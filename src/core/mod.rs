// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! CPU-agnostic building blocks: faults, source lines, the scoped symbol
//! table, anonymous label resolution, character encoding and the
//! expression evaluator.

pub mod anon_labels;
pub mod eval;
pub mod eval_functions;
pub mod fault;
pub mod source_line;
pub mod symbol_table;
pub mod text_encoding;
