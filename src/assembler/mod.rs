// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Multi-pass resolution: the engine, its collaborator traits, the
//! output image, scoping, and diagnostics.

pub mod error;
pub mod handlers;
pub mod output;
pub mod scope;

mod engine;
mod passes;


pub use engine::Engine;
pub use handlers::{BlockHandler, LineAssembler};
pub use passes::RunSummary;
