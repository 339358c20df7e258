//! Command-line interface for dialogue-forge.
//!
//! Provides commands for generation, record inspection, fine-tuning export,
//! and model table lookup.

mod commands;

pub use commands::{parse_cli, render_preview, run_with_cli, Cli, Commands};
