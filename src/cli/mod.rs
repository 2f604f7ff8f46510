//! # Command-Line Interface
//!
//! User-facing CLI commands and output formatting.
//!
//! ## Commands
//!
//! | Command | Purpose |
//! |---------|---------|
//! | `init` | Write a default `cast.toml` |
//! | `patch` | Load plugins, grow targets, write the patch |
//! | `targets` | List configured targets |
//! | `target set` / `target remove` | Edit configured targets |
//!
//! ## Output Formats
//!
//! All commands support `--format` flag:
//! - `text` (default) - Human-readable output
//! - `json` - Machine-parseable JSON
//!
//! Logs go to stderr. `--verbose` (or `-v`) raises the level to debug;
//! `RUST_LOG` overrides both.
//!
//! ## Entry Point
//!
//! Call [`run()`] to parse arguments and execute the appropriate command.

mod app;
mod output;
mod patch_cmd;
mod target_cmd;

pub use app::{run, Cli, Commands};
pub use output::{Output, OutputFormat};
