//! # srcdump
//!
//! A library and CLI tool that flattens a project tree into a single text file.
//! Every file that is not ignored is written as a record: a path marker header
//! followed by the file's contents. The result is meant to be pasted into a
//! Large Language Model (LLM) or any other tool that wants the whole project
//! as one document.
//!
//! ## Features
//!
//! - Recursive, pre-order walk of the project root
//! - Exact-name ignore lists for files and directories, applied at any depth
//! - Optional glob excludes on relative paths
//! - Best-effort decoding of non UTF-8 files, never aborting the run
//! - Unreadable files produce a placeholder record instead of stopping the scan
//!
//! ## Output format
//!
//! ```text
//! --- Fil: src/main.rs ---
//!
//! fn main() {}
//!
//!
//! --- Fil: README.md ---
//!
//! ...
//! ```
//!
//! ## Usage
//!
//! ### As a Library
//!
//! ```no_run
//! use srcdump::{DumpConfig, run};
//!
//! let root = std::env::current_dir().unwrap();
//! let config = DumpConfig::new(root, None).unwrap();
//!
//! match run(&config) {
//!     Ok(summary) => println!("{} files written", summary.files_written),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```
//!
//! ### As a CLI Tool
//!
//! ```bash
//! # Snapshot the current directory into prosjekt_innhold.txt
//! srcdump
//!
//! # Show what would be included
//! srcdump --list
//!
//! # Skip Rust build output as well
//! srcdump --ignore-dir target -o snapshot.txt
//! ```

pub mod aggregate;
pub mod config;
pub mod error;
pub mod fs_utils;
pub mod rules;

// Re-export main types and functions for convenience
pub use aggregate::{PlannedFile, RunSummary, plan, run, write_header, write_record};
pub use config::{DecodePolicy, DumpConfig, FileConfig};
pub use error::{Result, SrcdumpError};
pub use rules::{DEFAULT_OUTPUT_FILENAME, IgnoreRules, IgnoreRulesBuilder};
