use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for srcdump operations
#[derive(Error, Debug)]
pub enum SrcdumpError {
    /// IO error when reading files or directories
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The output artifact could not be created or truncated
    #[error("Could not open output file '{}': {source}", .path.display())]
    OutputOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Writing to the output artifact failed part-way through the run
    #[error("Could not write to output file '{}': {source}", .path.display())]
    OutputWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Scan root does not exist or is not a directory
    #[error("Root directory not found: {}", .path.display())]
    RootNotFound { path: PathBuf },

    /// A walked path could not be expressed relative to the root
    #[error("Could not compute relative path for {} (root: {})", .path.display(), .root.display())]
    RelativePath { path: PathBuf, root: PathBuf },

    /// Configuration file could not be parsed
    #[error("Invalid config file '{}': {source}", .path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Invalid exclude glob
    #[error("Glob error: {0}")]
    Glob(#[from] globset::Error),

    /// `WalkDir` error when traversing directories
    #[error("Directory traversal error: {0}")]
    WalkDir(#[from] walkdir::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SrcdumpError>;
