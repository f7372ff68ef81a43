use crate::error::{Result, SrcdumpError};
use crate::rules::{DEFAULT_OUTPUT_FILENAME, IgnoreRules};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub use crate::rules::CONFIG_FILENAME;

/// How byte sequences that are not valid UTF-8 are handled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecodePolicy {
    /// Drop invalid sequences
    #[default]
    Skip,
    /// Substitute U+FFFD for each invalid sequence
    Replace,
}

/// Optional settings read from a TOML file
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub output: Option<String>,
    pub ignore_files: Vec<String>,
    pub ignore_dirs: Vec<String>,
    pub exclude: Vec<String>,
    pub decode: Option<DecodePolicy>,
    pub follow_links: Option<bool>,
    pub sort: Option<bool>,
    pub default_ignores: Option<bool>,
}

impl FileConfig {
    /// Parses a config file
    ///
    /// # Errors
    ///
    /// - `SrcdumpError::Io` if the file cannot be read.
    /// - `SrcdumpError::Config` if it is not valid TOML for this schema.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config = toml::from_str(&contents).map_err(|source| SrcdumpError::Config {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }

    /// Loads `<root>/.srcdump.toml` if it exists
    ///
    /// # Errors
    ///
    /// Same as [`FileConfig::load`]; a missing file is not an error.
    pub fn discover(root: &Path) -> Result<Option<Self>> {
        let path = root.join(CONFIG_FILENAME);
        if path.is_file() {
            Self::load(&path).map(Some)
        } else {
            debug!(path = %path.display(), "No config file, using defaults");
            Ok(None)
        }
    }
}

/// Everything one run needs, resolved before the walk starts
#[derive(Debug, Clone)]
pub struct DumpConfig {
    /// Absolute scan root
    pub root: PathBuf,
    /// Output file name, created inside `root`
    pub output_filename: String,
    pub rules: IgnoreRules,
    pub decode: DecodePolicy,
    pub follow_links: bool,
    /// Visit entries in file-name order instead of listing order
    pub sort: bool,
}

impl DumpConfig {
    /// Default configuration for `root`, ignoring `self_name` as well
    ///
    /// # Errors
    ///
    /// Returns `SrcdumpError::RootNotFound` if `root` is not a directory.
    pub fn new(root: impl Into<PathBuf>, self_name: Option<String>) -> Result<Self> {
        let root = resolve_root(root.into())?;
        let rules = IgnoreRules::builder()
            .output_filename(DEFAULT_OUTPUT_FILENAME)
            .self_name(self_name)
            .build()?;

        Ok(Self {
            root,
            output_filename: DEFAULT_OUTPUT_FILENAME.to_string(),
            rules,
            decode: DecodePolicy::default(),
            follow_links: false,
            sort: false,
        })
    }

    /// Full path of the artifact
    #[must_use]
    pub fn output_path(&self) -> PathBuf {
        self.root.join(&self.output_filename)
    }
}

/// Makes `root` absolute and checks that it is a directory
///
/// # Errors
///
/// Returns `SrcdumpError::RootNotFound` if the path does not name a directory.
pub fn resolve_root(root: PathBuf) -> Result<PathBuf> {
    if !root.is_dir() {
        return Err(SrcdumpError::RootNotFound { path: root });
    }
    if root.is_absolute() {
        Ok(root)
    } else {
        Ok(std::env::current_dir()?.join(root))
    }
}

/// Base name of the running executable, if it can be determined
#[must_use]
pub fn current_exe_name() -> Option<String> {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
}
