use crate::error::Result;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::BTreeSet;

/// Default name of the aggregated output file
pub const DEFAULT_OUTPUT_FILENAME: &str = "prosjekt_innhold.txt";

/// Name of the per-project config file looked up in the scan root
pub const CONFIG_FILENAME: &str = ".srcdump.toml";

/// File names that are never worth including in a snapshot
pub const DEFAULT_IGNORE_FILES: &[&str] = &["package-lock.json", ".env"];

/// Directory names pruned wherever they appear in the tree
pub const DEFAULT_IGNORE_DIRS: &[&str] = &[
    "assets",
    "node_modules",
    ".git",
    ".vscode",
    "__pycache__",
    ".venv",
    "venv",
    "dist",
    "build",
    "market_data",
];

/// Immutable ignore configuration for one run.
///
/// Built once through [`IgnoreRulesBuilder`] before the walk starts. The
/// output file name and the tool's own name are inputs to the builder, so
/// the rules never change while the tree is being scanned. The output file,
/// the config file and the tool itself are ignored even without defaults.
#[derive(Debug, Clone)]
pub struct IgnoreRules {
    files: BTreeSet<String>,
    dirs: BTreeSet<String>,
    exclude: Option<GlobSet>,
    exclude_patterns: Vec<String>,
}

impl IgnoreRules {
    #[must_use]
    pub fn builder() -> IgnoreRulesBuilder {
        IgnoreRulesBuilder::default()
    }

    /// Exact file names that are skipped
    #[must_use]
    pub fn files(&self) -> &BTreeSet<String> {
        &self.files
    }

    /// Directory base names whose subtree is skipped
    #[must_use]
    pub fn dirs(&self) -> &BTreeSet<String> {
        &self.dirs
    }

    #[must_use]
    pub fn exclude_patterns(&self) -> &[String] {
        &self.exclude_patterns
    }

    /// Whether a file with this exact name is skipped
    #[must_use]
    pub fn is_ignored_file(&self, name: &str) -> bool {
        self.files.contains(name)
    }

    /// Whether a directory with this exact base name is pruned
    #[must_use]
    pub fn is_ignored_dir(&self, name: &str) -> bool {
        self.dirs.contains(name)
    }

    /// Whether a `/`-separated relative path matches an exclude glob
    #[must_use]
    pub fn is_excluded(&self, relative_path: &str) -> bool {
        self.exclude
            .as_ref()
            .is_some_and(|set| set.is_match(relative_path))
    }
}

/// Collects ignore sources and freezes them into [`IgnoreRules`]
#[derive(Debug, Clone)]
pub struct IgnoreRulesBuilder {
    use_defaults: bool,
    output_filename: String,
    self_name: Option<String>,
    files: Vec<String>,
    dirs: Vec<String>,
    exclude: Vec<String>,
}

impl Default for IgnoreRulesBuilder {
    fn default() -> Self {
        Self {
            use_defaults: true,
            output_filename: DEFAULT_OUTPUT_FILENAME.to_string(),
            self_name: None,
            files: Vec::new(),
            dirs: Vec::new(),
            exclude: Vec::new(),
        }
    }
}

impl IgnoreRulesBuilder {
    /// Whether the built-in file and directory lists are included
    #[must_use]
    pub fn defaults(mut self, use_defaults: bool) -> Self {
        self.use_defaults = use_defaults;
        self
    }

    #[must_use]
    pub fn output_filename(mut self, name: impl Into<String>) -> Self {
        self.output_filename = name.into();
        self
    }

    /// Name of the running executable, so a copy inside the tree is skipped
    #[must_use]
    pub fn self_name(mut self, name: Option<String>) -> Self {
        self.self_name = name.filter(|n| !n.is_empty());
        self
    }

    #[must_use]
    pub fn ignore_files<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.files.extend(names.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn ignore_dirs<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dirs.extend(names.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn exclude<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude.extend(patterns.into_iter().map(Into::into));
        self
    }

    /// Freezes the collected sources
    ///
    /// # Errors
    ///
    /// Returns `SrcdumpError::Glob` if an exclude pattern is not a valid glob.
    pub fn build(self) -> Result<IgnoreRules> {
        let mut files: BTreeSet<String> = BTreeSet::new();
        let mut dirs: BTreeSet<String> = BTreeSet::new();

        if self.use_defaults {
            files.extend(DEFAULT_IGNORE_FILES.iter().map(|s| (*s).to_string()));
            dirs.extend(DEFAULT_IGNORE_DIRS.iter().map(|s| (*s).to_string()));
        }
        files.extend(self.files);
        dirs.extend(self.dirs);

        // Never feed the artifact or the tool back into itself
        files.insert(self.output_filename);
        files.insert(CONFIG_FILENAME.to_string());
        if let Some(name) = self.self_name {
            files.insert(name);
        }

        let exclude = if self.exclude.is_empty() {
            None
        } else {
            let mut builder = GlobSetBuilder::new();
            for pattern in &self.exclude {
                builder.add(Glob::new(pattern)?);
            }
            Some(builder.build()?)
        };

        Ok(IgnoreRules {
            files,
            dirs,
            exclude,
            exclude_patterns: self.exclude,
        })
    }
}
