use crate::config::DumpConfig;
use crate::error::{Result, SrcdumpError};
use crate::fs_utils::{read_lossy, relative_path};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

/// Outcome of one aggregation run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Records written, including those whose content could not be read
    pub files_written: usize,
    /// Records written with an error placeholder instead of content
    pub read_failures: usize,
    /// Entries left out because of a walk or path error
    pub skipped: usize,
}

/// A file the walk would include, as reported by [`plan`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedFile {
    pub path: String,
    pub size: u64,
}

/// Writes the path marker that opens every record
///
/// # Errors
///
/// Propagates write errors from `out`.
pub fn write_header<W: Write>(out: &mut W, relative: &str) -> io::Result<()> {
    write!(out, "--- Fil: {relative} ---\n\n")
}

/// Writes one complete record: the header followed by either the file's
/// text or an error placeholder naming the file.
///
/// # Errors
///
/// Propagates write errors from `out`. A failed read is not an error here.
pub fn write_record<W: Write>(
    out: &mut W,
    relative: &str,
    content: &io::Result<String>,
) -> io::Result<()> {
    write_header(out, relative)?;
    match content {
        Ok(text) => {
            out.write_all(text.as_bytes())?;
            out.write_all(b"\n\n")
        }
        Err(e) => write!(
            out,
            "*** FEIL: Kunne ikke lese filen '{relative}'. Årsak: {e} ***\n\n"
        ),
    }
}

/// Aggregates every included file under `config.root` into the output file.
///
/// Per-file problems are logged and recorded in the summary; only failures
/// to create or write the artifact abort the run.
///
/// # Errors
///
/// - `SrcdumpError::OutputOpen` if the artifact cannot be created.
/// - `SrcdumpError::OutputWrite` if writing to it fails.
/// - `SrcdumpError::WalkDir` if the root itself cannot be listed.
pub fn run(config: &DumpConfig) -> Result<RunSummary> {
    let output_path = config.output_path();

    info!("Scanning project in: {}", config.root.display());
    info!("Ignoring files: {:?}", config.rules.files());
    info!("Ignoring directories: {:?}", config.rules.dirs());
    if !config.rules.exclude_patterns().is_empty() {
        info!("Excluding patterns: {:?}", config.rules.exclude_patterns());
    }
    info!("Writing output to: {}", output_path.display());

    let file = File::create(&output_path).map_err(|source| SrcdumpError::OutputOpen {
        path: output_path.clone(),
        source,
    })?;
    let mut out = BufWriter::new(file);
    let write_err = |source: io::Error| SrcdumpError::OutputWrite {
        path: output_path.clone(),
        source,
    };

    let mut files_written = 0;
    let mut read_failures = 0;
    let skipped = walk_files(config, |entry, relative| {
        info!("  Adding: {relative}");
        // counted before the read, so the count always matches the headers
        files_written += 1;

        let content = read_lossy(entry.path(), config.decode);
        if let Err(e) = &content {
            warn!("Could not read file {relative}: {e}");
            read_failures += 1;
        }
        write_record(&mut out, &relative, &content).map_err(write_err)
    })?;

    out.flush().map_err(write_err)?;

    Ok(RunSummary {
        files_written,
        read_failures,
        skipped,
    })
}

/// Lists the files [`run`] would include, without creating the artifact or
/// reading any content.
///
/// # Errors
///
/// Returns `SrcdumpError::WalkDir` if the root itself cannot be listed.
pub fn plan(config: &DumpConfig) -> Result<Vec<PlannedFile>> {
    let mut planned = Vec::new();
    walk_files(config, |entry, path| {
        let size = fs::metadata(entry.path()).map_or(0, |m| m.len());
        planned.push(PlannedFile { path, size });
        Ok(())
    })?;
    Ok(planned)
}

/// Pre-order walk of the root calling `visit` with every included file and
/// its relative path. Returns the number of entries skipped due to errors.
fn walk_files<F>(config: &DumpConfig, mut visit: F) -> Result<usize>
where
    F: FnMut(&DirEntry, String) -> Result<()>,
{
    let mut walk = WalkDir::new(&config.root).follow_links(config.follow_links);
    if config.sort {
        walk = walk.sort_by_file_name();
    }

    let mut skipped = 0;
    let walker = walk
        .into_iter()
        .filter_entry(|entry| !is_pruned(entry, config));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if err.depth() == 0 => return Err(err.into()),
            Err(err) => {
                warn!("Skipping unreadable entry: {err}");
                skipped += 1;
                continue;
            }
        };

        if !is_file_like(&entry) {
            continue;
        }

        let name = entry.file_name().to_string_lossy();
        if config.rules.is_ignored_file(&name) {
            debug!("Ignoring file: {}", entry.path().display());
            continue;
        }

        let relative = match relative_path(entry.path(), &config.root) {
            Ok(relative) => relative,
            Err(err) => {
                warn!("{err}");
                skipped += 1;
                continue;
            }
        };

        if config.rules.is_excluded(&relative) {
            debug!("Excluding file: {relative}");
            continue;
        }

        visit(&entry, relative)?;
    }

    Ok(skipped)
}

/// Directories rejected here are never read, which prunes their subtree
fn is_pruned(entry: &DirEntry, config: &DumpConfig) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }

    if config
        .rules
        .is_ignored_dir(&entry.file_name().to_string_lossy())
    {
        debug!("Pruning directory: {}", entry.path().display());
        return true;
    }

    relative_path(entry.path(), &config.root).is_ok_and(|relative| {
        let excluded = config.rules.is_excluded(&relative);
        if excluded {
            debug!("Pruning directory: {relative}");
        }
        excluded
    })
}

/// Regular files, and symlinks that do not point at a directory.
///
/// Unfollowed links to directories are treated like directories that are
/// not descended into, so they produce no record.
fn is_file_like(entry: &DirEntry) -> bool {
    let file_type = entry.file_type();
    if file_type.is_dir() {
        return false;
    }
    !(file_type.is_symlink() && entry.path().is_dir())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DecodePolicy;
    use crate::rules::{DEFAULT_OUTPUT_FILENAME, IgnoreRules};
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn create_test_env() -> (TempDir, DumpConfig) {
        let temp_dir = TempDir::new().unwrap();
        let config = DumpConfig::new(temp_dir.path(), Some("srcdump".to_string())).unwrap();
        (temp_dir, config)
    }

    fn write_file(base: &Path, relative: &str, contents: impl AsRef<[u8]>) {
        let path = base.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, contents).unwrap();
    }

    fn read_artifact(config: &DumpConfig) -> String {
        fs::read_to_string(config.output_path()).unwrap()
    }

    fn header_count(artifact: &str) -> usize {
        artifact.matches("--- Fil: ").count()
    }

    /// Splits an artifact into (path, content) pairs, sorted by path
    fn records(artifact: &str) -> Vec<(String, String)> {
        let mut records: Vec<(String, String)> = artifact
            .split("--- Fil: ")
            .skip(1)
            .map(|record| {
                let (path, rest) = record.split_once(" ---\n\n").unwrap();
                let content = rest.strip_suffix("\n\n").unwrap();
                (path.to_string(), content.to_string())
            })
            .collect();
        records.sort();
        records
    }

    #[test]
    fn test_write_record_content() {
        let mut out = Vec::new();
        write_record(&mut out, "src/a.txt", &Ok("hello".to_string())).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "--- Fil: src/a.txt ---\n\nhello\n\n"
        );
    }

    #[test]
    fn test_write_record_error_placeholder() {
        let mut out = Vec::new();
        let err = io::Error::new(io::ErrorKind::PermissionDenied, "Permission denied");
        write_record(&mut out, "locked.bin", &Err(err)).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "--- Fil: locked.bin ---\n\n\
             *** FEIL: Kunne ikke lese filen 'locked.bin'. Årsak: Permission denied ***\n\n"
        );
    }

    #[test]
    fn test_basic_scenario() {
        let (temp_dir, config) = create_test_env();
        let base = temp_dir.path();
        write_file(base, "src/a.txt", "hello");
        write_file(base, "src/node_modules/x.js", "module.exports = 1;");
        write_file(base, ".env", "SECRET=1");
        write_file(base, "readme.md", "world");

        let summary = run(&config).unwrap();
        assert_eq!(summary.files_written, 2);
        assert_eq!(summary.read_failures, 0);

        let artifact = read_artifact(&config);
        assert_eq!(
            records(&artifact),
            vec![
                ("readme.md".to_string(), "world".to_string()),
                ("src/a.txt".to_string(), "hello".to_string()),
            ]
        );
        assert!(!artifact.contains("x.js"));
        assert!(!artifact.contains("SECRET"));
    }

    #[test]
    fn test_ignored_dirs_pruned_at_any_depth() {
        let (temp_dir, config) = create_test_env();
        let base = temp_dir.path();
        write_file(base, "a/b/c/.git/HEAD", "ref: main");
        write_file(base, "a/b/dist/bundle.js", "bundle");
        write_file(base, "a/b/keep.txt", "keep");
        write_file(base, "__pycache__/mod.pyc", "cache");

        let summary = run(&config).unwrap();
        let artifact = read_artifact(&config);
        assert_eq!(summary.files_written, 1);
        assert_eq!(
            records(&artifact),
            vec![("a/b/keep.txt".to_string(), "keep".to_string())]
        );
    }

    #[test]
    fn test_ignored_name_only_applies_to_matching_kind() {
        let (temp_dir, config) = create_test_env();
        let base = temp_dir.path();
        // a file named like an ignored dir is still included
        write_file(base, "build", "not a directory");
        // a directory named like an ignored file is still walked
        write_file(base, ".env/inner.txt", "inner");

        run(&config).unwrap();
        let paths: Vec<String> = records(&read_artifact(&config))
            .into_iter()
            .map(|(p, _)| p)
            .collect();
        assert_eq!(paths, [".env/inner.txt", "build"]);
    }

    #[test]
    fn test_self_exclusion_across_runs() {
        let (temp_dir, config) = create_test_env();
        let base = temp_dir.path();
        write_file(base, "one.txt", "1");
        write_file(base, "two/three.txt", "3");
        write_file(base, "srcdump", "binary copy of the tool");

        let first_summary = run(&config).unwrap();
        let first = read_artifact(&config);
        let second_summary = run(&config).unwrap();
        let second = read_artifact(&config);

        assert_eq!(first_summary, second_summary);
        assert_eq!(records(&first), records(&second));
        assert!(!second.contains(DEFAULT_OUTPUT_FILENAME));
        assert!(!second.contains("binary copy"));
        assert_eq!(header_count(&second), 2);
    }

    #[test]
    fn test_count_matches_headers() {
        let (temp_dir, config) = create_test_env();
        let base = temp_dir.path();
        for i in 0..7 {
            write_file(base, &format!("dir{}/file{i}.txt", i % 3), format!("{i}"));
        }

        let summary = run(&config).unwrap();
        let artifact = read_artifact(&config);
        assert_eq!(summary.files_written, 7);
        assert_eq!(header_count(&artifact), summary.files_written);
    }

    #[test]
    fn test_invalid_utf8_still_recorded() {
        let (temp_dir, mut config) = create_test_env();
        let base = temp_dir.path();
        write_file(base, "blob.bin", [b'o', b'k', 0xff, 0xfe, b'!']);

        run(&config).unwrap();
        assert_eq!(
            records(&read_artifact(&config)),
            vec![("blob.bin".to_string(), "ok!".to_string())]
        );

        config.decode = DecodePolicy::Replace;
        run(&config).unwrap();
        assert_eq!(
            records(&read_artifact(&config)),
            vec![("blob.bin".to_string(), "ok\u{FFFD}\u{FFFD}!".to_string())]
        );
    }

    #[test]
    fn test_content_written_verbatim() {
        let (temp_dir, config) = create_test_env();
        write_file(temp_dir.path(), "crlf.txt", "a\r\nb\n");

        run(&config).unwrap();
        assert_eq!(
            read_artifact(&config),
            "--- Fil: crlf.txt ---\n\na\r\nb\n\n\n"
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_file_gets_placeholder() {
        let (temp_dir, config) = create_test_env();
        let base = temp_dir.path();
        write_file(base, "ok.txt", "data");
        // a dangling link fails to open regardless of the user's privileges
        std::os::unix::fs::symlink(base.join("gone"), base.join("locked.bin")).unwrap();

        let summary = run(&config).unwrap();
        assert_eq!(summary.files_written, 2);
        assert_eq!(summary.read_failures, 1);

        let artifact = read_artifact(&config);
        assert_eq!(header_count(&artifact), 2);
        assert!(artifact.contains("--- Fil: ok.txt ---\n\ndata\n\n"));
        assert!(artifact.contains(
            "--- Fil: locked.bin ---\n\n*** FEIL: Kunne ikke lese filen 'locked.bin'. Årsak: "
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_dirs_not_followed_by_default() {
        let (temp_dir, mut config) = create_test_env();
        let base = temp_dir.path();
        let outside = TempDir::new().unwrap();
        write_file(outside.path(), "linked.txt", "linked");
        write_file(base, "local.txt", "local");
        std::os::unix::fs::symlink(outside.path(), base.join("link")).unwrap();

        let summary = run(&config).unwrap();
        assert_eq!(summary.files_written, 1);
        assert!(!read_artifact(&config).contains("linked"));

        config.follow_links = true;
        let summary = run(&config).unwrap();
        assert_eq!(summary.files_written, 2);
        assert!(read_artifact(&config).contains("--- Fil: link/linked.txt ---"));
    }

    #[cfg(unix)]
    #[test]
    fn test_link_loop_skipped_and_walk_continues() {
        let (temp_dir, mut config) = create_test_env();
        let base = temp_dir.path();
        write_file(base, "a.txt", "a");
        write_file(base, "d/b.txt", "b");
        std::os::unix::fs::symlink(base, base.join("d/loop")).unwrap();
        config.follow_links = true;

        let summary = run(&config).unwrap();
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.files_written, 2);
        assert_eq!(
            records(&read_artifact(&config)),
            vec![
                ("a.txt".to_string(), "a".to_string()),
                ("d/b.txt".to_string(), "b".to_string()),
            ]
        );
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_output_write_failure() {
        let (temp_dir, mut config) = create_test_env();
        write_file(temp_dir.path(), "a.txt", "a");
        // every write to /dev/full fails with ENOSPC
        config.output_filename = "/dev/full".to_string();

        let result = run(&config);
        match result {
            Err(SrcdumpError::OutputWrite { path, .. }) => {
                assert_eq!(path, Path::new("/dev/full"));
            }
            other => panic!("expected write error, got {other:?}"),
        }
    }

    #[test]
    fn test_sorted_walk_is_pre_order() {
        let (temp_dir, mut config) = create_test_env();
        let base = temp_dir.path();
        write_file(base, "b.txt", "b");
        write_file(base, "a_dir/x.txt", "x");
        write_file(base, "c.txt", "c");
        config.sort = true;

        run(&config).unwrap();
        let artifact = read_artifact(&config);
        let order: Vec<&str> = artifact
            .lines()
            .filter_map(|l| l.strip_prefix("--- Fil: "))
            .collect();
        assert_eq!(order, ["a_dir/x.txt ---", "b.txt ---", "c.txt ---"]);
    }

    #[test]
    fn test_exclude_globs_prune_and_skip() {
        let (temp_dir, mut config) = create_test_env();
        let base = temp_dir.path();
        write_file(base, "web/app.js", "app");
        write_file(base, "web/app.min.js", "min");
        write_file(base, "docs/guide.md", "guide");
        config.rules = IgnoreRules::builder()
            .exclude(["**/*.min.js", "docs"])
            .build()
            .unwrap();

        let summary = run(&config).unwrap();
        assert_eq!(summary.files_written, 1);
        assert_eq!(
            records(&read_artifact(&config)),
            vec![("web/app.js".to_string(), "app".to_string())]
        );
    }

    #[test]
    fn test_empty_tree_creates_empty_artifact() {
        let (_temp_dir, config) = create_test_env();
        let summary = run(&config).unwrap();
        assert_eq!(summary, RunSummary::default());
        assert_eq!(read_artifact(&config), "");
    }

    #[test]
    fn test_artifact_truncated_each_run() {
        let (temp_dir, config) = create_test_env();
        fs::write(config.output_path(), "stale content from an older run").unwrap();
        write_file(temp_dir.path(), "a.txt", "fresh");

        run(&config).unwrap();
        assert_eq!(read_artifact(&config), "--- Fil: a.txt ---\n\nfresh\n\n");
    }

    #[test]
    fn test_output_open_failure() {
        let (temp_dir, config) = create_test_env();
        // a directory in the way of the artifact cannot be opened for writing
        fs::create_dir(temp_dir.path().join(DEFAULT_OUTPUT_FILENAME)).unwrap();

        let result = run(&config);
        assert!(matches!(result, Err(SrcdumpError::OutputOpen { .. })));
    }

    #[test]
    fn test_plan_matches_run() {
        let (temp_dir, config) = create_test_env();
        let base = temp_dir.path();
        write_file(base, "src/lib.rs", "pub fn x() {}");
        write_file(base, "node_modules/pkg/index.js", "x");
        write_file(base, "package-lock.json", "{}");

        let mut planned = plan(&config).unwrap();
        assert!(!config.output_path().exists());
        planned.sort_by(|a, b| a.path.cmp(&b.path));
        assert_eq!(
            planned,
            vec![PlannedFile {
                path: "src/lib.rs".to_string(),
                size: 13,
            }]
        );

        let summary = run(&config).unwrap();
        assert_eq!(summary.files_written, planned.len());
    }
}
