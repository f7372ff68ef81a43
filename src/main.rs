use clap::{Parser, ValueEnum};
use srcdump::config::{current_exe_name, resolve_root};
use srcdump::{
    DEFAULT_OUTPUT_FILENAME, DecodePolicy, DumpConfig, FileConfig, IgnoreRules, Result, plan, run,
};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use tracing::{Level, warn};
use tracing_subscriber::fmt::writer::MakeWriterExt;

const LONG_HELP: &str = r#"
Output format:
  --- Fil: <relative/path> ---

  <file contents>

  (unreadable files get a '*** FEIL: ... ***' placeholder instead)

Ignored by default:
  files:        package-lock.json, .env, the output file, .srcdump.toml,
                this executable
  directories:  assets, node_modules, .git, .vscode, __pycache__, .venv,
                venv, dist, build, market_data (at any depth)

Examples:
  # Snapshot the current directory
  srcdump
  # Snapshot another directory into a custom file
  srcdump --root ../project -o snapshot.txt
  # Also skip Rust build output and lock files
  srcdump --ignore-dir target --ignore-file Cargo.lock
  # Skip minified bundles anywhere in the tree
  srcdump -x '**/*.min.js'
  # See which files would be included
  srcdump --list
  # Same, as JSON for scripting
  srcdump --list=json

Config file:
  A '.srcdump.toml' in the root (or --config FILE) may set: output,
  ignore_files, ignore_dirs, exclude, decode, follow_links, sort,
  default_ignores. Command line flags take precedence.
"#;

/// Flatten a project tree into one text file.
#[derive(Parser, Debug)]
#[command(
    name = "srcdump",
    version,
    about = "Flatten a project tree into one text file for LLM context building.",
    after_long_help = LONG_HELP
)]
struct Cli {
    /// Directory to scan (defaults to the current directory)
    #[arg(short, long, value_name = "DIR", env = "SRCDUMP_ROOT")]
    root: Option<PathBuf>,

    /// Output file name, created inside the root
    #[arg(short, long, value_name = "NAME", env = "SRCDUMP_OUTPUT")]
    output: Option<String>,

    /// Config file (defaults to .srcdump.toml in the root, if present)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Additional file name to ignore (repeatable)
    #[arg(long = "ignore-file", value_name = "NAME", action = clap::ArgAction::Append)]
    ignore_files: Vec<String>,

    /// Additional directory name to prune at any depth (repeatable)
    #[arg(long = "ignore-dir", value_name = "NAME", action = clap::ArgAction::Append)]
    ignore_dirs: Vec<String>,

    /// Exclude glob matched against relative paths (repeatable)
    #[arg(short = 'x', long = "exclude", value_name = "GLOB", action = clap::ArgAction::Append)]
    exclude: Vec<String>,

    /// Do not use the built-in ignore lists
    #[arg(long)]
    no_default_ignores: bool,

    /// What to do with bytes that are not valid UTF-8
    #[arg(long, value_enum, value_name = "POLICY")]
    decode: Option<DecodeArg>,

    /// Follow symbolic links while walking
    #[arg(short = 'L', long)]
    follow_links: bool,

    /// Visit entries in file name order for reproducible output
    #[arg(short, long)]
    sort: bool,

    /// List files that would be included instead of writing the output
    #[arg(long, value_name = "FORMAT", num_args = 0..=1, default_missing_value = "plain")]
    list: Option<ListFormat>,

    /// Increase verbosity (can be used multiple times)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress progress output, keeping warnings and errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum DecodeArg {
    /// Drop invalid byte sequences
    Skip,
    /// Replace invalid byte sequences with U+FFFD
    Replace,
}

impl From<DecodeArg> for DecodePolicy {
    fn from(arg: DecodeArg) -> Self {
        match arg {
            DecodeArg::Skip => Self::Skip,
            DecodeArg::Replace => Self::Replace,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq)]
enum ListFormat {
    /// One relative path per line
    Plain,
    /// JSON array with path and size
    Json,
}

fn main() {
    let cli = Cli::parse();
    init_logging(&cli);

    if let Err(e) = run_cli(&cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

/// Progress goes to stdout, warnings and errors to stderr
fn init_logging(cli: &Cli) {
    let level = match (cli.quiet, cli.verbose) {
        (true, _) => Level::WARN,
        (false, 0) => Level::INFO,
        (false, 1) => Level::DEBUG,
        (false, _) => Level::TRACE,
    };

    let writer = std::io::stderr
        .with_max_level(Level::WARN)
        .or_else(std::io::stdout);

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(writer)
        .with_ansi(std::io::stdout().is_terminal())
        .with_target(false)
        .without_time()
        .init();
}

fn run_cli(cli: &Cli) -> Result<()> {
    let config = build_config(cli)?;

    if let Some(format) = cli.list {
        return list_files(&config, format);
    }

    let summary = run(&config)?;
    if summary.read_failures > 0 {
        warn!("{} file(s) could not be read", summary.read_failures);
    }
    if summary.skipped > 0 {
        warn!("{} entries were skipped", summary.skipped);
    }
    if !cli.quiet {
        println!(
            "\nDone! {} files were added to {}",
            summary.files_written, config.output_filename
        );
    }

    Ok(())
}

/// Merges command line flags over the config file over built-in defaults
fn build_config(cli: &Cli) -> Result<DumpConfig> {
    let root = match &cli.root {
        Some(root) => root.clone(),
        None => std::env::current_dir()?,
    };
    let root = resolve_root(root)?;

    let file_config = match &cli.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::discover(&root)?.unwrap_or_default(),
    };

    let output_filename = cli
        .output
        .clone()
        .or(file_config.output)
        .unwrap_or_else(|| DEFAULT_OUTPUT_FILENAME.to_string());
    let output_name = Path::new(&output_filename)
        .file_name()
        .map_or_else(|| output_filename.clone(), |n| n.to_string_lossy().into_owned());

    let use_defaults = !cli.no_default_ignores && file_config.default_ignores.unwrap_or(true);

    let rules = IgnoreRules::builder()
        .defaults(use_defaults)
        .output_filename(output_name)
        .self_name(current_exe_name())
        .ignore_files(file_config.ignore_files)
        .ignore_files(cli.ignore_files.iter().cloned())
        .ignore_dirs(file_config.ignore_dirs)
        .ignore_dirs(cli.ignore_dirs.iter().cloned())
        .exclude(file_config.exclude)
        .exclude(cli.exclude.iter().cloned())
        .build()?;

    Ok(DumpConfig {
        root,
        output_filename,
        rules,
        decode: cli
            .decode
            .map(DecodePolicy::from)
            .or(file_config.decode)
            .unwrap_or_default(),
        follow_links: cli.follow_links || file_config.follow_links.unwrap_or(false),
        sort: cli.sort || file_config.sort.unwrap_or(false),
    })
}

fn list_files(config: &DumpConfig, format: ListFormat) -> Result<()> {
    let planned = plan(config)?;

    match format {
        ListFormat::Plain => {
            for file in &planned {
                println!("{}", file.path);
            }
        }
        ListFormat::Json => {
            let json = serde_json::to_string_pretty(&planned)?;
            println!("{json}");
        }
    }

    Ok(())
}
