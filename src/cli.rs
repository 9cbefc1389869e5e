//! CLI module - Command-line interface definitions and handlers

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::core::limits::TokenLimitRule;
use crate::core::render::{OutputFormat, RenderConfig};
use crate::core::settings::Settings;
use crate::core::truncate::TruncationStrategy;

/// ctxpack - pack a source tree into one token-bounded text document.
#[derive(Parser, Debug)]
#[command(name = "ctxpack")]
#[command(
    author,
    version,
    about,
    long_about = r#"ctxpack discovers the files of a project, reads them, and assembles them
into a single document sized for an LLM context window.

Discovery uses git's file list inside a repository and a directory walk
elsewhere. Binary, oversized, and non-UTF-8 files are replaced by a short
marker. The assembled document is counted once and rejected when it exceeds
--max-total-tokens.

Settings are read from .ctxpack.toml in ROOT (or --config) and overridden by
flags.

Examples:
    ctxpack pack
    ctxpack pack src tests --type rs --output context.txt
    ctxpack pack --exclude 'vendor/**' --limit '*.lock=200' --stats
    ctxpack files --diff
    ctxpack tokens README.md
"#
)]
pub struct Cli {
    /// Root directory for all operations.
    #[arg(
        long,
        global = true,
        default_value = ".",
        value_name = "ROOT",
        long_help = "Root directory for all operations (defaults to the current directory).\n\n\
All paths in the output are relative to this root, and positional paths and\n\
patterns are interpreted relative to it."
    )]
    pub root: PathBuf,

    /// Settings file (defaults to ROOT/.ctxpack.toml when present).
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Tokenizer model.
    #[arg(
        long,
        global = true,
        env = "CTXPACK_MODEL",
        value_name = "MODEL",
        long_help = "Tokenizer model used for counting and truncation.\n\n\
Supported values: cl100k (default), o200k, gpt-4, gpt-4o, gpt-3.5-turbo, claude-3."
    )]
    pub model: Option<String>,

    /// Disable colored output (when applicable).
    #[arg(
        long,
        global = true,
        long_help = "Disable colored output. This is useful when piping to files or when your\n\
terminal does not support ANSI colors."
    )]
    pub no_color: bool,

    /// Quiet mode (errors only on stderr).
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Verbose mode (more diagnostics).
    #[arg(
        short,
        long,
        global = true,
        long_help = "Enable debug logging on stderr. RUST_LOG takes precedence when set."
    )]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Pack files into one document and print it.
    #[command(
        long_about = "Run discovery, read every file, and print the assembled document.\n\n\
Without --stats, files are kept whole and only the final document is tokenized.\n\
With --stats, every file is tokenized and cut to its token limit (keeping the\n\
first 75% and last 25% of the budget), and a summary is printed on stderr.\n\n\
Examples:\n\
  ctxpack pack\n\
  ctxpack pack src --format json --output ctx.json\n\
  ctxpack pack --diff --stats\n"
    )]
    Pack {
        #[command(flatten)]
        filters: FilterArgs,

        /// Output format (text/markdown/json).
        #[arg(long, default_value = "text", value_name = "FORMAT")]
        format: String,

        /// Pretty-print JSON output.
        #[arg(long)]
        pretty: bool,

        /// Write the document to FILE instead of stdout.
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Tokenize every file, apply per-file limits, and print a summary.
        #[arg(long)]
        stats: bool,

        /// Per-file token ceiling.
        #[arg(long, env = "CTXPACK_MAX_TOKENS", value_name = "N")]
        max_tokens: Option<usize>,

        /// Per-pattern token ceiling, PATTERN=N (repeatable; 0 skips the file).
        #[arg(
            long = "limit",
            value_name = "PATTERN=N",
            long_help = "Per-pattern token ceiling, as PATTERN=N. Repeatable.\n\n\
Patterns containing '/' match the relative path, others the file name.\n\
A limit of 0 replaces the file's content with a marker.\n\
Rules given here are checked before rules from the settings file."
        )]
        limits: Vec<TokenLimitRule>,

        /// How over-limit files are cut with --stats (head-tail/head).
        #[arg(long = "truncate", value_name = "STRATEGY")]
        truncation: Option<TruncationStrategy>,

        /// Abort when the assembled document exceeds N tokens.
        #[arg(long, value_name = "N")]
        max_total_tokens: Option<usize>,

        /// Skip files larger than N bytes.
        #[arg(long, value_name = "BYTES")]
        max_file_size: Option<u64>,

        /// Abort instead of skipping files larger than --max-file-size.
        #[arg(long)]
        fail_on_large_file: bool,
    },

    /// List the files a pack would include.
    #[command(
        long_about = "Run discovery only and print one relative path per line, in the order\n\
they would be packed.\n\n\
Examples:\n\
  ctxpack files\n\
  ctxpack files --type py --exclude 'tests/**'\n"
    )]
    Files {
        #[command(flatten)]
        filters: FilterArgs,
    },

    /// Count the tokens of a file (or stdin).
    Tokens {
        /// File to count; reads stdin when omitted.
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },
}

/// Discovery options shared by `pack` and `files`
#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Files, directories, or glob patterns (relative to ROOT).
    #[arg(value_name = "PATHS")]
    pub paths: Vec<PathBuf>,

    /// Keep only files matching this glob (repeatable).
    #[arg(long = "include", value_name = "GLOB")]
    pub include: Vec<String>,

    /// Drop files matching this glob (repeatable).
    #[arg(short = 'e', long = "exclude", value_name = "GLOB")]
    pub exclude: Vec<String>,

    /// Keep only files under this directory (repeatable).
    #[arg(long = "include-dir", value_name = "DIR")]
    pub include_dirs: Vec<String>,

    /// Never descend into this directory (repeatable).
    #[arg(long = "exclude-dir", value_name = "DIR")]
    pub exclude_dirs: Vec<String>,

    /// Keep only files with this extension (repeatable).
    #[arg(short = 't', long = "type", value_name = "EXT")]
    pub types: Vec<String>,

    /// Include hidden files/directories (dotfiles).
    #[arg(long)]
    pub hidden: bool,

    /// Disable .gitignore and other ignore rules during a walk.
    #[arg(long)]
    pub no_ignore: bool,

    /// Walk the filesystem even inside a git repository.
    #[arg(long, conflicts_with = "diff")]
    pub no_git: bool,

    /// Only uncommitted changes (requires a git repository).
    #[arg(long)]
    pub diff: bool,

    /// Abort when discovery finds more than N files.
    #[arg(long, value_name = "N")]
    pub max_files: Option<usize>,
}

impl FilterArgs {
    /// Overlay these flags on loaded settings
    pub fn apply(self, settings: &mut Settings) {
        if !self.paths.is_empty() {
            settings.paths = self.paths;
        }
        settings.include_patterns.extend(self.include);
        settings.exclude_patterns.extend(self.exclude);
        settings.include_dirs.extend(self.include_dirs);
        settings.exclude_dirs.extend(self.exclude_dirs);
        settings.types.extend(self.types);
        settings.hidden |= self.hidden;
        if self.no_ignore {
            settings.respect_ignore_files = false;
        }
        if self.no_git {
            settings.use_git = false;
        }
        settings.diff_only |= self.diff;
        if let Some(max_files) = self.max_files {
            settings.limits.max_files = max_files;
        }
    }
}

/// Execute the parsed command line
pub fn run(cli: Cli) -> Result<()> {
    if cli.no_color {
        colored::control::set_override(false);
    }

    let root = cli.root.canonicalize().unwrap_or(cli.root);
    let mut settings = Settings::load_for_root(&root, cli.config.as_deref())?;
    if let Some(model) = cli.model {
        settings.model = model;
    }

    match cli.command {
        Commands::Pack {
            filters,
            format,
            pretty,
            output,
            stats,
            max_tokens,
            limits,
            truncation,
            max_total_tokens,
            max_file_size,
            fail_on_large_file,
        } => {
            filters.apply(&mut settings);
            if let Some(max_tokens) = max_tokens {
                settings.max_tokens_per_file = max_tokens;
            }
            if !limits.is_empty() {
                let from_file = std::mem::take(&mut settings.token_limits);
                settings.token_limits = limits.into_iter().chain(from_file).collect();
            }
            if let Some(truncation) = truncation {
                settings.truncation = truncation;
            }
            if let Some(max_total_tokens) = max_total_tokens {
                settings.limits.max_total_tokens = max_total_tokens;
            }
            if let Some(max_file_size) = max_file_size {
                settings.limits.max_file_size = max_file_size;
            }
            settings.fail_on_large_file |= fail_on_large_file;
            settings.eager_tokenization |= stats;

            let format: OutputFormat = format.parse().map_err(anyhow::Error::msg)?;
            let render = RenderConfig::with_pretty(format, pretty);
            crate::flows::pack::run_pack(&settings, render, output.as_deref(), stats)
        }

        Commands::Files { filters } => {
            filters.apply(&mut settings);
            crate::flows::pack::run_files(&settings)
        }

        Commands::Tokens { file } => {
            crate::flows::pack::run_tokens(file.as_deref(), settings.token_model()?)
        }
    }
}
