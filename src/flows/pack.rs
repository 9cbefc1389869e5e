//! Packing flow - Discover, read, truncate, assemble, and count
//!
//! Nothing is printed until the whole document has been assembled and the
//! total token count checked, so a failed run never leaves partial output.

use anyhow::{Context, Result};
use colored::Colorize;
use std::fs;
use std::io::{self, Read};
use std::path::Path;
use std::sync::Arc;

use crate::core::error::PackError;
use crate::core::limits::TokenLimits;
use crate::core::model::PackResult;
use crate::core::render::{RenderConfig, Renderer};
use crate::core::settings::Settings;
use crate::core::tokenizer::{load_tokenizer, TokenModel, Tokenizer};
use crate::core::util::format_bytes;
use crate::flows::aggregate::{default_parallelism, worker_pool, TokenCounter};
use crate::flows::discover::FileDiscovery;
use crate::flows::process::{FileProcessor, ProcessOptions};

/// Run the full pipeline and return the assembled document
pub fn pack(
    settings: &Settings,
    tokenizer: Arc<dyn Tokenizer>,
    render: RenderConfig,
) -> std::result::Result<PackResult, PackError> {
    settings.validate()?;
    let pool = worker_pool(default_parallelism())?;

    let discovery = FileDiscovery::new(settings)?.discover()?;
    let limits = TokenLimits::new(settings.max_tokens_per_file, &settings.token_limits)?;

    let processor = FileProcessor::new(
        limits,
        Arc::clone(&tokenizer),
        Arc::clone(&pool),
        ProcessOptions {
            max_file_size: settings.limits.max_file_size,
            fail_on_large_file: settings.fail_on_large_file,
            eager: settings.eager_tokenization,
            strategy: settings.truncation,
        },
    );
    let records = processor.process(&discovery.files)?;

    let output = Renderer::with_config(render).render(&records);
    let counter = TokenCounter::new(Arc::clone(&tokenizer), pool);
    let total_tokens = counter.enforce(&output, settings.limits.max_total_tokens)?;

    Ok(PackResult {
        file_count: records.len(),
        records,
        output,
        total_tokens,
        mode: discovery.mode,
        token_model: tokenizer.name().to_string(),
    })
}

/// Run the pack command
pub fn run_pack(
    settings: &Settings,
    render: RenderConfig,
    output: Option<&Path>,
    show_stats: bool,
) -> Result<()> {
    let model = settings.token_model()?;
    let tokenizer = load_tokenizer(model)?;
    let result = pack(settings, tokenizer, render)?;

    match output {
        Some(path) => fs::write(path, &result.output)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => print!("{}", result.output),
    }

    if show_stats {
        print_stats(&result, output);
    }

    Ok(())
}

fn print_stats(result: &PackResult, output: Option<&Path>) {
    eprintln!("{}", "Pack Statistics".cyan().bold());
    eprintln!("  {} {}", "Files:".dimmed(), result.file_count);
    eprintln!("  {} {}", "Discovery:".dimmed(), result.mode);
    eprintln!("  {} {}", "Size:".dimmed(), format_bytes(result.output.len()));
    eprintln!(
        "  {} {} (model: {})",
        "Tokens:".dimmed(),
        result.total_tokens,
        result.token_model
    );

    let skipped = result.skipped_count();
    if skipped > 0 {
        eprintln!("  {} {}", "Skipped:".yellow(), skipped);
    }
    let truncated = result.truncated_count();
    if truncated > 0 {
        eprintln!("  {} {}", "Truncated:".yellow(), truncated);
        for record in result.records.iter().filter(|r| r.truncated) {
            eprintln!(
                "    {} {} -> {}",
                record.relative_path,
                record.original_token_count,
                record.token_count
            );
        }
    }
    if let Some(path) = output {
        eprintln!("{} Output written to {}", "✓".green(), path.display());
    }
}

/// Run the files command (discovery only)
pub fn run_files(settings: &Settings) -> Result<()> {
    settings.validate()?;
    let discovery = FileDiscovery::new(settings)?.discover()?;
    tracing::debug!("{} files via {}", discovery.files.len(), discovery.mode);

    for file in &discovery.files {
        println!("{}", file.relative_path);
    }
    Ok(())
}

/// Run the tokens command on a file, or stdin when no file is given
pub fn run_tokens(file: Option<&Path>, model: TokenModel) -> Result<()> {
    let text = match file {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("failed to read stdin")?;
            buffer
        }
    };

    let tokenizer = load_tokenizer(model)?;
    let counter = TokenCounter::new(tokenizer, worker_pool(default_parallelism())?);
    println!("{}", counter.count(&text));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::limits::TokenLimitRule;
    use crate::core::model::{DiscoveryMode, FileContent, SkipReason};
    use crate::core::render::OutputFormat;
    use crate::core::tokenizer::testing::CharTokenizer;
    use std::path::Path;
    use tempfile::tempdir;

    fn touch(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    fn settings(root: &Path) -> Settings {
        Settings {
            root: root.to_path_buf(),
            use_git: false,
            ..Default::default()
        }
    }

    fn text() -> RenderConfig {
        RenderConfig::new(OutputFormat::Text)
    }

    #[test]
    fn test_pack_assembles_in_order() {
        let temp = tempdir().unwrap();
        touch(temp.path(), "src/main.rs", "fn main() {}\n");
        touch(temp.path(), "README.md", "# demo\n");
        touch(temp.path(), "logo.png", "\0PNG");

        let result = pack(&settings(temp.path()), Arc::new(CharTokenizer), text()).unwrap();
        assert_eq!(result.mode, DiscoveryMode::Walk);
        assert_eq!(result.file_count, 3);
        assert_eq!(result.skipped_count(), 1);
        assert_eq!(
            result.output,
            "=== README.md ===\n# demo\n\n\
=== logo.png ===\n[binary file]\n\n\
=== src/main.rs ===\nfn main() {}\n\n"
        );
        assert_eq!(result.total_tokens, result.output.chars().count());
        assert_eq!(result.token_model, "chars");
    }

    #[test]
    fn test_pack_deferred_mode_does_not_truncate() {
        let temp = tempdir().unwrap();
        touch(temp.path(), "big.txt", &"x".repeat(200));

        let settings = Settings {
            max_tokens_per_file: 10,
            ..settings(temp.path())
        };
        let result = pack(&settings, Arc::new(CharTokenizer), text()).unwrap();
        assert_eq!(result.truncated_count(), 0);
        assert_eq!(result.records[0].content, FileContent::Text("x".repeat(200)));
    }

    #[test]
    fn test_pack_eager_mode_truncates() {
        let temp = tempdir().unwrap();
        touch(temp.path(), "big.txt", &"x".repeat(200));

        let settings = Settings {
            max_tokens_per_file: 10,
            eager_tokenization: true,
            ..settings(temp.path())
        };
        let result = pack(&settings, Arc::new(CharTokenizer), text()).unwrap();
        assert_eq!(result.truncated_count(), 1);
        assert_eq!(result.records[0].token_count, 10);
        assert_eq!(result.records[0].original_token_count, 200);
        assert!(result.output.contains("[190 tokens truncated]"));
    }

    #[test]
    fn test_pack_zero_limit_rule_excludes() {
        let temp = tempdir().unwrap();
        touch(temp.path(), "docs/guide.md", "long guide");
        touch(temp.path(), "src/lib.rs", "pub fn f() {}");

        let settings = Settings {
            token_limits: vec![TokenLimitRule::new("docs/**", 0)],
            ..settings(temp.path())
        };
        let result = pack(&settings, Arc::new(CharTokenizer), text()).unwrap();
        assert_eq!(
            result.records[0].content,
            FileContent::Skipped(SkipReason::Excluded)
        );
        assert!(result.output.contains("[excluded by token limit]"));
        assert!(!result.output.contains("long guide"));
    }

    #[test]
    fn test_pack_too_many_tokens() {
        let temp = tempdir().unwrap();
        touch(temp.path(), "a.txt", &"word ".repeat(100));

        let mut settings = settings(temp.path());
        settings.limits.max_total_tokens = 50;
        let err = pack(&settings, Arc::new(CharTokenizer), text()).unwrap_err();
        assert!(matches!(err, PackError::TooManyTokens { limit: 50, .. }));
    }

    #[test]
    fn test_pack_too_many_files_stops_before_reading() {
        let temp = tempdir().unwrap();
        for i in 0..15 {
            touch(temp.path(), &format!("f{i}.txt"), "x");
        }
        let mut settings = settings(temp.path());
        settings.limits.max_files = 10;

        let err = pack(&settings, Arc::new(CharTokenizer), text()).unwrap_err();
        assert!(matches!(
            err,
            PackError::TooManyFiles {
                found: 15,
                limit: 10
            }
        ));
    }

    #[test]
    fn test_pack_json_output() {
        let temp = tempdir().unwrap();
        touch(temp.path(), "a.py", "print('hi')\n");

        let result = pack(
            &settings(temp.path()),
            Arc::new(CharTokenizer),
            RenderConfig::new(OutputFormat::Json),
        )
        .unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&result.output).unwrap();
        assert_eq!(parsed[0]["path"], "a.py");
        assert_eq!(parsed[0]["content"], "print('hi')\n");
    }
}
