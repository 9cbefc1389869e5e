//! Renderer module
//!
//! Assembles processed file records into the document that gets tokenized
//! and delivered: text, markdown, or json.

use crate::core::model::{FileContent, FileRecord};

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Markdown,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(OutputFormat::Text),
            "md" | "markdown" => Ok(OutputFormat::Markdown),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown format: {}", s)),
        }
    }
}

/// Render configuration combining format and options
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderConfig {
    pub format: OutputFormat,
    pub pretty: bool,
}

impl RenderConfig {
    #[cfg(test)]
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            pretty: false,
        }
    }

    pub fn with_pretty(format: OutputFormat, pretty: bool) -> Self {
        Self { format, pretty }
    }
}

/// Renderer for file records
pub struct Renderer {
    config: RenderConfig,
}

impl Renderer {
    #[cfg(test)]
    pub fn new(format: OutputFormat) -> Self {
        Self {
            config: RenderConfig::new(format),
        }
    }

    pub fn with_config(config: RenderConfig) -> Self {
        Self { config }
    }

    /// Render records in the order given
    pub fn render(&self, records: &[FileRecord]) -> String {
        match self.config.format {
            OutputFormat::Text => self.render_text(records),
            OutputFormat::Markdown => self.render_markdown(records),
            OutputFormat::Json => self.render_json(records),
        }
    }

    fn render_text(&self, records: &[FileRecord]) -> String {
        let mut output = String::new();
        for record in records {
            output.push_str(&format!("=== {} ===\n", record.relative_path));
            push_body(&mut output, &record.content);
            if record.truncated {
                output.push_str(&format!(
                    "[truncated: {} of {} tokens kept]\n",
                    record.token_count, record.original_token_count
                ));
            }
            output.push('\n');
        }
        output
    }

    fn render_markdown(&self, records: &[FileRecord]) -> String {
        let mut output = String::new();
        for record in records {
            output.push_str(&format!("## `{}`\n\n", record.relative_path));
            match &record.content {
                FileContent::Text(text) => {
                    let fence = fence_for(text);
                    output.push_str(&fence);
                    output.push_str(language_hint(&record.relative_path));
                    output.push('\n');
                    output.push_str(text);
                    if !text.ends_with('\n') {
                        output.push('\n');
                    }
                    output.push_str(&fence);
                    output.push('\n');
                }
                FileContent::Skipped(reason) => {
                    output.push_str(&format!("> {}\n", reason.sentinel()));
                }
            }
            if record.truncated {
                output.push_str(&format!(
                    "\n> Content was truncated ({} of {} tokens kept)\n",
                    record.token_count, record.original_token_count
                ));
            }
            output.push('\n');
        }
        output
    }

    fn render_json(&self, records: &[FileRecord]) -> String {
        let value: Vec<serde_json::Value> = records
            .iter()
            .map(|r| {
                serde_json::json!({
                    "path": r.relative_path,
                    "content": r.content.as_display(),
                    "skipped": r.content.is_skipped(),
                    "truncated": r.truncated,
                    "tokens": r.token_count,
                    "original_tokens": r.original_token_count,
                })
            })
            .collect();

        if self.config.pretty {
            serde_json::to_string_pretty(&value).unwrap_or_else(|_| "[]".to_string())
        } else {
            serde_json::to_string(&value).unwrap_or_else(|_| "[]".to_string())
        }
    }
}

fn push_body(output: &mut String, content: &FileContent) {
    let body = content.as_display();
    output.push_str(body);
    if !body.ends_with('\n') {
        output.push('\n');
    }
}

/// A backtick fence longer than any run inside the text
fn fence_for(text: &str) -> String {
    let mut longest = 0;
    let mut run = 0;
    for c in text.chars() {
        if c == '`' {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 0;
        }
    }
    "`".repeat((longest + 1).max(3))
}

fn language_hint(path: &str) -> &'static str {
    let ext = path.rsplit_once('.').map(|(_, e)| e).unwrap_or("");
    match ext {
        "rs" => "rust",
        "py" => "python",
        "js" | "mjs" | "cjs" => "javascript",
        "ts" | "tsx" => "typescript",
        "go" => "go",
        "java" => "java",
        "kt" => "kotlin",
        "swift" => "swift",
        "php" => "php",
        "rb" => "ruby",
        "c" | "h" => "c",
        "cc" | "cpp" | "hpp" => "cpp",
        "cs" => "csharp",
        "sh" => "bash",
        "toml" => "toml",
        "yaml" | "yml" => "yaml",
        "json" => "json",
        "md" => "markdown",
        _ => "",
    }
}
