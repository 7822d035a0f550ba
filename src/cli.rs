//! CLI argument parsing for reqprof

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// What to write to stdout
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// The response body, with the report injected when eligible (default)
    Html,
    /// The aggregated report as JSON
    Json,
}

/// A `LEVEL=MESSAGE` log line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogArg {
    pub level: String,
    pub message: String,
}

/// A `VIEW=key1,key2` view snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewArg {
    pub view: String,
    pub keys: Vec<String>,
}

fn parse_log(raw: &str) -> Result<LogArg, String> {
    let (level, message) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected LEVEL=MESSAGE, got {:?}", raw))?;
    if level.is_empty() {
        return Err("log level must not be empty".to_string());
    }
    Ok(LogArg {
        level: level.to_string(),
        message: message.to_string(),
    })
}

fn parse_view(raw: &str) -> Result<ViewArg, String> {
    let (view, keys) = raw.split_once('=').unwrap_or((raw, ""));
    if view.is_empty() {
        return Err("view name must not be empty".to_string());
    }
    Ok(ViewArg {
        view: view.to_string(),
        keys: keys
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .collect(),
    })
}

#[derive(Parser, Debug)]
#[command(name = "reqprof")]
#[command(version)]
#[command(about = "Profile a simulated request and inject the report into its HTML body", long_about = None)]
pub struct Cli {
    /// Profiler configuration file (TOML); unusable files disable the profiler
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Force the profiler on, ignoring configuration
    #[arg(long)]
    pub enable: bool,

    /// Declared content type of the response body
    #[arg(
        long = "content-type",
        value_name = "TYPE",
        default_value = "text/html; charset=utf-8"
    )]
    pub content_type: String,

    /// Log message to record, as LEVEL=MESSAGE (repeatable)
    #[arg(short, long = "log", value_name = "LEVEL=MESSAGE", value_parser = parse_log)]
    pub logs: Vec<LogArg>,

    /// View to record, as NAME=key1,key2 (repeatable)
    #[arg(long = "view", value_name = "NAME=KEYS", value_parser = parse_view)]
    pub views: Vec<ViewArg>,

    /// Output format
    #[arg(long = "format", value_enum, default_value = "html")]
    pub format: OutputFormat,

    /// Treat the request as an AJAX request
    #[arg(long)]
    pub ajax: bool,

    /// Enable debug tracing output to stderr
    #[arg(long)]
    pub debug: bool,

    /// Response body to read (stdin when omitted)
    pub input: Option<PathBuf>,
}
