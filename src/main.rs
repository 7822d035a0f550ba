use std::io::{Read, Write};

use anyhow::{Context, Result};
use clap::Parser;
use reqprof::cli::{Cli, OutputFormat};
use reqprof::config::ProfilerConfig;
use reqprof::gate::RequestKind;
use reqprof::profiler::{Profiler, RequestInfo};
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber for debug output
fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into())
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(args: &Cli) -> ProfilerConfig {
    let mut config = match &args.config {
        Some(path) => ProfilerConfig::load_or_disabled(path),
        None => ProfilerConfig::default(),
    }
    .with_env_overrides();

    if args.enable {
        config.enabled = Some(true);
    }
    config
}

fn read_body(args: &Cli) -> Result<Vec<u8>> {
    match &args.input {
        Some(path) => {
            std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
        }
        None => {
            let mut body = Vec::new();
            std::io::stdin()
                .read_to_end(&mut body)
                .context("Failed to read response body from stdin")?;
            Ok(body)
        }
    }
}

fn main() -> Result<()> {
    let args = Cli::parse();

    init_tracing(args.debug);

    let profiler = Profiler::with_memory_store(load_config(&args));
    let request = RequestInfo::new("/")
        .with_session("cli")
        .with_kind(RequestKind {
            console: false,
            ajax: args.ajax,
        });

    let session = profiler.begin(&request);
    let body = match &session {
        Some(session) => session.measure("read_body", || read_body(&args))??,
        None => read_body(&args)?,
    };

    let output = match session {
        Some(session) => {
            for log in &args.logs {
                session.log(&log.level, &log.message);
            }
            for view in &args.views {
                session.view_keys(&view.view, view.keys.iter().cloned());
            }

            match args.format {
                OutputFormat::Html => {
                    profiler.finish(session, Some(args.content_type.as_str()), body)
                }
                OutputFormat::Json => session
                    .report(&profiler.config().toggle_path)
                    .to_json()?
                    .into_bytes(),
            }
        }
        None => match args.format {
            OutputFormat::Html => body,
            OutputFormat::Json => b"null".to_vec(),
        },
    };

    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(&output)
        .context("Failed to write output")?;
    stdout.flush()?;

    Ok(())
}
