//! Report aggregation and HTML rendering
//!
//! The report is built from a snapshot of the event log and is a pure
//! function of it plus the request summary. Every string captured from the
//! application is escaped before it reaches the fragment, since the fragment
//! is spliced into a live page.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::time::Duration;

use serde::Serialize;

use crate::error::Result;
use crate::event_log::{Entry, EventLog, ViewDataSnapshot};

/// Facts about the request that the event log does not carry
#[derive(Debug, Clone, Default)]
pub struct RequestSummary {
    /// Wall time from session start to report time
    pub total: Duration,
    /// Timers that were never stopped
    pub running: Vec<String>,
    /// Where the "disable" link in the fragment points
    pub toggle_path: String,
}

/// Per-timer line of the breakdown
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimerRow {
    pub name: String,
    pub started_ms: f64,
    pub elapsed_ms: f64,
    /// Share of the total request time, 0-100
    pub share_pct: f64,
    pub laps_ms: Vec<f64>,
}

/// A log message as shown in the report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogRow {
    pub level: String,
    pub message: String,
    pub at_ms: f64,
}

/// Aggregated view of one request, ready to render
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub total_ms: f64,
    /// Finished timers in start order
    pub timers: Vec<TimerRow>,
    pub running: Vec<String>,
    /// Log messages in append order
    pub logs: Vec<LogRow>,
    pub level_counts: BTreeMap<String, usize>,
    /// View snapshots in append order
    pub views: Vec<ViewDataSnapshot>,
    #[serde(skip)]
    toggle_path: String,
}

fn as_ms(duration: Duration) -> f64 {
    duration.as_nanos() as f64 / 1_000_000.0
}

/// Aggregate the event log into a report without modifying it
pub fn build_report(events: &EventLog, summary: &RequestSummary) -> Report {
    let total_ms = as_ms(summary.total);

    let mut timer_entries = Vec::new();
    let mut logs = Vec::new();
    let mut views = Vec::new();
    let mut level_counts: BTreeMap<String, usize> = BTreeMap::new();

    for entry in events.all_entries() {
        match entry {
            Entry::Timer(timer) => timer_entries.push(timer),
            Entry::Log(log) => {
                *level_counts.entry(log.level.clone()).or_default() += 1;
                logs.push(LogRow {
                    level: log.level,
                    message: log.message,
                    at_ms: as_ms(log.at),
                });
            }
            Entry::View(view) => views.push(view),
        }
    }

    // Stable: timers started at the same instant keep append order
    timer_entries.sort_by_key(|timer| timer.started_at);

    let timers = timer_entries
        .into_iter()
        .map(|timer| {
            let elapsed_ms = timer.elapsed().map(as_ms).unwrap_or_default();
            let share_pct = if total_ms > 0.0 {
                (elapsed_ms * 100.0 / total_ms).min(100.0)
            } else {
                0.0
            };
            TimerRow {
                started_ms: as_ms(timer.started_at),
                elapsed_ms,
                share_pct,
                laps_ms: timer.laps.iter().copied().map(as_ms).collect(),
                name: timer.name,
            }
        })
        .collect();

    Report {
        total_ms,
        timers,
        running: summary.running.clone(),
        logs,
        level_counts,
        views,
        toggle_path: summary.toggle_path.clone(),
    }
}

/// Escape HTML special characters to prevent XSS
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Styles are scoped to the fragment root so the host page is unaffected
fn styles() -> &'static str {
    r#"
        #reqprof {
            position: fixed;
            bottom: 0;
            left: 0;
            right: 0;
            max-height: 40%;
            overflow: auto;
            z-index: 99999;
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            font-size: 12px;
            background-color: #f5f5f5;
            border-top: 2px solid #4a90d9;
            padding: 8px 12px;
            color: #333;
        }
        #reqprof h2 {
            font-size: 13px;
            margin: 8px 0 4px;
        }
        #reqprof table {
            border-collapse: collapse;
            width: 100%;
            background-color: white;
        }
        #reqprof th, #reqprof td {
            border: 1px solid #ddd;
            padding: 4px 6px;
            text-align: left;
        }
        #reqprof th {
            background-color: #4a90d9;
            color: white;
        }
        #reqprof .mono {
            font-family: monospace;
        }
        #reqprof .level-error, #reqprof .level-critical {
            color: #cc0000;
        }
        #reqprof .level-warning {
            color: #b36b00;
        }
        #reqprof .running {
            color: #888;
            font-style: italic;
        }
    "#
}

impl Report {
    /// Render the report as a self-contained HTML fragment
    pub fn to_html(&self) -> Result<String> {
        let mut html = String::new();

        html.push_str("<div id=\"reqprof\">\n");
        html.push_str("<style>");
        html.push_str(styles());
        html.push_str("</style>\n");

        writeln!(
            html,
            "<div class=\"summary\"><strong>Request time:</strong> <span class=\"mono\">{:.3} ms</span> &middot; {} timers &middot; {} logs &middot; {} views &middot; <a href=\"{}\">Disable profiler</a></div>",
            self.total_ms,
            self.timers.len(),
            self.logs.len(),
            self.views.len(),
            escape_html(&self.toggle_path)
        )?;

        self.render_timers(&mut html)?;
        self.render_logs(&mut html)?;
        self.render_views(&mut html)?;

        html.push_str("</div>\n");
        Ok(html)
    }

    fn render_timers(&self, html: &mut String) -> Result<()> {
        if self.timers.is_empty() && self.running.is_empty() {
            return Ok(());
        }

        html.push_str("<h2>Timers</h2>\n<table>\n");
        html.push_str("<tr><th>Timer</th><th>Start</th><th>Elapsed</th><th>%</th><th>Laps</th></tr>\n");
        for timer in &self.timers {
            let laps: Vec<String> = timer
                .laps_ms
                .iter()
                .map(|lap| format!("{:.3}", lap))
                .collect();
            writeln!(
                html,
                "<tr><td class=\"mono\">{}</td><td>{:.3} ms</td><td>{:.3} ms</td><td>{:.1}</td><td>{}</td></tr>",
                escape_html(&timer.name),
                timer.started_ms,
                timer.elapsed_ms,
                timer.share_pct,
                laps.join(", ")
            )?;
        }
        for name in &self.running {
            writeln!(
                html,
                "<tr class=\"running\"><td class=\"mono\">{}</td><td colspan=\"4\">still running</td></tr>",
                escape_html(name)
            )?;
        }
        html.push_str("</table>\n");
        Ok(())
    }

    fn render_logs(&self, html: &mut String) -> Result<()> {
        if self.logs.is_empty() {
            return Ok(());
        }

        let counts: Vec<String> = self
            .level_counts
            .iter()
            .map(|(level, count)| format!("{}: {}", escape_html(level), count))
            .collect();
        writeln!(html, "<h2>Logs ({})</h2>", counts.join(", "))?;

        html.push_str("<table>\n<tr><th>At</th><th>Level</th><th>Message</th></tr>\n");
        for log in &self.logs {
            let level = escape_html(&log.level);
            writeln!(
                html,
                "<tr><td>{:.3} ms</td><td class=\"level-{}\">{}</td><td class=\"mono\">{}</td></tr>",
                log.at_ms,
                level.to_ascii_lowercase(),
                level,
                escape_html(&log.message)
            )?;
        }
        html.push_str("</table>\n");
        Ok(())
    }

    fn render_views(&self, html: &mut String) -> Result<()> {
        if self.views.is_empty() {
            return Ok(());
        }

        html.push_str("<h2>Views</h2>\n<table>\n");
        html.push_str("<tr><th>View</th><th>Data keys</th><th>Size</th><th>Preview</th></tr>\n");
        for view in &self.views {
            let mut keys: Vec<String> = view.keys.iter().map(|k| escape_html(k)).collect();
            if view.dropped_keys > 0 {
                keys.push(format!("(+{} more)", view.dropped_keys));
            }
            let size = view
                .data_size
                .map(|bytes| format!("{} B", bytes))
                .unwrap_or_default();
            writeln!(
                html,
                "<tr><td class=\"mono\">{}</td><td class=\"mono\">{}</td><td>{}</td><td class=\"mono\">{}</td></tr>",
                escape_html(&view.view),
                keys.join(", "),
                size,
                escape_html(view.preview.as_deref().unwrap_or(""))
            )?;
        }
        html.push_str("</table>\n");
        Ok(())
    }

    /// Export the report as pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
