/// Injection and report rendering overhead
///
/// Measures the cost the profiler adds to a response: rendering the report
/// fragment and splicing it into bodies of increasing size.
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::time::Duration;

use reqprof::event_log::{EventLog, ViewDataSnapshot, ViewLimits};
use reqprof::inject::maybe_inject_bytes;
use reqprof::report::{build_report, RequestSummary};
use reqprof::timer::TimerEntry;

fn page(size: usize) -> Vec<u8> {
    let mut body = b"<!DOCTYPE html><html><body>".to_vec();
    while body.len() < size {
        body.extend_from_slice(b"<p>Lorem ipsum dolor sit amet</p>\n");
    }
    body.extend_from_slice(b"</body></html>");
    body
}

fn populated_log(entries: usize) -> EventLog {
    let events = EventLog::new();
    for i in 0..entries {
        let at = Duration::from_micros(i as u64 * 10);
        events.append_log("info", &format!("message {} <escaped>", i), at);
        events.append_timer(TimerEntry {
            name: format!("timer_{}", i),
            started_at: at,
            stopped_at: Some(at + Duration::from_micros(5)),
            laps: Vec::new(),
        });
        events.append_view_snapshot(ViewDataSnapshot::from_keys(
            "view",
            ["a", "b", "c"],
            ViewLimits::default(),
            at,
        ));
    }
    events
}

fn bench_inject(c: &mut Criterion) {
    let mut group = c.benchmark_group("inject");
    let fragment = b"<div id=\"reqprof\"></div>";

    for size in [1_024usize, 64 * 1_024, 1_024 * 1_024] {
        let body = page(size);
        group.throughput(Throughput::Bytes(body.len() as u64));
        group.bench_with_input(BenchmarkId::new("html", size), &body, |b, body| {
            b.iter(|| maybe_inject_bytes(Some("text/html"), black_box(body), fragment))
        });
        group.bench_with_input(BenchmarkId::new("json_passthrough", size), &body, |b, body| {
            b.iter(|| maybe_inject_bytes(Some("application/json"), black_box(body), fragment))
        });
    }
    group.finish();
}

fn bench_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("render");
    let summary = RequestSummary {
        total: Duration::from_millis(50),
        running: Vec::new(),
        toggle_path: "/_profiler/toggle".to_string(),
    };

    for entries in [10usize, 100, 1_000] {
        let events = populated_log(entries);
        group.bench_with_input(BenchmarkId::from_parameter(entries), &events, |b, events| {
            b.iter(|| build_report(black_box(events), &summary).to_html())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_inject, bench_render);
criterion_main!(benches);
