//! reqprof - request-lifecycle profiler for HTTP applications
//!
//! This library records named timers, log messages and view data snapshots
//! while a single request is handled, aggregates them into a report and
//! splices that report into outgoing HTML responses. Profiling is gated per
//! request by configuration and a session-scoped override, and fails open:
//! an error in the profiler never alters the response.
//!
//! ```
//! use reqprof::config::ProfilerConfig;
//! use reqprof::profiler::{Profiler, RequestInfo};
//!
//! let profiler = Profiler::with_memory_store(ProfilerConfig {
//!     enabled: Some(true),
//!     ..ProfilerConfig::default()
//! });
//! let request = RequestInfo::new("/").with_session("abc");
//!
//! let session = profiler.begin(&request).unwrap();
//! session.measure("render", || "<p>hi</p>").unwrap();
//! session.log("info", "rendered");
//!
//! let body = profiler.finish(session, Some("text/html"), b"<body>hi</body>".to_vec());
//! assert!(String::from_utf8(body).unwrap().contains("id=\"reqprof\""));
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod event_log;
pub mod gate;
pub mod inject;
pub mod profiler;
pub mod report;
pub mod session;
pub mod timer;

pub use error::{ProfilerError, Result};
pub use profiler::{Profiler, RequestInfo, ToggleOutcome};
pub use session::{HookEvent, ProfileSession};
