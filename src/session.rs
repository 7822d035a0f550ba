//! Per-request profiling session
//!
//! A `ProfileSession` is created when the activation gate admits a request
//! and is dropped with it. Hosts hand it to whatever handles the request
//! (request extensions, handler arguments); there is no process-wide
//! profiler instance.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::Value;

use crate::error::Result;
use crate::event_log::{EventLog, ViewDataSnapshot, ViewLimits};
use crate::report::{build_report, Report, RequestSummary};
use crate::timer::{Clock, MonotonicClock, StopOutcome, Timers};

/// Lifecycle hooks the host framework forwards to a session
#[derive(Debug, Clone, Copy)]
pub enum HookEvent<'a> {
    /// A view started composing with `data`
    ViewComposing { view: &'a str, data: &'a Value },
    /// The application emitted a log message
    LogEmitted { level: &'a str, message: &'a str },
}

/// Everything captured for one request
#[derive(Debug)]
pub struct ProfileSession {
    clock: Box<dyn Clock>,
    timers: Mutex<Timers>,
    events: EventLog,
    limits: ViewLimits,
}

impl ProfileSession {
    /// Session timed by the wall clock, starting now
    pub fn new(limits: ViewLimits) -> Self {
        Self::with_clock(Box::new(MonotonicClock::new()), limits)
    }

    pub fn with_clock(clock: Box<dyn Clock>, limits: ViewLimits) -> Self {
        Self {
            clock,
            timers: Mutex::new(Timers::new()),
            events: EventLog::new(),
            limits,
        }
    }

    fn timers(&self) -> MutexGuard<'_, Timers> {
        self.timers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Time since the session started
    pub fn now(&self) -> Duration {
        self.clock.now()
    }

    pub fn start(&self, name: &str) -> Result<()> {
        let now = self.clock.now();
        self.timers().start(name, now)
    }

    /// Stop `name`, returning its elapsed time
    ///
    /// A finished run is appended to the event log exactly once; stopping it
    /// again only reports the recorded duration.
    pub fn stop(&self, name: &str) -> Result<Duration> {
        let now = self.clock.now();
        let outcome = self.timers().stop(name, now)?;
        let elapsed = outcome.elapsed();
        if let StopOutcome::Finished(entry) = outcome {
            self.events.append_timer(entry);
        }
        Ok(elapsed)
    }

    pub fn lap(&self, name: &str) -> Result<Duration> {
        let now = self.clock.now();
        self.timers().lap(name, now)
    }

    pub fn elapsed(&self, name: &str) -> Result<Duration> {
        self.timers().elapsed(name)
    }

    /// Run `f` under the timer `name`
    pub fn measure<F, R>(&self, name: &str, f: F) -> Result<R>
    where
        F: FnOnce() -> R,
    {
        self.start(name)?;
        let result = f();
        self.stop(name)?;
        Ok(result)
    }

    pub fn log(&self, level: &str, message: &str) {
        self.events.append_log(level, message, self.clock.now());
    }

    /// Record the keys of data handed to a view
    pub fn view_composing(&self, view: &str, data: &Value) {
        let snapshot = ViewDataSnapshot::from_data(view, data, self.limits, self.clock.now());
        self.events.append_view_snapshot(snapshot);
    }

    /// Record a view by its data keys alone
    pub fn view_keys<I, S>(&self, view: &str, keys: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let snapshot = ViewDataSnapshot::from_keys(view, keys, self.limits, self.clock.now());
        self.events.append_view_snapshot(snapshot);
    }

    pub fn dispatch(&self, event: HookEvent<'_>) {
        match event {
            HookEvent::ViewComposing { view, data } => self.view_composing(view, data),
            HookEvent::LogEmitted { level, message } => self.log(level, message),
        }
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Aggregate everything captured so far
    pub fn report(&self, toggle_path: &str) -> Report {
        let summary = RequestSummary {
            total: self.clock.now(),
            running: self
                .timers()
                .running()
                .into_iter()
                .map(|entry| entry.name)
                .collect(),
            toggle_path: toggle_path.to_string(),
        };
        build_report(&self.events, &summary)
    }
}
