//! Named timers for a single request
//!
//! Timestamps are offsets from the owning session's clock origin, so every
//! measurement in one request shares a single time base. The [`Clock`] trait
//! lets tests drive time by hand and assert exact durations.
//!
//! Restart policy: starting a name that is still running fails with
//! [`ProfilerError::DuplicateTimer`]. Starting a name whose previous run was
//! stopped begins a fresh run; the finished run stays in the event log.
//! Stopping a name that is not running but has finished before is a no-op.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::error::{ProfilerError, Result};

/// Source of timestamps, expressed as an offset from a fixed origin
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> Duration;
}

/// Wall clock backed by [`Instant`], with its origin at construction time
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    /// Clock whose origin is an earlier instant, e.g. when the host accepted
    /// the request before the profiler was consulted
    pub fn starting_at(origin: Instant) -> Self {
        Self { origin }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Hand-driven clock for deterministic measurements
#[derive(Debug, Default)]
pub struct ManualClock {
    nanos: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the clock forward
    pub fn advance(&self, by: Duration) {
        self.nanos.fetch_add(by.as_nanos() as u64, Ordering::SeqCst);
    }

    /// Jump to an absolute offset
    pub fn set(&self, at: Duration) {
        self.nanos.store(at.as_nanos() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
    }
}

/// One run of a named timer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimerEntry {
    pub name: String,
    /// Offset of `start` from the session origin
    pub started_at: Duration,
    /// Offset of `stop` from the session origin, `None` while running
    pub stopped_at: Option<Duration>,
    /// Split points recorded by `lap`, as offsets from `started_at`
    pub laps: Vec<Duration>,
}

impl TimerEntry {
    fn started(name: &str, now: Duration) -> Self {
        Self {
            name: name.to_string(),
            started_at: now,
            stopped_at: None,
            laps: Vec::new(),
        }
    }

    /// Duration between start and stop, `None` while running
    pub fn elapsed(&self) -> Option<Duration> {
        self.stopped_at
            .map(|end| end.saturating_sub(self.started_at))
    }

    pub fn is_running(&self) -> bool {
        self.stopped_at.is_none()
    }
}

/// Result of a `stop` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopOutcome {
    /// The timer was running and is now finished
    Finished(TimerEntry),
    /// The timer had already been stopped; nothing changed
    AlreadyStopped(TimerEntry),
}

impl StopOutcome {
    pub fn entry(&self) -> &TimerEntry {
        match self {
            Self::Finished(entry) | Self::AlreadyStopped(entry) => entry,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.entry().elapsed().unwrap_or_default()
    }
}

/// Running and finished timers of one request
#[derive(Debug, Default)]
pub struct Timers {
    running: HashMap<String, TimerEntry>,
    /// Most recent finished run per name
    finished: HashMap<String, TimerEntry>,
}

impl Timers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start `name` at `now`
    pub fn start(&mut self, name: &str, now: Duration) -> Result<()> {
        if self.running.contains_key(name) {
            return Err(ProfilerError::duplicate(name));
        }
        self.running
            .insert(name.to_string(), TimerEntry::started(name, now));
        Ok(())
    }

    /// Record a split on a running timer, returning time since its start
    pub fn lap(&mut self, name: &str, now: Duration) -> Result<Duration> {
        let entry = self
            .running
            .get_mut(name)
            .ok_or_else(|| ProfilerError::unknown(name))?;
        let split = now.saturating_sub(entry.started_at);
        entry.laps.push(split);
        Ok(split)
    }

    /// Stop `name` at `now`
    pub fn stop(&mut self, name: &str, now: Duration) -> Result<StopOutcome> {
        if let Some(mut entry) = self.running.remove(name) {
            entry.stopped_at = Some(now.max(entry.started_at));
            self.finished.insert(name.to_string(), entry.clone());
            return Ok(StopOutcome::Finished(entry));
        }

        self.finished
            .get(name)
            .cloned()
            .map(StopOutcome::AlreadyStopped)
            .ok_or_else(|| ProfilerError::unknown(name))
    }

    /// Elapsed time of the latest finished run of `name`
    pub fn elapsed(&self, name: &str) -> Result<Duration> {
        if self.running.contains_key(name) {
            return Err(ProfilerError::not_stopped(name));
        }
        self.finished
            .get(name)
            .and_then(TimerEntry::elapsed)
            .ok_or_else(|| ProfilerError::unknown(name))
    }

    /// Timers still running, in start order
    pub fn running(&self) -> Vec<TimerEntry> {
        let mut entries: Vec<TimerEntry> = self.running.values().cloned().collect();
        entries.sort_by(|a, b| {
            a.started_at
                .cmp(&b.started_at)
                .then_with(|| a.name.cmp(&b.name))
        });
        entries
    }

    pub fn is_running(&self, name: &str) -> bool {
        self.running.contains_key(name)
    }
}
