//! Activation gate: decides once per request whether profiling runs
//!
//! The configured default comes from configuration (falling back to the debug
//! flag). A per-session override, flipped through the toggle route, takes
//! precedence over it. Console invocations and AJAX requests are never
//! profiled.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::config::ProfilerConfig;

/// Per-session boolean storage provided by the host
///
/// `update` must be atomic for a given session so that concurrent toggles
/// from the same session are not lost.
pub trait SessionStore: Send + Sync {
    fn get(&self, session_id: &str, key: &str) -> Option<bool>;

    fn set(&self, session_id: &str, key: &str, value: bool);

    /// Replace the flag with `f(current)` atomically, returning the new value
    fn update(
        &self,
        session_id: &str,
        key: &str,
        f: &mut dyn FnMut(Option<bool>) -> bool,
    ) -> bool;
}

/// In-process session store
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    flags: Mutex<HashMap<(String, String), bool>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, session_id: &str, key: &str) -> Option<bool> {
        let flags = self.flags.lock().unwrap_or_else(PoisonError::into_inner);
        flags
            .get(&(session_id.to_string(), key.to_string()))
            .copied()
    }

    fn set(&self, session_id: &str, key: &str, value: bool) {
        let mut flags = self.flags.lock().unwrap_or_else(PoisonError::into_inner);
        flags.insert((session_id.to_string(), key.to_string()), value);
    }

    fn update(
        &self,
        session_id: &str,
        key: &str,
        f: &mut dyn FnMut(Option<bool>) -> bool,
    ) -> bool {
        let mut flags = self.flags.lock().unwrap_or_else(PoisonError::into_inner);
        let slot = (session_id.to_string(), key.to_string());
        let next = f(flags.get(&slot).copied());
        flags.insert(slot, next);
        next
    }
}

/// How the current invocation reached the application
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestKind {
    /// Batch or console context, no browser on the other end
    pub console: bool,
    /// Background request issued by page scripts
    pub ajax: bool,
}

impl RequestKind {
    /// Classify an HTTP request by its headers
    ///
    /// `X-Requested-With: XMLHttpRequest` marks an AJAX request; header names
    /// and the value are compared case-insensitively.
    pub fn from_headers<'a, I>(headers: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let ajax = headers.into_iter().any(|(name, value)| {
            name.eq_ignore_ascii_case("x-requested-with")
                && value.trim().eq_ignore_ascii_case("xmlhttprequest")
        });
        Self {
            console: false,
            ajax,
        }
    }

    /// Whether a profiler report can be shown to someone
    pub fn is_interactive(&self) -> bool {
        !self.console && !self.ajax
    }
}

/// Inputs to the activation decision for one session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivationState {
    pub configured_default: bool,
    pub session_override: Option<bool>,
}

impl ActivationState {
    pub fn effective(&self) -> bool {
        self.session_override.unwrap_or(self.configured_default)
    }

    pub fn is_active(&self, kind: RequestKind) -> bool {
        kind.is_interactive() && self.effective()
    }
}

/// Resolves [`ActivationState`] against the session store
#[derive(Clone)]
pub struct ActivationGate {
    configured_default: bool,
    session_key: String,
    store: Arc<dyn SessionStore>,
}

impl std::fmt::Debug for ActivationGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivationGate")
            .field("configured_default", &self.configured_default)
            .field("session_key", &self.session_key)
            .finish_non_exhaustive()
    }
}

impl ActivationGate {
    pub fn new(config: &ProfilerConfig, store: Arc<dyn SessionStore>) -> Self {
        Self {
            configured_default: config.configured_default(),
            session_key: config.session_key.clone(),
            store,
        }
    }

    pub fn configured_default(&self) -> bool {
        self.configured_default
    }

    pub fn state(&self, session_id: Option<&str>) -> ActivationState {
        ActivationState {
            configured_default: self.configured_default,
            session_override: session_id.and_then(|id| self.store.get(id, &self.session_key)),
        }
    }

    pub fn is_active(&self, session_id: Option<&str>, kind: RequestKind) -> bool {
        let state = self.state(session_id);
        let active = state.is_active(kind);
        tracing::debug!(
            configured_default = state.configured_default,
            session_override = ?state.session_override,
            console = kind.console,
            ajax = kind.ajax,
            active,
            "profiler activation"
        );
        active
    }

    /// Flip the session's effective value and persist it as the override
    pub fn toggle(&self, session_id: &str) -> bool {
        let default = self.configured_default;
        self.store
            .update(session_id, &self.session_key, &mut |current| {
                !current.unwrap_or(default)
            })
    }
}
