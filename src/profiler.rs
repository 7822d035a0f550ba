//! Host-facing entry points
//!
//! `Profiler` holds only application-wide settings and the activation gate.
//! All per-request data lives in the [`ProfileSession`] returned by
//! [`Profiler::begin`], which the host threads through request handling and
//! passes back to [`Profiler::finish`].

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::config::ProfilerConfig;
use crate::error::Result;
use crate::gate::{ActivationGate, MemorySessionStore, RequestKind, SessionStore};
use crate::inject::{is_html_content_type, maybe_inject_bytes};
use crate::session::ProfileSession;
use crate::timer::Clock;

/// What the profiler needs to know about an incoming request
#[derive(Debug, Clone, Default)]
pub struct RequestInfo {
    pub session_id: Option<String>,
    pub kind: RequestKind,
    pub path: String,
    pub referer: Option<String>,
}

impl RequestInfo {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_kind(mut self, kind: RequestKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }
}

/// Response to send after a toggle request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToggleOutcome {
    /// Effective profiler state for the session after the toggle
    pub enabled: bool,
    /// Location for the redirect back to the referring page
    pub redirect_to: String,
}

/// Application-wide profiler
#[derive(Debug, Clone)]
pub struct Profiler {
    config: ProfilerConfig,
    gate: ActivationGate,
}

impl Profiler {
    pub fn new(config: ProfilerConfig, store: Arc<dyn SessionStore>) -> Self {
        let gate = ActivationGate::new(&config, store);
        Self { config, gate }
    }

    /// Profiler backed by an in-process session store
    pub fn with_memory_store(config: ProfilerConfig) -> Self {
        Self::new(config, Arc::new(MemorySessionStore::new()))
    }

    pub fn config(&self) -> &ProfilerConfig {
        &self.config
    }

    pub fn gate(&self) -> &ActivationGate {
        &self.gate
    }

    pub fn is_active(&self, request: &RequestInfo) -> bool {
        self.gate
            .is_active(request.session_id.as_deref(), request.kind)
    }

    /// Open a session if the request should be profiled
    pub fn begin(&self, request: &RequestInfo) -> Option<ProfileSession> {
        self.is_active(request)
            .then(|| ProfileSession::new(self.config.view_limits()))
    }

    /// Like [`Profiler::begin`], timing the session with `clock`
    pub fn begin_with_clock(
        &self,
        request: &RequestInfo,
        clock: Box<dyn Clock>,
    ) -> Option<ProfileSession> {
        self.is_active(request)
            .then(|| ProfileSession::with_clock(clock, self.config.view_limits()))
    }

    pub fn is_toggle_request(&self, path: &str) -> bool {
        path == self.config.toggle_path
    }

    /// Flip the profiler for the request's session and point back to the
    /// referring page
    ///
    /// Without a session there is nothing to persist; the outcome reports the
    /// configured default.
    pub fn toggle(&self, request: &RequestInfo) -> ToggleOutcome {
        let enabled = match request.session_id.as_deref() {
            Some(session_id) => self.gate.toggle(session_id),
            None => {
                tracing::warn!("Profiler toggle requested without a session");
                self.gate.configured_default()
            }
        };

        ToggleOutcome {
            enabled,
            redirect_to: request
                .referer
                .clone()
                .filter(|referer| !referer.is_empty())
                .unwrap_or_else(|| "/".to_string()),
        }
    }

    /// Render the report fragment for `session`
    pub fn render_fragment(&self, session: &ProfileSession) -> Result<String> {
        session.report(&self.config.toggle_path).to_html()
    }

    /// Finish a profiled request, splicing the report into HTML bodies
    ///
    /// Never fails: if building or injecting the report errors or panics,
    /// the original body is returned and the failure is logged.
    pub fn finish(
        &self,
        session: ProfileSession,
        content_type: Option<&str>,
        body: Vec<u8>,
    ) -> Vec<u8> {
        if !is_html_content_type(content_type) {
            return body;
        }

        let rendered = catch_unwind(AssertUnwindSafe(|| self.render_fragment(&session)));
        match rendered {
            Ok(Ok(fragment)) => {
                maybe_inject_bytes(content_type, &body, fragment.as_bytes()).into_owned()
            }
            Ok(Err(e)) => {
                tracing::warn!("Profiler report failed, response left unchanged: {}", e);
                body
            }
            Err(_) => {
                tracing::warn!("Profiler report panicked, response left unchanged");
                body
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::ManualClock;

    fn enabled() -> Profiler {
        Profiler::with_memory_store(ProfilerConfig {
            enabled: Some(true),
            ..ProfilerConfig::default()
        })
    }

    fn browser() -> RequestInfo {
        RequestInfo::new("/").with_session("s1")
    }

    #[test]
    fn test_begin_respects_gate() {
        let profiler = Profiler::with_memory_store(ProfilerConfig::disabled());
        assert!(profiler.begin(&browser()).is_none());
        assert!(enabled().begin(&browser()).is_some());
    }

    #[test]
    fn test_begin_skips_ajax() {
        let request = browser().with_kind(RequestKind {
            console: false,
            ajax: true,
        });
        assert!(enabled().begin(&request).is_none());
    }

    #[test]
    fn test_finish_injects_into_html() {
        let profiler = enabled();
        let session = profiler.begin(&browser()).unwrap();
        session.log("info", "hello");

        let body = profiler.finish(
            session,
            Some("text/html; charset=utf-8"),
            b"<html><body>page</body></html>".to_vec(),
        );
        let body = String::from_utf8(body).unwrap();
        assert!(body.starts_with("<html><body>page<div id=\"reqprof\">"));
        assert!(body.ends_with("</body></html>"));
        assert!(body.contains("hello"));
    }

    #[test]
    fn test_finish_leaves_json_alone() {
        let profiler = enabled();
        let session = profiler.begin(&browser()).unwrap();
        let original = br#"{"ok":true}"#.to_vec();
        let body = profiler.finish(session, Some("application/json"), original.clone());
        assert_eq!(body, original);
    }

    #[test]
    fn test_finish_is_fail_open_on_panic() {
        #[derive(Debug)]
        struct PanickingClock;

        impl Clock for PanickingClock {
            fn now(&self) -> std::time::Duration {
                panic!("clock failure");
            }
        }

        let profiler = enabled();
        let session = profiler
            .begin_with_clock(&browser(), Box::new(PanickingClock))
            .unwrap();
        let original = b"<body>ok</body>".to_vec();
        let body = profiler.finish(session, Some("text/html"), original.clone());
        assert_eq!(body, original);
    }

    #[test]
    fn test_toggle_redirects_to_referer() {
        let profiler = Profiler::with_memory_store(ProfilerConfig::disabled());
        let request = RequestInfo::new("/_profiler/toggle")
            .with_session("s1")
            .with_referer("/dashboard");

        assert!(profiler.is_toggle_request(&request.path));
        let outcome = profiler.toggle(&request);
        assert_eq!(
            outcome,
            ToggleOutcome {
                enabled: true,
                redirect_to: "/dashboard".to_string()
            }
        );
        assert!(profiler.is_active(&browser()));
    }

    #[test]
    fn test_toggle_without_referer_goes_home() {
        let profiler = enabled();
        let outcome = profiler.toggle(&RequestInfo::new("/_profiler/toggle").with_session("s1"));
        assert!(!outcome.enabled);
        assert_eq!(outcome.redirect_to, "/");
    }

    #[test]
    fn test_toggle_without_session_changes_nothing() {
        let profiler = enabled();
        let outcome = profiler.toggle(&RequestInfo::new("/_profiler/toggle"));
        assert!(outcome.enabled);
        assert!(profiler.is_active(&RequestInfo::new("/")));
    }

    #[test]
    fn test_begin_with_manual_clock() {
        let profiler = enabled();
        let session = profiler
            .begin_with_clock(&browser(), Box::new(ManualClock::new()))
            .unwrap();
        session.start("t").unwrap();
        assert_eq!(session.stop("t").unwrap(), std::time::Duration::ZERO);
    }
}
