//! Shared runtime state for csp-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. The reconcile loop
//! writes through `watch` senders so it can update state from its
//! synchronous per-pass callback.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use csp_reconcile::{
    run_loop, CollaboratorError, ComplianceSink, PassResult, Reconciler,
};
use csp_schemas::ComplianceReport;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::api_types::PassSummary;

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

/// Static build metadata included in health responses.
#[derive(Clone, Debug)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// StatusSnapshot
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default)]
pub struct StatusSnapshot {
    pub config_hash: Option<String>,
    pub interval_secs: u64,
    pub passes_total: u64,
    pub passes_failed: u64,
    pub last_pass: Option<PassSummary>,
}

impl StatusSnapshot {
    pub fn record(&mut self, summary: PassSummary) {
        self.passes_total += 1;
        if !summary.ok {
            self.passes_failed += 1;
        }
        self.last_pass = Some(summary);
    }
}

impl PassSummary {
    pub fn from_result(result: &PassResult, finished_at_utc: DateTime<Utc>) -> Self {
        match result {
            Ok(out) => Self {
                finished_at_utc,
                ok: true,
                node_count: Some(out.node_count),
                required: Some(out.required),
                held: Some(out.held),
                action: Some(out.action.as_str().to_string()),
                status: Some(out.status()),
                error_kind: None,
                error: None,
            },
            Err(err) => Self {
                finished_at_utc,
                ok: false,
                node_count: None,
                required: None,
                held: None,
                action: None,
                status: None,
                error_kind: Some(err.kind().to_string()),
                error: Some(err.to_string()),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

pub struct AppState {
    pub build: BuildInfo,
    pub status: watch::Sender<StatusSnapshot>,
    /// Last report handed to the output sink, including failure reports.
    pub last_report: watch::Sender<Option<ComplianceReport>>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    pub fn new() -> Self {
        Self {
            build: BuildInfo {
                service: "csp-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            status: watch::Sender::new(StatusSnapshot::default()),
            last_report: watch::Sender::new(None),
        }
    }

    pub fn with_config(config_hash: String, interval_secs: u64) -> Self {
        let st = Self::new();
        st.status.send_modify(|s| {
            s.config_hash = Some(config_hash);
            s.interval_secs = interval_secs;
        });
        st
    }

    pub fn record_pass(&self, result: &PassResult) {
        let summary = PassSummary::from_result(result, Utc::now());
        self.status.send_modify(|s| s.record(summary));
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Monotonically increasing uptime since first call (process lifetime).
pub fn uptime_secs() -> u64 {
    static START: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();
    START
        .get_or_init(std::time::Instant::now)
        .elapsed()
        .as_secs()
}

/// Sink wrapper that remembers the last published report for
/// `GET /v1/compliance`.
pub struct ObservedSink {
    inner: Arc<dyn ComplianceSink>,
    state: Arc<AppState>,
}

impl ObservedSink {
    pub fn new(inner: Arc<dyn ComplianceSink>, state: Arc<AppState>) -> Self {
        Self { inner, state }
    }
}

#[async_trait]
impl ComplianceSink for ObservedSink {
    async fn publish(
        &self,
        report: &ComplianceReport,
        notification: &str,
    ) -> Result<(), CollaboratorError> {
        self.inner.publish(report, notification).await?;
        self.state.last_report.send_replace(Some(report.clone()));
        Ok(())
    }
}

/// Spawn the reconcile loop, recording every pass into `state`.
///
/// The loop stops when `shutdown` flips to `true` or its sender is dropped.
pub fn spawn_reconcile_loop(
    state: Arc<AppState>,
    reconciler: Arc<Reconciler>,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        run_loop(reconciler, shutdown, move |result| state.record_pass(result)).await;
    })
}
