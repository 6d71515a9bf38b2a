//! Response types for the daemon's HTTP endpoints.
//!
//! `Serialize + Deserialize` so they can be JSON-encoded by Axum and decoded
//! by tests. No business logic lives here.

use chrono::{DateTime, Utc};
use csp_schemas::ComplianceStatus;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: String,
    pub version: String,
}

// ---------------------------------------------------------------------------
// /v1/status
// ---------------------------------------------------------------------------

/// Outcome of the most recent reconcile pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassSummary {
    pub finished_at_utc: DateTime<Utc>,
    pub ok: bool,
    pub node_count: Option<u64>,
    pub required: Option<u32>,
    pub held: Option<u32>,
    /// "unchanged" | "checked_out" | "released" | "extended" | "extend_failed_reset"
    pub action: Option<String>,
    pub status: Option<ComplianceStatus>,
    /// Stable error kind, e.g. "license_unavailable".
    pub error_kind: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub daemon_uptime_secs: u64,
    pub config_hash: Option<String>,
    pub interval_secs: u64,
    pub passes_total: u64,
    pub passes_failed: u64,
    pub last_pass: Option<PassSummary>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
