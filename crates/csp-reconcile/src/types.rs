use std::time::Duration;

use csp_schemas::{ComplianceReport, ComplianceStatus};

/// Identity fields copied into every published report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportIdentity {
    /// Cloud provider name (`csp.name`).
    pub csp: String,
    pub platform: String,
    pub product_vendor: String,
    pub product_name: String,
    /// Taken from `adapter.product.version` at startup; a product upgrade
    /// shows up after the config is updated and the daemon restarted.
    pub product_version: String,
}

impl Default for ReportIdentity {
    fn default() -> Self {
        Self {
            csp: "aws".to_string(),
            platform: "x86_64".to_string(),
            product_vendor: "suse".to_string(),
            product_name: "rancher".to_string(),
            product_version: "unknown".to_string(),
        }
    }
}

/// Everything the reconciler treats as constant for its lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilerConfig {
    /// Loop tick interval; also the unit of the extension window.
    pub interval: Duration,
    /// Nodes covered by one license unit.
    pub nodes_per_license: u64,
    /// Entitlement dimension checked out against the grant.
    pub dimension: String,
    /// Extend once the token expires within this many intervals.
    pub extend_window_ticks: u32,
    pub identity: ReportIdentity,
}

impl ReconcilerConfig {
    pub fn extend_window(&self) -> Duration {
        self.interval.saturating_mul(self.extend_window_ticks)
    }
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            nodes_per_license: 20,
            dimension: "RKE_NODE_SUPP".to_string(),
            extend_window_ticks: 5,
            identity: ReportIdentity::default(),
        }
    }
}

/// What a successful pass did to the held checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassAction {
    /// Held matched required and the token was not near expiry.
    Unchanged,
    /// A new checkout replaced whatever was held.
    CheckedOut { amount: u32 },
    /// Nothing could or needed to be checked out; the held record was cleared.
    Released,
    /// The held token was extended in place.
    Extended,
    /// Extension failed; the held record was reset to empty.
    ExtendFailedReset,
}

impl PassAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            PassAction::Unchanged => "unchanged",
            PassAction::CheckedOut { .. } => "checked_out",
            PassAction::Released => "released",
            PassAction::Extended => "extended",
            PassAction::ExtendFailedReset => "extend_failed_reset",
        }
    }
}

/// Summary of one completed pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassOutcome {
    pub node_count: u64,
    pub required: u32,
    pub held: u32,
    pub action: PassAction,
    pub report: ComplianceReport,
}

impl PassOutcome {
    pub fn status(&self) -> ComplianceStatus {
        self.report.compliance.status
    }
}
