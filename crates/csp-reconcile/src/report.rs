//! Compliance report assembly.

use chrono::{DateTime, Utc};
use csp_schemas::{
    ComplianceInfo, ComplianceReport, ComplianceStatus, CspInfo, EntitlementCounts,
};

use crate::ReportIdentity;

/// Notification shown to operators when a pass could not complete.
pub const ADAPTER_FAILURE_NOTIFICATION: &str = "unable to run adapter, check adapter logs";

/// Notification shown to operators when the adapter could not start.
pub const STARTUP_FAILURE_NOTIFICATION: &str =
    "Marketplace Adapter: unable to start csp adapter, check adapter logs";

/// `cpe:/o:<vendor>:<product>:<version>`, version without a leading `v`.
pub fn product_cpe(identity: &ReportIdentity) -> String {
    let version = identity
        .product_version
        .strip_prefix('v')
        .unwrap_or(&identity.product_version);
    format!(
        "cpe:/o:{}:{}:{}",
        identity.product_vendor, identity.product_name, version
    )
}

/// Message for a completed pass.
pub fn status_message(identity: &ReportIdentity, required: u32, held: u32) -> String {
    if held == required {
        format!(
            "{} server has the required amount of licenses",
            capitalize(&identity.product_name)
        )
    } else {
        format!("server is not in compliance, wanted {required}, but got {held}")
    }
}

/// Report for a completed pass: compliant iff `held == required`.
pub fn pass_report(
    identity: &ReportIdentity,
    account: &str,
    required: u32,
    held: u32,
    now: DateTime<Utc>,
) -> ComplianceReport {
    let status = ComplianceStatus::from_compliant(held == required);
    let mut report = base_report(
        identity,
        account,
        status,
        status_message(identity, required, held),
        now,
    );
    report.entitlements = Some(EntitlementCounts { required, held });
    report
}

/// Report published when a pass aborted before its own publish.
pub fn pass_failure_report(
    identity: &ReportIdentity,
    account: &str,
    error: &dyn std::fmt::Display,
    now: DateTime<Utc>,
) -> ComplianceReport {
    base_report(
        identity,
        account,
        ComplianceStatus::NotInCompliance,
        format!("unable to run compliance check with error: {error}"),
        now,
    )
}

/// Report published when the adapter cannot start at all.
pub fn startup_failure_report(
    identity: &ReportIdentity,
    account: &str,
    error: &dyn std::fmt::Display,
    now: DateTime<Utc>,
) -> ComplianceReport {
    base_report(
        identity,
        account,
        ComplianceStatus::NotInCompliance,
        format!("CSP adapter unable to start due to error: {error}"),
        now,
    )
}

fn base_report(
    identity: &ReportIdentity,
    account: &str,
    status: ComplianceStatus,
    message: String,
    now: DateTime<Utc>,
) -> ComplianceReport {
    ComplianceReport {
        support_eligible: true,
        platform: identity.platform.clone(),
        product: product_cpe(identity),
        csp: CspInfo {
            name: identity.csp.clone(),
            acct_number: account.to_string(),
        },
        compliance: ComplianceInfo { status, message },
        entitlements: None,
        generated_at_utc: now,
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
