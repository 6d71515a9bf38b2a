//! csp-schemas
//!
//! Shared data model for the license entitlement adapter. No IO, no business
//! logic beyond small accessors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// License grant
// ---------------------------------------------------------------------------

/// One named capacity dimension on a license grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entitlement {
    pub name: String,
    pub max_count: i64,
}

/// A license grant as issued by the entitlement authority.
///
/// Re-fetched every pass; the reconciler never mutates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct License {
    /// Authority-side identifier (e.g. an ARN).
    pub license_id: String,
    /// Issuer signing key fingerprint. Checkout is refused without it.
    pub key_fingerprint: Option<String>,
    pub entitlements: Vec<Entitlement>,
}

impl License {
    /// Maximum count for `dimension`, if the grant carries that entitlement.
    pub fn max_count_for(&self, dimension: &str) -> Option<i64> {
        self.entitlements
            .iter()
            .find(|e| e.name == dimension)
            .map(|e| e.max_count)
    }
}

// ---------------------------------------------------------------------------
// Checkout state
// ---------------------------------------------------------------------------

/// The reconciler's working record of currently held entitlements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutInfo {
    /// Opaque token returned by checkout; empty when nothing is held.
    pub consumption_token: String,
    /// Number of license units covered by the token.
    pub entitled_licenses: u32,
    pub expiry: DateTime<Utc>,
}

impl CheckoutInfo {
    /// Nothing held: empty token, zero units, expiry at the epoch.
    pub fn empty() -> Self {
        Self {
            consumption_token: String::new(),
            entitled_licenses: 0,
            expiry: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    pub fn has_token(&self) -> bool {
        !self.consumption_token.is_empty()
    }

    /// Reset in place to the empty record.
    pub fn clear(&mut self) {
        *self = Self::empty();
    }
}

impl Default for CheckoutInfo {
    fn default() -> Self {
        Self::empty()
    }
}

// ---------------------------------------------------------------------------
// Node counts
// ---------------------------------------------------------------------------

/// Managed-node totals observed by a node count source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeCounts {
    pub total: u64,
}

// ---------------------------------------------------------------------------
// Compliance report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComplianceStatus {
    #[serde(rename = "Compliant")]
    InCompliance,
    #[serde(rename = "NonCompliant")]
    NotInCompliance,
}

impl ComplianceStatus {
    pub fn from_compliant(compliant: bool) -> Self {
        if compliant {
            ComplianceStatus::InCompliance
        } else {
            ComplianceStatus::NotInCompliance
        }
    }

    pub fn is_compliant(&self) -> bool {
        matches!(self, ComplianceStatus::InCompliance)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ComplianceStatus::InCompliance => "Compliant",
            ComplianceStatus::NotInCompliance => "NonCompliant",
        }
    }
}

/// Cloud account the adapter runs under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CspInfo {
    pub name: String,
    pub acct_number: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceInfo {
    pub status: ComplianceStatus,
    pub message: String,
}

/// Required vs held license units for the pass that produced a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitlementCounts {
    pub required: u32,
    pub held: u32,
}

/// The published support-config document.
///
/// Derived fresh every pass and never read back by the reconciler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub support_eligible: bool,
    pub platform: String,
    pub product: String,
    pub csp: CspInfo,
    pub compliance: ComplianceInfo,
    /// Absent on reports produced for a failed pass or a failed start.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entitlements: Option<EntitlementCounts>,
    pub generated_at_utc: DateTime<Utc>,
}

impl ComplianceReport {
    pub fn is_compliant(&self) -> bool {
        self.compliance.status.is_compliant()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_with_support_config_names() {
        let v = serde_json::to_value(ComplianceStatus::InCompliance).unwrap();
        assert_eq!(v, "Compliant");
        let v = serde_json::to_value(ComplianceStatus::NotInCompliance).unwrap();
        assert_eq!(v, "NonCompliant");
    }

    #[test]
    fn empty_checkout_has_no_token() {
        let info = CheckoutInfo::empty();
        assert!(!info.has_token());
        assert_eq!(info.entitled_licenses, 0);
        assert_eq!(info.expiry.timestamp(), 0);
    }

    #[test]
    fn clear_resets_held_record() {
        let mut info = CheckoutInfo {
            consumption_token: "tok-1".to_string(),
            entitled_licenses: 3,
            expiry: Utc::now(),
        };
        info.clear();
        assert_eq!(info, CheckoutInfo::empty());
    }

    #[test]
    fn max_count_for_matches_dimension_only() {
        let lic = License {
            license_id: "l-1".to_string(),
            key_fingerprint: Some("fp".to_string()),
            entitlements: vec![
                Entitlement {
                    name: "OTHER".to_string(),
                    max_count: 9,
                },
                Entitlement {
                    name: "RKE_NODE_SUPP".to_string(),
                    max_count: 4,
                },
            ],
        };
        assert_eq!(lic.max_count_for("RKE_NODE_SUPP"), Some(4));
        assert_eq!(lic.max_count_for("MISSING"), None);
    }

    #[test]
    fn report_omits_counts_when_absent() {
        let report = ComplianceReport {
            support_eligible: true,
            platform: "x86_64".to_string(),
            product: "cpe:/o:suse:rancher:2.6.3".to_string(),
            csp: CspInfo {
                name: "aws".to_string(),
                acct_number: "unknown".to_string(),
            },
            compliance: ComplianceInfo {
                status: ComplianceStatus::NotInCompliance,
                message: "startup failed".to_string(),
            },
            entitlements: None,
            generated_at_utc: Utc::now(),
        };
        let v = serde_json::to_value(&report).unwrap();
        assert!(v.get("entitlements").is_none());
        assert_eq!(v["compliance"]["status"], "NonCompliant");
        assert_eq!(v["csp"]["acct_number"], "unknown");
    }
}
