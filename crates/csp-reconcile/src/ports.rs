//! Collaborator contracts the reconciler drives.
//!
//! Each trait has one production implementation in its own crate
//! (`csp-license`, `csp-metrics`, `csp-store`, `csp-output`) and in-memory
//! doubles in `csp-testkit`. All are object-safe and `Send + Sync` so the
//! reconciler can hold them as `Arc<dyn _>` across the loop task.

use async_trait::async_trait;
use csp_schemas::{CheckoutInfo, ComplianceReport, License, NodeCounts};

use crate::CollaboratorError;

/// Result of a successful checkout or extend call.
///
/// `expiration` stays raw text; the reconciler owns the parsing policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutGrant {
    pub consumption_token: String,
    pub expiration: String,
}

#[async_trait]
pub trait NodeCountSource: Send + Sync {
    async fn current_node_count(&self) -> Result<NodeCounts, CollaboratorError>;
}

#[async_trait]
pub trait LicenseService: Send + Sync {
    /// Account the client issues calls for; fixed at construction.
    fn account_number(&self) -> &str;

    /// The grant for the configured product. Fails if none exists.
    async fn current_grant(&self) -> Result<License, CollaboratorError>;

    /// Units of `dimension` still available on `license`. Best-effort.
    async fn available_entitlements(
        &self,
        license: &License,
        dimension: &str,
    ) -> Result<i64, CollaboratorError>;

    async fn checkout(
        &self,
        license: &License,
        dimension: &str,
        amount: u32,
    ) -> Result<CheckoutGrant, CollaboratorError>;

    async fn check_in(&self, consumption_token: &str) -> Result<(), CollaboratorError>;

    async fn extend(&self, consumption_token: &str) -> Result<CheckoutGrant, CollaboratorError>;
}

#[async_trait]
pub trait CheckoutStateStore: Send + Sync {
    /// `Ok(None)` on first run; `Err` on a partial or corrupt record.
    async fn read(&self) -> Result<Option<CheckoutInfo>, CollaboratorError>;

    async fn write(&self, info: &CheckoutInfo) -> Result<(), CollaboratorError>;
}

#[async_trait]
pub trait ComplianceSink: Send + Sync {
    async fn publish(
        &self,
        report: &ComplianceReport,
        notification: &str,
    ) -> Result<(), CollaboratorError>;
}
