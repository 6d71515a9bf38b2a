use std::sync::Arc;

use chrono::{DateTime, Utc};
use csp_schemas::{CheckoutInfo, License};
use tracing::{debug, info, warn};

use crate::policy::{checkout_amount, needs_extension, parse_expiration_timestamp, required_licenses};
use crate::report::{pass_failure_report, pass_report, ADAPTER_FAILURE_NOTIFICATION};
use crate::{
    CheckoutStateStore, ComplianceSink, LicenseService, NodeCountSource, PassAction, PassOutcome,
    ReconcileError, ReconcilerConfig,
};

/// Drives one reconciliation pass at a time against its four collaborators.
///
/// Holds no checkout state of its own: every pass starts from what the
/// state store returns, so a restarted process resumes where the last
/// successful write left off.
pub struct Reconciler {
    cfg: ReconcilerConfig,
    license: Arc<dyn LicenseService>,
    nodes: Arc<dyn NodeCountSource>,
    store: Arc<dyn CheckoutStateStore>,
    sink: Arc<dyn ComplianceSink>,
}

impl Reconciler {
    pub fn new(
        cfg: ReconcilerConfig,
        license: Arc<dyn LicenseService>,
        nodes: Arc<dyn NodeCountSource>,
        store: Arc<dyn CheckoutStateStore>,
        sink: Arc<dyn ComplianceSink>,
    ) -> Self {
        Self {
            cfg,
            license,
            nodes,
            store,
            sink,
        }
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.cfg
    }

    pub async fn run_pass(&self) -> Result<PassOutcome, ReconcileError> {
        self.run_pass_at(Utc::now()).await
    }

    /// One full pass with `now` as the reference time for expiry decisions.
    ///
    /// Fatal: grant lookup, node count, checkout, publish. Everything else
    /// is logged and compensated.
    pub async fn run_pass_at(&self, now: DateTime<Utc>) -> Result<PassOutcome, ReconcileError> {
        let license = self
            .license
            .current_grant()
            .await
            .map_err(ReconcileError::LicenseUnavailable)?;

        let nodes = self
            .nodes
            .current_node_count()
            .await
            .map_err(ReconcileError::MetricsUnavailable)?;
        debug!(nodes = nodes.total, "found managed nodes");

        let mut held = self.load_checkout_info().await;

        let required = required_licenses(nodes.total, self.cfg.nodes_per_license);
        debug!(
            held = held.entitled_licenses,
            required, "compared held and required licenses"
        );

        let action = if held.entitled_licenses != required {
            self.replace_checkout(&license, required, &mut held, now)
                .await?
        } else {
            self.extend_if_expiring(&mut held, now).await
        };

        if let Err(err) = self.store.write(&held).await {
            warn!(
                error = %err,
                "unable to save current checkout info, next run may fail with checkout/checkin"
            );
        }

        let report = pass_report(
            &self.cfg.identity,
            self.license.account_number(),
            required,
            held.entitled_licenses,
            now,
        );
        self.sink
            .publish(&report, &report.compliance.message)
            .await
            .map_err(ReconcileError::OutputUnavailable)?;

        info!(
            nodes = nodes.total,
            required,
            held = held.entitled_licenses,
            action = action.as_str(),
            status = report.compliance.status.as_str(),
            "compliance check complete"
        );

        Ok(PassOutcome {
            node_count: nodes.total,
            required,
            held: held.entitled_licenses,
            action,
            report,
        })
    }

    /// Publish a non-compliant report describing a failed pass.
    ///
    /// Called by the loop after a fatal pass error, including a failed
    /// publish; a second sink failure is returned to the caller to log.
    pub async fn publish_failure(&self, error: &ReconcileError) -> Result<(), ReconcileError> {
        let report = pass_failure_report(
            &self.cfg.identity,
            self.license.account_number(),
            error,
            Utc::now(),
        );
        self.sink
            .publish(&report, ADAPTER_FAILURE_NOTIFICATION)
            .await
            .map_err(ReconcileError::OutputUnavailable)
    }

    /// Absent or unreadable state means nothing is held.
    async fn load_checkout_info(&self) -> CheckoutInfo {
        match self.store.read().await {
            Ok(Some(info)) => info,
            Ok(None) => {
                info!("no cached license consumption info, starting fresh");
                CheckoutInfo::empty()
            }
            Err(err) => {
                warn!(
                    error = %err,
                    "unable to get current license consumption info, will start fresh"
                );
                CheckoutInfo::empty()
            }
        }
    }

    /// Only one checkout is held at a time: release the current one, then
    /// check out `min(required, available)`.
    async fn replace_checkout(
        &self,
        license: &License,
        required: u32,
        held: &mut CheckoutInfo,
        now: DateTime<Utc>,
    ) -> Result<PassAction, ReconcileError> {
        if held.has_token() {
            match self.license.check_in(&held.consumption_token).await {
                Ok(()) => {
                    debug!("successfully checked in license");
                    held.clear();
                }
                Err(err) => warn!(error = %err, "unable to checkin license"),
            }
        }

        let available = match self
            .license
            .available_entitlements(license, &self.cfg.dimension)
            .await
        {
            Ok(n) => {
                debug!(available = n, "found available entitlements");
                Some(n)
            }
            Err(err) => {
                warn!(
                    error = %err,
                    "unable to determine number of available entitlements, will attempt full checkout"
                );
                None
            }
        };

        let amount = checkout_amount(required, available);
        if amount == 0 {
            // A token that failed to check in stays tracked so the next pass
            // retries the check-in.
            if held.has_token() {
                return Ok(PassAction::Unchanged);
            }
            held.clear();
            return Ok(PassAction::Released);
        }

        let grant = self
            .license
            .checkout(license, &self.cfg.dimension, amount)
            .await
            .map_err(ReconcileError::CheckoutFailed)?;
        debug!(amount, "successfully checked out license");

        *held = CheckoutInfo {
            consumption_token: grant.consumption_token,
            entitled_licenses: amount,
            expiry: parse_expiration_timestamp(&grant.expiration, now),
        };
        Ok(PassAction::CheckedOut { amount })
    }

    /// Extend the held token when it expires within the configured window.
    /// A failed extension resets the record so the next pass re-checks out.
    async fn extend_if_expiring(&self, held: &mut CheckoutInfo, now: DateTime<Utc>) -> PassAction {
        if !held.has_token() || !needs_extension(held.expiry, now, self.cfg.extend_window()) {
            return PassAction::Unchanged;
        }

        debug!("extending consumption token");
        match self.license.extend(&held.consumption_token).await {
            Ok(grant) => {
                held.consumption_token = grant.consumption_token;
                held.expiry = parse_expiration_timestamp(&grant.expiration, now);
                PassAction::Extended
            }
            Err(err) => {
                warn!(
                    error = %err,
                    "unable to extend license checkout, will assume it failed and reset"
                );
                held.clear();
                PassAction::ExtendFailedReset
            }
        }
    }
}
