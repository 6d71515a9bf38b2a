//! Turns a validated [`AdapterConfig`] into a running [`Reconciler`].

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use csp_config::secrets::ResolvedSecrets;
use csp_config::{AdapterConfig, StateBackend};
use csp_license::{HttpLicenseService, LicenseClientConfig};
use csp_metrics::{MetricsScraper, NodeMetricSelector};
use csp_output::FileComplianceSink;
use csp_reconcile::report::{startup_failure_report, STARTUP_FAILURE_NOTIFICATION};
use csp_reconcile::{
    CheckoutStateStore, CollaboratorError, ComplianceSink, LicenseService, Reconciler,
    ReconcilerConfig, ReportIdentity,
};
use csp_store::{FileStateStore, PgStateStore};
use tracing::info;

/// Account reported when the adapter fails before it knows its own.
pub const UNKNOWN_ACCOUNT: &str = "unknown";

pub fn report_identity(cfg: &AdapterConfig) -> ReportIdentity {
    ReportIdentity {
        csp: cfg.adapter.csp.clone(),
        platform: cfg.adapter.platform.clone(),
        product_vendor: cfg.adapter.product.vendor.clone(),
        product_name: cfg.adapter.product.name.clone(),
        product_version: cfg.adapter.product.version.clone(),
    }
}

pub fn reconciler_config(cfg: &AdapterConfig) -> ReconcilerConfig {
    ReconcilerConfig {
        interval: Duration::from_secs(cfg.reconciler.interval_secs),
        nodes_per_license: cfg.reconciler.nodes_per_license,
        dimension: cfg.reconciler.dimension.clone(),
        extend_window_ticks: cfg.reconciler.extend_window_ticks,
        identity: report_identity(cfg),
    }
}

pub fn output_sink(cfg: &AdapterConfig) -> FileComplianceSink {
    FileComplianceSink::new(
        &cfg.output.dir,
        &cfg.output.config_name,
        &cfg.output.notification_name,
    )
}

async fn state_store(
    cfg: &AdapterConfig,
    secrets: &ResolvedSecrets,
) -> Result<Arc<dyn CheckoutStateStore>> {
    match cfg.state.backend {
        StateBackend::File => {
            let store = FileStateStore::new(&cfg.state.dir, &cfg.state.name);
            info!(path = %store.path().display(), "using file checkout store");
            Ok(Arc::new(store))
        }
        StateBackend::Postgres => {
            let url = secrets.database_url.as_deref().with_context(|| {
                format!(
                    "state.backend is postgres but {} is not set",
                    cfg.state.database_url_env
                )
            })?;
            let store = PgStateStore::connect(url, cfg.state.name.clone())
                .await
                .context("unable to open postgres checkout store")?;
            info!(name = %cfg.state.name, "using postgres checkout store");
            Ok(Arc::new(store))
        }
    }
}

/// Why the adapter could not start, plus the account number if the
/// license service identity call had already succeeded.
#[derive(Debug)]
pub struct StartupFailure {
    pub account: Option<String>,
    pub error: anyhow::Error,
}

impl From<anyhow::Error> for StartupFailure {
    fn from(error: anyhow::Error) -> Self {
        Self {
            account: None,
            error,
        }
    }
}

/// Build every collaborator and the reconciler around them.
///
/// Fails if the license service cannot be reached, since the account number
/// is needed for every report. Failures after that carry the account.
pub async fn build_reconciler(
    cfg: &AdapterConfig,
    secrets: &ResolvedSecrets,
    sink: Arc<dyn ComplianceSink>,
) -> Result<Reconciler, StartupFailure> {
    let license = HttpLicenseService::connect(LicenseClientConfig {
        base_url: cfg.license.base_url.clone(),
        token: secrets.license_token.clone(),
        product_sku: cfg.license.product_sku.clone(),
        timeout: Duration::from_secs(cfg.license.timeout_secs),
    })
    .await
    .context("unable to initialize license service client")?;
    let account = license.account_number().to_string();
    info!(account = %account, "license service connected");

    let with_account = |error: anyhow::Error| StartupFailure {
        account: Some(account.clone()),
        error,
    };

    let nodes = MetricsScraper::new(
        cfg.metrics.url.clone(),
        secrets.metrics_token.clone(),
        NodeMetricSelector {
            metric_name: cfg.metrics.metric_name.clone(),
            cluster_label: cfg.metrics.cluster_label.clone(),
            local_cluster_id: cfg.metrics.local_cluster_id.clone(),
        },
        Duration::from_secs(cfg.metrics.timeout_secs),
    )
    .context("unable to initialize metrics scraper")
    .map_err(with_account)?;

    let store = state_store(cfg, secrets).await.map_err(with_account)?;

    Ok(Reconciler::new(
        reconciler_config(cfg),
        Arc::new(license),
        Arc::new(nodes),
        store,
        sink,
    ))
}

/// Publish the report that tells operators the adapter never started.
///
/// `account` is `None` when the failure came before the identity call.
pub async fn publish_startup_failure(
    sink: &dyn ComplianceSink,
    identity: &ReportIdentity,
    account: Option<&str>,
    err: &anyhow::Error,
) -> Result<(), CollaboratorError> {
    let report = startup_failure_report(
        identity,
        account.unwrap_or(UNKNOWN_ACCOUNT),
        &format!("{err:#}"),
        Utc::now(),
    );
    sink.publish(&report, STARTUP_FAILURE_NOTIFICATION).await
}
