//! Typed view over the merged configuration document.
//!
//! Every field has a default so a minimal YAML only needs the license and
//! metrics endpoints. Secrets are env var names, never values.

use std::path::PathBuf;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterConfig {
    pub adapter: AdapterSection,
    pub reconciler: ReconcilerSection,
    pub license: LicenseSection,
    pub metrics: MetricsSection,
    pub state: StateSection,
    pub output: OutputSection,
    pub daemon: DaemonSection,
}

impl AdapterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.reconciler.interval_secs == 0 {
            bail!("CONFIG_INVALID /reconciler/interval_secs must be > 0");
        }
        if self.reconciler.nodes_per_license == 0 {
            bail!("CONFIG_INVALID /reconciler/nodes_per_license must be > 0");
        }
        if self.reconciler.dimension.trim().is_empty() {
            bail!("CONFIG_INVALID /reconciler/dimension must not be empty");
        }
        if self.license.base_url.trim().is_empty() {
            bail!("CONFIG_INVALID /license/base_url must be set");
        }
        if self.metrics.url.trim().is_empty() {
            bail!("CONFIG_INVALID /metrics/url must be set");
        }
        if self.state.name.trim().is_empty() {
            bail!("CONFIG_INVALID /state/name must not be empty");
        }
        if self.output.config_name.trim().is_empty()
            || self.output.notification_name.trim().is_empty()
        {
            bail!("CONFIG_INVALID /output names must not be empty");
        }
        Ok(())
    }
}

/// Identity of the product and cloud the adapter reports for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterSection {
    /// Cloud provider name written into the report (`csp.name`).
    pub csp: String,
    pub platform: String,
    pub product: ProductSection,
}

impl Default for AdapterSection {
    fn default() -> Self {
        Self {
            csp: "aws".to_string(),
            platform: "x86_64".to_string(),
            product: ProductSection::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductSection {
    pub vendor: String,
    pub name: String,
    pub version: String,
}

impl Default for ProductSection {
    fn default() -> Self {
        Self {
            vendor: "suse".to_string(),
            name: "rancher".to_string(),
            version: "unknown".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilerSection {
    pub interval_secs: u64,
    pub nodes_per_license: u64,
    /// Entitlement dimension checked out against the grant.
    pub dimension: String,
    /// Extend when the token expires within this many intervals.
    pub extend_window_ticks: u32,
}

impl Default for ReconcilerSection {
    fn default() -> Self {
        Self {
            interval_secs: 30,
            nodes_per_license: 20,
            dimension: "RKE_NODE_SUPP".to_string(),
            extend_window_ticks: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LicenseSection {
    pub base_url: String,
    pub product_sku: String,
    /// Env var holding the bearer token for the license service.
    pub token_env: String,
    pub timeout_secs: u64,
}

impl Default for LicenseSection {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            product_sku: "0b87d4fa-d1fe-41d8-830b-67d4ec381549".to_string(),
            token_env: "CSP_LICENSE_TOKEN".to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsSection {
    pub url: String,
    /// Env var holding the bearer token for the metrics endpoint.
    pub token_env: String,
    pub metric_name: String,
    pub cluster_label: String,
    /// Cluster id whose nodes are not billable (the management cluster itself).
    pub local_cluster_id: String,
    pub timeout_secs: u64,
}

impl Default for MetricsSection {
    fn default() -> Self {
        Self {
            url: String::new(),
            token_env: "CSP_METRICS_TOKEN".to_string(),
            metric_name: "cluster_manager_nodes".to_string(),
            cluster_label: "cluster_id".to_string(),
            local_cluster_id: "local".to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateBackend {
    File,
    Postgres,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateSection {
    pub backend: StateBackend,
    /// Record key for the persisted checkout state.
    pub name: String,
    /// Directory for the file backend.
    pub dir: PathBuf,
    /// Env var holding the Postgres URL for the postgres backend.
    pub database_url_env: String,
}

impl Default for StateSection {
    fn default() -> Self {
        Self {
            backend: StateBackend::File,
            name: "csp-adapter-cache".to_string(),
            dir: PathBuf::from("./state"),
            database_url_env: "CSP_DATABASE_URL".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSection {
    pub dir: PathBuf,
    pub config_name: String,
    pub notification_name: String,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./output"),
            config_name: "csp-config".to_string(),
            notification_name: "csp-compliance".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonSection {
    pub addr: String,
}

impl Default for DaemonSection {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8899".to_string(),
        }
    }
}
