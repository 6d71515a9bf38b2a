//! csp-metrics
//!
//! Node count source backed by the cluster manager's metrics endpoint.
//! Implements [`csp_reconcile::NodeCountSource`].

use std::time::Duration;

use async_trait::async_trait;
use csp_reconcile::{CollaboratorError, NodeCountSource};
use csp_schemas::NodeCounts;
use prometheus_parse::{Sample, Scrape, Value};
use tracing::debug;

/// Which samples count as managed nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeMetricSelector {
    pub metric_name: String,
    pub cluster_label: String,
    /// Cluster id of the management cluster itself; never counted.
    pub local_cluster_id: String,
}

impl Default for NodeMetricSelector {
    fn default() -> Self {
        Self {
            metric_name: "cluster_manager_nodes".to_string(),
            cluster_label: "cluster_id".to_string(),
            local_cluster_id: "local".to_string(),
        }
    }
}

/// Parse a text exposition body into samples.
pub fn parse_scrape(body: &str) -> Result<Scrape, CollaboratorError> {
    Scrape::parse(body.lines().map(|line| Ok(line.to_owned())))
        .map_err(|e| CollaboratorError::Decode(format!("invalid metrics exposition: {e}")))
}

/// Sum the selected gauge over downstream clusters.
///
/// `None` when the scrape has no sample of the metric at all. Samples
/// without the cluster label are excluded, as are non-finite or negative
/// values and histogram or summary series.
pub fn count_nodes(samples: &[Sample], selector: &NodeMetricSelector) -> Option<u64> {
    let mut found = false;
    let mut total = 0.0_f64;
    for sample in samples.iter().filter(|s| s.metric == selector.metric_name) {
        found = true;
        let downstream = sample
            .labels
            .get(&selector.cluster_label)
            .is_some_and(|id| id != selector.local_cluster_id);
        if !downstream {
            continue;
        }
        let value = match sample.value {
            Value::Gauge(v) | Value::Counter(v) | Value::Untyped(v) => v,
            _ => continue,
        };
        if value.is_finite() && value > 0.0 {
            total += value;
        }
    }
    found.then(|| total.round() as u64)
}

#[derive(Debug, Clone)]
pub struct MetricsScraper {
    http: reqwest::Client,
    url: String,
    token: Option<String>,
    selector: NodeMetricSelector,
}

impl MetricsScraper {
    pub fn new(
        url: String,
        token: Option<String>,
        selector: NodeMetricSelector,
        timeout: Duration,
    ) -> Result<Self, CollaboratorError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CollaboratorError::Config(format!("unable to build http client: {e}")))?;
        Ok(Self {
            http,
            url,
            token,
            selector,
        })
    }
}

#[async_trait]
impl NodeCountSource for MetricsScraper {
    async fn current_node_count(&self) -> Result<NodeCounts, CollaboratorError> {
        let mut req = self.http.get(&self.url);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        let resp = req
            .send()
            .await
            .map_err(|e| CollaboratorError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(CollaboratorError::Api {
                status: Some(status.as_u16()),
                message: format!("metrics endpoint returned {status}"),
            });
        }

        let body = resp
            .text()
            .await
            .map_err(|e| CollaboratorError::Transport(e.to_string()))?;
        let scrape = parse_scrape(&body)?;
        let total = count_nodes(&scrape.samples, &self.selector).ok_or_else(|| {
            CollaboratorError::Decode(format!(
                "metric {} not found in scrape",
                self.selector.metric_name
            ))
        })?;
        debug!(samples = scrape.samples.len(), total, "scraped node count");
        Ok(NodeCounts { total })
    }
}
