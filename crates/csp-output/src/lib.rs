//! csp-output
//!
//! Publishes compliance reports as files for the support tooling to pick up:
//!
//! - `<dir>/<config_name>.json`: the current support-config document,
//!   replaced atomically every pass.
//! - `<dir>/<notification_name>.txt`: operator notification, present only
//!   while the report is not compliant.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use csp_reconcile::{CollaboratorError, ComplianceSink};
use csp_schemas::ComplianceReport;
use csp_store::{io_err, write_atomic};
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct FileComplianceSink {
    config_path: PathBuf,
    notification_path: PathBuf,
}

impl FileComplianceSink {
    pub fn new(dir: impl AsRef<Path>, config_name: &str, notification_name: &str) -> Self {
        let dir = dir.as_ref();
        Self {
            config_path: dir.join(format!("{config_name}.json")),
            notification_path: dir.join(format!("{notification_name}.txt")),
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn notification_path(&self) -> &Path {
        &self.notification_path
    }

    async fn clear_notification(&self) -> Result<(), CollaboratorError> {
        match tokio::fs::remove_file(&self.notification_path).await {
            Ok(()) => {
                info!("compliance restored, removed notification");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_err("remove", &self.notification_path, e)),
        }
    }
}

#[async_trait]
impl ComplianceSink for FileComplianceSink {
    async fn publish(
        &self,
        report: &ComplianceReport,
        notification: &str,
    ) -> Result<(), CollaboratorError> {
        let mut json = serde_json::to_vec_pretty(report)
            .map_err(|e| CollaboratorError::Decode(e.to_string()))?;
        json.push(b'\n');
        write_atomic(&self.config_path, &json).await?;

        if report.is_compliant() {
            self.clear_notification().await?;
        } else {
            write_atomic(&self.notification_path, format!("{notification}\n").as_bytes())
                .await?;
        }
        debug!(
            path = %self.config_path.display(),
            status = report.compliance.status.as_str(),
            "published compliance report"
        );
        Ok(())
    }
}
