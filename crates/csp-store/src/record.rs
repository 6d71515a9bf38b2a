//! Persisted shape of [`CheckoutInfo`]: three text fields.

use chrono::{DateTime, SecondsFormat, Utc};
use csp_reconcile::CollaboratorError;
use csp_schemas::CheckoutInfo;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consumption_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entitled_nodes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<String>,
}

impl From<&CheckoutInfo> for StateRecord {
    fn from(info: &CheckoutInfo) -> Self {
        Self {
            consumption_token: Some(info.consumption_token.clone()),
            entitled_nodes: Some(info.entitled_licenses.to_string()),
            expiry: Some(info.expiry.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        }
    }
}

impl StateRecord {
    /// All three fields must be present and parse.
    pub fn into_checkout_info(self) -> Result<CheckoutInfo, CollaboratorError> {
        let consumption_token = self
            .consumption_token
            .ok_or_else(|| missing("consumptionToken"))?;
        let entitled = self.entitled_nodes.ok_or_else(|| missing("entitledNodes"))?;
        let expiry = self.expiry.ok_or_else(|| missing("expiry"))?;

        let entitled_licenses: u32 = entitled.trim().parse().map_err(|_| {
            CollaboratorError::Decode(format!("entitledNodes '{entitled}' is not a count"))
        })?;
        let expiry = DateTime::parse_from_rfc3339(&expiry)
            .map_err(|e| CollaboratorError::Decode(format!("expiry '{expiry}' is invalid: {e}")))?
            .with_timezone(&Utc);

        Ok(CheckoutInfo {
            consumption_token,
            entitled_licenses,
            expiry,
        })
    }
}

fn missing(field: &str) -> CollaboratorError {
    CollaboratorError::Decode(format!(
        "couldn't read license consumption info from record: missing {field}"
    ))
}
