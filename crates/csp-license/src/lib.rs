//! csp-license
//!
//! HTTP client for the marketplace license service. Implements
//! [`csp_reconcile::LicenseService`].
//!
//! The bearer token is read by the caller and passed in; do not log it.

mod wire;

use std::time::Duration;

use async_trait::async_trait;
use csp_reconcile::{CheckoutGrant, CollaboratorError, LicenseService};
use csp_schemas::{Entitlement, License};
use reqwest::{Response, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::wire::{
    CheckoutEntitlement, CheckoutRequest, ConsumptionResponse, IdentityResponse,
    ListLicensesResponse, TokenRequest, UsageResponse,
};

const CHECKOUT_TYPE: &str = "PROVISIONAL";
const ENTITLEMENT_UNIT: &str = "Count";
/// Longest error body echoed back in an `Api` error.
const MAX_ERROR_BODY: usize = 512;

/// Connection settings for [`HttpLicenseService::connect`].
#[derive(Debug, Clone)]
pub struct LicenseClientConfig {
    pub base_url: String,
    pub token: String,
    pub product_sku: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct HttpLicenseService {
    http: reqwest::Client,
    base_url: Url,
    token: String,
    product_sku: String,
    account: String,
}

impl HttpLicenseService {
    /// Build the client and resolve the account it acts for.
    ///
    /// Fails if the base URL is unusable or the identity call fails, so a
    /// misconfigured adapter is caught at startup rather than on first pass.
    pub async fn connect(cfg: LicenseClientConfig) -> Result<Self, CollaboratorError> {
        let base_url = Url::parse(&cfg.base_url).map_err(|e| {
            CollaboratorError::Config(format!("invalid license base_url '{}': {e}", cfg.base_url))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(CollaboratorError::Config(format!(
                "license base_url '{}' cannot carry a path",
                cfg.base_url
            )));
        }
        let http = reqwest::Client::builder()
            .timeout(cfg.timeout)
            .build()
            .map_err(|e| CollaboratorError::Config(format!("unable to build http client: {e}")))?;

        let mut svc = Self {
            http,
            base_url,
            token: cfg.token,
            product_sku: cfg.product_sku,
            account: String::new(),
        };

        let identity: IdentityResponse = svc.get_json(&["v1", "identity"], &[]).await?;
        if identity.account.is_empty() {
            return Err(CollaboratorError::Decode(
                "identity response carried no account".to_string(),
            ));
        }
        debug!(account = %identity.account, "resolved license service account");
        svc.account = identity.account;
        Ok(svc)
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // Checked in connect: the base URL can carry a path.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, &str)],
    ) -> Result<T, CollaboratorError> {
        let resp = self
            .http
            .get(self.endpoint(segments))
            .bearer_auth(&self.token)
            .query(query)
            .send()
            .await
            .map_err(transport)?;
        decode(check_status(resp).await?).await
    }

    async fn post<B: Serialize>(
        &self,
        segments: &[&str],
        body: &B,
    ) -> Result<Response, CollaboratorError> {
        let resp = self
            .http
            .post(self.endpoint(segments))
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await
            .map_err(transport)?;
        check_status(resp).await
    }

    async fn post_consumption<B: Serialize>(
        &self,
        segments: &[&str],
        body: &B,
    ) -> Result<CheckoutGrant, CollaboratorError> {
        let resp: ConsumptionResponse = decode(self.post(segments, body).await?).await?;
        let consumption_token = resp
            .license_consumption_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                CollaboratorError::Decode("response carried no consumption token".to_string())
            })?;
        Ok(CheckoutGrant {
            consumption_token,
            expiration: resp.expiration.unwrap_or_default(),
        })
    }
}

fn transport(err: reqwest::Error) -> CollaboratorError {
    CollaboratorError::Transport(err.to_string())
}

async fn check_status(resp: Response) -> Result<Response, CollaboratorError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let mut message = resp.text().await.unwrap_or_default();
    if message.len() > MAX_ERROR_BODY {
        let cut = (0..=MAX_ERROR_BODY)
            .rev()
            .find(|i| message.is_char_boundary(*i))
            .unwrap_or(0);
        message.truncate(cut);
    }
    Err(CollaboratorError::Api {
        status: Some(status.as_u16()),
        message,
    })
}

async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, CollaboratorError> {
    let bytes = resp.bytes().await.map_err(transport)?;
    serde_json::from_slice(&bytes).map_err(|e| CollaboratorError::Decode(e.to_string()))
}

#[async_trait]
impl LicenseService for HttpLicenseService {
    fn account_number(&self) -> &str {
        &self.account
    }

    async fn current_grant(&self) -> Result<License, CollaboratorError> {
        let resp: ListLicensesResponse = self
            .get_json(
                &["v1", "licenses"],
                &[
                    ("productSku", self.product_sku.as_str()),
                    ("maxResults", "1"),
                ],
            )
            .await?;

        let wire = resp.licenses.into_iter().next().ok_or_else(|| {
            CollaboratorError::NotFound(format!(
                "no license granted for product sku {}",
                self.product_sku
            ))
        })?;

        Ok(License {
            license_id: wire.license_arn,
            key_fingerprint: wire
                .issuer
                .and_then(|i| i.key_fingerprint)
                .filter(|f| !f.is_empty()),
            entitlements: wire
                .entitlements
                .into_iter()
                .map(|e| Entitlement {
                    name: e.name,
                    max_count: e.max_count.unwrap_or(0),
                })
                .collect(),
        })
    }

    async fn available_entitlements(
        &self,
        license: &License,
        dimension: &str,
    ) -> Result<i64, CollaboratorError> {
        let max = license.max_count_for(dimension).ok_or_else(|| {
            CollaboratorError::NotFound(format!(
                "entitlement {dimension} not found on license {}",
                license.license_id
            ))
        })?;

        let usage: UsageResponse = self
            .get_json(&["v1", "licenses", &license.license_id, "usage"], &[])
            .await?;

        let mut consumed: i64 = 0;
        for u in usage.entitlement_usages.iter().filter(|u| u.name == dimension) {
            let value: i64 = u.consumed_value.trim().parse().map_err(|_| {
                CollaboratorError::Decode(format!(
                    "unable to parse consumed value '{}' for {dimension}",
                    u.consumed_value
                ))
            })?;
            consumed = consumed.saturating_add(value);
        }
        Ok(max - consumed)
    }

    async fn checkout(
        &self,
        license: &License,
        dimension: &str,
        amount: u32,
    ) -> Result<CheckoutGrant, CollaboratorError> {
        let fingerprint = license.key_fingerprint.as_deref().ok_or_else(|| {
            CollaboratorError::Config(format!(
                "license {} must have a key fingerprint for checkout",
                license.license_id
            ))
        })?;

        let req = CheckoutRequest {
            client_token: uuid::Uuid::new_v4().to_string(),
            product_sku: &self.product_sku,
            key_fingerprint: fingerprint,
            checkout_type: CHECKOUT_TYPE,
            entitlements: vec![CheckoutEntitlement {
                name: dimension,
                unit: ENTITLEMENT_UNIT,
                value: amount.to_string(),
            }],
        };
        self.post_consumption(&["v1", "checkout"], &req).await
    }

    async fn check_in(&self, consumption_token: &str) -> Result<(), CollaboratorError> {
        let req = TokenRequest {
            license_consumption_token: consumption_token,
        };
        self.post(&["v1", "checkin"], &req).await?;
        Ok(())
    }

    async fn extend(&self, consumption_token: &str) -> Result<CheckoutGrant, CollaboratorError> {
        let req = TokenRequest {
            license_consumption_token: consumption_token,
        };
        self.post_consumption(&["v1", "extend"], &req).await
    }
}
