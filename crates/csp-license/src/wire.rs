//! Request and response bodies of the license service.

use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub(crate) struct IdentityResponse {
    #[serde(default)]
    pub account: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListLicensesResponse {
    #[serde(default)]
    pub licenses: Vec<WireLicense>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireLicense {
    pub license_arn: String,
    #[serde(default)]
    pub issuer: Option<WireIssuer>,
    #[serde(default)]
    pub entitlements: Vec<WireEntitlement>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireIssuer {
    #[serde(default)]
    pub key_fingerprint: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireEntitlement {
    pub name: String,
    #[serde(default)]
    pub max_count: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UsageResponse {
    #[serde(default)]
    pub entitlement_usages: Vec<EntitlementUsage>,
}

/// `consumed_value` arrives as a decimal string.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EntitlementUsage {
    pub name: String,
    pub consumed_value: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CheckoutRequest<'a> {
    pub client_token: String,
    pub product_sku: &'a str,
    pub key_fingerprint: &'a str,
    pub checkout_type: &'static str,
    pub entitlements: Vec<CheckoutEntitlement<'a>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CheckoutEntitlement<'a> {
    pub name: &'a str,
    pub unit: &'static str,
    pub value: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TokenRequest<'a> {
    pub license_consumption_token: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ConsumptionResponse {
    #[serde(default)]
    pub license_consumption_token: Option<String>,
    #[serde(default)]
    pub expiration: Option<String>,
}
