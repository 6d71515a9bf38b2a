//! Runtime secret resolution.
//!
//! # Contract
//! - Config YAML stores only **env var NAMES** (e.g. `"CSP_LICENSE_TOKEN"`).
//! - The daemon calls [`resolve_secrets`] once at startup and passes the
//!   result into adapter constructors; no other crate reads the environment.
//! - `Debug` redacts every value.
//! - Error messages name the env var, never the value.
//!
//! # Enforcement
//! | Secret            | Required when                     |
//! |-------------------|-----------------------------------|
//! | license token     | always                            |
//! | metrics token     | never (unauthenticated endpoints) |
//! | database URL      | `state.backend == postgres`       |

use anyhow::{bail, Result};

use crate::{AdapterConfig, StateBackend};

#[derive(Clone)]
pub struct ResolvedSecrets {
    pub license_token: String,
    pub metrics_token: Option<String>,
    pub database_url: Option<String>,
}

impl std::fmt::Debug for ResolvedSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSecrets")
            .field("license_token", &"<REDACTED>")
            .field(
                "metrics_token",
                &self.metrics_token.as_ref().map(|_| "<REDACTED>"),
            )
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "<REDACTED>"),
            )
            .finish()
    }
}

/// Returns `None` if the variable is unset or blank.
fn resolve_env(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

pub fn resolve_secrets(cfg: &AdapterConfig) -> Result<ResolvedSecrets> {
    resolve_secrets_with(cfg, resolve_env)
}

/// Same as [`resolve_secrets`] with an injectable lookup, so tests do not
/// mutate the process environment.
pub fn resolve_secrets_with<F>(cfg: &AdapterConfig, lookup: F) -> Result<ResolvedSecrets>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(license_token) = lookup(&cfg.license.token_env) else {
        bail!(
            "SECRETS_MISSING: required env var '{}' (license service token) is not set or empty",
            cfg.license.token_env
        );
    };

    let metrics_token = lookup(&cfg.metrics.token_env);

    let database_url = lookup(&cfg.state.database_url_env);
    if cfg.state.backend == StateBackend::Postgres && database_url.is_none() {
        bail!(
            "SECRETS_MISSING: required env var '{}' (postgres state backend) is not set or empty",
            cfg.state.database_url_env
        );
    }

    Ok(ResolvedSecrets {
        license_token,
        metrics_token,
        database_url,
    })
}
