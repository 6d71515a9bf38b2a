//! Postgres checkout store: one row per name in `checkout_state`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use csp_reconcile::{CheckoutStateStore, CollaboratorError};
use csp_schemas::CheckoutInfo;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::record::StateRecord;

/// Env var read by DB-backed tests.
pub const ENV_DB_URL: &str = "CSP_DATABASE_URL";

pub async fn connect(url: &str) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(2)
        .connect(url)
        .await
        .context("failed to connect to Postgres")
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct PgStateStore {
    pool: PgPool,
    name: String,
}

impl PgStateStore {
    pub fn new(pool: PgPool, name: impl Into<String>) -> Self {
        Self {
            pool,
            name: name.into(),
        }
    }

    /// Connect, migrate, and bind to `name`.
    pub async fn connect(url: &str, name: impl Into<String>) -> Result<Self> {
        let pool = connect(url).await?;
        migrate(&pool).await?;
        Ok(Self::new(pool, name))
    }
}

fn db_err(err: sqlx::Error) -> CollaboratorError {
    CollaboratorError::Transport(format!("checkout_state: {err}"))
}

#[async_trait]
impl CheckoutStateStore for PgStateStore {
    async fn read(&self) -> Result<Option<CheckoutInfo>, CollaboratorError> {
        let row: Option<(Option<String>, Option<String>, Option<String>)> = sqlx::query_as(
            r#"
            select consumption_token, entitled_nodes, expiry
            from checkout_state
            where name = $1
            "#,
        )
        .bind(&self.name)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        let Some((consumption_token, entitled_nodes, expiry)) = row else {
            return Ok(None);
        };
        StateRecord {
            consumption_token,
            entitled_nodes,
            expiry,
        }
        .into_checkout_info()
        .map(Some)
    }

    async fn write(&self, info: &CheckoutInfo) -> Result<(), CollaboratorError> {
        let rec = StateRecord::from(info);
        sqlx::query(
            r#"
            insert into checkout_state (name, consumption_token, entitled_nodes, expiry, updated_at_utc)
            values ($1, $2, $3, $4, now())
            on conflict (name) do update
               set consumption_token = excluded.consumption_token,
                   entitled_nodes    = excluded.entitled_nodes,
                   expiry            = excluded.expiry,
                   updated_at_utc    = excluded.updated_at_utc
            "#,
        )
        .bind(&self.name)
        .bind(&rec.consumption_token)
        .bind(&rec.entitled_nodes)
        .bind(&rec.expiry)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }
}
