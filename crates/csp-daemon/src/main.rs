//! csp-daemon entry point.
//!
//! Thin: sets up tracing, loads layered config, wires the reconciler and
//! its collaborators, then runs the reconcile loop next to the status
//! server until Ctrl-C. Handlers live in `routes.rs`, shared state in
//! `state.rs`, collaborator assembly in `wiring.rs`.

use std::{net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use axum::http::{HeaderValue, Method};
use clap::Parser;
use csp_config::{secrets::resolve_secrets, UnusedKeyPolicy};
use csp_daemon::{routes, state, wiring};
use csp_reconcile::{run_once, ComplianceSink};
use tokio::sync::watch;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{error, info, warn, Level};

#[derive(Parser)]
#[command(name = "csp-daemon")]
#[command(about = "Marketplace license entitlement reconciler", long_about = None)]
struct Cli {
    /// Config layers in merge order (base -> env -> site).
    #[arg(long = "config", required = true)]
    config: Vec<String>,

    /// Run a single reconcile pass and exit.
    #[arg(long, default_value_t = false)]
    once: bool,

    /// Status server address; overrides daemon.addr.
    #[arg(long)]
    addr: Option<String>,

    /// Fail on unrecognized config keys instead of warning.
    #[arg(long, default_value_t = false)]
    strict_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Silent if the file does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();
    let cli = Cli::parse();

    let paths: Vec<&str> = cli.config.iter().map(String::as_str).collect();
    let loaded = csp_config::load_layered_yaml(&paths).context("config load failed")?;
    let policy = if cli.strict_config {
        UnusedKeyPolicy::Fail
    } else {
        UnusedKeyPolicy::Warn
    };
    let unused = csp_config::report_unused_keys(&loaded.config_json, policy)?;
    for pointer in &unused.unused_leaf_pointers {
        warn!(pointer = %pointer, "unused config key");
    }
    let cfg = loaded.adapter()?;
    info!(config_hash = %loaded.config_hash, "config loaded");

    let shared = Arc::new(state::AppState::with_config(
        loaded.config_hash.clone(),
        cfg.reconciler.interval_secs,
    ));
    let sink: Arc<dyn ComplianceSink> = Arc::new(state::ObservedSink::new(
        Arc::new(wiring::output_sink(&cfg)),
        Arc::clone(&shared),
    ));

    let built = match resolve_secrets(&cfg) {
        Ok(secrets) => wiring::build_reconciler(&cfg, &secrets, Arc::clone(&sink)).await,
        Err(err) => Err(wiring::StartupFailure::from(err)),
    };
    let reconciler = match built {
        Ok(r) => Arc::new(r),
        Err(failure) => {
            let err = failure.error;
            error!(error = %format!("{err:#}"), "csp adapter unable to start");
            let identity = wiring::report_identity(&cfg);
            if let Err(publish_err) = wiring::publish_startup_failure(
                sink.as_ref(),
                &identity,
                failure.account.as_deref(),
                &err,
            )
            .await
            {
                error!(error = %publish_err, "unable to publish startup failure report");
            }
            return Err(err);
        }
    };

    if cli.once {
        let result = run_once(&reconciler).await;
        shared.record_pass(&result);
        let outcome = result.context("compliance check failed")?;
        info!(
            status = outcome.status().as_str(),
            message = %outcome.report.compliance.message,
            "single pass complete"
        );
        return Ok(());
    }

    let (stop_tx, stop_rx) = watch::channel(false);
    let loop_handle =
        state::spawn_reconcile_loop(Arc::clone(&shared), Arc::clone(&reconciler), stop_rx.clone());

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    let addr_text = cli.addr.unwrap_or_else(|| cfg.daemon.addr.clone());
    let addr: SocketAddr = addr_text
        .parse()
        .with_context(|| format!("invalid daemon address '{addr_text}'"))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("unable to bind {addr}"))?;
    info!("csp-daemon listening on http://{}", addr);

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("shutdown requested"),
            Err(err) => error!(error = %err, "unable to listen for shutdown signal"),
        }
        let _ = stop_tx.send(true);
    });

    let mut server_stop = stop_rx;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = server_stop.wait_for(|stop| *stop).await;
        })
        .await
        .context("server crashed")?;

    loop_handle.await.context("reconcile loop panicked")?;
    info!("csp-daemon stopped");
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

/// CORS: allow only localhost origins.
fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
    ];

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET])
        .allow_headers(tower_http::cors::Any)
}
