//! Scenario: Daemon Loop Updates Shared State
//!
//! # Invariants under test
//!
//! 1. Every pass of the spawned loop is recorded in the status snapshot.
//! 2. Reports published through `ObservedSink` (including failure reports)
//!    become the `/v1/compliance` payload.
//! 3. A startup failure publishes a non-compliant report with account
//!    "unknown" and the startup notification.
//! 4. A startup failure after the license service connected reports the
//!    account it returned.
//! 5. The loop stops when shutdown is signalled.

use std::sync::Arc;
use std::time::Duration;

use csp_config::secrets::ResolvedSecrets;
use csp_config::StateBackend;
use csp_daemon::{state, wiring};
use csp_reconcile::report::STARTUP_FAILURE_NOTIFICATION;
use csp_reconcile::{ComplianceSink, Reconciler, ReconcilerConfig, ReportIdentity};
use csp_testkit::{FakeLicenseService, FixedNodeCount, MemoryStateStore, RecordingSink};
use httpmock::prelude::*;
use tokio::sync::watch;

struct Wired {
    state: Arc<state::AppState>,
    nodes: Arc<FixedNodeCount>,
    recorded: Arc<RecordingSink>,
    reconciler: Arc<Reconciler>,
}

fn wired(nodes: u64, max: i64) -> Wired {
    let state = Arc::new(state::AppState::new());
    let recorded = Arc::new(RecordingSink::new());
    let sink: Arc<dyn ComplianceSink> =
        Arc::new(state::ObservedSink::new(recorded.clone(), Arc::clone(&state)));
    let node_source = Arc::new(FixedNodeCount::new(nodes));
    let reconciler = Arc::new(Reconciler::new(
        ReconcilerConfig::default(),
        Arc::new(FakeLicenseService::new(max)),
        node_source.clone(),
        Arc::new(MemoryStateStore::new()),
        sink,
    ));
    Wired {
        state,
        nodes: node_source,
        recorded,
        reconciler,
    }
}

#[tokio::test(start_paused = true)]
async fn loop_records_passes_and_reports() {
    let w = wired(20, 2);
    let (stop_tx, stop_rx) = watch::channel(false);
    let mut status_rx = w.state.status.subscribe();

    let handle = state::spawn_reconcile_loop(
        Arc::clone(&w.state),
        Arc::clone(&w.reconciler),
        stop_rx,
    );

    status_rx
        .wait_for(|s| s.passes_total >= 1)
        .await
        .unwrap();
    let report = w.state.last_report.borrow().clone().expect("report observed");
    assert!(report.is_compliant());

    w.nodes.fail(true);
    tokio::time::sleep(Duration::from_secs(30)).await;
    status_rx
        .wait_for(|s| s.passes_total >= 2)
        .await
        .unwrap();

    let snap = w.state.status.borrow().clone();
    assert_eq!(snap.passes_failed, 1);
    let report = w.state.last_report.borrow().clone().unwrap();
    assert!(!report.is_compliant());
    assert!(report.entitlements.is_none());
    assert_eq!(w.recorded.count(), 2);

    stop_tx.send(true).unwrap();
    handle.await.unwrap();
}

#[tokio::test]
async fn startup_failure_report_uses_unknown_account() {
    let recorded = RecordingSink::new();
    let err = anyhow::anyhow!("SECRETS_MISSING: required env var 'CSP_LICENSE_TOKEN' is not set");

    wiring::publish_startup_failure(&recorded, &ReportIdentity::default(), None, &err)
        .await
        .unwrap();

    let (report, notification) = recorded.last().unwrap();
    assert!(!report.is_compliant());
    assert_eq!(report.csp.acct_number, wiring::UNKNOWN_ACCOUNT);
    assert!(report
        .compliance
        .message
        .starts_with("CSP adapter unable to start due to error: SECRETS_MISSING"));
    assert_eq!(notification, STARTUP_FAILURE_NOTIFICATION);
}

#[tokio::test]
async fn file_sink_from_config_writes_into_output_dir() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = csp_config::AdapterConfig::default();
    cfg.output.dir = dir.path().to_path_buf();

    let sink = wiring::output_sink(&cfg);
    let err = anyhow::anyhow!("license service unreachable");
    wiring::publish_startup_failure(&sink, &wiring::report_identity(&cfg), None, &err)
        .await
        .unwrap();

    assert!(dir.path().join("csp-config.json").exists());
    assert!(dir.path().join("csp-compliance.txt").exists());
}

#[tokio::test]
async fn store_failure_after_connect_reports_known_account() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/v1/identity");
            then.status(200)
                .json_body(serde_json::json!({ "account": "111111111111" }));
        })
        .await;

    let mut cfg = csp_config::AdapterConfig::default();
    cfg.license.base_url = server.base_url();
    cfg.state.backend = StateBackend::Postgres;
    let secrets = ResolvedSecrets {
        license_token: "license-token".to_string(),
        metrics_token: None,
        database_url: None,
    };
    let recorded = Arc::new(RecordingSink::new());

    let failure = match wiring::build_reconciler(&cfg, &secrets, recorded.clone()).await {
        Ok(_) => panic!("postgres backend without a database url must fail"),
        Err(failure) => failure,
    };
    assert_eq!(failure.account.as_deref(), Some("111111111111"));
    assert!(format!("{:#}", failure.error).contains(&cfg.state.database_url_env));

    wiring::publish_startup_failure(
        recorded.as_ref(),
        &wiring::report_identity(&cfg),
        failure.account.as_deref(),
        &failure.error,
    )
    .await
    .unwrap();

    let (report, _) = recorded.last().unwrap();
    assert_eq!(report.csp.acct_number, "111111111111");
}
