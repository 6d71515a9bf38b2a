//! Scenario: Fatal Failures Abort The Pass
//!
//! # Invariants under test
//!
//! 1. A missing grant, an unavailable node count, a rejected checkout and a
//!    failed publish each abort the pass with a typed error.
//! 2. An aborted checkout leaves the persisted record untouched and
//!    publishes nothing from the pass itself.
//! 3. A failed publish happens after the state write.
//! 4. `run_once` publishes a non-compliant failure report carrying the error
//!    text and the adapter-failure notification.

use csp_reconcile::report::ADAPTER_FAILURE_NOTIFICATION;
use csp_reconcile::{run_once, CollaboratorError, ReconcileError};
use csp_schemas::ComplianceStatus;
use csp_testkit::Harness;

#[tokio::test]
async fn missing_grant_is_fatal_before_any_allocation() {
    let h = Harness::new(20, 2);
    h.license.fail_grant(true);

    let err = h.reconciler.run_pass().await.unwrap_err();

    assert!(matches!(err, ReconcileError::LicenseUnavailable(_)));
    assert_eq!(err.kind(), "license_unavailable");
    assert_eq!(h.license.calls().checkout, 0);
    assert_eq!(h.store.writes(), 0);
    assert_eq!(h.sink.count(), 0);
}

#[tokio::test]
async fn unavailable_node_count_is_fatal() {
    let h = Harness::new(20, 2);
    h.nodes.fail(true);

    let err = h.reconciler.run_pass().await.unwrap_err();

    assert!(matches!(err, ReconcileError::MetricsUnavailable(_)));
    assert!(err
        .to_string()
        .starts_with("unable to determine number of active nodes"));
    assert_eq!(h.license.calls().checkout, 0);
}

#[tokio::test]
async fn rejected_checkout_leaves_store_untouched() {
    let h = Harness::new(40, 2);
    let seeded = h.seed_held(1);
    h.license.fail_checkout(true);

    let err = h.reconciler.run_pass().await.unwrap_err();

    assert!(matches!(
        err,
        ReconcileError::CheckoutFailed(CollaboratorError::Api {
            status: Some(500),
            ..
        })
    ));
    assert_eq!(h.store.get(), Some(seeded));
    assert_eq!(h.store.writes(), 0);
    assert_eq!(h.sink.count(), 0);
}

#[tokio::test]
async fn over_allocation_is_rejected_by_authority() {
    let h = Harness::new(40, 1);
    h.license.fail_available(true);

    let err = h.reconciler.run_pass().await.unwrap_err();

    assert!(matches!(err, ReconcileError::CheckoutFailed(_)));
    assert_eq!(h.license.total_checked_out(), 0);
}

#[tokio::test]
async fn missing_fingerprint_rejects_checkout() {
    let h = Harness::new(20, 2);
    h.license.remove_fingerprint();

    let err = h.reconciler.run_pass().await.unwrap_err();

    assert!(matches!(
        err,
        ReconcileError::CheckoutFailed(CollaboratorError::Config(_))
    ));
}

#[tokio::test]
async fn failed_publish_happens_after_persist() {
    let h = Harness::new(20, 2);
    h.sink.fail(true);

    let err = h.reconciler.run_pass().await.unwrap_err();

    assert!(matches!(err, ReconcileError::OutputUnavailable(_)));
    assert_eq!(h.store.writes(), 1);
    assert_eq!(h.store.get().unwrap().entitled_licenses, 1);
}

#[tokio::test]
async fn run_once_publishes_failure_report() {
    let h = Harness::new(20, 2);
    h.license.fail_grant(true);

    let result = run_once(&h.reconciler).await;
    assert!(result.is_err());

    let (report, notification) = h.sink.last().expect("failure report published");
    assert_eq!(report.compliance.status, ComplianceStatus::NotInCompliance);
    assert!(report
        .compliance
        .message
        .starts_with("unable to run compliance check with error: unable to get license"));
    assert_eq!(notification, ADAPTER_FAILURE_NOTIFICATION);
    assert!(report.entitlements.is_none());
    assert_eq!(report.csp.acct_number, csp_testkit::FAKE_ACCOUNT);
}

#[tokio::test]
async fn run_once_survives_failing_sink() {
    let h = Harness::new(20, 2);
    h.license.fail_grant(true);
    h.sink.fail(true);

    let err = run_once(&h.reconciler).await.unwrap_err();

    assert!(matches!(err, ReconcileError::LicenseUnavailable(_)));
    assert_eq!(h.sink.count(), 0);
}
