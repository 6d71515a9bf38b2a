//! Timer-driven loop around [`Reconciler::run_pass`].
//!
//! One task, one pass at a time: a slow pass delays the next tick instead of
//! overlapping it. Shutdown is cooperative and only observed between passes.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::{PassOutcome, ReconcileError, Reconciler};

pub type PassResult = Result<PassOutcome, ReconcileError>;

/// Run one pass; on a fatal error also publish a failure report.
///
/// The pass error is returned unchanged; a failure to publish the failure
/// report is only logged.
pub async fn run_once(reconciler: &Reconciler) -> PassResult {
    let result = reconciler.run_pass().await;
    if let Err(err) = &result {
        error!(kind = err.kind(), error = %err, "compliance check failed");
        if let Err(publish_err) = reconciler.publish_failure(err).await {
            error!(error = %publish_err, "unable to publish compliance check failure");
        }
    }
    result
}

/// Tick until `shutdown` flips to `true` (or its sender is dropped).
///
/// The first tick fires immediately. `on_pass` sees every pass result,
/// successful or not, after any failure report has been published.
pub async fn run_loop<F>(reconciler: Arc<Reconciler>, mut shutdown: watch::Receiver<bool>, mut on_pass: F)
where
    F: FnMut(&PassResult) + Send,
{
    let interval = reconciler.config().interval;
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(interval_secs = interval.as_secs(), "reconcile loop started");

    loop {
        if *shutdown.borrow() {
            break;
        }
        tokio::select! {
            biased;
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
            _ = ticker.tick() => {}
        }

        let result = run_once(&reconciler).await;
        on_pass(&result);
    }

    info!("reconcile loop exiting");
}
