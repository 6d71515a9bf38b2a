//! csp-testkit
//!
//! In-memory doubles for the reconciler's collaborators and a [`Harness`]
//! that wires them to a [`Reconciler`]. Scenario tests live under `tests/`.

mod fakes;

pub use fakes::{
    CallCounts, ExpiryFormat, FakeLicenseService, FixedNodeCount, MemoryStateStore, RecordingSink,
    FAKE_ACCOUNT, FAKE_LICENSE_ID,
};

use std::sync::Arc;

use csp_reconcile::{Reconciler, ReconcilerConfig};
use csp_schemas::CheckoutInfo;

/// A reconciler wired to fresh doubles, with handles kept for assertions.
pub struct Harness {
    pub license: Arc<FakeLicenseService>,
    pub nodes: Arc<FixedNodeCount>,
    pub store: Arc<MemoryStateStore>,
    pub sink: Arc<RecordingSink>,
    pub reconciler: Arc<Reconciler>,
}

impl Harness {
    /// `node_count` managed nodes, `max_entitlements` units on the grant,
    /// nothing held, default reconciler config.
    pub fn new(node_count: u64, max_entitlements: i64) -> Self {
        Self::with_config(ReconcilerConfig::default(), node_count, max_entitlements)
    }

    pub fn with_config(cfg: ReconcilerConfig, node_count: u64, max_entitlements: i64) -> Self {
        let license = Arc::new(FakeLicenseService::new(max_entitlements));
        let nodes = Arc::new(FixedNodeCount::new(node_count));
        let store = Arc::new(MemoryStateStore::new());
        let sink = Arc::new(RecordingSink::new());
        let reconciler = Arc::new(Reconciler::new(
            cfg,
            license.clone(),
            nodes.clone(),
            store.clone(),
            sink.clone(),
        ));
        Self {
            license,
            nodes,
            store,
            sink,
            reconciler,
        }
    }

    /// Simulate a previous process having checked out `amount` units and
    /// cached the result. Does not count as a checkout call.
    pub fn seed_held(&self, amount: u32) -> CheckoutInfo {
        let info = self.license.seed_checkout(amount);
        self.store.put(Some(info.clone()));
        info
    }
}
