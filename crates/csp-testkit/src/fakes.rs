use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use csp_reconcile::{
    CheckoutGrant, CheckoutStateStore, CollaboratorError, ComplianceSink, LicenseService,
    NodeCountSource,
};
use csp_schemas::{CheckoutInfo, ComplianceReport, Entitlement, License, NodeCounts};

pub const FAKE_ACCOUNT: &str = "111111111111";
pub const FAKE_LICENSE_ID: &str = "arn:aws:license-manager::111111111111:license:l-12345";
const FAKE_DIMENSION: &str = "RKE_NODE_SUPP";

// ---------------------------------------------------------------------------
// License service
// ---------------------------------------------------------------------------

/// How the fake renders expiry timestamps in checkout/extend responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryFormat {
    Rfc3339,
    NoTimezone,
    Garbage,
}

/// Calls the reconciler made, seeding excluded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub grant: u32,
    pub available: u32,
    pub checkout: u32,
    pub check_in: u32,
    pub extend: u32,
}

#[derive(Debug)]
struct LicenseState {
    max_entitlements: i64,
    fingerprint: Option<String>,
    checked_out: BTreeMap<String, u32>,
    token_ctr: u64,
    ttl: TimeDelta,
    expiry_format: ExpiryFormat,
    calls: CallCounts,
    last_checkout_amount: Option<u32>,
    fail_grant: bool,
    fail_available: bool,
    fail_checkout: bool,
    fail_check_in: bool,
    fail_extend: bool,
}

/// Entitlement authority with one grant and an in-memory checkout ledger.
///
/// Rejects checkouts that would exceed the grant, mirroring the authority
/// being the final word on over-allocation.
#[derive(Debug)]
pub struct FakeLicenseService {
    state: Mutex<LicenseState>,
}

impl FakeLicenseService {
    pub fn new(max_entitlements: i64) -> Self {
        Self {
            state: Mutex::new(LicenseState {
                max_entitlements,
                fingerprint: Some("aws:294406891311:AWS/Marketplace:issuer-fingerprint".to_string()),
                checked_out: BTreeMap::new(),
                token_ctr: 0,
                ttl: TimeDelta::hours(1),
                expiry_format: ExpiryFormat::Rfc3339,
                calls: CallCounts::default(),
                last_checkout_amount: None,
                fail_grant: false,
                fail_available: false,
                fail_checkout: false,
                fail_check_in: false,
                fail_extend: false,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LicenseState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn calls(&self) -> CallCounts {
        self.lock().calls
    }

    pub fn last_checkout_amount(&self) -> Option<u32> {
        self.lock().last_checkout_amount
    }

    /// Sum of units currently checked out across all live tokens.
    pub fn total_checked_out(&self) -> u32 {
        self.lock().checked_out.values().sum()
    }

    pub fn live_tokens(&self) -> Vec<String> {
        self.lock().checked_out.keys().cloned().collect()
    }

    pub fn set_ttl(&self, ttl: TimeDelta) {
        self.lock().ttl = ttl;
    }

    pub fn set_expiry_format(&self, format: ExpiryFormat) {
        self.lock().expiry_format = format;
    }

    pub fn remove_fingerprint(&self) {
        self.lock().fingerprint = None;
    }

    pub fn fail_grant(&self, fail: bool) {
        self.lock().fail_grant = fail;
    }

    pub fn fail_available(&self, fail: bool) {
        self.lock().fail_available = fail;
    }

    pub fn fail_checkout(&self, fail: bool) {
        self.lock().fail_checkout = fail;
    }

    pub fn fail_check_in(&self, fail: bool) {
        self.lock().fail_check_in = fail;
    }

    pub fn fail_extend(&self, fail: bool) {
        self.lock().fail_extend = fail;
    }

    /// Forget a token on the authority side (e.g. it expired remotely).
    pub fn revoke(&self, token: &str) {
        self.lock().checked_out.remove(token);
    }

    /// Record a checkout without touching the call counters.
    pub fn seed_checkout(&self, amount: u32) -> CheckoutInfo {
        let mut st = self.lock();
        let (token, expiry) = issue(&mut st, amount);
        CheckoutInfo {
            consumption_token: token,
            entitled_licenses: amount,
            expiry,
        }
    }
}

fn issue(st: &mut LicenseState, amount: u32) -> (String, DateTime<Utc>) {
    st.token_ctr += 1;
    let token = format!("tok-{}", st.token_ctr);
    st.checked_out.insert(token.clone(), amount);
    (token, Utc::now() + st.ttl)
}

fn render_expiry(format: ExpiryFormat, expiry: DateTime<Utc>) -> String {
    match format {
        ExpiryFormat::Rfc3339 => expiry.to_rfc3339(),
        ExpiryFormat::NoTimezone => expiry.format("%Y-%m-%dT%H:%M:%S").to_string(),
        ExpiryFormat::Garbage => "soon-ish".to_string(),
    }
}

#[async_trait]
impl LicenseService for FakeLicenseService {
    fn account_number(&self) -> &str {
        FAKE_ACCOUNT
    }

    async fn current_grant(&self) -> Result<License, CollaboratorError> {
        let mut st = self.lock();
        st.calls.grant += 1;
        if st.fail_grant {
            return Err(CollaboratorError::NotFound(
                "no license granted for product".to_string(),
            ));
        }
        Ok(License {
            license_id: FAKE_LICENSE_ID.to_string(),
            key_fingerprint: st.fingerprint.clone(),
            entitlements: vec![Entitlement {
                name: FAKE_DIMENSION.to_string(),
                max_count: st.max_entitlements,
            }],
        })
    }

    async fn available_entitlements(
        &self,
        license: &License,
        dimension: &str,
    ) -> Result<i64, CollaboratorError> {
        let mut st = self.lock();
        st.calls.available += 1;
        if st.fail_available {
            return Err(CollaboratorError::Transport("usage endpoint timed out".to_string()));
        }
        let max = license.max_count_for(dimension).ok_or_else(|| {
            CollaboratorError::Config(format!("entitlement {dimension} not found on license"))
        })?;
        let used: i64 = st.checked_out.values().map(|v| i64::from(*v)).sum();
        Ok(max - used)
    }

    async fn checkout(
        &self,
        license: &License,
        _dimension: &str,
        amount: u32,
    ) -> Result<CheckoutGrant, CollaboratorError> {
        let mut st = self.lock();
        st.calls.checkout += 1;
        if st.fail_checkout {
            return Err(CollaboratorError::Api {
                status: Some(500),
                message: "checkout unavailable".to_string(),
            });
        }
        if license.key_fingerprint.is_none() {
            return Err(CollaboratorError::Config(format!(
                "license {} must have a key fingerprint for checkout",
                license.license_id
            )));
        }
        let used: i64 = st.checked_out.values().map(|v| i64::from(*v)).sum();
        if used + i64::from(amount) > st.max_entitlements {
            return Err(CollaboratorError::Api {
                status: Some(409),
                message: "can't checkout license - over entitlements".to_string(),
            });
        }
        let (token, expiry) = issue(&mut st, amount);
        st.last_checkout_amount = Some(amount);
        Ok(CheckoutGrant {
            consumption_token: token,
            expiration: render_expiry(st.expiry_format, expiry),
        })
    }

    async fn check_in(&self, consumption_token: &str) -> Result<(), CollaboratorError> {
        let mut st = self.lock();
        st.calls.check_in += 1;
        if st.fail_check_in {
            return Err(CollaboratorError::Transport("connection reset".to_string()));
        }
        match st.checked_out.remove(consumption_token) {
            Some(_) => Ok(()),
            None => Err(CollaboratorError::NotFound("invalid token".to_string())),
        }
    }

    async fn extend(&self, consumption_token: &str) -> Result<CheckoutGrant, CollaboratorError> {
        let mut st = self.lock();
        st.calls.extend += 1;
        if st.fail_extend || !st.checked_out.contains_key(consumption_token) {
            return Err(CollaboratorError::NotFound("invalid token".to_string()));
        }
        let expiry = Utc::now() + st.ttl;
        Ok(CheckoutGrant {
            consumption_token: consumption_token.to_string(),
            expiration: render_expiry(st.expiry_format, expiry),
        })
    }
}

// ---------------------------------------------------------------------------
// Node count source
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct FixedNodeCount {
    total: AtomicU64,
    fail: AtomicBool,
}

impl FixedNodeCount {
    pub fn new(total: u64) -> Self {
        Self {
            total: AtomicU64::new(total),
            fail: AtomicBool::new(false),
        }
    }

    pub fn set(&self, total: u64) {
        self.total.store(total, Ordering::SeqCst);
    }

    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl NodeCountSource for FixedNodeCount {
    async fn current_node_count(&self) -> Result<NodeCounts, CollaboratorError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(CollaboratorError::Api {
                status: Some(401),
                message: "metrics endpoint refused credentials".to_string(),
            });
        }
        Ok(NodeCounts {
            total: self.total.load(Ordering::SeqCst),
        })
    }
}

// ---------------------------------------------------------------------------
// Checkout state store
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct StoreState {
    record: Option<CheckoutInfo>,
    writes: u32,
    fail_read: bool,
    fail_write: bool,
}

#[derive(Debug, Default)]
pub struct MemoryStateStore {
    state: Mutex<StoreState>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Current record, bypassing the trait.
    pub fn get(&self) -> Option<CheckoutInfo> {
        self.lock().record.clone()
    }

    pub fn put(&self, record: Option<CheckoutInfo>) {
        self.lock().record = record;
    }

    pub fn writes(&self) -> u32 {
        self.lock().writes
    }

    pub fn fail_read(&self, fail: bool) {
        self.lock().fail_read = fail;
    }

    pub fn fail_write(&self, fail: bool) {
        self.lock().fail_write = fail;
    }
}

#[async_trait]
impl CheckoutStateStore for MemoryStateStore {
    async fn read(&self) -> Result<Option<CheckoutInfo>, CollaboratorError> {
        let st = self.lock();
        if st.fail_read {
            return Err(CollaboratorError::Decode(
                "couldn't read license consumption info from record".to_string(),
            ));
        }
        Ok(st.record.clone())
    }

    async fn write(&self, info: &CheckoutInfo) -> Result<(), CollaboratorError> {
        let mut st = self.lock();
        if st.fail_write {
            return Err(CollaboratorError::Transport("store unavailable".to_string()));
        }
        st.record = Some(info.clone());
        st.writes += 1;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Compliance sink
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct SinkState {
    published: Vec<(ComplianceReport, String)>,
    fail: bool,
}

#[derive(Debug, Default)]
pub struct RecordingSink {
    state: Mutex<SinkState>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SinkState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn published(&self) -> Vec<(ComplianceReport, String)> {
        self.lock().published.clone()
    }

    pub fn last(&self) -> Option<(ComplianceReport, String)> {
        self.lock().published.last().cloned()
    }

    pub fn count(&self) -> usize {
        self.lock().published.len()
    }

    pub fn fail(&self, fail: bool) {
        self.lock().fail = fail;
    }
}

#[async_trait]
impl ComplianceSink for RecordingSink {
    async fn publish(
        &self,
        report: &ComplianceReport,
        notification: &str,
    ) -> Result<(), CollaboratorError> {
        let mut st = self.lock();
        if st.fail {
            return Err(CollaboratorError::Transport("output directory read-only".to_string()));
        }
        st.published.push((report.clone(), notification.to_string()));
        Ok(())
    }
}
