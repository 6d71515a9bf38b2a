//! csp-reconcile
//!
//! License entitlement reconciler.
//!
//! Each pass:
//! - fetches the license grant and the managed node count,
//! - computes required units as ceil(nodes / nodes_per_license),
//! - replaces the held checkout when held != required (check-in, then
//!   checkout of min(required, available)),
//! - otherwise extends the held token when it is close to expiry,
//! - persists the held checkout and publishes a compliance report.
//!
//! Collaborators sit behind the traits in [`ports`]; this crate performs no
//! IO of its own.

mod engine;
mod error;
pub mod policy;
pub mod ports;
pub mod report;
pub mod runner;
mod types;

pub use engine::Reconciler;
pub use error::{CollaboratorError, ReconcileError};
pub use ports::{CheckoutGrant, CheckoutStateStore, ComplianceSink, LicenseService, NodeCountSource};
pub use runner::{run_loop, run_once, PassResult};
pub use types::*;
