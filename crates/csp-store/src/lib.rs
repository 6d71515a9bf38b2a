//! csp-store
//!
//! Durable homes for the held checkout ([`csp_reconcile::CheckoutStateStore`]):
//! a JSON file for single-host installs and a Postgres table for shared
//! deployments. Both persist the same three-field record.

mod file;
mod pg;
mod record;

pub use file::{io_err, write_atomic, FileStateStore};
pub use pg::{connect, migrate, PgStateStore, ENV_DB_URL};
pub use record::StateRecord;
