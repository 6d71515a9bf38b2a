//! Pure arithmetic and timing rules. No IO.

use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use tracing::warn;

/// Expiry used when the service hands back a timestamp we cannot read.
pub fn fallback_expiry() -> TimeDelta {
    TimeDelta::hours(1)
}

/// Same as RFC 3339 without the zone suffix; some checkout responses use it.
const RFC3339_NO_TZ: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// License units needed to cover `node_count` nodes: ceil(nodes / unit).
///
/// `nodes_per_license == 0` is rejected by config validation; it is treated
/// as one node per unit here rather than dividing by zero.
pub fn required_licenses(node_count: u64, nodes_per_license: u64) -> u32 {
    let unit = nodes_per_license.max(1);
    u32::try_from(node_count.div_ceil(unit)).unwrap_or(u32::MAX)
}

/// Units to request: never more than available, never more than required.
///
/// `available == None` means the availability query failed; the checkout
/// call stays authoritative, so we assume the full requirement is available.
pub fn checkout_amount(required: u32, available: Option<i64>) -> u32 {
    match available {
        None => required,
        Some(n) => {
            let clamped = u32::try_from(n.max(0)).unwrap_or(u32::MAX);
            required.min(clamped)
        }
    }
}

/// True when `expiry` falls within `window` of `now` (or has passed).
pub fn needs_extension(expiry: DateTime<Utc>, now: DateTime<Utc>, window: Duration) -> bool {
    let window = TimeDelta::from_std(window).unwrap_or(TimeDelta::MAX);
    expiry.signed_duration_since(now) <= window
}

/// Parse an expiry timestamp from the license service.
///
/// RFC 3339 first, then the zone-less layout (read as UTC). Anything else
/// falls back to `now + 1h` so the next pass re-evaluates soon; this never
/// fails the pass.
pub fn parse_expiration_timestamp(raw: &str, now: DateTime<Utc>) -> DateTime<Utc> {
    let raw = raw.trim();
    match DateTime::parse_from_rfc3339(raw) {
        Ok(dt) => return dt.with_timezone(&Utc),
        Err(err) => {
            warn!(
                expiration = raw,
                error = %err,
                "unable to parse timestamp with rfc3339 format, falling back to zone-less format"
            );
        }
    }
    match NaiveDateTime::parse_from_str(raw, RFC3339_NO_TZ) {
        Ok(naive) => naive.and_utc(),
        Err(err) => {
            warn!(
                expiration = raw,
                error = %err,
                "couldn't parse license expiration time, defaulting to 1 hour renewal"
            );
            now + fallback_expiry()
        }
    }
}
