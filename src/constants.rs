//! Crate-wide constants

/// Program name reserved for host-level (not per-program) data.
///
/// Samples tagged with this program name are filtered out of the
/// per-program aggregation entirely.
pub const RESERVED_HOST_PROGNAME: &str = "host";

/// An entity unseen for more than one reporting interval has its live
/// counts zeroed but stays in the entity set.
pub const STALE_ZERO_MULTIPLIER: f64 = 1.0;

/// An entity unseen for more than five reporting intervals is removed
/// from the entity set entirely.
pub const STALE_EVICTION_MULTIPLIER: f64 = 5.0;

/// Suffixes appended to the configured namespace to form the three
/// metric family names pulled from the receiver each cycle.
pub mod family {
    pub const TOTALS_SUFFIX: &str = "totals";
    pub const POOL_SUFFIX: &str = "pool";
    pub const PROCESS_SUFFIX: &str = "process";
}
