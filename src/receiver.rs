//! Contract to the external component that buffers incoming samples

use crate::protocol::Sample;
use anyhow::Result;

/// Source of per-program sample snapshots
///
/// Implemented by the transport layer that actually receives samples off
/// the network. Calls are synchronous and expected to be bounded; a failure
/// aborts the current polling cycle and is retried on the next one.
pub trait MetricReceiver: Send + Sync {
    /// Snapshot all samples for one metric family as of the given time
    ///
    /// Each returned sample carries the host, the program name in
    /// `plugin_instance`, the observation time and interval, and values
    /// positioned per that family's metric type.
    fn get_stats_by_progname(&self, family: &str, as_of: f64) -> Result<Vec<Sample>>;
}
