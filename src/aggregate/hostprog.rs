//! Rolling statistics for one (host, program) pair

use crate::protocol::{MetricType, Sample, SchemaError};

/// Mutable aggregate tracked for one monitored program on one host
///
/// Created on first sight of a (host, program) pair, mutated only by the
/// engine's polling cycle, and dropped once it has been stale for long
/// enough. All `max_*` fields are monotonically non-decreasing for the
/// lifetime of the entity.
#[derive(Debug, Clone)]
pub struct HostProg {
    pub hostname: String,
    pub progname: String,

    /// Time of the last sample accepted into a rate window; `None` until
    /// the first totals sample establishes the bootstrap window
    pub last_time: Option<f64>,
    /// Cumulative checkout counter at the last accepted window boundary
    pub total_checkouts: Option<f64>,

    pub process_count: f64,
    pub connection_count: f64,
    pub checkout_count: f64,

    pub max_process_count: f64,
    pub max_connections: f64,
    pub max_checkedout: f64,

    /// Derived checkouts/second; `None` until the first qualifying window
    pub checkouts_per_second: Option<f64>,

    /// Last observed reporting interval; `None` until a totals sample has
    /// been seen
    pub interval: Option<f64>,
}

impl HostProg {
    #[must_use]
    pub fn new(hostname: impl Into<String>, progname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            progname: progname.into(),
            last_time: None,
            total_checkouts: None,
            process_count: 0.0,
            connection_count: 0.0,
            checkout_count: 0.0,
            max_process_count: 0.0,
            max_connections: 0.0,
            max_checkedout: 0.0,
            checkouts_per_second: None,
            interval: None,
        }
    }

    /// Seconds since the last accepted rate-window sample
    #[must_use]
    pub fn age(&self, now: f64) -> f64 {
        now - self.last_time.unwrap_or(0.0)
    }

    /// Zero the live counts and rate without discarding history
    ///
    /// Used when the program has gone quiet but is not yet stale enough to
    /// evict, so a display shows it at zero instead of vanishing it.
    /// Maxima, the counter baseline and the window clock are untouched.
    pub fn kill_processes(&mut self) {
        self.process_count = 0.0;
        self.connection_count = 0.0;
        self.checkout_count = 0.0;
        self.checkouts_per_second = Some(0.0);
    }

    /// Apply a process-family sample
    pub fn update_process_stats(
        &mut self,
        sample: &Sample,
        schema: &MetricType,
    ) -> Result<(), SchemaError> {
        self.process_count = schema.value_of(sample, "numprocs")?;
        self.max_process_count = self.max_process_count.max(self.process_count);
        Ok(())
    }

    /// Apply a pool-family sample
    pub fn update_pool_stats(
        &mut self,
        sample: &Sample,
        schema: &MetricType,
    ) -> Result<(), SchemaError> {
        self.checkout_count = schema.value_of(sample, "checkedout")?;
        self.max_checkedout = self.max_checkedout.max(self.checkout_count);

        self.connection_count = schema.value_of(sample, "connections")?;
        self.max_connections = self.max_connections.max(self.connection_count);
        Ok(())
    }

    /// Apply a totals-family sample: the rate-computation path
    ///
    /// The first sample only establishes the window baseline. After that a
    /// new rate is computed only when the elapsed window exceeds the
    /// reporting interval and the cumulative counter strictly increased;
    /// a non-increasing counter carries no new information and leaves the
    /// previous rate in place.
    pub fn update_total_stats(
        &mut self,
        sample: &Sample,
        schema: &MetricType,
    ) -> Result<(), SchemaError> {
        let total_checkouts = schema.value_of(sample, "checkouts")?;
        self.interval = Some(sample.interval);

        match self.last_time {
            None => {
                self.last_time = Some(sample.time);
                self.total_checkouts = Some(total_checkouts);
            }
            Some(last_time) => {
                let time_delta = sample.time - last_time;
                let previous = self.total_checkouts.unwrap_or(total_checkouts);
                if time_delta > sample.interval && total_checkouts > previous {
                    self.checkouts_per_second = Some((total_checkouts - previous) / time_delta);
                    self.last_time = Some(sample.time);
                    self.total_checkouts = Some(total_checkouts);
                }
            }
        }
        Ok(())
    }
}
