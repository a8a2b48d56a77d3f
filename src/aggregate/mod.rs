//! Per-(host, program) aggregation of incoming samples
//!
//! [`HostProg`] holds the rolling statistics for one monitored program on
//! one host. [`AggregationEngine`] owns the live entity set, drives the
//! polling cycle against the metric receiver, and publishes an immutable
//! [`AggregateSnapshot`] at the end of every cycle.

mod engine;
mod hostprog;

pub use engine::{AggregateSnapshot, AggregationEngine, AggregationHandle, ClusterStats};
pub use hostprog::HostProg;
