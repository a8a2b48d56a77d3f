//! Connection-pool metric stream codec and real-time aggregation engine
//!
//! This crate does two independent jobs:
//!
//! - **Stream translation**: convert between a compact internal sample
//!   representation (one sample carrying every field of a metric type) and
//!   the wire representation (one single-value sample per field, tagged by
//!   the field's value kind). See [`stream::StreamTranslator`].
//! - **Aggregation**: poll snapshots from a metric receiver on a fixed
//!   period and roll them up per (host, program) into live counts, running
//!   maxima, and a derived checkouts-per-second rate, with two-tier
//!   staleness handling. See [`aggregate::AggregationEngine`].
//!
//! Network transport, instrumentation, and presentation are external
//! collaborators reached through the [`receiver::MetricReceiver`] and
//! [`stream::SampleSink`] contracts.

pub mod aggregate;
pub mod config;
pub mod constants;
pub mod logging;
pub mod protocol;
pub mod receiver;
pub mod stream;

pub use aggregate::{AggregateSnapshot, AggregationEngine, AggregationHandle, ClusterStats, HostProg};
pub use config::{AggregationConfig, Config, load_config};
pub use protocol::{MetricType, Sample, SampleTemplate, SchemaError, SchemaSet, ValueKind};
pub use receiver::MetricReceiver;
pub use stream::{SampleGrouper, SampleSink, StreamTranslator};
