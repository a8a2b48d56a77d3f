//! Polling cycle, staleness handling and cluster rollup

use super::HostProg;
use crate::config::AggregationConfig;
use crate::constants::{
    RESERVED_HOST_PROGNAME, STALE_EVICTION_MULTIPLIER, STALE_ZERO_MULTIPLIER,
};
use crate::protocol::{MetricType, Sample, SchemaError, SchemaSet};
use crate::receiver::MetricReceiver;
use anyhow::{Context, Result};
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Cluster-wide sums and running maxima across all live entities
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClusterStats {
    /// Number of distinct hostnames among live entities
    pub host_count: usize,
    pub max_host_count: usize,
    pub process_count: f64,
    pub max_process_count: f64,
    pub connection_count: f64,
    pub max_connections: f64,
    pub checkout_count: f64,
    pub max_checkedout: f64,
    /// Sum of per-entity rates, counting only entities that have
    /// established a rate; `None` before the first completed cycle
    pub checkouts_per_second: Option<f64>,
}

/// Immutable view published at the end of every polling cycle
#[derive(Debug, Clone, Default)]
pub struct AggregateSnapshot {
    pub cluster: ClusterStats,
    pub hostprogs: Vec<HostProg>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct HostProgKey {
    hostname: String,
    progname: String,
}

#[derive(Debug, Clone, Copy)]
enum FamilyKind {
    Totals,
    Pool,
    Process,
}

/// Routes incoming snapshots to per-(host, program) aggregates
///
/// The live entity map is owned by the engine and mutated only by the
/// polling worker; readers consume the immutable snapshot published via a
/// watch channel at the end of each cycle.
pub struct AggregationEngine {
    receiver: Arc<dyn MetricReceiver>,
    schemas: SchemaSet,
    hostprogs: DashMap<HostProgKey, HostProg>,
    snapshot_tx: watch::Sender<AggregateSnapshot>,
    poll_interval: Duration,
}

impl AggregationEngine {
    pub fn new(receiver: Arc<dyn MetricReceiver>, config: &AggregationConfig) -> Self {
        let (snapshot_tx, _) = watch::channel(AggregateSnapshot::default());
        Self {
            receiver,
            schemas: SchemaSet::for_namespace(&config.namespace),
            hostprogs: DashMap::new(),
            snapshot_tx,
            poll_interval: config.poll_interval(),
        }
    }

    /// Latest published snapshot
    #[must_use]
    pub fn snapshot(&self) -> AggregateSnapshot {
        self.snapshot_tx.borrow().clone()
    }

    /// Subscribe to snapshots as they are published
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AggregateSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Spawn the background polling worker
    ///
    /// Cycles run serially on the configured period; the returned handle
    /// stops the loop deterministically at the next cycle boundary.
    pub fn spawn(self: Arc<Self>) -> AggregationHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let engine = Arc::clone(&self);

        let join = tokio::spawn(async move {
            let mut ticker = time::interval(engine.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(period = ?engine.poll_interval, "aggregation worker started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = engine.run_cycle(unix_now()) {
                            warn!("polling cycle failed, retrying next cycle: {e:#}");
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!("aggregation worker stopping");
                        break;
                    }
                }
            }
        });

        AggregationHandle {
            join,
            shutdown: shutdown_tx,
        }
    }

    /// Run one polling cycle as of `now`
    ///
    /// Pulls the three metric families from the receiver, routes every
    /// snapshot to its entity, applies the two-tier staleness policy to
    /// entities not seen this cycle, and publishes the recomputed rollup.
    /// A receiver failure aborts the cycle; per-sample schema mismatches
    /// are logged and skipped.
    pub fn run_cycle(&self, now: f64) -> Result<()> {
        let mut seen: HashSet<HostProgKey> = HashSet::new();

        for (schema, kind) in [
            (&self.schemas.totals, FamilyKind::Totals),
            (&self.schemas.pool, FamilyKind::Pool),
            (&self.schemas.process, FamilyKind::Process),
        ] {
            self.apply_family(schema, kind, now, &mut seen)?;
        }

        self.expire_stale(now, &seen);
        self.publish_rollup();
        Ok(())
    }

    fn apply_family(
        &self,
        schema: &MetricType,
        kind: FamilyKind,
        now: f64,
        seen: &mut HashSet<HostProgKey>,
    ) -> Result<()> {
        let samples = self
            .receiver
            .get_stats_by_progname(schema.name(), now)
            .with_context(|| format!("receiver failed for family '{}'", schema.name()))?;

        for sample in &samples {
            // Host-level data is out of scope for per-program aggregation
            if sample.plugin_instance == RESERVED_HOST_PROGNAME {
                continue;
            }

            let key = HostProgKey {
                hostname: sample.host.clone(),
                progname: sample.plugin_instance.clone(),
            };
            seen.insert(key.clone());

            let mut hostprog = self
                .hostprogs
                .entry(key)
                .or_insert_with(|| {
                    HostProg::new(sample.host.as_str(), sample.plugin_instance.as_str())
                });

            if let Err(e) = Self::dispatch(&mut hostprog, sample, schema, kind) {
                warn!(
                    host = %sample.host,
                    prog = %sample.plugin_instance,
                    family = schema.name(),
                    "skipping sample: {e}"
                );
            }
        }
        Ok(())
    }

    fn dispatch(
        hostprog: &mut HostProg,
        sample: &Sample,
        schema: &MetricType,
        kind: FamilyKind,
    ) -> Result<(), SchemaError> {
        match kind {
            FamilyKind::Totals => hostprog.update_total_stats(sample, schema),
            FamilyKind::Pool => hostprog.update_pool_stats(sample, schema),
            FamilyKind::Process => hostprog.update_process_stats(sample, schema),
        }
    }

    /// Apply the two-tier staleness policy to entities not seen this cycle
    ///
    /// One missed interval zeroes the live counts; five missed intervals
    /// evict the entity. Entities that never reported an interval are left
    /// alone, there is nothing to compare their age against.
    fn expire_stale(&self, now: f64, seen: &HashSet<HostProgKey>) {
        let mut evict: Vec<HostProgKey> = Vec::new();

        for mut entry in self.hostprogs.iter_mut() {
            if seen.contains(entry.key()) {
                continue;
            }
            let Some(interval) = entry.interval else {
                continue;
            };
            let age = entry.age(now);

            if age > interval * STALE_EVICTION_MULTIPLIER {
                evict.push(entry.key().clone());
            } else if age > interval * STALE_ZERO_MULTIPLIER {
                entry.kill_processes();
            }
        }

        for key in evict {
            debug!(host = %key.hostname, prog = %key.progname, "evicting stale entity");
            self.hostprogs.remove(&key);
        }
    }

    /// Recompute the cluster rollup from the live entity set and publish it
    fn publish_rollup(&self) {
        let hostprogs: Vec<HostProg> = self
            .hostprogs
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        let host_count = hostprogs
            .iter()
            .map(|hp| hp.hostname.as_str())
            .collect::<HashSet<_>>()
            .len();
        let process_count: f64 = hostprogs.iter().map(|hp| hp.process_count).sum();
        let connection_count: f64 = hostprogs.iter().map(|hp| hp.connection_count).sum();
        let checkout_count: f64 = hostprogs.iter().map(|hp| hp.checkout_count).sum();
        // Entities with no established rate are excluded, not counted as zero
        let checkouts_per_second: f64 = hostprogs
            .iter()
            .filter_map(|hp| hp.checkouts_per_second)
            .sum();

        let prev = self.snapshot_tx.borrow().cluster.clone();
        let cluster = ClusterStats {
            host_count,
            max_host_count: prev.max_host_count.max(host_count),
            process_count,
            max_process_count: prev.max_process_count.max(process_count),
            connection_count,
            max_connections: prev.max_connections.max(connection_count),
            checkout_count,
            max_checkedout: prev.max_checkedout.max(checkout_count),
            checkouts_per_second: Some(checkouts_per_second),
        };

        self.snapshot_tx.send_replace(AggregateSnapshot {
            cluster,
            hostprogs,
        });
    }
}

/// Handle to a spawned polling worker
pub struct AggregationHandle {
    join: JoinHandle<()>,
    shutdown: mpsc::Sender<()>,
}

impl AggregationHandle {
    /// Signal the worker to stop and wait for it to finish
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(()).await;
        let _ = self.join.await;
    }
}

/// Wall-clock seconds since the Unix epoch
fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
