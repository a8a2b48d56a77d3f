//! Built-in schemas for the three monitored metric families

use super::{MetricType, ValueKind};
use crate::constants::family;

/// The three metric-family schemas bound to one namespace
///
/// Family names on the wire are `<namespace>_totals`, `<namespace>_pool`
/// and `<namespace>_process`. Built once at engine construction; the field
/// layouts are fixed by the monitored source.
#[derive(Debug, Clone)]
pub struct SchemaSet {
    /// Cumulative counters for pool activity
    pub totals: MetricType,
    /// Instantaneous pool occupancy
    pub pool: MetricType,
    /// Instantaneous process counts
    pub process: MetricType,
}

impl SchemaSet {
    /// Build the family schemas for a namespace
    #[must_use]
    pub fn for_namespace(namespace: &str) -> Self {
        Self {
            totals: MetricType::new(
                format!("{namespace}_{}", family::TOTALS_SUFFIX),
                [
                    ("checkouts", ValueKind::Derive),
                    ("invalidated", ValueKind::Derive),
                    ("connects", ValueKind::Derive),
                    ("disconnects", ValueKind::Derive),
                ],
            ),
            pool: MetricType::new(
                format!("{namespace}_{}", family::POOL_SUFFIX),
                [
                    ("numpools", ValueKind::Gauge),
                    ("checkedout", ValueKind::Gauge),
                    ("checkedin", ValueKind::Gauge),
                    ("detached", ValueKind::Gauge),
                    ("connections", ValueKind::Gauge),
                ],
            ),
            process: MetricType::new(
                format!("{namespace}_{}", family::PROCESS_SUFFIX),
                [("numprocs", ValueKind::Gauge)],
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_names() {
        let schemas = SchemaSet::for_namespace("dbpool");
        assert_eq!(schemas.totals.name(), "dbpool_totals");
        assert_eq!(schemas.pool.name(), "dbpool_pool");
        assert_eq!(schemas.process.name(), "dbpool_process");
    }

    #[test]
    fn test_aggregated_fields_present() {
        let schemas = SchemaSet::for_namespace("dbpool");
        assert!(schemas.totals.field_index("checkouts").is_ok());
        assert!(schemas.pool.field_index("checkedout").is_ok());
        assert!(schemas.pool.field_index("connections").is_ok());
        assert!(schemas.process.field_index("numprocs").is_ok());
    }

    #[test]
    fn test_totals_fields_are_counters() {
        let schemas = SchemaSet::for_namespace("dbpool");
        for (name, kind) in schemas.totals.fields() {
            assert_eq!(*kind, ValueKind::Derive, "field {name}");
        }
    }
}
