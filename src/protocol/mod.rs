//! Sample and metric-type definitions
//!
//! A [`MetricType`] is the static schema for a named composite metric: an
//! ordered list of (field name, [`ValueKind`]) pairs. A [`Sample`] is one
//! timestamped observation against such a schema, either "internal"
//! (all fields in one value array) or "external" (exactly one value,
//! tagged with the field name and kind).

mod schemas;

pub use schemas::SchemaSet;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Errors raised when a sample does not match its declared schema
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum SchemaError {
    /// A field name was requested that the metric type does not declare
    #[error("metric type '{type_name}' has no field '{field}'")]
    UnknownField { type_name: String, field: String },

    /// A sample's value array does not have the declared number of values
    #[error("sample for '{type_name}' carries {actual} values, expected {expected}")]
    ValueCountMismatch {
        type_name: String,
        expected: usize,
        actual: usize,
    },

    /// An external sample arrived without the type_instance field tag
    #[error("external sample for '{type_name}' is missing its field tag")]
    MissingFieldTag { type_name: String },
}

/// Value kind of a single metric field
///
/// The wire protocol encodes the kind as the scalar type tag of each
/// external sample, so consumers know whether to read the value as an
/// instantaneous quantity or as a cumulative counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    /// Instantaneous, non-cumulative quantity
    Gauge,
    /// Monotonically increasing cumulative counter; rates are derived
    /// from successive deltas
    Derive,
}

impl ValueKind {
    /// Scalar type tag used on the wire for this kind
    #[must_use]
    #[inline]
    pub const fn wire_tag(&self) -> &'static str {
        match self {
            Self::Gauge => "count",
            Self::Derive => "derive",
        }
    }
}

/// Immutable schema describing a named composite metric
///
/// Field order is significant and fixed for the lifetime of the type; it
/// defines the positional mapping to value arrays in both the internal and
/// external representations. The name-to-index map is built eagerly at
/// construction so field lookups are O(1) and fail with a typed error.
#[derive(Debug, Clone)]
pub struct MetricType {
    name: String,
    fields: Vec<(String, ValueKind)>,
    index: HashMap<String, usize>,
}

impl MetricType {
    /// Create a metric type from an ordered field list
    pub fn new<N, F, S>(name: N, fields: F) -> Self
    where
        N: Into<String>,
        F: IntoIterator<Item = (S, ValueKind)>,
        S: Into<String>,
    {
        let fields: Vec<(String, ValueKind)> = fields
            .into_iter()
            .map(|(name, kind)| (name.into(), kind))
            .collect();
        let index = fields
            .iter()
            .enumerate()
            .map(|(i, (name, _))| (name.clone(), i))
            .collect();
        Self {
            name: name.into(),
            fields,
            index,
        }
    }

    /// Name of the metric type (doubles as the family name on the wire)
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared fields in declaration order
    #[must_use]
    pub fn fields(&self) -> &[(String, ValueKind)] {
        &self.fields
    }

    /// Number of declared fields
    #[must_use]
    #[inline]
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Positional index of a field by name
    pub fn field_index(&self, field: &str) -> Result<usize, SchemaError> {
        self.index
            .get(field)
            .copied()
            .ok_or_else(|| SchemaError::UnknownField {
                type_name: self.name.clone(),
                field: field.to_string(),
            })
    }

    /// Check that a composite sample carries one value per declared field
    pub fn check_values(&self, sample: &Sample) -> Result<(), SchemaError> {
        if sample.values.len() != self.fields.len() {
            return Err(SchemaError::ValueCountMismatch {
                type_name: self.name.clone(),
                expected: self.fields.len(),
                actual: sample.values.len(),
            });
        }
        Ok(())
    }

    /// Extract a named field's value from a composite sample
    pub fn value_of(&self, sample: &Sample, field: &str) -> Result<f64, SchemaError> {
        self.check_values(sample)?;
        let idx = self.field_index(field)?;
        Ok(sample.values[idx])
    }
}

/// A single timestamped observation
///
/// `values` has length 1 for an external single-field sample and length
/// equal to the declared field count for an internal composite sample.
/// Samples are immutable once constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub host: String,
    pub plugin: String,
    pub plugin_instance: String,
    pub type_name: String,
    pub type_instance: Option<String>,
    /// Observation time in seconds
    pub time: f64,
    /// Reporting period in seconds
    pub interval: f64,
    pub values: Vec<f64>,
}

/// Factory that stamps out samples sharing one identity
///
/// `build` fills in everything except time and values, which vary per
/// observation.
#[derive(Debug, Clone)]
pub struct SampleTemplate {
    pub host: String,
    pub plugin: String,
    pub plugin_instance: String,
    pub type_name: String,
    pub type_instance: Option<String>,
    pub interval: f64,
}

impl SampleTemplate {
    /// Build a sample at the given time with the given values
    #[must_use]
    pub fn build(&self, time: f64, values: Vec<f64>) -> Sample {
        Sample {
            host: self.host.clone(),
            plugin: self.plugin.clone(),
            plugin_instance: self.plugin_instance.clone(),
            type_name: self.type_name.clone(),
            type_instance: self.type_instance.clone(),
            time,
            interval: self.interval,
            values,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn my_type() -> MetricType {
        MetricType::new(
            "my_type",
            [
                ("some_val", ValueKind::Gauge),
                ("some_other_val", ValueKind::Derive),
            ],
        )
    }

    #[test]
    fn test_wire_tags() {
        assert_eq!(ValueKind::Gauge.wire_tag(), "count");
        assert_eq!(ValueKind::Derive.wire_tag(), "derive");
    }

    #[test]
    fn test_field_index_order() {
        let t = my_type();
        assert_eq!(t.field_index("some_val").unwrap(), 0);
        assert_eq!(t.field_index("some_other_val").unwrap(), 1);
    }

    #[test]
    fn test_field_index_unknown() {
        let t = my_type();
        let err = t.field_index("nope").unwrap_err();
        assert_eq!(
            err,
            SchemaError::UnknownField {
                type_name: "my_type".to_string(),
                field: "nope".to_string(),
            }
        );
    }

    #[test]
    fn test_value_of() {
        let t = my_type();
        let sample = SampleTemplate {
            host: "somehost".to_string(),
            plugin: "someplugin".to_string(),
            plugin_instance: "someprog".to_string(),
            type_name: "my_type".to_string(),
            type_instance: None,
            interval: 10.0,
        }
        .build(50.0, vec![5.0, 10.0]);

        assert_eq!(t.value_of(&sample, "some_val").unwrap(), 5.0);
        assert_eq!(t.value_of(&sample, "some_other_val").unwrap(), 10.0);
    }

    #[test]
    fn test_value_of_short_value_array() {
        let t = my_type();
        let sample = SampleTemplate {
            host: "somehost".to_string(),
            plugin: "someplugin".to_string(),
            plugin_instance: "someprog".to_string(),
            type_name: "my_type".to_string(),
            type_instance: None,
            interval: 10.0,
        }
        .build(50.0, vec![5.0]);

        let err = t.value_of(&sample, "some_val").unwrap_err();
        assert_eq!(
            err,
            SchemaError::ValueCountMismatch {
                type_name: "my_type".to_string(),
                expected: 2,
                actual: 1,
            }
        );
    }

    #[test]
    fn test_template_build() {
        let template = SampleTemplate {
            host: "h".to_string(),
            plugin: "p".to_string(),
            plugin_instance: "pi".to_string(),
            type_name: "my_type".to_string(),
            type_instance: Some("ti".to_string()),
            interval: 15.0,
        };
        let sample = template.build(100.0, vec![1.0, 2.0]);
        assert_eq!(sample.host, "h");
        assert_eq!(sample.type_instance.as_deref(), Some("ti"));
        assert_eq!(sample.time, 100.0);
        assert_eq!(sample.interval, 15.0);
        assert_eq!(sample.values, vec![1.0, 2.0]);
    }
}
