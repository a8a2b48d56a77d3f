//! Codec between composite samples and single-value wire samples
//!
//! A composite sample carries one value per field of its metric type. On
//! the wire each field travels as its own sample, with the field's value
//! kind as the scalar type tag and the field name as the type instance.
//! [`StreamTranslator`] converts in both directions.

use crate::protocol::{MetricType, Sample, SchemaError};
use std::collections::HashMap;
use tracing::debug;

/// Destination for fully assembled composite samples
///
/// Called once per composite; implementations must not fail for
/// well-formed input.
pub trait SampleSink {
    fn put_values(&mut self, sample: Sample);
}

impl SampleSink for Vec<Sample> {
    fn put_values(&mut self, sample: Sample) {
        self.push(sample);
    }
}

/// Codec bound to one metric type
#[derive(Debug, Clone)]
pub struct StreamTranslator {
    metric_type: MetricType,
}

impl StreamTranslator {
    #[must_use]
    pub fn new(metric_type: MetricType) -> Self {
        Self { metric_type }
    }

    /// The schema this translator is bound to
    #[must_use]
    pub fn metric_type(&self) -> &MetricType {
        &self.metric_type
    }

    /// Split a composite sample into one external sample per field
    ///
    /// Output order equals field declaration order. Each external sample
    /// copies the host, plugin, plugin instance, time and interval; its
    /// type is the wire tag of the field's kind and its type instance is
    /// the field name. The iterator has no cross-sample state and can be
    /// recreated from the same input at will.
    ///
    /// Fails if the sample's value count does not match the schema.
    pub fn break_into_individual_values<'a>(
        &'a self,
        sample: &'a Sample,
    ) -> Result<impl Iterator<Item = Sample> + 'a, SchemaError> {
        self.metric_type.check_values(sample)?;

        Ok(self
            .metric_type
            .fields()
            .iter()
            .zip(sample.values.iter())
            .map(move |((field_name, kind), value)| Sample {
                host: sample.host.clone(),
                plugin: sample.plugin.clone(),
                plugin_instance: sample.plugin_instance.clone(),
                type_name: kind.wire_tag().to_string(),
                type_instance: Some(field_name.clone()),
                time: sample.time,
                interval: sample.interval,
                values: vec![*value],
            }))
    }

    /// Create a grouper that reassembles external samples into composites
    ///
    /// The grouper keys incoming samples by (host, plugin, plugin instance,
    /// time) and emits one composite to `sink` the moment a value has been
    /// seen for every declared field of that key. The identifying type
    /// instance is assembly metadata only and is not carried into the
    /// composite.
    pub fn combine_into_grouped_values<S: SampleSink>(&self, sink: S) -> SampleGrouper<S> {
        SampleGrouper {
            metric_type: self.metric_type.clone(),
            sink,
            pending: HashMap::new(),
        }
    }
}

/// Key identifying one in-flight composite
///
/// Timestamps are keyed by their bit pattern; samples for the same
/// composite carry the identical timestamp, so bit equality is the right
/// notion here.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct GroupKey {
    host: String,
    plugin: String,
    plugin_instance: String,
    time_bits: u64,
}

#[derive(Debug)]
struct PendingGroup {
    time: f64,
    interval: f64,
    slots: Vec<Option<f64>>,
    filled: usize,
}

/// Reassembles single-value external samples into composite samples
///
/// Groups for which not every declared field arrives are retained
/// indefinitely; no expiry deadline is defined for them.
#[derive(Debug)]
pub struct SampleGrouper<S> {
    metric_type: MetricType,
    sink: S,
    pending: HashMap<GroupKey, PendingGroup>,
}

impl<S: SampleSink> SampleGrouper<S> {
    /// Feed one external sample into the grouper
    ///
    /// Emits a composite to the sink if this sample completes its group.
    /// Fails if the sample names an undeclared field, carries no field
    /// tag, or does not carry exactly one value.
    pub fn put_values(&mut self, sample: &Sample) -> Result<(), SchemaError> {
        let field = sample
            .type_instance
            .as_deref()
            .ok_or_else(|| SchemaError::MissingFieldTag {
                type_name: self.metric_type.name().to_string(),
            })?;
        let idx = self.metric_type.field_index(field)?;
        if sample.values.len() != 1 {
            return Err(SchemaError::ValueCountMismatch {
                type_name: self.metric_type.name().to_string(),
                expected: 1,
                actual: sample.values.len(),
            });
        }

        let key = GroupKey {
            host: sample.host.clone(),
            plugin: sample.plugin.clone(),
            plugin_instance: sample.plugin_instance.clone(),
            time_bits: sample.time.to_bits(),
        };

        let field_count = self.metric_type.field_count();
        let group = self.pending.entry(key.clone()).or_insert_with(|| {
            debug!(
                type_name = self.metric_type.name(),
                time = sample.time,
                "opening sample group"
            );
            PendingGroup {
                time: sample.time,
                interval: sample.interval,
                slots: vec![None; field_count],
                filled: 0,
            }
        });

        if group.slots[idx].is_none() {
            group.filled += 1;
        }
        group.slots[idx] = Some(sample.values[0]);

        if group.filled == field_count {
            if let Some(group) = self.pending.remove(&key) {
                self.sink.put_values(Sample {
                    host: key.host,
                    plugin: key.plugin,
                    plugin_instance: key.plugin_instance,
                    type_name: self.metric_type.name().to_string(),
                    type_instance: None,
                    time: group.time,
                    interval: group.interval,
                    values: group.slots.into_iter().flatten().collect(),
                });
            }
        }
        Ok(())
    }

    /// Number of groups still waiting for fields
    #[must_use]
    pub fn pending_groups(&self) -> usize {
        self.pending.len()
    }

    /// Consume the grouper and hand back its sink
    pub fn into_sink(self) -> S {
        self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{MetricType, SampleTemplate, ValueKind};

    fn template(type_name: &str) -> SampleTemplate {
        SampleTemplate {
            host: "somehost".to_string(),
            plugin: "someplugin".to_string(),
            plugin_instance: "someprog".to_string(),
            type_name: type_name.to_string(),
            type_instance: Some("sometypeinstance".to_string()),
            interval: 10.0,
        }
    }

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
    fn test_split_field_order() {
        let translator = StreamTranslator::new(my_type());
        let composite = template("my_type").build(50.0, vec![5.0, 10.0]);

        let parts: Vec<Sample> = translator
            .break_into_individual_values(&composite)
            .unwrap()
            .collect();

        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].type_name, "count");
        assert_eq!(parts[0].type_instance.as_deref(), Some("some_val"));
        assert_eq!(parts[0].values, vec![5.0]);
        assert_eq!(parts[1].type_name, "derive");
        assert_eq!(parts[1].type_instance.as_deref(), Some("some_other_val"));
        assert_eq!(parts[1].values, vec![10.0]);
        // Identity and timing are copied unchanged
        assert_eq!(parts[0].host, "somehost");
        assert_eq!(parts[0].time, 50.0);
        assert_eq!(parts[0].interval, 10.0);
    }

    #[test]
    fn test_split_rejects_short_values() {
        let translator = StreamTranslator::new(my_type());
        let composite = template("my_type").build(50.0, vec![5.0]);
        assert!(translator.break_into_individual_values(&composite).is_err());
    }

    #[test]
    fn test_split_is_restartable() {
        let translator = StreamTranslator::new(my_type());
        let composite = template("my_type").build(50.0, vec![5.0, 10.0]);

        let first: Vec<Sample> = translator
            .break_into_individual_values(&composite)
            .unwrap()
            .collect();
        let second: Vec<Sample> = translator
            .break_into_individual_values(&composite)
            .unwrap()
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_combine_emits_on_completion_only() {
        let translator = StreamTranslator::new(my_type());
        let mut grouper = translator.combine_into_grouped_values(Vec::new());

        let composite = template("my_type").build(50.0, vec![5.0, 10.0]);
        let parts: Vec<Sample> = translator
            .break_into_individual_values(&composite)
            .unwrap()
            .collect();

        grouper.put_values(&parts[0]).unwrap();
        assert_eq!(grouper.pending_groups(), 1);
        assert!(grouper.into_sink().is_empty());
    }

    #[test]
    fn test_combine_out_of_order_fields() {
        let translator = StreamTranslator::new(my_type());
        let mut grouper = translator.combine_into_grouped_values(Vec::new());

        let composite = template("my_type").build(50.0, vec![5.0, 10.0]);
        let parts: Vec<Sample> = translator
            .break_into_individual_values(&composite)
            .unwrap()
            .collect();

        // Arrival order reversed; emitted values still follow declaration order
        grouper.put_values(&parts[1]).unwrap();
        grouper.put_values(&parts[0]).unwrap();

        let emitted = grouper.into_sink();
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].values, vec![5.0, 10.0]);
        assert_eq!(emitted[0].type_instance, None);
    }

    #[test]
    fn test_combine_rejects_unknown_field() {
        let translator = StreamTranslator::new(my_type());
        let mut grouper = translator.combine_into_grouped_values(Vec::new());

        let bogus = Sample {
            type_name: "count".to_string(),
            type_instance: Some("no_such_field".to_string()),
            ..template("my_type").build(50.0, vec![5.0])
        };
        assert!(grouper.put_values(&bogus).is_err());
        assert_eq!(grouper.pending_groups(), 0);
    }

    #[test]
    fn test_combine_rejects_missing_field_tag() {
        let translator = StreamTranslator::new(my_type());
        let mut grouper = translator.combine_into_grouped_values(Vec::new());

        let untagged = Sample {
            type_instance: None,
            ..template("my_type").build(50.0, vec![5.0])
        };
        assert_eq!(
            grouper.put_values(&untagged).unwrap_err(),
            SchemaError::MissingFieldTag {
                type_name: "my_type".to_string(),
            }
        );
    }

    #[test]
    fn test_combine_separate_hosts_do_not_mix() {
        let translator = StreamTranslator::new(my_type());
        let mut grouper = translator.combine_into_grouped_values(Vec::new());

        let a = template("my_type").build(50.0, vec![1.0, 2.0]);
        let b = Sample {
            host: "otherhost".to_string(),
            ..template("my_type").build(50.0, vec![3.0, 4.0])
        };

        let a_parts: Vec<Sample> = translator
            .break_into_individual_values(&a)
            .unwrap()
            .collect();
        let b_parts: Vec<Sample> = translator
            .break_into_individual_values(&b)
            .unwrap()
            .collect();

        grouper.put_values(&a_parts[0]).unwrap();
        grouper.put_values(&b_parts[0]).unwrap();
        assert_eq!(grouper.pending_groups(), 2);

        grouper.put_values(&b_parts[1]).unwrap();
        grouper.put_values(&a_parts[1]).unwrap();

        let emitted = grouper.into_sink();
        assert_eq!(emitted.len(), 2);
        assert_eq!(emitted[0].host, "otherhost");
        assert_eq!(emitted[0].values, vec![3.0, 4.0]);
        assert_eq!(emitted[1].host, "somehost");
        assert_eq!(emitted[1].values, vec![1.0, 2.0]);
    }

    #[test]
    fn test_custom_sink() {
        struct Counting(usize);

        impl SampleSink for Counting {
            fn put_values(&mut self, _sample: Sample) {
                self.0 += 1;
            }
        }

        let translator = StreamTranslator::new(my_type());
        let mut grouper = translator.combine_into_grouped_values(Counting(0));

        let composite = template("my_type").build(50.0, vec![5.0, 10.0]);
        let parts: Vec<Sample> = translator
            .break_into_individual_values(&composite)
            .unwrap()
            .collect();
        for part in &parts {
            grouper.put_values(part).unwrap();
        }

        assert_eq!(grouper.into_sink().0, 1);
    }
}
