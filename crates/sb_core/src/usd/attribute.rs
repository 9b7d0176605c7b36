//! Attribute and relationship specs, and time-sample resolution.

use super::path::Target;
use super::value::{TypeName, Value};

/// An authored attribute: default value, time samples and connections.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub type_name: TypeName,
    pub custom: bool,
    pub uniform: bool,
    pub default: Option<Value>,
    /// Sorted by time, one entry per time.
    pub time_samples: Vec<(f64, Value)>,
    pub connections: Vec<Target>,
    /// Primvar interpolation (`constant`, `uniform`, `varying`, `vertex`, `faceVarying`).
    pub interpolation: Option<String>,
    pub element_size: Option<i32>,
}

impl Attribute {
    pub fn new(type_name: TypeName) -> Self {
        Self {
            type_name,
            custom: false,
            uniform: false,
            default: None,
            time_samples: Vec::new(),
            connections: Vec::new(),
            interpolation: None,
            element_size: None,
        }
    }

    pub fn with_default(type_name: TypeName, value: Value) -> Self {
        Self {
            default: Some(value),
            ..Self::new(type_name)
        }
    }

    /// Insert or replace the sample at `time`, keeping samples sorted.
    pub fn set_sample(&mut self, time: f64, value: Value) {
        match self
            .time_samples
            .binary_search_by(|(t, _)| t.total_cmp(&time))
        {
            Ok(i) => self.time_samples[i].1 = value,
            Err(i) => self.time_samples.insert(i, (time, value)),
        }
    }

    /// True when the attribute holds a value opinion (default or samples).
    pub fn has_value(&self) -> bool {
        self.default.is_some() || !self.time_samples.is_empty()
    }

    /// More than one time sample.
    pub fn is_time_varying(&self) -> bool {
        self.time_samples.len() > 1
    }

    /// Resolve the value at `time`.
    ///
    /// Time samples win over the default. Before the first and after the last sample the
    /// end value is held; in between, interpolable types are blended linearly and the
    /// rest hold the earlier sample.
    pub fn value_at(&self, time: f64) -> Option<Value> {
        let samples = &self.time_samples;
        if samples.is_empty() {
            return self.default.clone();
        }
        let upper = samples.partition_point(|(t, _)| *t <= time);
        if upper == 0 {
            return Some(samples[0].1.clone());
        }
        let (t0, v0) = &samples[upper - 1];
        if upper == samples.len() || *t0 == time {
            return Some(v0.clone());
        }
        let (t1, v1) = &samples[upper];
        if !self.type_name.is_interpolable() {
            return Some(v0.clone());
        }
        let alpha = (time - t0) / (t1 - t0);
        Some(v0.lerp(v1, alpha).unwrap_or_else(|| v0.clone()))
    }

    /// Authored sample times inside `[start, end]`.
    pub fn sample_times_in(&self, start: f64, end: f64) -> Vec<f64> {
        self.time_samples
            .iter()
            .map(|(t, _)| *t)
            .filter(|t| *t >= start && *t <= end)
            .collect()
    }
}

/// An authored relationship.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Relationship {
    pub custom: bool,
    pub targets: Vec<Target>,
}

impl Relationship {
    pub fn new(targets: Vec<Target>) -> Self {
        Self {
            custom: false,
            targets,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usd::value::types;

    fn animated() -> Attribute {
        let mut attr = Attribute::new(types::DOUBLE);
        attr.set_sample(2.0, Value::Double(20.0));
        attr.set_sample(1.0, Value::Double(10.0));
        attr
    }

    #[test]
    fn test_samples_sorted_and_replaced() {
        let mut attr = animated();
        assert_eq!(attr.time_samples[0].0, 1.0);
        attr.set_sample(1.0, Value::Double(11.0));
        assert_eq!(attr.time_samples.len(), 2);
        assert_eq!(attr.time_samples[0].1, Value::Double(11.0));
    }

    #[test]
    fn test_value_at_holds_and_interpolates() {
        let attr = animated();
        assert_eq!(attr.value_at(0.0), Some(Value::Double(10.0)));
        assert_eq!(attr.value_at(5.0), Some(Value::Double(20.0)));
        assert_eq!(attr.value_at(1.5), Some(Value::Double(15.0)));
        assert_eq!(attr.value_at(2.0), Some(Value::Double(20.0)));
    }

    #[test]
    fn test_value_at_holds_non_interpolable() {
        let mut attr = Attribute::new(types::INT);
        attr.set_sample(1.0, Value::Int(1));
        attr.set_sample(2.0, Value::Int(2));
        assert_eq!(attr.value_at(1.9), Some(Value::Int(1)));
    }

    #[test]
    fn test_samples_win_over_default() {
        let mut attr = Attribute::with_default(types::DOUBLE, Value::Double(1.0));
        assert_eq!(attr.value_at(3.0), Some(Value::Double(1.0)));
        assert!(!attr.is_time_varying());
        attr.set_sample(3.0, Value::Double(2.0));
        assert_eq!(attr.value_at(0.0), Some(Value::Double(2.0)));
    }

    #[test]
    fn test_sample_times_in_window() {
        let mut attr = animated();
        attr.set_sample(1.5, Value::Double(12.0));
        assert_eq!(attr.sample_times_in(0.9, 1.6), vec![1.0, 1.5]);
        assert!(attr.is_time_varying());
    }
}
