use serde::{Deserialize, Serialize};

/// A closed range of scalar values.
///
/// Used both as a bounds axis (see [`crate::Aabb`]) and as a shutter window,
/// where `min`/`max` are the shutter open/close offsets relative to a frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub min: f32,
    pub max: f32,
}

impl Interval {
    /// Create a new interval given min and max values.
    pub fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// Returns the size of the interval (max - min).
    pub fn size(&self) -> f32 {
        self.max - self.min
    }

    /// True when the interval spans a non-zero forward range (`min < max`).
    ///
    /// A shutter window is only considered open for motion blur when this holds.
    pub fn is_open(&self) -> bool {
        self.min < self.max
    }

    /// Smallest interval holding both `self` and `x`.
    pub fn including(&self, x: f32) -> Interval {
        Interval::new(self.min.min(x), self.max.max(x))
    }

    /// An empty interval (min > max, contains nothing).
    pub const EMPTY: Interval = Interval {
        min: f32::INFINITY,
        max: f32::NEG_INFINITY,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_size() {
        let interval = Interval::new(2.0, 7.0);
        assert_eq!(interval.size(), 5.0);

        let negative = Interval::new(-5.0, 5.0);
        assert_eq!(negative.size(), 10.0);
    }

    #[test]
    fn test_interval_is_open() {
        assert!(Interval::new(-0.25, 0.25).is_open());
        assert!(!Interval::new(0.5, 0.5).is_open());
        assert!(!Interval::new(1.0, 0.0).is_open());
    }

    #[test]
    fn test_interval_including() {
        let grown = Interval::EMPTY.including(3.0);
        assert_eq!(grown, Interval::new(3.0, 3.0));
        assert_eq!(grown.including(-1.0), Interval::new(-1.0, 3.0));
        assert_eq!(grown.including(-1.0).size(), 4.0);
    }

    #[test]
    fn test_interval_empty() {
        let empty = Interval::EMPTY;
        assert!(empty.min > empty.max);
        assert!(!empty.is_open());
    }
}
