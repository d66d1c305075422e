//! Axis bounds

use calcgraph_core::{Error, Result};
use std::f64::consts::TAU;

/// Closed interval along one axis
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Bounds {
    /// Minimum value
    pub min: f64,
    /// Maximum value
    pub max: f64,
}

impl Bounds {
    /// Create bounds; the ends are swapped if given in reverse
    pub fn new(min: f64, max: f64) -> Result<Self> {
        if !min.is_finite() || !max.is_finite() {
            return Err(Error::InvalidBounds(format!("[{}, {}] is not finite", min, max)));
        }
        if min == max {
            return Err(Error::InvalidBounds(format!("[{}, {}] is empty", min, max)));
        }

        Ok(if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        })
    }

    /// Default x domain and y range: `[-10, 10]`
    pub fn default_axis() -> Self {
        Self {
            min: -10.0,
            max: 10.0,
        }
    }

    /// Default parameter range for parametric curves: `[0, 2π]`
    pub fn full_turn() -> Self {
        Self { min: 0.0, max: TAU }
    }

    pub fn span(&self) -> f64 {
        self.max - self.min
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// `count` evenly spaced values from `min` to `max` inclusive
    pub fn steps(&self, count: usize) -> impl Iterator<Item = f64> {
        let Bounds { min, max } = *self;
        let intervals = count.saturating_sub(1).max(1) as f64;
        (0..count).map(move |i| {
            if i + 1 == count && count > 1 {
                max
            } else {
                min + (max - min) * i as f64 / intervals
            }
        })
    }

    /// Exact bit pattern of both ends, usable as a hash key
    pub fn key(&self) -> (u64, u64) {
        (self.min.to_bits(), self.max.to_bits())
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self::default_axis()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_new_normalizes() {
        let bounds = Bounds::new(5.0, -5.0).unwrap();
        assert_eq!(bounds, Bounds { min: -5.0, max: 5.0 });
        assert_eq!(bounds.span(), 10.0);
        assert!(bounds.contains(0.0));
        assert!(!bounds.contains(5.5));
    }

    #[test]
    fn test_invalid_bounds() {
        assert!(Bounds::new(1.0, 1.0).is_err());
        assert!(Bounds::new(f64::NAN, 1.0).is_err());
        assert!(Bounds::new(0.0, f64::INFINITY).is_err());
    }

    #[test]
    fn test_steps_hit_both_ends() {
        let steps: Vec<f64> = Bounds::new(0.0, 1.0).unwrap().steps(5).collect();
        assert_eq!(steps, vec![0.0, 0.25, 0.5, 0.75, 1.0]);

        let single: Vec<f64> = Bounds::default().steps(1).collect();
        assert_eq!(single, vec![-10.0]);
        assert_eq!(Bounds::default().steps(0).count(), 0);
    }

    proptest! {
        #[test]
        fn steps_ascend_between_the_ends(min in -1e6f64..1e6, span in 1e-3f64..1e6, count in 2usize..400) {
            let bounds = Bounds::new(min, min + span).unwrap();
            let steps: Vec<f64> = bounds.steps(count).collect();

            prop_assert_eq!(steps.len(), count);
            prop_assert_eq!(steps[0], bounds.min);
            prop_assert_eq!(steps[count - 1], bounds.max);
            prop_assert!(steps.windows(2).all(|w| w[0] <= w[1]));
        }
    }
}
