use crate::error::EmptyGroupError;

/// Running statistics for one key. Always covers at least one value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aggregate {
    min: f32,
    max: f32,
    sum: f64,
    count: u64,
}

impl Aggregate {
    /// Seeds an aggregate from its first observed value.
    pub fn new(value: f32) -> Self {
        Self {
            min: value,
            max: value,
            sum: f64::from(value),
            count: 1,
        }
    }

    /// Rebuilds an aggregate from raw parts, rejecting an empty group.
    pub fn from_parts(min: f32, max: f32, sum: f64, count: u64) -> Result<Self, EmptyGroupError> {
        if count == 0 {
            return Err(EmptyGroupError);
        }
        Ok(Self {
            min,
            max,
            sum,
            count,
        })
    }

    #[inline]
    pub fn observe(&mut self, value: f32) {
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.sum += f64::from(value);
        self.count += 1;
    }

    /// Folds `other` (same key) into `self`.
    #[inline]
    pub fn absorb(&mut self, other: &Aggregate) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self.sum += other.sum;
        self.count += other.count;
    }

    /// The merge combinator. Associative and commutative on `min`, `max`
    /// and `count`; `sum` only up to float summation order.
    pub fn merge(mut self, other: Aggregate) -> Aggregate {
        self.absorb(&other);
        self
    }

    pub fn min(&self) -> f32 {
        self.min
    }

    pub fn max(&self) -> f32 {
        self.max
    }

    pub fn sum(&self) -> f64 {
        self.sum
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Computed from the totals, never from partial means.
    pub fn mean(&self) -> f64 {
        self.sum / self.count as f64
    }
}
