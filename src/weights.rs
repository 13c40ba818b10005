//! Distance/time/cost weights for multi-criteria routing.
//!
//! The three weights always sum to 1. Changing one redistributes the rest
//! of the budget over the other two in proportion to their current sizes.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Tolerance for the sum-to-one invariant.
pub const WEIGHT_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    Distance,
    Time,
    Cost,
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Criterion::Distance => "distance",
            Criterion::Time => "time",
            Criterion::Cost => "cost",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum WeightError {
    #[error("{criterion} weight {value} is outside [0, 1]")]
    OutOfRange { criterion: Criterion, value: f64 },
    #[error("weights must be finite and sum to 1, got {sum}")]
    BadSum { sum: f64 },
    #[error("no non-negative split of the remaining {remainder} exists")]
    Infeasible { remainder: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CriteriaWeights {
    distance: f64,
    time: f64,
    cost: f64,
}

impl Default for CriteriaWeights {
    fn default() -> Self {
        Self {
            distance: 0.5,
            time: 0.3,
            cost: 0.2,
        }
    }
}

impl CriteriaWeights {
    pub fn new(distance: f64, time: f64, cost: f64) -> Result<Self, WeightError> {
        for (criterion, value) in [
            (Criterion::Distance, distance),
            (Criterion::Time, time),
            (Criterion::Cost, cost),
        ] {
            check_range(criterion, value)?;
        }
        let sum = distance + time + cost;
        if (sum - 1.0).abs() >= WEIGHT_TOLERANCE {
            return Err(WeightError::BadSum { sum });
        }
        Ok(Self {
            distance,
            time,
            cost,
        })
    }

    pub fn distance(&self) -> f64 {
        self.distance
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn cost(&self) -> f64 {
        self.cost
    }

    pub fn get(&self, criterion: Criterion) -> f64 {
        match criterion {
            Criterion::Distance => self.distance,
            Criterion::Time => self.time,
            Criterion::Cost => self.cost,
        }
    }

    /// The other two criteria, in a fixed order.
    fn siblings(criterion: Criterion) -> (Criterion, Criterion) {
        match criterion {
            Criterion::Distance => (Criterion::Time, Criterion::Cost),
            Criterion::Time => (Criterion::Distance, Criterion::Cost),
            Criterion::Cost => (Criterion::Distance, Criterion::Time),
        }
    }

    fn slot(&mut self, criterion: Criterion) -> &mut f64 {
        match criterion {
            Criterion::Distance => &mut self.distance,
            Criterion::Time => &mut self.time,
            Criterion::Cost => &mut self.cost,
        }
    }

    /// Sets one weight and rebalances the other two.
    ///
    /// On error `self` is left exactly as it was.
    pub fn set(&mut self, criterion: Criterion, value: f64) -> Result<Self, WeightError> {
        check_range(criterion, value)?;
        let remainder = 1.0 - value;
        let (first, second) = Self::siblings(criterion);
        let (a, b) = (self.get(first), self.get(second));

        let pool = a + b;
        let mut first_share = if pool.abs() < f64::EPSILON {
            remainder / 2.0
        } else {
            remainder * a / pool
        };
        if first_share < 0.0 {
            first_share = 0.0;
        }
        // second absorbs rounding so the sum is exact
        let second_share = remainder - first_share;
        if second_share < 0.0 || !second_share.is_finite() {
            return Err(WeightError::Infeasible { remainder });
        }

        let mut next = *self;
        *next.slot(criterion) = value;
        *next.slot(first) = first_share;
        *next.slot(second) = second_share;
        *self = next;
        Ok(next)
    }

    pub fn sum(&self) -> f64 {
        self.distance + self.time + self.cost
    }
}

impl<'de> Deserialize<'de> for CriteriaWeights {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            distance: f64,
            time: f64,
            cost: f64,
        }

        let raw = Raw::deserialize(deserializer)?;
        CriteriaWeights::new(raw.distance, raw.time, raw.cost).map_err(serde::de::Error::custom)
    }
}

fn check_range(criterion: Criterion, value: f64) -> Result<(), WeightError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(WeightError::OutOfRange { criterion, value })
    }
}
