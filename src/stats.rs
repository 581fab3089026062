//! Aggregate statistics over the retained transactions.

use serde::{Deserialize, Serialize};

/// Point-in-time summary of the window.
///
/// An empty window is reported as all zeros rather than as a missing value,
/// so consumers always receive a well-formed record.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Statistics {
    pub count: u64,
    pub sum: f64,
    pub avg: f64,
    pub min: f64,
    pub max: f64,
}

impl Statistics {
    /// Single pass over `values`. No rounding is applied.
    pub fn compute<I>(values: I) -> Self
    where
        I: IntoIterator<Item = f64>,
    {
        let mut iter = values.into_iter();
        let Some(first) = iter.next() else {
            return Self::default();
        };

        let mut count: u64 = 1;
        let mut sum = first;
        let mut min = first;
        let mut max = first;
        for v in iter {
            count += 1;
            sum += v;
            if v < min {
                min = v;
            }
            if v > max {
                max = v;
            }
        }

        Self {
            count,
            sum,
            avg: sum / count as f64,
            min,
            max,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}
