//! Event-count data sources.
//!
//! The model never iterates raw data. It asks for cumulative counts:
//! "how many events at or before time t" for point-process data, or
//! cumulative bin counts and exposures for regression data.

use crate::error::{ModelError, Result};

/// Cumulative event counts as a step function of time.
pub trait DataIndexOracle: Send + Sync {
    /// Number of events with time `<= t`.
    ///
    /// `low_hint` and `high_hint` bracket the expected answer. They only narrow
    /// the search; a wrong hint must not change the result.
    fn count_up_to(&self, t: f64, low_hint: Option<usize>, high_hint: Option<usize>) -> u64;

    /// Time of the event at `index` (0-based), if it exists.
    fn event_time(&self, index: usize) -> Option<f64>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn last_time(&self) -> Option<f64> {
        self.len().checked_sub(1).and_then(|i| self.event_time(i))
    }
}

/// Sorted continuous event times.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventTimes {
    times: Vec<f64>,
}

impl EventTimes {
    /// Wrap event times that are finite and non-decreasing.
    pub fn new(times: Vec<f64>) -> Result<Self> {
        if let Some(bad) = times.iter().find(|t| !t.is_finite()) {
            return Err(ModelError::InvalidParameter {
                name: "event_time",
                value: *bad,
            });
        }
        if let Some(pair) = times.windows(2).find(|pair| pair[1] < pair[0]) {
            return Err(ModelError::InvalidParameter {
                name: "event_time",
                value: pair[1],
            });
        }
        Ok(Self { times })
    }

    /// Sort first, then wrap.
    pub fn from_unsorted(mut times: Vec<f64>) -> Result<Self> {
        times.sort_by(|a, b| a.total_cmp(b));
        Self::new(times)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.times
    }
}

impl DataIndexOracle for EventTimes {
    fn count_up_to(&self, t: f64, low_hint: Option<usize>, high_hint: Option<usize>) -> u64 {
        let n = self.times.len();
        let lo = low_hint.unwrap_or(0).min(n);
        let hi = high_hint.unwrap_or(n).clamp(lo, n);

        // The answer lies in [lo, hi] only if times[lo - 1] <= t and
        // times[hi] > t; otherwise the hint is stale and we search everything.
        let lo_ok = lo == 0 || self.times[lo - 1] <= t;
        let hi_ok = hi == n || self.times[hi] > t;
        let count = if lo_ok && hi_ok {
            lo + self.times[lo..hi].partition_point(|x| *x <= t)
        } else {
            self.times.partition_point(|x| *x <= t)
        };
        count as u64
    }

    fn event_time(&self, index: usize) -> Option<f64> {
        self.times.get(index).copied()
    }

    fn len(&self) -> usize {
        self.times.len()
    }
}

/// Binned counts with optional per-bin intensity multipliers, stored as
/// running sums.
///
/// Bin boundaries are data indices: the interval `[i1, i2)` covers bins
/// `i1..i2`, so index 0 is the start of the series and `len()` its end.
#[derive(Debug, Clone, PartialEq)]
pub struct CumulativeSeries {
    counts: Vec<u64>,
    multipliers: Option<Vec<f64>>,
}

impl CumulativeSeries {
    pub fn new(bin_counts: &[u64], intensity_multipliers: Option<&[f64]>) -> Result<Self> {
        let counts = bin_counts
            .iter()
            .scan(0u64, |acc, c| {
                *acc += c;
                Some(*acc)
            })
            .collect();

        let multipliers = match intensity_multipliers {
            None => None,
            Some(m) if m.len() != bin_counts.len() => {
                return Err(ModelError::MultiplierLength {
                    counts: bin_counts.len(),
                    multipliers: m.len(),
                });
            }
            Some(m) => {
                if let Some(bad) = m.iter().find(|w| !w.is_finite() || **w < 0.0) {
                    return Err(ModelError::InvalidParameter {
                        name: "intensity_multiplier",
                        value: *bad,
                    });
                }
                let mut cumulative = Vec::with_capacity(m.len());
                for (i, w) in m.iter().enumerate() {
                    let prev = if i == 0 { 0.0 } else { cumulative[i - 1] };
                    cumulative.push(prev + w);
                }
                Some(cumulative)
            }
        };

        Ok(Self {
            counts,
            multipliers,
        })
    }

    /// Number of bins.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn has_multipliers(&self) -> bool {
        self.multipliers.is_some()
    }

    fn check_range(&self, i1: usize, i2: usize) -> Result<()> {
        if i2 < i1 {
            return Err(ModelError::IndexOrdering { start: i1, end: i2 });
        }
        if i2 > self.len() {
            return Err(ModelError::InvalidParameter {
                name: "data_index",
                value: i2 as f64,
            });
        }
        Ok(())
    }

    /// Events in bins `i1..i2`.
    pub fn count_between(&self, i1: usize, i2: usize) -> Result<u64> {
        self.check_range(i1, i2)?;
        Ok(cumulative_at(&self.counts, i2, 0) - cumulative_at(&self.counts, i1, 0))
    }

    /// Exposure of bins `i1..i2`: the multiplier sum, or the bin count.
    pub fn exposure_between(&self, i1: usize, i2: usize) -> Result<f64> {
        self.check_range(i1, i2)?;
        Ok(match &self.multipliers {
            Some(m) => cumulative_at(m, i2, 0.0) - cumulative_at(m, i1, 0.0),
            None => (i2 - i1) as f64,
        })
    }
}

/// Running sum over the first `index` bins.
fn cumulative_at<T: Copy>(cumulative: &[T], index: usize, zero: T) -> T {
    if index == 0 {
        zero
    } else {
        cumulative[index - 1]
    }
}
