//! Time sampling - the mapping from sample index to time in seconds.
//!
//! Properties are sampled over time; a `TimeSampling` describes when each
//! sample was recorded. Samplings are stored once per archive in a
//! deduplicated table and referenced from property headers by index.

use crate::util::Chrono;

/// Type of time sampling.
#[derive(Clone, Debug, PartialEq)]
pub enum TimeSamplingType {
    /// Uniform sampling: `start_time + index * time_per_cycle`.
    Uniform {
        time_per_cycle: Chrono,
        start_time: Chrono,
    },

    /// Cyclic sampling: a repeating pattern of sample times.
    Cyclic {
        time_per_cycle: Chrono,
        times: Vec<Chrono>,
    },

    /// Acyclic sampling: an explicit, possibly irregular time per sample.
    Acyclic { times: Vec<Chrono> },
}

impl TimeSamplingType {
    /// Check if this is uniform sampling.
    #[inline]
    pub fn is_uniform(&self) -> bool {
        matches!(self, Self::Uniform { .. })
    }

    /// Check if this is cyclic sampling.
    #[inline]
    pub fn is_cyclic(&self) -> bool {
        matches!(self, Self::Cyclic { .. })
    }

    /// Check if this is acyclic sampling.
    #[inline]
    pub fn is_acyclic(&self) -> bool {
        matches!(self, Self::Acyclic { .. })
    }

    /// Number of stored times per cycle (1 for uniform).
    pub fn samples_per_cycle(&self) -> usize {
        match self {
            Self::Uniform { .. } => 1,
            Self::Cyclic { times, .. } => times.len(),
            Self::Acyclic { times } => times.len(),
        }
    }
}

impl Default for TimeSamplingType {
    fn default() -> Self {
        Self::Uniform {
            time_per_cycle: 1.0,
            start_time: 0.0,
        }
    }
}

/// Time sampling information for a property.
///
/// The identity/default sampling (table index 0) is uniform with a period
/// of one second starting at zero. Structural equality is the table's
/// deduplication key and must survive a store/load cycle.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TimeSampling {
    /// The type of sampling.
    pub sampling_type: TimeSamplingType,
}

impl TimeSampling {
    /// The identity/default sampling reserved at table index 0.
    pub fn identity() -> Self {
        Self::default()
    }

    /// Create uniform time sampling.
    pub fn uniform(time_per_cycle: Chrono, start_time: Chrono) -> Self {
        Self {
            sampling_type: TimeSamplingType::Uniform {
                time_per_cycle,
                start_time,
            },
        }
    }

    /// Create cyclic time sampling.
    pub fn cyclic(time_per_cycle: Chrono, times: Vec<Chrono>) -> Self {
        Self {
            sampling_type: TimeSamplingType::Cyclic {
                time_per_cycle,
                times,
            },
        }
    }

    /// Create acyclic time sampling from explicit times.
    pub fn acyclic(times: Vec<Chrono>) -> Self {
        Self {
            sampling_type: TimeSamplingType::Acyclic { times },
        }
    }

    /// Check if this is the identity sampling.
    pub fn is_identity(&self) -> bool {
        matches!(
            self.sampling_type,
            TimeSamplingType::Uniform {
                time_per_cycle,
                start_time,
            } if time_per_cycle == 1.0 && start_time == 0.0
        )
    }

    /// Get the time for a specific sample index.
    pub fn sample_time(&self, index: usize) -> Chrono {
        match &self.sampling_type {
            TimeSamplingType::Uniform {
                time_per_cycle,
                start_time,
            } => *start_time + (index as Chrono) * *time_per_cycle,
            TimeSamplingType::Cyclic {
                time_per_cycle,
                times,
            } => {
                if times.is_empty() {
                    return 0.0;
                }
                let cycle = index / times.len();
                let local = index % times.len();
                times[local] + (cycle as Chrono) * *time_per_cycle
            }
            TimeSamplingType::Acyclic { times } => times.get(index).copied().unwrap_or(0.0),
        }
    }

    /// Find the floor index (largest index with time <= given time).
    pub fn floor_index(&self, time: Chrono, num_samples: usize) -> (usize, Chrono) {
        if num_samples == 0 {
            return (0, 0.0);
        }

        match &self.sampling_type {
            TimeSamplingType::Uniform {
                time_per_cycle,
                start_time,
            } => {
                if time <= *start_time {
                    return (0, *start_time);
                }
                let idx = ((time - start_time) / time_per_cycle).floor() as usize;
                let idx = idx.min(num_samples - 1);
                (idx, self.sample_time(idx))
            }
            TimeSamplingType::Cyclic { .. } | TimeSamplingType::Acyclic { .. } => {
                let mut lo = 0;
                let mut hi = num_samples;
                while lo < hi {
                    let mid = lo + (hi - lo) / 2;
                    if self.sample_time(mid) <= time {
                        lo = mid + 1;
                    } else {
                        hi = mid;
                    }
                }
                let idx = lo.saturating_sub(1);
                (idx, self.sample_time(idx))
            }
        }
    }

    /// Find the ceiling index (smallest index with time >= given time).
    pub fn ceil_index(&self, time: Chrono, num_samples: usize) -> (usize, Chrono) {
        if num_samples == 0 {
            return (0, 0.0);
        }

        let (floor_idx, floor_time) = self.floor_index(time, num_samples);
        if floor_time >= time {
            return (floor_idx, floor_time);
        }

        let ceil_idx = (floor_idx + 1).min(num_samples - 1);
        (ceil_idx, self.sample_time(ceil_idx))
    }

    /// Find the nearest index to the given time.
    pub fn near_index(&self, time: Chrono, num_samples: usize) -> (usize, Chrono) {
        if num_samples == 0 {
            return (0, 0.0);
        }

        let (floor_idx, floor_time) = self.floor_index(time, num_samples);
        if floor_idx >= num_samples - 1 {
            return (floor_idx, floor_time);
        }

        let ceil_idx = floor_idx + 1;
        let ceil_time = self.sample_time(ceil_idx);

        if (time - floor_time).abs() <= (ceil_time - time).abs() {
            (floor_idx, floor_time)
        } else {
            (ceil_idx, ceil_time)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_sampling() {
        let ts = TimeSampling::uniform(1.0 / 24.0, 0.0); // 24 fps

        assert_eq!(ts.sample_time(0), 0.0);
        assert!((ts.sample_time(24) - 1.0).abs() < 1e-10);
        assert!((ts.sample_time(48) - 2.0).abs() < 1e-10);
    }

    #[test]
    fn test_acyclic_sampling() {
        let ts = TimeSampling::acyclic(vec![0.0, 0.5, 1.0, 2.0]);

        assert_eq!(ts.sample_time(0), 0.0);
        assert_eq!(ts.sample_time(1), 0.5);
        assert_eq!(ts.sample_time(3), 2.0);
    }

    #[test]
    fn test_cyclic_sampling() {
        let ts = TimeSampling::cyclic(1.0, vec![0.0, 0.25]);

        assert_eq!(ts.sample_time(0), 0.0);
        assert_eq!(ts.sample_time(1), 0.25);
        assert_eq!(ts.sample_time(2), 1.0);
        assert_eq!(ts.sample_time(3), 1.25);
    }

    #[test]
    fn test_floor_index() {
        let ts = TimeSampling::uniform(1.0, 0.0);

        assert_eq!(ts.floor_index(0.5, 10).0, 0);
        assert_eq!(ts.floor_index(1.5, 10).0, 1);
        assert_eq!(ts.floor_index(5.0, 10).0, 5);
        assert_eq!(ts.floor_index(99.0, 10).0, 9);
    }

    #[test]
    fn test_identity_equality() {
        assert!(TimeSampling::identity().is_identity());
        assert_eq!(TimeSampling::identity(), TimeSampling::uniform(1.0, 0.0));
        assert_ne!(TimeSampling::identity(), TimeSampling::uniform(0.5, 0.0));
    }
}
