//! Archive-wide time-sampling table.
//!
//! Properties reference samplings by integer index rather than embedding
//! the sampling data. Entries are deduplicated structurally and never
//! mutated once assigned an index; index 0 is reserved for the identity
//! sampling.

use crate::core::TimeSampling;
use crate::util::{Error, Result};

/// Deduplicated table of time samplings plus the maximum sample count seen
/// per sampling (written to the archive trailer for readers).
pub struct TimeSamplingTable {
    samplings: Vec<TimeSampling>,
    max_samples: Vec<u32>,
}

impl TimeSamplingTable {
    /// Create a table with the identity sampling at index 0.
    pub fn new() -> Self {
        Self {
            samplings: vec![TimeSampling::identity()],
            max_samples: vec![0],
        }
    }

    /// Rebuild a table from decoded parts. An empty decode still reserves
    /// the identity entry.
    pub fn from_parts(samplings: Vec<TimeSampling>, max_samples: Vec<u32>) -> Self {
        if samplings.is_empty() {
            return Self::new();
        }
        let mut max_samples = max_samples;
        max_samples.resize(samplings.len(), 0);
        Self {
            samplings,
            max_samples,
        }
    }

    /// Number of entries, including the reserved identity entry.
    pub fn len(&self) -> usize {
        self.samplings.len()
    }

    /// True only for a freshly reserved table; index 0 always exists.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Intern a sampling: returns the index of a structurally identical
    /// existing entry, or appends a new one.
    pub fn intern(&mut self, ts: TimeSampling) -> u32 {
        for (i, existing) in self.samplings.iter().enumerate() {
            if *existing == ts {
                return i as u32;
            }
        }
        let index = self.samplings.len() as u32;
        self.samplings.push(ts);
        self.max_samples.push(0);
        index
    }

    /// Resolve an index to its sampling.
    pub fn resolve(&self, index: u32) -> Result<&TimeSampling> {
        self.samplings
            .get(index as usize)
            .ok_or(Error::UnknownTimeSamplingIndex {
                index,
                count: self.samplings.len(),
            })
    }

    /// Record that a property using `index` now holds `count` samples.
    pub fn note_samples(&mut self, index: u32, count: u32) {
        if let Some(max) = self.max_samples.get_mut(index as usize) {
            *max = (*max).max(count);
        }
    }

    /// Maximum sample count recorded for a sampling index.
    pub fn max_samples_for(&self, index: u32) -> Option<u32> {
        self.max_samples.get(index as usize).copied()
    }

    /// The samplings in index order.
    pub fn samplings(&self) -> &[TimeSampling] {
        &self.samplings
    }

    /// The per-sampling maximum sample counts in index order.
    pub fn max_samples(&self) -> &[u32] {
        &self.max_samples
    }
}

impl Default for TimeSamplingTable {
    fn default() -> Self {
        Self::new()
    }
}
