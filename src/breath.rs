//! Breath cycle edge detection
//!
//! A cycle is one inhale above `high` followed by an exhale below `low`. The
//! detector is a plain value updated by `observe`, independent of whatever
//! samples the amplitude, so it can be fed from a render loop, a timer, or a
//! test vector alike.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BreathThresholds {
    /// Amplitude that counts as a full inhale
    pub high: f32,
    /// Amplitude that counts as a full exhale
    pub low: f32,
}

impl Default for BreathThresholds {
    fn default() -> Self {
        Self {
            high: 0.6,
            low: 0.3,
        }
    }
}

impl BreathThresholds {
    pub fn new(high: f32, low: f32) -> EngineResult<Self> {
        let thresholds = Self { high, low };
        thresholds.validate()?;
        Ok(thresholds)
    }

    pub fn validate(&self) -> EngineResult<()> {
        for value in [self.high, self.low] {
            if !(0.0..=1.0).contains(&value) {
                return Err(EngineError::InvalidThreshold { value });
            }
        }
        if self.low >= self.high {
            return Err(EngineError::InvalidBreathThresholds {
                low: self.low,
                high: self.high,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BreathCycleState {
    /// Last accepted sample, if any
    pub previous_sample: Option<f32>,
    /// Completed inhale/exhale cycles
    pub cycle_count: u32,
    /// An inhale peak was seen and no exhale has closed it yet
    pub inhaled: bool,
}

impl BreathCycleState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one sample into the state. The returned flag is true exactly when
    /// this sample closed a cycle.
    ///
    /// Dips that stay above `low` never close a cycle, and repeated low
    /// samples after a closed cycle do nothing until a new inhale is seen.
    /// Non-finite samples leave the state untouched.
    pub fn observe(self, sample: f32, thresholds: BreathThresholds) -> (Self, bool) {
        if !sample.is_finite() {
            return (self, false);
        }
        let sample = sample.clamp(0.0, 1.0);
        let mut next = Self {
            previous_sample: Some(sample),
            ..self
        };

        if sample > thresholds.high {
            next.inhaled = true;
            return (next, false);
        }

        if next.inhaled && sample < thresholds.low {
            next.inhaled = false;
            next.cycle_count += 1;
            return (next, true);
        }

        (next, false)
    }
}

/// Indices at which a sample sequence closes a breath cycle.
pub fn cycle_indices(samples: &[f32], thresholds: BreathThresholds) -> Vec<usize> {
    let mut state = BreathCycleState::new();
    let mut indices = Vec::new();
    for (index, sample) in samples.iter().enumerate() {
        let (next, completed) = state.observe(*sample, thresholds);
        state = next;
        if completed {
            indices.push(index);
        }
    }
    indices
}
