//! Entry pattern registry
//!
//! The registry is a `const` table: every instance reads it, nothing writes it.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Shortest reveal phase any timed pattern may produce.
pub const DEFAULT_REVEAL_FLOOR: Duration = Duration::from_millis(800);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryPattern {
    ColdOpen,
    BreathGate,
    FadeText,
    SceneFirst,
    ObjectFirst,
    SilenceFirst,
    ParticleGather,
    Emergence,
    SplitReveal,
    DissolveIn,
}

/// How a pattern leaves the atmosphere phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateKind {
    /// No atmosphere or reveal at all
    Immediate,
    /// Wait for one full breath cycle
    Breath,
    /// Wait for `text_delay_ms`
    Timed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryPatternConfig {
    /// Atmosphere plays before the reveal begins
    pub atmosphere_first: bool,
    /// Delay before the reveal begins
    pub text_delay_ms: u64,
    /// Total entry duration
    pub duration_ms: u64,
}

impl EntryPatternConfig {
    pub fn new(
        pattern: EntryPattern,
        atmosphere_first: bool,
        text_delay_ms: u64,
        duration_ms: u64,
    ) -> EngineResult<Self> {
        let config = Self {
            atmosphere_first,
            text_delay_ms,
            duration_ms,
        };
        config.validate(pattern)?;
        Ok(config)
    }

    pub fn validate(&self, pattern: EntryPattern) -> EngineResult<()> {
        if self.duration_ms < self.text_delay_ms {
            return Err(EngineError::InvalidPatternConfig {
                pattern: pattern.key().to_string(),
                text_delay_ms: self.text_delay_ms,
                duration_ms: self.duration_ms,
            });
        }
        Ok(())
    }

    pub fn text_delay(&self) -> Duration {
        Duration::from_millis(self.text_delay_ms)
    }

    /// Offset from mount at which a timed pattern starts its reveal.
    pub fn reveal_offset(&self) -> Duration {
        if self.atmosphere_first {
            self.text_delay()
        } else {
            Duration::ZERO
        }
    }

    /// Length of the reveal phase: the remainder of the entry, never shorter
    /// than `floor`.
    pub fn reveal_duration(&self, floor: Duration) -> Duration {
        let remainder = Duration::from_millis(self.duration_ms.saturating_sub(self.text_delay_ms));
        remainder.max(floor)
    }
}

impl EntryPattern {
    pub const ALL: [EntryPattern; 10] = [
        EntryPattern::ColdOpen,
        EntryPattern::BreathGate,
        EntryPattern::FadeText,
        EntryPattern::SceneFirst,
        EntryPattern::ObjectFirst,
        EntryPattern::SilenceFirst,
        EntryPattern::ParticleGather,
        EntryPattern::Emergence,
        EntryPattern::SplitReveal,
        EntryPattern::DissolveIn,
    ];

    pub fn key(self) -> &'static str {
        match self {
            EntryPattern::ColdOpen => "cold_open",
            EntryPattern::BreathGate => "breath_gate",
            EntryPattern::FadeText => "fade_text",
            EntryPattern::SceneFirst => "scene_first",
            EntryPattern::ObjectFirst => "object_first",
            EntryPattern::SilenceFirst => "silence_first",
            EntryPattern::ParticleGather => "particle_gather",
            EntryPattern::Emergence => "emergence",
            EntryPattern::SplitReveal => "split_reveal",
            EntryPattern::DissolveIn => "dissolve_in",
        }
    }

    pub fn gate(self) -> GateKind {
        match self {
            EntryPattern::ColdOpen => GateKind::Immediate,
            EntryPattern::BreathGate => GateKind::Breath,
            _ => GateKind::Timed,
        }
    }

    /// Registry entry for this pattern.
    pub const fn config(self) -> EntryPatternConfig {
        let (atmosphere_first, text_delay_ms, duration_ms) = match self {
            EntryPattern::ColdOpen => (false, 0, 0),
            EntryPattern::BreathGate => (true, 0, 3000),
            EntryPattern::FadeText => (true, 1500, 3500),
            EntryPattern::SceneFirst => (true, 3000, 5500),
            EntryPattern::ObjectFirst => (true, 2000, 4500),
            EntryPattern::SilenceFirst => (true, 4000, 6000),
            EntryPattern::ParticleGather => (true, 2500, 4000),
            EntryPattern::Emergence => (true, 3500, 6500),
            EntryPattern::SplitReveal => (true, 1200, 1800),
            EntryPattern::DissolveIn => (false, 0, 3000),
        };
        EntryPatternConfig {
            atmosphere_first,
            text_delay_ms,
            duration_ms,
        }
    }
}

impl fmt::Display for EntryPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for EntryPattern {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase().replace('-', "_");
        EntryPattern::ALL
            .into_iter()
            .find(|pattern| pattern.key() == key)
            .ok_or_else(|| EngineError::UnknownPattern { key: s.to_string() })
    }
}
