//! Reference interactions
//!
//! A handful of stage sets wired with each transition policy. The CLI runs
//! them, and they double as worked examples for hosts defining their own.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::config::StagesConfig;
use crate::error::EngineResult;
use crate::lifecycle::{Compound, CountedAction, SignalThreshold, StageMachine, Timed};

crate::stages! {
    /// The canonical five-stage arc
    pub enum StandardStage {
        Arrival => "arrival",
        Presentation => "presentation",
        Active => "active",
        Resonant => "resonant",
        Afterglow => "afterglow",
    }
}

crate::stages! {
    /// "Place five bricks", then let the wall resonate
    pub enum BrickStage {
        Arrival => "arrival",
        Building => "building",
        Resonant => "resonant",
        Afterglow => "afterglow",
    }
}

crate::stages! {
    /// Wait for the ember's temperature to fall, then hold the glow
    pub enum EmberStage {
        Arrival => "arrival",
        Cooling => "cooling",
        Ember => "ember",
        Complete => "complete",
    }
}

crate::stages! {
    /// "Knock three times"
    pub enum KnockStage {
        Arrival => "arrival",
        Knocking => "knocking",
        Afterglow => "afterglow",
    }
}

pub const BRICKS_TO_PLACE: u32 = 5;
pub const KNOCKS_TO_OPEN: u32 = 3;
/// Temperature below which the ember stage takes over
pub const EMBER_THRESHOLD: f32 = 0.2;
/// Time for the ember to cool from 1.0 to 0.0
pub const EMBER_COOLING_TIME: Duration = Duration::from_secs(8);

pub fn standard(stages: &StagesConfig) -> StageMachine<StandardStage> {
    StageMachine::new(StandardStage::Arrival)
        .with_policy(StandardStage::Arrival, Timed::millis(1500))
        .with_policy(StandardStage::Presentation, Timed::millis(2500))
        .with_policy(StandardStage::Active, Timed::millis(4000))
        .with_policy(StandardStage::Resonant, Timed::new(stages.afterglow_delay()))
}

pub fn brick_wall(stages: &StagesConfig) -> EngineResult<StageMachine<BrickStage>> {
    Ok(StageMachine::new(BrickStage::Arrival)
        .with_policy(BrickStage::Arrival, Timed::millis(1500))
        .with_policy(
            BrickStage::Building,
            Compound::on(CountedAction::new(BRICKS_TO_PLACE)?)
                .then(BrickStage::Resonant, stages.resonance_delay())
                .then(BrickStage::Afterglow, stages.afterglow_delay()),
        ))
}

/// Temperature as a function of time since mount.
pub fn ember_temperature(elapsed: Duration) -> f32 {
    let cooled = elapsed.as_secs_f32() / EMBER_COOLING_TIME.as_secs_f32();
    (1.0 - cooled).clamp(0.0, 1.0)
}

pub fn cooling_ember(stages: &StagesConfig) -> EngineResult<StageMachine<EmberStage>> {
    Ok(StageMachine::new(EmberStage::Arrival)
        .with_policy(EmberStage::Arrival, Timed::millis(1000))
        .with_policy(
            EmberStage::Cooling,
            SignalThreshold::falling(EMBER_THRESHOLD)?.sampled_every(stages.frame_interval()),
        )
        .with_policy(EmberStage::Ember, Timed::new(stages.afterglow_delay()))
        .with_sampler(ember_temperature))
}

pub fn knock_to_open() -> EngineResult<StageMachine<KnockStage>> {
    Ok(StageMachine::new(KnockStage::Arrival)
        .with_policy(KnockStage::Arrival, Timed::millis(800))
        .with_policy(KnockStage::Knocking, CountedAction::new(KNOCKS_TO_OPEN)?))
}

/// Catalogue keys accepted by the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogEntry {
    Standard,
    BrickWall,
    CoolingEmber,
    KnockToOpen,
}

impl CatalogEntry {
    pub const ALL: [CatalogEntry; 4] = [
        CatalogEntry::Standard,
        CatalogEntry::BrickWall,
        CatalogEntry::CoolingEmber,
        CatalogEntry::KnockToOpen,
    ];

    pub fn key(self) -> &'static str {
        match self {
            CatalogEntry::Standard => "standard",
            CatalogEntry::BrickWall => "brick-wall",
            CatalogEntry::CoolingEmber => "cooling-ember",
            CatalogEntry::KnockToOpen => "knock-to-open",
        }
    }

    /// Actions the interaction needs before it can finish on its own.
    pub fn required_actions(self) -> u32 {
        match self {
            CatalogEntry::BrickWall => BRICKS_TO_PLACE,
            CatalogEntry::KnockToOpen => KNOCKS_TO_OPEN,
            CatalogEntry::Standard | CatalogEntry::CoolingEmber => 0,
        }
    }
}

impl fmt::Display for CatalogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for CatalogEntry {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase().replace('_', "-");
        CatalogEntry::ALL
            .into_iter()
            .find(|entry| entry.key() == key)
            .ok_or_else(|| {
                let known: Vec<_> = CatalogEntry::ALL.iter().map(|entry| entry.key()).collect();
                format!("unknown interaction '{s}' (known: {})", known.join(", "))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::{order_is_consistent, Stage};

    #[test]
    fn test_stage_sets_are_consistent() {
        assert!(order_is_consistent::<StandardStage>());
        assert!(order_is_consistent::<BrickStage>());
        assert!(order_is_consistent::<EmberStage>());
        assert!(order_is_consistent::<KnockStage>());
        assert_eq!(StandardStage::terminal(), Some(StandardStage::Afterglow));
        assert_eq!(EmberStage::terminal(), Some(EmberStage::Complete));
    }

    #[test]
    fn test_standard_runs_on_time_alone() {
        let mut machine = standard(&StagesConfig::default());
        machine.start(Duration::ZERO);
        machine.tick(Duration::from_millis(1500 + 2500 + 4000 + 5000));
        assert!(machine.is_complete());
        assert_eq!(machine.history().len(), StandardStage::ORDER.len());
    }

    #[test]
    fn test_ember_temperature_curve() {
        assert_eq!(ember_temperature(Duration::ZERO), 1.0);
        assert_eq!(ember_temperature(Duration::from_secs(4)), 0.5);
        assert_eq!(ember_temperature(Duration::from_secs(20)), 0.0);
    }

    #[test]
    fn test_catalog_keys_parse() {
        for entry in CatalogEntry::ALL {
            assert_eq!(entry.key().parse::<CatalogEntry>(), Ok(entry));
        }
        assert_eq!("brick_wall".parse::<CatalogEntry>(), Ok(CatalogEntry::BrickWall));
        assert!("garden".parse::<CatalogEntry>().is_err());
    }
}
