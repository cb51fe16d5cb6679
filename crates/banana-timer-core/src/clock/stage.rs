use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Seconds in one ripening day. Each elapsed day moves the banana one stage.
pub const SECONDS_PER_STAGE: u64 = 86_400;

/// A ripeness level, 1 (green) through 11 (fully ripe).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Stage(u8);

impl Stage {
    pub const MIN: Stage = Stage(1);
    pub const MAX: Stage = Stage(11);

    /// Validate a raw stage number.
    ///
    /// Accepts any integer so callers can pass user input straight through.
    pub fn new(value: impl Into<i64>) -> Result<Self, ValidationError> {
        let value = value.into();
        if (Self::MIN.0 as i64..=Self::MAX.0 as i64).contains(&value) {
            Ok(Stage(value as u8))
        } else {
            Err(ValidationError::StageOutOfRange {
                value,
                min: Self::MIN.0,
                max: Self::MAX.0,
            })
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn is_ripe(self) -> bool {
        self == Self::MAX
    }

    /// Full countdown length when ripening starts from this stage.
    pub fn total_duration_secs(self) -> u64 {
        u64::from(Self::MAX.0 - self.0) * SECONDS_PER_STAGE
    }

    /// Every valid stage, in ripening order.
    pub fn all() -> impl Iterator<Item = Stage> {
        (Self::MIN.0..=Self::MAX.0).map(Stage)
    }
}

impl Default for Stage {
    fn default() -> Self {
        Self::MIN
    }
}

impl TryFrom<u8> for Stage {
    type Error = ValidationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Stage::new(value)
    }
}

impl From<Stage> for u8 {
    fn from(stage: Stage) -> Self {
        stage.0
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stage reached after counting down from `starting` to `remaining_secs`.
///
/// `min(starting + floor(elapsed / 1 day), 11)` where elapsed is measured
/// against the countdown's own accounting, not the wall clock.
pub fn stage_for(starting: Stage, remaining_secs: u64) -> Stage {
    let total = starting.total_duration_secs();
    let elapsed = total.saturating_sub(remaining_secs);
    let days = elapsed / SECONDS_PER_STAGE;
    let stage = u64::from(starting.0).saturating_add(days);
    Stage(stage.min(u64::from(Stage::MAX.0)) as u8)
}
