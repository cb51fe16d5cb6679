//! Timer state and its persisted encoding.
//!
//! The persisted record is a single camelCase JSON object written under one
//! key. Decoding is strict about shape and range; anything that does not
//! describe a valid state is reported as `None` so callers fall back to
//! defaults.

use serde::{Deserialize, Serialize};

use super::stage::{stage_for, Stage};

/// The complete state of the ripeness countdown.
///
/// `current_stage` is derived on demand from the countdown, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerState {
    pub starting_stage: Stage,
    pub remaining_secs: u64,
    pub running: bool,
    /// Epoch milliseconds at which the current countdown began.
    pub started_at_epoch_ms: Option<i64>,
    /// `remaining_secs` at the instant `started_at_epoch_ms` was taken.
    pub remaining_at_start_secs: Option<u64>,
}

impl TimerState {
    /// Fresh, stopped state at the given stage with the full countdown ahead.
    pub fn at_stage(stage: Stage) -> Self {
        Self {
            starting_stage: stage,
            remaining_secs: stage.total_duration_secs(),
            running: false,
            started_at_epoch_ms: None,
            remaining_at_start_secs: None,
        }
    }

    pub fn total_duration_secs(&self) -> u64 {
        self.starting_stage.total_duration_secs()
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.total_duration_secs().saturating_sub(self.remaining_secs)
    }

    pub fn current_stage(&self) -> Stage {
        stage_for(self.starting_stage, self.remaining_secs)
    }

    /// 0.0 .. 100.0 progress through the countdown.
    pub fn progress_pct(&self) -> f64 {
        let total = self.total_duration_secs();
        if total == 0 {
            return 100.0;
        }
        (self.elapsed_secs() as f64 / total as f64 * 100.0).min(100.0)
    }

    /// Serialize to the persisted JSON record.
    pub fn encode(&self) -> String {
        let record = PersistedRecord::from(*self);
        // A struct of integers, bools and options always serializes.
        serde_json::to_string(&record).unwrap_or_default()
    }

    /// Parse a persisted record, returning `None` for anything malformed.
    pub fn decode(raw: &str) -> Option<Self> {
        match serde_json::from_str::<PersistedRecord>(raw) {
            Ok(record) => record.into_state(),
            Err(e) => {
                tracing::warn!("discarding unreadable timer state: {e}");
                None
            }
        }
    }
}

impl Default for TimerState {
    fn default() -> Self {
        Self::at_stage(Stage::MIN)
    }
}

/// Wire shape of the persisted state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedRecord {
    remaining_seconds: u64,
    running: bool,
    current_stage: Stage,
    starting_stage: Stage,
    /// Required, but may be `null`.
    #[serde(deserialize_with = "Option::deserialize")]
    started_at_epoch_millis: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    remaining_at_start_seconds: Option<u64>,
}

impl From<TimerState> for PersistedRecord {
    fn from(state: TimerState) -> Self {
        Self {
            remaining_seconds: state.remaining_secs,
            running: state.running,
            current_stage: state.current_stage(),
            starting_stage: state.starting_stage,
            started_at_epoch_millis: state.started_at_epoch_ms,
            remaining_at_start_seconds: state.remaining_at_start_secs,
        }
    }
}

impl PersistedRecord {
    fn into_state(self) -> Option<TimerState> {
        let total = self.starting_stage.total_duration_secs();
        if self.remaining_seconds > total {
            tracing::warn!(
                remaining = self.remaining_seconds,
                total,
                "discarding timer state with remaining time beyond its duration"
            );
            return None;
        }
        if let Some(baseline) = self.remaining_at_start_seconds {
            if baseline > total || baseline < self.remaining_seconds {
                tracing::warn!(baseline, "discarding timer state with inconsistent baseline");
                return None;
            }
        }

        let state = TimerState {
            starting_stage: self.starting_stage,
            remaining_secs: self.remaining_seconds,
            running: self.running,
            started_at_epoch_ms: self.started_at_epoch_millis,
            remaining_at_start_secs: self.remaining_at_start_seconds,
        };
        if state.current_stage() != self.current_stage {
            tracing::debug!(
                stored = %self.current_stage,
                derived = %state.current_stage(),
                "stored stage disagrees with countdown, using derived stage"
            );
        }
        let has_start =
            state.started_at_epoch_ms.is_some() || state.remaining_at_start_secs.is_some();
        if !state.running && has_start {
            return Some(TimerState {
                started_at_epoch_ms: None,
                remaining_at_start_secs: None,
                ..state
            });
        }
        Some(state)
    }
}
