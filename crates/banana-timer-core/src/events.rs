use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::Stage;

/// Every state change of the ripeness clock produces an Event.
/// The UI layer renders from `StateSnapshot`; the rest are notifications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    StageSelected {
        stage: Stage,
        remaining_secs: u64,
        /// The countdown was running and has been restarted from the new stage.
        restarted: bool,
        at: DateTime<Utc>,
    },
    ClockStarted {
        stage: Stage,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    /// Countdown picked up again after a reload.
    ClockResumed {
        stage: Stage,
        remaining_secs: u64,
        elapsed_secs: u64,
        at: DateTime<Utc>,
    },
    StageAdvanced {
        from: Stage,
        to: Stage,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    ClockStopped {
        stage: Stage,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    /// Countdown reached zero.
    ClockRipened {
        at: DateTime<Utc>,
    },
    ClockReset {
        at: DateTime<Utc>,
    },
    StateSnapshot {
        starting_stage: Stage,
        current_stage: Stage,
        remaining_secs: u64,
        total_secs: u64,
        remaining_display: String,
        progress_pct: f64,
        running: bool,
        at: DateTime<Utc>,
    },
}

impl Event {
    /// Whether this event begins a fresh decrement loop.
    pub fn begins_countdown(&self) -> bool {
        matches!(
            self,
            Event::ClockStarted { .. } | Event::StageSelected { restarted: true, .. }
        )
    }
}

pub(crate) fn timestamp(epoch_ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(epoch_ms).unwrap_or_default()
}
