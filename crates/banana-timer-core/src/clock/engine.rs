//! Ripeness clock implementation.
//!
//! The clock is a state machine over [`TimerState`]. It does not own a
//! thread or a timer - the caller (usually [`super::ClockDriver`]) invokes
//! `tick()` once per second while the clock is running.
//!
//! ## State Transitions
//!
//! ```text
//! Stopped -> Running -> (Stopped | Ripe)
//! ```
//!
//! Every transition and every tick overwrites the persisted record in the
//! backing [`StateStore`]. Before ticking, the clock compares the stored
//! record with its own last write and adopts the stored state if another
//! writer replaced it.
//!
//! ## Usage
//!
//! ```ignore
//! let (mut clock, _) = RipenessClock::load(store, SystemTimeSource, "banana_timer");
//! clock.select_stage(Stage::new(3)?);
//! clock.start();
//! // Once per second:
//! clock.tick();
//! ```

use serde::{Deserialize, Serialize};

use super::display::{format_remaining, DisplayFormat};
use super::stage::Stage;
use super::state::TimerState;
use super::time::TimeSource;
use crate::events::{timestamp, Event};
use crate::storage::StateStore;

/// Read-only view of the clock for rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Projection {
    pub remaining_secs: u64,
    pub current_stage: Stage,
    pub running: bool,
}

/// Countdown from a starting stage to fully ripe, persisted on every change.
pub struct RipenessClock<S, T> {
    state: TimerState,
    store: S,
    time: T,
    key: String,
    /// Record most recently written by this clock.
    last_written: Option<String>,
}

impl<S: StateStore, T: TimeSource> RipenessClock<S, T> {
    /// Create a clock in the default state without reading the store.
    pub fn new(store: S, time: T, key: impl Into<String>) -> Self {
        Self {
            state: TimerState::default(),
            store,
            time,
            key: key.into(),
            last_written: None,
        }
    }

    /// Restore the clock from the store and reconcile it against the current
    /// time. Missing or unreadable state falls back to the defaults.
    ///
    /// Returns the reconciliation event alongside the clock.
    pub fn load(store: S, time: T, key: impl Into<String>) -> (Self, Option<Event>) {
        let mut clock = Self::new(store, time, key);
        let persisted = match clock.store.get(&clock.key) {
            Ok(Some(raw)) => TimerState::decode(&raw),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("could not read timer state, starting fresh: {e}");
                None
            }
        };
        let event = match persisted {
            Some(state) => {
                let now = clock.time.now_ms();
                clock.reconcile_on_load(now, state)
            }
            None => {
                clock.persist();
                None
            }
        };
        (clock, event)
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> &TimerState {
        &self.state
    }

    pub fn is_running(&self) -> bool {
        self.state.running
    }

    pub fn remaining_secs(&self) -> u64 {
        self.state.remaining_secs
    }

    pub fn current_stage(&self) -> Stage {
        self.state.current_stage()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn projection(&self) -> Projection {
        Projection {
            remaining_secs: self.state.remaining_secs,
            current_stage: self.state.current_stage(),
            running: self.state.running,
        }
    }

    /// Build a full state snapshot event.
    pub fn snapshot(&self, format: DisplayFormat) -> Event {
        Event::StateSnapshot {
            starting_stage: self.state.starting_stage,
            current_stage: self.state.current_stage(),
            remaining_secs: self.state.remaining_secs,
            total_secs: self.state.total_duration_secs(),
            remaining_display: format_remaining(self.state.remaining_secs, format),
            progress_pct: self.state.progress_pct(),
            running: self.state.running,
            at: self.at(),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Jump to `stage` with a full countdown ahead. A running countdown is
    /// restarted from the new values.
    pub fn select_stage(&mut self, stage: Stage) -> Option<Event> {
        let was_running = self.state.running;
        self.state = TimerState::at_stage(stage);
        if was_running {
            self.begin_countdown();
        }
        self.persist();
        tracing::info!(%stage, restarted = was_running, "stage selected");
        Some(Event::StageSelected {
            stage,
            remaining_secs: self.state.remaining_secs,
            restarted: was_running,
            at: self.at(),
        })
    }

    pub fn start(&mut self) -> Option<Event> {
        if self.state.running {
            return None;
        }
        self.begin_countdown();
        self.persist();
        tracing::info!(remaining = self.state.remaining_secs, "countdown started");
        Some(Event::ClockStarted {
            stage: self.state.current_stage(),
            remaining_secs: self.state.remaining_secs,
            at: self.at(),
        })
    }

    /// Call once per second while running.
    ///
    /// Returns `Some(Event::StageAdvanced)` when a day boundary is crossed and
    /// `Some(Event::ClockRipened)` when the countdown reaches zero.
    ///
    /// If the stored record was replaced by another writer, that state is
    /// adopted in place of this tick.
    pub fn tick(&mut self) -> Option<Event> {
        if !self.state.running {
            return None;
        }
        if let Some(external) = self.external_change() {
            return self.adopt(external);
        }
        let before = self.state.current_stage();
        self.state.remaining_secs = self.state.remaining_secs.saturating_sub(1);
        let after = self.state.current_stage();
        self.persist();
        tracing::debug!(remaining = self.state.remaining_secs, stage = %after, "tick");

        if self.state.remaining_secs == 0 {
            self.stop();
            tracing::info!("banana is fully ripe");
            return Some(Event::ClockRipened { at: self.at() });
        }
        (after != before).then(|| Event::StageAdvanced {
            from: before,
            to: after,
            remaining_secs: self.state.remaining_secs,
            at: self.at(),
        })
    }

    pub fn stop(&mut self) -> Option<Event> {
        if !self.state.running {
            return None;
        }
        self.halt();
        self.persist();
        tracing::info!(remaining = self.state.remaining_secs, "countdown stopped");
        Some(Event::ClockStopped {
            stage: self.state.current_stage(),
            remaining_secs: self.state.remaining_secs,
            at: self.at(),
        })
    }

    /// Stop and go back to stage 1.
    pub fn reset(&mut self) -> Option<Event> {
        self.stop();
        self.select_stage(Stage::MIN);
        tracing::info!("clock reset");
        Some(Event::ClockReset { at: self.at() })
    }

    /// Adopt `persisted` as the current state, catching a running countdown
    /// up with the wall-clock time that passed since it started.
    ///
    /// The start instant is kept, so later reloads keep measuring from the
    /// original start. Time running backwards counts as no time at all.
    pub fn reconcile_on_load(&mut self, now_ms: i64, persisted: TimerState) -> Option<Event> {
        self.state = persisted;
        let event = if !self.state.running {
            None
        } else if let Some(started) = self.state.started_at_epoch_ms {
            let elapsed = elapsed_secs(started, now_ms);
            let baseline = self
                .state
                .remaining_at_start_secs
                .unwrap_or(self.state.remaining_secs);
            self.state.remaining_at_start_secs = Some(baseline);
            self.state.remaining_secs = baseline
                .saturating_sub(elapsed)
                .min(self.state.remaining_secs);

            if self.state.remaining_secs == 0 {
                self.halt();
                tracing::info!(elapsed, "banana ripened while away");
                Some(Event::ClockRipened { at: self.at() })
            } else {
                tracing::info!(elapsed, remaining = self.state.remaining_secs, "countdown resumed");
                Some(Event::ClockResumed {
                    stage: self.state.current_stage(),
                    remaining_secs: self.state.remaining_secs,
                    elapsed_secs: elapsed,
                    at: self.at(),
                })
            }
        } else {
            tracing::warn!("running timer state has no start instant, loading it stopped");
            self.halt();
            None
        };
        self.persist();
        event
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn begin_countdown(&mut self) {
        self.state.running = true;
        self.state.started_at_epoch_ms = Some(self.time.now_ms());
        self.state.remaining_at_start_secs = Some(self.state.remaining_secs);
    }

    fn halt(&mut self) {
        self.state.running = false;
        self.state.started_at_epoch_ms = None;
        self.state.remaining_at_start_secs = None;
    }

    fn persist(&mut self) {
        let encoded = self.state.encode();
        match self.store.set(&self.key, &encoded) {
            Ok(()) => {
                tracing::debug!(key = %self.key, "persisted timer state");
                self.last_written = Some(encoded);
            }
            Err(e) => tracing::warn!(key = %self.key, "failed to persist timer state: {e}"),
        }
    }

    /// Stored state that this clock did not write, if any.
    fn external_change(&self) -> Option<TimerState> {
        let raw = match self.store.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(key = %self.key, "could not re-read timer state: {e}");
                return None;
            }
        };
        if self.last_written.as_deref() == Some(raw.as_str()) {
            return None;
        }
        TimerState::decode(&raw)
    }

    fn adopt(&mut self, external: TimerState) -> Option<Event> {
        tracing::info!(key = %self.key, "timer state replaced by another writer");
        let now = self.time.now_ms();
        let event = self.reconcile_on_load(now, external);
        if self.state.running || event.is_some() {
            return event;
        }
        Some(Event::ClockStopped {
            stage: self.state.current_stage(),
            remaining_secs: self.state.remaining_secs,
            at: self.at(),
        })
    }

    fn at(&self) -> chrono::DateTime<chrono::Utc> {
        timestamp(self.time.now_ms())
    }
}

/// Whole seconds from `started_ms` to `now_ms`, never negative.
fn elapsed_secs(started_ms: i64, now_ms: i64) -> u64 {
    (now_ms.saturating_sub(started_ms).max(0) / 1000) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::time::ManualTimeSource;
    use crate::error::StoreError;
    use crate::storage::MemoryStore;

    const KEY: &str = "banana_timer";
    const T0: i64 = 1_700_000_000_000;

    fn clock() -> RipenessClock<MemoryStore, ManualTimeSource> {
        RipenessClock::new(MemoryStore::new(), ManualTimeSource::new(T0), KEY)
    }

    fn stage(n: u8) -> Stage {
        Stage::new(n).unwrap()
    }

    fn stored(clock: &RipenessClock<MemoryStore, ManualTimeSource>) -> TimerState {
        let raw = clock.store().get(KEY).unwrap().unwrap();
        TimerState::decode(&raw).unwrap()
    }

    #[test]
    fn select_stage_sets_full_countdown() {
        let mut c = clock();
        for s in Stage::all() {
            c.select_stage(s);
            assert_eq!(c.remaining_secs(), (11 - u64::from(s.get())) * 86_400);
            assert_eq!(c.current_stage(), s);
            assert!(!c.is_running());
            assert_eq!(c.state().started_at_epoch_ms, None);
        }
    }

    #[test]
    fn select_stage_restarts_running_countdown() {
        let mut c = clock();
        c.start();
        c.tick();
        c.time.advance_ms(5_000);
        let event = c.select_stage(stage(4)).unwrap();
        assert!(event.begins_countdown());
        assert!(c.is_running());
        assert_eq!(c.remaining_secs(), 7 * 86_400);
        assert_eq!(c.state().started_at_epoch_ms, Some(T0 + 5_000));
    }

    #[test]
    fn start_is_idempotent() {
        let mut c = clock();
        assert!(c.start().is_some());
        c.time.advance_ms(3_000);
        assert!(c.start().is_none());
        assert_eq!(c.state().started_at_epoch_ms, Some(T0));
        c.tick();
        assert_eq!(c.remaining_secs(), 864_000 - 1);
    }

    #[test]
    fn tick_is_ignored_when_stopped() {
        let mut c = clock();
        assert!(c.tick().is_none());
        assert_eq!(c.remaining_secs(), 864_000);
    }

    #[test]
    fn tick_reports_stage_boundary() {
        let mut c = clock();
        c.select_stage(stage(9));
        c.start();
        c.state.remaining_secs = 86_401;
        assert_eq!(c.current_stage(), stage(9));
        match c.tick() {
            Some(Event::StageAdvanced { from, to, .. }) => {
                assert_eq!(from, stage(9));
                assert_eq!(to, stage(10));
            }
            other => panic!("Expected StageAdvanced, got {other:?}"),
        }
    }

    #[test]
    fn tick_to_zero_stops_at_ripe() {
        let mut c = clock();
        c.select_stage(Stage::MAX);
        assert_eq!(c.remaining_secs(), 0);
        c.start();
        assert!(c.is_running());
        assert!(matches!(c.tick(), Some(Event::ClockRipened { .. })));
        assert_eq!(c.remaining_secs(), 0);
        assert!(!c.is_running());
        assert_eq!(c.current_stage(), Stage::MAX);
        assert_eq!(c.state().started_at_epoch_ms, None);
    }

    #[test]
    fn last_second_ripens() {
        let mut c = clock();
        c.select_stage(stage(10));
        c.start();
        c.state.remaining_secs = 1;
        assert!(matches!(c.tick(), Some(Event::ClockRipened { .. })));
        assert!(!c.is_running());
        assert!(stored(&c).current_stage().is_ripe());
    }

    #[test]
    fn stop_clears_start_instant() {
        let mut c = clock();
        c.start();
        c.tick();
        assert!(c.stop().is_some());
        assert!(!c.is_running());
        assert_eq!(c.state().started_at_epoch_ms, None);
        assert_eq!(c.remaining_secs(), 863_999);
        assert!(c.stop().is_none());
    }

    #[test]
    fn reset_after_start_matches_stage_one() {
        let mut c = clock();
        c.select_stage(stage(6));
        c.start();
        c.tick();
        assert!(matches!(c.reset(), Some(Event::ClockReset { .. })));
        assert_eq!(*c.state(), TimerState::at_stage(Stage::MIN));
        assert!(!c.is_running());
    }

    #[test]
    fn every_transition_is_persisted() {
        let mut c = clock();
        c.select_stage(stage(3));
        assert_eq!(stored(&c), *c.state());
        c.start();
        assert_eq!(stored(&c), *c.state());
        c.tick();
        assert_eq!(stored(&c).remaining_secs, 8 * 86_400 - 1);
        c.stop();
        assert!(!stored(&c).running);
    }

    #[test]
    fn tick_adopts_state_written_elsewhere() {
        let mut c = clock();
        c.start();
        c.tick();

        let stopped_elsewhere = TimerState {
            remaining_secs: 500_000,
            ..TimerState::at_stage(Stage::MIN)
        };
        c.store.set(KEY, &stopped_elsewhere.encode()).unwrap();

        c.time.advance_ms(1_000);
        match c.tick() {
            Some(Event::ClockStopped { remaining_secs, .. }) => {
                assert_eq!(remaining_secs, 500_000);
            }
            other => panic!("Expected ClockStopped, got {other:?}"),
        }
        assert!(!c.is_running());
        assert_eq!(stored(&c), stopped_elsewhere);
    }

    #[test]
    fn tick_ignores_its_own_writes() {
        let mut c = clock();
        c.start();
        for _ in 0..3 {
            c.time.advance_ms(1_000);
            assert!(c.tick().is_none());
        }
        assert_eq!(c.remaining_secs(), 864_000 - 3);
        assert!(c.is_running());
    }

    #[test]
    fn reconcile_catches_up_with_wall_clock() {
        let mut c = clock();
        let persisted = TimerState {
            starting_stage: Stage::MIN,
            remaining_secs: 864_000,
            running: true,
            started_at_epoch_ms: Some(T0),
            remaining_at_start_secs: None,
        };
        let event = c.reconcile_on_load(T0 + 100_000_000, persisted);
        assert_eq!(c.remaining_secs(), 764_000);
        assert_eq!(c.current_stage(), stage(2));
        assert!(c.is_running());
        assert_eq!(c.state().started_at_epoch_ms, Some(T0));
        assert!(matches!(event, Some(Event::ClockResumed { elapsed_secs: 100_000, .. })));
    }

    #[test]
    fn reconcile_does_not_count_ticks_twice() {
        let mut c = clock();
        c.start();
        for _ in 0..100 {
            c.time.advance_ms(1_000);
            c.tick();
        }
        let persisted = stored(&c);
        assert_eq!(persisted.remaining_secs, 863_900);

        let mut reloaded = clock();
        reloaded.reconcile_on_load(T0 + 130_000, persisted);
        assert_eq!(reloaded.remaining_secs(), 864_000 - 130);
    }

    #[test]
    fn reconcile_past_deadline_ripens() {
        let mut c = clock();
        let persisted = TimerState {
            starting_stage: stage(10),
            remaining_secs: 500,
            running: true,
            started_at_epoch_ms: Some(T0),
            remaining_at_start_secs: None,
        };
        let event = c.reconcile_on_load(T0 + 500_000, persisted);
        assert!(matches!(event, Some(Event::ClockRipened { .. })));
        assert_eq!(c.remaining_secs(), 0);
        assert!(!c.is_running());
        assert_eq!(c.current_stage(), Stage::MAX);
        assert_eq!(c.state().started_at_epoch_ms, None);
    }

    #[test]
    fn reconcile_clamps_clock_skew() {
        let mut c = clock();
        let persisted = TimerState {
            starting_stage: stage(10),
            remaining_secs: 500,
            running: true,
            started_at_epoch_ms: Some(T0),
            remaining_at_start_secs: Some(600),
        };
        c.reconcile_on_load(T0 - 60_000, persisted);
        assert_eq!(c.remaining_secs(), 500);
        assert!(c.is_running());
    }

    #[test]
    fn reconcile_keeps_stopped_state() {
        let mut c = clock();
        let persisted = TimerState {
            remaining_secs: 400_000,
            ..TimerState::at_stage(Stage::MIN)
        };
        assert!(c.reconcile_on_load(T0 + 10_000_000, persisted).is_none());
        assert_eq!(c.remaining_secs(), 400_000);
        assert!(!c.is_running());
    }

    #[test]
    fn reconcile_without_start_instant_loads_stopped() {
        let mut c = clock();
        let persisted = TimerState {
            running: true,
            ..TimerState::at_stage(stage(5))
        };
        assert!(c.reconcile_on_load(T0, persisted).is_none());
        assert!(!c.is_running());
        assert_eq!(c.remaining_secs(), 6 * 86_400);
    }

    #[test]
    fn load_falls_back_to_defaults_on_garbage() {
        let store = MemoryStore::with_entry(KEY, "remaining=12;running=yes");
        let (c, event) = RipenessClock::load(store, ManualTimeSource::new(T0), KEY);
        assert!(event.is_none());
        assert_eq!(*c.state(), TimerState::default());
        assert_eq!(stored(&c), TimerState::default());
    }

    #[test]
    fn load_survives_store_read_failure() {
        struct Broken;
        impl StateStore for Broken {
            fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
                Err(StoreError::Locked)
            }
            fn set(&mut self, _key: &str, _value: &str) -> Result<(), StoreError> {
                Err(StoreError::Locked)
            }
        }
        let (mut c, _) = RipenessClock::load(Broken, ManualTimeSource::new(T0), KEY);
        assert_eq!(*c.state(), TimerState::default());
        assert!(c.start().is_some());
        assert!(c.is_running());
    }

    #[test]
    fn projection_exposes_render_fields() {
        let mut c = clock();
        c.select_stage(stage(8));
        c.start();
        assert_eq!(
            c.projection(),
            Projection {
                remaining_secs: 3 * 86_400,
                current_stage: stage(8),
                running: true,
            }
        );
    }

    #[test]
    fn snapshot_returns_valid_event() {
        let c = clock();
        match c.snapshot(DisplayFormat::Clock) {
            Event::StateSnapshot {
                current_stage,
                remaining_secs,
                remaining_display,
                progress_pct,
                running,
                ..
            } => {
                assert_eq!(current_stage, Stage::MIN);
                assert_eq!(remaining_secs, 864_000);
                assert_eq!(remaining_display, "10d 00:00:00");
                assert_eq!(progress_pct, 0.0);
                assert!(!running);
            }
            other => panic!("Expected StateSnapshot, got {other:?}"),
        }
    }
}
