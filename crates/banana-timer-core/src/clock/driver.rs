//! One-second tick loop around a [`RipenessClock`].
//!
//! The driver is the only place a repeating timer exists. It holds at most
//! one `tokio::time::Interval`; any command that (re)starts the countdown
//! replaces it, and stopping drops it.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

use super::engine::RipenessClock;
use super::stage::Stage;
use super::time::TimeSource;
use crate::events::Event;
use crate::storage::StateStore;

pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Input to a running [`ClockDriver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    SelectStage(Stage),
    Start,
    Stop,
    Reset,
    Shutdown,
}

pub struct ClockDriver<S, T> {
    clock: RipenessClock<S, T>,
    exit_when_stopped: bool,
}

impl<S: StateStore, T: TimeSource> ClockDriver<S, T> {
    pub fn new(clock: RipenessClock<S, T>) -> Self {
        Self {
            clock,
            exit_when_stopped: false,
        }
    }

    /// Return from `run` as soon as the clock is no longer running.
    pub fn exit_when_stopped(mut self, exit: bool) -> Self {
        self.exit_when_stopped = exit;
        self
    }

    /// Drive the clock until `Shutdown`, the command channel closes, or (when
    /// configured) the clock stops. Every event is handed to `sink`.
    ///
    /// Returns the clock in its final state.
    pub async fn run<F>(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut sink: F,
    ) -> RipenessClock<S, T>
    where
        F: FnMut(&Event),
    {
        let mut ticker = self.clock.is_running().then(new_ticker);
        tracing::debug!(running = ticker.is_some(), "clock driver started");

        loop {
            let wake = tokio::select! {
                command = commands.recv() => Wake::Command(command),
                _ = next_tick(&mut ticker) => Wake::Tick,
            };

            match wake {
                Wake::Command(command) => {
                    let event = match command {
                        Some(Command::SelectStage(stage)) => self.clock.select_stage(stage),
                        Some(Command::Start) => self.clock.start(),
                        Some(Command::Stop) => self.clock.stop(),
                        Some(Command::Reset) => self.clock.reset(),
                        Some(Command::Shutdown) | None => break,
                    };
                    if let Some(event) = event {
                        if event.begins_countdown() {
                            ticker = Some(new_ticker());
                        }
                        sink(&event);
                    }
                }
                Wake::Tick => {
                    if let Some(event) = self.clock.tick() {
                        sink(&event);
                    }
                }
            }

            if !self.clock.is_running() {
                ticker = None;
                if self.exit_when_stopped {
                    break;
                }
            }
        }

        tracing::debug!("clock driver finished");
        self.clock
    }
}

enum Wake {
    Command(Option<Command>),
    Tick,
}

fn new_ticker() -> Interval {
    let mut ticker = interval_at(Instant::now() + TICK_PERIOD, TICK_PERIOD);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
