//! # Banana Timer Core Library
//!
//! This library provides the core logic for Banana Timer: a countdown that
//! ripens a banana one stage per day, from whichever stage the user picks up
//! to stage 11, and that keeps counting while nobody is watching.
//!
//! ## Architecture
//!
//! - **Ripeness Clock**: a state machine over [`TimerState`]; the caller (or
//!   the [`ClockDriver`]) invokes `tick()` once per second
//! - **Reconciliation**: on load, a running countdown is caught up with the
//!   wall-clock time that passed since it started
//! - **Storage**: a key-value string store (SQLite or in-memory) holding one
//!   JSON record, plus TOML configuration
//!
//! ## Key Components
//!
//! - [`RipenessClock`]: clock state machine
//! - [`ClockDriver`]: tokio-based one-second tick loop
//! - [`Database`]: persistent key-value store
//! - [`Config`]: application configuration management

pub mod clock;
pub mod error;
pub mod events;
pub mod storage;

pub use clock::{
    format_remaining, ClockDriver, Command, DisplayFormat, ManualTimeSource, Projection,
    RipenessClock, Stage, SystemTimeSource, TimeSource, TimerState,
};
pub use error::{ConfigError, CoreError, StoreError, ValidationError};
pub use events::Event;
pub use storage::{open_clock, Config, Database, MemoryStore, PersistentClock, StateStore};
