mod display;
mod driver;
mod engine;
mod stage;
mod state;
mod time;

pub use display::{format_remaining, DisplayFormat};
pub use driver::{ClockDriver, Command, TICK_PERIOD};
pub use engine::{Projection, RipenessClock};
pub use stage::{stage_for, Stage, SECONDS_PER_STAGE};
pub use state::TimerState;
pub use time::{ManualTimeSource, SystemTimeSource, TimeSource};
