use banana_timer_core::storage::open_clock;
use banana_timer_core::{ClockDriver, Command, Config, Event, PersistentClock, Stage};
use tokio::sync::mpsc;

type CliResult = Result<(), Box<dyn std::error::Error>>;

fn load(config: &Config) -> Result<PersistentClock, Box<dyn std::error::Error>> {
    let (clock, reconciled) = open_clock(config)?;
    if let Some(event) = reconciled {
        tracing::info!(?event, "reconciled persisted state");
    }
    Ok(clock)
}

/// Print the transition event, or the current snapshot when nothing changed.
fn print_outcome(config: &Config, clock: &PersistentClock, event: Option<Event>) -> CliResult {
    let event = event.unwrap_or_else(|| clock.snapshot(config.display.format));
    println!("{}", serde_json::to_string_pretty(&event)?);
    Ok(())
}

pub fn select(config: &Config, stage: i64) -> CliResult {
    let stage = Stage::new(stage)?;
    let mut clock = load(config)?;
    let event = clock.select_stage(stage);
    print_outcome(config, &clock, event)
}

pub fn start(config: &Config) -> CliResult {
    let mut clock = load(config)?;
    let event = clock.start();
    print_outcome(config, &clock, event)
}

pub fn stop(config: &Config) -> CliResult {
    let mut clock = load(config)?;
    let event = clock.stop();
    print_outcome(config, &clock, event)
}

pub fn reset(config: &Config) -> CliResult {
    let mut clock = load(config)?;
    let event = clock.reset();
    print_outcome(config, &clock, event)
}

pub fn status(config: &Config) -> CliResult {
    let clock = load(config)?;
    print_outcome(config, &clock, None)
}

fn print_line(event: &Event) {
    match serde_json::to_string(event) {
        Ok(line) => println!("{line}"),
        Err(e) => tracing::warn!("could not encode event: {e}"),
    }
}

/// Run the live one-second loop until the clock stops or Ctrl-C.
///
/// A stopped clock is started first; events are printed one JSON object per
/// line, followed by a final snapshot.
pub fn watch(config: &Config, keep_alive: bool) -> CliResult {
    let mut clock = load(config)?;
    if let Some(event) = clock.start() {
        print_line(&event);
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let (tx, rx) = mpsc::channel(4);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = tx.send(Command::Shutdown).await;
            }
        });

        let exit_when_stopped = config.watch.exit_when_stopped && !keep_alive;
        let clock = ClockDriver::new(clock)
            .exit_when_stopped(exit_when_stopped)
            .run(rx, print_line)
            .await;

        println!("{}", serde_json::to_string(&clock.snapshot(config.display.format))?);
        Ok::<_, Box<dyn std::error::Error>>(())
    })
}
