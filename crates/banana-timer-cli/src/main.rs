use banana_timer_core::Config;
use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "banana-timer", version, about = "Watch a banana ripen, one stage per day")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pick a ripeness stage (1-11); a running countdown restarts from it
    Select {
        /// Stage number, 1 (green) to 11 (ripe)
        stage: i64,
    },
    /// Start the countdown
    Start,
    /// Stop the countdown, keeping the remaining time
    Stop,
    /// Stop and go back to stage 1
    Reset,
    /// Print current clock state as JSON
    Status,
    /// Run the countdown live, printing every event
    Watch {
        /// Keep running after the countdown stops
        #[arg(long)]
        keep_alive: bool,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Print a shell completion script
    Completions {
        shell: clap_complete::Shell,
    },
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log.level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    let (config, config_error) = match Config::load() {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };
    init_tracing(&config);
    if let Some(e) = config_error {
        tracing::warn!("using default configuration: {e}");
    }

    let result = match cli.command {
        Commands::Select { stage } => commands::clock::select(&config, stage),
        Commands::Start => commands::clock::start(&config),
        Commands::Stop => commands::clock::stop(&config),
        Commands::Reset => commands::clock::reset(&config),
        Commands::Status => commands::clock::status(&config),
        Commands::Watch { keep_alive } => commands::clock::watch(&config, keep_alive),
        Commands::Config { action } => commands::config::run(action),
        Commands::Completions { shell } => {
            let mut stdout = std::io::stdout();
            clap_complete::generate(shell, &mut Cli::command(), "banana-timer", &mut stdout);
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
