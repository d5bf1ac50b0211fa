//! Keypress Collector CLI
//!
//! Background daemon that buckets key-press tokens into frequency windows.

use clap::Parser;
use crossbeam_channel::bounded;
use keypress_collector::{
    config::{parse_mode, Config},
    persistence::{CachePersister, Ownership, WindowFlusher},
    stats::create_shared_stats,
    Aggregator, FatalError, FifoChannel, Runtime, ShutdownReason, VERSION,
};
use nix::sys::stat::{umask, Mode};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "keypress-collector")]
#[command(version = VERSION)]
#[command(about = "Counts key presses into fixed-size windows and writes each full window to disk", long_about = None)]
struct Cli {
    /// How many keypresses to accumulate within a single window before creating a new window
    #[arg(long, env = "MAX_KEYPRESSES_PER_WINDOW", default_value_t = 100_000)]
    max_keypresses_per_window: u64,

    /// Path to the FIFO; will be created if it does not exist
    #[arg(long, env = "FIFO_PATH", default_value = "/run/kmonad-keylogger.sock")]
    fifo_path: PathBuf,

    /// Group to set on the FIFO
    #[arg(long, env = "FIFO_GROUP")]
    fifo_group: Option<String>,

    /// Permissions for the FIFO (octal)
    #[arg(long, env = "FIFO_MODE", default_value = "0620", value_parser = parse_mode)]
    fifo_mode: u32,

    /// File used to cache the open window until it is full
    #[arg(
        long = "cache-file",
        env = "CACHE_FILE",
        default_value = "/var/cache/kmonad-keylogger/partial_map.json"
    )]
    cache_file_path: PathBuf,

    /// How often to write to the cache file (at least 5s)
    #[arg(
        long = "cache-write-frequency",
        env = "CACHE_WRITE_FREQUENCY",
        default_value = "30s",
        value_parser = humantime::parse_duration
    )]
    cache_write_interval: Duration,

    /// Directory to write full window data files into
    #[arg(
        long = "destination-dir",
        env = "DESTINATION_DIR",
        default_value = "/var/local/kmonad-keylogger"
    )]
    destination_dir_path: PathBuf,

    /// Group to set on the destination directory and the data files
    #[arg(long, env = "DESTINATION_DIR_GROUP")]
    destination_dir_group: Option<String>,

    /// Permissions for the data files (octal)
    #[arg(
        long = "destination-dir-file-mode",
        env = "DESTINATION_DIR_FILE_MODE",
        default_value = "0440",
        value_parser = parse_mode
    )]
    destination_dir_mode: u32,

    /// Number of tokens buffered between the FIFO reader and the aggregator
    #[arg(long, env = "QUEUE_CAPACITY", default_value_t = 1024)]
    queue_capacity: usize,
}

impl From<Cli> for Config {
    fn from(cli: Cli) -> Self {
        Self {
            max_keypresses_per_window: cli.max_keypresses_per_window,
            fifo_path: cli.fifo_path,
            fifo_group: cli.fifo_group,
            fifo_mode: cli.fifo_mode,
            cache_file_path: cli.cache_file_path,
            cache_write_interval: cli.cache_write_interval,
            destination_dir_path: cli.destination_dir_path,
            destination_dir_group: cli.destination_dir_group,
            destination_dir_mode: cli.destination_dir_mode,
            queue_capacity: cli.queue_capacity,
        }
    }
}

fn main() {
    init_tracing();

    let config = Config::from(Cli::parse());

    match run(&config) {
        Ok(ShutdownReason::Requested) => {
            tracing::info!("Stopped");
        }
        Err(e) => {
            tracing::error!(error = %e, "Fatal error; exiting");
            std::process::exit(1);
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("keypress_collector=debug,info"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Validate, wire the components together and run the control loop.
fn run(config: &Config) -> Result<ShutdownReason, FatalError> {
    config.validate()?;
    let capacity = config.window_capacity()?;

    tracing::info!(
        version = VERSION,
        capacity = capacity.get(),
        interval = ?config.cache_write_interval,
        fifo = %config.fifo_path.display(),
        cache = %config.cache_file_path.display(),
        destination = %config.destination_dir_path.display(),
        "Starting keypress collector"
    );
    if let Ok(json) = serde_json::to_string(config) {
        tracing::debug!(config = %json, "Effective configuration");
    }

    // Configured modes are applied verbatim.
    umask(Mode::empty());

    let mut cache = CachePersister::open(&config.cache_file_path)?;
    let initial = cache.recover();

    let destination = Ownership::resolve(
        config.destination_dir_mode,
        config.destination_dir_group.as_deref(),
    )?;
    let flusher = WindowFlusher::prepare(&config.destination_dir_path, destination)?;

    let fifo_ownership = Ownership::resolve(config.fifo_mode, config.fifo_group.as_deref())?;
    let tokens = FifoChannel::bind(&config.fifo_path, &fifo_ownership)?
        .into_source(config.queue_capacity)
        .into_receiver();

    let ticks = crossbeam_channel::tick(config.cache_write_interval);

    let (shutdown_tx, shutdown_rx) = bounded(1);
    ctrlc::set_handler(move || {
        let _ = shutdown_tx.try_send(());
    })?;

    let stats = create_shared_stats();
    let aggregator = Aggregator::new(capacity, initial, flusher);
    let mut runtime = Runtime::new(aggregator, cache, tokens, ticks, shutdown_rx, stats.clone());

    let result = runtime.run();
    tracing::info!("{}", stats.summary());
    result
}
