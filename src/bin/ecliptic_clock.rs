//! Ecliptic clock in the terminal
//!
//! Runs the clock engine at its tick rate and prints the ecliptic longitude
//! of every hand, once a second by default.
//!
//! Usage:
//!   cargo run --bin ecliptic-clock -- --data path/to/data [--speed 3600] [--start 1969-07-20T20:17]

use std::path::PathBuf;
use std::thread;

use clap::{ArgAction, Parser};
use ecliptic_clock::clock::speed_preset;
use ecliptic_clock::constants::TAU;
use ecliptic_clock::time::{format_timestamp, parse_datetime};
use ecliptic_clock::{Body, ClockConfig, Frame, Orrery};
use log::{info, LevelFilter, Log, Metadata, Record};

/// Type alias for the error type used throughout this binary
type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

/// Ecliptic clock
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Shows the ecliptic longitude of the Sun, Moon and planets as a running clock",
    long_about = None
)]
struct Args {
    /// Directory or http(s) URL holding the datasets
    #[arg(short, long, env = "ECLIPTIC_CLOCK_DATA")]
    data: Option<String>,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory where downloaded datasets are cached
    #[arg(long, conflicts_with = "no_cache")]
    cache_dir: Option<PathBuf>,

    /// Do not cache downloaded datasets
    #[arg(long, action = ArgAction::SetTrue)]
    no_cache: bool,

    /// Speed multiplier, negative to run backward
    #[arg(short, long, allow_negative_numbers = true, conflicts_with = "preset")]
    speed: Option<f64>,

    /// Speed preset from -4 to 4 (0 is real time)
    #[arg(short, long, allow_negative_numbers = true)]
    preset: Option<i32>,

    /// Start time (YYYY-MM-DD, optionally followed by HH:MM[:SS], UTC)
    #[arg(long)]
    start: Option<String>,

    /// Stop after this many ticks
    #[arg(short, long)]
    frames: Option<u64>,

    /// Print every N ticks
    #[arg(long, default_value_t = 50, value_parser = clap::value_parser!(u64).range(1..))]
    every: u64,

    /// More log output (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

/// Writes log records to stderr
struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("[{:<5} {}] {}", record.level(), record.target(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

/// Log level for a `-v` count
fn verbosity_level(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn init_logging(verbose: u8) {
    // Only fails if a logger is already installed
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(verbosity_level(verbose));
    }
}

/// Build the configuration from the file (if any) and the command line
fn load_config(args: &Args) -> Result<ClockConfig> {
    let mut config = match &args.config {
        Some(path) => ClockConfig::from_json_file(path)?,
        None => ClockConfig::default(),
    };
    if let Some(data) = &args.data {
        config = config.with_data_root(data);
    }
    if let Some(cache_dir) = &args.cache_dir {
        config = config.with_cache_dir(cache_dir);
    }
    if args.no_cache {
        config = config.without_cache();
    }
    config.validate()?;
    Ok(config)
}

/// Hand angle back to ecliptic longitude in degrees, within [0, 360)
fn hand_degrees(angle: f64) -> f64 {
    (-angle).rem_euclid(TAU).to_degrees()
}

fn print_frame(frame: &Frame) {
    let mut line = format!("{}  {:>10}x", format_timestamp(frame.timestamp), frame.speed);
    for body in Body::ALL {
        // Hands hidden at this speed are left out
        if let Some(hand) = frame.hand(body) {
            match hand.longitude {
                Some(angle) => line.push_str(&format!("  {} {:6.2}", body, hand_degrees(angle))),
                None => line.push_str(&format!("  {} {:>6}", body, "--")),
            }
        }
    }
    println!("{}", line);
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = load_config(&args)?;
    let interval = config.tick_interval();
    info!("ticking every {:?} from {}", interval, config.data_root);

    let mut orrery = Orrery::new(config)?;

    if let Some(start) = &args.start {
        orrery.seek(parse_datetime(start)?);
    }

    let speed = match args.preset {
        Some(step) => Some(
            speed_preset(step).ok_or_else(|| format!("speed preset must be -4..=4, got {}", step))?,
        ),
        None => args.speed,
    };
    if let Some(speed) = speed {
        orrery.set_target_speed(speed);
    }

    let mut ticks: u64 = 0;
    loop {
        let frame = orrery.tick();
        if ticks % args.every == 0 {
            print_frame(&frame);
        }
        ticks += 1;

        if args.frames.is_some_and(|limit| ticks >= limit) {
            break;
        }
        thread::sleep(interval);
    }

    for body in Body::ALL {
        if let Some(interpolator) = orrery.interpolator(body) {
            info!("{}: ended on tier {}", body, interpolator.current_tier_name());
        }
    }

    Ok(())
}
