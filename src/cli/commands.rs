use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::core::{
    db::TagDatabase,
    driver::default_library_path,
    poller::{spawn_reader_thread, PollerConfig, ReaderEvent},
};

#[derive(Parser)]
#[command(name = "rfid-tag-reader")]
#[command(about = "Desktop utility for monitoring USB RFID readers")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the tag database file
    #[arg(long, global = true, default_value = "tags.db")]
    pub database: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub debug: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Poll the reader and print tags as they are seen
    Monitor {
        /// Path to the vendor driver library (defaults to SWHidApi next to the binary)
        #[arg(short, long)]
        library: Option<PathBuf>,

        /// Stop after this many seconds (default: run until interrupted)
        #[arg(short = 't', long)]
        duration: Option<u64>,

        /// Poll interval in milliseconds
        #[arg(long, default_value_t = 100)]
        interval: u64,

        /// Reader identifier stored with each tag
        #[arg(long, default_value = "default")]
        reader_id: String,
    },

    /// List stored tags
    Tags {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,

        /// Limit the number of tags shown
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show recent readings for one tag
    Readings {
        /// Tag identifier (uppercase hex)
        tag_id: String,

        /// Maximum number of readings to show
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },

    /// Show database statistics
    Stats,

    /// Export stored tags as JSON
    Export {
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Remove all stored tags and readings
    Clear {
        /// Skip the confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },
}

#[derive(Clone, Debug)]
pub enum OutputFormat {
    Table,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Invalid format: {s}")),
        }
    }
}

pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.debug {
        log::LevelFilter::Debug
    } else if cli.verbose {
        log::LevelFilter::Info
    } else {
        log::LevelFilter::Warn
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    match cli.command {
        Commands::Monitor {
            library,
            duration,
            interval,
            reader_id,
        } => cmd_monitor(&cli.database, library, duration, interval, &reader_id),
        Commands::Tags { format, limit } => cmd_tags(&cli.database, format, limit),
        Commands::Readings { tag_id, limit } => cmd_readings(&cli.database, &tag_id, limit),
        Commands::Stats => cmd_stats(&cli.database),
        Commands::Export { output } => cmd_export(&cli.database, output.as_deref()),
        Commands::Clear { yes } => cmd_clear(&cli.database, yes),
    }
}

fn cmd_monitor(
    database: &PathBuf,
    library: Option<PathBuf>,
    duration: Option<u64>,
    interval: u64,
    reader_id: &str,
) -> Result<()> {
    let mut config = PollerConfig::new(
        library.unwrap_or_else(default_library_path),
        database.clone(),
    );
    config.reader_id = reader_id.to_string();
    config.poll_interval = Duration::from_millis(interval);

    println!("Monitoring reader (database: {})", database.display());

    let (tx, rx) = mpsc::channel();
    let stop = Arc::new(AtomicBool::new(false));
    let handle = spawn_reader_thread(config, tx, Arc::clone(&stop));

    let deadline = duration.map(|secs| Instant::now() + Duration::from_secs(secs));
    let mut failure: Option<String> = None;

    loop {
        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                stop.store(true, Ordering::Relaxed);
            }
        }

        match rx.recv_timeout(Duration::from_millis(200)) {
            Ok(ReaderEvent::Status(message)) => {
                println!("[status] {message}");
                if message.starts_with("Failed") || message == "No USB device detected" {
                    failure = Some(message);
                }
            }
            Ok(ReaderEvent::NewTag(read)) => {
                println!(
                    "NEW  {}  time={}  signal={}  antenna={}",
                    read.tag_id,
                    read.timestamp_string(),
                    read.signal_display(),
                    read.antenna
                );
            }
            Ok(ReaderEvent::TagSeen(read)) => {
                println!(
                    "SEEN {}  time={}  signal={}",
                    read.tag_id,
                    read.timestamp_string(),
                    read.signal_display()
                );
            }
            Ok(ReaderEvent::TagCount(count)) => {
                println!("[count] {count} unique tag(s)");
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                if handle.is_finished() {
                    break;
                }
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }

    let _ = handle.join();

    if let Some(message) = failure {
        bail!("{message}");
    }
    println!("Monitoring stopped.");
    Ok(())
}

fn cmd_tags(database: &PathBuf, format: OutputFormat, limit: Option<usize>) -> Result<()> {
    let db = TagDatabase::open(database)?;
    let mut tags = db.all_tags()?;
    if let Some(limit) = limit {
        tags.truncate(limit);
    }

    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&tags).context("Failed to serialize tags")?
            );
        }
        OutputFormat::Table => {
            if tags.is_empty() {
                println!("No tags stored.");
                return Ok(());
            }
            println!(
                "{:<28} {:<24} {:<24} {:>8}  {:>7}",
                "Tag ID", "First Seen", "Last Seen", "Signal", "Antenna"
            );
            for tag in &tags {
                println!(
                    "{:<28} {:<24} {:<24} {:>7.1}%  {:>7}",
                    tag.tag_id, tag.first_seen, tag.last_seen, tag.rssi_percent, tag.antenna
                );
            }
            println!();
            println!("{} tag(s)", tags.len());
        }
    }

    Ok(())
}

fn cmd_readings(database: &PathBuf, tag_id: &str, limit: usize) -> Result<()> {
    let db = TagDatabase::open(database)?;
    let readings = db.readings_for(tag_id, limit)?;

    if readings.is_empty() {
        println!("No readings stored for tag {tag_id}.");
        return Ok(());
    }

    println!("Readings for {tag_id} (newest first):");
    for reading in &readings {
        println!(
            "  {}  signal={:.1}%  antenna={}",
            reading.seen_at, reading.rssi_percent, reading.antenna
        );
    }

    Ok(())
}

fn cmd_stats(database: &PathBuf) -> Result<()> {
    let db = TagDatabase::open(database)?;
    println!("Database: {}", database.display());
    println!("Unique tags: {}", db.tag_count()?);
    Ok(())
}

fn cmd_export(database: &PathBuf, output: Option<&std::path::Path>) -> Result<()> {
    let db = TagDatabase::open(database)?;
    let json = db.export_json()?;

    match output {
        Some(path) => {
            std::fs::write(path, &json)
                .with_context(|| format!("Failed to write export to {}", path.display()))?;
            println!("Exported {} tag(s) to {}", db.tag_count()?, path.display());
        }
        None => println!("{json}"),
    }

    Ok(())
}

fn cmd_clear(database: &PathBuf, yes: bool) -> Result<()> {
    if !yes {
        print!("Clear all tag data from {}? This cannot be undone. [y/N] ", database.display());
        io::stdout().flush().context("Failed to flush stdout")?;

        let mut input = String::new();
        io::stdin()
            .lock()
            .read_line(&mut input)
            .context("Failed to read confirmation")?;

        if !matches!(input.trim().to_lowercase().as_str(), "y" | "yes") {
            println!("Aborted.");
            return Ok(());
        }
    }

    let mut db = TagDatabase::open(database)?;
    db.clear()?;
    println!("Database cleared.");
    Ok(())
}
