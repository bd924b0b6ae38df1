use crate::core::db::{RecordOutcome, TagDatabase};
use crate::core::driver::{HidDriver, TagSource};
use crate::core::tags::TagRead;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Interval between driver polls
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Events forwarded from the reader thread to the consumer
#[derive(Debug, Clone)]
pub enum ReaderEvent {
    /// Human-readable reader status change
    Status(String),
    /// A tag seen for the first time
    NewTag(TagRead),
    /// A repeated sighting of a known tag
    TagSeen(TagRead),
    /// Updated total of unique tags stored
    TagCount(u64),
}

/// Configuration for the background reader thread
#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub library_path: PathBuf,
    pub database_path: PathBuf,
    pub reader_id: String,
    pub poll_interval: Duration,
}

impl PollerConfig {
    pub fn new(library_path: PathBuf, database_path: PathBuf) -> Self {
        Self {
            library_path,
            database_path,
            reader_id: "default".to_string(),
            poll_interval: POLL_INTERVAL,
        }
    }
}

fn send_status(tx: &Sender<ReaderEvent>, message: impl Into<String>) {
    let message = message.into();
    log::info!("{message}");
    let _ = tx.send(ReaderEvent::Status(message));
}

/// Spawn the background reader thread.
///
/// The thread loads the vendor driver, opens its own database connection and
/// runs the polling loop until the stop flag is set or the receiver is
/// dropped. In GUI mode the flag is never set and the thread is simply
/// abandoned at process exit.
pub fn spawn_reader_thread(
    config: PollerConfig,
    tx: Sender<ReaderEvent>,
    stop: Arc<AtomicBool>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        send_status(&tx, "Initializing reader...");

        let mut driver = match HidDriver::load(&config.library_path) {
            Ok(driver) => driver,
            Err(e) => {
                log::error!("Failed to initialize reader: {e}");
                send_status(&tx, format!("Failed to initialize reader: {e}"));
                return;
            }
        };

        let mut db = match TagDatabase::open(&config.database_path) {
            Ok(db) => db,
            Err(e) => {
                log::error!("Failed to open database: {e}");
                send_status(&tx, format!("Failed to open database: {e}"));
                return;
            }
        };

        run_polling_loop(
            &mut driver,
            &mut db,
            &tx,
            &stop,
            config.poll_interval,
            &config.reader_id,
        );
    })
}

/// Drive a tag source until the stop flag is set or the receiver goes away.
///
/// Initialization failures end the loop after reporting status; transient
/// read failures are logged and polling continues.
pub fn run_polling_loop<S: TagSource>(
    source: &mut S,
    db: &mut TagDatabase,
    tx: &Sender<ReaderEvent>,
    stop: &AtomicBool,
    poll_interval: Duration,
    reader_id: &str,
) {
    match source.device_count() {
        Ok(0) => {
            send_status(tx, "No USB device detected");
            return;
        }
        Ok(count) => send_status(tx, format!("Found {count} USB device(s)")),
        Err(e) => {
            log::error!("Device enumeration failed: {e}");
            send_status(tx, format!("Device enumeration failed: {e}"));
            return;
        }
    }

    if let Err(e) = source.open(0) {
        log::error!("Failed to connect reader: {e}");
        send_status(tx, format!("Failed to connect reader: {e}"));
        return;
    }
    send_status(tx, "Reader connected");

    if let Err(e) = source.start() {
        log::error!("Failed to start reading: {e}");
        send_status(tx, format!("Failed to start reading: {e}"));
        source.shutdown();
        return;
    }
    send_status(tx, "Waiting for tags...");

    while !stop.load(Ordering::Relaxed) {
        match source.poll() {
            Ok(packets) => {
                for packet in &packets {
                    let read = TagRead::from_packet(packet, reader_id);
                    match db.record_read(&read) {
                        Ok(RecordOutcome::New) => {
                            log::info!("New tag detected: {}", read.tag_id);
                            let count = db.tag_count().unwrap_or(0);
                            if tx.send(ReaderEvent::NewTag(read)).is_err()
                                || tx.send(ReaderEvent::TagCount(count)).is_err()
                            {
                                source.shutdown();
                                return;
                            }
                        }
                        Ok(RecordOutcome::Updated) => {
                            log::debug!("Tag seen again: {}", read.tag_id);
                            if tx.send(ReaderEvent::TagSeen(read)).is_err() {
                                source.shutdown();
                                return;
                            }
                        }
                        Err(e) => {
                            log::error!("Failed to record tag {}: {e}", read.tag_id);
                        }
                    }
                }
            }
            Err(e) => {
                log::error!("Error in tag reading loop: {e}");
            }
        }
        thread::sleep(poll_interval);
    }

    source.shutdown();
    send_status(tx, "Reader disconnected");
}
