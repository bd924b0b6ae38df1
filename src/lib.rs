/// RFID Tag Reader - desktop utility for monitoring USB RFID readers
///
/// This library provides both CLI and GUI interfaces for polling a
/// vendor-driver-attached RFID reader and persisting tag history to SQLite.
pub mod cli;
pub mod core;
pub mod gui;

// Re-export commonly used types
pub use crate::core::{
    db::{RecordOutcome, TagDatabase, TagRecord},
    driver::{DriverError, HidDriver, TagSource},
    poller::ReaderEvent,
    tags::{signal_percent, TagRead},
};

// Common error type
pub type Result<T> = anyhow::Result<T>;
