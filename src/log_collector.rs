//! Logging pipeline for audit runs.
//!
//! # Architecture
//!
//! ```text
//! log::info!() / log::warn!() ...
//!     |
//! [LogCollector] (log::Log)
//!     |             \
//!   stderr      (crossbeam channel)
//!                     |
//!               [writer thread]
//!                     |
//!          <log_dir>/audit-<ts>.log
//! ```
//!
//! Diagnostics never reach stdout, which carries only the audit output.
//! `flush()` sends a marker down the channel and blocks until the writer has
//! synced everything queued before it.

use chrono::Local;
use crossbeam_channel::{unbounded, Sender};
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Crate target prefix; other targets are only shown at info and above.
const OWN_TARGET: &str = "jobboard_audit";

/// Internal log line or special marker
enum LogMessage {
    Line(String),
    /// Flush marker with channel sender to signal completion
    Flush(std::sync::mpsc::Sender<()>),
}

/// `log` backend writing to stderr and, optionally, to a session file.
pub struct LogCollector {
    level: LevelFilter,
    /// Channel to the file writer thread, absent without a log directory
    tx: Option<Sender<LogMessage>>,
    log_path: Option<PathBuf>,
}

impl LogCollector {
    /// Create a collector; with `log_dir`, also start the file writer thread.
    pub fn new(level: LevelFilter, log_dir: Option<&Path>) -> io::Result<Self> {
        let Some(dir) = log_dir else {
            return Ok(LogCollector {
                level,
                tx: None,
                log_path: None,
            });
        };

        fs::create_dir_all(dir)?;
        let log_path = dir.join(format!(
            "audit-{}.log",
            Local::now().format("%Y%m%d_%H%M%S")
        ));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;

        let (tx, rx) = unbounded::<LogMessage>();
        std::thread::spawn(move || {
            let mut file: File = file;
            while let Ok(msg) = rx.recv() {
                match msg {
                    LogMessage::Line(line) => {
                        if let Err(e) = writeln!(file, "{}", line) {
                            eprintln!("[Log] Failed to write log file: {}", e);
                        }
                    }
                    LogMessage::Flush(done) => {
                        let _ = file.flush();
                        let _ = file.sync_data();
                        let _ = done.send(());
                    }
                }
            }
        });

        Ok(LogCollector {
            level,
            tx: Some(tx),
            log_path: Some(log_path),
        })
    }

    /// Session log file, when a log directory was configured
    pub fn log_path(&self) -> Option<&Path> {
        self.log_path.as_deref()
    }

    pub fn level(&self) -> LevelFilter {
        self.level
    }

    /// Format: `[HH:MM:SS.mmm] [LEVEL] message`
    pub fn format_line(record: &Record) -> String {
        format!(
            "[{}] [{}] {}",
            Local::now().format("%H:%M:%S%.3f"),
            record.level(),
            record.args()
        )
    }

    /// Block until every line queued before this call is on disk.
    pub fn wait_for_empty(&self) -> Result<(), String> {
        let Some(tx) = &self.tx else {
            return Ok(());
        };
        let (done_tx, done_rx) = std::sync::mpsc::channel::<()>();
        tx.send(LogMessage::Flush(done_tx))
            .map_err(|e| format!("Failed to send flush marker: {}", e))?;
        done_rx
            .recv()
            .map_err(|e| format!("Flush signal interrupted: {}", e))
    }

    /// Install as the global logger.
    pub fn init(self) -> Result<&'static LogCollector, SetLoggerError> {
        let level = self.level;
        let collector: &'static LogCollector = Box::leak(Box::new(self));
        log::set_logger(collector)?;
        log::set_max_level(level);
        Ok(collector)
    }
}

impl Log for LogCollector {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
            && (metadata.level() <= log::Level::Info || metadata.target().starts_with(OWN_TARGET))
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = Self::format_line(record);
        eprintln!("{}", line);
        if let Some(tx) = &self.tx {
            let _ = tx.send(LogMessage::Line(line));
        }
    }

    fn flush(&self) {
        if let Err(e) = self.wait_for_empty() {
            eprintln!("[Log] {}", e);
        }
    }
}
