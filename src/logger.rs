//! Global Logger Module
//!
//! Uniform `source`-tagged logging for the whole service. Records are handed to
//! a background thread over a channel and written to stderr in batches so the
//! request path never blocks on the terminal.

use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{mpsc, Once, RwLock};
use std::time::{Duration, Instant};

static INIT: Once = Once::new();

static MIN_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Info as u8);

#[derive(Debug, Clone)]
struct LogMessage {
    timestamp: chrono::DateTime<chrono::Utc>,
    level: LogLevel,
    source: String,
    message: String,
    metadata: Option<String>,
}

static LOG_SENDER: RwLock<Option<mpsc::Sender<LogMessage>>> = RwLock::new(None);

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug = 0,
    Info = 1,
    Warn = 2,
    Error = 3,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "debug" | "trace" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            0 => LogLevel::Debug,
            1 => LogLevel::Info,
            2 => LogLevel::Warn,
            _ => LogLevel::Error,
        }
    }
}

/// Start the writer thread and set the minimum level. Later calls only
/// adjust the level.
pub fn init(level: &str) {
    let min = LogLevel::from_str(level).unwrap_or(LogLevel::Info);
    MIN_LEVEL.store(min as u8, Ordering::Relaxed);
    INIT.call_once(spawn_batch_writer);
}

pub fn min_level() -> LogLevel {
    LogLevel::from_u8(MIN_LEVEL.load(Ordering::Relaxed))
}

fn spawn_batch_writer() {
    let (tx, rx) = mpsc::channel::<LogMessage>();

    if let Ok(mut sender) = LOG_SENDER.write() {
        *sender = Some(tx);
    }

    std::thread::spawn(move || {
        let mut buffer = Vec::with_capacity(100);
        let mut last_flush = Instant::now();
        let flush_interval = Duration::from_secs(1);

        loop {
            let timeout = flush_interval
                .checked_sub(last_flush.elapsed())
                .unwrap_or_else(|| Duration::from_secs(0));

            match rx.recv_timeout(timeout) {
                Ok(msg) => {
                    buffer.push(msg);
                    if buffer.len() >= 100 || last_flush.elapsed() >= flush_interval {
                        flush_logs(&mut buffer);
                        last_flush = Instant::now();
                    }
                }
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    if !buffer.is_empty() {
                        flush_logs(&mut buffer);
                    }
                    last_flush = Instant::now();
                }
                Err(mpsc::RecvTimeoutError::Disconnected) => break,
            }
        }

        if !buffer.is_empty() {
            flush_logs(&mut buffer);
        }
    });
}

fn flush_logs(buffer: &mut Vec<LogMessage>) {
    let stderr = std::io::stderr();
    let mut out = stderr.lock();
    for msg in buffer.drain(..) {
        let _ = writeln!(out, "{}", format_line(&msg));
    }
    let _ = out.flush();
}

fn format_line(msg: &LogMessage) -> String {
    let mut line = format!(
        "{} {:<5} [{}] {}",
        msg.timestamp.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        msg.level.as_str().to_uppercase(),
        msg.source,
        msg.message
    );
    if let Some(meta) = &msg.metadata {
        line.push(' ');
        line.push_str(meta);
    }
    line
}

fn log_internal(level: LogLevel, source: &str, message: &str, metadata: Option<&str>) {
    if level < min_level() {
        return;
    }
    let msg = LogMessage {
        timestamp: chrono::Utc::now(),
        level,
        source: source.to_string(),
        message: message.to_string(),
        metadata: metadata.map(|s| s.to_string()),
    };

    let sender = LOG_SENDER.read().ok().and_then(|s| s.clone());
    match sender {
        Some(sender) => {
            if let Err(mpsc::SendError(msg)) = sender.send(msg) {
                eprintln!("{}", format_line(&msg));
            }
        }
        // Not initialised (tests, early start-up): write directly.
        None => eprintln!("{}", format_line(&msg)),
    }
}

pub fn debug(source: &str, message: &str) {
    log_internal(LogLevel::Debug, source, message, None);
}

pub fn info(source: &str, message: &str) {
    log_internal(LogLevel::Info, source, message, None);
}

pub fn warn(source: &str, message: &str) {
    log_internal(LogLevel::Warn, source, message, None);
}

pub fn error(source: &str, message: &str) {
    log_internal(LogLevel::Error, source, message, None);
}

/// Log with trailing `key=value` metadata, e.g. a request id.
pub fn log_with_metadata(level: LogLevel, source: &str, message: &str, metadata: Option<&str>) {
    log_internal(level, source, message, metadata);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn level_parsing() {
        assert_eq!(LogLevel::from_str("DEBUG"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::from_str(" warning "), Some(LogLevel::Warn));
        assert_eq!(LogLevel::from_str("loud"), None);
        assert!(LogLevel::Debug < LogLevel::Error);
    }

    #[test]
    fn line_format() {
        let msg = LogMessage {
            timestamp: chrono::Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap(),
            level: LogLevel::Warn,
            source: "analyze".to_string(),
            message: "no api key".to_string(),
            metadata: Some("request_id=abc".to_string()),
        };
        assert_eq!(
            format_line(&msg),
            "2026-01-02T03:04:05.000Z WARN  [analyze] no api key request_id=abc"
        );
    }
}
