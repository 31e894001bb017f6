use chrono::Local;
use log::{Level, Log, Metadata, Record, SetLoggerError};
use serde::Serialize;
use std::io::Write;

/// Environment variable that selects the JSON-lines logger
pub const LOG_FORMAT_ENV: &str = "BLE_LOCK_LOG_FORMAT";

#[derive(Debug, Serialize, Clone)]
pub struct LogMessage {
    level: String,
    target: String,
    message: String,
    timestamp: String,
}

impl LogMessage {
    fn from_record(record: &Record) -> Self {
        Self {
            level: record.level().to_string(),
            target: record.target().to_string(),
            message: record.args().to_string(),
            timestamp: Local::now().to_rfc3339(),
        }
    }
}

/// Writes one JSON object per record to stderr
pub struct JsonLogger {
    level: Level,
}

impl JsonLogger {
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    pub fn init(level: Level) -> Result<(), SetLoggerError> {
        let logger: &'static JsonLogger = Box::leak(Box::new(JsonLogger::new(level)));
        log::set_logger(logger).map(|()| log::set_max_level(level.to_level_filter()))
    }
}

impl Log for JsonLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        match serde_json::to_string(&LogMessage::from_record(record)) {
            Ok(line) => {
                let _ = writeln!(std::io::stderr().lock(), "{}", line);
            }
            Err(e) => eprintln!("Failed to serialize log message: {}", e),
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

/// Installs the JSON logger when requested, otherwise (or if that fails) `env_logger`
pub fn setup_logging() {
    let json = std::env::var(LOG_FORMAT_ENV)
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json && JsonLogger::init(Level::Info).is_ok() {
        log::info!("JSON logging initialized");
        return;
    }

    // `try_init` so a second call (e.g. from tests) is harmless
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
    log::info!("Logging initialized");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_message_serializes_all_fields() {
        let json = serde_json::to_value(LogMessage::from_record(
            &Record::builder()
                .level(Level::Warn)
                .target("ble_lock_central_lib::core")
                .args(format_args!("link lost"))
                .build(),
        ))
        .unwrap();
        assert_eq!(json["level"], "WARN");
        assert_eq!(json["target"], "ble_lock_central_lib::core");
        assert_eq!(json["message"], "link lost");
        assert!(json["timestamp"].as_str().is_some());
    }

    #[test]
    fn logger_respects_level() {
        let logger = JsonLogger::new(Level::Info);
        let debug = Metadata::builder().level(Level::Debug).build();
        let error = Metadata::builder().level(Level::Error).build();
        assert!(!logger.enabled(&debug));
        assert!(logger.enabled(&error));
    }
}
