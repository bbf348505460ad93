//! Structured Logging Setup via tracing-subscriber
//!
//! Konfigurierbar per Umgebungsvariable:
//! - `HUSHWIRE_LOG_LEVEL`: Log-Level (trace/debug/info/warn/error)
//! - `HUSHWIRE_LOG_FORMAT`: Format (text/json)
//!
//! Die Umgebung hat Vorrang vor Kommandozeile und Konfigurationsdatei.

use tracing_subscriber::{fmt, EnvFilter};

pub const ENV_LOG_LEVEL: &str = "HUSHWIRE_LOG_LEVEL";
pub const ENV_LOG_FORMAT: &str = "HUSHWIRE_LOG_FORMAT";

/// Initialisiert das Logging-System.
///
/// Faellt auf `info` / `text` zurueck falls Level oder Format ungueltig sind.
/// Logs gehen nach stderr, stdout bleibt fuer `--stats-json` frei.
pub fn logging_initialisieren(level: &str, format: &str) {
    let filter = EnvFilter::try_from_env(ENV_LOG_LEVEL)
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let format = std::env::var(ENV_LOG_FORMAT).unwrap_or_else(|_| format.to_string());

    match format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .with_writer(std::io::stderr)
                .init();
        }
        _ => {
            fmt()
                .with_env_filter(filter)
                .with_target(true)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

/// Validiert ob ein Log-Level-String gueltig ist.
pub fn log_level_gueltig(level: &str) -> bool {
    matches!(level, "trace" | "debug" | "info" | "warn" | "error")
}

/// Validiert ob ein Log-Format-String gueltig ist.
pub fn log_format_gueltig(format: &str) -> bool {
    matches!(format, "text" | "json")
}
