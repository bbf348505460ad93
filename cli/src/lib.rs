//! hushwire-cli – Offline-Werkzeug fuer die Rauschunterdrueckung
//!
//! Liest eine WAV-Datei, schickt sie blockweise durch eine
//! Suppression-Session und schreibt das Ergebnis latenzbereinigt zurueck.

pub mod args;
pub mod config;
pub mod logging;
pub mod verarbeitung;
pub mod wav;

pub use args::Args;
pub use config::CliConfig;
pub use verarbeitung::datei_verarbeiten;
