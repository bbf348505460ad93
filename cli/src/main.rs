//! Hushwire CLI – Einstiegspunkt
//!
//! Laedt die Konfiguration, initialisiert das Logging und entrauscht eine
//! WAV-Datei.

use anyhow::Result;
use clap::Parser;
use hushwire_cli::logging::logging_initialisieren;
use hushwire_cli::{datei_verarbeiten, Args, CliConfig};

fn main() -> Result<()> {
    let args = Args::parse();

    // Konfiguration laden (Standardwerte falls Datei fehlt)
    let mut config = CliConfig::laden(&args.config)?;
    args.anwenden(&mut config);
    config.logging.pruefen()?;

    logging_initialisieren(&config.logging.level, &config.logging.format);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %args.config.display(),
        "Hushwire wird initialisiert"
    );

    let stats = datei_verarbeiten(&args.input, &args.output, &config.suppression, args.block_size)?;

    if args.stats_json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    }

    Ok(())
}
