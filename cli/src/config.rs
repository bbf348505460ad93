//! CLI-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass das Werkzeug ohne Konfigurationsdatei
//! lauffaehig ist.

use std::path::Path;

use anyhow::bail;
use hushwire_denoise::SuppressionConfig;
use serde::{Deserialize, Serialize};

use crate::logging::{log_format_gueltig, log_level_gueltig};

/// Vollstaendige CLI-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Parameter der Rauschunterdrueckung
    pub suppression: SuppressionConfig,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level (trace/debug/info/warn/error)
    pub level: String,
    /// Format (text/json)
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl LoggingEinstellungen {
    /// Lehnt unbekannte Level und Formate ab
    pub fn pruefen(&self) -> anyhow::Result<()> {
        if !log_level_gueltig(&self.level) {
            bail!(
                "Ungueltiges Log-Level '{}' (erlaubt: trace, debug, info, warn, error)",
                self.level
            );
        }
        if !log_format_gueltig(&self.format) {
            bail!("Ungueltiges Log-Format '{}' (erlaubt: text, json)", self.format);
        }
        Ok(())
    }
}

impl CliConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    ///
    /// Fehlt die Datei, werden Standardwerte verwendet.
    pub fn laden(pfad: &Path) -> anyhow::Result<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => {
                let config: Self = toml::from_str(&inhalt).map_err(|e| {
                    anyhow::anyhow!("Konfigurationsfehler in '{}': {e}", pfad.display())
                })?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = %pfad.display(),
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "Konfigurationsdatei '{}' nicht lesbar: {e}",
                pfad.display()
            )),
        }
    }
}
