//! Kommandozeilen-Argumente

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use hushwire_denoise::{GainStrategy, SuppressionConfig, SuppressionLevel};

use crate::config::CliConfig;

/// Voreinstellung der Unterdrueckung
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LevelArg {
    Low,
    Medium,
    High,
}

impl From<LevelArg> for SuppressionLevel {
    fn from(level: LevelArg) -> Self {
        match level {
            LevelArg::Low => SuppressionLevel::Low,
            LevelArg::Medium => SuppressionLevel::Medium,
            LevelArg::High => SuppressionLevel::High,
        }
    }
}

/// Gain-Strategie
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StrategyArg {
    Gate,
    SpectralSubtraction,
    Wiener,
}

impl From<StrategyArg> for GainStrategy {
    fn from(strategy: StrategyArg) -> Self {
        match strategy {
            StrategyArg::Gate => GainStrategy::Gate,
            StrategyArg::SpectralSubtraction => GainStrategy::SpectralSubtraction,
            StrategyArg::Wiener => GainStrategy::Wiener,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "hushwire",
    version,
    about = "Rauschunterdrueckung fuer WAV-Dateien (spektrale Subtraktion mit VAD)"
)]
pub struct Args {
    /// Eingabe (WAV, beliebige Kanalanzahl)
    pub input: PathBuf,

    /// Ausgabe (WAV, Mono, 32-bit Float)
    pub output: PathBuf,

    /// Konfigurationsdatei (TOML), fehlt sie gelten Standardwerte
    #[arg(long, short, default_value = "hushwire.toml")]
    pub config: PathBuf,

    /// Voreinstellung, ueberschreibt beta und Floors aus der Datei
    #[arg(long, value_enum)]
    pub level: Option<LevelArg>,

    /// Gain-Strategie
    #[arg(long, value_enum)]
    pub strategy: Option<StrategyArg>,

    /// Oversubtraction-Faktor beta
    #[arg(long)]
    pub oversubtraction: Option<f32>,

    /// Transienten-Daempfung aktivieren
    #[arg(long)]
    pub transient: bool,

    /// Blockgroesse der simulierten Capture-Callbacks
    #[arg(long, default_value_t = 480)]
    pub block_size: usize,

    /// Log-Level (trace/debug/info/warn/error)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log-Format (text/json)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Session-Statistiken als JSON auf stdout ausgeben
    #[arg(long)]
    pub stats_json: bool,
}

impl Args {
    /// Uebertraegt Kommandozeilen-Werte in die geladene Konfiguration
    pub fn anwenden(&self, config: &mut CliConfig) {
        if let Some(level) = self.level {
            let preset = SuppressionConfig::for_level(level.into());
            let s = &mut config.suppression;
            s.oversubtraction_factor = preset.oversubtraction_factor;
            s.spectral_floor = preset.spectral_floor;
            s.voice_floor = preset.voice_floor;
        }
        if let Some(strategy) = self.strategy {
            config.suppression.strategy = strategy.into();
        }
        if let Some(beta) = self.oversubtraction {
            config.suppression.oversubtraction_factor = beta;
        }
        if self.transient {
            config.suppression.transient.enabled = true;
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.logging.format = format.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimale_argumente() {
        let args = Args::try_parse_from(["hushwire", "ein.wav", "aus.wav"]).unwrap();
        assert_eq!(args.input, PathBuf::from("ein.wav"));
        assert_eq!(args.block_size, 480);
        assert_eq!(args.config, PathBuf::from("hushwire.toml"));
        assert!(!args.stats_json);
    }

    #[test]
    fn ausgabe_fehlt() {
        assert!(Args::try_parse_from(["hushwire", "ein.wav"]).is_err());
    }

    #[test]
    fn argumente_ueberschreiben_datei() {
        let args = Args::try_parse_from([
            "hushwire",
            "ein.wav",
            "aus.wav",
            "--level",
            "high",
            "--strategy",
            "wiener",
            "--transient",
            "--log-format",
            "json",
        ])
        .unwrap();
        let mut config = CliConfig::default();
        args.anwenden(&mut config);
        assert_eq!(config.suppression.oversubtraction_factor, 3.0);
        assert_eq!(config.suppression.spectral_floor, 0.002);
        assert_eq!(config.suppression.strategy, GainStrategy::Wiener);
        assert!(config.suppression.transient.enabled);
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn beta_nach_level() {
        let args = Args::try_parse_from([
            "hushwire",
            "ein.wav",
            "aus.wav",
            "--level",
            "low",
            "--oversubtraction",
            "2.5",
        ])
        .unwrap();
        let mut config = CliConfig::default();
        args.anwenden(&mut config);
        assert_eq!(config.suppression.oversubtraction_factor, 2.5);
        assert_eq!(config.suppression.voice_floor, 0.8);
    }

    #[test]
    fn ungueltiges_log_level_wird_abgelehnt() {
        let args = Args::try_parse_from([
            "hushwire",
            "ein.wav",
            "aus.wav",
            "--log-level",
            "laut",
        ])
        .unwrap();
        let mut config = CliConfig::default();
        args.anwenden(&mut config);
        assert!(config.logging.pruefen().is_err());
    }

    #[test]
    fn strategie_schreibweise() {
        let args = Args::try_parse_from([
            "hushwire",
            "a.wav",
            "b.wav",
            "--strategy",
            "spectral-subtraction",
        ])
        .unwrap();
        assert_eq!(args.strategy, Some(StrategyArg::SpectralSubtraction));
    }
}
