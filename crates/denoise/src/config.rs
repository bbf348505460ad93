//! Konfiguration der Rauschunterdrueckung
//!
//! Wird beim Start einer Session validiert. Alle Felder haben sinnvolle
//! Standardwerte, sodass eine leere TOML-Tabelle eine lauffaehige
//! Konfiguration ergibt.

use std::ops::Range;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::dsp::transient::TransientConfig;
use crate::dsp::vad::VadConfig;
use crate::error::{ConfigError, ConfigResult};

/// Unterstuetzte Abtastraten in Hz (48000 empfohlen)
pub const SUPPORTED_SAMPLE_RATES: [u32; 6] = [8000, 16000, 24000, 32000, 44100, 48000];

pub const MIN_FRAME_SIZE: usize = 64;
pub const MAX_FRAME_SIZE: usize = 16384;
pub const MAX_OVERLAP_RATIO: f32 = 0.9;

/// Strategie zur Gain-Berechnung, wird beim Start gewaehlt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GainStrategy {
    /// Reines Gate: Sprache = 1.0, sonst spektraler Floor
    Gate,
    /// Spektrale Subtraktion mit Oversubtraction ohne Sprache
    #[default]
    SpectralSubtraction,
    /// Wiener-Gain aus der geschaetzten a-priori SNR
    Wiener,
}

/// Voreinstellung fuer die Staerke der Unterdrueckung
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuppressionLevel {
    /// Leichte Reduzierung, Sprache bleibt nahezu unangetastet
    Low,
    #[default]
    Medium,
    /// Aggressive Reduzierung
    High,
}

impl SuppressionLevel {
    /// Oversubtraction-Faktor (beta)
    pub fn oversubtraction(&self) -> f32 {
        match self {
            Self::Low => 1.5,
            Self::Medium => 2.0,
            Self::High => 3.0,
        }
    }

    /// Minimaler Gain ohne Sprache
    pub fn spectral_floor(&self) -> f32 {
        match self {
            Self::Low => 0.05,
            Self::Medium => 0.02,
            Self::High => 0.002,
        }
    }

    /// Minimaler Gain waehrend Sprache (Verstaendlichkeit)
    pub fn voice_floor(&self) -> f32 {
        match self {
            Self::Low => 0.8,
            Self::Medium => 0.3,
            Self::High => 0.1,
        }
    }
}

/// Vollstaendige Konfiguration einer Suppression-Session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuppressionConfig {
    /// Abtastrate in Hz
    pub sample_rate: u32,
    /// Analyse-Frame-Groesse F (Zweierpotenz)
    pub frame_size: usize,
    /// Overlap-Verhaeltnis, Hop H = F * (1 - overlap)
    pub overlap_ratio: f32,
    /// Oversubtraction-Faktor beta (>= 1)
    pub oversubtraction_factor: f32,
    /// Minimaler Gain ohne Sprache
    pub spectral_floor: f32,
    /// Minimaler Gain waehrend Sprache
    pub voice_floor: f32,
    /// Maximaler Gain ohne Sprache (deutlich unter 1.0)
    pub nonvoice_ceiling: f32,
    /// Glaettung der Rauschschaetzung (alpha)
    pub noise_smoothing: f32,
    /// Untergrenze der Rauschschaetzung pro Bin
    pub noise_floor: f32,
    /// Dauer der Lernphase in Frames
    pub learning_frames: u32,
    /// Zeitliche Gain-Glaettung pro Bin (S)
    pub gain_smoothing: f32,
    /// Gain-Strategie
    pub strategy: GainStrategy,
    /// Groesster Block, fuer den beim Start Puffer reserviert werden
    pub max_block_size: usize,
    /// Voice Activity Detection
    pub vad: VadConfig,
    /// Transienten-Daempfung (Tastaturklicks)
    pub transient: TransientConfig,
}

impl Default for SuppressionConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            frame_size: 1024,
            overlap_ratio: 0.75,
            oversubtraction_factor: 2.0,
            spectral_floor: 0.02,
            voice_floor: 0.3,
            nonvoice_ceiling: 0.5,
            noise_smoothing: 0.9,
            noise_floor: 0.002,
            learning_frames: 30,
            gain_smoothing: 0.8,
            strategy: GainStrategy::default(),
            max_block_size: 8192,
            vad: VadConfig::default(),
            transient: TransientConfig::default(),
        }
    }
}

impl SuppressionConfig {
    /// Konfiguration aus einer Voreinstellung
    pub fn for_level(level: SuppressionLevel) -> Self {
        Self {
            oversubtraction_factor: level.oversubtraction(),
            spectral_floor: level.spectral_floor(),
            voice_floor: level.voice_floor(),
            ..Self::default()
        }
    }

    /// Parst eine Konfiguration aus einem TOML-String
    pub fn from_toml_str(inhalt: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(inhalt)?)
    }

    /// Laedt eine Konfiguration aus einer TOML-Datei
    pub fn from_file(pfad: impl AsRef<Path>) -> ConfigResult<Self> {
        let inhalt = std::fs::read_to_string(pfad)?;
        Self::from_toml_str(&inhalt)
    }

    /// Prueft alle Felder und berechnet abgeleitete Groessen
    pub fn validate(&self) -> ConfigResult<ValidatedConfig> {
        if !SUPPORTED_SAMPLE_RATES.contains(&self.sample_rate) {
            return Err(ConfigError::AbtastrateNichtUnterstuetzt(self.sample_rate));
        }
        if !self.frame_size.is_power_of_two() {
            return Err(ConfigError::FrameGroesseKeineZweierpotenz(self.frame_size));
        }
        if !(MIN_FRAME_SIZE..=MAX_FRAME_SIZE).contains(&self.frame_size) {
            return Err(ConfigError::FrameGroesseAusserhalb {
                groesse: self.frame_size,
                min: MIN_FRAME_SIZE,
                max: MAX_FRAME_SIZE,
            });
        }
        if !(0.0..=MAX_OVERLAP_RATIO).contains(&self.overlap_ratio) {
            return Err(ConfigError::OverlapAusserhalb(self.overlap_ratio));
        }
        if !(self.oversubtraction_factor >= 1.0 && self.oversubtraction_factor.is_finite()) {
            return Err(ConfigError::OversubtractionUngueltig(
                self.oversubtraction_factor,
            ));
        }
        if !(self.spectral_floor > 0.0 && self.spectral_floor < 1.0) {
            return Err(ConfigError::SpektralerFloorUngueltig(self.spectral_floor));
        }
        if !(self.voice_floor > 0.0 && self.voice_floor <= 1.0) {
            return Err(ConfigError::SprachFloorUngueltig(self.voice_floor));
        }
        if !(self.nonvoice_ceiling > self.spectral_floor && self.nonvoice_ceiling <= 1.0) {
            return Err(ConfigError::ObergrenzeUngueltig {
                ceiling: self.nonvoice_ceiling,
                floor: self.spectral_floor,
            });
        }
        check_smoothing("noise_smoothing", self.noise_smoothing)?;
        check_smoothing("gain_smoothing", self.gain_smoothing)?;
        if !(self.noise_floor > 0.0 && self.noise_floor.is_finite()) {
            return Err(ConfigError::RauschbodenUngueltig(self.noise_floor));
        }
        if self.learning_frames == 0 {
            return Err(ConfigError::LernphaseLeer);
        }
        if self.max_block_size == 0 {
            return Err(ConfigError::BlockGroesseNull);
        }
        self.vad.validate()?;
        self.transient.validate()?;

        let hop_size = hop_size_for(self.frame_size, self.overlap_ratio);
        let bins = self.frame_size / 2 + 1;
        let voice_band = self
            .vad
            .band_bins(self.sample_rate, self.frame_size, bins);

        Ok(ValidatedConfig {
            config: self.clone(),
            hop_size,
            bins,
            voice_band,
        })
    }
}

fn check_smoothing(name: &'static str, wert: f32) -> ConfigResult<()> {
    if (0.0..1.0).contains(&wert) {
        Ok(())
    } else {
        Err(ConfigError::GlaettungUngueltig { name, wert })
    }
}

/// Hop-Groesse fuer Frame-Groesse und Overlap, mindestens 1 Sample
pub fn hop_size_for(frame_size: usize, overlap_ratio: f32) -> usize {
    let hop = (frame_size as f32 * (1.0 - overlap_ratio)).round() as usize;
    hop.clamp(1, frame_size)
}

/// Geprueftes Konfigurationsobjekt mit abgeleiteten Groessen
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedConfig {
    config: SuppressionConfig,
    hop_size: usize,
    bins: usize,
    voice_band: Range<usize>,
}

impl ValidatedConfig {
    pub fn config(&self) -> &SuppressionConfig {
        &self.config
    }

    pub fn frame_size(&self) -> usize {
        self.config.frame_size
    }

    pub fn hop_size(&self) -> usize {
        self.hop_size
    }

    /// Anzahl aussagekraeftiger Bins (F/2 + 1)
    pub fn bins(&self) -> usize {
        self.bins
    }

    /// Bin-Bereich des Sprachbands (inklusive Obergrenze als `end - 1`)
    pub fn voice_band(&self) -> Range<usize> {
        self.voice_band.clone()
    }

    /// Latenz zwischen Eingang und Ausgang in Samples
    pub fn latency_samples(&self) -> usize {
        self.config.frame_size - 1
    }
}
