//! Spektrale Voice Activity Detection (VAD)
//!
//! Rohentscheidung pro Frame aus zwei Merkmalen:
//! - Anteil der Energie im Sprachband (300 Hz – 3.4 kHz)
//! - Gesamtenergie relativ zur aktuellen Rauschschaetzung (selbstkalibrierend)
//!
//! Die Rohentscheidungen laufen durch eine kurze Historie; Sprache wird
//! gemeldet sobald mindestens `min_speech_frames` der letzten
//! `history_len` Frames aktiv waren. Das verhindert Flattern bei kurzen
//! Spitzen oder Pausen innerhalb von Sprache.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Obergrenze fuer die Historienlaenge
pub const MAX_HISTORY_LEN: usize = 64;

/// Konfiguration fuer die VAD
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VadConfig {
    /// Untere Grenze des Sprachbands in Hz
    pub band_low_hz: f32,
    /// Obere Grenze des Sprachbands in Hz
    pub band_high_hz: f32,
    /// Minimaler Energieanteil im Sprachband
    pub voice_band_ratio: f32,
    /// Frame-Energie muss diesen Faktor ueber der Rauschenergie liegen
    pub energy_ratio: f32,
    /// Laenge der Entscheidungs-Historie in Frames
    pub history_len: usize,
    /// Benoetigte aktive Frames in der Historie
    pub min_speech_frames: usize,
    /// Glaettungsfaktor fuer die Energie-Skalare (Diagnose)
    pub smoothing: f32,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            band_low_hz: 300.0,
            band_high_hz: 3400.0,
            voice_band_ratio: 0.3,
            energy_ratio: 6.0,
            history_len: 10,
            min_speech_frames: 3,
            smoothing: 0.9,
        }
    }
}

impl VadConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if !(self.band_low_hz >= 0.0 && self.band_low_hz < self.band_high_hz) {
            return Err(ConfigError::Vad(format!(
                "Sprachband {}..{} Hz ungueltig",
                self.band_low_hz, self.band_high_hz
            )));
        }
        if !(self.voice_band_ratio > 0.0 && self.voice_band_ratio < 1.0) {
            return Err(ConfigError::Vad(format!(
                "voice_band_ratio {} ausserhalb von (0, 1)",
                self.voice_band_ratio
            )));
        }
        if !(self.energy_ratio > 0.0 && self.energy_ratio.is_finite()) {
            return Err(ConfigError::Vad(format!(
                "energy_ratio {} muss > 0 sein",
                self.energy_ratio
            )));
        }
        if self.history_len == 0 || self.history_len > MAX_HISTORY_LEN {
            return Err(ConfigError::Vad(format!(
                "history_len {} ausserhalb von 1..={}",
                self.history_len, MAX_HISTORY_LEN
            )));
        }
        if self.min_speech_frames == 0 || self.min_speech_frames > self.history_len {
            return Err(ConfigError::Vad(format!(
                "min_speech_frames {} ausserhalb von 1..={}",
                self.min_speech_frames, self.history_len
            )));
        }
        if !(0.0..1.0).contains(&self.smoothing) {
            return Err(ConfigError::Vad(format!(
                "smoothing {} ausserhalb von [0, 1)",
                self.smoothing
            )));
        }
        Ok(())
    }

    /// Bin-Bereich des Sprachbands fuer Abtastrate und Frame-Groesse
    pub fn band_bins(&self, sample_rate: u32, frame_size: usize, bins: usize) -> Range<usize> {
        let per_bin = frame_size as f32 / sample_rate as f32;
        let last = bins.saturating_sub(1).max(1);
        let low = ((self.band_low_hz * per_bin).floor() as usize).clamp(1, last);
        let high = ((self.band_high_hz * per_bin).floor() as usize).clamp(low, last);
        low..high + 1
    }
}

/// Ringpuffer der letzten Rohentscheidungen, feste Laenge
#[derive(Debug, Clone)]
pub struct VadHistory {
    slots: Vec<bool>,
    pos: usize,
    active: usize,
}

impl VadHistory {
    pub fn new(len: usize) -> Self {
        Self {
            slots: vec![false; len.max(1)],
            pos: 0,
            active: 0,
        }
    }

    /// Schreibt eine Entscheidung und verdraengt die aelteste
    pub fn push(&mut self, decision: bool) {
        if self.slots[self.pos] {
            self.active -= 1;
        }
        self.slots[self.pos] = decision;
        if decision {
            self.active += 1;
        }
        self.pos = (self.pos + 1) % self.slots.len();
    }

    /// Anzahl aktiver Entscheidungen in der Historie
    pub fn active(&self) -> usize {
        self.active
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn clear(&mut self) {
        self.slots.fill(false);
        self.pos = 0;
        self.active = 0;
    }
}

/// Merkmale des zuletzt klassifizierten Frames
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VadFeatures {
    pub total_energy: f32,
    pub noise_energy: f32,
    pub voice_band_ratio: f32,
    pub raw_decision: bool,
}

/// Spektraler Voice Activity Detector
pub struct SpectralVad {
    config: VadConfig,
    band: Range<usize>,
    history: VadHistory,
    smoothed_energy: f32,
    smoothed_ratio: f32,
    last: VadFeatures,
    voice_active: bool,
}

impl SpectralVad {
    pub fn new(config: VadConfig, band: Range<usize>) -> Self {
        let history = VadHistory::new(config.history_len);
        Self {
            config,
            band,
            history,
            smoothed_energy: 0.0,
            smoothed_ratio: 0.0,
            last: VadFeatures::default(),
            voice_active: false,
        }
    }

    /// Klassifiziert einen Frame und schreibt die Rohentscheidung in die
    /// Historie. Bin 0 (Gleichanteil) wird nicht beruecksichtigt.
    pub fn classify(&mut self, magnitude: &[f32], noise: &[f32]) -> bool {
        let features = self.features(magnitude, noise);

        let s = self.config.smoothing;
        self.smoothed_energy = s * self.smoothed_energy + (1.0 - s) * features.total_energy;
        self.smoothed_ratio = s * self.smoothed_ratio + (1.0 - s) * features.voice_band_ratio;

        self.history.push(features.raw_decision);
        self.last = features;
        self.voice_active = self.history.active() >= self.config.min_speech_frames;
        self.voice_active
    }

    fn features(&self, magnitude: &[f32], noise: &[f32]) -> VadFeatures {
        let mut total_energy = 0.0f32;
        let mut voice_energy = 0.0f32;
        let mut noise_energy = 0.0f32;

        for (bin, (&m, &n)) in magnitude.iter().zip(noise).enumerate().skip(1) {
            let e = m * m;
            total_energy += e;
            noise_energy += n * n;
            if self.band.contains(&bin) {
                voice_energy += e;
            }
        }

        let voice_band_ratio = voice_energy / total_energy.max(1e-10);
        let raw_decision = voice_band_ratio > self.config.voice_band_ratio
            && total_energy > self.config.energy_ratio * noise_energy;

        VadFeatures {
            total_energy,
            noise_energy,
            voice_band_ratio,
            raw_decision,
        }
    }

    /// Ergebnis der letzten Klassifikation
    pub fn is_voice_active(&self) -> bool {
        self.voice_active
    }

    /// Merkmale des letzten Frames
    pub fn last_features(&self) -> VadFeatures {
        self.last
    }

    /// Geglaettete Frame-Energie
    pub fn smoothed_energy(&self) -> f32 {
        self.smoothed_energy
    }

    /// Geglaetteter Sprachband-Anteil
    pub fn smoothed_ratio(&self) -> f32 {
        self.smoothed_ratio
    }

    pub fn history(&self) -> &VadHistory {
        &self.history
    }

    pub fn reset(&mut self) {
        self.history.clear();
        self.smoothed_energy = 0.0;
        self.smoothed_ratio = 0.0;
        self.last = VadFeatures::default();
        self.voice_active = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BINS: usize = 513;

    fn vad() -> SpectralVad {
        SpectralVad::new(VadConfig::default(), 6..73)
    }

    /// Flaches Spektrum: wenig Energie im Sprachband
    fn flach(pegel: f32) -> Vec<f32> {
        vec![pegel; BINS]
    }

    /// Energie konzentriert um Bin 21 (~1 kHz)
    fn ton(pegel: f32) -> Vec<f32> {
        let mut mag = vec![0.002f32; BINS];
        mag[20] = pegel * 0.5;
        mag[21] = pegel;
        mag[22] = pegel * 0.5;
        mag
    }

    #[test]
    fn stille_nicht_aktiv() {
        let mut vad = vad();
        let noise = flach(0.002);
        assert!(!vad.classify(&flach(0.0), &noise));
        assert!(!vad.classify(&flach(0.002), &noise));
    }

    #[test]
    fn breitbandrauschen_nicht_aktiv() {
        // Laut, aber der Sprachband-Anteil liegt bei ~13%
        let mut vad = vad();
        let noise = flach(0.002);
        for _ in 0..10 {
            assert!(!vad.classify(&flach(0.5), &noise));
        }
        assert!(vad.last_features().voice_band_ratio < 0.3);
    }

    #[test]
    fn ton_braucht_drei_frames() {
        let mut vad = vad();
        let noise = flach(0.002);
        assert!(!vad.classify(&ton(1.0), &noise), "1 von 10");
        assert!(!vad.classify(&ton(1.0), &noise), "2 von 10");
        assert!(vad.classify(&ton(1.0), &noise), "3 von 10 reicht");
        assert!(vad.last_features().raw_decision);
    }

    #[test]
    fn hysterese_haelt_nach_sprache() {
        let mut vad = vad();
        let noise = flach(0.002);
        for _ in 0..10 {
            vad.classify(&ton(1.0), &noise);
        }
        // 7 Frames Stille: noch mindestens 3 aktive in der Historie
        for i in 0..7 {
            assert!(vad.classify(&flach(0.002), &noise), "Hysterese Frame {}", i);
        }
        assert!(!vad.classify(&flach(0.002), &noise), "Nach 8 stillen Frames inaktiv");
    }

    #[test]
    fn schwelle_relativ_zum_rauschen() {
        let mut vad = vad();
        // Rauschschaetzung so hoch, dass der Ton nicht 6x darueber liegt
        let noise = flach(0.05);
        for _ in 0..5 {
            assert!(!vad.classify(&ton(0.5), &noise));
        }
        assert!(!vad.last_features().raw_decision);
    }

    #[test]
    fn historie_laenge_konstant() {
        let mut history = VadHistory::new(10);
        for i in 0..25 {
            history.push(i % 2 == 0);
            assert_eq!(history.len(), 10);
            assert!(history.active() <= 10);
        }
        assert_eq!(history.active(), 5);
    }

    #[test]
    fn band_bins_fuer_raten() {
        let config = VadConfig::default();
        assert_eq!(config.band_bins(48000, 1024, 513), 6..73);
        assert_eq!(config.band_bins(16000, 512, 257), 9..109);
        // Kleine Frames: Band wird auf vorhandene Bins begrenzt
        assert_eq!(config.band_bins(8000, 64, 33), 2..28);
    }

    #[test]
    fn validierung() {
        assert!(VadConfig::default().validate().is_ok());
        let config = VadConfig {
            min_speech_frames: 11,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        let config = VadConfig {
            band_low_hz: 4000.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn reset_leert_historie() {
        let mut vad = vad();
        let noise = flach(0.002);
        for _ in 0..5 {
            vad.classify(&ton(1.0), &noise);
        }
        vad.reset();
        assert_eq!(vad.history().active(), 0);
        assert!(!vad.is_voice_active());
        assert_eq!(vad.smoothed_energy(), 0.0);
    }
}
