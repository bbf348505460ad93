//! Transienten-Daempfung (Tastaturklicks, Klopfen)
//!
//! Vergleicht die RMS des aktuellen Frames mit dem Mittel der letzten Frames.
//! Springt sie ueber `threshold_ratio * mittel`, wird der Frame gedaempft und
//! der Gain erholt sich ueber `recovery_frames` quadratisch auf 1.

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Mindestanzahl Historienwerte bevor ein Transient erkannt werden kann
const MIN_HISTORY: usize = 3;

/// Konfiguration der Transienten-Daempfung
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransientConfig {
    pub enabled: bool,
    /// Anzahl Frames im RMS-Mittel
    pub history_len: usize,
    /// Faktor ueber dem Mittel, ab dem ein Frame als Transient gilt
    pub threshold_ratio: f32,
    /// Frames bis der Gain wieder 1 erreicht
    pub recovery_frames: u32,
    /// Minimaler Gain direkt nach der Erkennung
    pub floor: f32,
    /// Unterhalb dieses Mittels wird nie ausgeloest (Stille)
    pub min_mean: f32,
}

impl Default for TransientConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            history_len: 8,
            threshold_ratio: 4.0,
            recovery_frames: 3,
            floor: 0.1,
            min_mean: 1e-4,
        }
    }
}

impl TransientConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.history_len < MIN_HISTORY || self.history_len > 256 {
            return Err(ConfigError::Transient(format!(
                "history_len {} ausserhalb von {}..=256",
                self.history_len, MIN_HISTORY
            )));
        }
        if !(self.threshold_ratio > 1.0 && self.threshold_ratio.is_finite()) {
            return Err(ConfigError::Transient(format!(
                "threshold_ratio {} muss > 1 sein",
                self.threshold_ratio
            )));
        }
        if self.recovery_frames == 0 {
            return Err(ConfigError::Transient(
                "recovery_frames muss > 0 sein".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.floor) {
            return Err(ConfigError::Transient(format!(
                "floor {} ausserhalb von [0, 1]",
                self.floor
            )));
        }
        if !(self.min_mean >= 0.0 && self.min_mean.is_finite()) {
            return Err(ConfigError::Transient(format!(
                "min_mean {} ungueltig",
                self.min_mean
            )));
        }
        Ok(())
    }
}

/// Erkennt Transienten und liefert einen Gain-Faktor pro Frame
pub struct TransientSuppressor {
    config: TransientConfig,
    history: Vec<f32>,
    pos: usize,
    filled: usize,
    /// Verbleibende Erholungs-Frames (0 = inaktiv)
    recovery: u32,
    detections: u64,
}

impl TransientSuppressor {
    pub fn new(config: TransientConfig) -> Self {
        let len = config.history_len.max(MIN_HISTORY);
        Self {
            config,
            history: vec![0.0; len],
            pos: 0,
            filled: 0,
            recovery: 0,
            detections: 0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Verarbeitet die RMS eines Frames und gibt den Gain-Faktor zurueck.
    ///
    /// Deaktiviert immer 1.0. Waehrend der Erholung gilt
    /// `floor + (1 - floor) * p^2` mit `p = 1 - rest / recovery_frames`.
    pub fn process(&mut self, frame_rms: f32) -> f32 {
        if !self.config.enabled {
            return 1.0;
        }

        if self.filled >= MIN_HISTORY {
            let mean = self.history[..self.filled].iter().sum::<f32>() / self.filled as f32;
            if mean > self.config.min_mean && frame_rms > self.config.threshold_ratio * mean {
                self.recovery = self.config.recovery_frames;
                self.detections += 1;
            }
        }

        // Erst nach dem Vergleich: jeder Frame zaehlt fuer die Folgeframes,
        // sonst bleibt ein dauerhaft hoeherer Pegel ewig ein Transient
        self.record(frame_rms);

        self.factor_and_advance()
    }

    fn record(&mut self, frame_rms: f32) {
        if !frame_rms.is_finite() {
            return;
        }
        self.history[self.pos] = frame_rms;
        self.pos = (self.pos + 1) % self.history.len();
        self.filled = (self.filled + 1).min(self.history.len());
    }

    fn factor_and_advance(&mut self) -> f32 {
        if self.recovery == 0 {
            return 1.0;
        }
        let factor = self.factor();
        self.recovery -= 1;
        factor
    }

    /// Aktueller Faktor ohne Zustandsaenderung
    pub fn factor(&self) -> f32 {
        if self.recovery == 0 {
            return 1.0;
        }
        let p = 1.0 - self.recovery as f32 / self.config.recovery_frames as f32;
        let floor = self.config.floor;
        floor + (1.0 - floor) * p * p
    }

    /// Anzahl erkannter Transienten seit Start
    pub fn detections(&self) -> u64 {
        self.detections
    }

    pub fn reset(&mut self) {
        self.history.fill(0.0);
        self.pos = 0;
        self.filled = 0;
        self.recovery = 0;
    }
}

/// RMS eines Zeitbereich-Frames
pub fn frame_rms(frame: &[f32]) -> f32 {
    if frame.is_empty() {
        return 0.0;
    }
    (frame.iter().map(|s| s * s).sum::<f32>() / frame.len() as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aktiv() -> TransientSuppressor {
        TransientSuppressor::new(TransientConfig {
            enabled: true,
            ..Default::default()
        })
    }

    #[test]
    fn deaktiviert_immer_eins() {
        let mut ts = TransientSuppressor::new(TransientConfig::default());
        for rms in [0.01, 0.01, 0.01, 0.01, 10.0] {
            assert_eq!(ts.process(rms), 1.0);
        }
        assert_eq!(ts.detections(), 0);
    }

    #[test]
    fn klick_wird_gedaempft_und_erholt_sich() {
        let mut ts = aktiv();
        for _ in 0..8 {
            assert_eq!(ts.process(0.01), 1.0);
        }
        // Erkennung: p = 0 -> floor
        assert!((ts.process(0.5) - 0.1).abs() < 1e-6);
        // Erholung: p = 1/3 -> 0.2, p = 2/3 -> 0.5
        assert!((ts.process(0.01) - 0.2).abs() < 1e-6);
        assert!((ts.process(0.01) - 0.5).abs() < 1e-6);
        assert_eq!(ts.process(0.01), 1.0);
        assert_eq!(ts.detections(), 1);
    }

    #[test]
    fn dauerhafter_pegelanstieg_erholt_sich() {
        let mut ts = aktiv();
        for _ in 0..8 {
            ts.process(0.01);
        }
        // Mittel nach dem ersten lauten Frame 0.034, nach dem zweiten 0.0575
        let faktoren: Vec<f32> = (0..10).map(|_| ts.process(0.2)).collect();
        assert_eq!(ts.detections(), 2);
        assert!((faktoren[1] - 0.1).abs() < 1e-6);
        assert!(faktoren[5..].iter().all(|&f| f == 1.0), "{:?}", faktoren);
    }

    #[test]
    fn braucht_historie() {
        let mut ts = aktiv();
        ts.process(0.01);
        ts.process(0.01);
        assert_eq!(ts.process(1.0), 1.0, "Erst ab drei Historienwerten");
    }

    #[test]
    fn stille_loest_nicht_aus() {
        let mut ts = aktiv();
        for _ in 0..8 {
            ts.process(0.0);
        }
        assert_eq!(ts.process(0.00005), 1.0);
        assert_eq!(ts.detections(), 0);
    }

    #[test]
    fn gleichmaessiger_pegel_unbeeinflusst() {
        let mut ts = aktiv();
        for i in 0..50 {
            let rms = 0.05 + 0.01 * (i % 3) as f32;
            assert_eq!(ts.process(rms), 1.0);
        }
    }

    #[test]
    fn frame_rms_berechnung() {
        assert_eq!(frame_rms(&[]), 0.0);
        assert!((frame_rms(&[0.5, -0.5, 0.5, -0.5]) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn validierung() {
        assert!(TransientConfig::default().validate().is_ok());
        let config = TransientConfig {
            threshold_ratio: 0.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        let config = TransientConfig {
            recovery_frames: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
