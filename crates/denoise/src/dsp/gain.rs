//! Gain-Berechnung pro Bin
//!
//! Aus Betragsspektrum, Rauschschaetzung und VAD-Entscheidung entsteht ein
//! Unterdrueckungs-Gain pro Bin. Waehrend Sprache wird konservativ
//! gedaempft, ohne Sprache aggressiv (Oversubtraction). Anschliessend wird
//! jeder Bin zeitlich geglaettet, um Musical Noise zu vermeiden.

use crate::config::{GainStrategy, ValidatedConfig};

/// Betraege unterhalb dieser Grenze gelten als leer
const MIN_MAGNITUDE: f32 = 1e-12;

/// Parameter der Gain-Berechnung
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainParams {
    pub strategy: GainStrategy,
    /// Oversubtraction-Faktor beta
    pub oversubtraction: f32,
    /// Minimaler Gain ohne Sprache
    pub spectral_floor: f32,
    /// Minimaler Gain waehrend Sprache
    pub voice_floor: f32,
    /// Maximaler Gain ohne Sprache
    pub nonvoice_ceiling: f32,
    /// Zeitliche Glaettung S
    pub smoothing: f32,
}

impl GainParams {
    pub fn from_config(validated: &ValidatedConfig) -> Self {
        let c = validated.config();
        Self {
            strategy: c.strategy,
            oversubtraction: c.oversubtraction_factor,
            spectral_floor: c.spectral_floor,
            voice_floor: c.voice_floor,
            nonvoice_ceiling: c.nonvoice_ceiling,
            smoothing: c.gain_smoothing,
        }
    }

    /// Ungeglaetteter Gain eines einzelnen Bins
    pub fn raw_gain(&self, magnitude: f32, noise: f32, is_speech: bool) -> f32 {
        if magnitude <= MIN_MAGNITUDE {
            return if is_speech {
                self.voice_floor
            } else {
                self.spectral_floor
            };
        }

        match self.strategy {
            GainStrategy::Gate => {
                if is_speech {
                    1.0
                } else {
                    self.spectral_floor
                }
            }
            GainStrategy::SpectralSubtraction => {
                if is_speech {
                    let snr = magnitude / noise;
                    ((snr - 1.0) / snr).clamp(self.voice_floor, 1.0)
                } else {
                    let subtracted = magnitude - self.oversubtraction * noise;
                    (subtracted / magnitude).clamp(self.spectral_floor, self.nonvoice_ceiling)
                }
            }
            GainStrategy::Wiener => {
                let snr = magnitude / noise;
                let posterior = snr * snr;
                if is_speech {
                    let prior = (posterior - 1.0).max(0.0);
                    (prior / (1.0 + prior)).clamp(self.voice_floor, 1.0)
                } else {
                    let prior = (posterior - self.oversubtraction).max(0.0);
                    (prior / (1.0 + prior)).clamp(self.spectral_floor, self.nonvoice_ceiling)
                }
            }
        }
    }
}

/// Gain-Rechner mit zeitlicher Glaettung pro Bin
pub struct GainComputer {
    params: GainParams,
    smoothed: Vec<f32>,
}

impl GainComputer {
    pub fn new(params: GainParams, bins: usize) -> Self {
        Self {
            params,
            // Start transparent, Glaettung zieht in wenigen Frames nach
            smoothed: vec![1.0; bins],
        }
    }

    pub fn params(&self) -> &GainParams {
        &self.params
    }

    /// Berechnet und glaettet den Gain fuer einen Frame.
    ///
    /// `smoothed = smoothed * S + gain * (1 - S)`
    pub fn compute(&mut self, magnitude: &[f32], noise: &[f32], is_speech: bool) -> &[f32] {
        let p = self.params;
        for ((g, &m), &n) in self.smoothed.iter_mut().zip(magnitude).zip(noise) {
            let raw = p.raw_gain(m, n, is_speech);
            *g = *g * p.smoothing + raw * (1.0 - p.smoothing);
        }
        &self.smoothed
    }

    /// Aktueller geglaetteter Gain
    pub fn current(&self) -> &[f32] {
        &self.smoothed
    }

    pub fn reset(&mut self) {
        self.smoothed.fill(1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(strategy: GainStrategy) -> GainParams {
        GainParams {
            strategy,
            oversubtraction: 2.0,
            spectral_floor: 0.02,
            voice_floor: 0.3,
            nonvoice_ceiling: 0.5,
            smoothing: 0.8,
        }
    }

    #[test]
    fn sprache_hohe_snr_fast_eins() {
        let p = params(GainStrategy::SpectralSubtraction);
        let g = p.raw_gain(1.0, 0.01, true);
        assert!((g - 0.99).abs() < 1e-6);
    }

    #[test]
    fn sprache_niedrige_snr_am_voice_floor() {
        let p = params(GainStrategy::SpectralSubtraction);
        assert_eq!(p.raw_gain(0.01, 0.01, true), 0.3);
        assert_eq!(p.raw_gain(0.005, 0.01, true), 0.3);
    }

    #[test]
    fn ohne_sprache_oversubtraction() {
        let p = params(GainStrategy::SpectralSubtraction);
        // (0.1 - 2 * 0.01) / 0.1 = 0.8 -> Obergrenze 0.5
        assert_eq!(p.raw_gain(0.1, 0.01, false), 0.5);
        // (0.03 - 0.02) / 0.03 = 0.333
        assert!((p.raw_gain(0.03, 0.01, false) - 1.0 / 3.0).abs() < 1e-6);
        // Negativ -> Floor
        assert_eq!(p.raw_gain(0.01, 0.01, false), 0.02);
    }

    #[test]
    fn leerer_bin_am_floor() {
        let p = params(GainStrategy::SpectralSubtraction);
        assert_eq!(p.raw_gain(0.0, 0.01, false), 0.02);
        assert_eq!(p.raw_gain(0.0, 0.01, true), 0.3);
    }

    #[test]
    fn gate_strategie() {
        let p = params(GainStrategy::Gate);
        assert_eq!(p.raw_gain(0.5, 0.01, true), 1.0);
        assert_eq!(p.raw_gain(0.5, 0.01, false), 0.02);
    }

    #[test]
    fn wiener_strategie_grenzen() {
        let p = params(GainStrategy::Wiener);
        // SNR 10 -> prior 99 -> 0.99
        assert!((p.raw_gain(0.1, 0.01, true) - 0.99).abs() < 1e-4);
        assert_eq!(p.raw_gain(0.01, 0.01, true), 0.3);
        assert_eq!(p.raw_gain(0.01, 0.01, false), 0.02);
        assert!(p.raw_gain(1.0, 0.01, false) <= 0.5);
    }

    #[test]
    fn oversubtraction_monoton() {
        for strategy in [GainStrategy::SpectralSubtraction, GainStrategy::Wiener] {
            let mut vorher = f32::INFINITY;
            for beta in [1.0f32, 1.5, 2.0, 3.0, 5.0] {
                let p = GainParams {
                    oversubtraction: beta,
                    ..params(strategy)
                };
                let g = p.raw_gain(0.04, 0.01, false);
                assert!(g <= vorher, "{:?}: beta {} erhoeht den Gain", strategy, beta);
                vorher = g;
            }
        }
    }

    #[test]
    fn glaettung_zieht_langsam_nach() {
        let mut gc = GainComputer::new(params(GainStrategy::Gate), 2);
        let g = gc.compute(&[0.5, 0.5], &[0.01, 0.01], false).to_vec();
        // 1.0 * 0.8 + 0.02 * 0.2
        assert!((g[0] - 0.804).abs() < 1e-6);
        for _ in 0..50 {
            gc.compute(&[0.5, 0.5], &[0.01, 0.01], false);
        }
        assert!((gc.current()[0] - 0.02).abs() < 1e-3);
    }

    #[test]
    fn reset_transparent() {
        let mut gc = GainComputer::new(params(GainStrategy::Gate), 3);
        gc.compute(&[0.5; 3], &[0.01; 3], false);
        gc.reset();
        assert!(gc.current().iter().all(|&g| g == 1.0));
    }
}
