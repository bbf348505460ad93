//! Spektraltransformation (reelle STFT-Frames <-> komplexes Spektrum)
//!
//! FFT-Plaene werden einmal beim Session-Start erstellt; im Hot Path wird
//! nur noch mit vorab reserviertem Scratch gerechnet. Beide Richtungen sind
//! mit `1/sqrt(F)` skaliert, damit `inverse(forward(x)) == x` gilt und die
//! Betraege unabhaengig von der Frame-Groesse vergleichbar bleiben.

use std::sync::Arc;

use rustfft::num_complex::Complex32;
use rustfft::{Fft, FftPlanner};

use crate::error::{ConfigError, FrameFault};

pub struct SpectralTransform {
    size: usize,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
    scratch: Vec<Complex32>,
    scale: f32,
}

impl SpectralTransform {
    /// Plant Vorwaerts- und Rueckwaertstransformation fuer `size` Punkte.
    ///
    /// `size` muss eine Zweierpotenz sein.
    pub fn new(size: usize) -> Result<Self, ConfigError> {
        if size == 0 || !size.is_power_of_two() {
            return Err(ConfigError::FrameGroesseKeineZweierpotenz(size));
        }

        let mut planner = FftPlanner::<f32>::new();
        let forward = planner.plan_fft_forward(size);
        let inverse = planner.plan_fft_inverse(size);
        let scratch_len = forward
            .get_inplace_scratch_len()
            .max(inverse.get_inplace_scratch_len());

        Ok(Self {
            size,
            forward,
            inverse,
            scratch: vec![Complex32::new(0.0, 0.0); scratch_len],
            scale: 1.0 / (size as f32).sqrt(),
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Anzahl aussagekraeftiger Bins fuer reelle Eingaben
    pub fn bins(&self) -> usize {
        self.size / 2 + 1
    }

    /// Zeitbereich -> Spektrum (volle Laenge F)
    pub fn forward(&mut self, time: &[f32], spectrum: &mut [Complex32]) -> Result<(), FrameFault> {
        self.check_len(time.len())?;
        self.check_len(spectrum.len())?;

        for (bin, &sample) in spectrum.iter_mut().zip(time) {
            *bin = Complex32::new(sample * self.scale, 0.0);
        }
        self.forward.process_with_scratch(spectrum, &mut self.scratch);
        Ok(())
    }

    /// Spektrum -> Zeitbereich. Das Spektrum wird dabei ueberschrieben.
    pub fn inverse(&mut self, spectrum: &mut [Complex32], time: &mut [f32]) -> Result<(), FrameFault> {
        self.check_len(spectrum.len())?;
        self.check_len(time.len())?;

        self.inverse.process_with_scratch(spectrum, &mut self.scratch);
        for (sample, bin) in time.iter_mut().zip(spectrum.iter()) {
            *sample = bin.re * self.scale;
        }
        Ok(())
    }

    fn check_len(&self, len: usize) -> Result<(), FrameFault> {
        if len == self.size {
            Ok(())
        } else {
            Err(FrameFault::GroesseFalsch {
                erwartet: self.size,
                erhalten: len,
            })
        }
    }
}

/// Betragsspektrum der ersten `magnitude.len()` Bins
pub fn magnitudes(spectrum: &[Complex32], magnitude: &mut [f32]) {
    for (m, bin) in magnitude.iter_mut().zip(spectrum) {
        *m = (bin.re * bin.re + bin.im * bin.im).sqrt();
    }
}

/// Skaliert Real- und Imaginaerteil jedes Bins mit seinem Gain (Phase bleibt
/// erhalten) und baut die gespiegelte Haelfte konjugiert neu auf.
pub fn apply_gain(spectrum: &mut [Complex32], gain: &[f32], scale: f32) {
    let size = spectrum.len();
    let half = size / 2;

    for (bin, &g) in spectrum.iter_mut().zip(gain).take(half + 1) {
        *bin *= g * scale;
    }
    for i in 1..half {
        spectrum[size - i] = spectrum[i].conj();
    }
}

/// Prueft ein Spektrum auf NaN/Inf
pub fn spectrum_is_finite(spectrum: &[Complex32]) -> bool {
    spectrum.iter().all(|c| c.re.is_finite() && c.im.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sinus(freq: f32, rate: f32, n: usize) -> Vec<f32> {
        (0..n)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / rate).sin())
            .collect()
    }

    #[test]
    fn keine_zweierpotenz_abgelehnt() {
        assert!(SpectralTransform::new(1000).is_err());
        assert!(SpectralTransform::new(0).is_err());
        assert!(SpectralTransform::new(1024).is_ok());
    }

    #[test]
    fn hin_und_zurueck_identisch() {
        let mut t = SpectralTransform::new(512).unwrap();
        let x: Vec<f32> = (0..512).map(|i| ((i * 37 % 101) as f32 / 50.0) - 1.0).collect();
        let mut spectrum = vec![Complex32::new(0.0, 0.0); 512];
        let mut y = vec![0.0f32; 512];
        t.forward(&x, &mut spectrum).unwrap();
        t.inverse(&mut spectrum, &mut y).unwrap();
        for (a, b) in x.iter().zip(&y) {
            assert!((a - b).abs() < 1e-5, "{} != {}", a, b);
        }
    }

    #[test]
    fn sinus_peak_im_richtigen_bin() {
        let mut t = SpectralTransform::new(1024).unwrap();
        // Bin 32 bei 48 kHz / 1024 = 1500 Hz
        let x = sinus(1500.0, 48000.0, 1024);
        let mut spectrum = vec![Complex32::new(0.0, 0.0); 1024];
        t.forward(&x, &mut spectrum).unwrap();
        let mut mag = vec![0.0f32; t.bins()];
        magnitudes(&spectrum, &mut mag);
        let peak = mag
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak, 32);
        // Unitaere Skalierung: A * N / 2 / sqrt(N)
        assert!((mag[32] - 16.0).abs() < 0.01, "Betrag {}", mag[32]);
    }

    #[test]
    fn groessen_fehler_erkannt() {
        let mut t = SpectralTransform::new(256).unwrap();
        let mut spectrum = vec![Complex32::new(0.0, 0.0); 256];
        let result = t.forward(&[0.0; 255], &mut spectrum);
        assert_eq!(
            result,
            Err(FrameFault::GroesseFalsch {
                erwartet: 256,
                erhalten: 255
            })
        );
    }

    #[test]
    fn gain_eins_veraendert_nichts() {
        let mut t = SpectralTransform::new(256).unwrap();
        let x = sinus(700.0, 16000.0, 256);
        let mut spectrum = vec![Complex32::new(0.0, 0.0); 256];
        t.forward(&x, &mut spectrum).unwrap();
        let gain = vec![1.0f32; 129];
        apply_gain(&mut spectrum, &gain, 1.0);
        let mut y = vec![0.0f32; 256];
        t.inverse(&mut spectrum, &mut y).unwrap();
        for (a, b) in x.iter().zip(&y) {
            assert!((a - b).abs() < 1e-4);
        }
    }

    #[test]
    fn gain_null_ergibt_stille() {
        let mut t = SpectralTransform::new(128).unwrap();
        let x = sinus(1000.0, 8000.0, 128);
        let mut spectrum = vec![Complex32::new(0.0, 0.0); 128];
        t.forward(&x, &mut spectrum).unwrap();
        apply_gain(&mut spectrum, &[0.0; 65], 1.0);
        let mut y = vec![1.0f32; 128];
        t.inverse(&mut spectrum, &mut y).unwrap();
        assert!(y.iter().all(|s| s.abs() < 1e-6));
    }

    #[test]
    fn nicht_endlich_erkannt() {
        let spectrum = vec![Complex32::new(0.0, f32::NAN); 4];
        assert!(!spectrum_is_finite(&spectrum));
        assert!(spectrum_is_finite(&[Complex32::new(1.0, -1.0); 4]));
    }
}
