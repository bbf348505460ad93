//! Adaptives Rauschmodell
//!
//! Fuehrt pro Frequenz-Bin eine exponentiell geglaettete Betragsschaetzung.
//! Waehrend der Lernphase wird jeder Frame einbezogen, danach nur Frames
//! die die VAD als Nicht-Sprache einstuft.

/// Rauschschaetzung pro Bin
pub struct NoiseModel {
    profile: Vec<f32>,
    /// Glaettungsfaktor alpha (Anteil der alten Schaetzung)
    smoothing: f32,
    /// Untergrenze jedes Bins
    floor: f32,
    learning_frames: u32,
    frames_observed: u32,
    seeded: bool,
}

/// Ergebnis einer Beobachtung
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    /// Schaetzung wurde mit diesem Frame aktualisiert
    pub updated: bool,
    /// Mit diesem Frame ist die Lernphase abgeschlossen
    pub learning_completed: bool,
}

impl NoiseModel {
    pub fn new(bins: usize, smoothing: f32, floor: f32, learning_frames: u32) -> Self {
        Self {
            profile: vec![floor; bins],
            smoothing,
            floor,
            learning_frames,
            frames_observed: 0,
            seeded: false,
        }
    }

    /// Bezieht einen Frame in die Schaetzung ein.
    ///
    /// Der erste Frame setzt das Profil direkt, danach gilt
    /// `noise = alpha * noise + (1 - alpha) * magnitude`.
    pub fn observe(&mut self, magnitude: &[f32], is_speech: bool) -> Observation {
        let learning = self.is_learning();
        let update = learning || !is_speech;

        if update {
            if self.seeded {
                let alpha = self.smoothing;
                for (noise, &m) in self.profile.iter_mut().zip(magnitude) {
                    *noise = (alpha * *noise + (1.0 - alpha) * m).max(self.floor);
                }
            } else {
                for (noise, &m) in self.profile.iter_mut().zip(magnitude) {
                    *noise = m.max(self.floor);
                }
                self.seeded = true;
            }
        }

        self.frames_observed = self.frames_observed.saturating_add(1);

        Observation {
            updated: update,
            learning_completed: learning && !self.is_learning(),
        }
    }

    /// Aktuelle Schaetzung (jedes Bin >= Floor)
    pub fn estimate(&self) -> &[f32] {
        &self.profile
    }

    /// Ob die Lernphase noch laeuft
    pub fn is_learning(&self) -> bool {
        self.frames_observed < self.learning_frames
    }

    pub fn frames_observed(&self) -> u32 {
        self.frames_observed
    }

    /// Mittlerer Rauschboden ueber alle Bins (Diagnose)
    pub fn mean_floor(&self) -> f32 {
        if self.profile.is_empty() {
            return 0.0;
        }
        self.profile.iter().sum::<f32>() / self.profile.len() as f32
    }

    /// Verwirft das gelernte Profil, die Lernphase beginnt neu
    pub fn reset(&mut self) {
        self.profile.fill(self.floor);
        self.frames_observed = 0;
        self.seeded = false;
    }
}
