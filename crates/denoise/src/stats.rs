//! Diagnose-Zaehler einer Session
//!
//! Der Audio-Thread schreibt, beliebige andere Threads lesen. Alle Zaehler
//! sind Atomics, damit der Audio-Thread nie auf ein Lock wartet.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use serde::Serialize;

/// Gemeinsame Zaehler (Audio-Thread schreibt, Steuerung liest)
#[derive(Debug, Default)]
pub struct SessionCounters {
    frames_processed: AtomicU64,
    speech_frames: AtomicU64,
    non_speech_frames: AtomicU64,
    faulted_frames: AtomicU64,
    passthrough_blocks: AtomicU64,
    muted_blocks: AtomicU64,
    transients: AtomicU64,
    /// Mittlerer Rauschboden als f32-Bits
    noise_floor_bits: AtomicU32,
    learning: AtomicBool,
}

impl SessionCounters {
    pub fn new(initial_floor: f32) -> Self {
        let counters = Self::default();
        counters.set_noise_floor(initial_floor);
        counters.learning.store(true, Ordering::Relaxed);
        counters
    }

    pub(crate) fn record_frame(&self, is_speech: bool) {
        self.frames_processed.fetch_add(1, Ordering::Relaxed);
        if is_speech {
            self.speech_frames.fetch_add(1, Ordering::Relaxed);
        } else {
            self.non_speech_frames.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_fault(&self) {
        self.faulted_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_passthrough(&self) {
        self.passthrough_blocks.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_muted(&self) {
        self.muted_blocks.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_transient(&self) {
        self.transients.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn set_noise_floor(&self, floor: f32) {
        self.noise_floor_bits.store(floor.to_bits(), Ordering::Relaxed);
    }

    pub(crate) fn set_learning(&self, learning: bool) {
        self.learning.store(learning, Ordering::Relaxed);
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed.load(Ordering::Relaxed)
    }

    pub fn noise_floor(&self) -> f32 {
        f32::from_bits(self.noise_floor_bits.load(Ordering::Relaxed))
    }

    pub fn is_learning(&self) -> bool {
        self.learning.load(Ordering::Relaxed)
    }

    /// Momentaufnahme aller Zaehler
    pub fn snapshot(&self, latency_samples: usize) -> SessionStats {
        SessionStats {
            frames_processed: self.frames_processed(),
            speech_frames: self.speech_frames.load(Ordering::Relaxed),
            non_speech_frames: self.non_speech_frames.load(Ordering::Relaxed),
            faulted_frames: self.faulted_frames.load(Ordering::Relaxed),
            passthrough_blocks: self.passthrough_blocks.load(Ordering::Relaxed),
            muted_blocks: self.muted_blocks.load(Ordering::Relaxed),
            transients: self.transients.load(Ordering::Relaxed),
            noise_floor: self.noise_floor(),
            learning: self.is_learning(),
            latency_samples,
        }
    }
}

/// Statistiken einer Session
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionStats {
    /// Anzahl verarbeiteter Frames seit Start
    pub frames_processed: u64,
    /// Frames mit Sprache
    pub speech_frames: u64,
    /// Frames ohne Sprache
    pub non_speech_frames: u64,
    /// Frames mit Laufzeitfehler
    pub faulted_frames: u64,
    /// Bloecke die unveraendert durchgereicht wurden
    pub passthrough_blocks: u64,
    pub muted_blocks: u64,
    /// Erkannte Transienten
    pub transients: u64,
    /// Mittlerer geschaetzter Rauschboden (Betrag)
    pub noise_floor: f32,
    /// Lernphase aktiv
    pub learning: bool,
    /// Latenz zwischen Eingang und Ausgang in Samples
    pub latency_samples: usize,
}
