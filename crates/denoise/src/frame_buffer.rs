//! Fensterung und Frame-Puffer (Overlap-Add)
//!
//! Sammelt Capture-Bloecke beliebiger Laenge in einem lock-free Ring und
//! schneidet daraus ueberlappende Analyse-Frames (Hann-gefenstert). Auf der
//! Syntheseseite werden rekonstruierte Frames erneut gefenstert, in den
//! Overlap-Puffer addiert und hop-weise in eine Ausgabe-FIFO geschrieben.
//!
//! Der Analyse-Ring startet mit `F - 1` Nullen. Dadurch ist nach jedem
//! Eingangssample mindestens so viel Ausgabe vorhanden wie Eingabe, und
//! Ausgabe-Sample `n` entspricht Eingangs-Sample `n - (F - 1)`.

use ringbuf::traits::{Consumer, Observer, Producer};
use ringbuf::HeapRb;

use crate::error::{reserve, SessionResult, SessionStartError};

/// Hann-Fenster `0.5 * (1 - cos(2*pi*i / (F - 1)))`
pub fn hann_window(size: usize) -> Vec<f32> {
    if size < 2 {
        return vec![1.0; size];
    }
    let denom = (size - 1) as f32;
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / denom).cos()))
        .collect()
}

/// Synthese-Fenster fuer exaktes Overlap-Add
///
/// `w[i] / sum_m w[(i mod H) + m*H]^2` – die Summe aller Beitraege
/// `analyse * synthese` an jeder Position ist damit 1. Positionen, an denen
/// kein Analysefenster beitraegt (Summe 0), bekommen 0.
pub fn synthesis_window(analysis: &[f32], hop_size: usize) -> Vec<f32> {
    let frame_size = analysis.len();
    let norm: Vec<f32> = (0..hop_size.min(frame_size))
        .map(|offset| {
            analysis[offset..]
                .iter()
                .step_by(hop_size)
                .map(|w| w * w)
                .sum::<f32>()
        })
        .collect();

    analysis
        .iter()
        .enumerate()
        .map(|(i, w)| {
            let n = norm[i % hop_size];
            if n > 0.0 {
                w / n
            } else {
                0.0
            }
        })
        .collect()
}

/// Analyse-/Synthese-Puffer einer Session
pub struct FrameBuffer {
    frame_size: usize,
    hop_size: usize,
    analysis_window: Vec<f32>,
    synthesis_window: Vec<f32>,
    /// Noch nicht verbrauchte Eingangssamples (aelteste zuerst)
    input: HeapRb<f32>,
    /// Ueberhang des letzten Synthese-Frames, immer genau `F - H` lang
    overlap: Vec<f32>,
    /// Fertige Hops fuer die Ausgabe
    output: HeapRb<f32>,
    hop_scratch: Vec<f32>,
    /// Verworfene Ausgabesamples (FIFO voll, sollte nie passieren)
    overruns: u64,
}

impl FrameBuffer {
    /// Legt alle Puffer an; Speichermangel wird als Fehler gemeldet.
    pub fn new(frame_size: usize, hop_size: usize) -> SessionResult<Self> {
        let hop_size = hop_size.clamp(1, frame_size);
        let analysis_window = hann_window(frame_size);
        let synthesis_window = synthesis_window(&analysis_window, hop_size);

        let mut buffer = Self {
            frame_size,
            hop_size,
            analysis_window,
            synthesis_window,
            input: ring("analyse-ring", frame_size * 2)?,
            overlap: reserve("overlap", frame_size - hop_size, 0.0f32)?,
            output: ring("ausgabe-ring", frame_size * 2)?,
            hop_scratch: reserve("hop-puffer", hop_size, 0.0f32)?,
            overruns: 0,
        };
        buffer.prime();
        Ok(buffer)
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    pub fn hop_size(&self) -> usize {
        self.hop_size
    }

    /// Laenge des Overlap-Puffers (`F - H`)
    pub fn overlap_len(&self) -> usize {
        self.overlap.len()
    }

    /// Latenz in Samples
    pub fn latency(&self) -> usize {
        self.frame_size - 1
    }

    /// Anzahl gepufferter, noch nicht analysierter Samples
    pub fn pending_input(&self) -> usize {
        self.input.occupied_len()
    }

    /// Anzahl abholbereiter Ausgabesamples
    pub fn pending_output(&self) -> usize {
        self.output.occupied_len()
    }

    pub fn overruns(&self) -> u64 {
        self.overruns
    }

    /// Nimmt so viele Samples auf wie der Ring fasst, gibt die Anzahl zurueck.
    ///
    /// Der Aufrufer muss anschliessend `next_frame` leeren, bevor er den Rest
    /// nachschiebt.
    pub fn push(&mut self, samples: &[f32]) -> usize {
        self.input.push_slice(samples)
    }

    /// Schneidet den naechsten Analyse-Frame (gefenstert) aus dem Ring.
    ///
    /// Gibt `false` zurueck solange weniger als `F` Samples vorliegen; der
    /// Ring rueckt pro Frame um `H` vor.
    pub fn next_frame(&mut self, frame: &mut [f32]) -> bool {
        if self.input.occupied_len() < self.frame_size || frame.len() != self.frame_size {
            return false;
        }

        let (head, tail) = self.input.as_slices();
        let from_head = head.len().min(self.frame_size);
        frame[..from_head].copy_from_slice(&head[..from_head]);
        frame[from_head..].copy_from_slice(&tail[..self.frame_size - from_head]);

        for (sample, w) in frame.iter_mut().zip(&self.analysis_window) {
            *sample *= w;
        }

        self.input.skip(self.hop_size);
        true
    }

    /// Overlap-Add eines rekonstruierten Frames.
    ///
    /// Die ersten `H` Samples der Summe wandern in die Ausgabe-FIFO, der
    /// Overlap-Puffer rueckt um `H` nach links und wird hinten mit dem neuen
    /// Frame aufgefuellt.
    pub fn emit(&mut self, synthesis: &[f32]) {
        debug_assert_eq!(synthesis.len(), self.frame_size);
        let keep = self.overlap.len();

        for i in 0..self.hop_size {
            let carried = if i < keep { self.overlap[i] } else { 0.0 };
            self.hop_scratch[i] = synthesis[i] * self.synthesis_window[i] + carried;
        }

        // Aufsteigend: liest overlap[H + j] bevor es ueberschrieben wird
        for j in 0..keep {
            let src = self.hop_size + j;
            let carried = if src < keep { self.overlap[src] } else { 0.0 };
            self.overlap[j] = synthesis[src] * self.synthesis_window[src] + carried;
        }

        let pushed = self.output.push_slice(&self.hop_scratch);
        if pushed < self.hop_size {
            self.overruns += (self.hop_size - pushed) as u64;
        }
    }

    /// Kopiert fertige Ausgabe in `out`, gibt die Anzahl zurueck
    pub fn drain_into(&mut self, out: &mut [f32]) -> usize {
        self.output.pop_slice(out)
    }

    /// Verwirft alle Puffer und startet wie bei Session-Beginn
    pub fn reset(&mut self) {
        self.input.clear();
        self.output.clear();
        self.overlap.fill(0.0);
        self.prime();
    }

    fn prime(&mut self) {
        self.input
            .push_iter(std::iter::repeat(0.0).take(self.frame_size - 1));
    }
}

fn ring(puffer: &'static str, kapazitaet: usize) -> SessionResult<HeapRb<f32>> {
    HeapRb::try_new(kapazitaet).map_err(|_| SessionStartError::Speicher {
        puffer,
        elemente: kapazitaet,
    })
}
