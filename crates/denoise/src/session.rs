//! SuppressionSession – Besitzer aller Zustaende eines Streams
//!
//! Eine Session gehoert genau einem Audio-Thread. Alle Puffer werden beim
//! Start angelegt; `process_block` alloziert nicht mehr.
//!
//! Ablauf pro Frame:
//! Vorwaertstransformation -> Betraege -> VAD -> Rauschmodell -> Gain
//! -> Rueckwaertstransformation -> Overlap-Add
//!
//! Tritt in einem Frame ein Fehler auf, wird der gesamte Block unveraendert
//! durchgereicht und die Session laeuft weiter. Der durchgereichte Eingang
//! ist um dieselbe Latenz verzoegert wie die normale Ausgabe, der Stream
//! bleibt damit lueckenlos.

use std::sync::Arc;

use rustfft::num_complex::Complex32;
use tracing::{debug, info, warn};

use crate::config::{SuppressionConfig, ValidatedConfig};
use crate::dsp::gain::{GainComputer, GainParams};
use crate::dsp::noise_model::NoiseModel;
use crate::dsp::transient::{frame_rms, TransientSuppressor};
use crate::dsp::vad::SpectralVad;
use crate::dsp::AudioProcessor;
use crate::error::{reserve, FrameFault, SessionResult};
use crate::frame_buffer::FrameBuffer;
use crate::spectral::{apply_gain, magnitudes, spectrum_is_finite, SpectralTransform};
use crate::stats::{SessionCounters, SessionStats};

/// Ergebnis eines verarbeiteten Blocks
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockOutcome {
    /// Normal verarbeitet; `speech` ist die VAD-Entscheidung des letzten Frames
    Processed { frames: usize, speech: bool },
    /// Laufzeitfehler, Ausgabe ist eine exakte Kopie der Eingabe
    PassThrough(FrameFault),
    /// Stummgeschaltet, Ausgabe ist Stille
    Muted,
    /// Unterdrueckung deaktiviert, Ausgabe ist eine exakte Kopie der Eingabe
    Bypassed,
}

impl BlockOutcome {
    pub fn is_processed(&self) -> bool {
        matches!(self, Self::Processed { .. })
    }
}

/// Rauschunterdrueckung fuer genau einen Stream
pub struct SuppressionSession {
    config: ValidatedConfig,
    frames: FrameBuffer,
    transform: SpectralTransform,
    noise: NoiseModel,
    vad: SpectralVad,
    gain: GainComputer,
    transient: TransientSuppressor,

    frame: Vec<f32>,
    spectrum: Vec<Complex32>,
    magnitude: Vec<f32>,
    synthesis: Vec<f32>,
    /// Zwischenpuffer fuer die In-place Verarbeitung (`AudioProcessor`)
    block_scratch: Vec<f32>,
    /// Roher Eingang der letzten `F - 1` Samples (Ringpuffer)
    raw_delay: Vec<f32>,
    raw_pos: usize,

    counters: Arc<SessionCounters>,
    enabled: bool,
    muted: bool,
    last_speech: bool,

    /// Naechster Frame wird mit falscher Laenge transformiert
    #[cfg(test)]
    inject_size_fault: bool,
}

impl SuppressionSession {
    /// Validiert die Konfiguration und legt alle Puffer an.
    pub fn start(config: SuppressionConfig) -> SessionResult<Self> {
        let validated = config.validate()?;
        let frame_size = validated.frame_size();
        let bins = validated.bins();
        let c = validated.config();

        let transform = SpectralTransform::new(frame_size)?;
        let frame = reserve("analyse-frame", frame_size, 0.0f32)?;
        let spectrum = reserve("spektrum", frame_size, Complex32::new(0.0, 0.0))?;
        let magnitude = reserve("betraege", bins, 0.0f32)?;
        let synthesis = reserve("synthese-frame", frame_size, 0.0f32)?;
        let block_scratch = reserve("block-puffer", c.max_block_size, 0.0f32)?;
        let raw_delay = reserve("roh-verzoegerung", validated.latency_samples(), 0.0f32)?;

        let frames = FrameBuffer::new(frame_size, validated.hop_size())?;
        let noise = NoiseModel::new(bins, c.noise_smoothing, c.noise_floor, c.learning_frames);
        let vad = SpectralVad::new(c.vad.clone(), validated.voice_band());
        let gain = GainComputer::new(GainParams::from_config(&validated), bins);
        let transient = TransientSuppressor::new(c.transient.clone());
        let counters = Arc::new(SessionCounters::new(c.noise_floor));

        info!(
            sample_rate = c.sample_rate,
            frame_size,
            hop_size = validated.hop_size(),
            strategy = ?c.strategy,
            "Rauschunterdrueckung gestartet"
        );
        debug!(
            voice_band = ?validated.voice_band(),
            latency = validated.latency_samples(),
            transient = c.transient.enabled,
            "Session-Parameter"
        );

        Ok(Self {
            config: validated,
            frames,
            transform,
            noise,
            vad,
            gain,
            transient,
            frame,
            spectrum,
            magnitude,
            synthesis,
            block_scratch,
            raw_delay,
            raw_pos: 0,
            counters,
            enabled: true,
            muted: false,
            last_speech: false,
            #[cfg(test)]
            inject_size_fault: false,
        })
    }

    /// Beendet die Session und gibt die finalen Statistiken zurueck.
    ///
    /// Ein angefangener Analyse-Frame wird verworfen.
    pub fn stop(self) -> SessionStats {
        let stats = self.stats();
        info!(
            frames = stats.frames_processed,
            speech = stats.speech_frames,
            faults = stats.faulted_frames,
            "Rauschunterdrueckung gestoppt"
        );
        stats
    }

    /// Verarbeitet einen Capture-Block. `output` muss so lang sein wie
    /// `input`; die Ausgabe ist um `latency_samples()` verzoegert.
    pub fn process_block(&mut self, input: &[f32], output: &mut [f32]) -> BlockOutcome {
        if input.len() != output.len() {
            let n = input.len().min(output.len());
            output[..n].copy_from_slice(&input[..n]);
            output[n..].fill(0.0);
            return self.pass_through(FrameFault::BlockLaenge {
                eingang: input.len(),
                ausgang: output.len(),
            });
        }

        if !self.enabled {
            output.copy_from_slice(input);
            return BlockOutcome::Bypassed;
        }

        if self.muted {
            output.fill(0.0);
            self.counters.record_muted();
            return BlockOutcome::Muted;
        }

        let mut consumed = 0;
        let mut written = 0;
        let mut frames = 0;
        let mut fault = None;

        while consumed < input.len() {
            let pushed = self.frames.push(&input[consumed..]);
            consumed += pushed;

            while self.frames.next_frame(&mut self.frame) {
                match self.process_frame() {
                    Ok(is_speech) => {
                        self.last_speech = is_speech;
                        frames += 1;
                    }
                    Err(f) => {
                        self.counters.record_fault();
                        self.emit_unprocessed();
                        fault.get_or_insert(f);
                    }
                }
                written += self.frames.drain_into(&mut output[written..]);
            }

            if pushed == 0 {
                break;
            }
        }

        if written < output.len() {
            output[written..].fill(0.0);
        }

        match fault {
            Some(f) => {
                self.delay_raw(input, Some(output));
                self.pass_through(f)
            }
            None => {
                self.delay_raw(input, None);
                BlockOutcome::Processed {
                    frames,
                    speech: self.last_speech,
                }
            }
        }
    }

    /// Schiebt `input` durch die Rohverzoegerung. Mit `output` wird dort der
    /// um `F - 1` verzoegerte, unveraenderte Eingang abgelegt.
    fn delay_raw(&mut self, input: &[f32], mut output: Option<&mut [f32]>) {
        let len = self.raw_delay.len();
        if len == 0 {
            if let Some(out) = output {
                out.copy_from_slice(input);
            }
            return;
        }
        for (i, &x) in input.iter().enumerate() {
            if let Some(out) = output.as_deref_mut() {
                out[i] = self.raw_delay[self.raw_pos];
            }
            self.raw_delay[self.raw_pos] = x;
            self.raw_pos = (self.raw_pos + 1) % len;
        }
    }

    fn process_frame(&mut self) -> Result<bool, FrameFault> {
        #[cfg(test)]
        let len = if std::mem::take(&mut self.inject_size_fault) {
            self.frame.len() - 1
        } else {
            self.frame.len()
        };
        #[cfg(not(test))]
        let len = self.frame.len();

        self.transform.forward(&self.frame[..len], &mut self.spectrum)?;
        if !spectrum_is_finite(&self.spectrum) {
            return Err(FrameFault::NichtEndlich { stufe: "forward" });
        }

        magnitudes(&self.spectrum, &mut self.magnitude);
        let is_speech = self.vad.classify(&self.magnitude, self.noise.estimate());
        self.counters.record_frame(is_speech);

        let observation = self.noise.observe(&self.magnitude, is_speech);
        if observation.updated {
            self.counters.set_noise_floor(self.noise.mean_floor());
        }
        if observation.learning_completed {
            self.counters.set_learning(false);
            info!(
                frames = self.noise.frames_observed(),
                noise_floor = self.noise.mean_floor(),
                "Lernphase abgeschlossen"
            );
        }

        let detections = self.transient.detections();
        let factor = self.transient.process(frame_rms(&self.frame));
        if self.transient.detections() > detections {
            self.counters.record_transient();
        }

        let gain = self
            .gain
            .compute(&self.magnitude, self.noise.estimate(), is_speech);
        apply_gain(&mut self.spectrum, gain, factor);

        self.transform.inverse(&mut self.spectrum, &mut self.synthesis)?;
        if !self.synthesis.iter().all(|s| s.is_finite()) {
            return Err(FrameFault::NichtEndlich { stufe: "inverse" });
        }

        self.frames.emit(&self.synthesis);
        Ok(is_speech)
    }

    /// Haelt den Stream nach einem Fehler kontinuierlich: der gefensterte
    /// Analyse-Frame geht unveraendert ins Overlap-Add.
    fn emit_unprocessed(&mut self) {
        for (out, &s) in self.synthesis.iter_mut().zip(&self.frame) {
            *out = if s.is_finite() { s } else { 0.0 };
        }
        self.frames.emit(&self.synthesis);
    }

    fn pass_through(&self, fault: FrameFault) -> BlockOutcome {
        self.counters.record_passthrough();
        warn!("Block unveraendert durchgereicht: {}", fault);
        BlockOutcome::PassThrough(fault)
    }

    /// Stummschalten; leert die Frame-Puffer, das Rauschprofil bleibt.
    pub fn set_muted(&mut self, muted: bool) {
        if muted && !self.muted {
            self.clear_stream();
            debug!("Session stummgeschaltet");
        }
        self.muted = muted;
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Verwirft das gelernte Rauschprofil, die Lernphase beginnt neu
    pub fn reset_profile(&mut self) {
        self.noise.reset();
        self.vad.reset();
        self.gain.reset();
        self.counters.set_learning(true);
        self.counters.set_noise_floor(self.noise.mean_floor());
        info!("Rauschprofil zurueckgesetzt");
    }

    fn clear_stream(&mut self) {
        self.frames.reset();
        self.raw_delay.fill(0.0);
        self.raw_pos = 0;
        self.transient.reset();
    }

    /// Lernphase des Rauschmodells aktiv
    pub fn is_learning(&self) -> bool {
        self.noise.is_learning()
    }

    /// VAD-Entscheidung des letzten Frames
    pub fn is_speech(&self) -> bool {
        self.last_speech
    }

    /// Aktuelle Rauschschaetzung pro Bin
    pub fn noise_estimate(&self) -> &[f32] {
        self.noise.estimate()
    }

    pub fn config(&self) -> &ValidatedConfig {
        &self.config
    }

    pub fn latency_samples(&self) -> usize {
        self.config.latency_samples()
    }

    /// Gemeinsame Zaehler fuer andere Threads
    pub fn counters(&self) -> Arc<SessionCounters> {
        Arc::clone(&self.counters)
    }

    pub fn stats(&self) -> SessionStats {
        self.counters.snapshot(self.latency_samples())
    }

    #[cfg(test)]
    fn inject_size_fault(&mut self) {
        self.inject_size_fault = true;
    }
}

impl AudioProcessor for SuppressionSession {
    fn process(&mut self, samples: &mut [f32]) {
        let mut scratch = std::mem::take(&mut self.block_scratch);
        let step = scratch.len().max(1);
        for chunk in samples.chunks_mut(step) {
            let out = &mut scratch[..chunk.len()];
            self.process_block(chunk, out);
            chunk.copy_from_slice(out);
        }
        self.block_scratch = scratch;
    }

    fn reset(&mut self) {
        self.clear_stream();
        self.noise.reset();
        self.vad.reset();
        self.gain.reset();
        self.last_speech = false;
        self.counters.set_learning(true);
        self.counters.set_noise_floor(self.noise.mean_floor());
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        if enabled && !self.enabled {
            // Alte Frames wuerden sonst in den neuen Stream ueberblenden
            self.clear_stream();
        }
        self.enabled = enabled;
    }
}
