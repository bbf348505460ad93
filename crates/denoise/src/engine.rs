//! SuppressionEngine – Capture-Vertrag `start / push_block / stop`
//!
//! Die Engine laeuft synchron im Audio-Thread des Hosts. Steuerkommandos
//! (Mute, Bypass, Profil verwerfen) kommen ueber einen crossbeam-channel und
//! werden am Anfang jedes Blocks ohne Blockieren abgeholt. Statistiken sind
//! ueber das `EngineHandle` lock-frei lesbar.

use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use ringbuf::traits::{Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use tracing::{debug, info, warn};

use crate::config::SuppressionConfig;
use crate::dsp::AudioProcessor;
use crate::error::{EngineError, EngineResult, SessionStartError};
use crate::session::{BlockOutcome, SuppressionSession};
use crate::stats::{SessionCounters, SessionStats};

/// Kapazitaet des Steuerkanals
const COMMAND_CAPACITY: usize = 64;

/// Empfaenger der bereinigten Bloecke (Transport-Seite)
///
/// Wird im Audio-Thread aufgerufen und darf nicht blockieren.
pub trait CleanBlockSink: Send {
    fn on_clean_block(&mut self, samples: &[f32]);
}

impl<F> CleanBlockSink for F
where
    F: FnMut(&[f32]) + Send,
{
    fn on_clean_block(&mut self, samples: &[f32]) {
        self(samples)
    }
}

/// Consumer-Seite eines `RingSink`
pub type CleanBlockConsumer = HeapCons<f32>;

/// Sink der bereinigte Samples in einen lock-free Ringpuffer schreibt
pub struct RingSink {
    producer: HeapProd<f32>,
    dropped: u64,
}

impl RingSink {
    /// Verworfene Samples (Ring voll)
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl CleanBlockSink for RingSink {
    fn on_clean_block(&mut self, samples: &[f32]) {
        let written = self.producer.push_slice(samples);
        if written < samples.len() {
            self.dropped += (samples.len() - written) as u64;
        }
    }
}

/// Erstellt einen Ring-Sink und den zugehoerigen Consumer
pub fn clean_block_ring(capacity: usize) -> (RingSink, CleanBlockConsumer) {
    let rb = HeapRb::<f32>::new(capacity);
    let (producer, consumer) = rb.split();
    (
        RingSink {
            producer,
            dropped: 0,
        },
        consumer,
    )
}

/// Zustand der Engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    /// Rauschmodell lernt noch
    Learning,
    Active,
}

/// Kommandos an den Audio-Thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineCommand {
    SetMuted(bool),
    SetEnabled(bool),
    ResetProfile,
}

/// Steuer-Handle, kann in beliebige Threads geklont werden
#[derive(Clone)]
pub struct EngineHandle {
    cmd_tx: Sender<EngineCommand>,
    counters: Arc<SessionCounters>,
    latency_samples: usize,
}

impl EngineHandle {
    /// Mikrofon stummschalten (Ausgabe ist Stille, Profil bleibt)
    pub fn set_muted(&self, muted: bool) -> EngineResult<()> {
        self.send_cmd(EngineCommand::SetMuted(muted))
    }

    /// Unterdrueckung ein-/ausschalten (aus = exakte Kopie)
    pub fn set_enabled(&self, enabled: bool) -> EngineResult<()> {
        self.send_cmd(EngineCommand::SetEnabled(enabled))
    }

    /// Rauschprofil verwerfen und neu lernen
    pub fn reset_profile(&self) -> EngineResult<()> {
        self.send_cmd(EngineCommand::ResetProfile)
    }

    /// Aktuelle Statistiken (lock-frei)
    pub fn stats(&self) -> SessionStats {
        self.counters.snapshot(self.latency_samples)
    }

    fn send_cmd(&self, cmd: EngineCommand) -> EngineResult<()> {
        self.cmd_tx.try_send(cmd).map_err(|e| match e {
            TrySendError::Full(_) => EngineError::Steuerkanal("Kanal voll".to_string()),
            TrySendError::Disconnected(_) => EngineError::Steuerkanal("Engine gestoppt".to_string()),
        })
    }
}

struct Running<S> {
    session: SuppressionSession,
    sink: S,
    cmd_tx: Sender<EngineCommand>,
    cmd_rx: Receiver<EngineCommand>,
    out: Vec<f32>,
}

impl<S> Running<S> {
    fn apply(&mut self, cmd: EngineCommand) {
        debug!("Kommando: {:?}", cmd);
        match cmd {
            EngineCommand::SetMuted(muted) => self.session.set_muted(muted),
            EngineCommand::SetEnabled(enabled) => self.session.set_enabled(enabled),
            EngineCommand::ResetProfile => self.session.reset_profile(),
        }
    }
}

/// Rauschunterdrueckung zwischen Capture und Transport
pub struct SuppressionEngine<S: CleanBlockSink> {
    running: Option<Running<S>>,
}

impl<S: CleanBlockSink> Default for SuppressionEngine<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: CleanBlockSink> SuppressionEngine<S> {
    pub fn new() -> Self {
        Self { running: None }
    }

    /// Startet eine Session. Schlaegt fehl wenn bereits eine laeuft oder
    /// die Konfiguration ungueltig ist.
    pub fn start(&mut self, config: SuppressionConfig, sink: S) -> EngineResult<EngineHandle> {
        if self.running.is_some() {
            return Err(SessionStartError::BereitsGestartet.into());
        }

        let max_block = config.max_block_size;
        let session = SuppressionSession::start(config)?;
        let (cmd_tx, cmd_rx) = bounded::<EngineCommand>(COMMAND_CAPACITY);

        let running = Running {
            session,
            sink,
            cmd_tx,
            cmd_rx,
            out: vec![0.0; max_block],
        };
        let handle = Self::handle_for(&running);
        self.running = Some(running);
        info!("SuppressionEngine gestartet");
        Ok(handle)
    }

    /// Verarbeitet einen Capture-Block und reicht das Ergebnis an den Sink.
    ///
    /// Der bereinigte Block ist immer genau so lang wie `samples`.
    pub fn push_block(&mut self, samples: &[f32]) -> EngineResult<BlockOutcome> {
        let running = self.running.as_mut().ok_or(EngineError::NichtGestartet)?;

        while let Ok(cmd) = running.cmd_rx.try_recv() {
            running.apply(cmd);
        }

        if running.out.len() < samples.len() {
            warn!(
                block = samples.len(),
                max = running.out.len(),
                "Block groesser als max_block_size, Ausgabepuffer wird vergroessert"
            );
            running.out.resize(samples.len(), 0.0);
        }

        let out = &mut running.out[..samples.len()];
        let outcome = running.session.process_block(samples, out);
        running.sink.on_clean_block(out);
        Ok(outcome)
    }

    /// Stoppt die Session und gibt Sink und finale Statistiken zurueck.
    ///
    /// Der Host muss sicherstellen, dass kein `push_block` mehr laeuft.
    pub fn stop(&mut self) -> Option<(S, SessionStats)> {
        let running = self.running.take()?;
        let stats = running.session.stop();
        info!("SuppressionEngine gestoppt");
        Some((running.sink, stats))
    }

    pub fn state(&self) -> EngineState {
        match &self.running {
            None => EngineState::Idle,
            Some(r) if r.session.is_learning() => EngineState::Learning,
            Some(_) => EngineState::Active,
        }
    }

    /// Neues Steuer-Handle fuer die laufende Session
    pub fn handle(&self) -> Option<EngineHandle> {
        self.running.as_ref().map(Self::handle_for)
    }

    pub fn is_enabled(&self) -> bool {
        self.running
            .as_ref()
            .map(|r| r.session.is_enabled())
            .unwrap_or(false)
    }

    /// Statistiken der laufenden Session
    pub fn stats(&self) -> Option<SessionStats> {
        self.running.as_ref().map(|r| r.session.stats())
    }

    fn handle_for(running: &Running<S>) -> EngineHandle {
        EngineHandle {
            cmd_tx: running.cmd_tx.clone(),
            counters: running.session.counters(),
            latency_samples: running.session.latency_samples(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ringbuf::traits::{Consumer, Observer};

    fn ton_block(start: usize, n: usize) -> Vec<f32> {
        (start..start + n)
            .map(|i| 0.3 * (2.0 * std::f32::consts::PI * 1000.0 * i as f32 / 48000.0).sin())
            .collect()
    }

    fn sammler() -> impl FnMut(&[f32]) + Send {
        |_: &[f32]| {}
    }

    #[test]
    fn push_ohne_start_fehlschlag() {
        let mut engine = SuppressionEngine::new();
        engine.start(SuppressionConfig::default(), sammler()).unwrap();
        engine.stop();
        assert!(matches!(
            engine.push_block(&[0.0; 256]),
            Err(EngineError::NichtGestartet)
        ));
        assert_eq!(engine.state(), EngineState::Idle);
    }

    #[test]
    fn zustandsfolge_idle_learning_active() {
        let mut engine = SuppressionEngine::new();
        assert_eq!(engine.state(), EngineState::Idle);
        engine.start(SuppressionConfig::default(), sammler()).unwrap();
        assert_eq!(engine.state(), EngineState::Learning);

        for _ in 0..30 {
            engine.push_block(&[0.001; 256]).unwrap();
        }
        assert_eq!(engine.state(), EngineState::Active);

        let (_, stats) = engine.stop().unwrap();
        assert_eq!(stats.frames_processed, 30);
        assert_eq!(engine.state(), EngineState::Idle);
        assert!(engine.stop().is_none());
    }

    #[test]
    fn doppelter_start_abgelehnt() {
        let mut engine = SuppressionEngine::new();
        engine.start(SuppressionConfig::default(), sammler()).unwrap();
        let result = engine.start(SuppressionConfig::default(), sammler());
        assert!(matches!(
            result,
            Err(EngineError::Start(SessionStartError::BereitsGestartet))
        ));
    }

    #[test]
    fn ungueltige_konfiguration() {
        let mut engine = SuppressionEngine::new();
        let config = SuppressionConfig {
            sample_rate: 22050,
            ..Default::default()
        };
        assert!(engine.start(config, sammler()).is_err());
        assert_eq!(engine.state(), EngineState::Idle);
    }

    #[test]
    fn ausgabe_bloecke_gleich_gross() {
        let mut groessen = Vec::new();
        {
            let mut engine = SuppressionEngine::new();
            engine
                .start(SuppressionConfig::default(), |b: &[f32]| groessen.push(b.len()))
                .unwrap();
            let mut pos = 0;
            for n in [480usize, 480, 1024, 128, 10_000] {
                engine.push_block(&ton_block(pos, n)).unwrap();
                pos += n;
            }
        }
        assert_eq!(groessen, vec![480, 480, 1024, 128, 10_000]);
    }

    #[test]
    fn ring_sink_erhaelt_alle_samples() {
        let (sink, mut consumer) = clean_block_ring(8192);
        let mut engine = SuppressionEngine::new();
        engine.start(SuppressionConfig::default(), sink).unwrap();
        for i in 0..8 {
            engine.push_block(&ton_block(i * 480, 480)).unwrap();
        }
        assert_eq!(consumer.occupied_len(), 8 * 480);

        let mut buf = vec![0.0f32; 480];
        assert_eq!(consumer.pop_slice(&mut buf), 480);
        let (sink, _) = engine.stop().unwrap();
        assert_eq!(sink.dropped(), 0);
    }

    #[test]
    fn handle_steuert_mute() {
        let mut engine = SuppressionEngine::new();
        let (sink, mut consumer) = clean_block_ring(4096);
        let handle = engine.start(SuppressionConfig::default(), sink).unwrap();

        handle.set_muted(true).unwrap();
        let outcome = engine.push_block(&ton_block(0, 512)).unwrap();
        assert_eq!(outcome, BlockOutcome::Muted);
        let mut buf = vec![1.0f32; 512];
        consumer.pop_slice(&mut buf);
        assert!(buf.iter().all(|&x| x == 0.0));

        handle.set_muted(false).unwrap();
        assert!(engine.push_block(&ton_block(512, 512)).unwrap().is_processed());
        assert_eq!(handle.stats().muted_blocks, 1);
    }

    #[test]
    fn handle_schaltet_bypass() {
        let mut engine = SuppressionEngine::new();
        let handle = engine.start(SuppressionConfig::default(), sammler()).unwrap();
        handle.set_enabled(false).unwrap();
        let input = ton_block(0, 256);
        assert_eq!(engine.push_block(&input).unwrap(), BlockOutcome::Bypassed);
        assert!(!engine.is_enabled());
    }

    #[test]
    fn handle_setzt_profil_zurueck() {
        let mut engine = SuppressionEngine::new();
        let handle = engine.start(SuppressionConfig::default(), sammler()).unwrap();
        for _ in 0..40 {
            engine.push_block(&[0.001; 256]).unwrap();
        }
        assert_eq!(engine.state(), EngineState::Active);
        handle.reset_profile().unwrap();
        engine.push_block(&[0.001; 256]).unwrap();
        assert_eq!(engine.state(), EngineState::Learning);
        assert!(handle.stats().learning);
    }

    #[test]
    fn handle_nach_stop_getrennt() {
        let mut engine = SuppressionEngine::new();
        let handle = engine.start(SuppressionConfig::default(), sammler()).unwrap();
        engine.stop();
        assert!(matches!(
            handle.set_muted(true),
            Err(EngineError::Steuerkanal(_))
        ));
    }

    #[test]
    fn engine_im_audio_thread() {
        let mut engine = SuppressionEngine::new();
        let (sink, consumer) = clean_block_ring(48_000);
        let handle = engine.start(SuppressionConfig::default(), sink).unwrap();

        let worker = std::thread::spawn(move || {
            for i in 0..50 {
                engine.push_block(&ton_block(i * 480, 480)).unwrap();
            }
            engine.stop()
        });

        let (_, stats) = worker.join().unwrap().unwrap();
        assert_eq!(consumer.occupied_len(), 50 * 480);
        assert_eq!(stats.frames_processed, handle.stats().frames_processed);
        assert!(stats.frames_processed > 0);
    }
}
