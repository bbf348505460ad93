//! hushwire-denoise – Echtzeit-Rauschunterdrueckung fuer Mikrofon-Streams
//!
//! Pipeline pro Frame:
//! - Hann-Fensterung und Overlap-Add (Frame-Puffer)
//! - FFT via rustfft
//! - Adaptives Rauschmodell mit Lernphase
//! - Spektrale VAD mit Hysterese
//! - Gain: spektrale Subtraktion, Wiener oder Gate
//! - Optionale Transienten-Daempfung
//!
//! Einstieg fuer Echtzeit-Hosts ist `SuppressionEngine`, fuer Dateien
//! `denoise_clip`.

pub mod config;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod frame_buffer;
pub mod offline;
pub mod session;
pub mod spectral;
pub mod stats;

// Bequeme Re-Exporte der wichtigsten Typen
pub use config::{GainStrategy, SuppressionConfig, SuppressionLevel, ValidatedConfig};
pub use dsp::transient::TransientConfig;
pub use dsp::vad::VadConfig;
pub use dsp::AudioProcessor;
pub use engine::{
    clean_block_ring, CleanBlockConsumer, CleanBlockSink, EngineCommand, EngineHandle,
    EngineState, RingSink, SuppressionEngine,
};
pub use error::{ConfigError, EngineError, FrameFault, SessionStartError};
pub use offline::{denoise_clip, ClipResult};
pub use session::{BlockOutcome, SuppressionSession};
pub use stats::{SessionCounters, SessionStats};
