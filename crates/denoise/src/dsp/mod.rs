//! DSP-Stufen der Rauschunterdrueckung
//!
//! Die einzelnen Stufen (Rauschmodell, VAD, Gain, Transienten) arbeiten auf
//! dem Betragsspektrum eines Frames und werden ausschliesslich vom
//! Orchestrator in `session` aufgerufen. Nach aussen tritt die Session
//! ueber das `AudioProcessor` Trait auf.

pub mod gain;
pub mod noise_model;
pub mod transient;
pub mod vad;

/// Gemeinsames Trait fuer blockweise Audio-Verarbeitung
///
/// Verarbeitet Samples in-place und ist Send, damit der Prozessor in den
/// Audio-Thread verschoben werden kann.
pub trait AudioProcessor: Send {
    /// Verarbeitet einen Puffer von Samples in-place
    fn process(&mut self, samples: &mut [f32]);

    /// Setzt den internen Zustand zurueck
    fn reset(&mut self);

    /// Gibt zurueck ob der Prozessor aktiv ist
    fn is_enabled(&self) -> bool;

    /// Aktiviert oder deaktiviert den Prozessor (deaktiviert = Pass-Through)
    fn set_enabled(&mut self, enabled: bool);
}
