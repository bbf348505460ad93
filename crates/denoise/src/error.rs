//! Fehlertypen fuer die Rauschunterdrueckung
//!
//! Drei Familien:
//! - `ConfigError`: ungueltige Konfiguration, schlaegt beim Start fehl
//! - `SessionStartError`: Session konnte nicht angelegt werden
//! - `FrameFault`: Laufzeitfehler eines einzelnen Frames (fuehrt zu Pass-Through,
//!   wird nie als `Err` an den Aufrufer gereicht)

use thiserror::Error;

/// Ungueltige Konfiguration – die Session wird nie erstellt
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Frame-Groesse {0} ist keine Zweierpotenz")]
    FrameGroesseKeineZweierpotenz(usize),

    #[error("Frame-Groesse {groesse} ausserhalb von {min}..={max}")]
    FrameGroesseAusserhalb {
        groesse: usize,
        min: usize,
        max: usize,
    },

    #[error("Abtastrate {0} Hz wird nicht unterstuetzt")]
    AbtastrateNichtUnterstuetzt(u32),

    #[error("Overlap-Verhaeltnis {0} ausserhalb von [0, 0.9]")]
    OverlapAusserhalb(f32),

    #[error("Oversubtraction-Faktor {0} muss >= 1 sein")]
    OversubtractionUngueltig(f32),

    #[error("Spektraler Floor {0} ausserhalb von (0, 1)")]
    SpektralerFloorUngueltig(f32),

    #[error("Sprach-Floor {0} ausserhalb von (0, 1]")]
    SprachFloorUngueltig(f32),

    #[error("Obergrenze ohne Sprache {ceiling} muss ueber dem spektralen Floor {floor} liegen und <= 1 sein")]
    ObergrenzeUngueltig { ceiling: f32, floor: f32 },

    #[error("Glaettungsfaktor '{name}' = {wert} ausserhalb von [0, 1)")]
    GlaettungUngueltig { name: &'static str, wert: f32 },

    #[error("Rauschboden {0} muss > 0 sein")]
    RauschbodenUngueltig(f32),

    #[error("Lernphase muss mindestens einen Frame umfassen")]
    LernphaseLeer,

    #[error("VAD-Konfiguration ungueltig: {0}")]
    Vad(String),

    #[error("Transienten-Konfiguration ungueltig: {0}")]
    Transient(String),

    #[error("Maximale Blockgroesse muss > 0 sein")]
    BlockGroesseNull,

    #[error("Konfigurationsdatei nicht parsebar: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),
}

/// Session konnte nicht gestartet werden – Aufrufer faellt auf den
/// unveraenderten Capture-Stream zurueck
#[derive(Debug, Error)]
pub enum SessionStartError {
    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(#[from] ConfigError),

    #[error("Speicher fuer {puffer} ({elemente} Elemente) nicht allozierbar")]
    Speicher {
        puffer: &'static str,
        elemente: usize,
    },

    #[error("Session laeuft bereits")]
    BereitsGestartet,
}

/// Laufzeitfehler eines einzelnen Frames
///
/// Wird am Orchestrator abgefangen; der betroffene Block wird unveraendert
/// durchgereicht und die Session laeuft weiter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameFault {
    #[error("Transformationsgroesse passt nicht: erwartet={erwartet}, erhalten={erhalten}")]
    GroesseFalsch { erwartet: usize, erhalten: usize },

    #[error("Nicht-endliche Werte nach Stufe '{stufe}'")]
    NichtEndlich { stufe: &'static str },

    #[error("Block-Laengen passen nicht: Eingang={eingang}, Ausgang={ausgang}")]
    BlockLaenge { eingang: usize, ausgang: usize },
}

/// Fehler der Engine-Schnittstelle (Capture-Vertrag)
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Engine nicht gestartet")]
    NichtGestartet,

    #[error(transparent)]
    Start(#[from] SessionStartError),

    #[error("Steuerkanal nicht erreichbar: {0}")]
    Steuerkanal(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;
pub type SessionResult<T> = Result<T, SessionStartError>;
pub type EngineResult<T> = Result<T, EngineError>;

/// Legt einen Puffer ohne Abbruch bei Speichermangel an
pub(crate) fn reserve<T: Clone>(puffer: &'static str, len: usize, wert: T) -> SessionResult<Vec<T>> {
    let mut v = Vec::new();
    v.try_reserve_exact(len)
        .map_err(|_| SessionStartError::Speicher {
            puffer,
            elemente: len,
        })?;
    v.resize(len, wert);
    Ok(v)
}
