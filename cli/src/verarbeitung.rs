//! WAV-Datei durch eine Suppression-Session schicken

use std::path::Path;

use anyhow::{Context, Result};
use hushwire_denoise::{denoise_clip, SessionStats, SuppressionConfig};
use tracing::info;

use crate::wav;

/// Liest `input`, entrauscht und schreibt `output`.
///
/// Die Abtastrate der Session folgt der Eingabedatei.
pub fn datei_verarbeiten(
    input: &Path,
    output: &Path,
    config: &SuppressionConfig,
    block_size: usize,
) -> Result<SessionStats> {
    let clip = wav::lesen(input)?;
    info!(
        datei = %input.display(),
        samples = clip.samples.len(),
        sample_rate = clip.sample_rate,
        kanaele = clip.channels,
        "Eingabe geladen"
    );

    let config = SuppressionConfig {
        sample_rate: clip.sample_rate,
        ..config.clone()
    };
    let result = denoise_clip(config, &clip.samples, block_size)
        .context("Rauschunterdrueckung konnte nicht gestartet werden")?;

    wav::schreiben(output, &result.samples, clip.sample_rate)?;
    info!(
        datei = %output.display(),
        frames = result.stats.frames_processed,
        sprache = result.stats.speech_frames,
        "Ausgabe geschrieben"
    );
    Ok(result.stats)
}
