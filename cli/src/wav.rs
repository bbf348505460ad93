//! WAV-Ein-/Ausgabe via hound
//!
//! Eingaben werden auf Mono (Mittelwert der Kanaele) und f32 in [-1, 1]
//! gebracht. Ausgaben sind immer Mono, 32-bit Float.

use std::path::Path;

use anyhow::{Context, Result};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

/// Geladener Mono-Clip
#[derive(Debug, Clone)]
pub struct MonoClip {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    /// Kanalanzahl der Quelldatei
    pub channels: u16,
}

/// Laedt eine WAV-Datei und mischt auf Mono herunter
pub fn lesen(pfad: &Path) -> Result<MonoClip> {
    let reader = WavReader::open(pfad)
        .with_context(|| format!("WAV-Datei '{}' nicht lesbar", pfad.display()))?;
    let spec = reader.spec();
    let channels = spec.channels.max(1);

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<_, _>>()
            .context("Float-Samples nicht dekodierbar")?,
        SampleFormat::Int => {
            let max = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max))
                .collect::<Result<_, _>>()
                .context("Integer-Samples nicht dekodierbar")?
        }
    };

    let samples = interleaved
        .chunks(channels as usize)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect();

    Ok(MonoClip {
        samples,
        sample_rate: spec.sample_rate,
        channels,
    })
}

/// Schreibt Mono-Samples als 32-bit Float WAV
pub fn schreiben(pfad: &Path, samples: &[f32], sample_rate: u32) -> Result<()> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer = WavWriter::create(pfad, spec)
        .with_context(|| format!("WAV-Datei '{}' nicht schreibbar", pfad.display()))?;
    for &s in samples {
        writer.write_sample(s)?;
    }
    writer.finalize()?;
    Ok(())
}
