//! Verarbeitung kompletter Clips (Dateien, Tests)
//!
//! Entfernt die Latenz der Session, indem `F - 1` Nullen nachgeschoben und
//! die ersten `F - 1` Ausgabesamples verworfen werden. Die Ausgabe ist damit
//! sample-genau zur Eingabe ausgerichtet und gleich lang.

use tracing::debug;

use crate::config::SuppressionConfig;
use crate::error::SessionResult;
use crate::session::{BlockOutcome, SuppressionSession};
use crate::stats::SessionStats;

/// Ergebnis einer Clip-Verarbeitung
#[derive(Debug, Clone)]
pub struct ClipResult {
    pub samples: Vec<f32>,
    pub stats: SessionStats,
}

/// Entrauscht einen kompletten Clip in Bloecken von `block_size` Samples
pub fn denoise_clip(
    config: SuppressionConfig,
    input: &[f32],
    block_size: usize,
) -> SessionResult<ClipResult> {
    let mut session = SuppressionSession::start(config)?;
    let latency = session.latency_samples();
    let block_size = block_size.clamp(1, session.config().config().max_block_size);

    let total = input.len() + latency;
    let mut padded = Vec::with_capacity(total);
    padded.extend_from_slice(input);
    padded.resize(total, 0.0);

    let mut output = vec![0.0f32; total];
    let mut passthrough = 0usize;
    for (inp, out) in padded.chunks(block_size).zip(output.chunks_mut(block_size)) {
        if let BlockOutcome::PassThrough(_) = session.process_block(inp, out) {
            passthrough += 1;
        }
    }

    debug!(
        samples = input.len(),
        block_size,
        passthrough,
        "Clip verarbeitet"
    );

    output.drain(..latency);
    Ok(ClipResult {
        samples: output,
        stats: session.stop(),
    })
}
