use anyhow::{Context, Result};
use std::path::Path;

use super::buffer::AudioBuffer;

/// Write a buffer as a 32-bit float WAV file, creating parent directories
/// as needed.
pub fn save_audio_file(buffer: &AudioBuffer, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
    }

    let spec = hound::WavSpec {
        channels: buffer.channels() as u16,
        sample_rate: buffer.sample_rate(),
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };

    let mut writer = hound::WavWriter::create(path, spec)
        .with_context(|| format!("Failed to create output file: {}", path.display()))?;

    for frame in 0..buffer.frames() {
        for ch in 0..buffer.channels() {
            writer.write_sample(buffer.channel(ch)[frame])?;
        }
    }

    writer
        .finalize()
        .with_context(|| format!("Failed to finalize output file: {}", path.display()))?;

    log::info!("  written file: '{}'", path.display());
    Ok(())
}
