use anyhow::{Context, Result};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use std::path::{Path, PathBuf};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::buffer::AudioBuffer;

/// Load an audio file and resample it to `target_rate`.
///
/// `name` is resolved against `base` unless it is already absolute. The
/// decoded channel layout is preserved.
pub fn load_audio_file(base: &Path, name: &str, target_rate: u32) -> Result<AudioBuffer> {
    let path = resolve_path(base, name);

    let buffer = decode_audio(&path)
        .with_context(|| format!("Failed to load audio file: {}", path.display()))?;

    log::info!(
        "  loaded file: '{}', channels: {}, sample rate: {}, duration: {}",
        path.display(),
        buffer.channels(),
        buffer.sample_rate(),
        format_duration(&buffer),
    );

    resample(buffer, target_rate)
        .with_context(|| format!("Failed to resample '{}' to {} Hz", path.display(), target_rate))
}

fn resolve_path(base: &Path, name: &str) -> PathBuf {
    let candidate = Path::new(name);
    if candidate.is_absolute() || base.as_os_str().is_empty() {
        candidate.to_path_buf()
    } else {
        base.join(candidate)
    }
}

fn format_duration(buffer: &AudioBuffer) -> String {
    let total_ms = (buffer.duration_secs() * 1000.0) as u64;
    let ms = total_ms % 1000;
    let s = (total_ms / 1000) % 60;
    let m = (total_ms / 60_000) % 60;
    let h = total_ms / 3_600_000;
    format!("{h:02}:{m:02}:{s:02}.{ms:03}")
}

/// Decode a file into planar f32 channels at its native sample rate.
pub fn decode_audio(path: &Path) -> Result<AudioBuffer> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open audio file: {}", path.display()))?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .context("Failed to probe audio format")?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
        .context("No audio tracks found")?;

    let track_id = track.id;
    let channels = track.codec_params.channels.map_or(1, |c| c.count());
    let sample_rate = track.codec_params.sample_rate.context("Unknown sample rate")?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .context("Failed to create audio decoder")?;

    let mut planar: Vec<Vec<f32>> = vec![Vec::new(); channels];

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(symphonia::core::errors::Error::DecodeError(_)) => continue,
            Err(e) => return Err(e.into()),
        };

        let spec = *decoded.spec();
        let num_frames = decoded.frames();

        let mut sample_buf = SampleBuffer::<f32>::new(num_frames as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);

        for frame in sample_buf.samples().chunks(channels) {
            for (ch, &s) in frame.iter().enumerate() {
                planar[ch].push(s);
            }
        }
    }

    Ok(AudioBuffer::from_channels(planar, sample_rate))
}

/// Resample a buffer to `target_rate` with a windowed-sinc resampler,
/// compensating the resampler's own delay so content stays aligned.
pub fn resample(buffer: AudioBuffer, target_rate: u32) -> Result<AudioBuffer> {
    if buffer.sample_rate() == target_rate || buffer.channels() == 0 || buffer.frames() == 0 {
        let mut out = buffer;
        out.set_sample_rate(target_rate);
        return Ok(out);
    }

    let ratio = target_rate as f64 / buffer.sample_rate() as f64;
    let channels = buffer.channels();
    let frames = buffer.frames();
    let chunk = 1024usize;

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, chunk, channels)
        .context("Failed to create resampler")?;

    let delay = resampler.output_delay();
    let expected = (frames as f64 * ratio).round() as usize;
    let mut out: Vec<Vec<f32>> = vec![Vec::with_capacity(expected + chunk); channels];

    let mut pos = 0usize;
    while pos + chunk <= frames {
        let waves: Vec<&[f32]> = (0..channels)
            .map(|ch| &buffer.channel(ch)[pos..pos + chunk])
            .collect();
        let blocks = resampler.process(&waves[..], None)?;
        append_blocks(&mut out, blocks);
        pos += chunk;
    }
    if pos < frames {
        let waves: Vec<&[f32]> = (0..channels).map(|ch| &buffer.channel(ch)[pos..]).collect();
        let blocks = resampler.process_partial(Some(&waves[..]), None)?;
        append_blocks(&mut out, blocks);
    }

    // Flush until the delayed tail is fully rendered.
    while out[0].len() < expected + delay {
        let blocks = resampler.process_partial::<&[f32]>(None, None)?;
        if blocks.iter().all(Vec::is_empty) {
            break;
        }
        append_blocks(&mut out, blocks);
    }

    for channel in out.iter_mut() {
        let cut = delay.min(channel.len());
        channel.drain(..cut);
        channel.resize(expected, 0.0);
    }

    Ok(AudioBuffer::from_channels(out, target_rate))
}

fn append_blocks(out: &mut [Vec<f32>], blocks: Vec<Vec<f32>>) {
    for (dst, block) in out.iter_mut().zip(blocks) {
        dst.extend(block);
    }
}
