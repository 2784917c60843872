use crate::audio::buffer::AudioBuffer;

/// Anything quieter than this is treated as silence and left untouched.
const SILENCE_THRESHOLD: f32 = 1e-6;

/// Peak-normalization policy for rendered audio.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NormalizeMode {
    /// Never rescale.
    #[default]
    None,
    /// Attenuate only when the peak exceeds the target.
    Above,
    /// Amplify only when the peak is under the target.
    Below,
    /// Always rescale the peak to the target exactly.
    Always,
}

/// Scale the buffer so its absolute peak matches `target_gain`, subject to
/// the selected mode. Silent buffers (peak below 1e-6) are never touched.
pub fn normalize(buffer: &mut AudioBuffer, target_gain: f32, mode: NormalizeMode) {
    let peak = buffer.peak();
    if peak < SILENCE_THRESHOLD {
        return;
    }

    let apply = match mode {
        NormalizeMode::None => false,
        NormalizeMode::Above => peak > target_gain,
        NormalizeMode::Below => peak < target_gain,
        NormalizeMode::Always => true,
    };
    if !apply {
        return;
    }

    let k = target_gain / peak;
    for channel in buffer.iter_channels_mut() {
        for s in channel.iter_mut() {
            *s *= k;
        }
    }
}

/// Strip the constant delay of a linear-phase filter by removing the first
/// `samples` frames from every channel (saturating at the buffer length).
pub fn compensate_latency(buffer: &mut AudioBuffer, samples: usize) {
    let cut = samples.min(buffer.frames());
    if cut == 0 {
        return;
    }
    for channel in buffer.iter_channels_mut() {
        channel.drain(..cut);
    }
}

/// Truncate or zero-pad every channel to exactly `frames` samples.
pub fn match_length(buffer: &mut AudioBuffer, frames: usize) {
    for channel in buffer.iter_channels_mut() {
        channel.resize(frames, 0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stereo(a: Vec<f32>, b: Vec<f32>) -> AudioBuffer {
        AudioBuffer::from_channels(vec![a, b], 48000)
    }

    #[test]
    fn always_hits_target_exactly() {
        let mut buf = stereo(vec![0.1, -0.4], vec![0.2, 0.0]);
        normalize(&mut buf, 0.8, NormalizeMode::Always);
        assert!((buf.peak() - 0.8).abs() < 1e-6);
    }

    #[test]
    fn above_only_attenuates() {
        let mut buf = stereo(vec![0.9], vec![0.0]);
        normalize(&mut buf, 0.5, NormalizeMode::Above);
        assert!((buf.peak() - 0.5).abs() < 1e-6);

        let mut quiet = stereo(vec![0.2], vec![0.0]);
        normalize(&mut quiet, 0.5, NormalizeMode::Above);
        assert!((quiet.peak() - 0.2).abs() < 1e-6);
    }

    #[test]
    fn below_only_amplifies() {
        let mut buf = stereo(vec![0.2], vec![0.0]);
        normalize(&mut buf, 0.5, NormalizeMode::Below);
        assert!((buf.peak() - 0.5).abs() < 1e-6);

        let mut loud = stereo(vec![0.9], vec![0.0]);
        normalize(&mut loud, 0.5, NormalizeMode::Below);
        assert!((loud.peak() - 0.9).abs() < 1e-6);
    }

    #[test]
    fn none_never_scales() {
        let mut buf = stereo(vec![0.9], vec![0.0]);
        normalize(&mut buf, 0.1, NormalizeMode::None);
        assert!((buf.peak() - 0.9).abs() < 1e-6);
    }

    #[test]
    fn silence_guard_blocks_scaling() {
        let mut buf = stereo(vec![1e-7, -1e-8], vec![0.0, 0.0]);
        let before = buf.clone();
        normalize(&mut buf, 1.0, NormalizeMode::Always);
        assert_eq!(buf, before);
    }

    #[test]
    fn compensate_zero_is_identity() {
        let mut buf = stereo(vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]);
        let before = buf.clone();
        compensate_latency(&mut buf, 0);
        assert_eq!(buf, before);
    }

    #[test]
    fn compensate_shifts_to_front() {
        let mut buf = stereo(vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]);
        compensate_latency(&mut buf, 2);
        assert_eq!(buf.channel(0), &[3.0]);
        assert_eq!(buf.channel(1), &[6.0]);
    }

    #[test]
    fn compensate_past_end_empties_buffer() {
        let mut buf = stereo(vec![1.0, 2.0], vec![3.0, 4.0]);
        compensate_latency(&mut buf, 10);
        assert_eq!(buf.frames(), 0);
        assert_eq!(buf.channels(), 2);
    }

    #[test]
    fn match_length_truncates_and_pads() {
        let mut buf = stereo(vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]);
        match_length(&mut buf, 2);
        assert_eq!(buf.channel(0), &[1.0, 2.0]);

        match_length(&mut buf, 4);
        assert_eq!(buf.channel(0), &[1.0, 2.0, 0.0, 0.0]);
    }
}
