use rustfft::{num_complex::Complex, FftPlanner};

use super::DspError;
use crate::audio::buffer::AudioBuffer;

/// Convolve `src` with `ir` and overlap-add the dry and wet paths.
///
/// `latency` is the signed sample offset reported by the IR trimmer: the
/// dry copy lands at `max(latency, 0)` and the wet signal at
/// `max(-latency, 0)`, which keeps both paths time-aligned regardless of
/// how much of the kernel head was cut away. The output is sized to hold
/// the shifted dry copy and the full wet tail:
/// `max(wet_len, dry_len + latency)` for positive latency,
/// `max(wet_len - latency, dry_len)` otherwise, where
/// `wet_len = dry_len + ir_len`.
///
/// The wet path is an FFT overlap-add linear convolution, numerically
/// equivalent to direct convolution. An empty IR contributes silence.
pub fn convolve(
    src: &AudioBuffer,
    ir: &AudioBuffer,
    latency: isize,
    dry_gain: f32,
    wet_gain: f32,
) -> Result<AudioBuffer, DspError> {
    if src.channels() != ir.channels() {
        return Err(DspError::ChannelMismatch {
            left: src.channels(),
            right: ir.channels(),
        });
    }

    let dry_len = src.frames();
    let ir_len = ir.frames();
    let wet_len = dry_len + ir_len;

    let out_len = if latency > 0 {
        wet_len.max(dry_len + latency as usize)
    } else {
        (wet_len + (-latency) as usize).max(dry_len)
    };
    let dry_off = latency.max(0) as usize;
    let wet_off = (-latency).max(0) as usize;

    let mut out = AudioBuffer::new(src.channels(), out_len, src.sample_rate());

    for ch in 0..src.channels() {
        let dry = src.channel(ch);
        let dst = out.channel_mut(ch);

        for (i, &s) in dry.iter().enumerate() {
            dst[dry_off + i] += dry_gain * s;
        }

        if ir_len == 0 || dry_len == 0 {
            continue;
        }

        let wet = fft_convolve(dry, ir.channel(ch));
        for (i, &s) in wet.iter().take(wet_len).enumerate() {
            dst[wet_off + i] += wet_gain * s;
        }
    }

    Ok(out)
}

/// Overlap-add convolution of one channel. Output length is
/// `signal.len() + kernel.len() - 1`.
fn fft_convolve(signal: &[f32], kernel: &[f32]) -> Vec<f32> {
    let fft_size = (2 * kernel.len().next_power_of_two()).max(64);
    let block = fft_size - kernel.len() + 1;

    let mut planner = FftPlanner::<f32>::new();
    let forward = planner.plan_fft_forward(fft_size);
    let inverse = planner.plan_fft_inverse(fft_size);
    let mut scratch = vec![
        Complex::new(0.0, 0.0);
        forward
            .get_inplace_scratch_len()
            .max(inverse.get_inplace_scratch_len())
    ];

    // Kernel spectrum, computed once.
    let mut spectrum = vec![Complex::new(0.0, 0.0); fft_size];
    for (c, &k) in spectrum.iter_mut().zip(kernel.iter()) {
        *c = Complex::new(k, 0.0);
    }
    forward.process_with_scratch(&mut spectrum, &mut scratch);

    let scale = 1.0 / fft_size as f32;
    let mut result = vec![0.0f32; signal.len() + kernel.len() - 1];
    let mut work = vec![Complex::new(0.0, 0.0); fft_size];

    let mut pos = 0usize;
    while pos < signal.len() {
        let n = block.min(signal.len() - pos);

        for (i, c) in work.iter_mut().enumerate() {
            *c = if i < n {
                Complex::new(signal[pos + i], 0.0)
            } else {
                Complex::new(0.0, 0.0)
            };
        }
        forward.process_with_scratch(&mut work, &mut scratch);
        for (w, h) in work.iter_mut().zip(spectrum.iter()) {
            *w *= *h;
        }
        inverse.process_with_scratch(&mut work, &mut scratch);

        let tail = (n + kernel.len() - 1).min(result.len() - pos);
        for i in 0..tail {
            result[pos + i] += work[i].re * scale;
        }
        pos += n;
    }

    result
}
