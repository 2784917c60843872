use rustfft::{num_complex::Complex, FftPlanner};

use super::window::blackman_nuttall;
use crate::audio::buffer::AudioBuffer;

/// Compute the time-averaged magnitude spectrum ("profile") of a buffer.
///
/// Each channel is analyzed independently with a sliding window of
/// `2^precision` samples advanced in half-window hops. Every hop shifts the
/// window left by half its length, pulls in the next half-hop of source
/// samples (zeros once the channel is exhausted), applies a Blackman–Nuttall
/// taper and accumulates the FFT magnitudes. One extra all-zero hop flushes
/// the window tail, so the step count is `ceil(len / (bins/2)) + 1`.
///
/// The result is an `AudioBuffer` with `src.channels()` channels of `bins`
/// non-negative magnitude values each.
pub fn spectral_profile(src: &AudioBuffer, precision: u32) -> AudioBuffer {
    let bins = 1usize << precision;
    let half = bins >> 1;
    let wnd = blackman_nuttall(bins);

    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(bins);
    let mut scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];

    let steps = src.frames().div_ceil(half) + 1;
    let norm = 1.0 / steps as f32;

    let mut profile = AudioBuffer::new(src.channels(), bins, src.sample_rate());

    for (ch, data) in src.iter_channels().enumerate() {
        let mut window = vec![0.0f32; bins];
        let mut sum = vec![0.0f32; bins];
        let mut fft_work = vec![Complex::new(0.0, 0.0); bins];
        let mut off = 0usize;

        for _ in 0..steps {
            // Slide the analysis window by half its length.
            window.copy_within(half.., 0);
            for i in 0..half {
                window[half + i] = data.get(off + i).copied().unwrap_or(0.0);
            }
            off += half;

            for i in 0..bins {
                fft_work[i] = Complex::new(window[i] * wnd[i], 0.0);
            }
            fft.process_with_scratch(&mut fft_work, &mut scratch);

            for (acc, c) in sum.iter_mut().zip(fft_work.iter()) {
                *acc += c.norm();
            }
        }

        let out = profile.channel_mut(ch);
        for (dst, acc) in out.iter_mut().zip(sum.iter()) {
            *dst = acc * norm;
        }
    }

    profile
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, amp: f32, rate: u32, frames: usize) -> Vec<f32> {
        (0..frames)
            .map(|i| amp * (2.0 * std::f32::consts::PI * freq * i as f32 / rate as f32).sin())
            .collect()
    }

    #[test]
    fn silent_input_yields_zero_profile() {
        let src = AudioBuffer::new(2, 10000, 48000);
        let p = spectral_profile(&src, 10);
        assert_eq!(p.channels(), 2);
        assert_eq!(p.frames(), 1024);
        assert!(p.iter_channels().all(|c| c.iter().all(|&v| v == 0.0)));
    }

    #[test]
    fn profile_geometry_follows_precision() {
        let src = AudioBuffer::new(3, 5000, 44100);
        for k in [8u32, 10, 12] {
            let p = spectral_profile(&src, k);
            assert_eq!(p.frames(), 1 << k);
            assert_eq!(p.channels(), 3);
            assert_eq!(p.sample_rate(), 44100);
        }
    }

    #[test]
    fn sine_peaks_at_its_bin() {
        let rate = 48000u32;
        let bins = 1usize << 10;
        // Pick a frequency that lands exactly on bin 64.
        let freq = 64.0 * rate as f32 / bins as f32;
        let src = AudioBuffer::from_channels(vec![sine(freq, 1.0, rate, rate as usize)], rate);

        let p = spectral_profile(&src, 10);
        let half = &p.channel(0)[..bins / 2];
        let peak_bin = half
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .unwrap()
            .0;
        assert_eq!(peak_bin, 64);
    }

    #[test]
    fn profile_scales_linearly_with_amplitude() {
        let rate = 48000u32;
        let freq = 1000.0;
        let loud = AudioBuffer::from_channels(vec![sine(freq, 1.0, rate, 20000)], rate);
        let soft = AudioBuffer::from_channels(vec![sine(freq, 0.5, rate, 20000)], rate);

        let pl = spectral_profile(&loud, 10);
        let ps = spectral_profile(&soft, 10);
        let peak_l = pl.channel(0).iter().cloned().fold(0.0f32, f32::max);
        let peak_s = ps.channel(0).iter().cloned().fold(0.0f32, f32::max);
        assert!((peak_l / peak_s - 2.0).abs() < 0.05);
    }
}
