use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

use super::window::blackman_nuttall;
use super::DspError;
use crate::audio::buffer::AudioBuffer;

/// Head/tail trimming and fade shaping for a raw impulse response.
///
/// All values are percentages of the raw IR length. Head and tail cuts are
/// clamped to [0, 100]; fades are only floored at 0, so a fade longer than
/// the retained span simply never reaches full gain.
#[derive(Debug, Clone, Copy)]
pub struct TrimParams {
    pub head_cut: f32,
    pub tail_cut: f32,
    pub fade_in: f32,
    pub fade_out: f32,
}

impl Default for TrimParams {
    fn default() -> Self {
        Self {
            head_cut: 45.0,
            tail_cut: 5.0,
            fade_in: 2.0,
            fade_out: 50.0,
        }
    }
}

/// Derive a linear-phase corrective impulse response from two profiles.
///
/// The ratio spectrum `child / master` is the frequency response that maps
/// the master's timbre onto the child's. It is packed as a zero-phase
/// spectrum, inverse-transformed, rotated by half the buffer so the peak
/// sits at the temporal center, and tapered with the same Blackman–Nuttall
/// window used during profiling.
///
/// `db_range` is accepted for interface stability but the baseline
/// algorithm performs straight division without dynamic-range clamping.
pub fn timbre_impulse_response(
    master: &AudioBuffer,
    child: &AudioBuffer,
    precision: u32,
    _db_range: f32,
) -> Result<AudioBuffer, DspError> {
    if master.channels() != child.channels() {
        return Err(DspError::ChannelMismatch {
            left: master.channels(),
            right: child.channels(),
        });
    }
    if master.frames() != child.frames() {
        return Err(DspError::LengthMismatch {
            left: master.frames(),
            right: child.frames(),
        });
    }

    let bins = 1usize << precision;
    let mut synth = IrSynth::new(bins);
    let mut out = AudioBuffer::new(child.channels(), bins, child.sample_rate());

    let mut ratio = vec![0.0f32; bins];
    for ch in 0..child.channels() {
        let m = master.channel(ch);
        let c = child.channel(ch);
        let n = bins.min(c.len());
        for i in 0..n {
            ratio[i] = c[i] / m[i];
        }
        for v in ratio[n..].iter_mut() {
            *v = 0.0;
        }
        synth.render(&ratio, out.channel_mut(ch));
    }

    Ok(out)
}

/// Render a single profile directly as a linear-phase impulse response.
///
/// Identical inverse-FFT/rotate/window path as [`timbre_impulse_response`]
/// without the spectral division; used to audition a profile as a filter.
pub fn profile_to_impulse_response(
    profile: &AudioBuffer,
    precision: u32,
) -> Result<AudioBuffer, DspError> {
    let bins = 1usize << precision;
    let mut synth = IrSynth::new(bins);
    let mut out = AudioBuffer::new(profile.channels(), bins, profile.sample_rate());

    let mut mag = vec![0.0f32; bins];
    for ch in 0..profile.channels() {
        let src = profile.channel(ch);
        let n = bins.min(src.len());
        mag[..n].copy_from_slice(&src[..n]);
        for v in mag[n..].iter_mut() {
            *v = 0.0;
        }
        synth.render(&mag, out.channel_mut(ch));
    }

    Ok(out)
}

/// Cut head/tail percentages from a raw IR, apply fades, report latency.
///
/// Returns the trimmed kernel together with its signed processing latency:
/// `raw_len / 2 - head_cut_samples`. A negative value means the energy
/// center moved earlier than the original temporal center. Cutting away the
/// whole IR yields a legal zero-length kernel.
pub fn trim_impulse_response(
    src: &AudioBuffer,
    params: &TrimParams,
) -> (AudioBuffer, isize) {
    let len = src.frames();
    let head = (params.head_cut.clamp(0.0, 100.0) / 100.0 * len as f32) as usize;
    let tail = (params.tail_cut.clamp(0.0, 100.0) / 100.0 * len as f32) as usize;
    let count = len.saturating_sub(head).saturating_sub(tail);

    let fade_in = (params.fade_in.max(0.0) / 100.0 * len as f32) as usize;
    let fade_out = (params.fade_out.max(0.0) / 100.0 * len as f32) as usize;

    let mut out = AudioBuffer::new(src.channels(), count, src.sample_rate());
    for ch in 0..src.channels() {
        let data = &src.channel(ch)[head..head + count];
        let dst = out.channel_mut(ch);
        dst.copy_from_slice(data);

        if fade_in > 0 {
            for i in 0..fade_in.min(count) {
                dst[i] *= i as f32 / fade_in as f32;
            }
        }
        if fade_out > 0 {
            for j in 0..fade_out.min(count) {
                dst[count - 1 - j] *= j as f32 / fade_out as f32;
            }
        }
    }

    let latency = (len / 2) as isize - head as isize;
    (out, latency)
}

/// Shared inverse-FFT synthesis state for one IR computation.
struct IrSynth {
    bins: usize,
    ifft: Arc<dyn Fft<f32>>,
    work: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    wnd: Vec<f32>,
}

impl IrSynth {
    fn new(bins: usize) -> Self {
        let mut planner = FftPlanner::<f32>::new();
        let ifft = planner.plan_fft_inverse(bins);
        let scratch = vec![Complex::new(0.0, 0.0); ifft.get_inplace_scratch_len()];
        Self {
            bins,
            ifft,
            work: vec![Complex::new(0.0, 0.0); bins],
            scratch,
            wnd: blackman_nuttall(bins),
        }
    }

    /// Zero-phase magnitudes -> time-centered, windowed FIR taps.
    fn render(&mut self, magnitudes: &[f32], dst: &mut [f32]) {
        let bins = self.bins;
        let half = bins >> 1;

        for (w, &m) in self.work.iter_mut().zip(magnitudes.iter()) {
            *w = Complex::new(m, 0.0);
        }
        self.ifft
            .process_with_scratch(&mut self.work, &mut self.scratch);

        // rustfft leaves the inverse transform unnormalized.
        let scale = 1.0 / bins as f32;
        for i in 0..bins {
            dst[i] = self.work[(i + half) % bins].re * scale * self.wnd[i];
        }
    }
}
