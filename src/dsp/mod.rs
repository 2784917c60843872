pub mod convolve;
pub mod ir;
pub mod postprocess;
pub mod profile;
pub mod window;

use thiserror::Error;

/// Errors produced by the numeric core.
///
/// Core functions return these without logging; the orchestrator decides
/// how to report them. I/O and decode failures live with the audio
/// collaborators, not here.
#[derive(Debug, Error)]
pub enum DspError {
    #[error("channel count mismatch: {left} vs {right}")]
    ChannelMismatch { left: usize, right: usize },

    #[error("buffer length mismatch: {left} vs {right}")]
    LengthMismatch { left: usize, right: usize },
}

/// Convert decibels to a linear gain multiplier.
pub fn db_to_gain(db: f32) -> f32 {
    10.0f32.powf(db / 20.0)
}

/// Linear gain to decibels.
pub fn gain_to_db(gain: f32) -> f32 {
    20.0 * gain.log10()
}
