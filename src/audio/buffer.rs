/// Planar multi-channel sample container.
///
/// All pipeline stages exchange audio through this type: time-domain
/// recordings, averaged magnitude spectra and FIR kernels all use the same
/// layout (every channel holds the same number of frames). Each buffer has
/// exactly one owner; stages take it by reference and hand back a fresh one.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    channels: Vec<Vec<f32>>,
    sample_rate: u32,
}

impl AudioBuffer {
    /// Zero-filled buffer of `channels` x `frames`.
    pub fn new(channels: usize, frames: usize, sample_rate: u32) -> Self {
        Self {
            channels: vec![vec![0.0; frames]; channels],
            sample_rate,
        }
    }

    /// Wrap already-decoded planar data. All channels must be equally long.
    pub fn from_channels(channels: Vec<Vec<f32>>, sample_rate: u32) -> Self {
        if let Some(first) = channels.first() {
            debug_assert!(channels.iter().all(|c| c.len() == first.len()));
        }
        Self {
            channels,
            sample_rate,
        }
    }

    pub fn channels(&self) -> usize {
        self.channels.len()
    }

    /// Frame count (samples per channel).
    pub fn frames(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate;
    }

    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index]
    }

    pub fn channel_mut(&mut self, index: usize) -> &mut Vec<f32> {
        &mut self.channels[index]
    }

    pub fn iter_channels(&self) -> impl Iterator<Item = &[f32]> {
        self.channels.iter().map(Vec::as_slice)
    }

    pub fn iter_channels_mut(&mut self) -> impl Iterator<Item = &mut Vec<f32>> {
        self.channels.iter_mut()
    }

    /// Peak absolute sample value across all channels.
    pub fn peak(&self) -> f32 {
        self.channels
            .iter()
            .flat_map(|c| c.iter())
            .map(|s| s.abs())
            .fold(0.0f32, f32::max)
    }

    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f32 / self.sample_rate as f32
    }
}
