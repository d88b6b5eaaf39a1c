//! Host-facing audio abstractions
//!
//! This module defines the contract between the signal chain and whatever
//! drives it (a plugin host, the offline renderer, tests): the session
//! description handed to `prepare`, the negotiated bus layout, and the
//! block-oriented buffer that is processed in place.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur at the host boundary
#[derive(Debug, Error)]
pub enum AudioError {
    /// `process` was called before `prepare`
    #[error("Processor has not been prepared")]
    NotPrepared,

    /// Buffer carries more channels than the processor was prepared for
    #[error("Channel mismatch: prepared for {expected} channels, buffer has {actual}")]
    ChannelMismatch { expected: usize, actual: usize },

    /// Host asked for a bus layout the processor cannot handle
    #[error("Unsupported bus layout: {inputs} in / {outputs} out")]
    UnsupportedLayout { inputs: usize, outputs: usize },

    /// Invalid configuration for a buffer or session
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

pub type Result<T> = std::result::Result<T, AudioError>;

/// Session description passed to `prepare`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProcessSpec {
    /// Sample rate in Hz
    pub sample_rate: f64,
    /// Largest block the host will ever pass to `process`
    pub maximum_block_size: usize,
    /// Number of channels state must be allocated for
    pub num_channels: usize,
}

impl ProcessSpec {
    pub fn new(sample_rate: f64, maximum_block_size: usize, num_channels: usize) -> Self {
        Self {
            sample_rate,
            maximum_block_size,
            num_channels,
        }
    }

    /// Nyquist frequency for this session
    pub fn nyquist(&self) -> f64 {
        self.sample_rate * 0.5
    }

    /// Reject sessions no processor could run with
    pub fn validate(&self) -> Result<()> {
        if !self.sample_rate.is_finite() || self.sample_rate <= 0.0 {
            return Err(AudioError::InvalidConfiguration(format!(
                "sample rate must be positive, got {}",
                self.sample_rate
            )));
        }
        if self.num_channels == 0 {
            return Err(AudioError::InvalidConfiguration(
                "at least one channel is required".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ProcessSpec {
    fn default() -> Self {
        Self {
            sample_rate: 48000.0,
            maximum_block_size: 512,
            num_channels: 2,
        }
    }
}

/// Main input/output channel counts negotiated with the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusLayout {
    pub inputs: usize,
    pub outputs: usize,
}

impl BusLayout {
    pub const MONO: Self = Self { inputs: 1, outputs: 1 };
    pub const STEREO: Self = Self { inputs: 2, outputs: 2 };

    pub fn new(inputs: usize, outputs: usize) -> Self {
        Self { inputs, outputs }
    }

    /// Number of channels a buffer for this layout carries
    pub fn total_channels(&self) -> usize {
        self.inputs.max(self.outputs)
    }
}

impl Default for BusLayout {
    fn default() -> Self {
        Self::STEREO
    }
}

/// Block of per-channel sample arrays, processed in place
///
/// Storage is allocated once at construction; `set_num_samples` only changes
/// the visible length, so a host can reuse one buffer for blocks of varying
/// size without touching the allocator.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    channels: Vec<Vec<f32>>,
    num_samples: usize,
}

impl AudioBuffer {
    /// Create a silent buffer
    pub fn new(num_channels: usize, num_samples: usize) -> Self {
        Self {
            channels: vec![vec![0.0; num_samples]; num_channels],
            num_samples,
        }
    }

    /// Wrap existing channel data; every channel must have the same length
    pub fn from_channels(channels: Vec<Vec<f32>>) -> Result<Self> {
        let num_samples = channels.first().map(Vec::len).unwrap_or(0);
        if let Some(bad) = channels.iter().position(|ch| ch.len() != num_samples) {
            return Err(AudioError::InvalidConfiguration(format!(
                "channel {} has {} samples, expected {}",
                bad,
                channels[bad].len(),
                num_samples
            )));
        }
        Ok(Self {
            channels,
            num_samples,
        })
    }

    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    pub fn num_samples(&self) -> usize {
        self.num_samples
    }

    /// Samples that fit without reallocating
    pub fn capacity(&self) -> usize {
        self.channels.first().map(Vec::len).unwrap_or(0)
    }

    /// Change the visible block length (must not exceed `capacity`)
    pub fn set_num_samples(&mut self, num_samples: usize) -> Result<()> {
        if num_samples > self.capacity() {
            return Err(AudioError::InvalidConfiguration(format!(
                "block of {} samples exceeds buffer capacity {}",
                num_samples,
                self.capacity()
            )));
        }
        self.num_samples = num_samples;
        Ok(())
    }

    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index][..self.num_samples]
    }

    pub fn channel_mut(&mut self, index: usize) -> &mut [f32] {
        &mut self.channels[index][..self.num_samples]
    }

    /// Iterate over the visible part of every channel
    pub fn channels(&self) -> impl Iterator<Item = &[f32]> {
        let n = self.num_samples;
        self.channels.iter().map(move |ch| &ch[..n])
    }

    /// Zero the visible part of one channel
    pub fn clear_channel(&mut self, index: usize) {
        self.channel_mut(index).fill(0.0);
    }

    /// Zero the visible part of every channel
    pub fn clear(&mut self) {
        for index in 0..self.channels.len() {
            self.clear_channel(index);
        }
    }

    /// Load interleaved frames of `source_channels` channels
    ///
    /// Channels beyond `source_channels` are zeroed, extra source channels
    /// are dropped. The block length becomes the number of frames copied,
    /// bounded by capacity and by the frames available in `interleaved`.
    pub fn copy_from_interleaved(&mut self, interleaved: &[f32], source_channels: usize) -> usize {
        if source_channels == 0 || self.channels.is_empty() {
            self.num_samples = 0;
            return 0;
        }
        let frames = (interleaved.len() / source_channels).min(self.capacity());
        let used = source_channels.min(self.channels.len());
        for (frame_idx, frame) in interleaved
            .chunks_exact(source_channels)
            .take(frames)
            .enumerate()
        {
            for (ch, &sample) in frame[..used].iter().enumerate() {
                self.channels[ch][frame_idx] = sample;
            }
        }
        for channel in &mut self.channels[used..] {
            channel[..frames].fill(0.0);
        }
        self.num_samples = frames;
        frames
    }

    /// Write the visible block as interleaved frames into `out`
    ///
    /// Returns the number of frames written.
    pub fn copy_to_interleaved(&self, out: &mut [f32]) -> usize {
        let channels = self.channels.len();
        if channels == 0 {
            return 0;
        }
        let frames = (out.len() / channels).min(self.num_samples);
        for (frame_idx, frame) in out.chunks_exact_mut(channels).take(frames).enumerate() {
            for (ch, slot) in frame.iter_mut().enumerate() {
                *slot = self.channels[ch][frame_idx];
            }
        }
        frames
    }
}
