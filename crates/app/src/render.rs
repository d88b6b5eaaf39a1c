//! Offline rendering of WAV files through the signal chain
//!
//! The renderer plays the host: it negotiates a layout from the input file,
//! prepares the chain once and streams the audio through it in fixed-size
//! blocks, the way a plugin host would.

use focuscrush_core::domain::{
    AudioBuffer, AudioError, AudioProcessor, BusLayout, ChainConfig, ConfigError, ProcessSpec,
};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use serde::Serialize;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, instrument};

pub type Result<T> = std::result::Result<T, RenderError>;

/// Default block length handed to the chain
pub const DEFAULT_BLOCK_SIZE: usize = 512;

/// Errors that can occur while rendering
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Unsupported channel count {0}: only mono and stereo input are handled")]
    UnsupportedChannels(usize),

    #[error("Block size must be at least one sample")]
    InvalidBlockSize,
}

/// Summary of a finished render
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RenderStats {
    pub frames: usize,
    pub blocks: usize,
    pub sample_rate: u32,
    pub input_channels: usize,
    pub output_channels: usize,
    /// Largest absolute output sample
    pub peak: f32,
}

/// Layout used for an input with `input_channels` channels
///
/// Inputs always feed the matching outputs; a mono file can still produce
/// stereo output when the configuration asks for two outputs.
pub fn negotiate_layout(input_channels: usize, configured: BusLayout) -> Result<BusLayout> {
    if !(1..=2).contains(&input_channels) {
        return Err(RenderError::UnsupportedChannels(input_channels));
    }
    Ok(BusLayout::new(
        input_channels,
        configured.outputs.clamp(input_channels, 2),
    ))
}

/// Run interleaved samples through a chain built from `config`
///
/// Returns the interleaved output (one frame per input frame, with the
/// negotiated number of output channels) and the render summary.
#[instrument(skip(config, interleaved), fields(samples = interleaved.len()))]
pub fn render_interleaved(
    config: ChainConfig,
    interleaved: &[f32],
    input_channels: usize,
    sample_rate: u32,
    block_size: usize,
) -> Result<(Vec<f32>, RenderStats)> {
    if block_size == 0 {
        return Err(RenderError::InvalidBlockSize);
    }
    let layout = negotiate_layout(input_channels, config.layout)?;
    let outputs = layout.outputs;

    let mut chain = ChainConfig { layout, ..config }.into_chain()?;
    chain.prepare(ProcessSpec::new(sample_rate as f64, block_size, outputs))?;

    let total_frames = interleaved.len() / input_channels;
    let mut output = vec![0.0f32; total_frames * outputs];
    let mut buffer = AudioBuffer::new(outputs, block_size);
    let mut blocks = 0;
    let mut written = 0;

    for block in interleaved.chunks(block_size * input_channels) {
        let frames = buffer.copy_from_interleaved(block, input_channels);
        if frames == 0 {
            break;
        }
        chain.process(&mut buffer)?;
        written += buffer.copy_to_interleaved(&mut output[written * outputs..]);
        blocks += 1;
    }

    chain.release_resources();

    let peak = output.iter().fold(0.0f32, |acc, &s| acc.max(s.abs()));
    let stats = RenderStats {
        frames: written,
        blocks,
        sample_rate,
        input_channels,
        output_channels: outputs,
        peak,
    };
    debug!(?stats, "Render finished");
    Ok((output, stats))
}

/// Read a WAV file into interleaved samples normalized to [-1, 1]
pub fn read_wav(path: &Path) -> Result<(WavSpec, Vec<f32>)> {
    let mut reader = WavReader::open(path)?;
    let spec = reader.spec();

    let samples = match spec.sample_format {
        SampleFormat::Float => reader.samples::<f32>().collect::<std::result::Result<Vec<_>, _>>()?,
        SampleFormat::Int => {
            let max_val = (1_i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<std::result::Result<Vec<_>, _>>()?
        }
    };

    Ok((spec, samples))
}

/// Write interleaved samples as a 32-bit float WAV file
pub fn write_wav(path: &Path, samples: &[f32], channels: usize, sample_rate: u32) -> Result<()> {
    let spec = WavSpec {
        channels: channels as u16,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer = WavWriter::create(path, spec)?;
    for &s in samples {
        writer.write_sample(s)?;
    }
    writer.finalize()?;
    Ok(())
}

/// Render `input` into `output` with the given configuration
#[instrument(skip(config))]
pub fn render_file(
    input: &Path,
    output: &Path,
    config: ChainConfig,
    block_size: usize,
) -> Result<RenderStats> {
    let (spec, samples) = read_wav(input)?;
    info!(
        path = %input.display(),
        channels = spec.channels,
        sample_rate = spec.sample_rate,
        "Rendering file"
    );

    let (rendered, stats) = render_interleaved(
        config,
        &samples,
        spec.channels as usize,
        spec.sample_rate,
        block_size,
    )?;
    write_wav(output, &rendered, stats.output_channels, spec.sample_rate)?;

    info!(
        path = %output.display(),
        frames = stats.frames,
        peak = stats.peak,
        "Render written"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use focuscrush_core::domain::{ChainOptions, ParamId};
    use tempfile::TempDir;

    fn sine(frames: usize, channels: usize) -> Vec<f32> {
        (0..frames)
            .flat_map(|i| {
                let s = (0.5 * (2.0 * std::f64::consts::PI * 1000.0 * i as f64 / 44100.0).sin()) as f32;
                std::iter::repeat(s).take(channels)
            })
            .collect()
    }

    #[test]
    fn test_negotiate_layout() {
        assert_eq!(negotiate_layout(1, BusLayout::STEREO).unwrap(), BusLayout::new(1, 2));
        assert_eq!(negotiate_layout(1, BusLayout::MONO).unwrap(), BusLayout::MONO);
        assert_eq!(negotiate_layout(2, BusLayout::MONO).unwrap(), BusLayout::STEREO);
        assert!(matches!(
            negotiate_layout(6, BusLayout::STEREO),
            Err(RenderError::UnsupportedChannels(6))
        ));
    }

    #[test]
    fn test_render_preserves_length_with_partial_block() {
        let input = sine(1000, 2);
        let (output, stats) =
            render_interleaved(ChainConfig::default(), &input, 2, 44100, 256).unwrap();

        assert_eq!(stats.frames, 1000);
        assert_eq!(stats.blocks, 4);
        assert_eq!(output.len(), input.len());
        assert!(output.iter().all(|s| s.is_finite()));
        assert!(stats.peak > 0.0 && stats.peak <= 1.0);
    }

    #[test]
    fn test_render_mono_to_stereo_zero_fills_right() {
        let input = sine(300, 1);
        let (output, stats) =
            render_interleaved(ChainConfig::default(), &input, 1, 44100, 128).unwrap();

        assert_eq!(stats.output_channels, 2);
        assert_eq!(output.len(), 600);
        assert!(output.chunks_exact(2).all(|frame| frame[1] == 0.0));
        assert!(output.chunks_exact(2).any(|frame| frame[0] != 0.0));
    }

    #[test]
    fn test_render_block_size_does_not_change_output() {
        let input = sine(777, 1);
        let config = ChainConfig {
            layout: BusLayout::MONO,
            ..ChainConfig::default()
        };

        let (small, _) = render_interleaved(config, &input, 1, 44100, 64).unwrap();
        let (large, _) = render_interleaved(config, &input, 1, 44100, 1024).unwrap();
        assert_eq!(small, large);
    }

    #[test]
    fn test_render_rejects_zero_block_size() {
        assert!(matches!(
            render_interleaved(ChainConfig::default(), &[0.0; 4], 2, 44100, 0),
            Err(RenderError::InvalidBlockSize)
        ));
    }

    #[test]
    fn test_render_file_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let input_path = temp_dir.path().join("in.wav");
        let output_path = temp_dir.path().join("out.wav");

        // 16-bit integer input exercises normalization
        let spec = WavSpec {
            channels: 1,
            sample_rate: 44100,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(&input_path, spec).unwrap();
        for s in sine(2000, 1) {
            writer.write_sample((s * i16::MAX as f32) as i16).unwrap();
        }
        writer.finalize().unwrap();

        let mut config = ChainConfig {
            options: ChainOptions::reference(),
            ..ChainConfig::default()
        };
        config.parameters.set(ParamId::BitDepth, 8.0);
        let stats = render_file(&input_path, &output_path, config, DEFAULT_BLOCK_SIZE).unwrap();
        assert_eq!(stats.frames, 2000);

        let (out_spec, samples) = read_wav(&output_path).unwrap();
        assert_eq!(out_spec.channels, 2);
        assert_eq!(out_spec.sample_format, SampleFormat::Float);
        assert_eq!(out_spec.sample_rate, 44100);
        assert_eq!(samples.len(), 4000);
        assert!(samples.iter().all(|s| s.is_finite()));
    }
}
