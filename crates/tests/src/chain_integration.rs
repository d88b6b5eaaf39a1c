//! Integration tests for the signal chain
//!
//! These tests drive the chain the way a host does: negotiate a layout,
//! prepare, then stream blocks while a control thread moves parameters.

use crate::signal::{all_finite, impulse, peak, rms, sine};
use focuscrush_app::render::{read_wav, render_file, write_wav};
use focuscrush_core::domain::{
    AudioBuffer, AudioProcessor, BusLayout, ChainConfig, ChainOptions, ParamId, ParameterStore,
    ProcessSpec, SaturationMode, SignalChain,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

fn prepared(layout: BusLayout, sample_rate: f64, block_size: usize) -> SignalChain {
    let mut chain = SignalChain::new(ParameterStore::shared());
    chain.set_bus_layout(layout).unwrap();
    chain
        .prepare(ProcessSpec::new(sample_rate, block_size, layout.outputs))
        .unwrap();
    chain
}

/// Settings that make the lo-fi and saturation stages nearly transparent
fn clean_settings(store: &ParameterStore) {
    store.set(ParamId::HighPassCutoff, 20.0).unwrap();
    store.set(ParamId::FocusGain, 0.0).unwrap();
    store.set(ParamId::BitDepth, 16.0).unwrap();
    store.set(ParamId::SampleRateReduction, 1.0).unwrap();
}

// ============================================================================
// END-TO-END PROCESSING
// ============================================================================

#[test]
fn test_stereo_sine_with_defaults() {
    let mut chain = prepared(BusLayout::STEREO, 44100.0, 512);
    let input = sine(1000.0, 0.5, 44100.0, 512);
    let mut buffer = AudioBuffer::from_channels(vec![input.clone(), input]).unwrap();

    for _ in 0..20 {
        chain.process(&mut buffer).unwrap();
        assert_eq!(buffer.num_channels(), 2);
        for channel in buffer.channels() {
            assert!(all_finite(channel));
            assert!(peak(channel) <= 1.0);
        }
    }
    assert!(rms(buffer.channel(0)) > 0.0);
}

#[test]
fn test_mono_input_stereo_output_zero_fills() {
    let mut chain = prepared(BusLayout::new(1, 2), 44100.0, 256);
    let input = sine(1000.0, 0.5, 44100.0, 256);

    for _ in 0..8 {
        // Host hands stale data in the unused output
        let mut buffer = AudioBuffer::from_channels(vec![input.clone(), vec![0.3; 256]]).unwrap();
        chain.process(&mut buffer).unwrap();

        assert!(all_finite(buffer.channel(0)));
        assert!(buffer.channel(1).iter().all(|&s| s == 0.0));
    }
}

#[test]
fn test_variable_block_sizes() {
    let mut chain = prepared(BusLayout::STEREO, 48000.0, 1024);
    let mut buffer = AudioBuffer::new(2, 1024);

    for size in [1, 7, 64, 1000, 0, 1024, 3] {
        buffer.set_num_samples(size).unwrap();
        let signal = sine(440.0, 0.8, 48000.0, size);
        buffer.channel_mut(0).copy_from_slice(&signal);
        buffer.channel_mut(1).copy_from_slice(&signal);

        chain.process(&mut buffer).unwrap();
        assert!(buffer.channels().all(all_finite));
    }
}

#[test]
fn test_low_pass_attenuates_high_frequencies() {
    let mut chain = prepared(BusLayout::MONO, 48000.0, 4800);
    chain.set_options(ChainOptions {
        saturation_mode: SaturationMode::Legacy,
        ..ChainOptions::default()
    });
    clean_settings(chain.params());

    let input = sine(8000.0, 0.5, 48000.0, 4800);

    chain.params().set(ParamId::LowPassCutoff, 20000.0).unwrap();
    let mut open = AudioBuffer::from_channels(vec![input.clone()]).unwrap();
    chain.process(&mut open).unwrap();
    chain.reset();

    chain.params().set(ParamId::LowPassCutoff, 500.0).unwrap();
    let mut closed = AudioBuffer::from_channels(vec![input]).unwrap();
    chain.process(&mut closed).unwrap();

    // Skip the transient before comparing levels
    let open_rms = rms(&open.channel(0)[480..]);
    let closed_rms = rms(&closed.channel(0)[480..]);
    assert!(open_rms > 0.3);
    assert!(closed_rms < open_rms * 0.05);
}

#[test]
fn test_impulse_response_settles_to_silence() {
    let mut chain = prepared(BusLayout::MONO, 44100.0, 44100);
    clean_settings(chain.params());

    let mut buffer = AudioBuffer::from_channels(vec![impulse(44100)]).unwrap();
    chain.process(&mut buffer).unwrap();

    // 16-bit grid rounds the decayed tail to exact zero
    assert!(buffer.channel(0)[43100..].iter().all(|&s| s == 0.0));
}

// ============================================================================
// SESSION LIFECYCLE
// ============================================================================

#[test]
fn test_reprepare_at_new_rate_leaves_no_residue() {
    let mut chain = prepared(BusLayout::STEREO, 48000.0, 512);
    let mut loud = AudioBuffer::from_channels(vec![vec![0.95; 512], vec![-0.95; 512]]).unwrap();
    chain.process(&mut loud).unwrap();

    chain.prepare(ProcessSpec::new(44100.0, 512, 2)).unwrap();

    let mut silence = AudioBuffer::new(2, 512);
    chain.process(&mut silence).unwrap();
    assert!(silence.channels().all(|ch| ch.iter().all(|&s| s == 0.0)));

    // Matches a chain that never saw the earlier session
    let mut fresh = prepared(BusLayout::STEREO, 44100.0, 512);
    let input = sine(1000.0, 0.5, 44100.0, 512);
    let mut a = AudioBuffer::from_channels(vec![input.clone(), input.clone()]).unwrap();
    let mut b = AudioBuffer::from_channels(vec![input.clone(), input]).unwrap();
    chain.process(&mut a).unwrap();
    fresh.process(&mut b).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_layout_change_requires_prepare() {
    let mut chain = prepared(BusLayout::STEREO, 48000.0, 256);
    chain.set_bus_layout(BusLayout::MONO).unwrap();

    let mut buffer = AudioBuffer::new(1, 256);
    assert!(chain.process(&mut buffer).is_err());

    chain.prepare(ProcessSpec::new(48000.0, 256, 1)).unwrap();
    assert!(chain.process(&mut buffer).is_ok());
}

// ============================================================================
// CONCURRENT PARAMETER CHANGES
// ============================================================================

#[test]
fn test_parameter_changes_from_control_thread() {
    let store = ParameterStore::shared();
    let mut chain = SignalChain::new(Arc::clone(&store));
    chain.prepare(ProcessSpec::new(48000.0, 128, 2)).unwrap();

    let running = Arc::new(AtomicBool::new(true));
    let control = {
        let store = Arc::clone(&store);
        let running = Arc::clone(&running);
        thread::spawn(move || {
            let mut step = 0u32;
            while running.load(Ordering::Relaxed) {
                let t = (step % 100) as f32 / 100.0;
                store.set(ParamId::LowPassCutoff, 20.0 + t * 19980.0).unwrap();
                store.set(ParamId::HighPassCutoff, 20000.0 - t * 19980.0).unwrap();
                store.set(ParamId::FocusGain, -12.0 + t * 24.0).unwrap();
                store.set(ParamId::Drive, t).unwrap();
                store.set(ParamId::BitDepth, 4.0 + t * 12.0).unwrap();
                store.set(ParamId::SampleRateReduction, 1.0 + t * 9.0).unwrap();
                step += 1;
            }
        })
    };

    let input = sine(1000.0, 0.9, 48000.0, 128);
    for _ in 0..500 {
        let mut buffer = AudioBuffer::from_channels(vec![input.clone(), input.clone()]).unwrap();
        chain.process(&mut buffer).unwrap();
        assert!(buffer.channels().all(all_finite));
        assert!(buffer.channels().all(|ch| peak(ch) <= 1.0));
    }

    running.store(false, Ordering::Relaxed);
    control.join().unwrap();
}

// ============================================================================
// CONFIGURATION AND RENDERING
// ============================================================================

#[tokio::test]
async fn test_config_file_drives_render() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    let input_path = temp_dir.path().join("in.wav");
    let output_path = temp_dir.path().join("out.wav");

    let mut config = ChainConfig {
        options: ChainOptions::reference(),
        layout: BusLayout::STEREO,
        ..ChainConfig::default()
    };
    config.parameters.set(ParamId::BitDepth, 12.0);
    config.save_to_file(&config_path).await.unwrap();
    let loaded = ChainConfig::load_from_file(&config_path).await.unwrap();
    assert_eq!(loaded, config);

    let left = sine(1000.0, 0.5, 44100.0, 4410);
    let interleaved: Vec<f32> = left.iter().flat_map(|&s| [s, -s]).collect();
    write_wav(&input_path, &interleaved, 2, 44100).unwrap();

    let stats = tokio::task::spawn_blocking(move || {
        render_file(&input_path, &output_path, loaded, 300).map(|stats| (stats, output_path))
    })
    .await
    .unwrap();
    let (stats, output_path) = stats.unwrap();

    assert_eq!(stats.frames, 4410);
    assert_eq!(stats.blocks, 15);
    assert_eq!(stats.output_channels, 2);

    let (spec, rendered) = read_wav(&output_path).unwrap();
    assert_eq!(spec.channels, 2);
    assert_eq!(spec.sample_rate, 44100);
    assert_eq!(rendered.len(), interleaved.len());
    assert!(all_finite(&rendered));

    let reader = hound::WavReader::open(&output_path).unwrap();
    assert_eq!(reader.duration(), 4410);
}
