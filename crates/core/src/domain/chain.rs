//! Signal chain orchestration
//!
//! `SignalChain` owns the three filters and the lo-fi state, pulls a relaxed
//! snapshot of the parameter store once per block, and runs
//! high-pass → low-pass → focus → lo-fi → saturation in place.
//!
//! Two legacy behaviours stay selectable through `ChainOptions`: the lo-fi
//! counter shared by every channel, and a saturation result that never
//! reaches the output.

use crate::domain::audio::{AudioBuffer, AudioError, BusLayout, ProcessSpec, Result};
use crate::domain::dsp::{saturate, BiquadFilter, FilterDesign, FilterKind, LoFiState};
use crate::domain::params::{ParamValues, ParameterStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Capability set a host expects from an audio processor
///
/// Lifecycle: negotiate a layout, `prepare`, then any number of `process`
/// calls from the audio thread. `prepare`, `reset` and `release_resources`
/// run only while the audio thread is quiesced.
pub trait AudioProcessor: Send {
    /// Display name reported to the host
    fn name(&self) -> &str;

    /// Whether the processor can run with the given main bus layout
    fn is_layout_supported(&self, layout: &BusLayout) -> bool;

    /// Allocate state and derive everything from `spec`
    fn prepare(&mut self, spec: ProcessSpec) -> Result<()>;

    /// Process one block in place
    ///
    /// # Requirements
    /// - No allocations, locks or I/O
    /// - Handle any block length
    fn process(&mut self, buffer: &mut AudioBuffer) -> Result<()>;

    /// Clear internal state (stream start/stop)
    fn reset(&mut self);

    /// Hook for dropping transient resources when playback stops
    fn release_resources(&mut self);

    /// Seconds of output produced after the input goes silent
    fn tail_length_seconds(&self) -> f64 {
        0.0
    }

    fn accepts_midi(&self) -> bool {
        false
    }

    fn produces_midi(&self) -> bool {
        false
    }
}

/// Main output must be mono or stereo, fed by at least one and at most as
/// many input channels
pub fn supports_layout(layout: &BusLayout) -> bool {
    (1..=2).contains(&layout.outputs) && layout.inputs >= 1 && layout.inputs <= layout.outputs
}

/// How lo-fi state is shared between channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoFiMode {
    /// One counter and held sample for all channels; channels interleave
    /// through the same hold cycle
    Shared,
    /// Independent counter and held sample per channel
    #[default]
    PerChannel,
}

/// What happens to the saturation stage's output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SaturationMode {
    /// Saturation result is dropped; the lo-fi output is what gets written
    Legacy,
    /// Saturated lo-fi output is written back
    #[default]
    Applied,
}

/// Behaviour switches of the chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainOptions {
    pub lofi_mode: LoFiMode,
    pub saturation_mode: SaturationMode,
}

impl ChainOptions {
    /// Both legacy behaviours, bit-exact
    pub fn reference() -> Self {
        Self {
            lofi_mode: LoFiMode::Shared,
            saturation_mode: SaturationMode::Legacy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ChainState {
    Unprepared,
    Prepared(ProcessSpec),
}

/// High-pass → low-pass → focus → lo-fi → saturation
#[derive(Debug)]
pub struct SignalChain {
    params: Arc<ParameterStore>,
    options: ChainOptions,
    layout: BusLayout,
    state: ChainState,
    high_pass: BiquadFilter,
    low_pass: BiquadFilter,
    focus: BiquadFilter,
    shared_lofi: LoFiState,
    channel_lofi: Vec<LoFiState>,
}

impl SignalChain {
    pub const NAME: &'static str = "FocusCrush";
    /// Center of the focus (peaking) band
    pub const FOCUS_FREQUENCY_HZ: f64 = 2000.0;
    pub const FOCUS_Q: f64 = 1.0;

    /// Create an unprepared chain reading from `params`
    pub fn new(params: Arc<ParameterStore>) -> Self {
        Self::with_options(params, ChainOptions::default())
    }

    pub fn with_options(params: Arc<ParameterStore>, options: ChainOptions) -> Self {
        debug!(?options, "Creating signal chain");
        Self {
            params,
            options,
            layout: BusLayout::default(),
            state: ChainState::Unprepared,
            high_pass: BiquadFilter::new(),
            low_pass: BiquadFilter::new(),
            focus: BiquadFilter::new(),
            shared_lofi: LoFiState::new(),
            channel_lofi: Vec::new(),
        }
    }

    pub fn params(&self) -> &Arc<ParameterStore> {
        &self.params
    }

    pub fn options(&self) -> ChainOptions {
        self.options
    }

    /// Switch behaviour; lo-fi state restarts so modes never mix
    pub fn set_options(&mut self, options: ChainOptions) {
        self.options = options;
        self.reset_lofi();
        debug!(?options, "Chain options updated");
    }

    pub fn layout(&self) -> BusLayout {
        self.layout
    }

    /// Accept a new main bus layout
    ///
    /// The chain drops back to unprepared; the host prepares again before
    /// the next block.
    pub fn set_bus_layout(&mut self, layout: BusLayout) -> Result<()> {
        if !self.is_layout_supported(&layout) {
            return Err(AudioError::UnsupportedLayout {
                inputs: layout.inputs,
                outputs: layout.outputs,
            });
        }
        self.layout = layout;
        self.state = ChainState::Unprepared;
        debug!(inputs = layout.inputs, outputs = layout.outputs, "Bus layout set");
        Ok(())
    }

    pub fn is_prepared(&self) -> bool {
        matches!(self.state, ChainState::Prepared(_))
    }

    pub fn process_spec(&self) -> Option<ProcessSpec> {
        match self.state {
            ChainState::Prepared(spec) => Some(spec),
            ChainState::Unprepared => None,
        }
    }

    /// Access one of the three filters
    pub fn filter(&self, kind: FilterKind) -> &BiquadFilter {
        match kind {
            FilterKind::HighPass => &self.high_pass,
            FilterKind::LowPass => &self.low_pass,
            FilterKind::Peak => &self.focus,
        }
    }

    /// Bring filter coefficients in line with `values`
    ///
    /// Unchanged designs are skipped by the filters themselves.
    fn update_filters(&mut self, sample_rate: f64, values: &ParamValues) {
        self.high_pass
            .configure(FilterDesign::high_pass(sample_rate, values.high_pass_cutoff as f64));
        self.low_pass
            .configure(FilterDesign::low_pass(sample_rate, values.low_pass_cutoff as f64));
        self.focus.configure(FilterDesign::peak(
            sample_rate,
            Self::FOCUS_FREQUENCY_HZ,
            Self::FOCUS_Q,
            values.focus_gain as f64,
        ));
    }

    fn reset_lofi(&mut self) {
        self.shared_lofi.reset();
        self.channel_lofi.fill(LoFiState::default());
    }
}

impl AudioProcessor for SignalChain {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn is_layout_supported(&self, layout: &BusLayout) -> bool {
        supports_layout(layout)
    }

    #[instrument(skip(self))]
    fn prepare(&mut self, spec: ProcessSpec) -> Result<()> {
        spec.validate()?;

        let channels = spec.num_channels.max(self.layout.total_channels());
        self.high_pass.prepare(channels);
        self.low_pass.prepare(channels);
        self.focus.prepare(channels);

        self.channel_lofi.clear();
        self.channel_lofi.resize(channels, LoFiState::default());
        self.shared_lofi.reset();

        let values = self.params.snapshot();
        self.update_filters(spec.sample_rate, &values);
        self.state = ChainState::Prepared(spec);

        info!(
            sample_rate = spec.sample_rate,
            block_size = spec.maximum_block_size,
            channels,
            "Signal chain prepared"
        );
        Ok(())
    }

    fn process(&mut self, buffer: &mut AudioBuffer) -> Result<()> {
        let spec = match self.state {
            ChainState::Prepared(spec) => spec,
            ChainState::Unprepared => return Err(AudioError::NotPrepared),
        };

        let total = buffer.num_channels();
        let allocated = self.high_pass.num_channels();
        if total > allocated {
            return Err(AudioError::ChannelMismatch {
                expected: allocated,
                actual: total,
            });
        }

        let values = self.params.snapshot();
        self.update_filters(spec.sample_rate, &values);

        let inputs = self.layout.inputs.min(total);

        for ch in 0..inputs {
            for sample in buffer.channel_mut(ch).iter_mut() {
                let x = self.high_pass.process_sample(ch, *sample);
                let x = self.low_pass.process_sample(ch, x);
                *sample = self.focus.process_sample(ch, x);
            }
        }

        // Outputs with no matching input carry silence
        for ch in inputs..total {
            buffer.clear_channel(ch);
        }

        let bit_depth = values.bit_depth_bits();
        let rate_reduction = values.rate_reduction_factor();
        let drive = values.drive;
        let saturation_mode = self.options.saturation_mode;

        for ch in 0..inputs {
            let lofi = match self.options.lofi_mode {
                LoFiMode::Shared => &mut self.shared_lofi,
                LoFiMode::PerChannel => &mut self.channel_lofi[ch],
            };
            let data = buffer.channel_mut(ch);

            match saturation_mode {
                SaturationMode::Legacy => {
                    for sample in data.iter_mut() {
                        *sample = lofi.process(*sample, bit_depth, rate_reduction);
                    }
                }
                SaturationMode::Applied => {
                    for sample in data.iter_mut() {
                        let crushed = lofi.process(*sample, bit_depth, rate_reduction);
                        *sample = saturate(crushed, drive);
                    }
                }
            }
        }

        Ok(())
    }

    fn reset(&mut self) {
        self.high_pass.reset();
        self.low_pass.reset();
        self.focus.reset();
        self.reset_lofi();
        debug!("Signal chain reset");
    }

    fn release_resources(&mut self) {
        debug!("Release resources: nothing to free");
    }
}
