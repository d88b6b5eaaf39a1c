//! Signal-processing stages of the focus chain
//!
//! This module provides the three building blocks the chain cascades:
//! - Biquad IIR filter (low-pass, high-pass, peaking) with per-channel state
//! - Lo-fi stage: bit-depth quantizer fused with a sample-and-hold decimator
//! - Saturation: `tanh` waveshaper
//!
//! All stages are designed for:
//! - Zero allocations in the hot path (state is sized in `prepare`)
//! - No locks, no logging, no I/O per sample
//! - Deterministic output for a given parameter history

use num_complex::Complex;
use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_1_SQRT_2, PI};

/// Numeric guards applied before coefficient computation
pub mod limits {
    /// Lowest frequency a filter is designed for (Hz)
    pub const MIN_FREQUENCY_HZ: f64 = 1.0;
    /// Highest design frequency as a fraction of the sample rate
    pub const MAX_NYQUIST_RATIO: f64 = 0.499;
    /// Smallest Q accepted; lower values are raised to this
    pub const MIN_Q: f64 = 0.025;
    /// Peaking gain is limited to +/- this many dB
    pub const MAX_GAIN_DB: f64 = 24.0;
    /// State magnitudes below this are flushed to zero (denormal guard)
    pub const DENORMAL_FLOOR: f64 = 1e-30;
}

/// Convert a gain in decibels to a linear amplitude factor
#[inline]
pub fn decibels_to_gain(db: f64) -> f64 {
    10.0_f64.powf(db / 20.0)
}

// ============================================================================
// BIQUAD FILTER
// ============================================================================

/// Response type of a biquad section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterKind {
    LowPass,
    HighPass,
    Peak,
}

/// Biquad filter coefficients
///
/// Direct Form I taps, normalised so that `a0 == 1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BiquadCoeffs {
    /// Numerator coefficients
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    /// Denominator coefficients (a0 is normalized to 1.0)
    pub a1: f64,
    pub a2: f64,
}

impl Default for BiquadCoeffs {
    fn default() -> Self {
        // Unity gain (no filtering)
        Self {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
        }
    }
}

/// Keep a design frequency strictly inside (0, Nyquist)
#[inline]
fn limit_frequency(sample_rate: f64, freq: f64) -> f64 {
    freq.max(limits::MIN_FREQUENCY_HZ)
        .min(sample_rate * limits::MAX_NYQUIST_RATIO)
}

#[inline]
fn limit_q(q: f64) -> f64 {
    q.max(limits::MIN_Q)
}

impl BiquadCoeffs {
    /// Q of a second-order Butterworth section
    pub const BUTTERWORTH_Q: f64 = FRAC_1_SQRT_2;

    fn normalized(b0: f64, b1: f64, b2: f64, a0: f64, a1: f64, a2: f64) -> Self {
        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }

    /// Angular frequency terms shared by every design: (cos w0, alpha)
    fn angular(sample_rate: f64, freq: f64, q: f64) -> (f64, f64) {
        let w0 = 2.0 * PI * limit_frequency(sample_rate, freq) / sample_rate;
        let alpha = w0.sin() / (2.0 * limit_q(q));
        (w0.cos(), alpha)
    }

    /// Calculate coefficients for a second-order low-pass filter
    ///
    /// The cutoff is clamped below Nyquist before computation.
    #[must_use]
    pub fn low_pass(sample_rate: f64, freq: f64, q: f64) -> Self {
        let (cos_w0, alpha) = Self::angular(sample_rate, freq, q);

        let b1 = 1.0 - cos_w0;
        let b0 = b1 / 2.0;

        Self::normalized(b0, b1, b0, 1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha)
    }

    /// Calculate coefficients for a second-order high-pass filter
    #[must_use]
    pub fn high_pass(sample_rate: f64, freq: f64, q: f64) -> Self {
        let (cos_w0, alpha) = Self::angular(sample_rate, freq, q);

        let b0 = (1.0 + cos_w0) / 2.0;
        let b1 = -(1.0 + cos_w0);

        Self::normalized(b0, b1, b0, 1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha)
    }

    /// Calculate coefficients for a peaking EQ filter
    ///
    /// Boosts or cuts frequencies around a center frequency. The dB gain is
    /// converted to a linear gain first; the cookbook amplitude `A` is its
    /// square root.
    #[must_use]
    pub fn peaking(sample_rate: f64, freq: f64, gain_db: f64, q: f64) -> Self {
        let gain_db = if gain_db.is_finite() {
            gain_db.clamp(-limits::MAX_GAIN_DB, limits::MAX_GAIN_DB)
        } else {
            0.0
        };
        let a = decibels_to_gain(gain_db).sqrt();
        let (cos_w0, alpha) = Self::angular(sample_rate, freq, q);

        let b0 = 1.0 + alpha * a;
        let b1 = -2.0 * cos_w0;
        let b2 = 1.0 - alpha * a;

        let a0 = 1.0 + alpha / a;
        let a1 = -2.0 * cos_w0;
        let a2 = 1.0 - alpha / a;

        Self::normalized(b0, b1, b2, a0, a1, a2)
    }

    /// Complex response H(e^jw) at `freq`
    pub fn frequency_response(&self, freq: f64, sample_rate: f64) -> Complex<f64> {
        let w = 2.0 * PI * freq / sample_rate;
        let z1 = Complex::from_polar(1.0, -w);
        let z2 = z1 * z1;

        let numerator = self.b0 + z1 * self.b1 + z2 * self.b2;
        let denominator = 1.0 + z1 * self.a1 + z2 * self.a2;
        numerator / denominator
    }

    /// Magnitude response in dB at `freq`
    pub fn magnitude_db(&self, freq: f64, sample_rate: f64) -> f64 {
        20.0 * self.frequency_response(freq, sample_rate).norm().log10()
    }

    /// Whether both poles lie strictly inside the unit circle
    pub fn is_stable(&self) -> bool {
        self.a2.abs() < 1.0 && self.a1.abs() < 1.0 + self.a2
    }

    pub fn is_finite(&self) -> bool {
        [self.b0, self.b1, self.b2, self.a1, self.a2]
            .iter()
            .all(|c| c.is_finite())
    }
}

/// Everything that determines a filter's coefficients
///
/// Kept alongside the coefficients so a reconfiguration with an identical
/// design is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterDesign {
    pub kind: FilterKind,
    pub sample_rate: f64,
    /// Cutoff (low/high-pass) or center frequency (peak) in Hz
    pub frequency: f64,
    pub q: f64,
    /// Only used by `FilterKind::Peak`
    pub gain_db: f64,
}

impl FilterDesign {
    pub fn low_pass(sample_rate: f64, cutoff: f64) -> Self {
        Self {
            kind: FilterKind::LowPass,
            sample_rate,
            frequency: cutoff,
            q: BiquadCoeffs::BUTTERWORTH_Q,
            gain_db: 0.0,
        }
    }

    pub fn high_pass(sample_rate: f64, cutoff: f64) -> Self {
        Self {
            kind: FilterKind::HighPass,
            ..Self::low_pass(sample_rate, cutoff)
        }
    }

    pub fn peak(sample_rate: f64, center: f64, q: f64, gain_db: f64) -> Self {
        Self {
            kind: FilterKind::Peak,
            sample_rate,
            frequency: center,
            q,
            gain_db,
        }
    }

    #[must_use]
    pub fn coefficients(&self) -> BiquadCoeffs {
        match self.kind {
            FilterKind::LowPass => BiquadCoeffs::low_pass(self.sample_rate, self.frequency, self.q),
            FilterKind::HighPass => {
                BiquadCoeffs::high_pass(self.sample_rate, self.frequency, self.q)
            }
            FilterKind::Peak => {
                BiquadCoeffs::peaking(self.sample_rate, self.frequency, self.gain_db, self.q)
            }
        }
    }
}

// Previous input samples (x[n-1], x[n-2]) and outputs (y[n-1], y[n-2])
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct DelayLine {
    x1: f64,
    x2: f64,
    y1: f64,
    y2: f64,
}

/// Stateful biquad filter using Direct Form I
///
/// One coefficient set is shared by all channels; every channel owns its own
/// delay line. Coefficient updates never touch the delay lines, so parameter
/// changes stay continuous. Only `reset` (stream start/stop) clears them.
#[derive(Debug, Clone, PartialEq)]
pub struct BiquadFilter {
    design: Option<FilterDesign>,
    coeffs: BiquadCoeffs,
    state: Vec<DelayLine>,
}

impl BiquadFilter {
    /// Create a unity-gain filter with no channels allocated
    pub fn new() -> Self {
        Self {
            design: None,
            coeffs: BiquadCoeffs::default(),
            state: Vec::new(),
        }
    }

    /// Allocate (and zero) one delay line per channel
    ///
    /// Also forgets the last design so the next `configure` recomputes.
    pub fn prepare(&mut self, num_channels: usize) {
        self.state.clear();
        self.state.resize(num_channels, DelayLine::default());
        self.design = None;
    }

    pub fn num_channels(&self) -> usize {
        self.state.len()
    }

    pub fn coeffs(&self) -> BiquadCoeffs {
        self.coeffs
    }

    pub fn design(&self) -> Option<FilterDesign> {
        self.design
    }

    pub fn kind(&self) -> Option<FilterKind> {
        self.design.map(|d| d.kind)
    }

    /// Recompute coefficients if the design differs from the last one
    ///
    /// Returns `true` when coefficients were recomputed.
    pub fn configure(&mut self, design: FilterDesign) -> bool {
        if self.design == Some(design) {
            return false;
        }
        self.coeffs = design.coefficients();
        self.design = Some(design);
        true
    }

    /// Install coefficients directly, bypassing design bookkeeping
    pub fn set_coeffs(&mut self, coeffs: BiquadCoeffs) {
        self.coeffs = coeffs;
        self.design = None;
    }

    /// Process a single sample on `channel`
    ///
    /// # Panics
    /// If `channel` is not below `num_channels()`.
    #[inline]
    pub fn process_sample(&mut self, channel: usize, x: f32) -> f32 {
        let c = self.coeffs;
        let s = &mut self.state[channel];
        let x = x as f64;

        // Direct Form I: y[n] = b0*x[n] + b1*x[n-1] + b2*x[n-2]
        //                        - a1*y[n-1] - a2*y[n-2]
        let mut y = c.b0 * x + c.b1 * s.x1 + c.b2 * s.x2 - c.a1 * s.y1 - c.a2 * s.y2;
        if y.abs() < limits::DENORMAL_FLOOR {
            y = 0.0;
        }

        s.x2 = s.x1;
        s.x1 = x;
        s.y2 = s.y1;
        s.y1 = y;

        y as f32
    }

    /// Process a block of samples on `channel` in place
    pub fn process(&mut self, channel: usize, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            *sample = self.process_sample(channel, *sample);
        }
    }

    /// Zero every channel's delay line
    pub fn reset(&mut self) {
        self.state.fill(DelayLine::default());
    }
}

impl Default for BiquadFilter {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// LO-FI (BIT DEPTH + SAMPLE RATE REDUCTION)
// ============================================================================

/// Largest quantizer code for a signed `bit_depth`-bit word: `2^(bits-1) - 1`
#[inline]
pub fn quantizer_scale(bit_depth: u32) -> f32 {
    2.0_f32.powi(bit_depth as i32 - 1) - 1.0
}

/// Round `input` to the nearest level of a signed `bit_depth`-bit grid
///
/// Callers guarantee `bit_depth >= 2`; smaller depths have no levels.
#[inline]
pub fn quantize(input: f32, bit_depth: u32) -> f32 {
    debug_assert!(bit_depth >= 2, "bit depth {bit_depth} has no quantizer levels");
    let max_val = quantizer_scale(bit_depth);
    (input * max_val).round() / max_val
}

/// Sample-and-hold counter plus the currently held sample
///
/// Every call advances the counter. When it reaches the reduction factor it
/// wraps to zero and a freshly quantized input is latched; in between, the
/// latched value is repeated. A factor of 1 therefore quantizes every sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LoFiState {
    sample_counter: u32,
    held_sample: f32,
}

impl LoFiState {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn process(&mut self, input: f32, bit_depth: u32, rate_reduction: u32) -> f32 {
        self.sample_counter += 1;
        if self.sample_counter >= rate_reduction {
            self.sample_counter = 0;
            self.held_sample = quantize(input, bit_depth);
        }
        self.held_sample
    }

    pub fn held_sample(&self) -> f32 {
        self.held_sample
    }

    pub fn sample_counter(&self) -> u32 {
        self.sample_counter
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

// ============================================================================
// SATURATION
// ============================================================================

/// Input gain applied at full drive is `1 + MAX_DRIVE_GAIN`
pub const MAX_DRIVE_GAIN: f32 = 10.0;

/// Soft-clip `input` with `tanh`, pre-gained by `1 + drive * 10`
///
/// Odd-symmetric and bounded by 1 in magnitude. Higher drive moves the knee
/// closer to zero.
#[inline]
pub fn saturate(input: f32, drive: f32) -> f32 {
    let gain = 1.0 + drive * MAX_DRIVE_GAIN;
    (input * gain).tanh()
}

// ============================================================================
// TESTS
// ============================================================================
