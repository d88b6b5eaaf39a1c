//! Live parameter surface shared between the control and audio threads
//!
//! Six named float parameters make up the externally visible control surface.
//! The control thread writes them at any time; the audio thread takes a
//! relaxed snapshot once per block. Every parameter lives in its own
//! cache-padded atomic so UI writes never contend with neighbouring reads.

use crossbeam::utils::CachePadded;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Errors raised at the parameter boundary
#[derive(Debug, Error)]
pub enum ParamError {
    #[error("Unknown parameter: {0}")]
    UnknownParameter(String),

    #[error("Parameter {name} rejected non-finite value {value}")]
    NotFinite { name: &'static str, value: f32 },
}

pub type Result<T> = std::result::Result<T, ParamError>;

/// Smallest bit depth for which `2^(bits-1) - 1` is a usable quantizer scale
pub const MIN_USABLE_BIT_DEPTH: u32 = 2;

/// Identifier for each exposed parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParamId {
    LowPassCutoff,
    HighPassCutoff,
    FocusGain,
    Drive,
    BitDepth,
    SampleRateReduction,
}

impl ParamId {
    pub const COUNT: usize = 6;

    pub const ALL: [ParamId; Self::COUNT] = [
        ParamId::LowPassCutoff,
        ParamId::HighPassCutoff,
        ParamId::FocusGain,
        ParamId::Drive,
        ParamId::BitDepth,
        ParamId::SampleRateReduction,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn descriptor(self) -> &'static ParamDescriptor {
        &PARAMETERS[self.index()]
    }

    /// Host-visible name, e.g. `lowPassCutoff`
    pub fn name(self) -> &'static str {
        self.descriptor().name
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|id| id.name() == name)
    }
}

/// Display unit of a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamUnit {
    Hertz,
    Decibels,
    Bits,
    Factor,
    None,
}

impl ParamUnit {
    pub fn symbol(&self) -> &'static str {
        match self {
            ParamUnit::Hertz => "Hz",
            ParamUnit::Decibels => "dB",
            ParamUnit::Bits => "bits",
            ParamUnit::Factor => "x",
            ParamUnit::None => "",
        }
    }
}

/// Static description of one parameter: range, default, unit
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ParamDescriptor {
    pub name: &'static str,
    pub label: &'static str,
    pub min: f32,
    pub max: f32,
    pub default: f32,
    pub unit: ParamUnit,
    /// Integer parameters are rounded to whole steps on write
    pub integer: bool,
}

impl ParamDescriptor {
    /// Bring a value inside the legal range (and onto the integer grid)
    pub fn clamp(&self, value: f32) -> f32 {
        let value = value.clamp(self.min, self.max);
        if self.integer {
            value.round()
        } else {
            value
        }
    }
}

/// The control surface, indexed by `ParamId`
///
/// Names, ranges and defaults are part of the automation contract with hosts.
pub const PARAMETERS: [ParamDescriptor; ParamId::COUNT] = [
    ParamDescriptor {
        name: "lowPassCutoff",
        label: "Low-Pass Cutoff",
        min: 20.0,
        max: 20000.0,
        default: 8000.0,
        unit: ParamUnit::Hertz,
        integer: false,
    },
    ParamDescriptor {
        name: "highPassCutoff",
        label: "High-Pass Cutoff",
        min: 20.0,
        max: 20000.0,
        default: 200.0,
        unit: ParamUnit::Hertz,
        integer: false,
    },
    ParamDescriptor {
        name: "focusGain",
        label: "Focus Gain",
        min: -12.0,
        max: 12.0,
        default: 3.0,
        unit: ParamUnit::Decibels,
        integer: false,
    },
    ParamDescriptor {
        name: "drive",
        label: "Drive",
        min: 0.0,
        max: 1.0,
        default: 0.5,
        unit: ParamUnit::None,
        integer: false,
    },
    ParamDescriptor {
        name: "bitDepth",
        label: "Bit Depth",
        min: 4.0,
        max: 16.0,
        default: 6.0,
        unit: ParamUnit::Bits,
        integer: true,
    },
    ParamDescriptor {
        name: "sampleRateReduction",
        label: "Sample Rate Reduction",
        min: 1.0,
        max: 10.0,
        default: 4.0,
        unit: ParamUnit::Factor,
        integer: true,
    },
];

/// Plain copy of all parameter values
///
/// Used for per-block snapshots on the audio thread and as the
/// `[parameters]` table of the TOML configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParamValues {
    pub low_pass_cutoff: f32,
    pub high_pass_cutoff: f32,
    pub focus_gain: f32,
    pub drive: f32,
    pub bit_depth: f32,
    pub sample_rate_reduction: f32,
}

impl Default for ParamValues {
    fn default() -> Self {
        let mut values = Self {
            low_pass_cutoff: 0.0,
            high_pass_cutoff: 0.0,
            focus_gain: 0.0,
            drive: 0.0,
            bit_depth: 0.0,
            sample_rate_reduction: 0.0,
        };
        for id in ParamId::ALL {
            values.set(id, id.descriptor().default);
        }
        values
    }
}

impl ParamValues {
    pub fn get(&self, id: ParamId) -> f32 {
        match id {
            ParamId::LowPassCutoff => self.low_pass_cutoff,
            ParamId::HighPassCutoff => self.high_pass_cutoff,
            ParamId::FocusGain => self.focus_gain,
            ParamId::Drive => self.drive,
            ParamId::BitDepth => self.bit_depth,
            ParamId::SampleRateReduction => self.sample_rate_reduction,
        }
    }

    pub fn set(&mut self, id: ParamId, value: f32) {
        let slot = match id {
            ParamId::LowPassCutoff => &mut self.low_pass_cutoff,
            ParamId::HighPassCutoff => &mut self.high_pass_cutoff,
            ParamId::FocusGain => &mut self.focus_gain,
            ParamId::Drive => &mut self.drive,
            ParamId::BitDepth => &mut self.bit_depth,
            ParamId::SampleRateReduction => &mut self.sample_rate_reduction,
        };
        *slot = value;
    }

    /// Quantizer resolution, never below `MIN_USABLE_BIT_DEPTH`
    #[inline]
    pub fn bit_depth_bits(&self) -> u32 {
        let bits = self.bit_depth.round();
        if bits.is_nan() {
            return MIN_USABLE_BIT_DEPTH;
        }
        (bits.clamp(MIN_USABLE_BIT_DEPTH as f32, 24.0)) as u32
    }

    /// Sample-and-hold factor, never below 1
    #[inline]
    pub fn rate_reduction_factor(&self) -> u32 {
        let factor = self.sample_rate_reduction.round();
        if factor.is_nan() {
            return 1;
        }
        factor.clamp(1.0, u16::MAX as f32) as u32
    }
}

/// Lock-free store holding the live value of every parameter
///
/// Values are stored as `f32` bit patterns. Reads and writes are relaxed:
/// each scalar is eventually visible, and no ordering between different
/// parameters is promised.
#[derive(Debug)]
pub struct ParameterStore {
    values: [CachePadded<AtomicU32>; ParamId::COUNT],
}

impl ParameterStore {
    /// Create a store holding the default of every parameter
    pub fn new() -> Self {
        Self {
            values: std::array::from_fn(|i| {
                CachePadded::new(AtomicU32::new(PARAMETERS[i].default.to_bits()))
            }),
        }
    }

    /// Create a store ready to be shared with the control thread
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Current value of one parameter
    #[inline]
    pub fn get(&self, id: ParamId) -> f32 {
        f32::from_bits(self.values[id.index()].load(Ordering::Relaxed))
    }

    /// Store a new value, clamped to the parameter's range
    ///
    /// Returns the value actually stored.
    pub fn set(&self, id: ParamId, value: f32) -> Result<f32> {
        let descriptor = id.descriptor();
        if !value.is_finite() {
            return Err(ParamError::NotFinite {
                name: descriptor.name,
                value,
            });
        }
        let stored = descriptor.clamp(value);
        self.values[id.index()].store(stored.to_bits(), Ordering::Relaxed);
        debug!(param = descriptor.name, requested = value, stored, "Parameter set");
        Ok(stored)
    }

    pub fn get_by_name(&self, name: &str) -> Option<f32> {
        ParamId::from_name(name).map(|id| self.get(id))
    }

    pub fn set_by_name(&self, name: &str, value: f32) -> Result<f32> {
        let id = ParamId::from_name(name)
            .ok_or_else(|| ParamError::UnknownParameter(name.to_string()))?;
        self.set(id, value)
    }

    /// Read every parameter once
    #[inline]
    pub fn snapshot(&self) -> ParamValues {
        let mut values = ParamValues::default();
        for id in ParamId::ALL {
            values.set(id, self.get(id));
        }
        values
    }

    /// Write a full set of values (each one clamped)
    pub fn apply(&self, values: &ParamValues) -> Result<()> {
        for id in ParamId::ALL {
            self.set(id, values.get(id))?;
        }
        Ok(())
    }

    pub fn reset_to_defaults(&self) {
        for id in ParamId::ALL {
            self.values[id.index()].store(id.descriptor().default.to_bits(), Ordering::Relaxed);
        }
        debug!("Parameters reset to defaults");
    }
}

impl Default for ParameterStore {
    fn default() -> Self {
        Self::new()
    }
}
