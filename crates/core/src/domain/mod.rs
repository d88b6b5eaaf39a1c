//! Domain entities and signal-processing rules

pub mod audio;
pub mod chain;
pub mod config;
pub mod dsp;
pub mod params;

// Re-export specific items to avoid ambiguous `Result` aliases
pub use audio::{AudioBuffer, AudioError, BusLayout, ProcessSpec};
pub use chain::{
    supports_layout, AudioProcessor, ChainOptions, LoFiMode, SaturationMode, SignalChain,
};
pub use config::{ChainConfig, ConfigError, ConfigManager};
pub use dsp::{
    quantize, saturate, BiquadCoeffs, BiquadFilter, FilterDesign, FilterKind, LoFiState,
};
pub use params::{
    ParamDescriptor, ParamError, ParamId, ParamUnit, ParamValues, ParameterStore, PARAMETERS,
};
