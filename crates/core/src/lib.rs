//! FocusCrush core: a real-time filter, lo-fi and saturation chain
//!
//! The host drives a [`SignalChain`] through the [`AudioProcessor`] trait
//! while a control thread writes to the shared [`ParameterStore`].

pub mod domain;

pub use domain::*;
