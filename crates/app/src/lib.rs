//! Offline host for the FocusCrush chain

pub mod render;

pub use render::{render_file, render_interleaved, RenderError, RenderStats};
