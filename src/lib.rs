//! audio_scope - real-time audio acquisition, FIR filtering and spectrum feed
//!
//! Samples come from a local ALSA capture device or from a DSP board over a
//! serial link. A producer thread decodes and filters every block, plays it
//! back (local variant) and hands it to a bounded queue; a timer-driven
//! consumer turns queued frames into waveform and spectrum plots.

pub mod acquisition;
pub mod audio;
pub mod config;
pub mod error;
pub mod gui_bridge;
pub mod handoff;
pub mod pipeline;
pub mod spectrum;
pub mod visualizer;

pub use config::{Config, Variant};
pub use error::{PipelineError, Result};
pub use pipeline::{Pipeline, PipelineControls, Producer};
