//! audio - sample decoding, fixed-point FIR filtering and local playback
//!
//! Uses ALSA for audio I/O. Everything except [`AlsaOutput`] and the
//! device helpers is pure and runs without hardware.

pub mod alsa_device;
pub mod decoder;
pub mod fir;
pub mod playback;

pub use decoder::{decode, decode16, decode24, RawBlock, SampleFrame, SampleWidth};
pub use fir::{FilterCoefficients, FilterState, FirFilter};
pub use playback::{
    silence_padding, AlsaOutput, FreeFrames, OutputDevice, PlaybackReport, PlaybackSink, WriteStatus,
};
