//! Error taxonomy for the acquisition pipeline.
//!
//! Underflow and queue drops are not errors here: they are reported as
//! [`WriteStatus::Underflow`](crate::audio::WriteStatus) and
//! [`Enqueued::Dropped`](crate::handoff::Enqueued) values.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// Open/connect failure. Surfaced as a status message, never retried.
    #[error("Device unavailable: {0}")]
    DeviceUnavailable(String),

    /// Raw block length is not a multiple of the sample width.
    #[error("Block of {len} bytes is not aligned to {width}-byte samples")]
    Alignment { len: usize, width: usize },

    #[error("Serial link error: {0}")]
    Link(#[from] std::io::Error),

    #[error("ALSA error: {0}")]
    Audio(#[from] alsa::Error),

    #[error("Device already closed")]
    Closed,

    #[error("Invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
