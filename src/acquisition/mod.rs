//! Acquisition front ends: local ALSA capture and the serial DSP link.

mod capture;
pub mod serial;

pub use capture::LocalCaptureDevice;
pub use serial::{list_ports, SerialLinkDevice, SerialTransport};

use std::fmt;

use crate::audio::{RawBlock, SampleWidth};
use crate::config::{Config, Variant};
use crate::error::Result;

/// A device that yields one fixed-size raw block per acquisition cycle.
pub trait AcquisitionSource: Send {
    /// Width of the samples packed in each block.
    fn sample_width(&self) -> SampleWidth;

    /// Block until one full block is available and return it.
    fn acquire_block(&mut self) -> Result<RawBlock>;

    /// Release the device. Calling it again is a no-op.
    fn close(&mut self);

    /// Human-readable device name for status messages.
    fn name(&self) -> &str;
}

/// Connection status published for whoever drives the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkStatus {
    /// Ports found on this machine.
    Ports(Vec<String>),
    Connected(String),
    Disconnected(String),
    Failed(String),
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkStatus::Ports(ports) => write!(f, "Ports: {:?}", ports),
            LinkStatus::Connected(name) => write!(f, "CONNECTED: {}", name),
            LinkStatus::Disconnected(name) => write!(f, "DISCONNECTED: {}", name),
            LinkStatus::Failed(reason) => write!(f, "Please select valid devices ({})", reason),
        }
    }
}

/// Factory function: open the source the configured variant calls for.
pub fn open_source(config: &Config) -> Result<Box<dyn AcquisitionSource>> {
    match config.variant {
        Variant::Software => Ok(Box::new(LocalCaptureDevice::open(config)?)),
        Variant::Hardware => Ok(Box::new(SerialLinkDevice::open(config)?)),
    }
}
