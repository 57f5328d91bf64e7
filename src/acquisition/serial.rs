//! Request/response acquisition from the DSP board over a serial link.
//!
//! Each cycle writes one request byte, waits until the whole response is
//! buffered by the port, then reads exactly one block. There is no framing
//! and no checksum; block length is the only validation.

use std::io::{self, Read, Write};
use std::thread;
use std::time::Duration;

use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};

use super::AcquisitionSource;
use crate::audio::{RawBlock, SampleWidth};
use crate::config::Config;
use crate::error::{PipelineError, Result};

/// Byte-level access to a serial port.
pub trait SerialTransport: Send {
    fn send(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Bytes already received and waiting to be read.
    fn pending(&mut self) -> io::Result<usize>;

    fn receive_exact(&mut self, buf: &mut [u8]) -> io::Result<()>;
}

impl SerialTransport for Box<dyn SerialPort> {
    fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.write_all(bytes)?;
        self.flush()
    }

    fn pending(&mut self) -> io::Result<usize> {
        Ok(self.bytes_to_read()? as usize)
    }

    fn receive_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        self.read_exact(buf)
    }
}

/// Names of the serial ports present on this machine.
pub fn list_ports() -> Vec<String> {
    match serialport::available_ports() {
        Ok(ports) => ports.into_iter().map(|p| p.port_name).collect(),
        Err(e) => {
            log::warn!("Failed to enumerate serial ports: {}", e);
            Vec::new()
        }
    }
}

pub struct SerialLinkDevice<T: SerialTransport> {
    transport: Option<T>,
    name: String,
    request_code: u8,
    block_bytes: usize,
    poll_interval: Duration,
}

impl SerialLinkDevice<Box<dyn SerialPort>> {
    /// Open the configured port (or the first one found) at 8N1.
    pub fn open(config: &Config) -> Result<Self> {
        let name = if config.serial_port.is_empty() {
            list_ports()
                .into_iter()
                .next()
                .ok_or_else(|| PipelineError::DeviceUnavailable("no serial ports found".into()))?
        } else {
            config.serial_port.clone()
        };

        let port = serialport::new(&name, config.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(Duration::from_millis(config.read_timeout_ms))
            .open()
            .map_err(|e| PipelineError::DeviceUnavailable(format!("{}: {}", name, e)))?;

        log::info!(
            "Serial link open: port={}, baud={}, block={} bytes",
            name,
            config.baud_rate,
            config.block_bytes
        );

        Ok(Self::with_transport(port, name, config))
    }
}

impl<T: SerialTransport> SerialLinkDevice<T> {
    pub fn with_transport(transport: T, name: impl Into<String>, config: &Config) -> Self {
        Self {
            transport: Some(transport),
            name: name.into(),
            request_code: config.request_code,
            block_bytes: config.block_bytes,
            poll_interval: Duration::from_micros(config.poll_interval_us),
        }
    }

    pub fn into_transport(self) -> Option<T> {
        self.transport
    }
}

impl<T: SerialTransport> AcquisitionSource for SerialLinkDevice<T> {
    fn sample_width(&self) -> SampleWidth {
        SampleWidth::S24
    }

    fn acquire_block(&mut self) -> Result<RawBlock> {
        let transport = self.transport.as_mut().ok_or(PipelineError::Closed)?;

        transport.send(&[self.request_code])?;

        // No deadline here: a silent board keeps the producer waiting.
        while transport.pending()? < self.block_bytes {
            if self.poll_interval.is_zero() {
                std::hint::spin_loop();
            } else {
                thread::sleep(self.poll_interval);
            }
        }

        let mut buf = vec![0u8; self.block_bytes];
        transport.receive_exact(&mut buf)?;
        Ok(RawBlock::new(buf))
    }

    fn close(&mut self) {
        if self.transport.take().is_some() {
            log::info!("Serial link '{}' closed", self.name);
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Loopback board: every request byte queues the next canned response,
    /// which then trickles in over a few polls.
    struct FakeBoard {
        responses: VecDeque<Vec<u8>>,
        rx: Vec<u8>,
        arriving: Vec<u8>,
        requests: Vec<u8>,
        polls: usize,
    }

    impl FakeBoard {
        fn new(responses: Vec<Vec<u8>>) -> Self {
            Self {
                responses: responses.into(),
                rx: Vec::new(),
                arriving: Vec::new(),
                requests: Vec::new(),
                polls: 0,
            }
        }
    }

    impl SerialTransport for FakeBoard {
        fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
            self.requests.extend_from_slice(bytes);
            if let Some(r) = self.responses.pop_front() {
                self.arriving = r;
            }
            Ok(())
        }

        fn pending(&mut self) -> io::Result<usize> {
            self.polls += 1;
            let take = self.arriving.len().min(1000);
            self.rx.extend(self.arriving.drain(..take));
            Ok(self.rx.len())
        }

        fn receive_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
            if self.rx.len() < buf.len() {
                return Err(io::Error::new(io::ErrorKind::TimedOut, "short read"));
            }
            buf.copy_from_slice(&self.rx[..buf.len()]);
            self.rx.drain(..buf.len());
            Ok(())
        }
    }

    fn link(board: FakeBoard) -> SerialLinkDevice<FakeBoard> {
        let mut config = Config::default();
        config.poll_interval_us = 0;
        SerialLinkDevice::with_transport(board, "fake", &config)
    }

    #[test]
    fn one_request_per_block() {
        let first: Vec<u8> = (0..3072).map(|i| (i % 251) as u8).collect();
        let second = vec![0xAB; 3072];
        let mut dev = link(FakeBoard::new(vec![first.clone(), second.clone()]));

        let a = dev.acquire_block().unwrap();
        let b = dev.acquire_block().unwrap();
        assert_eq!(a.as_bytes(), &first[..]);
        assert_eq!(b.as_bytes(), &second[..]);
        assert_eq!(dev.sample_width(), SampleWidth::S24);

        let board = dev.into_transport().unwrap();
        assert_eq!(board.requests, vec![0x57, 0x57]);
        // 3072 bytes at 1000 per poll needs four polls per block.
        assert_eq!(board.polls, 8);
    }

    #[test]
    fn close_is_idempotent_and_blocks_further_reads() {
        let mut dev = link(FakeBoard::new(vec![vec![0; 3072]]));
        dev.close();
        dev.close();
        assert!(matches!(dev.acquire_block(), Err(PipelineError::Closed)));
    }

    #[test]
    fn read_failure_surfaces_as_link_error() {
        struct Broken;
        impl SerialTransport for Broken {
            fn send(&mut self, _: &[u8]) -> io::Result<()> {
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged"))
            }
            fn pending(&mut self) -> io::Result<usize> {
                Ok(0)
            }
            fn receive_exact(&mut self, _: &mut [u8]) -> io::Result<()> {
                Ok(())
            }
        }

        let mut dev = SerialLinkDevice::with_transport(Broken, "broken", &Config::default());
        assert!(matches!(dev.acquire_block(), Err(PipelineError::Link(_))));
    }

    #[test]
    fn status_text() {
        assert_eq!(
            super::super::LinkStatus::Connected("/dev/ttyUSB0".into()).to_string(),
            "CONNECTED: /dev/ttyUSB0"
        );
    }
}
