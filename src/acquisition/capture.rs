use alsa::pcm::PCM;

use super::AcquisitionSource;
use crate::audio::{alsa_device, RawBlock, SampleWidth};
use crate::config::Config;
use crate::error::{PipelineError, Result};

/// Local ALSA capture device delivering `chunk_size` mono S16LE frames per block.
pub struct LocalCaptureDevice {
    pcm: Option<PCM>,
    name: String,
    read_buf: Vec<i16>,
}

impl LocalCaptureDevice {
    pub fn open(config: &Config) -> Result<Self> {
        let (pcm, params) = alsa_device::open_capture(
            &config.capture_device,
            config.sample_rate,
            config.channels,
            config.chunk_size,
        )
        .map_err(|e| PipelineError::DeviceUnavailable(format!("{:#}", e)))?;

        if params.sample_rate != config.sample_rate {
            log::warn!(
                "Capture rate negotiated to {}Hz instead of {}Hz",
                params.sample_rate,
                config.sample_rate
            );
        }

        Ok(Self {
            pcm: Some(pcm),
            name: config.capture_device.clone(),
            read_buf: vec![0i16; config.chunk_size],
        })
    }
}

impl AcquisitionSource for LocalCaptureDevice {
    fn sample_width(&self) -> SampleWidth {
        SampleWidth::S16
    }

    fn acquire_block(&mut self) -> Result<RawBlock> {
        let pcm = self.pcm.as_ref().ok_or(PipelineError::Closed)?;
        let io = pcm.io_i16()?;

        // readi may return short on signals; keep going until the chunk is full.
        let mut filled = 0;
        while filled < self.read_buf.len() {
            match io.readi(&mut self.read_buf[filled..]) {
                Ok(frames) => filled += frames,
                Err(e) => {
                    log::warn!("ALSA capture error: {}, recovering...", e);
                    pcm.prepare()?;
                }
            }
        }

        Ok(RawBlock::from_i16(&self.read_buf))
    }

    fn close(&mut self) {
        if self.pcm.take().is_some() {
            log::info!("Capture device '{}' closed", self.name);
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}
