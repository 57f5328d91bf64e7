//! Local playback with silence padding against buffer underrun.

use alsa::pcm::PCM;

use super::alsa_device;
use super::decoder::SampleFrame;
use crate::error::{PipelineError, Result};

/// Outcome of a single device write or buffer query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStatus {
    Written,
    /// The device ran dry and has been recovered.
    Underflow,
}

/// Free space in the device buffer, in frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreeFrames {
    pub frames: usize,
    /// `Underflow` when the query found the device drained and recovered it.
    pub status: WriteStatus,
}

/// A mono 16-bit output buffer the sink can write into and query.
pub trait OutputDevice: Send {
    fn write(&mut self, samples: &[i16]) -> Result<WriteStatus>;

    fn free_frames(&mut self) -> Result<FreeFrames>;
}

impl<D: OutputDevice + ?Sized> OutputDevice for Box<D> {
    fn write(&mut self, samples: &[i16]) -> Result<WriteStatus> {
        (**self).write(samples)
    }

    fn free_frames(&mut self) -> Result<FreeFrames> {
        (**self).free_frames()
    }
}

/// Silence needed so the device keeps about one chunk queued.
pub fn silence_padding(free: usize, chunk_size: usize) -> usize {
    if free > chunk_size {
        free - chunk_size
    } else {
        0
    }
}

/// What one [`PlaybackSink::write`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackReport {
    pub status: WriteStatus,
    pub silence_written: usize,
}

pub struct PlaybackSink<D: OutputDevice> {
    device: D,
    chunk_size: usize,
    silence: Vec<i16>,
}

impl<D: OutputDevice> PlaybackSink<D> {
    pub fn new(device: D, chunk_size: usize) -> Self {
        Self {
            device,
            chunk_size,
            silence: Vec::new(),
        }
    }

    /// Submit one frame, then top up the device buffer with silence.
    ///
    /// The padding runs the same way after a clean write and after an
    /// underflow; only device failures are returned as errors.
    pub fn write(&mut self, frame: &SampleFrame) -> Result<PlaybackReport> {
        let mut status = self.device.write(&frame.to_i16())?;

        let free = self.device.free_frames()?;
        if free.status == WriteStatus::Underflow {
            status = WriteStatus::Underflow;
        }
        if status == WriteStatus::Underflow {
            log::debug!("Playback underflow, padding with silence");
        }

        let fill = silence_padding(free.frames, self.chunk_size);
        if fill > 0 {
            if self.silence.len() < fill {
                self.silence.resize(fill, 0);
            }
            if self.device.write(&self.silence[..fill])? == WriteStatus::Underflow {
                status = WriteStatus::Underflow;
            }
            log::trace!("Padded {} frames of silence (free={})", fill, free.frames);
        }

        Ok(PlaybackReport {
            status,
            silence_written: fill,
        })
    }

    pub fn into_inner(self) -> D {
        self.device
    }
}

/// Recovery attempts per write before the rest of the slice is dropped.
const MAX_RECOVERIES: u32 = 3;

/// Write all of `samples`, running `recover` after each failed attempt and
/// retrying from where the device stopped.
fn write_recovering<W, R>(samples: &[i16], mut writei: W, mut recover: R) -> Result<WriteStatus>
where
    W: FnMut(&[i16]) -> alsa::Result<usize>,
    R: FnMut() -> alsa::Result<()>,
{
    let mut status = WriteStatus::Written;
    let mut written = 0;
    let mut retries = 0u32;
    while written < samples.len() {
        match writei(&samples[written..]) {
            Ok(n) => {
                written += n;
                retries = 0;
            }
            Err(e) => {
                log::warn!("ALSA XRUN or error: {}, recovering...", e);
                status = WriteStatus::Underflow;
                retries += 1;
                // 触发 ALSA 硬件恢复状态机
                recover()?;
                if retries >= MAX_RECOVERIES {
                    log::error!(
                        "Max recovery retries ({}) reached. Dropping {} unwritten frames.",
                        retries,
                        samples.len() - written
                    );
                    break;
                }
            }
        }
    }
    Ok(status)
}

/// `EPIPE`: the stream ran dry.
fn is_xrun(err: &alsa::Error) -> bool {
    std::io::Error::from_raw_os_error(err.errno()).kind() == std::io::ErrorKind::BrokenPipe
}

/// ALSA playback device.
pub struct AlsaOutput {
    pcm: PCM,
}

impl AlsaOutput {
    /// Open `device` with a ring buffer of `buffer_chunks` periods.
    pub fn open(
        device: &str,
        sample_rate: u32,
        chunk_size: usize,
        buffer_chunks: usize,
    ) -> Result<Self> {
        let (pcm, _params) = alsa_device::open_playback(
            device,
            sample_rate,
            1,
            chunk_size,
            chunk_size * buffer_chunks.max(2),
        )
        .map_err(|e| PipelineError::DeviceUnavailable(format!("{:#}", e)))?;
        Ok(Self { pcm })
    }
}

impl OutputDevice for AlsaOutput {
    fn write(&mut self, samples: &[i16]) -> Result<WriteStatus> {
        let io = self.pcm.io_i16()?;
        write_recovering(samples, |s| io.writei(s), || self.pcm.prepare())
    }

    fn free_frames(&mut self) -> Result<FreeFrames> {
        match self.pcm.avail_update() {
            Ok(n) => Ok(FreeFrames {
                frames: n.max(0) as usize,
                status: WriteStatus::Written,
            }),
            Err(e) if is_xrun(&e) => {
                log::warn!("ALSA XRUN while querying free space, recovering...");
                self.pcm.prepare()?;
                Ok(FreeFrames {
                    frames: self.pcm.avail_update()?.max(0) as usize,
                    status: WriteStatus::Underflow,
                })
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for AlsaOutput {
    fn drop(&mut self) {
        let _ = self.pcm.drain();
    }
}
