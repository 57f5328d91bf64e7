//! The producer: acquire -> decode -> filter -> (playback, hand-off).
//!
//! Runs on a dedicated std::thread (NOT a tokio task) since every step
//! after start-up is blocking device I/O.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tokio::sync::mpsc;

use crate::acquisition::{open_source, AcquisitionSource, LinkStatus};
use crate::audio::{
    decode, AlsaOutput, FilterCoefficients, FirFilter, OutputDevice, PlaybackReport, PlaybackSink,
};
use crate::config::{Config, Variant};
use crate::error::{PipelineError, Result};
use crate::handoff::{handoff_channel, Enqueued, HandoffPolicy, HandoffReceiver, HandoffSender};

/// Flags shared between the controlling side and the producer thread.
/// Polled once per cycle.
#[derive(Debug)]
pub struct PipelineControls {
    running: AtomicBool,
    filter_enabled: AtomicBool,
    visualization: AtomicBool,
}

impl PipelineControls {
    pub fn new(filter_enabled: bool, visualization: bool) -> Self {
        Self {
            running: AtomicBool::new(true),
            filter_enabled: AtomicBool::new(filter_enabled),
            visualization: AtomicBool::new(visualization),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    pub fn request_stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn filter_enabled(&self) -> bool {
        self.filter_enabled.load(Ordering::Relaxed)
    }

    pub fn set_filter_enabled(&self, enabled: bool) {
        self.filter_enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn visualization(&self) -> bool {
        self.visualization.load(Ordering::Relaxed)
    }

    pub fn set_visualization(&self, enabled: bool) {
        self.visualization.store(enabled, Ordering::Relaxed);
    }
}

/// What one acquisition cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub samples: usize,
    pub queued: Option<Enqueued>,
    pub playback: Option<PlaybackReport>,
}

/// Publish a status line without ever blocking the producer.
pub fn publish(status: &mpsc::Sender<LinkStatus>, event: LinkStatus) {
    log::info!("Status: {}", event);
    if status.try_send(event).is_err() {
        log::debug!("Status channel full or closed, event dropped");
    }
}

pub struct Producer {
    source: Box<dyn AcquisitionSource>,
    filter: FirFilter,
    sink: Option<PlaybackSink<Box<dyn OutputDevice>>>,
    queue: HandoffSender,
    status: mpsc::Sender<LinkStatus>,
}

impl Producer {
    pub fn new(
        source: Box<dyn AcquisitionSource>,
        filter: FirFilter,
        sink: Option<PlaybackSink<Box<dyn OutputDevice>>>,
        queue: HandoffSender,
        status: mpsc::Sender<LinkStatus>,
    ) -> Self {
        Self {
            source,
            filter,
            sink,
            queue,
            status,
        }
    }

    /// Open the configured devices. Playback only exists for the software variant.
    pub fn open(
        config: &Config,
        queue: HandoffSender,
        status: mpsc::Sender<LinkStatus>,
    ) -> Result<Self> {
        let coeffs = FilterCoefficients::new(config.filter_coefficients.clone(), config.filter_shift)
            .ok_or_else(|| PipelineError::Config("invalid filter coefficients".into()))?;

        let source = open_source(config)?;

        let sink = match config.variant {
            Variant::Software => {
                let output = AlsaOutput::open(
                    &config.playback_device,
                    config.sample_rate,
                    config.chunk_size,
                    config.playback_buffer_chunks,
                )?;
                let device: Box<dyn OutputDevice> = Box::new(output);
                Some(PlaybackSink::new(device, config.chunk_size))
            }
            Variant::Hardware => None,
        };

        publish(&status, LinkStatus::Connected(source.name().to_string()));
        Ok(Self::new(source, FirFilter::new(coeffs), sink, queue, status))
    }

    /// One cycle. Samples leave in the order they were acquired: queued
    /// first, then played.
    pub fn run_cycle(&mut self, controls: &PipelineControls) -> Result<CycleReport> {
        let block = self.source.acquire_block()?;
        let frame = decode(&block, self.source.sample_width())?;
        let processed = self.filter.process(frame, controls.filter_enabled());

        let queued = if controls.visualization() {
            Some(self.queue.offer(processed.clone()))
        } else {
            None
        };

        let playback = match self.sink.as_mut() {
            Some(sink) => Some(sink.write(&processed)?),
            None => None,
        };

        Ok(CycleReport {
            samples: processed.len(),
            queued,
            playback,
        })
    }

    /// Loop until stopped or the device fails, then close the devices on
    /// this thread so no I/O can follow.
    pub fn run(mut self, controls: &PipelineControls) {
        let name = self.source.name().to_string();
        log::info!("Producer started on '{}'", name);

        while controls.is_running() {
            match self.run_cycle(controls) {
                Ok(_) => {}
                Err(e @ PipelineError::Alignment { .. }) => {
                    log::error!("Dropping block: {}", e);
                }
                Err(e) => {
                    log::error!("Acquisition failed on '{}': {}", name, e);
                    publish(&self.status, LinkStatus::Failed(e.to_string()));
                    controls.request_stop();
                    break;
                }
            }
        }

        self.source.close();
        self.sink.take();
        publish(&self.status, LinkStatus::Disconnected(name));
        log::info!("Producer stopped ({} frames dropped at hand-off)", self.queue.dropped());
    }
}

/// A running producer thread plus its controls.
pub struct Pipeline {
    controls: Arc<PipelineControls>,
    handle: Option<JoinHandle<()>>,
}

impl Pipeline {
    /// Spawn the producer for `config`. Devices are opened on the producer
    /// thread; an open failure is published as [`LinkStatus::Failed`].
    pub fn start(
        config: Config,
        status: mpsc::Sender<LinkStatus>,
    ) -> Result<(Self, HandoffReceiver)> {
        config.validate()?;

        let (queue_tx, queue_rx) = handoff_channel(HandoffPolicy::for_config(&config));
        let controls = Arc::new(PipelineControls::new(config.filter_enabled, config.visualization));

        log::info!(
            "Pipeline starting: variant: {:?}, rate: {}Hz, chunk: {}, frame: {}, filter: {} taps >> {}",
            config.variant,
            config.sample_rate,
            config.chunk_size,
            config.frame_size,
            config.filter_coefficients.len(),
            config.filter_shift,
        );

        let handle = {
            let controls = controls.clone();
            thread::Builder::new()
                .name("audio-acquire".into())
                .spawn(move || match Producer::open(&config, queue_tx, status.clone()) {
                    Ok(producer) => producer.run(&controls),
                    Err(e) => {
                        log::error!("Failed to open devices: {}", e);
                        publish(&status, LinkStatus::Failed(e.to_string()));
                        controls.request_stop();
                    }
                })
                .map_err(|e| PipelineError::DeviceUnavailable(format!("spawn failed: {}", e)))?
        };

        Ok((
            Self {
                controls,
                handle: Some(handle),
            },
            queue_rx,
        ))
    }

    /// Run an already built producer on its own thread.
    pub fn spawn(producer: Producer, controls: Arc<PipelineControls>) -> Result<Self> {
        let handle = {
            let controls = controls.clone();
            thread::Builder::new()
                .name("audio-acquire".into())
                .spawn(move || producer.run(&controls))
                .map_err(|e| PipelineError::DeviceUnavailable(format!("spawn failed: {}", e)))?
        };
        Ok(Self {
            controls,
            handle: Some(handle),
        })
    }

    pub fn controls(&self) -> &PipelineControls {
        &self.controls
    }

    pub fn set_filter_enabled(&self, enabled: bool) {
        log::info!("FIR filter {}", if enabled { "on" } else { "off" });
        self.controls.set_filter_enabled(enabled);
    }

    pub fn set_visualization_enabled(&self, enabled: bool) {
        self.controls.set_visualization(enabled);
    }

    /// False once the producer has exited, on request or after a failure.
    pub fn is_running(&self) -> bool {
        self.controls.is_running()
            && self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// True once the producer thread has returned and released its devices.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(|h| h.is_finished())
    }

    /// Signal the producer to stop and join it on the blocking pool.
    ///
    /// A producer parked in device I/O keeps its thread until that call
    /// returns; the caller's runtime thread is never held by the join.
    pub fn shutdown(self) -> tokio::task::JoinHandle<()> {
        self.controls.request_stop();
        tokio::task::spawn_blocking(move || drop(self))
    }

    /// Signal the producer to stop and wait for it to close its devices.
    pub fn stop(&mut self) {
        self.controls.request_stop();
        if let Some(h) = self.handle.take() {
            if h.join().is_err() {
                log::error!("Producer thread panicked");
            }
        }
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.stop();
    }
}
