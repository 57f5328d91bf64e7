//! Consumer side: drain the hand-off queue on a timer tick and feed the plots.

use async_trait::async_trait;

use crate::audio::SampleFrame;
use crate::handoff::HandoffReceiver;
use crate::spectrum::{frequency_axis, SpectralAnalyzer, SpectralFrame};

/// Outbound plotting API. Calls are fire-and-forget.
#[async_trait]
pub trait Visualization: Send + Sync {
    async fn set_waveform(&self, samples: &[i32]);
    async fn set_spectrum(&self, frequencies: &[f64], magnitudes: &[f64]);
}

/// One tick's worth of plot data.
#[derive(Debug, Clone)]
pub struct VisualFrame {
    pub waveform: SampleFrame,
    pub spectrum: SpectralFrame,
}

pub struct Visualizer {
    queue: HandoffReceiver,
    analyzer: SpectralAnalyzer,
    sample_rate: u32,
    axis: Vec<f64>,
}

impl Visualizer {
    pub fn new(queue: HandoffReceiver, sample_rate: u32) -> Self {
        Self {
            queue,
            analyzer: SpectralAnalyzer::new(),
            sample_rate,
            axis: Vec::new(),
        }
    }

    /// Non-blocking tick: returns `None` straight away when the queue
    /// does not yet hold a full frame.
    pub fn poll(&mut self) -> Option<VisualFrame> {
        let waveform = self.queue.try_take()?;
        let spectrum = self.analyzer.analyze(&waveform);
        Some(VisualFrame { waveform, spectrum })
    }

    /// Frequency of each spectrum bin for frames of `len` samples.
    pub fn frequencies(&mut self, len: usize) -> &[f64] {
        if self.axis.len() != len {
            self.axis = frequency_axis(self.sample_rate, len);
        }
        &self.axis
    }

    /// Poll once and forward whatever came out to `sink`.
    pub async fn tick(&mut self, sink: &dyn Visualization) -> bool {
        let Some(frame) = self.poll() else {
            return false;
        };
        sink.set_waveform(frame.waveform.samples()).await;
        let axis = self.frequencies(frame.spectrum.len());
        sink.set_spectrum(axis, frame.spectrum.magnitudes()).await;
        true
    }
}
