//! FFT magnitude of the latest frame, as plotted by the visualizer.

use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use crate::audio::SampleFrame;

/// Magnitude per FFT bin, `frameLength` bins (the mirrored half included).
#[derive(Debug, Clone, PartialEq)]
pub struct SpectralFrame {
    magnitudes: Vec<f64>,
}

impl SpectralFrame {
    pub fn magnitudes(&self) -> &[f64] {
        &self.magnitudes
    }

    pub fn len(&self) -> usize {
        self.magnitudes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.magnitudes.is_empty()
    }

    /// Index of the largest bin among the first `limit` bins.
    pub fn peak_bin(&self, limit: usize) -> Option<usize> {
        self.magnitudes
            .iter()
            .take(limit)
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
    }
}

/// Bin centre frequencies for a `len`-point transform at `sample_rate`.
pub fn frequency_axis(sample_rate: u32, len: usize) -> Vec<f64> {
    let step = sample_rate as f64 / len.max(1) as f64;
    (0..len).map(|k| k as f64 * step).collect()
}

/// Stateless across calls apart from a cached FFT plan.
pub struct SpectralAnalyzer {
    planner: FftPlanner<f64>,
    plan: Option<(usize, Arc<dyn Fft<f64>>)>,
    buffer: Vec<Complex<f64>>,
}

impl SpectralAnalyzer {
    pub fn new() -> Self {
        Self {
            planner: FftPlanner::new(),
            plan: None,
            buffer: Vec::new(),
        }
    }

    /// `|FFT(x)| * 2 / (128 * N)` for every bin.
    pub fn analyze(&mut self, frame: &SampleFrame) -> SpectralFrame {
        let n = frame.len();
        if n == 0 {
            return SpectralFrame {
                magnitudes: Vec::new(),
            };
        }

        let fft = match &self.plan {
            Some((len, plan)) if *len == n => plan.clone(),
            _ => {
                let plan = self.planner.plan_fft_forward(n);
                self.plan = Some((n, plan.clone()));
                plan
            }
        };

        self.buffer.clear();
        self.buffer
            .extend(frame.samples().iter().map(|&s| Complex::new(s as f64, 0.0)));
        fft.process(&mut self.buffer);

        let scale = 2.0 / (128.0 * n as f64);
        SpectralFrame {
            magnitudes: self.buffer.iter().map(|c| c.norm() * scale).collect(),
        }
    }
}

impl Default for SpectralAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}
