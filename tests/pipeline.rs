//! End-to-end checks over decode -> filter -> hand-off -> spectrum, no hardware.

use std::collections::VecDeque;

use audio_scope::acquisition::{AcquisitionSource, LinkStatus, SerialLinkDevice, SerialTransport};
use audio_scope::audio::{decode16, FilterCoefficients, FilterState, FirFilter, RawBlock, SampleWidth};
use audio_scope::handoff::{handoff_channel, HandoffPolicy};
use audio_scope::spectrum::{frequency_axis, SpectralAnalyzer};
use audio_scope::visualizer::Visualizer;
use audio_scope::{Config, PipelineControls, PipelineError, Producer, Result};
use tokio::sync::mpsc;

const RATE: u32 = 44100;

fn sine(freq: f64, len: usize, amplitude: f64) -> Vec<i16> {
    (0..len)
        .map(|i| {
            let t = i as f64 / RATE as f64;
            (amplitude * (2.0 * std::f64::consts::PI * freq * t).sin()).round() as i16
        })
        .collect()
}

#[test]
fn sine_440_peaks_at_nearest_bin() {
    let n = 1024;
    let block = RawBlock::from_i16(&sine(440.0, n, 12000.0));

    let frame = decode16(&block).unwrap();
    let mut filter = FirFilter::new(FilterCoefficients::identity());
    let filtered = filter.process(frame.clone(), true);
    assert_eq!(filtered, frame);

    let spectrum = SpectralAnalyzer::new().analyze(&filtered);
    assert_eq!(spectrum.len(), n);

    let peak = spectrum.peak_bin(n / 2).unwrap();
    let expected = (440.0 * n as f64 / RATE as f64).round() as usize;
    assert_eq!(peak, expected);

    let axis = frequency_axis(RATE, n);
    assert!((axis[peak] - 440.0).abs() <= RATE as f64 / n as f64 / 2.0);
}

#[test]
fn lowpass_attenuates_high_tone_more_than_low_tone() {
    let taps = vec![0, 2, 4, 6, 8, 6, 4, 2, 0, 0];
    let n = 2048;

    let peak_after_filter = |freq: f64| {
        let coeffs = FilterCoefficients::new(taps.clone(), 5).unwrap();
        let mut filter = FirFilter::new(coeffs);
        let frame = decode16(&RawBlock::from_i16(&sine(freq, n, 10000.0))).unwrap();
        let out = filter.process(frame, true);
        out.samples()[16..].iter().map(|s| s.abs()).max().unwrap()
    };

    let low = peak_after_filter(500.0);
    let high = peak_after_filter(12000.0);
    assert!(low > 9000, "low tone should pass, got {}", low);
    assert!(high < low / 2, "high tone should be cut, got {} vs {}", high, low);
}

#[test]
fn chunked_filtering_matches_one_shot() {
    let coeffs = FilterCoefficients::new(vec![0, 2, 4, 6, 8, 6, 4, 2, 0, 0], 5).unwrap();
    let signal = sine(3000.0, 2048, 8000.0);

    let whole = decode16(&RawBlock::from_i16(&signal)).unwrap();
    let (expected, _) = audio_scope::audio::fir::apply(&coeffs, &whole, &FilterState::zeroed(coeffs.len()));

    let mut filter = FirFilter::new(coeffs);
    let mut chunked = Vec::new();
    for chunk in signal.chunks(512) {
        let frame = decode16(&RawBlock::from_i16(chunk)).unwrap();
        chunked.extend_from_slice(filter.process(frame, true).samples());
    }
    assert_eq!(chunked, expected.samples());
}

/// Board answering every request with a 24-bit ramp block.
struct RampBoard {
    rx: VecDeque<u8>,
    next: i32,
}

impl SerialTransport for RampBoard {
    fn send(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        assert_eq!(bytes, &[0x57]);
        for _ in 0..1024 {
            let v = self.next;
            self.next += 1;
            self.rx.extend(&v.to_le_bytes()[..3]);
        }
        Ok(())
    }

    fn pending(&mut self) -> std::io::Result<usize> {
        Ok(self.rx.len())
    }

    fn receive_exact(&mut self, buf: &mut [u8]) -> std::io::Result<()> {
        for b in buf.iter_mut() {
            *b = self.rx.pop_front().unwrap();
        }
        Ok(())
    }
}

#[test]
fn serial_producer_feeds_single_slot_consumer() {
    let config = Config::default();
    let board = RampBoard {
        rx: VecDeque::new(),
        next: -512,
    };
    let source = SerialLinkDevice::with_transport(board, "ramp", &config);
    assert_eq!(source.sample_width(), SampleWidth::S24);

    let (queue, rx) = handoff_channel(HandoffPolicy::OverwriteIfFull);
    let (status, _status_rx) = mpsc::channel::<LinkStatus>(4);
    let mut producer = Producer::new(
        Box::new(source),
        FirFilter::new(FilterCoefficients::identity()),
        None,
        queue,
        status,
    );
    let controls = PipelineControls::new(false, true);
    let mut visualizer = Visualizer::new(rx, config.sample_rate);

    producer.run_cycle(&controls).unwrap();
    producer.run_cycle(&controls).unwrap();

    // Second block was dropped; the consumer sees the first, freshest-at-the-time one.
    let frame = visualizer.poll().unwrap();
    assert_eq!(frame.waveform.samples()[0], -512);
    assert_eq!(frame.waveform.samples()[1023], 511);
    assert_eq!(frame.spectrum.len(), 1024);
    assert!(visualizer.poll().is_none());
}

struct Blocks(VecDeque<RawBlock>);

impl AcquisitionSource for Blocks {
    fn sample_width(&self) -> SampleWidth {
        SampleWidth::S16
    }

    fn acquire_block(&mut self) -> Result<RawBlock> {
        self.0.pop_front().ok_or(PipelineError::Closed)
    }

    fn close(&mut self) {}

    fn name(&self) -> &str {
        "blocks"
    }
}

#[test]
fn software_path_assembles_visualization_frame() {
    let chunks: VecDeque<RawBlock> = sine(1000.0, 2048, 6000.0)
        .chunks(512)
        .map(RawBlock::from_i16)
        .collect();

    let (queue, rx) = handoff_channel(HandoffPolicy::Accumulate {
        threshold: 4,
        capacity: 16,
    });
    let (status, _status_rx) = mpsc::channel::<LinkStatus>(4);
    let mut producer = Producer::new(
        Box::new(Blocks(chunks)),
        FirFilter::new(FilterCoefficients::identity()),
        None,
        queue,
        status,
    );
    let controls = PipelineControls::new(true, true);
    let mut visualizer = Visualizer::new(rx, RATE);

    for _ in 0..3 {
        producer.run_cycle(&controls).unwrap();
        assert!(visualizer.poll().is_none());
    }
    producer.run_cycle(&controls).unwrap();

    let frame = visualizer.poll().unwrap();
    assert_eq!(frame.waveform.len(), 2048);
    let peak = frame.spectrum.peak_bin(1024).unwrap();
    assert_eq!(peak, (1000.0 * 2048.0 / RATE as f64).round() as usize);

    assert!(matches!(producer.run_cycle(&controls), Err(PipelineError::Closed)));
}
