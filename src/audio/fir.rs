//! Fixed-point FIR filter with history carried across chunk boundaries.

use super::decoder::SampleFrame;

/// Integer taps and the right shift applied after accumulation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterCoefficients {
    taps: Vec<i32>,
    shift: u32,
}

impl FilterCoefficients {
    /// Returns `None` for an empty tap list or a shift of 32 or more.
    pub fn new(taps: Vec<i32>, shift: u32) -> Option<Self> {
        if taps.is_empty() || shift >= 32 {
            return None;
        }
        Some(Self { taps, shift })
    }

    /// Pass-through filter: a single unit tap, no shift.
    pub fn identity() -> Self {
        Self { taps: vec![1], shift: 0 }
    }

    pub fn taps(&self) -> &[i32] {
        &self.taps
    }

    pub fn shift(&self) -> u32 {
        self.shift
    }

    pub fn len(&self) -> usize {
        self.taps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.taps.is_empty()
    }
}

/// The last `N-1` input samples, most recent first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterState {
    history: Vec<i32>,
}

impl FilterState {
    pub fn zeroed(taps: usize) -> Self {
        Self {
            history: vec![0; taps.saturating_sub(1)],
        }
    }

    pub fn history(&self) -> &[i32] {
        &self.history
    }

    /// Shift the newest input into history. Frames shorter than the history
    /// keep the older tail behind them.
    fn advance(&self, input: &[i32]) -> FilterState {
        let len = input.len();
        let history = (0..self.history.len())
            .map(|k| {
                if k < len {
                    input[len - 1 - k]
                } else {
                    self.history[k - len]
                }
            })
            .collect();
        FilterState { history }
    }
}

/// Convolve one frame against `coeffs`, seeding the leading edge from
/// `state`. Returns the filtered frame and the state for the next call.
pub fn apply(
    coeffs: &FilterCoefficients,
    input: &SampleFrame,
    state: &FilterState,
) -> (SampleFrame, FilterState) {
    let x = input.samples();
    let width = input.width();
    let output = (0..x.len())
        .map(|i| {
            let acc: i64 = coeffs
                .taps
                .iter()
                .enumerate()
                .map(|(j, &c)| {
                    let sample = if i >= j {
                        x[i - j]
                    } else {
                        state.history[j - i - 1]
                    };
                    c as i64 * sample as i64
                })
                .sum();
            width.narrow(acc >> coeffs.shift)
        })
        .collect();

    (SampleFrame::new(output, width), state.advance(x))
}

/// A filter instance owning its coefficients and history.
///
/// History follows the input whether or not filtering is enabled, so
/// re-enabling resumes with the real tail of the signal.
#[derive(Debug)]
pub struct FirFilter {
    coeffs: FilterCoefficients,
    state: FilterState,
}

impl FirFilter {
    pub fn new(coeffs: FilterCoefficients) -> Self {
        let state = FilterState::zeroed(coeffs.len());
        Self { coeffs, state }
    }

    pub fn coefficients(&self) -> &FilterCoefficients {
        &self.coeffs
    }

    pub fn state(&self) -> &FilterState {
        &self.state
    }

    /// Filter `input` when `enabled`, otherwise pass it through unchanged.
    pub fn process(&mut self, input: SampleFrame, enabled: bool) -> SampleFrame {
        if enabled {
            let (output, next) = apply(&self.coeffs, &input, &self.state);
            self.state = next;
            output
        } else {
            self.state = self.state.advance(input.samples());
            input
        }
    }

    pub fn reset(&mut self) {
        self.state = FilterState::zeroed(self.coeffs.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::decoder::SampleWidth;

    fn frame(samples: Vec<i32>) -> SampleFrame {
        SampleFrame::new(samples, SampleWidth::S16)
    }

    fn lowpass() -> FilterCoefficients {
        FilterCoefficients::new(vec![0, 2, 4, 6, 8, 6, 4, 2, 0, 0], 5).unwrap()
    }

    #[test]
    fn rejects_empty_taps_and_wide_shift() {
        assert!(FilterCoefficients::new(Vec::new(), 5).is_none());
        assert!(FilterCoefficients::new(vec![1], 32).is_none());
    }

    #[test]
    fn zero_taps_give_silence() {
        let coeffs = FilterCoefficients::new(vec![0; 10], 5).unwrap();
        let state = FilterState::zeroed(10);
        let input = frame((0..64).map(|i| i * 300 - 9000).collect());
        let (out, _) = apply(&coeffs, &input, &state);
        assert!(out.samples().iter().all(|&s| s == 0));

        let (out, next) = apply(&coeffs, &frame(vec![0; 64]), &state);
        assert!(out.samples().iter().all(|&s| s == 0));
        assert!(next.history().iter().all(|&s| s == 0));
    }

    #[test]
    fn identity_passes_input() {
        let input = frame(vec![5, -7, 32767, -32768]);
        let (out, next) = apply(&FilterCoefficients::identity(), &input, &FilterState::zeroed(1));
        assert_eq!(out, input);
        assert!(next.history().is_empty());
    }

    #[test]
    fn deterministic_for_same_inputs() {
        let coeffs = lowpass();
        let state = FilterState {
            history: vec![9, 8, 7, 6, 5, 4, 3, 2, 1],
        };
        let input = frame((0..128).map(|i| (i * 37 % 200) - 100).collect());
        assert_eq!(apply(&coeffs, &input, &state), apply(&coeffs, &input, &state));
    }

    #[test]
    fn history_is_most_recent_first() {
        let (_, next) = apply(&lowpass(), &frame((1..=20).collect()), &FilterState::zeroed(10));
        assert_eq!(next.history(), &[20, 19, 18, 17, 16, 15, 14, 13, 12]);
    }

    #[test]
    fn short_frame_keeps_older_history() {
        let state = FilterState {
            history: vec![9, 8, 7, 6],
        };
        assert_eq!(state.advance(&[10, 11]).history(), &[11, 10, 9, 8]);
    }

    #[test]
    fn second_frame_edge_uses_first_frame_tail() {
        let coeffs = FilterCoefficients::new(vec![1, 1, 1, 1], 0).unwrap();
        let mut filter = FirFilter::new(coeffs);

        let ramp = frame((1..=16).collect());
        filter.process(ramp, true);
        let out = filter.process(frame(vec![100; 16]), true);

        // 16, 15, 14 from the ramp tail fill the missing taps.
        assert_eq!(&out.samples()[..4], &[100 + 16 + 15 + 14, 200 + 16 + 15, 300 + 16, 400]);
        assert!(out.samples()[3..].iter().all(|&s| s == 400));
    }

    #[test]
    fn fresh_filter_starts_from_silence() {
        let coeffs = FilterCoefficients::new(vec![1, 1, 1], 0).unwrap();
        let mut filter = FirFilter::new(coeffs);
        let out = filter.process(frame(vec![10, 10, 10, 10]), true);
        assert_eq!(out.samples(), &[10, 20, 30, 30]);
    }

    #[test]
    fn shift_scales_lowpass_to_unity_dc_gain() {
        let mut filter = FirFilter::new(lowpass());
        filter.process(frame(vec![1000; 32]), true);
        let out = filter.process(frame(vec![1000; 32]), true);
        // Taps sum to 32, shift 5 divides by 32.
        assert!(out.samples().iter().all(|&s| s == 1000));
    }

    #[test]
    fn narrowing_wraps_to_sample_width() {
        let coeffs = FilterCoefficients::new(vec![2], 0).unwrap();
        let (out, _) = apply(&coeffs, &frame(vec![20000]), &FilterState::zeroed(1));
        assert_eq!(out.samples(), &[(40000i32 as i16) as i32]);

        let wide = SampleFrame::new(vec![0x60_0000], SampleWidth::S24);
        let (out, _) = apply(&coeffs, &wide, &FilterState::zeroed(1));
        assert_eq!(out.samples(), &[SampleWidth::S24.narrow(0xC0_0000)]);
        assert!(out.samples()[0] < 0);
    }

    #[test]
    fn bypass_still_tracks_history() {
        let coeffs = FilterCoefficients::new(vec![1, 1], 0).unwrap();
        let mut filter = FirFilter::new(coeffs);

        let passthrough = filter.process(frame(vec![1, 2, 3]), false);
        assert_eq!(passthrough.samples(), &[1, 2, 3]);
        assert_eq!(filter.state().history(), &[3]);

        let out = filter.process(frame(vec![10, 10]), true);
        assert_eq!(out.samples(), &[13, 20]);
    }

    #[test]
    fn reset_clears_history() {
        let mut filter = FirFilter::new(lowpass());
        filter.process(frame(vec![500; 16]), true);
        filter.reset();
        assert!(filter.state().history().iter().all(|&s| s == 0));
    }
}
