//! Raw byte blocks and their decoding into integer sample frames.

use bytes::Bytes;

use crate::error::{PipelineError, Result};

/// Bytes per sample on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleWidth {
    /// Little-endian signed 16-bit (local capture).
    S16,
    /// Packed little-endian signed 24-bit (serial DSP board).
    S24,
}

impl SampleWidth {
    pub fn bytes(self) -> usize {
        match self {
            SampleWidth::S16 => 2,
            SampleWidth::S24 => 3,
        }
    }

    /// Wrap an accumulator value into this width, the way a fixed-point
    /// register of that size would hold it.
    pub fn narrow(self, value: i64) -> i32 {
        match self {
            SampleWidth::S16 => value as i16 as i32,
            SampleWidth::S24 => ((value as i32) << 8) >> 8,
        }
    }
}

/// One acquisition cycle worth of undecoded bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawBlock {
    data: Bytes,
}

impl RawBlock {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    /// Encode 16-bit samples into a block, as the capture device delivers them.
    pub fn from_i16(samples: &[i16]) -> Self {
        let mut buf = Vec::with_capacity(samples.len() * 2);
        for s in samples {
            buf.extend_from_slice(&s.to_le_bytes());
        }
        Self::new(buf)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Decoded mono samples, widened to `i32` but tagged with their native width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleFrame {
    samples: Vec<i32>,
    width: SampleWidth,
}

impl SampleFrame {
    pub fn new(samples: Vec<i32>, width: SampleWidth) -> Self {
        Self { samples, width }
    }

    pub fn samples(&self) -> &[i32] {
        &self.samples
    }

    pub fn width(&self) -> SampleWidth {
        self.width
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn into_samples(self) -> Vec<i32> {
        self.samples
    }

    /// Samples narrowed to `i16` for the playback device.
    pub fn to_i16(&self) -> Vec<i16> {
        self.samples.iter().map(|&s| s as i16).collect()
    }

    /// Join consecutive frames into one, preserving order.
    pub fn concat(frames: Vec<SampleFrame>) -> Option<SampleFrame> {
        let mut iter = frames.into_iter();
        let mut first = iter.next()?;
        for frame in iter {
            first.samples.extend_from_slice(&frame.samples);
        }
        Some(first)
    }
}

/// Little-endian signed 16-bit samples.
pub fn decode16(block: &RawBlock) -> Result<SampleFrame> {
    let bytes = aligned(block, SampleWidth::S16)?;
    let samples = bytes
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]) as i32)
        .collect();
    Ok(SampleFrame::new(samples, SampleWidth::S16))
}

/// Packed little-endian signed 24-bit samples, sign-extended from bit 7 of
/// the third byte.
pub fn decode24(block: &RawBlock) -> Result<SampleFrame> {
    let bytes = aligned(block, SampleWidth::S24)?;
    let samples = bytes
        .chunks_exact(3)
        .map(|b| {
            let ext = if b[2] & 0x80 != 0 { 0xFF } else { 0x00 };
            i32::from_le_bytes([b[0], b[1], b[2], ext])
        })
        .collect();
    Ok(SampleFrame::new(samples, SampleWidth::S24))
}

pub fn decode(block: &RawBlock, width: SampleWidth) -> Result<SampleFrame> {
    match width {
        SampleWidth::S16 => decode16(block),
        SampleWidth::S24 => decode24(block),
    }
}

fn aligned(block: &RawBlock, width: SampleWidth) -> Result<&[u8]> {
    let len = block.len();
    if len % width.bytes() != 0 {
        return Err(PipelineError::Alignment {
            len,
            width: width.bytes(),
        });
    }
    Ok(block.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode24_sign_extension() {
        let block = RawBlock::new(vec![
            0xFF, 0xFF, 0xFF, // -1
            0x00, 0x00, 0x00, // 0
            0x00, 0x00, 0x80, // most negative 24-bit value
            0xFF, 0xFF, 0x7F, // most positive 24-bit value
            0x34, 0x12, 0x00, // 0x1234
        ]);
        let frame = decode24(&block).unwrap();
        assert_eq!(frame.samples(), &[-1, 0, -8_388_608, 8_388_607, 0x1234]);
        assert_eq!(frame.width(), SampleWidth::S24);
    }

    #[test]
    fn decode24_low_bits_match_input() {
        let bytes: Vec<u8> = (0..=255u8).cycle().step_by(7).take(3 * 200).collect();
        let frame = decode24(&RawBlock::new(bytes.clone())).unwrap();
        assert_eq!(frame.len(), bytes.len() / 3);
        for (sample, triplet) in frame.samples().iter().zip(bytes.chunks_exact(3)) {
            assert_eq!(&sample.to_le_bytes()[..3], triplet);
            assert_eq!(*sample < 0, triplet[2] & 0x80 != 0);
        }
    }

    #[test]
    fn decode24_rejects_misaligned_block() {
        let err = decode24(&RawBlock::new(vec![0u8; 3071])).unwrap_err();
        assert!(matches!(err, PipelineError::Alignment { len: 3071, width: 3 }));
    }

    #[test]
    fn decode16_little_endian() {
        let block = RawBlock::from_i16(&[0, 1, -1, i16::MAX, i16::MIN]);
        assert_eq!(block.len(), 10);
        let frame = decode16(&block).unwrap();
        assert_eq!(frame.samples(), &[0, 1, -1, 32767, -32768]);
    }

    #[test]
    fn decode16_rejects_odd_length() {
        assert!(matches!(
            decode16(&RawBlock::new(vec![0u8; 5])),
            Err(PipelineError::Alignment { len: 5, width: 2 })
        ));
    }

    #[test]
    fn narrow_wraps_like_fixed_point() {
        assert_eq!(SampleWidth::S16.narrow(32768), -32768);
        assert_eq!(SampleWidth::S16.narrow(-1), -1);
        assert_eq!(SampleWidth::S24.narrow(0x80_0000), -0x80_0000);
        assert_eq!(SampleWidth::S24.narrow(0x7F_FFFF), 0x7F_FFFF);
    }

    #[test]
    fn concat_keeps_order() {
        let a = SampleFrame::new(vec![1, 2], SampleWidth::S16);
        let b = SampleFrame::new(vec![3], SampleWidth::S16);
        assert_eq!(SampleFrame::concat(vec![a, b]).unwrap().samples(), &[1, 2, 3]);
        assert!(SampleFrame::concat(Vec::new()).is_none());
    }
}
