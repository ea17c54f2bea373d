//! Binary framing for analyzer results.
//!
//! Layout, all integers little-endian:
//!
//! ```text
//! magic  "SSA1"           4 bytes
//! rank   u32              4 bytes
//! dims   u32 * rank
//! data   f32 * product(dims)
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::analysis::AnalysisOutput;
use crate::constants::protocol::RESULT_MAGIC;
use crate::error::CodecError;

/// Encode an output into a result frame.
pub fn encode(output: &AnalysisOutput) -> Bytes {
    let shape = output.shape();
    let data = output.data();
    let mut buf = BytesMut::with_capacity(8 + 4 * (shape.len() + data.len()));

    buf.put_slice(&RESULT_MAGIC);
    buf.put_u32_le(shape.len() as u32);
    for &dim in shape {
        buf.put_u32_le(dim as u32);
    }
    for &value in data {
        buf.put_f32_le(value);
    }
    buf.freeze()
}

/// Decode a result frame produced by [`encode`].
pub fn decode(mut frame: &[u8]) -> Result<AnalysisOutput, CodecError> {
    ensure(frame, 8)?;
    if frame[..4] != RESULT_MAGIC {
        return Err(CodecError::BadMagic);
    }
    frame.advance(4);

    let rank = frame.get_u32_le() as usize;
    ensure(frame, rank.saturating_mul(4))?;
    let shape: Vec<usize> = (0..rank).map(|_| frame.get_u32_le() as usize).collect();

    let len = shape
        .iter()
        .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
        .ok_or_else(|| CodecError::ShapeMismatch {
            shape: shape.clone(),
            len: frame.len() / 4,
        })?;
    ensure(frame, len.saturating_mul(4))?;
    if frame.len() != len * 4 {
        return Err(CodecError::ShapeMismatch {
            shape,
            len: frame.len() / 4,
        });
    }

    let data = (0..len).map(|_| frame.get_f32_le()).collect();
    AnalysisOutput::new(shape, data)
}

fn ensure(frame: &[u8], needed: usize) -> Result<(), CodecError> {
    if frame.len() < needed {
        Err(CodecError::Truncated {
            needed: needed - frame.len(),
        })
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_frame_layout() {
        let frame = encode(&AnalysisOutput::scalar(10.0));
        assert_eq!(&frame[..4], b"SSA1");
        assert_eq!(&frame[4..8], &1u32.to_le_bytes());
        assert_eq!(&frame[8..12], &1u32.to_le_bytes());
        assert_eq!(&frame[12..], &10.0f32.to_le_bytes());
        assert_eq!(decode(&frame).unwrap(), AnalysisOutput::scalar(10.0));
    }

    #[test]
    fn test_matrix_is_lossless() {
        let output =
            AnalysisOutput::matrix(2, 3, vec![0.1, -2.5, f32::MIN_POSITIVE, 1e9, -0.0, 7.0])
                .unwrap();
        assert_eq!(decode(&encode(&output)).unwrap(), output);
    }

    #[test]
    fn test_rejects_truncated_frame() {
        let frame = encode(&AnalysisOutput::vector(vec![1.0, 2.0]));
        assert_eq!(
            decode(&frame[..frame.len() - 2]),
            Err(CodecError::Truncated { needed: 2 })
        );
        assert!(matches!(decode(b"SS"), Err(CodecError::Truncated { .. })));
    }

    #[test]
    fn test_rejects_bad_magic_and_trailing_bytes() {
        let mut frame = encode(&AnalysisOutput::scalar(1.0)).to_vec();
        let mut padded = frame.clone();
        padded.extend_from_slice(&[0; 4]);
        assert!(matches!(decode(&padded), Err(CodecError::ShapeMismatch { .. })));

        frame[0] = b'X';
        assert_eq!(decode(&frame), Err(CodecError::BadMagic));
    }
}
