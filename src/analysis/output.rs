//! Numeric analyzer output.

use crate::error::CodecError;

/// An n-dimensional `f32` array in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOutput {
    shape: Vec<usize>,
    data: Vec<f32>,
}

impl AnalysisOutput {
    /// Build an array, checking that `shape` covers exactly `data`.
    pub fn new(shape: Vec<usize>, data: Vec<f32>) -> Result<Self, CodecError> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(CodecError::ShapeMismatch {
                shape,
                len: data.len(),
            });
        }
        Ok(Self { shape, data })
    }

    /// One-dimensional array.
    pub fn vector(data: Vec<f32>) -> Self {
        Self {
            shape: vec![data.len()],
            data,
        }
    }

    /// Single value, shape `[1]`.
    pub fn scalar(value: f32) -> Self {
        Self::vector(vec![value])
    }

    pub fn matrix(rows: usize, cols: usize, data: Vec<f32>) -> Result<Self, CodecError> {
        Self::new(vec![rows, cols], data)
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }
}
