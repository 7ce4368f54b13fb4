//! Flat binary encoding of named tensors.
//!
//! A weight blob is the concatenation of every tensor's elements as
//! little-endian `f32`, in spec order. The blob carries no framing; the list of
//! [`WeightSpec`]s is required to decode it.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    Float32,
}

impl DType {
    #[must_use]
    pub const fn byte_size(self) -> usize {
        match self {
            Self::Float32 => 4,
        }
    }
}

/// Name, shape and element type of one encoded tensor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightSpec {
    pub name: String,
    pub shape: Vec<usize>,
    pub dtype: DType,
}

impl WeightSpec {
    #[must_use]
    pub fn new(name: impl Into<String>, shape: Vec<usize>) -> Self {
        Self {
            name: name.into(),
            shape,
            dtype: DType::Float32,
        }
    }

    /// Number of elements; a scalar (empty shape) has one.
    #[must_use]
    pub fn element_count(&self) -> usize {
        self.shape.iter().product()
    }

    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.element_count() * self.dtype.byte_size()
    }
}

#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error)]
pub enum DecodeError {
    #[display("weight blob has {actual} bytes, specs describe {expected}")]
    ByteLength { expected: usize, actual: usize },
    #[display("expected {expected} tensors, got {actual}")]
    TensorCount { expected: usize, actual: usize },
    #[display("expected tensor {expected:?}, got {actual:?}")]
    Name { expected: String, actual: String },
    #[display("tensor {name:?} has shape {actual:?}, expected {expected:?}")]
    Shape {
        name: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
    #[display("shape {shape:?} needs {expected} elements, got {actual}")]
    ElementCount {
        shape: Vec<usize>,
        expected: usize,
        actual: usize,
    },
}

/// A dense row-major `f32` tensor.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    shape: Vec<usize>,
    data: Vec<f32>,
}

impl Tensor {
    pub fn new(shape: Vec<usize>, data: Vec<f32>) -> Result<Self, DecodeError> {
        let expected = shape.iter().product();
        if data.len() != expected {
            return Err(DecodeError::ElementCount {
                shape,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { shape, data })
    }

    #[must_use]
    pub fn zeros(shape: Vec<usize>) -> Self {
        let data = vec![0.0; shape.iter().product()];
        Self { shape, data }
    }

    #[must_use]
    pub fn scalar(value: f32) -> Self {
        Self {
            shape: vec![],
            data: vec![value],
        }
    }

    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    #[must_use]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    #[must_use]
    pub fn into_data(self) -> Vec<f32> {
        self.data
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NamedTensor {
    pub name: String,
    pub tensor: Tensor,
}

impl NamedTensor {
    #[must_use]
    pub fn new(name: impl Into<String>, tensor: Tensor) -> Self {
        Self {
            name: name.into(),
            tensor,
        }
    }

    #[must_use]
    pub fn spec(&self) -> WeightSpec {
        WeightSpec::new(self.name.clone(), self.tensor.shape.clone())
    }
}

/// Encodes tensors into one blob and the specs needed to decode it.
#[must_use]
pub fn encode_weights(tensors: &[NamedTensor]) -> (Vec<u8>, Vec<WeightSpec>) {
    let specs = tensors.iter().map(NamedTensor::spec).collect::<Vec<_>>();
    let bytes = tensors
        .iter()
        .flat_map(|t| t.tensor.data.iter().flat_map(|v| v.to_le_bytes()))
        .collect();
    (bytes, specs)
}

/// Decodes a blob produced by [`encode_weights`].
///
/// The blob length must match the specs exactly.
pub fn decode_weights(bytes: &[u8], specs: &[WeightSpec]) -> Result<Vec<NamedTensor>, DecodeError> {
    let expected = specs.iter().map(WeightSpec::byte_len).sum();
    if bytes.len() != expected {
        return Err(DecodeError::ByteLength {
            expected,
            actual: bytes.len(),
        });
    }
    let mut rest = bytes;
    let tensors = specs
        .iter()
        .map(|spec| {
            let (chunk, tail) = rest.split_at(spec.byte_len());
            rest = tail;
            let data = chunk
                .chunks_exact(DType::Float32.byte_size())
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect();
            NamedTensor::new(
                spec.name.clone(),
                Tensor {
                    shape: spec.shape.clone(),
                    data,
                },
            )
        })
        .collect();
    Ok(tensors)
}

/// Checks that `tensors` match `specs` by count, name and shape.
pub fn check_specs(tensors: &[NamedTensor], specs: &[WeightSpec]) -> Result<(), DecodeError> {
    if tensors.len() != specs.len() {
        return Err(DecodeError::TensorCount {
            expected: specs.len(),
            actual: tensors.len(),
        });
    }
    for (tensor, spec) in tensors.iter().zip(specs) {
        if tensor.name != spec.name {
            return Err(DecodeError::Name {
                expected: spec.name.clone(),
                actual: tensor.name.clone(),
            });
        }
        if tensor.tensor.shape != spec.shape {
            return Err(DecodeError::Shape {
                name: spec.name.clone(),
                expected: spec.shape.clone(),
                actual: tensor.tensor.shape.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<NamedTensor> {
        vec![
            NamedTensor::new("iter", Tensor::scalar(3.0)),
            NamedTensor::new(
                "kernel",
                Tensor::new(vec![2, 2], vec![0.5, -1.25, f32::MAX, 0.0]).unwrap(),
            ),
        ]
    }

    #[test]
    fn test_encode_layout() {
        let (bytes, specs) = encode_weights(&sample());
        assert_eq!(bytes.len(), 20);
        assert_eq!(&bytes[..4], &3.0_f32.to_le_bytes());
        assert_eq!(specs[0].shape, Vec::<usize>::new());
        assert_eq!(specs[1].byte_len(), 16);
    }

    #[test]
    fn test_decode_restores_tensors() {
        let tensors = sample();
        let (bytes, specs) = encode_weights(&tensors);
        assert_eq!(decode_weights(&bytes, &specs).unwrap(), tensors);
    }

    #[test]
    fn test_decode_rejects_length_mismatch() {
        let (bytes, specs) = encode_weights(&sample());
        assert_eq!(
            decode_weights(&bytes[..16], &specs).unwrap_err(),
            DecodeError::ByteLength {
                expected: 20,
                actual: 16
            }
        );
        let mut longer = bytes.clone();
        longer.push(0);
        assert!(decode_weights(&longer, &specs).is_err());
    }

    #[test]
    fn test_check_specs() {
        let tensors = sample();
        let specs = tensors.iter().map(NamedTensor::spec).collect::<Vec<_>>();
        assert!(check_specs(&tensors, &specs).is_ok());
        assert!(matches!(
            check_specs(&tensors[..1], &specs),
            Err(DecodeError::TensorCount { .. })
        ));
        let renamed = vec![WeightSpec::new("step", vec![]), specs[1].clone()];
        assert!(matches!(
            check_specs(&tensors, &renamed),
            Err(DecodeError::Name { .. })
        ));
        let reshaped = vec![specs[0].clone(), WeightSpec::new("kernel", vec![4])];
        assert!(matches!(
            check_specs(&tensors, &reshaped),
            Err(DecodeError::Shape { .. })
        ));
    }

    #[test]
    fn test_tensor_element_count() {
        assert!(Tensor::new(vec![2, 3], vec![0.0; 5]).is_err());
        assert_eq!(Tensor::zeros(vec![2, 3]).data().len(), 6);
    }
}
