//! flatshard encoder: text → fixed-width vector
//!
//! ```text
//! text ──▶ ┌──────────────┐   miss   ┌─────────────────────────────┐
//!          │ CachedEncoder│ ───────▶ │ OnnxEncoder  (tokenizers +  │
//!          │  (LRU, text) │ ◀─────── │              ORT, [CLS])    │
//!          └──────────────┘  vector  │ LiteralEncoder (text = vec) │
//!                                    └─────────────────────────────┘
//! ```
//!
//! Everything downstream sees only the [`Encoder`] trait, so the search and
//! build paths are independent of how vectors are produced.

pub mod cache;
pub mod literal;
pub mod models;
#[cfg(feature = "onnx")]
pub mod onnx;

use thiserror::Error;

pub use cache::CachedEncoder;
pub use literal::LiteralEncoder;
pub use models::{ModelError, ModelFiles, ModelManager};
#[cfg(feature = "onnx")]
pub use onnx::OnnxEncoder;

#[derive(Error, Debug)]
pub enum EncoderError {
    #[error("Encoder produced {actual} dimensions, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Encoder returned {actual} vectors for {expected} texts")]
    BatchMismatch { expected: usize, actual: usize },

    #[error("Cannot parse \"{token}\" at position {position} as a vector component")]
    Parse { position: usize, token: String },

    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[cfg(feature = "onnx")]
    #[error("ORT error: {0}")]
    Ort(#[from] ort::Error),
}

/// Produces fixed-width vectors from text
pub trait Encoder {
    /// Width of every vector this encoder returns
    fn dim(&self) -> usize;

    /// Identity of the underlying model, used to scope caches
    fn model_id(&self) -> &str;

    /// Encode a batch, one vector per input text, in input order
    fn encode_batch(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>, EncoderError>;

    fn encode(&mut self, text: &str) -> Result<Vec<f32>, EncoderError> {
        let mut out = self.encode_batch(&[text.to_string()])?;
        if out.len() != 1 {
            return Err(EncoderError::BatchMismatch {
                expected: 1,
                actual: out.len(),
            });
        }
        out.pop().ok_or(EncoderError::BatchMismatch {
            expected: 1,
            actual: 0,
        })
    }
}

impl<E: Encoder + ?Sized> Encoder for Box<E> {
    fn dim(&self) -> usize {
        (**self).dim()
    }

    fn model_id(&self) -> &str {
        (**self).model_id()
    }

    fn encode_batch(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>, EncoderError> {
        (**self).encode_batch(texts)
    }

    fn encode(&mut self, text: &str) -> Result<Vec<f32>, EncoderError> {
        (**self).encode(text)
    }
}

/// Reject a vector whose width differs from the configured one
pub(crate) fn check_dim(expected: usize, vector: &[f32]) -> Result<(), EncoderError> {
    if vector.len() != expected {
        return Err(EncoderError::DimensionMismatch {
            expected,
            actual: vector.len(),
        });
    }
    Ok(())
}
