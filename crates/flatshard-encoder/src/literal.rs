//! Literal encoder: each text *is* the vector
//!
//! Components are separated by commas and/or whitespace, e.g.
//! `0.1, -0.4 0.25`. Used by hosts that compute embeddings elsewhere and by
//! tests that need exact, model-free vectors.

use crate::{check_dim, Encoder, EncoderError};

pub struct LiteralEncoder {
    dim: usize,
}

impl LiteralEncoder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }

    pub fn parse(&self, text: &str) -> Result<Vec<f32>, EncoderError> {
        let vector = text
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|token| !token.is_empty())
            .enumerate()
            .map(|(position, token)| {
                token
                    .parse::<f32>()
                    .ok()
                    .filter(|x| x.is_finite())
                    .ok_or_else(|| EncoderError::Parse {
                        position,
                        token: token.to_string(),
                    })
            })
            .collect::<Result<Vec<f32>, _>>()?;
        check_dim(self.dim, &vector)?;
        Ok(vector)
    }
}

impl Encoder for LiteralEncoder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn model_id(&self) -> &str {
        "literal"
    }

    fn encode_batch(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>, EncoderError> {
        texts.iter().map(|text| self.parse(text)).collect()
    }

    fn encode(&mut self, text: &str) -> Result<Vec<f32>, EncoderError> {
        self.parse(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_commas_and_spaces() {
        let mut encoder = LiteralEncoder::new(3);

        assert_eq!(encoder.encode("1, 2.5,-3").unwrap(), vec![1.0, 2.5, -3.0]);
        assert_eq!(encoder.encode("  1 2\t3 ").unwrap(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_rejects_wrong_width_and_garbage() {
        let mut encoder = LiteralEncoder::new(2);

        assert!(matches!(
            encoder.encode("1,2,3"),
            Err(EncoderError::DimensionMismatch { expected: 2, actual: 3 })
        ));
        assert!(matches!(
            encoder.encode("1,x"),
            Err(EncoderError::Parse { position: 1, .. })
        ));
    }

    #[test]
    fn test_rejects_non_finite_components() {
        let mut encoder = LiteralEncoder::new(2);

        assert!(matches!(encoder.encode("NaN 1"), Err(EncoderError::Parse { position: 0, .. })));
        assert!(matches!(encoder.encode("1 inf"), Err(EncoderError::Parse { position: 1, .. })));
        assert!(matches!(encoder.encode("-inf,0"), Err(EncoderError::Parse { position: 0, .. })));
        assert!(matches!(encoder.encode("1e40 0"), Err(EncoderError::Parse { position: 0, .. })));
    }

    #[test]
    fn test_batch_keeps_order() {
        let mut encoder = LiteralEncoder::new(1);
        let texts = vec!["3".to_string(), "1".to_string(), "2".to_string()];

        let out = encoder.encode_batch(&texts).unwrap();
        assert_eq!(out, vec![vec![3.0], vec![1.0], vec![2.0]]);
    }
}
