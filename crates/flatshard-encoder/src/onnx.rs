//! ONNX text encoder using ORT (ONNX Runtime) and HuggingFace tokenizers
//!
//! Supports BERT-style encoders exported to ONNX. The sentence vector is the
//! hidden state of the first token (`[CLS]`); graphs that already emit a
//! pooled `[batch, hidden]` output are used as-is.

use ort::session::{builder::SessionBuilder, Session};
use ort::value::Value;
use tokenizers::{PaddingParams, Tokenizer, TruncationParams};

use crate::models::ModelFiles;
use crate::{check_dim, Encoder, EncoderError};

const INPUT_IDS: &str = "input_ids";
const ATTENTION_MASK: &str = "attention_mask";
const TOKEN_TYPE_IDS: &str = "token_type_ids";

pub struct OnnxEncoder {
    session: Session,
    tokenizer: Tokenizer,
    model_id: String,
    dim: usize,
    token_types: bool,
}

impl OnnxEncoder {
    /// Load a staged model, truncating inputs to `max_tokens`
    pub fn new(files: &ModelFiles, model_id: &str, dim: usize, max_tokens: usize) -> Result<Self, EncoderError> {
        // Already-initialized environments are fine
        let _ = ort::init().with_name("flatshard").commit();

        let session = SessionBuilder::new()?
            .with_intra_threads(1)?
            .commit_from_file(&files.model)?;

        let mut tokenizer = Tokenizer::from_file(&files.tokenizer)
            .map_err(|e| EncoderError::Tokenizer(e.to_string()))?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: max_tokens,
                ..Default::default()
            }))
            .map_err(|e| EncoderError::Tokenizer(e.to_string()))?;
        tokenizer.with_padding(Some(PaddingParams::default()));

        let token_types = session.inputs.iter().any(|input| input.name == TOKEN_TYPE_IDS);

        tracing::info!(
            "Loaded encoder {} from {:?} (dim={}, max_tokens={}, token_type_ids={})",
            model_id,
            files.model,
            dim,
            max_tokens,
            token_types
        );

        Ok(Self {
            session,
            tokenizer,
            model_id: model_id.to_string(),
            dim,
            token_types,
        })
    }

    fn run(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>, EncoderError> {
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| EncoderError::Tokenizer(e.to_string()))?;

        let batch = encodings.len();
        let seq_len = encodings.first().map(|e| e.get_ids().len()).unwrap_or(0);

        let mut input_ids = Vec::with_capacity(batch * seq_len);
        let mut attention_mask = Vec::with_capacity(batch * seq_len);
        let mut type_ids = Vec::with_capacity(batch * seq_len);
        for encoding in &encodings {
            input_ids.extend(encoding.get_ids().iter().map(|&x| x as i64));
            attention_mask.extend(encoding.get_attention_mask().iter().map(|&x| x as i64));
            type_ids.extend(encoding.get_type_ids().iter().map(|&x| x as i64));
        }

        let shape = vec![batch, seq_len];
        let mut inputs = vec![
            (INPUT_IDS, Value::from_array((shape.clone(), input_ids))?),
            (ATTENTION_MASK, Value::from_array((shape.clone(), attention_mask))?),
        ];
        if self.token_types {
            inputs.push((TOKEN_TYPE_IDS, Value::from_array((shape, type_ids))?));
        }

        let session = &mut self.session;
        let (dims, data) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let outputs = session.run(inputs)?;
            let (shape, data) = outputs[0].try_extract_tensor::<f32>()?;
            let dims: Vec<usize> = shape.iter().map(|&d| d.max(0) as usize).collect();
            Ok::<_, EncoderError>((dims, data.to_vec()))
        }))
        .map_err(|_| EncoderError::Inference("Inference panicked".to_string()))??;

        pool_first_token(&dims, &data, batch)
    }
}

/// Take the first-token row of each sequence from a `[batch, seq, hidden]`
/// output, or each row of a `[batch, hidden]` output
fn pool_first_token(dims: &[usize], data: &[f32], batch: usize) -> Result<Vec<Vec<f32>>, EncoderError> {
    let (rows, stride, hidden) = match *dims {
        [b, seq, hidden] => (b, seq * hidden, hidden),
        [b, hidden] => (b, hidden, hidden),
        _ => {
            return Err(EncoderError::Inference(format!(
                "Unexpected output shape {:?}",
                dims
            )))
        }
    };
    if rows != batch {
        return Err(EncoderError::BatchMismatch {
            expected: batch,
            actual: rows,
        });
    }
    if data.len() < rows * stride {
        return Err(EncoderError::Inference(format!(
            "Output holds {} values, shape {:?} needs {}",
            data.len(),
            dims,
            rows * stride
        )));
    }

    Ok((0..rows)
        .map(|row| data[row * stride..row * stride + hidden].to_vec())
        .collect())
}

impl Encoder for OnnxEncoder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn encode_batch(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>, EncoderError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let vectors = self.run(texts)?;
        for vector in &vectors {
            check_dim(self.dim, vector)?;
        }
        Ok(vectors)
    }
}
