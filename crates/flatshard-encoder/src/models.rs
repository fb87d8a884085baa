use std::path::{Path, PathBuf};

use thiserror::Error;

/// Environment variable naming the directory that holds model folders
pub const MODEL_ROOT_ENV: &str = "TRANSFORMERS_CACHE";

const DEFAULT_MODEL_ROOT: &str = "models";
const TOKENIZER_FILE: &str = "tokenizer.json";
const MODEL_CANDIDATES: [&str; 2] = ["model.onnx", "onnx/model.onnx"];

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Model directory not found: {0:?}")]
    DirectoryNotFound(PathBuf),
    #[error("Required model file missing: {0:?}")]
    ModelMissing(PathBuf),
}

/// Files making up one locally staged model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelFiles {
    pub dir: PathBuf,
    pub model: PathBuf,
    pub tokenizer: PathBuf,
}

/// Resolves `<root>/<model>/` to its ONNX graph and tokenizer
///
/// Resolution is offline only; nothing is downloaded.
pub struct ModelManager {
    root: PathBuf,
}

impl ModelManager {
    pub fn from_dir(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root from `TRANSFORMERS_CACHE`, falling back to `./models`
    pub fn from_env() -> Self {
        match std::env::var(MODEL_ROOT_ENV) {
            Ok(p) if !p.is_empty() => Self::from_dir(p),
            _ => Self::from_dir(DEFAULT_MODEL_ROOT),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolve(&self, model: &str) -> Result<ModelFiles, ModelError> {
        let dir = self.root.join(model);
        if !dir.is_dir() {
            return Err(ModelError::DirectoryNotFound(dir));
        }

        let model = MODEL_CANDIDATES
            .iter()
            .map(|name| dir.join(name))
            .find(|p| p.is_file())
            .ok_or_else(|| ModelError::ModelMissing(dir.join(MODEL_CANDIDATES[0])))?;

        let tokenizer = dir.join(TOKENIZER_FILE);
        if !tokenizer.is_file() {
            return Err(ModelError::ModelMissing(tokenizer));
        }

        Ok(ModelFiles {
            dir,
            model,
            tokenizer,
        })
    }
}
