//! Command-line flags and the typed configs built from them
//!
//! Flag names use underscores (`--index_filename`, `--vector_size`, ...)
//! so existing host launch scripts keep working.

use std::path::{Path, PathBuf};

use clap::{Args, ValueEnum};
use thiserror::Error;

use flatshard_core::{ShardTemplate, Similarity, TemplateError};
use flatshard_encoder::cache::DEFAULT_CACHE_SIZE;
use flatshard_encoder::{Encoder, LiteralEncoder};
#[cfg(feature = "onnx")]
use flatshard_encoder::ModelManager;

/// Environment variable consulted when `--error_log` is not given
pub const ERROR_LOG_ENV: &str = "FLATSHARD_ERROR_LOG";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("The provided {name} ({value}) is not a positive integer number")]
    NotPositive { name: &'static str, value: usize },

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("--model is required by the {0} encoder")]
    MissingModel(EncoderKind),

    #[error("The {0} encoder is not available in this build")]
    EncoderUnavailable(EncoderKind),
}

fn positive(name: &'static str, value: usize) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::NotPositive { name, value });
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SimilarityArg {
    /// Cosine similarity (vectors are normalized)
    Cos,
    /// Dot product
    Dot,
    /// Euclidean distance
    L2,
    /// Squared Euclidean distance
    L2sq,
}

impl From<SimilarityArg> for Similarity {
    fn from(arg: SimilarityArg) -> Self {
        match arg {
            SimilarityArg::Cos => Similarity::Cosine,
            SimilarityArg::Dot => Similarity::Dot,
            SimilarityArg::L2 => Similarity::L2,
            SimilarityArg::L2sq => Similarity::L2Squared,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EncoderKind {
    /// ONNX Runtime transformer encoder
    Onnx,
    /// Each text line is the vector itself (comma/space separated floats)
    Literal,
}

impl std::fmt::Display for EncoderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EncoderKind::Onnx => write!(f, "onnx"),
            EncoderKind::Literal => write!(f, "literal"),
        }
    }
}

/// Flags selecting and sizing the text encoder
#[derive(Args, Debug, Clone)]
pub struct EncoderArgs {
    /// How texts become vectors
    #[arg(long = "encoder", value_enum, default_value_t = EncoderKind::Onnx)]
    pub kind: EncoderKind,

    /// Model folder name inside the model root
    #[arg(long)]
    pub model: Option<String>,

    /// Width of the vectors produced by the model (commonly 768)
    #[arg(long = "vector_size")]
    pub vector_size: usize,

    /// Tokens kept per text before truncation (commonly 512)
    #[arg(long = "max_tokens")]
    pub max_tokens: usize,

    /// Directory holding model folders (defaults to $TRANSFORMERS_CACHE, then ./models)
    #[arg(long = "model_root")]
    pub model_root: Option<PathBuf>,
}

impl EncoderArgs {
    pub fn config(&self) -> EncoderConfig {
        EncoderConfig {
            kind: self.kind,
            model: self.model.clone(),
            model_root: self.model_root.clone(),
            dim: self.vector_size,
            max_tokens: self.max_tokens,
        }
    }
}

/// Flags shared by the `index` and `search` workers
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// Shard filename template with one %d, e.g. index/index_%d.shard
    #[arg(long = "index_filename")]
    pub index_filename: String,

    #[command(flatten)]
    pub encoding: EncoderArgs,

    /// Similarity used to compare vectors
    #[arg(long, value_enum)]
    pub similarity: SimilarityArg,

    /// File receiving the full trace of a fatal error (defaults to $FLATSHARD_ERROR_LOG)
    #[arg(long = "error_log")]
    pub error_log: Option<PathBuf>,

    /// File receiving tracing output; discarded when unset
    #[arg(long = "log_file")]
    pub log_file: Option<PathBuf>,
}

impl CommonArgs {
    pub fn error_log(&self) -> Option<PathBuf> {
        self.error_log
            .clone()
            .or_else(|| std::env::var_os(ERROR_LOG_ENV).map(PathBuf::from))
    }
}

#[derive(Args, Debug, Clone)]
pub struct IndexArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Documents encoded together per encoder call (16 or 32 are typical)
    #[arg(long = "batch_size")]
    pub batch_size: usize,

    /// Minimum number of vectors per shard before rolling over
    #[arg(long = "chunks_size")]
    pub chunks_size: usize,
}

#[derive(Args, Debug, Clone)]
pub struct SearchArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Text file of "<id>\t<text>" lines, one per indexed document
    #[arg(long = "docs_filename")]
    pub docs_filename: PathBuf,

    /// Byte offset of each document's line in the docs file, one per line
    #[arg(long = "refs_filename")]
    pub refs_filename: PathBuf,

    /// Query texts whose vectors are memoized
    #[arg(long = "cache_size", default_value_t = DEFAULT_CACHE_SIZE)]
    pub cache_size: usize,
}

/// Flags for building a whole index directory from a TSV corpus
#[derive(Args, Debug, Clone)]
pub struct BuildArgs {
    /// Corpus of "<id>\t<text>" lines
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output directory for index_<n>.shard, docs.txt and refs.txt
    #[arg(long = "index_dir")]
    pub index_dir: PathBuf,

    #[command(flatten)]
    pub encoding: EncoderArgs,

    /// Similarity used to compare vectors
    #[arg(long, value_enum, default_value_t = SimilarityArg::Dot)]
    pub similarity: SimilarityArg,

    #[arg(long = "batch_size", default_value_t = 32)]
    pub batch_size: usize,

    #[arg(long = "chunks_size", default_value_t = 1_000_000)]
    pub chunks_size: usize,

    /// Print the build summary as JSON
    #[arg(long)]
    pub json: bool,
}

/// Files making up an index directory written by `build`
#[derive(Debug, Clone)]
pub struct IndexLayout {
    pub template: ShardTemplate,
    pub docs: PathBuf,
    pub refs: PathBuf,
}

impl IndexLayout {
    pub const SHARD_TEMPLATE: &'static str = "index_%d.shard";
    pub const DOCS: &'static str = "docs.txt";
    pub const REFS: &'static str = "refs.txt";

    pub fn in_dir(dir: &Path) -> Result<Self, ConfigError> {
        let template = dir.join(Self::SHARD_TEMPLATE);
        Ok(Self {
            template: ShardTemplate::parse(&template.to_string_lossy())?,
            docs: dir.join(Self::DOCS),
            refs: dir.join(Self::REFS),
        })
    }
}

#[derive(Debug, Clone)]
pub struct EncoderConfig {
    pub kind: EncoderKind,
    pub model: Option<String>,
    pub model_root: Option<PathBuf>,
    pub dim: usize,
    pub max_tokens: usize,
}

impl EncoderConfig {
    pub fn literal(dim: usize) -> Self {
        Self {
            kind: EncoderKind::Literal,
            model: None,
            model_root: None,
            dim,
            max_tokens: 512,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("vector size", self.dim)?;
        positive("max tokens", self.max_tokens)?;
        if self.kind == EncoderKind::Onnx && self.model.is_none() {
            return Err(ConfigError::MissingModel(self.kind));
        }
        if self.kind == EncoderKind::Onnx && !cfg!(feature = "onnx") {
            return Err(ConfigError::EncoderUnavailable(self.kind));
        }
        Ok(())
    }

    #[cfg(feature = "onnx")]
    fn model_manager(&self) -> ModelManager {
        match &self.model_root {
            Some(root) => ModelManager::from_dir(root),
            None => ModelManager::from_env(),
        }
    }

    /// Construct the configured encoder
    pub fn open(&self) -> anyhow::Result<Box<dyn Encoder>> {
        self.validate()?;
        match self.kind {
            EncoderKind::Literal => Ok(Box::new(LiteralEncoder::new(self.dim))),
            EncoderKind::Onnx => self.open_onnx(),
        }
    }

    #[cfg(feature = "onnx")]
    fn open_onnx(&self) -> anyhow::Result<Box<dyn Encoder>> {
        use anyhow::Context;

        let model = self
            .model
            .as_deref()
            .ok_or(ConfigError::MissingModel(self.kind))?;
        let manager = self.model_manager();
        let files = manager
            .resolve(model)
            .with_context(|| format!("resolving model {} under {:?}", model, manager.root()))?;
        let encoder = flatshard_encoder::OnnxEncoder::new(&files, model, self.dim, self.max_tokens)
            .with_context(|| format!("loading model {}", model))?;
        Ok(Box::new(encoder))
    }

    #[cfg(not(feature = "onnx"))]
    fn open_onnx(&self) -> anyhow::Result<Box<dyn Encoder>> {
        Err(ConfigError::EncoderUnavailable(self.kind).into())
    }
}

#[derive(Debug, Clone)]
pub struct IndexConfig {
    pub template: ShardTemplate,
    pub dim: usize,
    pub similarity: Similarity,
    pub batch_size: usize,
    pub chunks_size: usize,
}

impl IndexConfig {
    pub fn new(
        template: &str,
        dim: usize,
        similarity: Similarity,
        batch_size: usize,
        chunks_size: usize,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            template: ShardTemplate::parse(template)?,
            dim,
            similarity,
            batch_size,
            chunks_size,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("vector size", self.dim)?;
        positive("batch size", self.batch_size)?;
        positive("chunks size", self.chunks_size)
    }
}

impl TryFrom<&IndexArgs> for IndexConfig {
    type Error = ConfigError;

    fn try_from(args: &IndexArgs) -> Result<Self, Self::Error> {
        Self::new(
            &args.common.index_filename,
            args.common.encoding.vector_size,
            args.common.similarity.into(),
            args.batch_size,
            args.chunks_size,
        )
    }
}

#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub template: ShardTemplate,
    pub dim: usize,
    pub similarity: Similarity,
    pub docs_path: PathBuf,
    pub refs_path: PathBuf,
    pub cache_size: usize,
}

impl SearchConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("vector size", self.dim)
    }
}

impl TryFrom<&SearchArgs> for SearchConfig {
    type Error = ConfigError;

    fn try_from(args: &SearchArgs) -> Result<Self, Self::Error> {
        let config = Self {
            template: ShardTemplate::parse(&args.common.index_filename)?,
            dim: args.common.encoding.vector_size,
            similarity: args.common.similarity.into(),
            docs_path: args.docs_filename.clone(),
            refs_path: args.refs_filename.clone(),
            cache_size: args.cache_size,
        };
        config.validate()?;
        Ok(config)
    }
}
