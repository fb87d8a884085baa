//! flatshard: sharded flat vector index with multi-query weighted search
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │          Host process (line protocol on stdin/stdout)       │
//! │            stderr: blank line = ok, else error trace        │
//! └─────────────────────────────────────────────────────────────┘
//!               │                                │
//!               ▼                                ▼
//! ┌───────────────────────────┐   ┌─────────────────────────────┐
//! │  IndexBuilder             │   │  SearchEngine               │
//! │  batches → shard rollover │   │  per-query top-K → union →  │
//! │                           │   │  exact weighted re-rank     │
//! └───────────────────────────┘   └─────────────────────────────┘
//!               │                                │
//!               ▼                                ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  flatshard-core: ShardStore · ShardCatalog · DocumentStore  │
//! │  flatshard-encoder: Encoder · CachedEncoder (LRU)           │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod builder;
pub mod config;
pub mod corpus;
pub mod engine;
pub mod logging;
pub mod protocol;
pub mod worker;

pub use builder::{BatchReport, BuildSummary, IndexBuilder, SealedShard};
pub use config::{ConfigError, EncoderConfig, IndexConfig, IndexLayout, SearchConfig};
pub use engine::{QueryText, ScoredOrdinal, SearchEngine, SearchHit, SearchRequest, WeightedQuery};
pub use protocol::{Request, RequestError};
pub use worker::{run_build_worker, run_search_worker};
