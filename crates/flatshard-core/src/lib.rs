//! flatshard core: shard storage, exact scan, catalog, and document text
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │        ShardCatalog (prefix sums · global ordinals)         │
//! ├──────────────────────────────┬──────────────────────────────┤
//! │  ShardStore (mmap, scan)     │  DocumentStore (mmap, refs)  │
//! ├──────────────────────────────┴──────────────────────────────┤
//! │   format (.shard header) · scan (top-k) · simd · metric     │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod catalog;
pub mod docs;
pub mod format;
pub mod metric;
pub mod scan;
pub mod simd;
pub mod store;
pub mod template;

pub use catalog::{CatalogError, ShardCatalog, ShardLocation};
pub use docs::{Document, DocumentError, DocumentStore, DocumentWriter};
pub use format::{ShardHeader, ShardWriter};
pub use metric::{ScanOrder, Similarity};
pub use scan::{Hit, TopK};
pub use simd::{dot_product, l2_distance, l2_distance_squared, l2_normalize};
pub use store::{ShardBuffer, ShardStore, StoreError};
pub use template::{ShardTemplate, TemplateError};
