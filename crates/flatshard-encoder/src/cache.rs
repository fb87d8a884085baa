//! LRU memoization of text → vector
//!
//! The cache is keyed by exact text and scoped to one model: swapping the
//! model through [`CachedEncoder::replace_model`] drops every entry.

use std::num::NonZeroUsize;

use lru::LruCache;

use crate::{check_dim, Encoder, EncoderError};

/// Default capacity, in texts
pub const DEFAULT_CACHE_SIZE: usize = 4096;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

pub struct CachedEncoder<E: Encoder> {
    inner: E,
    // None when capacity is zero
    cache: Option<LruCache<String, Vec<f32>>>,
    stats: CacheStats,
}

impl<E: Encoder> CachedEncoder<E> {
    pub fn new(inner: E, capacity: usize) -> Self {
        Self {
            inner,
            cache: NonZeroUsize::new(capacity).map(LruCache::new),
            stats: CacheStats::default(),
        }
    }

    pub fn inner(&self) -> &E {
        &self.inner
    }

    pub fn capacity(&self) -> usize {
        self.cache.as_ref().map(|c| c.cap().get()).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.cache.as_ref().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Drop every memoized vector
    pub fn invalidate(&mut self) {
        if let Some(cache) = self.cache.as_mut() {
            cache.clear();
        }
    }

    /// Swap the underlying model, returning the previous one
    pub fn replace_model(&mut self, inner: E) -> E {
        tracing::info!(
            "Replacing encoder {} with {}, dropping {} cached vectors",
            self.inner.model_id(),
            inner.model_id(),
            self.len()
        );
        self.invalidate();
        std::mem::replace(&mut self.inner, inner)
    }
}

impl<E: Encoder> Encoder for CachedEncoder<E> {
    fn dim(&self) -> usize {
        self.inner.dim()
    }

    fn model_id(&self) -> &str {
        self.inner.model_id()
    }

    fn encode_batch(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>, EncoderError> {
        let Some(cache) = self.cache.as_mut() else {
            self.stats.misses += texts.len() as u64;
            return self.inner.encode_batch(texts);
        };

        let mut out: Vec<Option<Vec<f32>>> = Vec::with_capacity(texts.len());
        let mut missing: Vec<String> = Vec::new();
        let mut missing_slots: Vec<usize> = Vec::new();
        for (slot, text) in texts.iter().enumerate() {
            match cache.get(text) {
                Some(vector) => {
                    self.stats.hits += 1;
                    out.push(Some(vector.clone()));
                }
                None => {
                    self.stats.misses += 1;
                    out.push(None);
                    missing.push(text.clone());
                    missing_slots.push(slot);
                }
            }
        }

        if !missing.is_empty() {
            let fresh = self.inner.encode_batch(&missing)?;
            if fresh.len() != missing.len() {
                return Err(EncoderError::BatchMismatch {
                    expected: missing.len(),
                    actual: fresh.len(),
                });
            }
            let dim = self.inner.dim();
            for ((slot, text), vector) in missing_slots.into_iter().zip(missing).zip(fresh) {
                check_dim(dim, &vector)?;
                cache.put(text, vector.clone());
                out[slot] = Some(vector);
            }
        }

        Ok(out.into_iter().flatten().collect())
    }

    fn encode(&mut self, text: &str) -> Result<Vec<f32>, EncoderError> {
        if let Some(vector) = self.cache.as_mut().and_then(|c| c.get(text).cloned()) {
            self.stats.hits += 1;
            return Ok(vector);
        }
        self.stats.misses += 1;

        let vector = self.inner.encode(text)?;
        check_dim(self.inner.dim(), &vector)?;
        if let Some(cache) = self.cache.as_mut() {
            cache.put(text.to_string(), vector.clone());
        }
        Ok(vector)
    }
}
