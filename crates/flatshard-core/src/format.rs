//! Shard file format
//!
//! # File Structure
//!
//! ```text
//! Offset   Size    Type        Description
//! ─────────────────────────────────────────────
//! 0x00     8       [u8; 8]     Magic: "FLSHRD01"
//! 0x08     4       u32 LE      N: Number of vectors
//! 0x0C     4       u32 LE      D: Dimensions
//! 0x10     4       u32 LE      Similarity code
//! 0x14     12      [u8; 12]    Reserved (zero)
//! 0x20     N*D*4   [f32]       Vector data (Little Endian)
//! ```
//!
//! The 32-byte header keeps the vector slab aligned for 256-bit loads when
//! the file is memory-mapped.

use std::fs::File;
use std::io::{self, BufWriter, Seek, Write};
use std::path::Path;

use thiserror::Error;

use crate::metric::Similarity;

/// Magic bytes identifying a shard file
pub const MAGIC: [u8; 8] = *b"FLSHRD01";

/// Header size in bytes
pub const HEADER_SIZE: usize = 32;

#[derive(Error, Debug)]
pub enum FormatError {
    #[error("Invalid magic bytes: expected FLSHRD01")]
    InvalidMagic,

    #[error("Unknown similarity code in shard header: {0}")]
    UnknownSimilarity(u32),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Shard is full: {count} vectors")]
    CountOverflow { count: u32 },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Parsed shard header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardHeader {
    pub count: u32,
    pub dimensions: u32,
    pub similarity: Similarity,
}

impl ShardHeader {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FormatError> {
        if bytes.len() < HEADER_SIZE {
            return Err(FormatError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("File too small for header: {} < {}", bytes.len(), HEADER_SIZE),
            )));
        }

        if bytes[0..8] != MAGIC {
            return Err(FormatError::InvalidMagic);
        }

        let count = read_u32(&bytes[8..12]);
        let dimensions = read_u32(&bytes[12..16]);
        let code = read_u32(&bytes[16..20]);
        let similarity = Similarity::from_code(code).ok_or(FormatError::UnknownSimilarity(code))?;

        Ok(Self {
            count,
            dimensions,
            similarity,
        })
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..8].copy_from_slice(&MAGIC);
        buf[8..12].copy_from_slice(&self.count.to_le_bytes());
        buf[12..16].copy_from_slice(&self.dimensions.to_le_bytes());
        buf[16..20].copy_from_slice(&self.similarity.code().to_le_bytes());
        buf
    }

    /// Total file size, `None` if it does not fit in `usize`
    pub fn file_size(&self) -> Option<usize> {
        (self.count as usize)
            .checked_mul(self.dimensions as usize)?
            .checked_mul(std::mem::size_of::<f32>())?
            .checked_add(HEADER_SIZE)
    }
}

#[inline]
fn read_u32(bytes: &[u8]) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&bytes[..4]);
    u32::from_le_bytes(word)
}

/// Streaming writer for shard files
///
/// The header count is written as zero first and patched in `finish()`, so
/// a file from an interrupted write is recognisable by its short count.
pub struct ShardWriter {
    writer: BufWriter<File>,
    dimensions: usize,
    similarity: Similarity,
    count: u32,
}

impl ShardWriter {
    pub fn create<P: AsRef<Path>>(
        path: P,
        dimensions: usize,
        similarity: Similarity,
    ) -> Result<Self, FormatError> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        let header = ShardHeader {
            count: 0,
            dimensions: dimensions as u32,
            similarity,
        };
        writer.write_all(&header.to_bytes())?;

        Ok(Self {
            writer,
            dimensions,
            similarity,
            count: 0,
        })
    }

    pub fn write_vector(&mut self, vector: &[f32]) -> Result<(), FormatError> {
        if vector.len() != self.dimensions {
            return Err(FormatError::DimensionMismatch {
                expected: self.dimensions,
                actual: vector.len(),
            });
        }
        if self.count == u32::MAX {
            return Err(FormatError::CountOverflow { count: self.count });
        }

        for &val in vector {
            self.writer.write_all(&val.to_le_bytes())?;
        }
        self.count += 1;
        Ok(())
    }

    /// Flush, patch the header count, and sync to disk
    pub fn finish(mut self) -> Result<u32, FormatError> {
        self.writer.flush()?;

        let header = ShardHeader {
            count: self.count,
            dimensions: self.dimensions as u32,
            similarity: self.similarity,
        };
        let file = self.writer.get_mut();
        file.seek(io::SeekFrom::Start(0))?;
        file.write_all(&header.to_bytes())?;
        file.sync_all()?;

        Ok(self.count)
    }
}
