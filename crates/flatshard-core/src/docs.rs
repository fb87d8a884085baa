//! Document text store
//!
//! Two parallel files, both in ordinal order:
//!
//! ```text
//! docs.txt   <id>\t<text>\n  per document
//! refs.txt   <byte offset of that line>\n  per document
//! ```
//!
//! The reader memory-maps `docs.txt` and keeps the offsets in memory, so
//! resolving an ordinal is one slice plus a scan to the next newline.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use thiserror::Error;

const TRIM: &[char] = &[' ', '\t', '\r', '\n'];

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("IO error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Offsets file line {line}: \"{value}\" is not a byte offset")]
    InvalidOffset { line: usize, value: String },

    #[error("Ordinal out of bounds: {ordinal} >= {count}")]
    OrdinalOutOfBounds { ordinal: usize, count: usize },

    #[error("Document {ordinal}: offset {offset} is past the end of the docs file ({len} bytes)")]
    OffsetPastEnd { ordinal: usize, offset: u64, len: usize },

    #[error("Document {ordinal}: record has no tab separating id and text")]
    MissingSeparator { ordinal: usize },

    #[error("Document {ordinal}: record is not valid UTF-8")]
    InvalidUtf8 { ordinal: usize },
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> DocumentError + '_ {
    move |source| DocumentError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// A resolved record, borrowed from the mapped docs file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Document<'a> {
    pub id: &'a str,
    pub text: &'a str,
}

/// Random-access reader over `docs.txt` + `refs.txt`
pub struct DocumentStore {
    // None for an empty docs file, which cannot be mapped
    mmap: Option<Mmap>,
    offsets: Vec<u64>,
}

impl DocumentStore {
    pub fn open<P: AsRef<Path>, Q: AsRef<Path>>(docs_path: P, offsets_path: Q) -> Result<Self, DocumentError> {
        let docs_path = docs_path.as_ref();
        let offsets_path = offsets_path.as_ref();

        let offsets_raw = std::fs::read_to_string(offsets_path).map_err(io_err(offsets_path))?;
        let offsets = parse_offsets(&offsets_raw)?;

        let file = File::open(docs_path).map_err(io_err(docs_path))?;
        let len = file.metadata().map_err(io_err(docs_path))?.len();
        let mmap = if len == 0 {
            None
        } else {
            Some(unsafe { Mmap::map(&file) }.map_err(io_err(docs_path))?)
        };

        tracing::info!(
            "Opened document store {:?}: {} records, {} bytes",
            docs_path,
            offsets.len(),
            len
        );
        Ok(Self { mmap, offsets })
    }

    fn bytes(&self) -> &[u8] {
        self.mmap.as_deref().unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    pub fn resolve(&self, ordinal: usize) -> Result<Document<'_>, DocumentError> {
        let offset = *self.offsets.get(ordinal).ok_or(DocumentError::OrdinalOutOfBounds {
            ordinal,
            count: self.offsets.len(),
        })?;

        let bytes = self.bytes();
        let start = usize::try_from(offset)
            .ok()
            .filter(|&start| start < bytes.len())
            .ok_or(DocumentError::OffsetPastEnd {
                ordinal,
                offset,
                len: bytes.len(),
            })?;

        let rest = &bytes[start..];
        let line = match rest.iter().position(|&b| b == b'\n') {
            Some(end) => &rest[..end],
            None => rest,
        };
        let line = std::str::from_utf8(line)
            .map_err(|_| DocumentError::InvalidUtf8 { ordinal })?
            .trim_matches(TRIM);

        let (id, text) = line
            .split_once('\t')
            .ok_or(DocumentError::MissingSeparator { ordinal })?;
        Ok(Document { id, text })
    }
}

fn parse_offsets(raw: &str) -> Result<Vec<u64>, DocumentError> {
    raw.lines()
        .enumerate()
        .map(|(i, line)| (i, line.trim_matches(TRIM)))
        .filter(|(_, line)| !line.is_empty())
        .map(|(i, line)| {
            line.parse::<u64>().map_err(|_| DocumentError::InvalidOffset {
                line: i + 1,
                value: line.to_string(),
            })
        })
        .collect()
}

/// Appends records to `docs.txt` and their byte offsets to `refs.txt`
pub struct DocumentWriter {
    docs: BufWriter<File>,
    offsets: BufWriter<File>,
    docs_path: PathBuf,
    offsets_path: PathBuf,
    next_offset: u64,
    count: usize,
}

impl DocumentWriter {
    pub fn create<P: AsRef<Path>, Q: AsRef<Path>>(docs_path: P, offsets_path: Q) -> Result<Self, DocumentError> {
        let docs_path = docs_path.as_ref().to_path_buf();
        let offsets_path = offsets_path.as_ref().to_path_buf();

        let docs = File::create(&docs_path).map_err(io_err(&docs_path))?;
        let offsets = File::create(&offsets_path).map_err(io_err(&offsets_path))?;

        Ok(Self {
            docs: BufWriter::new(docs),
            offsets: BufWriter::new(offsets),
            docs_path,
            offsets_path,
            next_offset: 0,
            count: 0,
        })
    }

    /// Append one record, returning its ordinal
    ///
    /// Blank ids or texts are skipped (`None`). Tabs and line breaks inside
    /// either field become spaces so each record stays on one line.
    pub fn append(&mut self, id: &str, text: &str) -> Result<Option<usize>, DocumentError> {
        let id = single_line(id);
        let text = single_line(text);
        if id.is_empty() || text.is_empty() {
            return Ok(None);
        }

        let line = format!("{}\t{}\n", id, text);
        self.docs.write_all(line.as_bytes()).map_err(io_err(&self.docs_path))?;
        writeln!(self.offsets, "{}", self.next_offset).map_err(io_err(&self.offsets_path))?;

        self.next_offset += line.len() as u64;
        let ordinal = self.count;
        self.count += 1;
        Ok(Some(ordinal))
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Flush and sync both files, returning the record count
    pub fn finish(mut self) -> Result<usize, DocumentError> {
        self.docs.flush().map_err(io_err(&self.docs_path))?;
        self.offsets.flush().map_err(io_err(&self.offsets_path))?;
        self.docs.get_ref().sync_all().map_err(io_err(&self.docs_path))?;
        self.offsets.get_ref().sync_all().map_err(io_err(&self.offsets_path))?;
        Ok(self.count)
    }
}

fn single_line(s: &str) -> String {
    s.replace(['\t', '\r', '\n'], " ").trim_matches(TRIM).to_string()
}
