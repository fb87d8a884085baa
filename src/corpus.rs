//! TSV corpus reader and the offline index build
//!
//! Each corpus line is `<id>\t<text>`; the text may itself contain tabs.
//! Documents whose id or text is blank are dropped.

use std::io::{self, BufRead};

use anyhow::{Context, Result};
use thiserror::Error;

use flatshard_core::DocumentWriter;
use flatshard_encoder::Encoder;

use crate::builder::{BuildSummary, IndexBuilder};
use crate::config::{IndexConfig, IndexLayout};

#[derive(Error, Debug)]
pub enum CorpusError {
    #[error("Line {line}: expected \"<id>\\t<text>\", got \"{content}\"")]
    MissingSeparator { line: usize, content: String },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDocument {
    pub id: String,
    pub text: String,
}

pub struct TsvCorpus<R> {
    lines: io::Lines<R>,
    line: usize,
}

impl<R: BufRead> TsvCorpus<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line: 0,
        }
    }
}

impl<R: BufRead> Iterator for TsvCorpus<R> {
    type Item = Result<ParsedDocument, CorpusError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e.into())),
            };
            self.line += 1;

            let Some((id, text)) = line.split_once('\t') else {
                return Some(Err(CorpusError::MissingSeparator {
                    line: self.line,
                    content: line,
                }));
            };
            let text = text.strip_suffix('\r').unwrap_or(text);
            if id.trim().is_empty() || text.trim().is_empty() {
                continue;
            }
            return Some(Ok(ParsedDocument {
                id: id.to_string(),
                text: text.to_string(),
            }));
        }
    }
}

/// Build shards and the document store for a whole corpus
///
/// Vectors and records are appended in lockstep so ordinals agree across
/// the shards, `docs.txt` and `refs.txt`.
pub fn index_corpus<R, E>(corpus: TsvCorpus<R>, layout: &IndexLayout, config: IndexConfig, encoder: E) -> Result<BuildSummary>
where
    R: BufRead,
    E: Encoder,
{
    let mut builder = IndexBuilder::new(config, encoder)?;
    let mut writer = DocumentWriter::create(&layout.docs, &layout.refs)?;

    for document in corpus {
        let document = document?;
        if writer.append(&document.id, &document.text)?.is_none() {
            continue;
        }
        if let Some(report) = builder.push(document.text.trim())? {
            if let Some(sealed) = report.sealed {
                tracing::info!(
                    "Shard {} sealed with {} vectors ({} documents so far)",
                    sealed.sequence,
                    sealed.count,
                    writer.len()
                );
            }
        }
    }

    let (_, summary) = builder.finish()?;
    let records = writer.finish().context("finishing document store")?;
    if records != summary.total_vectors {
        anyhow::bail!(
            "Document store holds {} records but {} vectors were indexed",
            records,
            summary.total_vectors
        );
    }
    Ok(summary)
}
