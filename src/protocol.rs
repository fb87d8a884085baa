//! Line protocol spoken with the host process
//!
//! Search request (stdin):
//!
//! ```text
//! Q                 number of queries
//! <text>  <weight>  Q pairs, one value per line
//! K                 results wanted; K < 1 ends the session
//! ```
//!
//! Search response (stdout): `R`, then `id`, `score`, `ordinal`, `text` for
//! each of the R hits. Build workers answer each batch with two timings in
//! seconds (encoding, then indexing).
//!
//! Stderr is the sync channel: a single blank line means the last step
//! succeeded, anything else is an error trace.

use std::io::{self, BufRead, Write};

use thiserror::Error;

use crate::builder::BatchReport;
use crate::engine::{QueryText, SearchHit, SearchRequest};

#[derive(Error, Debug)]
pub enum RequestError {
    #[error("Invalid query count \"{0}\"")]
    QueryCount(String),

    #[error("Invalid weight \"{value}\" for query {index}")]
    Weight { index: usize, value: String },

    #[error("Invalid result count \"{0}\"")]
    ResultCount(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Search(SearchRequest),
    /// End of input, or a non-positive K
    Shutdown,
}

/// Read one line without its terminator, `None` at end of input
fn next_line<R: BufRead>(reader: &mut R) -> io::Result<Option<String>> {
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    if line.ends_with('\n') {
        line.pop();
        if line.ends_with('\r') {
            line.pop();
        }
    }
    Ok(Some(line))
}

/// Read one search request
///
/// Running out of input anywhere inside a request is a shutdown, not an
/// error. Once the query count is known the whole request is consumed,
/// even when a weight is malformed, so the next read starts at the next
/// request. A malformed query count fails after that single line.
pub fn read_request<R: BufRead>(reader: &mut R) -> Result<Request, RequestError> {
    let Some(line) = next_line(reader)? else {
        return Ok(Request::Shutdown);
    };
    let count: usize = line
        .trim()
        .parse()
        .map_err(|_| RequestError::QueryCount(line.clone()))?;

    let mut queries = Vec::with_capacity(count.min(64));
    let mut bad_weight = None;
    for index in 0..count {
        let Some(text) = next_line(reader)? else {
            return Ok(Request::Shutdown);
        };
        let Some(weight) = next_line(reader)? else {
            return Ok(Request::Shutdown);
        };
        match weight.trim().parse::<f32>().ok().filter(|w| w.is_finite()) {
            Some(weight) => queries.push(QueryText { text, weight }),
            None if bad_weight.is_none() => bad_weight = Some(RequestError::Weight { index, value: weight }),
            None => {}
        }
    }

    let Some(line) = next_line(reader)? else {
        return Ok(Request::Shutdown);
    };
    let k: Option<i64> = line.trim().parse().ok();
    if matches!(k, Some(k) if k < 1) {
        return Ok(Request::Shutdown);
    }
    if let Some(err) = bad_weight {
        return Err(err);
    }
    let k = k.ok_or(RequestError::ResultCount(line))?;

    Ok(Request::Search(SearchRequest {
        queries,
        k: k as usize,
    }))
}

pub fn write_response<W: Write>(out: &mut W, hits: &[SearchHit]) -> io::Result<()> {
    writeln!(out, "{}", hits.len())?;
    for hit in hits {
        writeln!(out, "{}", hit.id)?;
        writeln!(out, "{}", hit.score)?;
        writeln!(out, "{}", hit.ordinal)?;
        writeln!(out, "{}", hit.text)?;
    }
    out.flush()
}

pub fn write_timings<W: Write>(out: &mut W, report: &BatchReport) -> io::Result<()> {
    writeln!(out, "{}", report.extraction.as_secs_f64())?;
    writeln!(out, "{}", report.indexing.as_secs_f64())?;
    out.flush()
}

/// One blank line: the last step succeeded
pub fn signal_ok<W: Write>(sync: &mut W) -> io::Result<()> {
    writeln!(sync)?;
    sync.flush()
}

/// Full error chain with blank lines removed
///
/// A blank line on the sync channel means success, so a trace must never
/// contain one.
pub fn sync_trace(err: &anyhow::Error) -> String {
    format!("{:?}", err)
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Full error chain, never blank
pub fn signal_error<W: Write>(sync: &mut W, err: &anyhow::Error) -> io::Result<()> {
    writeln!(sync, "Error: {}", sync_trace(err))?;
    sync.flush()
}
