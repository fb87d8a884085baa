//! Worker loops driven by a host process over stdin/stdout/stderr
//!
//! Both loops are generic over their streams so tests can run them on
//! in-memory buffers.

use std::io::{BufRead, Write};

use anyhow::{Context, Result};

use flatshard_encoder::Encoder;

use crate::builder::{BuildSummary, IndexBuilder};
use crate::engine::SearchEngine;
use crate::protocol::{self, Request, RequestError};

/// Feed every input line to the builder until end of input
///
/// Any failure is fatal: it is returned to the caller, which reports it on
/// the sync channel. Shards already written stay on disk.
pub fn run_build_worker<E, R, W, S>(
    mut builder: IndexBuilder<E>,
    input: R,
    out: &mut W,
    sync: &mut S,
) -> Result<BuildSummary>
where
    E: Encoder,
    R: BufRead,
    W: Write,
    S: Write,
{
    protocol::signal_ok(sync)?;

    for line in input.lines() {
        let line = line.context("reading document text")?;
        let line = line.strip_suffix('\r').unwrap_or(&line);

        if let Some(report) = builder.push(line)? {
            protocol::signal_ok(sync)?;
            protocol::write_timings(out, &report)?;
        }
    }

    let (report, summary) = builder.finish()?;
    protocol::signal_ok(sync)?;
    protocol::write_timings(out, &report)?;
    Ok(summary)
}

/// Answer search requests until end of input or a non-positive K
///
/// A malformed request, or a failure while answering it, is reported on the
/// sync channel and the loop moves on to the next line. Only I/O failures
/// on the streams themselves end the loop with an error. Returns the number
/// of requests answered.
pub fn run_search_worker<E, R, W, S>(
    engine: &mut SearchEngine<E>,
    input: &mut R,
    out: &mut W,
    sync: &mut S,
) -> Result<usize>
where
    E: Encoder,
    R: BufRead,
    W: Write,
    S: Write,
{
    protocol::signal_ok(sync)?;

    let mut served = 0;
    loop {
        let request = match protocol::read_request(input) {
            Ok(Request::Shutdown) => break,
            Ok(Request::Search(request)) => request,
            Err(RequestError::Io(e)) => return Err(e).context("reading request"),
            Err(e) => {
                tracing::warn!("Rejected request: {}", e);
                protocol::signal_error(sync, &anyhow::Error::from(e))?;
                continue;
            }
        };

        match engine.search(&request) {
            Ok(hits) => {
                protocol::write_response(out, &hits)?;
                protocol::signal_ok(sync)?;
                served += 1;
            }
            Err(e) => {
                tracing::warn!("Request failed: {:#}", e);
                protocol::signal_error(sync, &e)?;
            }
        }
    }

    let cache = engine.cache_stats();
    tracing::info!(
        "Search worker stopping after {} request(s), query cache {} hits / {} misses",
        served,
        cache.hits,
        cache.misses
    );
    Ok(served)
}
