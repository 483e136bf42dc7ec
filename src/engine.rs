//! Parallel scheduling of parse-and-fold work.
//!
//! Every worker owns its [`PartialStore`] for the whole run; stores only meet
//! in the merge step, after the workers that produced them are done. Any
//! malformed record fails the whole run.

use std::io::{self, BufRead};
use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use crossbeam_channel::{Receiver, Sender};
use rayon::prelude::*;
use tracing::{debug, trace, warn};

use crate::chunk::{lines, split_chunks};
use crate::config::{Accumulation, EngineConfig};
use crate::error::{Error, Location, Result};
use crate::record::{parse_record, parse_record_bytes};
use crate::store::{merge_stores, Accumulator, BatchedStore, PartialStore, Summary};

pub struct Engine {
    config: EngineConfig,
    pool: rayon::ThreadPool,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.workers.max(1))
            .thread_name(|i| format!("brc-worker-{i}"))
            .build()?;
        Ok(Self { config, pool })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Aggregates newline-separated records held in memory. Chunks are
    /// folded on the engine's pool and merged pairwise as they complete.
    #[tracing::instrument(skip_all, fields(len = input.len()))]
    pub fn aggregate_bytes(&self, input: &[u8]) -> Result<Summary> {
        let ranges = split_chunks(input, self.config.chunk_target(input.len()));
        debug!(
            chunks = ranges.len(),
            workers = self.config.workers,
            "aggregating byte slice"
        );

        let accumulation = self.config.accumulation;
        let merged = self.pool.install(|| {
            ranges
                .into_par_iter()
                .map(|range| fold_range(input, range, accumulation))
                .try_reduce(PartialStore::new, |mut left, right| {
                    left.absorb(right);
                    Ok(left)
                })
        });

        match merged {
            Ok(merged) => {
                debug!(keys = merged.len(), "merged worker stores");
                Ok(Summary::from(merged))
            }
            Err(e) => {
                warn!(error = %e, "aggregation aborted");
                Err(e)
            }
        }
    }

    /// Aggregates an in-order sequence of lines.
    pub fn aggregate_lines<I, L>(&self, lines: I) -> Result<Summary>
    where
        I: IntoIterator<Item = L>,
        L: Into<String>,
    {
        self.aggregate_stream(lines.into_iter().map(|line| Ok(line.into())))
    }

    /// Aggregates every line of `reader`. Read failures abort the run.
    pub fn aggregate_reader<R: BufRead>(&self, reader: R) -> Result<Summary> {
        self.aggregate_stream(reader.lines())
    }

    /// The calling thread batches lines into chunks and feeds them through
    /// a bounded channel to `workers` scoped threads.
    ///
    /// The channel hands chunks out in input order and a worker folds every
    /// chunk it takes, so all chunks before a failing one are still parsed.
    /// The error reported is the earliest in the input.
    #[tracing::instrument(skip_all)]
    fn aggregate_stream<I>(&self, lines: I) -> Result<Summary>
    where
        I: Iterator<Item = io::Result<String>>,
    {
        let workers = self.config.workers.max(1);
        let chunk_lines = self.config.chunk_lines.max(1);
        let accumulation = self.config.accumulation;
        let abort = AtomicBool::new(false);
        debug!(workers, chunk_lines, "aggregating line stream");

        thread::scope(|s| {
            let (tx, rx) = crossbeam_channel::bounded::<LineChunk>(workers * 2);
            let mut handles = Vec::with_capacity(workers);
            let mut failure = None;

            for id in 0..workers {
                let rx = rx.clone();
                let abort = &abort;
                let spawned = thread::Builder::new()
                    .name(format!("brc-stream-{id}"))
                    .spawn_scoped(s, move || drain(rx, abort, accumulation));
                match spawned {
                    Ok(handle) => handles.push(handle),
                    Err(e) => {
                        failure = Some(Error::Spawn(e));
                        break;
                    }
                }
            }
            drop(rx);

            if failure.is_some() {
                abort.store(true, Ordering::Release);
                drop(tx);
            } else if let Err(e) = feed(tx, lines, chunk_lines, &abort) {
                abort.store(true, Ordering::Release);
                failure = Some(e);
            }

            let mut stores = Vec::with_capacity(handles.len());
            for handle in handles {
                match handle.join() {
                    Ok(Ok(store)) => stores.push(store),
                    Ok(Err(e)) => Error::keep_earliest(&mut failure, e),
                    Err(_) => Error::keep_earliest(&mut failure, Error::WorkerPanicked),
                }
            }

            if let Some(e) = failure {
                warn!(error = %e, "aggregation aborted");
                return Err(e);
            }
            let summary = merge_stores(stores);
            debug!(keys = summary.len(), "merged worker stores");
            Ok(summary)
        })
    }
}

fn fold_range(
    input: &[u8],
    range: Range<usize>,
    accumulation: Accumulation,
) -> Result<PartialStore> {
    let offset = range.start;
    let chunk = &input[range];
    trace!(offset, len = chunk.len(), "folding chunk");
    match accumulation {
        Accumulation::Scalar => fold_bytes(PartialStore::new(), chunk, offset),
        Accumulation::Batched { capacity } => {
            fold_bytes(BatchedStore::new(capacity), chunk, offset)
        }
    }
}

fn fold_bytes<A: Accumulator>(mut acc: A, chunk: &[u8], offset: usize) -> Result<PartialStore> {
    for (line_start, line) in lines(chunk) {
        let record = parse_record_bytes(line)
            .map_err(|e| Error::malformed(Location::Offset(offset + line_start), e))?;
        acc.observe(record.key, record.value);
    }
    Ok(acc.finish())
}

/// Consecutive lines; `first_line` is the 0-based index of the first one.
struct LineChunk {
    first_line: u64,
    lines: Vec<String>,
}

impl LineChunk {
    fn starting_at(first_line: u64, capacity: usize) -> Self {
        Self {
            first_line,
            lines: Vec::with_capacity(capacity),
        }
    }

    fn fold_into<A: Accumulator>(&self, acc: &mut A) -> Result<()> {
        for (n, line) in (self.first_line..).zip(&self.lines) {
            let record =
                parse_record(line).map_err(|e| Error::malformed(Location::Line(n + 1), e))?;
            acc.observe(record.key, record.value);
        }
        Ok(())
    }
}

fn feed<I>(
    chunks: Sender<LineChunk>,
    lines: I,
    chunk_lines: usize,
    abort: &AtomicBool,
) -> Result<()>
where
    I: Iterator<Item = io::Result<String>>,
{
    let mut chunk = LineChunk::starting_at(0, chunk_lines);
    for line in lines {
        if abort.load(Ordering::Acquire) {
            return Ok(());
        }
        chunk.lines.push(line?);
        if chunk.lines.len() == chunk_lines {
            let next = LineChunk::starting_at(chunk.first_line + chunk_lines as u64, chunk_lines);
            // a closed channel means every worker has stopped
            if chunks.send(std::mem::replace(&mut chunk, next)).is_err() {
                return Ok(());
            }
        }
    }
    if !chunk.lines.is_empty() {
        chunks.send(chunk).ok();
    }
    Ok(())
}

fn drain(
    chunks: Receiver<LineChunk>,
    abort: &AtomicBool,
    accumulation: Accumulation,
) -> Result<PartialStore> {
    match accumulation {
        Accumulation::Scalar => drain_into(PartialStore::new(), chunks, abort),
        Accumulation::Batched { capacity } => {
            drain_into(BatchedStore::new(capacity), chunks, abort)
        }
    }
}

fn drain_into<A: Accumulator>(
    mut acc: A,
    chunks: Receiver<LineChunk>,
    abort: &AtomicBool,
) -> Result<PartialStore> {
    // check before taking a chunk: a chunk once taken is always folded
    while !abort.load(Ordering::Acquire) {
        let Ok(chunk) = chunks.recv() else {
            break;
        };
        trace!(first_line = chunk.first_line + 1, lines = chunk.lines.len(), "folding chunk");
        if let Err(e) = chunk.fold_into(&mut acc) {
            abort.store(true, Ordering::Release);
            return Err(e);
        }
    }
    Ok(acc.finish())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::Reason;

    const INPUT: &str = "Hamburg;12.0\nBulawayo;8.9\nPalembang;38.8\nHamburg;-3.4\n\
        St. John's;15.2\nCracow;12.6\nBridgetown;26.9\nIstanbul;6.2\nRoseau;34.4\n\
        Conakry;31.2\nIstanbul;23.0\nHamburg;0.1\nBulawayo;-0.9\nCracow;-12.6\n";

    const EXPECTED: &str = "{Bridgetown=26.9/26.9/26.9, Bulawayo=-0.9/4.0/8.9, \
        Conakry=31.2/31.2/31.2, Cracow=-12.6/0.0/12.6, Hamburg=-3.4/2.9/12.0, \
        Istanbul=6.2/14.6/23.0, Palembang=38.8/38.8/38.8, Roseau=34.4/34.4/34.4, \
        St. John's=15.2/15.2/15.2}";

    fn engine(workers: usize, batch: usize) -> Engine {
        let config = EngineConfig::default()
            .with_workers(workers)
            .with_chunk_bytes(7)
            .with_chunk_lines(2)
            .with_batch_capacity(batch);
        Engine::new(config).unwrap()
    }

    #[test]
    fn small_inputs_render_expected_summaries() {
        let engine = engine(2, 0);
        for (input, expected) in [
            ("X;5.0", "{X=5.0/5.0/5.0}"),
            ("X;1.0\nX;2.0\nX;3.0", "{X=1.0/2.0/3.0}"),
            ("b;1.0\na;2.0", "{a=2.0/2.0/2.0, b=1.0/1.0/1.0}"),
            ("m;2.0\nm;2.5", "{m=2.0/2.2/2.5}"),
            ("", "{}"),
        ] {
            let from_bytes = engine.aggregate_bytes(input.as_bytes()).unwrap();
            assert_eq!(from_bytes.to_string(), expected, "bytes: `{input}`");
            let from_lines = engine.aggregate_lines(input.lines()).unwrap();
            assert_eq!(from_lines.to_string(), expected, "lines: `{input}`");
        }
    }

    #[test]
    fn parsed_ties_round_half_to_even() {
        for batch in [0, 4] {
            let engine = engine(2, batch);
            for (input, expected, count) in [
                ("X;2.35", "{X=2.4/2.4/2.4}", 1),
                ("X;2.35\nX;2.35", "{X=2.4/2.4/2.4}", 2),
                ("X;0.05", "{X=0.0/0.0/0.0}", 1),
                ("X;-2.35", "{X=-2.4/-2.4/-2.4}", 1),
                ("X;2.25\nX;2.25\nX;2.25", "{X=2.2/2.2/2.2}", 3),
            ] {
                let from_bytes = engine.aggregate_bytes(input.as_bytes()).unwrap();
                assert_eq!(from_bytes.to_string(), expected, "bytes: `{input}` batch={batch}");
                assert_eq!(from_bytes.get("X").map(|a| a.count()), Some(count));
                let from_lines = engine.aggregate_lines(input.lines()).unwrap();
                assert_eq!(from_lines.to_string(), expected, "lines: `{input}` batch={batch}");
            }
        }
    }

    #[test]
    fn config_is_kept_as_given() {
        let engine = engine(3, 5);
        assert_eq!(engine.config().workers, 3);
        assert_eq!(engine.config().chunk_lines, 2);
        assert_eq!(engine.config().accumulation, Accumulation::Batched { capacity: 5 });
    }

    #[test]
    fn every_configuration_agrees() {
        for workers in [1, 2, 3, 8] {
            for batch in [0, 1, 3, 64] {
                let engine = engine(workers, batch);
                let bytes = engine.aggregate_bytes(INPUT.as_bytes()).unwrap();
                assert_eq!(bytes.to_string(), EXPECTED, "workers={workers} batch={batch}");
                let lines = engine.aggregate_reader(INPUT.as_bytes()).unwrap();
                assert_eq!(lines.to_string(), EXPECTED, "workers={workers} batch={batch}");
            }
        }
    }

    #[test]
    fn malformed_byte_input_fails_fast() {
        let engine = engine(3, 0);
        for (input, offset, reason) in [
            ("a;1.0\nbroken\nb;2.0\n", 6, Reason::MissingDelimiter),
            ("a;1.0\nb;oops\n", 6, Reason::InvalidValue),
            ("a;1.0\n\nb;2.0\n", 6, Reason::MissingDelimiter),
            (";1.0\n", 0, Reason::EmptyKey),
        ] {
            match engine.aggregate_bytes(input.as_bytes()) {
                Err(Error::MalformedRecord { location, source }) => {
                    assert_eq!(location, Location::Offset(offset), "input `{input}`");
                    assert_eq!(source.reason(), reason, "input `{input}`");
                }
                other => panic!("expected malformed record for `{input}`, got {other:?}"),
            }
        }
    }

    #[test]
    fn malformed_stream_reports_earliest_line() {
        let mut lines: Vec<String> = (0..500).map(|i| format!("k{};{}.5", i % 7, i % 40)).collect();
        lines[137] = "no delimiter here".to_string();
        lines[400] = "k1;not a number".to_string();
        for workers in [1, 2, 4] {
            match engine(workers, 8).aggregate_lines(lines.clone()) {
                Err(e) => assert_eq!(e.location(), Some(Location::Line(138)), "workers={workers}"),
                Ok(summary) => panic!("expected failure, got {summary}"),
            }
        }
    }

    #[test]
    fn read_errors_abort_the_run() {
        let engine = engine(2, 0);
        let lines = vec![
            Ok("a;1.0".to_string()),
            Err(io::Error::other("disk on fire")),
            Ok("b;2.0".to_string()),
        ];
        let err = engine.aggregate_stream(lines.into_iter()).unwrap_err();
        assert!(matches!(err, Error::Io(_)), "got {err:?}");
    }
}
