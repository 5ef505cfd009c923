// src/pipeline.rs
//
// Per-query driver: segment -> strip of consideration -> harmonize
// (-> re-seed). The pack and FM-index are shared read-only; everything else
// is created per query and discarded with it.

use crate::error::{MapError, Result};
use crate::fm_index::FmIndex;
use crate::harmonization::Harmonizer;
use crate::index::RefIndex;
use crate::map_opt::MapOpt;
use crate::pack::Pack;
use crate::reseed;
use crate::seed::Chain;
use crate::seeding;
use crate::soc;
use crate::utils::{encode, realtime};
use rayon::prelude::*;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::thread;

/// One query sequence, as produced by an external FASTA/FASTQ reader.
/// `seq` holds 2-bit codes (4 = N); `qual` may be empty.
#[derive(Debug, Clone)]
pub struct Query {
    pub id: u64,
    pub name: String,
    pub seq: Vec<u8>,
    pub qual: Vec<u8>,
}

impl Query {
    pub fn from_ascii(id: u64, name: &str, ascii: &[u8]) -> Query {
        Query {
            id,
            name: name.to_string(),
            seq: encode(ascii),
            qual: Vec::new(),
        }
    }
}

/// Telemetry counters for one query.
#[derive(Debug, Clone, Default)]
pub struct QueryStats {
    pub n_segments: usize,
    pub n_seeds: u64,
    pub n_dropped_ambiguous: u64,
    pub n_strips: usize,
    pub n_chains: usize,
    pub wall_secs: f64,
}

#[derive(Debug)]
pub struct MapResult {
    pub chains: Vec<Chain>,
    pub stats: QueryStats,
}

pub struct Aligner {
    pub pack: Arc<Pack>,
    pub fm: Arc<FmIndex>,
    pub opt: MapOpt,
}

impl Aligner {
    pub fn new(index: &RefIndex, opt: MapOpt) -> Result<Aligner> {
        opt.validate()?;
        if index.fm.ref_len() != index.pack.len_total() {
            return Err(MapError::CorruptIndex(format!(
                "FM-index covers {} bases but the pack holds {}",
                index.fm.ref_len(),
                index.pack.len_total()
            )));
        }
        Ok(Aligner {
            pack: Arc::clone(&index.pack),
            fm: Arc::clone(&index.fm),
            opt,
        })
    }

    /// Maps one query to its harmonized chains.
    pub fn map_query(&self, query: &Query) -> Result<MapResult> {
        self.map_query_with_cancel(query, &Arc::new(AtomicBool::new(false)))
    }

    /// Like `map_query`, honoring a query-scoped cancellation flag polled at
    /// task boundaries.
    pub fn map_query_with_cancel(
        &self,
        query: &Query,
        cancel: &Arc<AtomicBool>,
    ) -> Result<MapResult> {
        let t0 = realtime();
        let mut stats = QueryStats::default();
        let qlen = query.seq.len();

        let seq = Arc::new(query.seq.clone());
        let segments = seeding::segment(&seq, &self.fm, &self.opt, cancel)?;
        stats.n_segments = segments.len();

        let mut queue = soc::build_strips(&segments, &self.fm, &self.pack, qlen, &self.opt)?;
        stats.n_seeds = queue.n_seeds;
        stats.n_dropped_ambiguous = queue.n_dropped_ambiguous;
        stats.n_strips = queue.len();

        let harmonizer = Harmonizer::new(&self.opt, qlen, self.pack.len_forward());
        let mut chains = harmonizer.harmonize_queue(&mut queue)?;

        if self.opt.do_reseed {
            for chain in &mut chains {
                reseed::refine_chain(chain, &query.seq, &self.pack, &self.opt);
            }
        }
        stats.n_chains = chains.len();
        stats.wall_secs = realtime() - t0;
        log::debug!(
            "query {} ({}): {} segments, {} seeds, {} strips, {} chains in {:.3} s",
            query.id,
            query.name,
            stats.n_segments,
            stats.n_seeds,
            stats.n_strips,
            stats.n_chains,
            stats.wall_secs
        );
        Ok(MapResult { chains, stats })
    }

    /// Maps a batch of queries in parallel. Results keep the input order;
    /// a failing query never affects its neighbors.
    pub fn map_queries(&self, queries: &[Query]) -> Vec<Result<MapResult>> {
        queries.par_iter().map(|q| self.map_query(q)).collect()
    }

    /// Streams queries through a bounded channel to `n_workers` mapping
    /// threads; suits inputs too large to buffer. Results are returned
    /// sorted by query id.
    pub fn map_queries_streamed<I>(&self, queries: I, n_workers: usize) -> Vec<(u64, Result<MapResult>)>
    where
        I: IntoIterator<Item = Query>,
    {
        let n_workers = n_workers.max(1);
        let (tx, rx) = crossbeam_channel::bounded::<Query>(n_workers * 2);
        let results: Mutex<Vec<(u64, Result<MapResult>)>> = Mutex::new(Vec::new());

        thread::scope(|scope| {
            for _ in 0..n_workers {
                let rx = rx.clone();
                let results = &results;
                scope.spawn(move || {
                    for query in rx.iter() {
                        let r = self.map_query(&query);
                        results.lock().unwrap().push((query.id, r));
                    }
                });
            }
            drop(rx);
            for query in queries {
                if tx.send(query).is_err() {
                    break;
                }
            }
            drop(tx);
        });

        let mut results = results.into_inner().unwrap();
        results.sort_by_key(|(id, _)| *id);
        results
    }
}
