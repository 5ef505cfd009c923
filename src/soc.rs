// src/soc.rs
//
// Strip of consideration: project every usable seed onto its bucketing
// coordinate (the reference diagonal shifted by the query offset), sort,
// then slide a window of the strip width over the sorted coordinates and
// record score maxima. Dense diagonals — where many seed projections
// coincide — surface as high-scoring strips.

use crate::error::Result;
use crate::fm_index::FmIndex;
use crate::map_opt::MapOpt;
use crate::pack::Pack;
use crate::seed::{Seed, SegmentVector};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Seeds whose bucketing coordinates fall within one strip-size window.
#[derive(Debug, Clone)]
pub struct Strip {
    pub diagonal_start: u64,
    pub score: u64,
    pub seeds: Vec<Seed>,
}

impl PartialEq for Strip {
    fn eq(&self, other: &Self) -> bool {
        self.score == other.score && self.diagonal_start == other.diagonal_start
    }
}
impl Eq for Strip {}
impl PartialOrd for Strip {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Strip {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap by score; diagonal breaks ties deterministically.
        self.score
            .cmp(&other.score)
            .then_with(|| other.diagonal_start.cmp(&self.diagonal_start))
    }
}

/// Strips in decreasing score order, plus extraction counters for telemetry.
#[derive(Debug, Default)]
pub struct SocQueue {
    heap: BinaryHeap<Strip>,
    pub n_seeds: u64,
    pub n_dropped_ambiguous: u64,
}

impl SocQueue {
    /// Wraps pre-built strips; mainly for tests and diagnostic tooling.
    pub fn from_strips(strips: Vec<Strip>) -> SocQueue {
        let n_seeds = strips.iter().map(|s| s.seeds.len() as u64).sum();
        SocQueue {
            heap: strips.into_iter().collect(),
            n_seeds,
            n_dropped_ambiguous: 0,
        }
    }

    pub fn pop(&mut self) -> Option<Strip> {
        self.heap.pop()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }
}

/// Builds the prioritized strips for one query.
pub fn build_strips(
    segments: &SegmentVector,
    fm: &FmIndex,
    pack: &Pack,
    query_len: usize,
    opt: &MapOpt,
) -> Result<SocQueue> {
    let mut queue = SocQueue::default();
    if query_len == 0 || segments.is_empty() {
        return Ok(queue);
    }
    let len_forward = pack.len_forward();
    let qlen = query_len as u64;

    // Locate every usable seed, skipping matches that bridge a contig
    // boundary or the strand midpoint, or that lie on recorded N runs.
    let mut keyed: Vec<(u64, Seed)> = Vec::new();
    segments.for_each_seed(
        fm,
        opt.min_seed_len,
        opt.max_ambiguity,
        Some(&mut queue.n_dropped_ambiguous),
        |pos, seg| {
            if pack.bridges(pos, pos + seg.len) || pack.overlaps_ambiguous(pos, pos + seg.len) {
                return;
            }
            let seed = Seed::from_hit(pos, seg.q_start, seg.len, len_forward);
            keyed.push((seed.bucket_pos(qlen, len_forward), seed));
        },
    );
    if keyed.is_empty() {
        return Ok(queue);
    }

    sort_by_bucket(&mut keyed);
    // Exact duplicates (same match reached through different segments) would
    // inflate window scores.
    keyed.dedup_by(|a, b| a.1 == b.1);
    queue.n_seeds = keyed.len() as u64;

    let strip_size = opt.strip_size(query_len).max(1);
    let min_score = (opt.min_accumulated_length * query_len as f64) as u64;

    // Prefix sums of seed lengths for O(1) window scores.
    let mut prefix = Vec::with_capacity(keyed.len() + 1);
    prefix.push(0u64);
    for (_, s) in &keyed {
        prefix.push(prefix.last().unwrap() + s.len);
    }

    // Sliding window: record local maxima; of two overlapping maxima only
    // the higher-scoring one survives.
    let mut maxima: Vec<(u64, usize, usize)> = Vec::new(); // (score, begin, end)
    let mut window_end = 0usize;
    for begin in 0..keyed.len() {
        let d = keyed[begin].0;
        if window_end < begin {
            window_end = begin;
        }
        while window_end < keyed.len() && keyed[window_end].0 < d + strip_size {
            window_end += 1;
        }
        let score = prefix[window_end] - prefix[begin];
        let count = (window_end - begin) as u32;
        if count <= opt.min_seeds && score <= min_score {
            continue;
        }
        match maxima.last_mut() {
            Some(last) if keyed[last.1].0 + strip_size > d => {
                if score > last.0 {
                    *last = (score, begin, window_end);
                }
            }
            _ => maxima.push((score, begin, window_end)),
        }
    }

    for (score, begin, end) in maxima {
        queue.heap.push(Strip {
            diagonal_start: keyed[begin].0,
            score,
            seeds: keyed[begin..end].iter().map(|(_, s)| *s).collect(),
        });
    }
    Ok(queue)
}

/// Sorts seeds by bucketing coordinate. Radix sort pays off once
/// n log2(n) exceeds 2 * 34 * n / log2(n) — 34 bits expressing any index on
/// any genome — otherwise comparison sort wins. Either way, runs of equal
/// coordinates end up in a canonical order so duplicates are adjacent.
fn sort_by_bucket(keyed: &mut Vec<(u64, Seed)>) {
    let n = keyed.len();
    let lg = (n.max(2) as f64).log2();
    if lg * lg > 2.0 * 34.0 {
        radix_sort(keyed);
        let mut i = 0;
        while i < keyed.len() {
            let mut j = i + 1;
            while j < keyed.len() && keyed[j].0 == keyed[i].0 {
                j += 1;
            }
            keyed[i..j]
                .sort_unstable_by_key(|(_, s)| (s.q_start, s.len, s.ref_start, s.on_forward));
            i = j;
        }
    } else {
        keyed.sort_unstable_by_key(|(d, s)| (*d, s.q_start, s.len, s.ref_start, s.on_forward));
    }
}

/// LSD radix sort over the 40 low bits of the bucketing coordinate, one
/// byte per pass, distributing into buckets like the comparison-free path
/// of the paper's implementation.
fn radix_sort(keyed: &mut Vec<(u64, Seed)>) {
    for pass in 0..5 {
        let shift = pass * 8;
        let mut buckets: Vec<Vec<(u64, Seed)>> = (0..256).map(|_| Vec::new()).collect();
        for item in keyed.drain(..) {
            buckets[((item.0 >> shift) & 0xff) as usize].push(item);
        }
        for bucket in &mut buckets {
            keyed.append(bucket);
        }
    }
}
