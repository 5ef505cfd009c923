// src/seed.rs
//
// Per-query value types flowing through the pipeline: segments (query
// intervals with their SA-intervals), seeds (located exact matches) and
// chains (harmonized colinear seed sets).

use crate::fm_index::{FmIndex, SaInterval};
use crate::pack::Pack;

/// An exact match between query and reference.
///
/// `ref_start` is always expressed on the forward strand; `on_forward`
/// disambiguates. For strip bucketing and harmonization the seed is
/// re-projected into the doubled [0, 2 * len_forward) space via `soc_pos`,
/// where matches from one alignment share a (nearly) constant diagonal on
/// either strand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Seed {
    pub q_start: u64,
    pub len: u64,
    pub ref_start: u64,
    pub on_forward: bool,
}

impl Seed {
    /// Builds a seed from a located hit in the doubled reference space.
    pub fn from_hit(pos: u64, q_start: u64, len: u64, len_forward: u64) -> Seed {
        if pos < len_forward {
            Seed {
                q_start,
                len,
                ref_start: pos,
                on_forward: true,
            }
        } else {
            Seed {
                q_start,
                len,
                // Mirror the whole match range back to the forward strand.
                ref_start: (len_forward << 1) - pos - len,
                on_forward: false,
            }
        }
    }

    #[inline]
    pub fn q_end(&self) -> u64 {
        self.q_start + self.len
    }

    #[inline]
    pub fn ref_end(&self) -> u64 {
        self.ref_start + self.len
    }

    /// Start of the match in the doubled reference space.
    #[inline]
    pub fn soc_pos(&self, len_forward: u64) -> u64 {
        if self.on_forward {
            self.ref_start
        } else {
            (len_forward << 1) - self.ref_start - self.len
        }
    }

    #[inline]
    pub fn soc_end(&self, len_forward: u64) -> u64 {
        self.soc_pos(len_forward) + self.len
    }

    /// The bucketing coordinate: seeds of one alignment fall into a strip of
    /// nearby values.
    #[inline]
    pub fn bucket_pos(&self, query_len: u64, len_forward: u64) -> u64 {
        self.soc_pos(len_forward) + (query_len - self.q_start)
    }

    /// Diagonal offset in the doubled space; constant along a gapless
    /// alignment.
    #[inline]
    pub fn delta(&self, len_forward: u64) -> i64 {
        self.soc_pos(len_forward) as i64 - self.q_start as i64
    }

    /// True iff every matched base agrees with the reference (complemented
    /// on the reverse strand). Verification only.
    pub fn matches_reference(&self, query: &[u8], pack: &Pack) -> bool {
        let spos = self.soc_pos(pack.len_forward());
        (0..self.len).all(|i| {
            let q = query[(self.q_start + i) as usize];
            q < 4 && pack.nuc(spos + i) == q
        })
    }
}

/// A query interval together with the SA-interval of its maximal exact
/// match.
#[derive(Debug, Clone, Copy)]
pub struct Segment {
    pub q_start: u64,
    pub len: u64,
    pub interval: SaInterval,
}

impl Segment {
    #[inline]
    pub fn q_end(&self) -> u64 {
        self.q_start + self.len
    }
}

/// The segmenter's output. Insertion order under concurrency is not
/// deterministic, so the vector is sorted when assembled; clients may treat
/// it as a set.
#[derive(Debug, Default)]
pub struct SegmentVector {
    segments: Vec<Segment>,
}

impl SegmentVector {
    pub fn from_sorted(mut segments: Vec<Segment>) -> SegmentVector {
        segments.sort_by_key(|s| (s.q_start, s.len));
        SegmentVector { segments }
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Segment> {
        self.segments.iter()
    }

    /// Enumerates one located seed per suffix-array entry of every segment
    /// that passes the length and ambiguity gates. Intervals larger than
    /// `max_ambiguity` are dropped whole; this bounds enumeration memory.
    pub fn for_each_seed<F: FnMut(u64, &Segment)>(
        &self,
        fm: &FmIndex,
        min_seed_len: u32,
        max_ambiguity: u32,
        mut dropped: Option<&mut u64>,
        mut f: F,
    ) {
        for seg in &self.segments {
            if seg.len < min_seed_len as u64 || seg.interval.is_empty() {
                continue;
            }
            if seg.interval.size > max_ambiguity as u64 {
                if let Some(d) = dropped.as_mut() {
                    **d += 1;
                }
                continue;
            }
            for row in seg.interval.start..seg.interval.end() {
                f(fm.sa_to_pos(row), seg);
            }
        }
    }
}

/// A harmonized sequence of colinear seeds on one strand: non-decreasing in
/// both query and reference, no overlaps.
#[derive(Debug, Clone, Default)]
pub struct Chain {
    pub seeds: Vec<Seed>,
}

impl Chain {
    /// Accumulated seed length.
    pub fn score(&self) -> u64 {
        self.seeds.iter().map(|s| s.len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.seeds.is_empty()
    }

    pub fn on_forward(&self) -> Option<bool> {
        self.seeds.first().map(|s| s.on_forward)
    }

    /// Query range covered, as (start, end).
    pub fn query_span(&self) -> Option<(u64, u64)> {
        let first = self.seeds.first()?;
        let last = self.seeds.last()?;
        Some((first.q_start, last.q_end()))
    }
}
