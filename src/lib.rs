//! Seeding and harmonization core of a short/long-read aligner.
//!
//! Maps a query nucleotide sequence against a reference genome to an
//! optimal set of colinear seeds suitable for downstream gap filling:
//! an FM-index over the forward + reverse-complement reference supports
//! bidirectional SA-interval extension, a concurrent recursive segmenter
//! computes maximal exact matches, the strip of consideration buckets seed
//! projections by diagonal, and the harmonizer filters each strip down to
//! consistent chains.

pub mod bwt;
pub mod defaults;
pub mod error;
pub mod filters; // seed-set filters (duplicates, length, SMEM, max-spanning)
pub mod fm_index; // FM-index operations (backward/forward extension, SA lookup)
pub mod harmonization; // linesweep + RANSAC seed filtering
pub mod index; // index management (build/dump/restore by prefix)
pub mod map_opt;
pub mod pack; // 2-bit packed reference collection
pub mod pipeline;
pub mod reseed; // optional k-mer gap re-seeding
pub mod seed;
pub mod seeding; // recursive segmentation into MEMs
pub mod soc; // strip of consideration
pub mod thread_pool;
pub mod utils;

pub use error::{MapError, Result};
pub use fm_index::{FmIndex, SaInterval};
pub use index::RefIndex;
pub use map_opt::MapOpt;
pub use pack::Pack;
pub use pipeline::{Aligner, MapResult, Query, QueryStats};
pub use seed::{Chain, Seed, Segment, SegmentVector};
pub use thread_pool::WorkPool;

// Note: suffix-array construction comes from the `bio` crate; no hand-rolled
// SAIS implementation is kept here.
