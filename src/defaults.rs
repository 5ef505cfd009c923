// src/defaults.rs

// Seeding constants
pub const MIN_SEED_LEN: u32 = 16;
pub const MAX_AMBIGUITY: u32 = 500;
pub const MIN_INTERVAL_SIZE: u32 = 1;

// Strip-of-consideration scoring (strip size = (MATCH * qlen - GAP) / EXTEND)
pub const MATCH_SCORE: u32 = 8;
pub const GAP_COST: u32 = 16;
pub const EXTEND_COST: u32 = 1;

// Harmonization constants
pub const MAX_DELTA_DIST: f64 = 0.1;
pub const MIN_DELTA_DIST: u32 = 16;
pub const MAX_DELTA_IN_CLUSTER: u32 = 200;
pub const MIN_SOC_TRIES: u32 = 1;
pub const MAX_SOC_TRIES: u32 = 30;
pub const SCORE_TOLERANCE: f64 = 0.1;
pub const SCORE_DIFF_TOLERANCE: f64 = 0.0001;
pub const MAX_EQUAL_SCORE_LOOKAHEAD: u32 = 3;
pub const SV_PENALTY: u32 = 100;
pub const RANSAC_ITERATIONS: u32 = 128;

// Re-seeding
pub const RESEED_KMER_LEN: u32 = 9;

// Index layout
pub const SA_SAMPLE_INTERVAL: u32 = 32;
pub const OCC_INTERVAL: u64 = 128;
