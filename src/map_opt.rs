// src/map_opt.rs
//
// Parameter bundle for the seeding and harmonization pipeline. External
// collaborators (CLI, config files) fill this struct; the core itself never
// reads the environment.

use crate::defaults;
use crate::error::{MapError, Result};

/// Tuning parameters for segmentation, strip-of-consideration bucketing and
/// harmonization.
#[derive(Debug, Clone)]
pub struct MapOpt {
    // Seeding parameters
    /// Drop SA-intervals with more occurrences than this.
    pub max_ambiguity: u32,
    /// Minimum segment length to project into the strip of consideration.
    pub min_seed_len: u32,
    /// Stop recursing on query intervals shorter than this.
    pub min_interval_size: u32,
    /// Stop extension at ambiguous bases.
    pub break_on_n: bool,

    // Strip-of-consideration parameters.
    // The strip size is (match_score * qlen - gap_cost) / extend_cost.
    pub match_score: u32,
    pub gap_cost: u32,
    pub extend_cost: u32,
    /// A window only counts as a strip maximum with more seeds than this.
    pub min_seeds: u32,
    /// ... or with accumulated seed length above this fraction of the query.
    pub min_accumulated_length: f64,

    // Harmonization parameters
    /// Relative (to query length) delta-distance cutoff.
    pub max_delta_dist: f64,
    /// Absolute floor for the delta-distance cutoff.
    pub min_delta_dist: u32,
    /// Split clusters where consecutive seeds' delta differs by more.
    pub max_delta_in_cluster: u32,
    /// Extract at least this many strips before the tolerance break applies.
    pub min_soc_tries: u32,
    /// Never extract more strips than this.
    pub max_soc_tries: u32,
    /// Stop when the harmonized score drops this far below the best strip.
    pub score_tolerance: f64,
    /// Two scores within this fraction of the best count as equal.
    pub score_diff_tolerance: f64,
    /// Stop after this many equal-scoring strips in a row.
    pub max_equal_score_lookahead: u32,
    pub use_ransac: bool,
    /// RANSAC pair samples per strip.
    pub ransac_iterations: u32,
    /// Gap cost estimated optimistically (as small as possible).
    pub optimistic_gap_cost: bool,
    /// Penalty applied when suppressing structural-variant-sized gaps.
    /// Tuned empirically; treated as configuration rather than a constant.
    pub sv_penalty: u32,

    // Re-seeding parameters
    /// Run the k-mer gap re-seeding pass on harmonized chains.
    pub do_reseed: bool,
    pub reseed_kmer_len: u32,

    // Processing parameters
    /// Workers in the segmenter's work pool.
    pub num_threads: u32,
    /// Suffix-array sampling interval; must be a power of two.
    pub sa_sample_interval: u32,
}

impl Default for MapOpt {
    fn default() -> Self {
        MapOpt {
            max_ambiguity: defaults::MAX_AMBIGUITY,
            min_seed_len: defaults::MIN_SEED_LEN,
            min_interval_size: defaults::MIN_INTERVAL_SIZE,
            break_on_n: true,

            match_score: defaults::MATCH_SCORE,
            gap_cost: defaults::GAP_COST,
            extend_cost: defaults::EXTEND_COST,
            min_seeds: 0,
            min_accumulated_length: 0.0,

            max_delta_dist: defaults::MAX_DELTA_DIST,
            min_delta_dist: defaults::MIN_DELTA_DIST,
            max_delta_in_cluster: defaults::MAX_DELTA_IN_CLUSTER,
            min_soc_tries: defaults::MIN_SOC_TRIES,
            max_soc_tries: defaults::MAX_SOC_TRIES,
            score_tolerance: defaults::SCORE_TOLERANCE,
            score_diff_tolerance: defaults::SCORE_DIFF_TOLERANCE,
            max_equal_score_lookahead: defaults::MAX_EQUAL_SCORE_LOOKAHEAD,
            use_ransac: true,
            ransac_iterations: defaults::RANSAC_ITERATIONS,
            optimistic_gap_cost: true,
            sv_penalty: defaults::SV_PENALTY,

            do_reseed: false,
            reseed_kmer_len: defaults::RESEED_KMER_LEN,

            num_threads: 1,
            sa_sample_interval: defaults::SA_SAMPLE_INTERVAL,
        }
    }
}

impl MapOpt {
    /// Width of the strip of consideration for a query of the given length.
    /// This is the formula from the paper: large enough that all seeds of
    /// one optimal alignment land in one strip.
    pub fn strip_size(&self, query_len: usize) -> u64 {
        let gain = self.match_score as u64 * query_len as u64;
        gain.saturating_sub(self.gap_cost as u64) / self.extend_cost.max(1) as u64
    }

    /// Delta-distance cutoff for a query of the given length: relative bound
    /// with an absolute floor.
    pub fn delta_cutoff(&self, query_len: usize) -> f64 {
        (self.max_delta_dist * query_len as f64).max(self.min_delta_dist as f64)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.sa_sample_interval.is_power_of_two() {
            return Err(MapError::invariant(
                "map_opt",
                format!(
                    "sa_sample_interval must be a power of two, got {}",
                    self.sa_sample_interval
                ),
            ));
        }
        if self.extend_cost == 0 {
            return Err(MapError::invariant("map_opt", "extend_cost must be > 0"));
        }
        if self.min_soc_tries > self.max_soc_tries {
            return Err(MapError::invariant(
                "map_opt",
                format!(
                    "min_soc_tries {} exceeds max_soc_tries {}",
                    self.min_soc_tries, self.max_soc_tries
                ),
            ));
        }
        if self.do_reseed && self.reseed_kmer_len == 0 {
            return Err(MapError::invariant("map_opt", "reseed_kmer_len must be > 0"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let opt = MapOpt::default();
        assert_eq!(opt.max_ambiguity, 500, "Max ambiguity should be 500");
        assert_eq!(opt.min_seed_len, 16, "Min seed length should be 16");
        assert_eq!(opt.min_interval_size, 1);
        assert!(opt.break_on_n);
        assert_eq!(opt.match_score, 8);
        assert_eq!(opt.gap_cost, 16);
        assert_eq!(opt.extend_cost, 1);
        assert_eq!(opt.min_delta_dist, 16);
        assert_eq!(opt.sa_sample_interval, 32);
        assert!(opt.use_ransac);
        assert!(!opt.do_reseed);
        assert!(opt.validate().is_ok());
    }

    #[test]
    fn test_strip_size_formula() {
        let opt = MapOpt::default();
        // (8 * 100 - 16) / 1
        assert_eq!(opt.strip_size(100), 784);
        // Tiny queries saturate instead of underflowing.
        assert_eq!(opt.strip_size(0), 0);
        assert_eq!(opt.strip_size(1), 0);
    }

    #[test]
    fn test_delta_cutoff_floor() {
        let opt = MapOpt::default();
        // 0.1 * 50 = 5 is below the absolute floor of 16.
        assert_eq!(opt.delta_cutoff(50), 16.0);
        assert_eq!(opt.delta_cutoff(1000), 100.0);
    }

    #[test]
    fn test_validate_rejects_bad_sa_interval() {
        let opt = MapOpt {
            sa_sample_interval: 33,
            ..MapOpt::default()
        };
        assert!(opt.validate().is_err());
    }
}
