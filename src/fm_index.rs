// src/fm_index.rs
//
// FM-index over the concatenated forward + reverse-complement reference.
// Because that text is its own reverse complement, a single index answers
// both strands, and every SA-interval carries the matching interval of the
// pattern's reverse complement alongside its own. That second bound is what
// makes bidirectional (backward *and* forward) extension possible without a
// second index.

use crate::bwt::Bwt;
use crate::error::{MapError, Result};
use crate::pack::Pack;
use crate::utils::{BinaryRead, BinaryWrite};
use std::io::{Read, Write};

pub const FM_MAGIC: [u8; 4] = *b"SSFM";
pub const FM_VERSION: u32 = 1;

/// A suffix-array interval: `start` is the first row matching the current
/// pattern P, `start_rc` the first row matching the reverse complement of P,
/// and `size` the occurrence count (equal for both by symmetry of the text).
///
/// Rows are 1-based against the conceptual BWT matrix (row 0 is the
/// sentinel), stored closed on the left and open on the right.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaInterval {
    pub start: u64,
    pub start_rc: u64,
    pub size: u64,
}

impl SaInterval {
    pub const EMPTY: SaInterval = SaInterval {
        start: 0,
        start_rc: 0,
        size: 0,
    };

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    #[inline]
    pub fn end(&self) -> u64 {
        self.start + self.size
    }

    /// The interval of the reverse-complement pattern: swap the two bounds.
    #[inline]
    pub fn rev_comp(&self) -> SaInterval {
        SaInterval {
            start: self.start_rc,
            start_rc: self.start,
            size: self.size,
        }
    }
}

#[derive(Debug)]
pub struct FmIndex {
    pub bwt: Bwt,
}

impl FmIndex {
    /// Builds the index over a pack's forward + reverse-complement text.
    pub fn build(pack: &Pack, sa_intv: u32) -> Result<FmIndex> {
        let codes = pack.unpack_with_reverse_complement();
        let bwt = Bwt::build(&codes, sa_intv)?;
        Ok(FmIndex { bwt })
    }

    /// Length of the indexed text: forward plus reverse complement.
    pub fn ref_len(&self) -> u64 {
        self.bwt.seq_len
    }

    /// SA-interval of a single character.
    pub fn init_interval(&self, c: u8) -> SaInterval {
        if c >= 4 {
            return SaInterval::EMPTY;
        }
        let l2 = &self.bwt.l2;
        SaInterval {
            start: l2[c as usize] + 1,
            start_rc: l2[(c ^ 3) as usize] + 1,
            size: l2[c as usize + 1] - l2[c as usize],
        }
    }

    /// Extends the pattern of `ik` by one character on the left.
    ///
    /// Never fails: no match yields the empty interval. The occurrence
    /// counter treats intervals as (a, b], so both endpoints are decremented
    /// before the call.
    pub fn extend_backward(&self, ik: SaInterval, c: u8) -> SaInterval {
        if c >= 4 || ik.is_empty() {
            return SaInterval::EMPTY;
        }
        let bwt = &self.bwt;
        let (cntk, cntl) = bwt.two_occ4(ik.start as i64 - 1, ik.end() as i64 - 1);

        let mut cnts = [0u64; 4];
        for i in 0..4 {
            cnts[i] = cntl[i] - cntk[i];
        }

        // The sentinel is represented indirectly: when its row lies inside
        // the interval the counts miss one entry and the complement-side
        // start shifts by one.
        let mut acc = ik.start_rc;
        if ik.start <= bwt.primary && ik.end() > bwt.primary {
            acc += 1;
        }
        // Complement-side starts accumulate in reverse-complement order.
        let mut cntk_rc = [0u64; 4];
        cntk_rc[0] = acc;
        for i in 1..4 {
            cntk_rc[i] = cntk_rc[i - 1] + cnts[(i - 1) ^ 3];
        }

        let size = cnts[c as usize];
        if size == 0 {
            return SaInterval::EMPTY;
        }
        SaInterval {
            start: bwt.l2[c as usize] + cntk[c as usize] + 1,
            start_rc: cntk_rc[(c ^ 3) as usize],
            size,
        }
    }

    /// Extends the pattern of `ik` by one character on the right: swap to
    /// the reverse-complement interval, extend backward with the complement,
    /// swap back.
    #[inline]
    pub fn extend_forward(&self, ik: SaInterval, c: u8) -> SaInterval {
        if c >= 4 || ik.is_empty() {
            return SaInterval::EMPTY;
        }
        self.extend_backward(ik.rev_comp(), c ^ 3).rev_comp()
    }

    /// Full backward search of a pattern. Empty patterns and patterns with
    /// ambiguous bases yield the empty interval.
    pub fn get_interval(&self, pattern: &[u8]) -> SaInterval {
        let Some((&last, rest)) = pattern.split_last() else {
            return SaInterval::EMPTY;
        };
        let mut ik = self.init_interval(last);
        for &c in rest.iter().rev() {
            if ik.is_empty() {
                break;
            }
            ik = self.extend_backward(ik, c);
        }
        ik
    }

    /// Reference position for a suffix-array row, unsampled via BWT
    /// inversion.
    #[inline]
    pub fn sa_to_pos(&self, row: u64) -> u64 {
        self.bwt.sa_value(row)
    }

    /// Occurrence count of a pattern: the ambiguity of a prospective seed.
    pub fn get_ambiguity(&self, pattern: &[u8]) -> u64 {
        self.get_interval(pattern).size
    }

    /// Probes deterministic reference windows and verifies that search and
    /// SA lookup agree with the pack. Used after index construction and by
    /// the persistence tests.
    pub fn self_check(&self, pack: &Pack, n_probes: u32) -> bool {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};
        const PROBE_LEN: u64 = 10;
        if pack.len_total() < PROBE_LEN {
            return true;
        }
        let mut rng = StdRng::seed_from_u64(0x0f1d_c4ec);
        for _ in 0..n_probes {
            let pos = rng.gen_range(0..=pack.len_total() - PROBE_LEN);
            let end = pos + PROBE_LEN;
            if pack.bridges(pos, end) || pack.overlaps_ambiguous(pos, end) {
                continue;
            }
            let Ok(probe) = pack.extract(pos, end) else {
                return false;
            };
            let ik = self.get_interval(&probe);
            if ik.is_empty() {
                return false;
            }
            let mut found = false;
            for row in ik.start..ik.end() {
                let hit = self.sa_to_pos(row);
                if hit == pos {
                    found = true;
                    continue;
                }
                let hit_end = hit + PROBE_LEN;
                if hit_end > pack.len_total() {
                    return false;
                }
                // Hits across junctions or N placeholders cannot be
                // re-extracted for comparison; everything else must match.
                if !pack.bridges(hit, hit_end)
                    && !pack.overlaps_ambiguous(hit, hit_end)
                    && pack.extract(hit, hit_end).map(|s| s != probe).unwrap_or(true)
                {
                    return false;
                }
            }
            if !found {
                return false;
            }
        }
        true
    }

    pub fn dump<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_all(&FM_MAGIC)?;
        w.write_u32_le(FM_VERSION)?;
        w.write_u64_le(self.bwt.primary)?;
        w.write_u64_array_le(&self.bwt.l2)?;
        w.write_u32_le(self.bwt.sa_intv)?;
        w.write_u64_le(self.bwt.seq_len)?;
        w.write_u64_le(self.bwt.n_sa())?;
        self.bwt.dump_payload(w)?;
        Ok(())
    }

    pub fn load<R: Read>(r: &mut R) -> Result<FmIndex> {
        let mut magic = [0u8; 4];
        r.read_exact(&mut magic)?;
        if magic != FM_MAGIC {
            return Err(MapError::CorruptIndex(format!(
                "FM-index magic mismatch: {magic:02x?}"
            )));
        }
        let version = r.read_u32_le()?;
        if version != FM_VERSION {
            return Err(MapError::CorruptIndex(format!(
                "unsupported FM-index version {version}"
            )));
        }
        let primary = r.read_u64_le()?;
        let mut l2 = [0u64; 5];
        for slot in l2.iter_mut() {
            *slot = r.read_u64_le()?;
        }
        let sa_intv = r.read_u32_le()?;
        let seq_len = r.read_u64_le()?;
        let sa_len = r.read_u64_le()?;
        let bwt = Bwt::load_payload(r, primary, l2, seq_len, sa_intv, sa_len)?;
        Ok(FmIndex { bwt })
    }
}
