// src/pack.rs
//
// 2-bit packed reference collection ("pack"): forward strand stored packed,
// reverse-complement half materialized logically so the FM-index can handle
// both strands uniformly. Positions live in [0, 2 * len_forward).

use crate::error::{MapError, Result};
use crate::utils::{BinaryRead, BinaryWrite, NST_NT4_TABLE};
use std::io::{Read, Write};

pub const PACK_MAGIC: [u8; 4] = *b"SSPK";
pub const PACK_VERSION: u32 = 1;

#[derive(Debug, Clone)]
pub struct Contig {
    pub name: String,
    pub offset: u64,
    pub length: u64,
}

/// A run of ambiguous bases (N) on the forward strand. The packed payload
/// stores a placeholder base for these positions; `nuc` reports them as N.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AmbRun {
    pub offset: u64,
    pub length: u64,
}

#[derive(Debug, Default)]
pub struct Pack {
    /// Forward strand, 4 bases per byte, most significant bits first.
    seq: Vec<u8>,
    len_forward: u64,
    contigs: Vec<Contig>,
    ambs: Vec<AmbRun>,
}

impl Pack {
    pub fn new() -> Self {
        Pack::default()
    }

    /// Length of the forward strand.
    pub fn len_forward(&self) -> u64 {
        self.len_forward
    }

    /// Length of the logical space: forward plus reverse complement.
    pub fn len_total(&self) -> u64 {
        self.len_forward << 1
    }

    pub fn contigs(&self) -> &[Contig] {
        &self.contigs
    }

    pub fn ambiguous_runs(&self) -> &[AmbRun] {
        &self.ambs
    }

    /// Appends one contig from ASCII nucleotides. Build-time only; the pack
    /// is immutable once the FM-index has been constructed over it.
    pub fn append_contig(&mut self, name: &str, ascii: &[u8]) {
        let offset = self.len_forward;
        for &b in ascii {
            let code = NST_NT4_TABLE[b as usize];
            if code < 4 {
                self.push_base(code);
            } else {
                let pos = self.len_forward;
                match self.ambs.last_mut() {
                    Some(run) if run.offset + run.length == pos => run.length += 1,
                    _ => self.ambs.push(AmbRun {
                        offset: pos,
                        length: 1,
                    }),
                }
                // Position-derived placeholder keeps the payload dense and
                // stops exact matches from extending across N runs; nuc()
                // masks it either way.
                self.push_base((crate::utils::hash_64(pos) & 3) as u8);
            }
        }
        self.contigs.push(Contig {
            name: name.to_string(),
            offset,
            length: self.len_forward - offset,
        });
    }

    fn push_base(&mut self, code: u8) {
        let pos = self.len_forward;
        let byte_idx = (pos >> 2) as usize;
        if self.seq.len() <= byte_idx {
            self.seq.push(0);
        }
        self.seq[byte_idx] |= code << ((!pos & 3) << 1);
        self.len_forward += 1;
    }

    /// Raw packed base on the forward strand, ignoring ambiguity runs.
    #[inline]
    fn packed_nuc(&self, pos: u64) -> u8 {
        let byte_idx = (pos >> 2) as usize;
        let shift = ((!pos & 3) << 1) as u32;
        (self.seq[byte_idx] >> shift) & 3
    }

    fn is_ambiguous(&self, pos_f: u64) -> bool {
        let i = self.ambs.partition_point(|r| r.offset + r.length <= pos_f);
        i < self.ambs.len() && self.ambs[i].offset <= pos_f
    }

    /// Nucleotide code at a position in the [0, 2 * len_forward) logical
    /// space. On the reverse half, returns the complement of the mirrored
    /// forward position. Ambiguous positions return 4 on either half.
    pub fn nuc(&self, pos: u64) -> u8 {
        debug_assert!(pos < self.len_total());
        if pos < self.len_forward {
            if self.is_ambiguous(pos) {
                4
            } else {
                self.packed_nuc(pos)
            }
        } else {
            let mirrored = self.len_total() - 1 - pos;
            if self.is_ambiguous(mirrored) {
                4
            } else {
                3 - self.packed_nuc(mirrored)
            }
        }
    }

    /// Index of the contig containing the forward position, by binary search.
    pub fn contig_of(&self, pos_f: u64) -> Option<usize> {
        if pos_f >= self.len_forward || self.contigs.is_empty() {
            return None;
        }
        let i = self.contigs.partition_point(|c| c.offset <= pos_f);
        Some(i - 1)
    }

    /// True iff [start, end) crosses a contig boundary or the
    /// forward/reverse midpoint. Out-of-range intervals count as bridging:
    /// such ranges must never produce seeds.
    pub fn bridges(&self, start: u64, end: u64) -> bool {
        if start >= end {
            return false;
        }
        if end > self.len_total() {
            return true;
        }
        let mid = self.len_forward;
        if start < mid && end > mid {
            return true;
        }
        let (fa, fb) = if start >= mid {
            (self.len_total() - end, self.len_total() - start)
        } else {
            (start, end)
        };
        self.contig_of(fa) != self.contig_of(fb - 1)
    }

    /// True iff [start, end) (logical space) overlaps a run of ambiguous
    /// bases. Seeds over such ranges never match the query exactly.
    pub fn overlaps_ambiguous(&self, start: u64, end: u64) -> bool {
        if start >= end || self.ambs.is_empty() {
            return false;
        }
        let mid = self.len_forward;
        let (fa, fb) = if start >= mid {
            (self.len_total() - end, self.len_total() - start)
        } else {
            (start, end.min(mid))
        };
        let i = self.ambs.partition_point(|r| r.offset + r.length <= fa);
        i < self.ambs.len() && self.ambs[i].offset < fb
    }

    /// Extracts the nucleotide sequence of [start, end). Used only for
    /// verification and for re-seeding windows; bridging ranges are a
    /// programmer error.
    pub fn extract(&self, start: u64, end: u64) -> Result<Vec<u8>> {
        if self.bridges(start, end) {
            return Err(MapError::invariant(
                "pack",
                format!("extract over bridging range [{start}, {end})"),
            ));
        }
        Ok((start..end).map(|p| self.nuc(p)).collect())
    }

    /// Unpacks forward plus reverse-complement codes for FM-index
    /// construction. Ambiguous positions keep their placeholder bases; the
    /// strip of consideration filters any seed that touches a recorded run.
    pub fn unpack_with_reverse_complement(&self) -> Vec<u8> {
        let l = self.len_forward;
        let mut out = Vec::with_capacity((l << 1) as usize);
        for pos in 0..l {
            out.push(self.packed_nuc(pos));
        }
        for pos in (0..l).rev() {
            out.push(3 - self.packed_nuc(pos));
        }
        out
    }

    pub fn dump<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_all(&PACK_MAGIC)?;
        w.write_u32_le(PACK_VERSION)?;
        w.write_u64_le(self.len_forward)?;
        w.write_u32_le(self.contigs.len() as u32)?;
        for c in &self.contigs {
            w.write_u64_le(c.offset)?;
            w.write_u64_le(c.length)?;
            w.write_u32_le(c.name.len() as u32)?;
            w.write_all(c.name.as_bytes())?;
        }
        w.write_u32_le(self.ambs.len() as u32)?;
        for r in &self.ambs {
            w.write_u64_le(r.offset)?;
            w.write_u64_le(r.length)?;
        }
        w.write_all(&self.seq)?;
        Ok(())
    }

    pub fn load<R: Read>(r: &mut R) -> Result<Self> {
        let mut magic = [0u8; 4];
        r.read_exact(&mut magic)?;
        if magic != PACK_MAGIC {
            return Err(MapError::CorruptIndex(format!(
                "pack magic mismatch: {magic:02x?}"
            )));
        }
        let version = r.read_u32_le()?;
        if version != PACK_VERSION {
            return Err(MapError::CorruptIndex(format!(
                "unsupported pack version {version}"
            )));
        }
        let len_forward = r.read_u64_le()?;
        let n_contigs = r.read_u32_le()?;
        let mut contigs = Vec::with_capacity(n_contigs as usize);
        for _ in 0..n_contigs {
            let offset = r.read_u64_le()?;
            let length = r.read_u64_le()?;
            let name_len = r.read_u32_le()?;
            let mut name = vec![0u8; name_len as usize];
            r.read_exact(&mut name)?;
            let name = String::from_utf8(name)
                .map_err(|_| MapError::CorruptIndex("contig name is not UTF-8".into()))?;
            contigs.push(Contig {
                name,
                offset,
                length,
            });
        }
        let n_ambs = r.read_u32_le()?;
        let mut ambs = Vec::with_capacity(n_ambs as usize);
        for _ in 0..n_ambs {
            let offset = r.read_u64_le()?;
            let length = r.read_u64_le()?;
            ambs.push(AmbRun { offset, length });
        }
        let payload_len = len_forward.div_ceil(4) as usize;
        let mut seq = vec![0u8; payload_len];
        r.read_exact(&mut seq)?;

        let pack = Pack {
            seq,
            len_forward,
            contigs,
            ambs,
        };
        pack.check_consistency()?;
        Ok(pack)
    }

    fn check_consistency(&self) -> Result<()> {
        let mut expected = 0u64;
        for c in &self.contigs {
            if c.offset != expected {
                return Err(MapError::CorruptIndex(format!(
                    "contig {} starts at {} but {} expected",
                    c.name, c.offset, expected
                )));
            }
            expected += c.length;
        }
        if expected != self.len_forward {
            return Err(MapError::CorruptIndex(format!(
                "contig lengths sum to {expected}, header says {}",
                self.len_forward
            )));
        }
        for r in &self.ambs {
            if r.offset + r.length > self.len_forward {
                return Err(MapError::CorruptIndex(
                    "ambiguity run beyond reference end".into(),
                ));
            }
        }
        Ok(())
    }
}

#[path = "pack_test.rs"]
mod pack_test;
