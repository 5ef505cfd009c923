// src/reseed.rs
//
// Optional chain refinement: fill gaps between consecutive seeds with k-mer
// matches from a hash map over the gapped reference window, extend every
// seed maximally against the pack, and lump same-diagonal neighbors.

use crate::filters;
use crate::map_opt::MapOpt;
use crate::pack::Pack;
use crate::seed::{Chain, Seed};
use ahash::AHashMap;

/// Packs a k-mer into an integer key; `None` if it contains an ambiguous
/// base.
fn pack_kmer(codes: &[u8]) -> Option<u64> {
    let mut key = 0u64;
    for &c in codes {
        if c >= 4 {
            return None;
        }
        key = (key << 2) | c as u64;
    }
    Some(key)
}

/// All (query offset, window offset) k-mer matches between a query slice
/// and a reference window.
fn kmer_matches(query_win: &[u8], ref_win: &[u8], k: usize) -> Vec<(usize, usize)> {
    if query_win.len() < k || ref_win.len() < k {
        return Vec::new();
    }
    let mut index: AHashMap<u64, Vec<usize>> = AHashMap::new();
    for off in 0..=(ref_win.len() - k) {
        if let Some(key) = pack_kmer(&ref_win[off..off + k]) {
            index.entry(key).or_default().push(off);
        }
    }
    let mut out = Vec::new();
    for qoff in 0..=(query_win.len() - k) {
        if let Some(key) = pack_kmer(&query_win[qoff..qoff + k]) {
            if let Some(offs) = index.get(&key) {
                out.extend(offs.iter().map(|&roff| (qoff, roff)));
            }
        }
    }
    out
}

/// Maximally extends a seed in both directions, in the doubled reference
/// space (the pack answers reverse-half positions complemented, so one loop
/// serves both strands). Extension never crosses a contig boundary or the
/// strand midpoint.
pub fn extend_seed(seed: &mut Seed, query: &[u8], pack: &Pack) {
    let l = pack.len_forward();
    let mut q_start = seed.q_start;
    let mut spos = seed.soc_pos(l);
    let mut len = seed.len;

    while q_start > 0
        && spos > 0
        && query[(q_start - 1) as usize] < 4
        && pack.nuc(spos - 1) == query[(q_start - 1) as usize]
        && !pack.bridges(spos - 1, spos + len)
    {
        q_start -= 1;
        spos -= 1;
        len += 1;
    }
    while q_start + len < query.len() as u64
        && spos + len < pack.len_total()
        && query[(q_start + len) as usize] < 4
        && pack.nuc(spos + len) == query[(q_start + len) as usize]
        && !pack.bridges(spos, spos + len + 1)
    {
        len += 1;
    }
    *seed = Seed::from_hit(spos, q_start, len, l);
}

/// Merges same-diagonal seeds that touch or overlap on the query axis.
/// Input seeds must share a strand.
fn lump(mut seeds: Vec<Seed>, len_forward: u64) -> Vec<Seed> {
    seeds.sort_by_key(|s| (s.delta(len_forward), s.q_start));
    let mut out: Vec<Seed> = Vec::with_capacity(seeds.len());
    for s in seeds {
        match out.last_mut() {
            Some(last)
                if last.delta(len_forward) == s.delta(len_forward)
                    && s.q_start <= last.q_end() =>
            {
                let merged_end = last.q_end().max(s.q_end());
                let spos = last.soc_pos(len_forward);
                let q_start = last.q_start;
                *last = Seed::from_hit(spos, q_start, merged_end - q_start, len_forward);
            }
            _ => out.push(s),
        }
    }
    out
}

/// Longest-wins overlap resolution, restoring the chain invariants after
/// new seeds were inserted.
fn resolve_overlaps(mut seeds: Vec<Seed>, len_forward: u64) -> Vec<Seed> {
    seeds.sort_by_key(|s| (s.q_start, s.soc_pos(len_forward)));
    let mut out: Vec<Seed> = Vec::with_capacity(seeds.len());
    for s in seeds {
        loop {
            match out.last() {
                None => {
                    out.push(s);
                    break;
                }
                Some(last)
                    if s.q_start >= last.q_end()
                        && s.soc_pos(len_forward) >= last.soc_end(len_forward) =>
                {
                    out.push(s);
                    break;
                }
                Some(last) if s.len > last.len => {
                    out.pop();
                }
                Some(_) => break,
            }
        }
    }
    out
}

/// Re-seeds the gaps of a harmonized chain and refines the result.
pub fn refine_chain(chain: &mut Chain, query: &[u8], pack: &Pack, opt: &MapOpt) {
    if chain.seeds.is_empty() {
        return;
    }
    let l = pack.len_forward();
    let k = opt.reseed_kmer_len as usize;

    let mut seeds = chain.seeds.clone();
    if k > 0 {
        for pair in chain.seeds.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            debug_assert_eq!(a.on_forward, b.on_forward);
            let (q_from, q_to) = (a.q_end(), b.q_start);
            let (r_from, r_to) = (a.soc_end(l), b.soc_pos(l));
            if q_from + k as u64 > q_to || r_from + k as u64 > r_to {
                continue;
            }
            if pack.bridges(r_from, r_to) {
                continue;
            }
            let Ok(ref_win) = pack.extract(r_from, r_to) else {
                continue;
            };
            let query_win = &query[q_from as usize..q_to as usize];
            for (qoff, roff) in kmer_matches(query_win, &ref_win, k) {
                seeds.push(Seed::from_hit(
                    r_from + roff as u64,
                    q_from + qoff as u64,
                    k as u64,
                    l,
                ));
            }
        }
    }

    for s in seeds.iter_mut() {
        extend_seed(s, query, pack);
    }
    // Distinct k-mers often extend to the same maximal seed.
    let seeds = filters::sort_remove_duplicates(seeds);
    let seeds = lump(seeds, l);
    let seeds = filters::max_extended_to_smem(seeds);
    chain.seeds = resolve_overlaps(seeds, l);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::encode;

    fn pack_of(seq: &[u8]) -> Pack {
        let mut pack = Pack::new();
        pack.append_contig("test", seq);
        pack
    }

    #[test]
    fn test_extend_seed_forward() {
        let reference = b"TTGACCTTGAGGTTCAACGTGG";
        let pack = pack_of(reference);
        let query = encode(&reference[4..16]); // "CCTTGAGGTTCA"
        let mut seed = Seed::from_hit(8, 4, 3, pack.len_forward());
        extend_seed(&mut seed, &query, &pack);
        assert_eq!(seed.q_start, 0);
        assert_eq!(seed.len, 12);
        assert_eq!(seed.ref_start, 4);
    }

    #[test]
    fn test_extend_seed_stops_at_contig_boundary() {
        let mut pack = Pack::new();
        pack.append_contig("a", b"AAAA");
        pack.append_contig("b", b"AAAA");
        let query = encode(b"AAAAAA");
        // Seed in contig b; leftward bases match but lie across the
        // boundary, so extension must stop there.
        let mut seed = Seed::from_hit(4, 2, 2, pack.len_forward());
        extend_seed(&mut seed, &query, &pack);
        assert_eq!(seed.ref_start, 4);
        assert_eq!(seed.q_start, 2);
        assert_eq!(seed.len, 4);
    }

    #[test]
    fn test_extend_seed_reverse_strand() {
        let reference = b"GATTACAGGC";
        let pack = pack_of(reference);
        // Query = reverse complement of the reference.
        let query = encode(b"GCCTGTAATC");
        let mut seed = Seed::from_hit(12, 2, 3, pack.len_forward());
        assert!(!seed.on_forward);
        extend_seed(&mut seed, &query, &pack);
        assert_eq!(seed.q_start, 0);
        assert_eq!(seed.len, 10);
        assert!(!seed.on_forward);
    }

    #[test]
    fn test_refine_fills_gap_between_seeds() {
        let reference = b"CATGGCTTAGCTAGGATCCGGAACTTGCATCGGATCAGCA";
        let pack = pack_of(reference);
        let query = encode(&reference[5..35]);
        let chain_seeds = vec![
            Seed::from_hit(5, 0, 6, pack.len_forward()),
            Seed::from_hit(29, 24, 6, pack.len_forward()),
        ];
        let mut chain = Chain { seeds: chain_seeds };
        let opt = MapOpt {
            do_reseed: true,
            reseed_kmer_len: 5,
            ..MapOpt::default()
        };
        refine_chain(&mut chain, &query, &pack, &opt);
        // Extension plus lumping collapses everything into one covering seed.
        assert_eq!(chain.seeds.len(), 1);
        assert_eq!(chain.seeds[0].q_start, 0);
        assert_eq!(chain.seeds[0].len, 30);
        assert_eq!(chain.seeds[0].ref_start, 5);
    }

    #[test]
    fn test_lump_merges_adjacent_same_diagonal() {
        let pack = pack_of(b"ACGTACGTACGTACGT");
        let l = pack.len_forward();
        let seeds = vec![
            Seed::from_hit(2, 0, 4, l),
            Seed::from_hit(6, 4, 4, l),
            // Different diagonal, must stay separate.
            Seed::from_hit(13, 9, 3, l),
        ];
        let lumped = lump(seeds, l);
        assert_eq!(lumped.len(), 2);
        assert!(lumped.iter().any(|s| s.q_start == 0 && s.len == 8));
    }
}
