// src/bwt_test.rs

#[cfg(test)]
mod tests {
    use crate::bwt::Bwt;
    use crate::utils::encode;

    /// Naive reference model: suffix array by sorting, conceptual BWT with
    /// the sentinel kept in place.
    struct Naive {
        sa: Vec<usize>,
        bwt: Vec<Option<u8>>, // None marks the sentinel row
    }

    fn naive(codes: &[u8]) -> Naive {
        let n = codes.len();
        let mut suffixes: Vec<usize> = (0..=n).collect();
        // '$' sorts before every base.
        suffixes.sort_by(|&a, &b| {
            let sa = &codes[a..];
            let sb = &codes[b..];
            sa.iter()
                .map(|&c| c as i32)
                .chain(std::iter::once(-1))
                .cmp(sb.iter().map(|&c| c as i32).chain(std::iter::once(-1)))
        });
        let bwt = suffixes
            .iter()
            .map(|&p| if p == 0 { None } else { Some(codes[p - 1]) })
            .collect();
        Naive { sa: suffixes, bwt }
    }

    #[test]
    fn test_build_matches_naive_model() {
        for seq in [
            &b"GATTACA"[..],
            b"ACGTACGTACGT",
            b"AAAACCCCGGGGTTTT",
            b"TTGACCTTGAGGTTCAACGTGGCATCATCGGATTTACCA",
        ] {
            let codes = encode(seq);
            let bwt = Bwt::build(&codes, 4).unwrap();
            let model = naive(&codes);

            let primary = model.bwt.iter().position(|b| b.is_none()).unwrap() as u64;
            assert_eq!(bwt.primary, primary, "{seq:?}: primary row");

            // Stored BWT bases (sentinel skipped) in row order.
            let mut stored = 0u64;
            for b in &model.bwt {
                if let Some(c) = b {
                    assert_eq!(bwt.b0(stored), *c, "{seq:?}: stored base {stored}");
                    stored += 1;
                }
            }
            assert_eq!(stored, bwt.seq_len);

            // Occurrence counts against a prefix scan of the conceptual BWT.
            let mut counts = [0u64; 4];
            assert_eq!(bwt.occ4(-1), [0; 4]);
            for (row, b) in model.bwt.iter().enumerate() {
                if let Some(c) = b {
                    counts[*c as usize] += 1;
                }
                assert_eq!(bwt.occ4(row as i64), counts, "{seq:?}: occ up to row {row}");
            }

            // Suffix-array recovery for every row except the sentinel's.
            for (row, &pos) in model.sa.iter().enumerate() {
                if pos < codes.len() {
                    assert_eq!(
                        bwt.sa_value(row as u64),
                        pos as u64,
                        "{seq:?}: SA[{row}]"
                    );
                }
            }
        }
    }

    #[test]
    fn test_occ_across_block_boundaries() {
        // Long enough to span several 128-base occurrence blocks.
        let mut seq = Vec::new();
        for i in 0..700usize {
            seq.push(b"ACGT"[(i * 7 + i / 5) % 4]);
        }
        let codes = encode(&seq);
        let bwt = Bwt::build(&codes, 32).unwrap();
        let model = naive(&codes);

        let mut counts = [0u64; 4];
        for (row, b) in model.bwt.iter().enumerate() {
            if let Some(c) = b {
                counts[*c as usize] += 1;
            }
            assert_eq!(bwt.occ4(row as i64), counts, "occ up to row {row}");
        }
        assert_eq!(bwt.occ4(codes.len() as i64), {
            let mut all = [0u64; 4];
            for &c in &codes {
                all[c as usize] += 1;
            }
            all
        });
    }

    #[test]
    fn test_payload_roundtrip() {
        let codes = encode(b"ACCGTTAGACCAGTATTTGGCA");
        let bwt = Bwt::build(&codes, 8).unwrap();
        let mut buf = Vec::new();
        bwt.dump_payload(&mut buf).unwrap();
        let loaded = Bwt::load_payload(
            &mut &buf[..],
            bwt.primary,
            bwt.l2,
            bwt.seq_len,
            bwt.sa_intv,
            bwt.n_sa(),
        )
        .unwrap();
        for row in 1..=codes.len() as u64 {
            if row != bwt.primary {
                assert_eq!(loaded.sa_value(row), bwt.sa_value(row));
            }
        }
    }

    #[test]
    fn test_empty_reference_rejected() {
        assert!(Bwt::build(&[], 32).is_err());
    }
}
