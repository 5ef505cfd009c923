// src/index.rs
//
// Index management: builds, dumps and restores the pack + FM-index pair
// under a common filename prefix.

use crate::error::Result;
use crate::fm_index::FmIndex;
use crate::map_opt::MapOpt;
use crate::pack::Pack;
use crate::utils::realtime;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::Arc;

#[derive(Debug)]
pub struct RefIndex {
    pub pack: Arc<Pack>,
    pub fm: Arc<FmIndex>,
}

impl RefIndex {
    /// Builds both index halves from an already-populated pack.
    pub fn build(pack: Pack, opt: &MapOpt) -> Result<RefIndex> {
        let t0 = realtime();
        let fm = FmIndex::build(&pack, opt.sa_sample_interval)?;
        debug_assert!(fm.self_check(&pack, 16), "FM-index self-check failed");
        log::info!(
            "built FM-index over {} bases ({} contigs) in {:.2} s",
            fm.ref_len(),
            pack.contigs().len(),
            realtime() - t0
        );
        Ok(RefIndex {
            pack: Arc::new(pack),
            fm: Arc::new(fm),
        })
    }

    /// Convenience builder from (name, ASCII sequence) pairs.
    pub fn from_contigs<'a, I>(contigs: I, opt: &MapOpt) -> Result<RefIndex>
    where
        I: IntoIterator<Item = (&'a str, &'a [u8])>,
    {
        let mut pack = Pack::new();
        for (name, seq) in contigs {
            pack.append_contig(name, seq);
        }
        RefIndex::build(pack, opt)
    }

    pub fn dump(&self, prefix: &Path) -> Result<()> {
        let mut w = BufWriter::new(File::create(prefix.with_extension("pack"))?);
        self.pack.dump(&mut w)?;
        let mut w = BufWriter::new(File::create(prefix.with_extension("fmi"))?);
        self.fm.dump(&mut w)?;
        Ok(())
    }

    pub fn load(prefix: &Path) -> Result<RefIndex> {
        let t0 = realtime();
        let mut r = BufReader::new(File::open(prefix.with_extension("pack"))?);
        let pack = Pack::load(&mut r)?;
        let mut r = BufReader::new(File::open(prefix.with_extension("fmi"))?);
        let fm = FmIndex::load(&mut r)?;
        if fm.ref_len() != pack.len_total() {
            return Err(crate::error::MapError::CorruptIndex(format!(
                "FM-index covers {} bases but the pack holds {}",
                fm.ref_len(),
                pack.len_total()
            )));
        }
        log::debug!(
            "restored index {} in {:.2} s",
            prefix.display(),
            realtime() - t0
        );
        Ok(RefIndex {
            pack: Arc::new(pack),
            fm: Arc::new(fm),
        })
    }
}
