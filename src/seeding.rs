// src/seeding.rs
//
// Recursive segmentation of the query into maximal exact matches.
//
// Each interval is processed by extending from its center in both
// directions; the longer of the two center MEMs is recorded and the two
// remainder intervals are re-enqueued into the work pool. There is always a
// supply of ready intervals, so workers only synchronize on the pool queue;
// results go to per-worker buffers merged once the pool runs dry.

use crate::error::{MapError, Result};
use crate::fm_index::{FmIndex, SaInterval};
use crate::map_opt::MapOpt;
use crate::seed::{Segment, SegmentVector};
use crate::thread_pool::WorkPool;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

struct SegCtx {
    fm: Arc<FmIndex>,
    query: Arc<Vec<u8>>,
    opt: MapOpt,
    cancel: Arc<AtomicBool>,
    buffers: Vec<Mutex<Vec<Segment>>>,
}

/// Splits the query into maximal exact matches against the FM-index.
///
/// Returns an empty vector for an empty query. Honors the cancellation flag
/// at every task boundary; in-flight tasks finish their current extension
/// and return, and no partial result is exposed.
pub fn segment(
    query: &Arc<Vec<u8>>,
    fm: &Arc<FmIndex>,
    opt: &MapOpt,
    cancel: &Arc<AtomicBool>,
) -> Result<SegmentVector> {
    if query.is_empty() {
        return Ok(SegmentVector::default());
    }
    let n_workers = opt.num_threads.max(1) as usize;
    let pool = Arc::new(WorkPool::new(n_workers));
    let ctx = Arc::new(SegCtx {
        fm: Arc::clone(fm),
        query: Arc::clone(query),
        opt: opt.clone(),
        cancel: Arc::clone(cancel),
        buffers: (0..n_workers).map(|_| Mutex::new(Vec::new())).collect(),
    });

    let root_ctx = Arc::clone(&ctx);
    let root_pool = Arc::clone(&pool);
    let end = query.len() as u64;
    pool.submit(move |worker| process_interval(&root_ctx, &root_pool, worker, 0, end));
    pool.wait_idle();
    pool.shutdown();

    if cancel.load(Ordering::Relaxed) {
        return Err(MapError::Cancelled);
    }
    let mut segments = Vec::new();
    for buf in &ctx.buffers {
        segments.append(&mut buf.lock().unwrap());
    }
    Ok(SegmentVector::from_sorted(segments))
}

/// Processes the query interval [start, end): records the center MEM and
/// enqueues the remainder intervals.
fn process_interval(ctx: &Arc<SegCtx>, pool: &Arc<WorkPool>, worker: usize, start: u64, end: u64) {
    if ctx.cancel.load(Ordering::Relaxed) {
        return;
    }
    if end <= start || end - start < ctx.opt.min_interval_size.max(1) as u64 {
        return;
    }
    let center = start + (end - start) / 2;

    // An ambiguous center yields no MEM; both sides are recursed as usual.
    let (mem_start, mem_end) = match center_mem(ctx, center) {
        Some((mem_start, mem_end, interval)) => {
            let segment = Segment {
                q_start: mem_start,
                len: mem_end - mem_start + 1,
                interval,
            };
            ctx.buffers[worker].lock().unwrap().push(segment);
            (mem_start, mem_end)
        }
        None => (center, center),
    };

    for (sub_start, sub_end) in [(start, mem_start), (mem_end + 1, end)] {
        if sub_end > sub_start && sub_end - sub_start >= ctx.opt.min_interval_size.max(1) as u64 {
            let child_ctx = Arc::clone(ctx);
            let child_pool = Arc::clone(pool);
            pool.submit_from_worker(move |worker| {
                process_interval(&child_ctx, &child_pool, worker, sub_start, sub_end)
            });
        }
    }
}

/// The maximal exact match through `center`: extend backward as far as
/// possible, then forward from the reached position, and symmetrically
/// forward first; keep the longer match. Returns the inclusive query range
/// and its SA-interval.
fn center_mem(ctx: &SegCtx, center: u64) -> Option<(u64, u64, SaInterval)> {
    let q = &ctx.query[..];
    if q[center as usize] >= 4 {
        return None;
    }

    // Backward then forward.
    let b = extend_to_start(ctx, center);
    let (bf_end, bf_ik) = extend_to_end(ctx, b);
    debug_assert!(bf_end >= center);

    // Forward then backward.
    let f = extend_to_end(ctx, center).0;
    let (fb_start, fb_ik) = extend_to_start_tracked(ctx, f);
    debug_assert!(fb_start <= center);

    if bf_end - b > f - fb_start {
        Some((b, bf_end, bf_ik))
    } else {
        Some((fb_start, f, fb_ik))
    }
}

/// Backward extension from `from`: the furthest query position b such that
/// q[b ..= from] still occurs in the reference.
fn extend_to_start(ctx: &SegCtx, from: u64) -> u64 {
    extend_to_start_tracked(ctx, from).0
}

fn extend_to_start_tracked(ctx: &SegCtx, from: u64) -> (u64, SaInterval) {
    let q = &ctx.query[..];
    let mut ik = ctx.fm.init_interval(q[from as usize]);
    let mut b = from;
    while b > 0 {
        let c = q[(b - 1) as usize];
        if c >= 4 && ctx.opt.break_on_n {
            break;
        }
        let ok = ctx.fm.extend_backward(ik, c);
        if ok.is_empty() {
            break;
        }
        ik = ok;
        b -= 1;
    }
    (b, ik)
}

/// Forward extension from `from`: the furthest query position e such that
/// q[from ..= e] still occurs, together with that match's SA-interval.
fn extend_to_end(ctx: &SegCtx, from: u64) -> (u64, SaInterval) {
    let q = &ctx.query[..];
    let mut ik = ctx.fm.init_interval(q[from as usize]);
    let mut e = from;
    while (e + 1) < q.len() as u64 {
        let c = q[(e + 1) as usize];
        if c >= 4 && ctx.opt.break_on_n {
            break;
        }
        let ok = ctx.fm.extend_forward(ik, c);
        if ok.is_empty() {
            break;
        }
        ik = ok;
        e += 1;
    }
    (e, ik)
}
