// src/thread_pool.rs
//
// Bounded worker pool that supports enqueueing new tasks from inside a
// running task. A single mutex guards the task queue and the completion
// counter; tasks run with the lock released, so a worker enqueueing from
// within a task can never deadlock the pool.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

type Task = Box<dyn FnOnce(usize) + Send + 'static>;

#[derive(Default)]
struct PoolState {
    queue: VecDeque<Task>,
    /// Tasks queued or currently running.
    pending: usize,
    shutdown: bool,
}

struct PoolShared {
    state: Mutex<PoolState>,
    cond: Condvar,
}

pub struct WorkPool {
    shared: Arc<PoolShared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkPool {
    /// Spawns `n_workers` workers (at least one).
    pub fn new(n_workers: usize) -> WorkPool {
        let shared = Arc::new(PoolShared {
            state: Mutex::new(PoolState::default()),
            cond: Condvar::new(),
        });
        let workers = (0..n_workers.max(1))
            .map(|worker_id| {
                let shared = Arc::clone(&shared);
                thread::spawn(move || worker_loop(shared, worker_id))
            })
            .collect();
        WorkPool {
            shared,
            workers: Mutex::new(workers),
        }
    }

    /// Enqueues a task. The task receives the id of the worker running it.
    pub fn submit<F: FnOnce(usize) + Send + 'static>(&self, task: F) {
        let mut state = self.shared.state.lock().unwrap();
        debug_assert!(!state.shutdown, "submit after shutdown");
        state.queue.push_back(Box::new(task));
        state.pending += 1;
        drop(state);
        self.shared.cond.notify_one();
    }

    /// Enqueues a task from inside a running task. Identical semantics to
    /// `submit`; the separate name documents that this call is safe in a
    /// worker context: the queue lock is never held while tasks execute.
    pub fn submit_from_worker<F: FnOnce(usize) + Send + 'static>(&self, task: F) {
        self.submit(task);
    }

    /// Blocks until every queued and running task has finished. Must not be
    /// called from a worker.
    pub fn wait_idle(&self) {
        let state = self.shared.state.lock().unwrap();
        let _guard = self
            .shared
            .cond
            .wait_while(state, |s| s.pending > 0)
            .unwrap();
    }

    /// Drains remaining tasks, then joins the workers. Called implicitly on
    /// drop.
    pub fn shutdown(&self) {
        {
            let mut state = self.shared.state.lock().unwrap();
            if state.shutdown {
                return;
            }
            state.shutdown = true;
        }
        self.shared.cond.notify_all();
        let handles: Vec<_> = self.workers.lock().unwrap().drain(..).collect();
        for h in handles {
            let _ = h.join();
        }
    }
}

impl Drop for WorkPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(shared: Arc<PoolShared>, worker_id: usize) {
    let mut state = shared.state.lock().unwrap();
    loop {
        if let Some(task) = state.queue.pop_front() {
            drop(state);
            task(worker_id);
            state = shared.state.lock().unwrap();
            state.pending -= 1;
            if state.pending == 0 {
                // Wake idle-waiters; workers re-check their own predicate.
                shared.cond.notify_all();
            }
        } else if state.shutdown {
            break;
        } else {
            state = shared.cond.wait(state).unwrap();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_runs_submitted_tasks() {
        let pool = WorkPool::new(4);
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..100 {
            let counter = Arc::clone(&counter);
            pool.submit(move |_| {
                counter.fetch_add(1, Ordering::Relaxed);
            });
        }
        pool.wait_idle();
        assert_eq!(counter.load(Ordering::Relaxed), 100);
        pool.shutdown();
    }

    #[test]
    fn test_recursive_enqueue_does_not_deadlock() {
        // Every task spawns two children down to a fixed depth; with a
        // single worker this deadlocks unless recursive enqueues are safe.
        let pool = Arc::new(WorkPool::new(1));
        let counter = Arc::new(AtomicUsize::new(0));

        fn spawn(pool: &Arc<WorkPool>, counter: &Arc<AtomicUsize>, depth: usize) {
            let p = Arc::clone(pool);
            let c = Arc::clone(counter);
            pool.submit_from_worker(move |_| {
                c.fetch_add(1, Ordering::Relaxed);
                if depth > 0 {
                    spawn(&p, &c, depth - 1);
                    spawn(&p, &c, depth - 1);
                }
            });
        }

        spawn(&pool, &counter, 6);
        pool.wait_idle();
        // 2^8 - 1 tasks in the full binary tree of depth 7.
        assert_eq!(counter.load(Ordering::Relaxed), 127);
    }

    #[test]
    fn test_worker_ids_in_range() {
        let pool = WorkPool::new(3);
        let bad = Arc::new(AtomicUsize::new(0));
        for _ in 0..50 {
            let bad = Arc::clone(&bad);
            pool.submit(move |wid| {
                if wid >= 3 {
                    bad.fetch_add(1, Ordering::Relaxed);
                }
            });
        }
        pool.wait_idle();
        assert_eq!(bad.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_shutdown_drains_queue() {
        let pool = WorkPool::new(2);
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..20 {
            let counter = Arc::clone(&counter);
            pool.submit(move |_| {
                counter.fetch_add(1, Ordering::Relaxed);
            });
        }
        pool.shutdown();
        assert_eq!(counter.load(Ordering::Relaxed), 20);
    }
}
