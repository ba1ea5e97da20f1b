use std::sync::atomic::{AtomicUsize, Ordering};

/// Number of workers for `files` items on a machine with `processors` cores.
///
/// `min(files, processors + 1)`, further capped by `max_workers` when it is nonzero.
pub fn worker_count(files: usize, processors: usize, max_workers: usize) -> usize {
    let workers = files.min(processors.saturating_add(1));
    if max_workers > 0 {
        workers.min(max_workers)
    } else {
        workers
    }
}

/// Cores available to this process, falling back to 1 when unknown.
pub fn available_processors() -> usize {
    std::thread::available_parallelism()
        .map(std::num::NonZero::get)
        .unwrap_or(1)
}

/// A fixed list of work items claimed through one shared atomic cursor.
///
/// Every call to [`claim`](Self::claim) performs a single `fetch_add`, so each index
/// is handed out exactly once no matter how many threads claim concurrently, and
/// every claimer sees `None` once the cursor has passed the end.
#[derive(Debug)]
pub struct WorkQueue<'a, T> {
    items: &'a [T],
    cursor: AtomicUsize,
}

impl<'a, T> WorkQueue<'a, T> {
    pub fn new(items: &'a [T]) -> Self {
        Self {
            items,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Claim the next unclaimed item together with its index.
    pub fn claim(&self) -> Option<(usize, &'a T)> {
        let index = self.cursor.fetch_add(1, Ordering::Relaxed);
        self.items.get(index).map(|item| (index, item))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items handed out so far.
    pub fn claimed(&self) -> usize {
        self.cursor.load(Ordering::Relaxed).min(self.items.len())
    }

    /// Items nobody has claimed yet.
    pub fn remaining(&self) -> usize {
        self.items.len() - self.claimed()
    }
}
