//! Thread pool configuration, parallel loops and per-thread scratch buffers.

use std::cell::{RefCell, RefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use num_traits::Zero;
use once_cell::sync::Lazy;
use rayon::prelude::*;
use thread_local::ThreadLocal;

use crate::Error;

/// Number of threads requested by the user, 0 meaning rayon's default
static NUM_THREADS: AtomicUsize = AtomicUsize::new(0);

/// Thread pool used when a specific number of threads was requested
static THREAD_POOL: Lazy<Mutex<Option<Arc<rayon::ThreadPool>>>> = Lazy::new(|| Mutex::new(None));

/// Set the number of threads used by all parallel computations. Setting this
/// to 0 goes back to rayon's global thread pool, which can be configured with
/// the `RAYON_NUM_THREADS` environment variable.
pub fn set_num_threads(n_threads: usize) -> Result<(), Error> {
    let mut pool = THREAD_POOL.lock().unwrap_or_else(PoisonError::into_inner);
    if n_threads == 0 {
        *pool = None;
    } else {
        let new_pool = rayon::ThreadPoolBuilder::new()
            .num_threads(n_threads)
            .thread_name(|i| format!("linkcell-{}", i))
            .build()?;
        *pool = Some(Arc::new(new_pool));
    }
    NUM_THREADS.store(n_threads, Ordering::SeqCst);

    return Ok(());
}

/// Get the number of threads used by parallel computations
pub fn num_threads() -> usize {
    match NUM_THREADS.load(Ordering::SeqCst) {
        0 => rayon::current_num_threads(),
        n_threads => n_threads,
    }
}

/// Guard changing the number of threads used by parallel computations, and
/// restoring the previous value when dropped.
///
/// ```
/// # use linkcell::parallel::{NumThreads, num_threads};
/// {
///     let _guard = NumThreads::new(2).unwrap();
///     assert_eq!(num_threads(), 2);
/// }
/// ```
#[derive(Debug)]
pub struct NumThreads {
    previous: usize,
}

impl NumThreads {
    /// Use `n_threads` threads until the returned guard is dropped
    pub fn new(n_threads: usize) -> Result<NumThreads, Error> {
        let previous = NUM_THREADS.load(Ordering::SeqCst);
        set_num_threads(n_threads)?;
        return Ok(NumThreads { previous });
    }
}

impl Drop for NumThreads {
    fn drop(&mut self) {
        if let Err(e) = set_num_threads(self.previous) {
            log::error!("failed to restore the number of threads: {}", e);
        }
    }
}

/// Run `function` in the configured thread pool
pub fn install<F, R>(function: F) -> R where
    F: FnOnce() -> R + Send,
    R: Send,
{
    let pool = THREAD_POOL.lock().unwrap_or_else(PoisonError::into_inner).clone();
    match pool {
        Some(pool) => pool.install(function),
        None => function(),
    }
}

/// Run `body` over the range `begin..end`, split in contiguous blocks.
///
/// `body` is called with the start and end of each block. When `parallel` is
/// `false` or the range is empty, `body` is called once with the full range
/// on the current thread.
pub fn for_loop_wrapper<F>(parallel: bool, begin: usize, end: usize, body: F) where
    F: Fn(usize, usize) + Sync,
{
    if begin >= end {
        return;
    }

    if !parallel {
        body(begin, end);
        return;
    }

    install(|| {
        let size = end - begin;
        let n_blocks = usize::min(size, 4 * rayon::current_num_threads());
        let block_size = (size + n_blocks - 1) / n_blocks;
        (0..n_blocks).into_par_iter().for_each(|block| {
            let start = begin + block * block_size;
            let stop = usize::min(start + block_size, end);
            if start < stop {
                body(start, stop);
            }
        });
    });
}

/// Per-thread arrays of `T`, lazily created and filled with zeros the first
/// time each thread accesses them.
///
/// This is used to accumulate results in parallel loops without
/// synchronization, merging the arrays from all threads once the loop is
/// done.
///
/// ```
/// # use linkcell::parallel::{for_loop_wrapper, ThreadLocalArray};
/// let mut histogram = ThreadLocalArray::<u64>::new(4);
/// for_loop_wrapper(true, 0, 100, |begin, end| {
///     let mut local = histogram.local();
///     for i in begin..end {
///         local[i % 4] += 1;
///     }
/// });
/// assert_eq!(histogram.reduce(), [25, 25, 25, 25]);
/// ```
#[derive(Debug)]
pub struct ThreadLocalArray<T: Send> {
    size: usize,
    arrays: ThreadLocal<RefCell<Vec<T>>>,
}

impl<T> ThreadLocalArray<T> where T: Zero + Clone + Send {
    /// Create new per-thread arrays with `size` elements
    pub fn new(size: usize) -> ThreadLocalArray<T> {
        ThreadLocalArray {
            size: size,
            arrays: ThreadLocal::new(),
        }
    }

    /// Number of elements in each array
    pub fn size(&self) -> usize {
        self.size
    }

    /// Discard all existing arrays, and use `size` elements for the arrays
    /// created afterward
    pub fn update(&mut self, size: usize) {
        self.arrays.clear();
        self.size = size;
    }

    /// Get the array for the current thread, creating it if needed.
    ///
    /// # Panics
    ///
    /// If the array for the current thread is already borrowed
    pub fn local(&self) -> RefMut<'_, Vec<T>> {
        self.arrays.get_or(|| RefCell::new(vec![T::zero(); self.size])).borrow_mut()
    }

    /// Iterate over the arrays created by all threads so far
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Vec<T>> + '_ {
        self.arrays.iter_mut().map(RefCell::get_mut)
    }

    /// Sum the arrays from all threads element-wise
    pub fn reduce(&mut self) -> Vec<T> where T: std::ops::AddAssign {
        let mut result = vec![T::zero(); self.size];
        for array in self.iter_mut() {
            for (sum, value) in result.iter_mut().zip(array.iter()) {
                *sum += value.clone();
            }
        }
        return result;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU64;

    use super::*;

    #[test]
    fn loop_covers_range() {
        for parallel in [false, true] {
            for (begin, end) in [(0, 0), (0, 1), (3, 10), (0, 1000)] {
                let seen = (begin..end).map(|_| AtomicU64::new(0)).collect::<Vec<_>>();
                for_loop_wrapper(parallel, begin, end, |start, stop| {
                    assert!(begin <= start && start < stop && stop <= end);
                    for i in start..stop {
                        seen[i - begin].fetch_add(1, Ordering::Relaxed);
                    }
                });
                assert!(seen.iter().all(|count| count.load(Ordering::Relaxed) == 1));
            }
        }
    }

    #[test]
    fn thread_local_array() {
        let mut arrays = ThreadLocalArray::<f64>::new(3);
        assert_eq!(arrays.reduce(), [0.0, 0.0, 0.0]);

        for_loop_wrapper(true, 0, 300, |begin, end| {
            let mut local = arrays.local();
            assert_eq!(local.len(), 3);
            for i in begin..end {
                local[i % 3] += 1.0;
            }
        });
        assert_eq!(arrays.reduce(), [100.0, 100.0, 100.0]);

        for array in arrays.iter_mut() {
            array[0] = 0.0;
        }
        assert_eq!(arrays.reduce(), [0.0, 100.0, 100.0]);

        arrays.update(5);
        assert_eq!(arrays.size(), 5);
        assert_eq!(arrays.reduce(), [0.0; 5]);
        assert_eq!(arrays.local().len(), 5);
    }

    #[test]
    fn num_threads_guard() {
        {
            let _guard = NumThreads::new(3).unwrap();
            assert_eq!(num_threads(), 3);
            assert_eq!(install(rayon::current_num_threads), 3);
        }
        assert_eq!(NUM_THREADS.load(Ordering::SeqCst), 0);
    }
}
