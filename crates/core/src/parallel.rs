#[cfg(not(target_arch = "wasm32"))]
use rayon::prelude::*;

#[cfg(not(target_arch = "wasm32"))]
const PARALLEL_THRESHOLD: usize = 1024;

/// Maps `f` over `0..len` in order, in parallel for large buffers. Only used for
/// per-element conversion; no transport calls happen in here.
pub fn map_indexed<U, F>(len: usize, f: F) -> Vec<U>
where
    U: Send,
    F: Fn(usize) -> U + Sync + Send,
{
    #[cfg(not(target_arch = "wasm32"))]
    {
        if len >= PARALLEL_THRESHOLD {
            return (0..len).into_par_iter().map(&f).collect();
        }
    }

    (0..len).map(f).collect()
}

pub fn map_slice<T, U, F>(slice: &[T], f: F) -> Vec<U>
where
    T: Sync,
    U: Send,
    F: Fn(&T) -> U + Sync + Send,
{
    #[cfg(not(target_arch = "wasm32"))]
    {
        if slice.len() >= PARALLEL_THRESHOLD {
            return slice.par_iter().map(&f).collect();
        }
    }

    slice.iter().map(f).collect()
}
