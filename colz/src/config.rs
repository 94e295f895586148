use std::sync::{Arc, LazyLock};
use std::thread;

use parking_lot::{Mutex, RwLock};
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::carray::CompressionParams;
use crate::eval::{Backend, OutFlavor};

/// Process-wide defaults read by columns and the evaluator at call time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Worker threads used to compress the chunks completed by one append.
    pub nthreads: usize,
    /// Evaluator backend used when a call does not pick one.
    pub backend: Backend,
    /// Container for elementwise results when a call does not pick one.
    pub out_flavor: OutFlavor,
    /// Compression for columns created without explicit parameters.
    pub cparams: CompressionParams,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            nthreads: thread::available_parallelism().map_or(1, |n| n.get()),
            backend: Backend::Compiled,
            out_flavor: OutFlavor::Column,
            cparams: CompressionParams::default(),
        }
    }
}

static CONFIG: LazyLock<RwLock<Config>> = LazyLock::new(|| RwLock::new(Config::default()));

static POOL: LazyLock<Mutex<Option<(usize, Arc<ThreadPool>)>>> =
    LazyLock::new(|| Mutex::new(None));

/// A snapshot of the current configuration.
pub fn config() -> Config {
    CONFIG.read().clone()
}

/// Replace the whole configuration.
pub fn set_config(config: Config) {
    *CONFIG.write() = config;
}

/// Set the worker thread count, returning the previous one.
pub fn set_nthreads(nthreads: usize) -> usize {
    let mut config = CONFIG.write();
    std::mem::replace(&mut config.nthreads, nthreads.max(1))
}

/// The pool sized by [`Config::nthreads`], or `None` when work should run on the caller.
pub(crate) fn thread_pool() -> Option<Arc<ThreadPool>> {
    let nthreads = CONFIG.read().nthreads;
    if nthreads <= 1 {
        return None;
    }
    let mut pool = POOL.lock();
    if let Some((size, existing)) = pool.as_ref() {
        if *size == nthreads {
            return Some(existing.clone());
        }
    }
    match ThreadPoolBuilder::new().num_threads(nthreads).build() {
        Ok(built) => {
            let built = Arc::new(built);
            *pool = Some((nthreads, built.clone()));
            Some(built)
        }
        Err(err) => {
            log::warn!("failed to build a pool of {nthreads} threads, compressing serially: {err}");
            None
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert!(config.nthreads >= 1);
        assert_eq!(config.backend, Backend::Compiled);
        assert_eq!(config.out_flavor, OutFlavor::Column);
        assert_eq!(config.cparams, CompressionParams::new(5, true).unwrap());
    }

    #[test]
    fn single_thread_has_no_pool() {
        let previous = set_nthreads(1);
        assert!(thread_pool().is_none());
        set_nthreads(previous);
    }
}
