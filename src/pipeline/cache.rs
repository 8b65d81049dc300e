//! Memoizing pipeline cache.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex, OnceLock, PoisonError,
};

use rustc_hash::FxHashMap;

use super::{PipelineError, PipelineKey, Specialization};

/// Turns a [`PipelineKey`] into a compiled pipeline.
///
/// Implemented over a `wgpu::Device` by
/// [`WgpuPipelineCompiler`](super::WgpuPipelineCompiler); tests plug in a
/// counting compiler instead.
pub trait PipelineCompiler: Send + Sync {
    /// Compiled pipeline object.
    type Pipeline: Send + Sync;

    /// Compile the pipeline for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if the program is unknown or fails to
    /// compose or validate.
    fn compile(&self, key: &PipelineKey) -> Result<Self::Pipeline, PipelineError>;
}

/// One key's entry. `compiling` serializes compiles of this key only.
struct Entry<P> {
    ready: OnceLock<Arc<P>>,
    compiling: Mutex<()>,
}

impl<P> Default for Entry<P> {
    fn default() -> Self {
        Self {
            ready: OnceLock::new(),
            compiling: Mutex::new(()),
        }
    }
}

/// Pipelines compiled so far, keyed by name and specialization.
///
/// The map lock is only held to find or create a key's entry. Compiling
/// happens under that entry's own lock, so each key is compiled at most
/// once while lookups of other keys proceed. Failed compiles are not cached.
pub struct PipelineCache<C: PipelineCompiler> {
    compiler: C,
    entries: Mutex<FxHashMap<PipelineKey, Arc<Entry<C::Pipeline>>>>,
    compile_count: AtomicUsize,
}

impl<C: PipelineCompiler> PipelineCache<C> {
    /// Empty cache over `compiler`.
    pub fn new(compiler: C) -> Self {
        Self {
            compiler,
            entries: Mutex::new(FxHashMap::default()),
            compile_count: AtomicUsize::new(0),
        }
    }

    /// Pipeline for `(name, specialization)`, compiling it on first use.
    ///
    /// Repeated calls with an equal key return the same `Arc`.
    ///
    /// # Errors
    ///
    /// Propagates the compiler's [`PipelineError`].
    pub fn compile(
        &self,
        name: &'static str,
        specialization: &Specialization,
    ) -> Result<Arc<C::Pipeline>, PipelineError> {
        self.get_or_compile(&PipelineKey {
            name,
            specialization: specialization.clone(),
        })
    }

    /// Like [`PipelineCache::compile`] for a prebuilt key.
    ///
    /// # Errors
    ///
    /// Propagates the compiler's [`PipelineError`].
    pub fn get_or_compile(
        &self,
        key: &PipelineKey,
    ) -> Result<Arc<C::Pipeline>, PipelineError> {
        let entry = Arc::clone(
            self.entries
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .entry(key.clone())
                .or_default(),
        );
        if let Some(pipeline) = entry.ready.get() {
            return Ok(Arc::clone(pipeline));
        }

        let _compiling =
            entry.compiling.lock().unwrap_or_else(PoisonError::into_inner);
        // Another caller may have finished while we waited
        if let Some(pipeline) = entry.ready.get() {
            return Ok(Arc::clone(pipeline));
        }
        let pipeline = Arc::new(self.compiler.compile(key)?);
        let _ = self.compile_count.fetch_add(1, Ordering::Relaxed);
        log::debug!("compiled pipeline {key}");
        Ok(Arc::clone(entry.ready.get_or_init(|| pipeline)))
    }

    fn compiled(&self, key: &PipelineKey) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .is_some_and(|entry| entry.ready.get().is_some())
    }

    /// Whether `(name, specialization)` has no compiled pipeline yet.
    pub fn requires_compilation(
        &self,
        name: &'static str,
        specialization: &Specialization,
    ) -> bool {
        let key = PipelineKey {
            name,
            specialization: specialization.clone(),
        };
        !self.compiled(&key)
    }

    /// Successful compiles since creation.
    pub fn compile_count(&self) -> usize {
        self.compile_count.load(Ordering::Relaxed)
    }

    /// Number of cached pipelines.
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|entry| entry.ready.get().is_some())
            .count()
    }

    /// Whether nothing has been compiled yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The underlying compiler.
    pub fn compiler(&self) -> &C {
        &self.compiler
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::{sync::mpsc, time::Duration};

    use super::*;
    use crate::pipeline::{defs, Program};

    /// Compiler that records every call and fails on a chosen name.
    #[derive(Default)]
    pub(crate) struct CountingCompiler {
        pub calls: AtomicUsize,
        pub fail_on: Option<&'static str>,
    }

    impl PipelineCompiler for CountingCompiler {
        type Pipeline = PipelineKey;

        fn compile(&self, key: &PipelineKey) -> Result<PipelineKey, PipelineError> {
            let _ = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_on == Some(key.name) {
                return Err(PipelineError::UnknownProgram(key.name.to_owned()));
            }
            Ok(key.clone())
        }
    }

    #[test]
    fn compile_twice_returns_same_handle() {
        let cache = PipelineCache::new(CountingCompiler::default());
        let spec = Specialization::new().flag(defs::SHADOW_MAP, true);
        let a = cache.compile(Program::SphereImpostor.name(), &spec).unwrap();
        let b = cache.compile(Program::SphereImpostor.name(), &spec).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.compile_count(), 1);
        assert_eq!(cache.compiler().calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn requires_compilation_once_per_specialization() {
        let cache = PipelineCache::new(CountingCompiler::default());
        let name = Program::ShadowDepth.name();
        let specs = [
            Specialization::new(),
            Specialization::new().flag(defs::DEPTH_ONLY, true),
            Specialization::new()
                .flag(defs::SHADOW_MAP, true)
                .flag(defs::DEPTH_PRE_PASS, true),
        ];
        for spec in &specs {
            assert!(cache.requires_compilation(name, spec));
            let _ = cache.compile(name, spec).unwrap();
            assert!(!cache.requires_compilation(name, spec));
        }
        assert_eq!(cache.len(), 3);
        // Structurally equal specialization built in another order
        let reordered = Specialization::new()
            .flag(defs::DEPTH_PRE_PASS, true)
            .flag(defs::SHADOW_MAP, true);
        assert!(!cache.requires_compilation(name, &reordered));
    }

    #[test]
    fn failures_are_not_cached() {
        let cache = PipelineCache::new(CountingCompiler {
            fail_on: Some("present"),
            ..Default::default()
        });
        let spec = Specialization::new();
        assert!(cache.compile("present", &spec).is_err());
        assert!(cache.compile("present", &spec).is_err());
        assert!(cache.requires_compilation("present", &spec));
        assert_eq!(cache.compiler().calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.compile_count(), 0);
    }

    #[test]
    fn concurrent_callers_compile_once() {
        let cache = Arc::new(PipelineCache::new(CountingCompiler::default()));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    cache.compile("upscale", &Specialization::new()).unwrap()
                })
            })
            .collect();
        let results: Vec<_> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(results.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(cache.compile_count(), 1);
    }

    /// Compiler that parks on `"slow"` until released.
    struct GatedCompiler {
        started: Mutex<mpsc::Sender<()>>,
        release: Mutex<mpsc::Receiver<()>>,
    }

    impl PipelineCompiler for GatedCompiler {
        type Pipeline = PipelineKey;

        fn compile(&self, key: &PipelineKey) -> Result<PipelineKey, PipelineError> {
            if key.name == "slow" {
                self.started.lock().unwrap().send(()).unwrap();
                self.release.lock().unwrap().recv().unwrap();
            }
            Ok(key.clone())
        }
    }

    #[test]
    fn lookups_do_not_wait_behind_another_compile() {
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let cache = Arc::new(PipelineCache::new(GatedCompiler {
            started: Mutex::new(started_tx),
            release: Mutex::new(release_rx),
        }));
        let spec = Specialization::new();
        let fast = cache.compile("fast", &spec).unwrap();

        let slow = {
            let cache = Arc::clone(&cache);
            std::thread::spawn(move || {
                cache.compile("slow", &Specialization::new()).unwrap()
            })
        };
        started_rx.recv().unwrap();

        let (done_tx, done_rx) = mpsc::channel();
        {
            let cache = Arc::clone(&cache);
            let _ = std::thread::spawn(move || {
                let hit = cache.compile("fast", &Specialization::new());
                let pending = cache.requires_compilation("slow", &Specialization::new());
                done_tx.send((hit, pending)).unwrap();
            });
        }
        let (hit, pending) = done_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(Arc::ptr_eq(&hit.unwrap(), &fast));
        assert!(pending);
        assert_eq!(cache.len(), 1);

        release_tx.send(()).unwrap();
        let _ = slow.join().unwrap();
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.compile_count(), 2);
    }
}
