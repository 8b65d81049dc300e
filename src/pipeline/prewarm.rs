//! Background pipeline pre-warming.

use std::{
    io,
    sync::Arc,
    thread::{self, JoinHandle},
};

use super::{PipelineCache, PipelineCompiler, PipelineKey};

/// Name of the pre-warm worker thread.
pub const PREWARM_THREAD_NAME: &str = "pipeline-prewarm";

/// Compiles a list of pipelines into a shared cache on a worker thread.
///
/// Results go through the cache's mutex, so the render thread either finds
/// a finished pipeline or compiles it itself; it never sees a partial one.
pub struct PipelinePrewarmer {
    handle: JoinHandle<usize>,
}

impl PipelinePrewarmer {
    /// Start compiling `keys` in order.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the thread cannot be spawned.
    pub fn spawn<C>(
        cache: Arc<PipelineCache<C>>,
        keys: Vec<PipelineKey>,
    ) -> io::Result<Self>
    where
        C: PipelineCompiler + 'static,
    {
        let handle = thread::Builder::new()
            .name(PREWARM_THREAD_NAME.to_owned())
            .spawn(move || {
                let mut compiled = 0;
                for key in &keys {
                    match cache.get_or_compile(key) {
                        Ok(_) => compiled += 1,
                        Err(e) => log::warn!("pre-warm of {key} failed: {e}"),
                    }
                }
                log::debug!("pre-warmed {compiled}/{} pipelines", keys.len());
                compiled
            })?;
        Ok(Self { handle })
    }

    /// Whether the worker has finished.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the worker and return how many pipelines are available
    /// from the pre-warm list. A panicked worker counts as zero.
    pub fn join(self) -> usize {
        self.handle.join().unwrap_or_else(|_| {
            log::warn!("pipeline pre-warm thread panicked");
            0
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::pipeline::{
        cache::tests::CountingCompiler, Program, Specialization,
    };

    #[test]
    fn prewarmed_pipelines_are_cache_hits() {
        let cache = Arc::new(PipelineCache::new(CountingCompiler::default()));
        let keys: Vec<_> = Program::ALL
            .into_iter()
            .map(|p| PipelineKey::new(p, Specialization::new()))
            .collect();

        let prewarm =
            PipelinePrewarmer::spawn(Arc::clone(&cache), keys.clone()).unwrap();
        assert_eq!(prewarm.join(), Program::ALL.len());

        for key in &keys {
            assert!(!cache.requires_compilation(key.name, &key.specialization));
            let _ = cache.get_or_compile(key).unwrap();
        }
        assert_eq!(
            cache.compiler().calls.load(Ordering::SeqCst),
            Program::ALL.len()
        );
    }

    #[test]
    fn failed_prewarm_is_skipped() {
        let cache = Arc::new(PipelineCache::new(CountingCompiler {
            fail_on: Some("present"),
            ..Default::default()
        }));
        let keys = vec![
            PipelineKey::new(Program::Present, Specialization::new()),
            PipelineKey::new(Program::Upscale, Specialization::new()),
        ];
        let prewarm = PipelinePrewarmer::spawn(Arc::clone(&cache), keys).unwrap();
        assert_eq!(prewarm.join(), 1);
        assert_eq!(cache.len(), 1);
    }
}
