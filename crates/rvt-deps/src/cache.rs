//! At-most-once memoisation of assembly resolution.
//!
//! Locking: the name map is behind one mutex that is held only long enough
//! to fetch or insert the per-name cell. The resolution itself runs inside
//! that cell's `OnceLock`, so callers for different names never wait on
//! each other and concurrent callers for the same name wait for the first
//! one and share its outcome. A not-found outcome is cached like any other.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use crate::diagnostics::{emit, Diagnostic, DiagnosticSink};
use crate::loader::LoadedAssembly;

type Cell = Arc<OnceLock<Option<LoadedAssembly>>>;

/// Name → resolution outcome, computed at most once per name.
#[derive(Default)]
pub struct AssemblyResolutionCache {
    entries: Mutex<HashMap<String, Cell>>,
    diagnostics: Option<Arc<dyn DiagnosticSink>>,
}

impl std::fmt::Debug for AssemblyResolutionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssemblyResolutionCache")
            .field("entries", &self.len())
            .field("diagnostics", &self.diagnostics.is_some())
            .finish()
    }
}

impl AssemblyResolutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache that reports through `sink` unless a call supplies its own.
    pub fn with_diagnostics(sink: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            diagnostics: Some(sink),
        }
    }

    /// The process-wide cache.
    pub fn global() -> &'static AssemblyResolutionCache {
        static GLOBAL: OnceLock<AssemblyResolutionCache> = OnceLock::new();
        GLOBAL.get_or_init(AssemblyResolutionCache::new)
    }

    /// Return the cached outcome for `name`, running `resolve` only if the
    /// name has never been resolved.
    pub fn load_or_resolve<F>(&self, name: &str, resolve: F) -> Option<LoadedAssembly>
    where
        F: FnOnce() -> Option<LoadedAssembly>,
    {
        self.load_or_resolve_with(name, self.diagnostics.as_deref(), resolve)
    }

    /// Like `load_or_resolve`, reporting through `diagnostics` instead of
    /// the cache's own sink.
    pub fn load_or_resolve_with<F>(
        &self,
        name: &str,
        diagnostics: Option<&dyn DiagnosticSink>,
        resolve: F,
    ) -> Option<LoadedAssembly>
    where
        F: FnOnce() -> Option<LoadedAssembly>,
    {
        let cell = {
            let mut entries = self.lock();
            Arc::clone(entries.entry(name.to_lowercase()).or_default())
        };

        if let Some(outcome) = cell.get() {
            return outcome.clone();
        }

        cell.get_or_init(|| {
            emit(diagnostics, || Diagnostic::ResolutionAttempted {
                name: name.to_string(),
            });
            let outcome = resolve();
            emit(diagnostics, || match &outcome {
                Some(loaded) => Diagnostic::ResolutionSucceeded {
                    name: name.to_string(),
                    path: loaded.path.clone(),
                },
                None => Diagnostic::ResolutionFailed {
                    name: name.to_string(),
                },
            });
            outcome
        })
        .clone()
    }

    /// Cached outcome for `name`: `None` if never resolved, `Some(None)` if
    /// resolved as not found.
    pub fn get(&self, name: &str) -> Option<Option<LoadedAssembly>> {
        let cell = self.lock().get(&name.to_lowercase()).cloned()?;
        cell.get().cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Number of names with a settled outcome.
    pub fn len(&self) -> usize {
        self.lock().values().filter(|cell| cell.get().is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget every cached outcome.
    pub fn reset(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Cell>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::RecordingDiagnostics;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    fn found(name: &str) -> Option<LoadedAssembly> {
        Some(LoadedAssembly::from_path(format!("/bin/{}.dll", name)))
    }

    #[test]
    fn test_second_call_does_not_resolve_again() {
        let cache = AssemblyResolutionCache::new();
        let calls = AtomicUsize::new(0);
        let resolve = || {
            calls.fetch_add(1, Ordering::SeqCst);
            found("Foo")
        };

        let first = cache.load_or_resolve("Foo", resolve);
        let second = cache.load_or_resolve("Foo", || {
            calls.fetch_add(1, Ordering::SeqCst);
            None
        });

        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_not_found_is_cached_without_retry() {
        let cache = AssemblyResolutionCache::new();
        assert!(cache.load_or_resolve("Missing", || None).is_none());
        assert!(cache
            .load_or_resolve("Missing", || panic!("must not retry"))
            .is_none());
        assert_eq!(cache.get("Missing"), Some(None));
    }

    #[test]
    fn test_names_compare_case_insensitively() {
        let cache = AssemblyResolutionCache::new();
        cache.load_or_resolve("Foo", || found("Foo"));
        assert!(cache.load_or_resolve("FOO", || None).is_some());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_reset_allows_resolution_again() {
        let cache = AssemblyResolutionCache::new();
        cache.load_or_resolve("Foo", || None);
        cache.reset();
        assert!(cache.is_empty());
        assert!(cache.load_or_resolve("Foo", || found("Foo")).is_some());
    }

    #[test]
    fn test_diagnostics_report_attempt_and_outcome() {
        let sink = Arc::new(RecordingDiagnostics::new());
        let cache = AssemblyResolutionCache::with_diagnostics(sink.clone());
        cache.load_or_resolve("Foo", || found("Foo"));
        cache.load_or_resolve("Bar", || None);
        cache.load_or_resolve("Foo", || None);

        let diagnostics = sink.diagnostics();
        assert_eq!(diagnostics.len(), 4);
        assert!(matches!(diagnostics[0], Diagnostic::ResolutionAttempted { .. }));
        assert!(matches!(diagnostics[1], Diagnostic::ResolutionSucceeded { .. }));
        assert!(matches!(diagnostics[3], Diagnostic::ResolutionFailed { .. }));
    }

    #[test]
    fn test_concurrent_same_name_resolves_once() {
        let cache = Arc::new(AssemblyResolutionCache::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let calls = Arc::clone(&calls);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    cache.load_or_resolve("Shared", || {
                        calls.fetch_add(1, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(20));
                        found("Shared")
                    })
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap().is_some());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_different_names_do_not_block_each_other() {
        let cache = Arc::new(AssemblyResolutionCache::new());
        let (started_tx, started_rx) = std::sync::mpsc::channel();
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();

        let slow = {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                cache.load_or_resolve("Slow", || {
                    started_tx.send(()).unwrap();
                    release_rx.recv().unwrap();
                    found("Slow")
                })
            })
        };

        started_rx.recv().unwrap();
        // "Slow" is still resolving; "Fast" must not wait for it
        assert!(cache.load_or_resolve("Fast", || found("Fast")).is_some());
        release_tx.send(()).unwrap();
        assert!(slow.join().unwrap().is_some());
    }
}
