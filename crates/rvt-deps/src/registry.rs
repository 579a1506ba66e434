//! Scoped installation of resolution strategies.
//!
//! A strategy is installed for the duration of one assembly's run and
//! removed when its `ResolverSubscription` drops, whether the run returned
//! normally, failed, or panicked. The framework collaborator consults the
//! registry whenever it needs to load a dependency.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crate::loader::LoadedAssembly;

/// Something that can turn an assembly name into a loaded assembly.
pub trait ResolveStrategy: Send + Sync {
    fn resolve(&self, name: &str) -> Option<LoadedAssembly>;
}

#[derive(Default)]
struct RegistryState {
    next_id: u64,
    strategies: Vec<(u64, Arc<dyn ResolveStrategy>)>,
}

/// Installed strategies, asked in installation order.
#[derive(Default)]
pub struct ResolverRegistry {
    state: Mutex<RegistryState>,
}

impl std::fmt::Debug for ResolverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolverRegistry")
            .field("installed", &self.len())
            .finish()
    }
}

impl ResolverRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Install `strategy` until the returned subscription drops.
    pub fn subscribe(self: &Arc<Self>, strategy: Arc<dyn ResolveStrategy>) -> ResolverSubscription {
        let mut state = self.lock();
        state.next_id += 1;
        let id = state.next_id;
        state.strategies.push((id, strategy));
        ResolverSubscription {
            registry: Arc::downgrade(self),
            id,
        }
    }

    /// Ask each installed strategy in turn; the first hit wins.
    ///
    /// The strategy list is snapshotted first, so no strategy runs while
    /// the registry lock is held.
    pub fn resolve(&self, name: &str) -> Option<LoadedAssembly> {
        let snapshot: Vec<Arc<dyn ResolveStrategy>> = self
            .lock()
            .strategies
            .iter()
            .map(|(_, strategy)| Arc::clone(strategy))
            .collect();
        snapshot.iter().find_map(|strategy| strategy.resolve(name))
    }

    pub fn len(&self) -> usize {
        self.lock().strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn unsubscribe(&self, id: u64) {
        self.lock().strategies.retain(|(existing, _)| *existing != id);
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Keeps a strategy installed; uninstalls it on drop.
#[must_use = "the resolver is uninstalled as soon as the subscription drops"]
#[derive(Debug)]
pub struct ResolverSubscription {
    registry: Weak<ResolverRegistry>,
    id: u64,
}

impl Drop for ResolverSubscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.unsubscribe(self.id);
        }
    }
}
