// Copyright 2026 foyer Project Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::sync::Arc;

use objcache_common::{
    clock::{Clock, SystemClock},
    code::{CacheDescription, Value},
    event::EventListener,
    metrics::{model::Metrics, registry::noop::NoopMetricsRegistry, RegistryOps},
};
use objcache_memory::GeneralCache;

use crate::{
    config::CoordinatorConfig,
    coordinator::{CacheCoordinator, CoordinatorInner},
    lock::{LocalLockManager, LockManager},
    shared::{MemorySharedStore, SharedStore},
};

/// Cache coordinator builder.
pub struct CacheCoordinatorBuilder<D, V>
where
    D: CacheDescription,
    V: Value,
{
    config: CoordinatorConfig,
    lock_manager: Option<Arc<dyn LockManager>>,
    store: Option<Arc<dyn SharedStore>>,
    clock: Option<Arc<dyn Clock>>,
    event_listener: Option<Arc<dyn EventListener<Description = D, Value = V>>>,
    registry: Box<dyn RegistryOps>,
}

impl<D, V> Default for CacheCoordinatorBuilder<D, V>
where
    D: CacheDescription,
    V: Value,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<D, V> CacheCoordinatorBuilder<D, V>
where
    D: CacheDescription,
    V: Value,
{
    /// Create a new cache coordinator builder.
    pub fn new() -> Self {
        Self {
            config: CoordinatorConfig::default(),
            lock_manager: None,
            store: None,
            clock: None,
            event_listener: None,
            registry: Box::new(NoopMetricsRegistry),
        }
    }

    /// Replace the whole config.
    pub fn with_config(mut self, config: CoordinatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the name of the coordinator.
    ///
    /// The name is used as the `name` label of the metrics.
    ///
    /// Default: `objcache`.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Set the prefix of the lock names.
    ///
    /// Default: `_Cache_`.
    pub fn with_lock_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.lock_prefix = prefix.into();
        self
    }

    /// Set the prefix of the invalidation timestamp keys.
    ///
    /// Default: `cache-`.
    pub fn with_store_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.store_prefix = prefix.into();
        self
    }

    /// Enable or disable sliding expiration.
    ///
    /// Default: enabled.
    pub fn with_sliding_expiration(mut self, enable: bool) -> Self {
        self.config.sliding_expiration = enable;
        self
    }

    /// Set the lock manager.
    ///
    /// Default: a [`LocalLockManager`], which only coordinates threads of this process.
    pub fn with_lock_manager(mut self, lock_manager: impl LockManager) -> Self {
        self.lock_manager = Some(Arc::new(lock_manager));
        self
    }

    /// Set the store of invalidation timestamps.
    ///
    /// Default: a [`MemorySharedStore`], which only reaches this process.
    pub fn with_shared_store(mut self, store: impl SharedStore) -> Self {
        self.store = Some(Arc::new(store));
        self
    }

    /// Set the clock.
    ///
    /// Default: [`SystemClock`].
    pub fn with_clock(mut self, clock: impl Clock) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    /// Set event listener.
    ///
    /// Default: No event listener installed.
    pub fn with_event_listener(mut self, event_listener: Arc<dyn EventListener<Description = D, Value = V>>) -> Self {
        self.event_listener = Some(event_listener);
        self
    }

    /// Set metrics registry.
    ///
    /// Default: [`NoopMetricsRegistry`].
    pub fn with_metrics_registry(mut self, registry: impl RegistryOps) -> Self {
        self.registry = Box::new(registry);
        self
    }

    /// Build the coordinator.
    pub fn build(self) -> CacheCoordinator<D, V> {
        let metrics = Arc::new(Metrics::new(&self.config.name, self.registry.as_ref()));

        let mut cache = GeneralCache::new(metrics.clone());
        if let Some(event_listener) = self.event_listener {
            cache = cache.with_event_listener(event_listener);
        }

        tracing::debug!("[coordinator builder]: build coordinator with config {:?}", self.config);

        CacheCoordinator::new(CoordinatorInner {
            config: self.config,
            cache,
            lock_manager: self
                .lock_manager
                .unwrap_or_else(|| Arc::new(LocalLockManager::new())),
            store: self.store.unwrap_or_else(|| Arc::new(MemorySharedStore::new())),
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            metrics,
        })
    }
}
