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

use std::{fmt::Debug, sync::Arc, time::Instant};

use itertools::Itertools;
use objcache_common::{
    clock::Clock,
    code::{CacheDescription, KeySet, Value},
    error::Result,
    event::Event,
    metrics::model::Metrics,
};
use objcache_memory::GeneralCache;

use crate::{config::CoordinatorConfig, lock::LockManager, session::CacheSession, shared::SharedStore};

pub(crate) struct CoordinatorInner<D, V>
where
    D: CacheDescription,
    V: Value,
{
    pub config: CoordinatorConfig,
    pub cache: GeneralCache<D, V>,
    pub lock_manager: Arc<dyn LockManager>,
    pub store: Arc<dyn SharedStore>,
    pub clock: Arc<dyn Clock>,
    pub metrics: Arc<Metrics>,
}

/// The process-wide entry point of the object cache.
///
/// The coordinator owns the committed objects and the collaborators shared by every caller. Callers work through a
/// [`CacheSession`] obtained with [`CacheCoordinator::session`].
///
/// Cloning is cheap and clones share everything.
pub struct CacheCoordinator<D, V>
where
    D: CacheDescription,
    V: Value,
{
    inner: Arc<CoordinatorInner<D, V>>,
}

impl<D, V> Clone for CacheCoordinator<D, V>
where
    D: CacheDescription,
    V: Value,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<D, V> Debug for CacheCoordinator<D, V>
where
    D: CacheDescription,
    V: Value,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheCoordinator")
            .field("config", &self.inner.config)
            .field("cache", &self.inner.cache)
            .field("lock_manager", &self.inner.lock_manager)
            .field("store", &self.inner.store)
            .finish()
    }
}

impl<D, V> CacheCoordinator<D, V>
where
    D: CacheDescription,
    V: Value,
{
    pub(crate) fn new(inner: CoordinatorInner<D, V>) -> Self {
        Self { inner: Arc::new(inner) }
    }

    /// Open a session for the calling flow of control.
    ///
    /// Transactions live inside the session, so a session must not be shared by concurrent flows.
    pub fn session(&self) -> CacheSession<D, V> {
        CacheSession::new(self.clone())
    }

    /// Remove every committed object whose expiration time is at or before `at`.
    ///
    /// Returns the count of removed objects.
    pub fn expire_objects(&self, at: u64) -> usize {
        self.inner.cache.expire(at)
    }

    /// The committed objects.
    pub fn cache(&self) -> &GeneralCache<D, V> {
        &self.inner.cache
    }

    /// Config of the coordinator.
    pub fn config(&self) -> &CoordinatorConfig {
        &self.inner.config
    }

    /// Current time of the coordinator clock, in milliseconds.
    pub fn now(&self) -> u64 {
        self.inner.clock.now()
    }

    /// Metrics of the coordinator.
    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.inner.metrics
    }

    pub(crate) fn lock_names<'a>(&self, keys: impl IntoIterator<Item = &'a String>) -> Vec<String> {
        keys.into_iter()
            .map(|key| format!("{}{key}", self.inner.config.lock_prefix))
            .collect_vec()
    }

    pub(crate) fn enter_locks(&self, read: &[String], write: &[String]) -> Result<()> {
        if read.is_empty() && write.is_empty() {
            return Ok(());
        }
        let now = Instant::now();
        self.inner.lock_manager.enter_locks(read, write)?;
        self.inner
            .metrics
            .lock_wait_duration
            .record(now.elapsed().as_secs_f64());
        tracing::debug!("[coordinator]: entered locks, read: {read:?}, write: {write:?}");
        Ok(())
    }

    /// Release write locks first, then read locks.
    ///
    /// Both releases are attempted. The first error is returned.
    pub(crate) fn leave_locks(&self, read: &[String], write: &[String]) -> Result<()> {
        let mut res = Ok(());
        if !write.is_empty() {
            res = self.inner.lock_manager.leave_locks(&[], write);
        }
        if !read.is_empty() {
            let r = self.inner.lock_manager.leave_locks(read, &[]);
            res = res.and(r);
        }
        tracing::debug!("[coordinator]: left locks, read: {read:?}, write: {write:?}");
        res
    }

    pub(crate) fn enter_critical_sections(&self, names: &[String]) -> Result<()> {
        if names.is_empty() {
            return Ok(());
        }
        let now = Instant::now();
        self.inner.lock_manager.enter_critical_sections(names)?;
        self.inner
            .metrics
            .lock_wait_duration
            .record(now.elapsed().as_secs_f64());
        Ok(())
    }

    pub(crate) fn leave_critical_sections(&self, names: &[String]) -> Result<()> {
        if names.is_empty() {
            return Ok(());
        }
        self.inner.lock_manager.leave_critical_sections(names)
    }

    /// Look up a committed object, checking its expiration and the invalidation timestamps written by every process.
    ///
    /// A valid hit re-applies the policy of the description.
    #[cfg_attr(feature = "tracing", fastrace::trace(name = "objcache::coordinator::lookup_global"))]
    pub(crate) fn lookup_global(&self, description: &D, lookup_time: u64) -> Result<Option<V>> {
        let res = self.lookup_global_inner(description, lookup_time);
        match res {
            Ok(Some(_)) => self.inner.metrics.cache_hit.increase(1),
            Ok(None) => self.inner.metrics.cache_miss.increase(1),
            Err(_) => {}
        }
        res
    }

    fn lookup_global_inner(&self, description: &D, lookup_time: u64) -> Result<Option<V>> {
        let Some(entry) = self.inner.cache.get(description) else {
            return Ok(None);
        };

        if entry.expire_at().is_some_and(|at| at <= lookup_time) {
            tracing::debug!("[coordinator]: {description:?} expired at {:?}", entry.expire_at());
            self.inner.cache.evict(&entry, Event::Expire);
            return Ok(None);
        }

        for key in entry.keys() {
            let name = format!("{}{key}", self.inner.config.store_prefix);
            let invalidated_at = self.inner.store.read_timestamp(&name)?.unwrap_or_default();
            if invalidated_at != 0 && invalidated_at >= entry.created_at() {
                tracing::debug!(
                    "[coordinator]: {description:?} created at {} is stale, key {key} invalidated at {invalidated_at}",
                    entry.created_at()
                );
                self.inner.cache.evict(&entry, Event::Stale);
                return Ok(None);
            }
        }

        let expire_at = match self.inner.config.sliding_expiration {
            true => description.expiration_time(lookup_time),
            false => entry.expire_at(),
        };
        if !self
            .inner
            .cache
            .validate(&entry, expire_at, description.object_class())
        {
            // Left the cache while its timestamps were being read.
            return Ok(None);
        }
        Ok(Some(entry.into_value()))
    }

    /// Commit an object to the global table with the policy of its description.
    pub(crate) fn save_global(&self, description: D, value: V, created_at: u64) {
        let expire_at = description.expiration_time(created_at);
        tracing::debug!("[coordinator]: save {description:?}, created at {created_at}, expire at {expire_at:?}");
        self.inner.cache.insert(description, value, created_at, expire_at);
    }

    /// Invalidate `keys` in every process: publish the invalidation timestamps, then drop the local dependents.
    ///
    /// Local dependents are dropped even if publishing fails. The first store error is returned.
    #[cfg_attr(feature = "tracing", fastrace::trace(name = "objcache::coordinator::perform_invalidation"))]
    pub(crate) fn perform_invalidation(&self, keys: &KeySet) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let now = self.inner.clock.now();
        let mut res = Ok(());
        for key in keys {
            let name = format!("{}{key}", self.inner.config.store_prefix);
            if let Err(e) = self.inner.store.write_timestamp(&name, now) {
                tracing::error!("[coordinator]: publish invalidation of key {key} failed: {e}");
                res = res.and(Err(e));
            }
        }
        let count = self.inner.cache.invalidate(keys.iter().map(|key| key.as_str()));
        tracing::debug!("[coordinator]: invalidated keys {keys:?} at {now}, {count} objects dropped");
        res
    }
}
