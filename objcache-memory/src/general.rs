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

use std::{fmt::Debug, sync::Arc};

use itertools::Itertools;
use objcache_common::{
    code::{CacheDescription, KeySet, ObjectClass, Value},
    event::{Event, EventListener},
    metrics::model::Metrics,
    scope::Scope,
    strict_assert,
};
use parking_lot::Mutex;

use crate::{
    expiration::ExpirationOrder,
    index::InvalidationIndex,
    lru::LruClassTracker,
    record::Record,
    slab::{Slab, Token},
    table::ObjectTable,
};

/// A snapshot of a committed entry, taken under the cache mutex.
///
/// The snapshot remembers which entry it was taken from, so [`GeneralCache::validate`] and [`GeneralCache::evict`]
/// never act on a newer entry that replaced it in the meantime.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    token: Token,
    value: V,
    keys: KeySet,
    created_at: u64,
    expire_at: Option<u64>,
}

impl<V> CacheEntry<V> {
    /// Cached object.
    pub fn value(&self) -> &V {
        &self.value
    }

    /// Take the cached object.
    pub fn into_value(self) -> V {
        self.value
    }

    /// Invalidation keys of the entry.
    pub fn keys(&self) -> &KeySet {
        &self.keys
    }

    /// Creation timestamp in milliseconds.
    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    /// Expiration timestamp in milliseconds.
    pub fn expire_at(&self) -> Option<u64> {
        self.expire_at
    }
}

/// Bookkeeping of a committed entry, without the object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    /// Invalidation keys of the entry.
    pub keys: KeySet,
    /// Creation timestamp in milliseconds.
    pub created_at: u64,
    /// Expiration timestamp in milliseconds.
    pub expire_at: Option<u64>,
    /// LRU class of the entry.
    pub class: Option<String>,
}

struct State<D, V> {
    slab: Slab<Record<D, V>>,
    table: ObjectTable<D>,
    index: InvalidationIndex,
    lru: LruClassTracker,
    expiration: ExpirationOrder,
}

impl<D, V> Default for State<D, V> {
    fn default() -> Self {
        Self {
            slab: Slab::new(),
            table: ObjectTable::default(),
            index: InvalidationIndex::default(),
            lru: LruClassTracker::default(),
            expiration: ExpirationOrder::default(),
        }
    }
}

impl<D, V> State<D, V>
where
    D: CacheDescription,
    V: Value,
{
    /// Remove the entry from every structure.
    ///
    /// Idempotent: a token of an entry that is already gone is ignored.
    fn destroy(&mut self, token: Token, reason: Event, garbages: &mut Vec<(Event, Record<D, V>)>) {
        if !self.slab.contains(token) {
            return;
        }

        self.lru.remove(&mut self.slab, token);
        self.expiration.remove(&mut self.slab, token);

        let Some(record) = self.slab.remove(token) else {
            return;
        };
        strict_assert!(record.class.is_none());
        strict_assert!(record.expire_at.is_none());

        self.index.deindex(token, &record.keys);
        let removed = self.table.remove(&record.description, token);
        strict_assert!(removed);

        garbages.push((reason, record));
    }

    fn apply_policy(
        &mut self,
        token: Token,
        expire_at: Option<u64>,
        class: Option<&ObjectClass>,
        garbages: &mut Vec<(Event, Record<D, V>)>,
    ) {
        match expire_at {
            Some(at) => self.expiration.insert(&mut self.slab, token, at),
            None => self.expiration.remove(&mut self.slab, token),
        }
        match class {
            Some(class) => {
                for evicted in self.lru.touch(&mut self.slab, token, class) {
                    self.destroy(evicted, Event::Evict, garbages);
                }
            }
            None => self.lru.remove(&mut self.slab, token),
        }
    }

    fn resolve(&self, token: Token) -> Option<&Record<D, V>> {
        self.slab.get(token)
    }
}

/// The process-wide committed object cache.
///
/// Combines the object table, the invalidation index, the LRU class tracker and the expiration order. All structural
/// mutations are serialized by one mutex. Removed objects are dropped and reported to the event listener after the
/// mutex is released.
pub struct GeneralCache<D, V>
where
    D: CacheDescription,
    V: Value,
{
    state: Mutex<State<D, V>>,
    metrics: Arc<Metrics>,
    event_listener: Option<Arc<dyn EventListener<Description = D, Value = V>>>,
}

impl<D, V> Debug for GeneralCache<D, V>
where
    D: CacheDescription,
    V: Value,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneralCache").field("len", &self.len()).finish()
    }
}

impl<D, V> GeneralCache<D, V>
where
    D: CacheDescription,
    V: Value,
{
    /// Create an empty cache.
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self {
            state: Mutex::new(State::default()),
            metrics,
            event_listener: None,
        }
    }

    /// Set the listener notified for every entry that leaves the cache.
    pub fn with_event_listener(mut self, event_listener: Arc<dyn EventListener<Description = D, Value = V>>) -> Self {
        self.event_listener = Some(event_listener);
        self
    }

    /// Get a snapshot of the entry of `description`.
    ///
    /// No validity check and no policy is applied.
    #[cfg_attr(feature = "tracing", fastrace::trace(name = "objcache::memory::general::get"))]
    pub fn get(&self, description: &D) -> Option<CacheEntry<V>> {
        let state = self.state.lock();
        let token = state.table.get(description)?;
        let record = state.resolve(token)?;
        Some(CacheEntry {
            token,
            value: record.value.clone(),
            keys: record.keys.clone(),
            created_at: record.created_at,
            expire_at: record.expire_at,
        })
    }

    /// Commit an object to the cache and apply the policy of its description.
    ///
    /// An existing entry of the same description is destroyed first. Descriptions without invalidation keys are never
    /// cached, and `false` is returned for them.
    #[cfg_attr(feature = "tracing", fastrace::trace(name = "objcache::memory::general::insert"))]
    pub fn insert(&self, description: D, value: V, created_at: u64, expire_at: Option<u64>) -> bool {
        let Some(keys) = description.invalidation_keys().cloned() else {
            return false;
        };
        let class = description.object_class().cloned();

        let mut garbages = vec![];
        self.state.lock().with(|mut state| {
            if let Some(old) = state.table.get(&description) {
                state.destroy(old, Event::Replace, &mut garbages);
            }

            let token = state
                .slab
                .insert(Record::new(description.clone(), value, keys.clone(), created_at));
            state.index.index(token, &keys);
            let replaced = state.table.put(description, token);
            strict_assert!(replaced.is_none());

            state.apply_policy(token, expire_at, class.as_ref(), &mut garbages);
            self.metrics.cache_usage.absolute(state.slab.len() as _);
        });
        self.metrics.cache_insert.increase(1);

        self.release(garbages);
        true
    }

    /// Re-apply the policy of a hit entry: reschedule its expiration and make it the most recent member of its class.
    ///
    /// Returns `false` if the entry has left the cache since the snapshot was taken.
    #[cfg_attr(feature = "tracing", fastrace::trace(name = "objcache::memory::general::validate"))]
    pub fn validate(&self, entry: &CacheEntry<V>, expire_at: Option<u64>, class: Option<&ObjectClass>) -> bool {
        let mut garbages = vec![];
        let alive = self.state.lock().with(|mut state| {
            if !state.slab.contains(entry.token) {
                return false;
            }
            state.apply_policy(entry.token, expire_at, class, &mut garbages);
            self.metrics.cache_usage.absolute(state.slab.len() as _);
            true
        });
        self.release(garbages);
        alive
    }

    /// Destroy the entry of the snapshot with the given reason.
    ///
    /// Returns `false` if the entry has already left the cache.
    #[cfg_attr(feature = "tracing", fastrace::trace(name = "objcache::memory::general::evict"))]
    pub fn evict(&self, entry: &CacheEntry<V>, reason: Event) -> bool {
        let mut garbages = vec![];
        self.state.lock().with(|mut state| {
            state.destroy(entry.token, reason, &mut garbages);
            self.metrics.cache_usage.absolute(state.slab.len() as _);
        });
        let evicted = !garbages.is_empty();
        self.release(garbages);
        evicted
    }

    /// Destroy every entry that depends on any of `keys`.
    ///
    /// Returns the count of destroyed entries.
    #[cfg_attr(feature = "tracing", fastrace::trace(name = "objcache::memory::general::invalidate"))]
    pub fn invalidate<'a>(&self, keys: impl IntoIterator<Item = &'a str>) -> usize {
        let mut garbages = vec![];
        self.state.lock().with(|mut state| {
            for key in keys {
                for token in state.index.invalidate(key) {
                    state.destroy(token, Event::Invalidate, &mut garbages);
                }
            }
            self.metrics.cache_usage.absolute(state.slab.len() as _);
        });
        let count = garbages.len();
        if count > 0 {
            tracing::debug!("[general]: invalidated {count} entries");
        }
        self.release(garbages);
        count
    }

    /// Destroy every entry whose expiration time is at or before `at`.
    ///
    /// Returns the count of destroyed entries.
    #[cfg_attr(feature = "tracing", fastrace::trace(name = "objcache::memory::general::expire"))]
    pub fn expire(&self, at: u64) -> usize {
        let mut garbages = vec![];
        self.state.lock().with(|mut state| {
            let state = &mut *state;
            while let Some(token) = state.expiration.pop_expired(&mut state.slab, at) {
                state.destroy(token, Event::Expire, &mut garbages);
            }
            self.metrics.cache_usage.absolute(state.slab.len() as _);
        });
        let count = garbages.len();
        if count > 0 {
            tracing::debug!("[general]: expired {count} entries at {at}");
        }
        self.release(garbages);
        count
    }

    /// Remove the entry of `description` and return its object.
    #[cfg_attr(feature = "tracing", fastrace::trace(name = "objcache::memory::general::remove"))]
    pub fn remove(&self, description: &D) -> Option<V> {
        let mut garbages = vec![];
        self.state.lock().with(|mut state| {
            if let Some(token) = state.table.get(description) {
                state.destroy(token, Event::Remove, &mut garbages);
            }
            self.metrics.cache_usage.absolute(state.slab.len() as _);
        });
        let value = garbages.first().map(|(_, record)| record.value.clone());
        self.release(garbages);
        value
    }

    /// Count of committed entries.
    pub fn len(&self) -> usize {
        self.state.lock().slab.len()
    }

    /// Returns `true` if there is no committed entry.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if `description` has a committed entry.
    pub fn contains(&self, description: &D) -> bool {
        self.state.lock().table.get(description).is_some()
    }

    /// Bookkeeping of the entry of `description`.
    pub fn info(&self, description: &D) -> Option<EntryInfo> {
        let state = self.state.lock();
        let record = state.resolve(state.table.get(description)?)?;
        Some(EntryInfo {
            keys: record.keys.clone(),
            created_at: record.created_at,
            expire_at: record.expire_at,
            class: record.class.clone(),
        })
    }

    /// Count of entries indexed under the invalidation key.
    pub fn indexed_count(&self, key: &str) -> usize {
        self.state.lock().index.count(key)
    }

    /// Count of members of the LRU class.
    pub fn class_count(&self, class: &str) -> usize {
        self.state.lock().lru.count(class)
    }

    /// Descriptions of the members of the LRU class, least recent first.
    pub fn class_members(&self, class: &str) -> Vec<D> {
        let state = self.state.lock();
        state
            .lru
            .members(&state.slab, class)
            .into_iter()
            .filter_map(|token| state.resolve(token).map(|record| record.description.clone()))
            .collect_vec()
    }

    /// Count of entries scheduled to expire.
    pub fn expiring_count(&self) -> usize {
        self.state.lock().expiration.len()
    }

    /// Earliest scheduled expiration time.
    pub fn next_expiration(&self) -> Option<u64> {
        self.state.lock().expiration.next_expiration()
    }

    // Deallocate data out of the lock critical section.
    fn release(&self, garbages: Vec<(Event, Record<D, V>)>) {
        for (event, record) in garbages {
            self.metrics.record_leave(event);
            if let Some(listener) = self.event_listener.as_ref() {
                listener.on_leave(event, &record.description, &record.value);
            }
        }
    }
}
