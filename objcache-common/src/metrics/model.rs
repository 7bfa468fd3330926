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

use super::{registry::noop::NoopMetricsRegistry, BoxedCounter, BoxedGauge, BoxedHistogram, RegistryOps};
use crate::event::Event;

/// Metrics of one cache coordinator.
#[derive(Debug)]
pub struct Metrics {
    /* object cache metrics */
    /// Lookups that returned a valid object.
    pub cache_hit: BoxedCounter,
    /// Lookups that found nothing usable.
    pub cache_miss: BoxedCounter,
    /// New entries in the global table.
    pub cache_insert: BoxedCounter,
    /// Entries replaced by a newer entry with the same description.
    pub cache_replace: BoxedCounter,
    /// Entries removed by a local key invalidation.
    pub cache_invalidate: BoxedCounter,
    /// Entries removed because they expired.
    pub cache_expire: BoxedCounter,
    /// Entries removed by their LRU class bound.
    pub cache_evict: BoxedCounter,
    /// Entries removed because another process invalidated them.
    pub cache_stale: BoxedCounter,
    /// Entries removed explicitly.
    pub cache_remove: BoxedCounter,
    /// Objects built by the caller's executor.
    pub cache_build: BoxedCounter,

    /// Entries in the global table.
    pub cache_usage: BoxedGauge,

    /// Time spent building objects, in seconds.
    pub cache_build_duration: BoxedHistogram,

    /* transaction metrics */
    /// Transactions started.
    pub transaction_begin: BoxedCounter,
    /// Transactions committed.
    pub transaction_commit: BoxedCounter,
    /// Transactions rolled back.
    pub transaction_rollback: BoxedCounter,

    /* lock metrics */
    /// Time spent waiting for the lock manager, in seconds.
    pub lock_wait_duration: BoxedHistogram,
}

impl Metrics {
    /// Create a new metric with the given name.
    pub fn new(name: &str, registry: &dyn RegistryOps) -> Self {
        let objcache_cache_op_total =
            registry.register_counter_vec("objcache_cache_op_total", "objcache object cache operations", &[
                "name", "op",
            ]);
        let objcache_cache_usage =
            registry.register_gauge_vec("objcache_cache_usage", "objcache object cache entries", &["name"]);
        let objcache_cache_op_duration = registry.register_histogram_vec(
            "objcache_cache_op_duration",
            "objcache object cache operation durations",
            &["name", "op"],
        );

        let cache_hit = objcache_cache_op_total.counter(&[name, "hit"]);
        let cache_miss = objcache_cache_op_total.counter(&[name, "miss"]);
        let cache_insert = objcache_cache_op_total.counter(&[name, "insert"]);
        let cache_replace = objcache_cache_op_total.counter(&[name, "replace"]);
        let cache_invalidate = objcache_cache_op_total.counter(&[name, "invalidate"]);
        let cache_expire = objcache_cache_op_total.counter(&[name, "expire"]);
        let cache_evict = objcache_cache_op_total.counter(&[name, "evict"]);
        let cache_stale = objcache_cache_op_total.counter(&[name, "stale"]);
        let cache_remove = objcache_cache_op_total.counter(&[name, "remove"]);
        let cache_build = objcache_cache_op_total.counter(&[name, "build"]);

        let cache_usage = objcache_cache_usage.gauge(&[name]);

        let cache_build_duration = objcache_cache_op_duration.histogram(&[name, "build"]);

        let objcache_transaction_op_total = registry.register_counter_vec(
            "objcache_transaction_op_total",
            "objcache cache transaction operations",
            &["name", "op"],
        );

        let transaction_begin = objcache_transaction_op_total.counter(&[name, "begin"]);
        let transaction_commit = objcache_transaction_op_total.counter(&[name, "commit"]);
        let transaction_rollback = objcache_transaction_op_total.counter(&[name, "rollback"]);

        let objcache_lock_wait_duration = registry.register_histogram_vec(
            "objcache_lock_wait_duration",
            "objcache lock manager wait durations",
            &["name"],
        );

        let lock_wait_duration = objcache_lock_wait_duration.histogram(&[name]);

        Self {
            cache_hit,
            cache_miss,
            cache_insert,
            cache_replace,
            cache_invalidate,
            cache_expire,
            cache_evict,
            cache_stale,
            cache_remove,
            cache_build,
            cache_usage,
            cache_build_duration,
            transaction_begin,
            transaction_commit,
            transaction_rollback,
            lock_wait_duration,
        }
    }

    /// Build noop metrics.
    ///
    /// Normally only used for tests.
    pub fn noop() -> Self {
        Self::new("test", &NoopMetricsRegistry)
    }

    /// Record an entry leaving the cache.
    pub fn record_leave(&self, event: Event) {
        match event {
            Event::Invalidate => self.cache_invalidate.increase(1),
            Event::Expire => self.cache_expire.increase(1),
            Event::Evict => self.cache_evict.increase(1),
            Event::Stale => self.cache_stale.increase(1),
            Event::Replace => self.cache_replace.increase(1),
            Event::Remove => self.cache_remove.increase(1),
        }
    }
}
