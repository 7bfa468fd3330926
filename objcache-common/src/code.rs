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

use std::{collections::BTreeSet, fmt::Debug, hash::Hash};

use serde::{Deserialize, Serialize};

/// A set of invalidation keys.
///
/// Ordered, so the lock requests derived from it are deterministic.
pub type KeySet = BTreeSet<String>;

/// Returns `true` if the two key sets share at least one key.
pub fn intersects(a: &KeySet, b: &KeySet) -> bool {
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    small.iter().any(|key| large.contains(key))
}

/// A named LRU class with a maximum member count.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectClass {
    name: String,
    max_count: usize,
}

impl ObjectClass {
    /// Create a class that keeps at most `max_count` members.
    pub fn new(name: impl Into<String>, max_count: usize) -> Self {
        Self {
            name: name.into(),
            max_count,
        }
    }

    /// Create a class whose members are tracked but never evicted for capacity.
    pub fn unbounded(name: impl Into<String>) -> Self {
        Self::new(name, usize::MAX)
    }

    /// Class name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Maximum member count.
    pub fn max_count(&self) -> usize {
        self.max_count
    }
}

/// Description of a cached object.
///
/// A description is both the identity of the object in the cache and its caching policy.
///
/// Equality and hashing MUST be value based and MUST cover everything that distinguishes two objects, otherwise
/// lookups silently return the wrong object. The cache cannot detect this.
pub trait CacheDescription: Send + Sync + 'static + Hash + Eq + Clone + Debug {
    /// Unique name of the object, used to serialize concurrent construction of the same object.
    fn critical_section_name(&self) -> &str;

    /// Invalidation keys the object depends on.
    ///
    /// `None` means the object is never cached and is built by every caller.
    fn invalidation_keys(&self) -> Option<&KeySet>;

    /// LRU class of the object, `None` for no class policy.
    fn object_class(&self) -> Option<&ObjectClass> {
        None
    }

    /// Expiration timestamp (in milliseconds) for an object validated at `now`, `None` for no expiration.
    #[expect(unused_variables)]
    fn expiration_time(&self, now: u64) -> Option<u64> {
        None
    }
}

/// Cached object trait.
///
/// Values are cloned out of the cache on every hit. Wrap expensive objects in an [`std::sync::Arc`] so the clone is
/// cheap and callers can compare identities.
pub trait Value: Send + Sync + 'static + Clone {}
impl<T: Send + Sync + 'static + Clone> Value for T {}

/// A general purpose [`CacheDescription`].
///
/// The time-to-live is relative to the validation time. Equality covers every field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BaseDescription {
    name: String,
    keys: Option<KeySet>,
    class: Option<ObjectClass>,
    ttl: Option<u64>,
}

impl BaseDescription {
    /// Create an uncacheable description.
    ///
    /// Add invalidation keys with [`BaseDescription::with_keys`] to make it cacheable.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            keys: None,
            class: None,
            ttl: None,
        }
    }

    /// Set the invalidation keys.
    pub fn with_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keys = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    /// Set the LRU class.
    pub fn with_class(mut self, class: ObjectClass) -> Self {
        self.class = Some(class);
        self
    }

    /// Set the time-to-live in milliseconds.
    pub fn with_ttl(mut self, ttl: u64) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

impl CacheDescription for BaseDescription {
    fn critical_section_name(&self) -> &str {
        &self.name
    }

    fn invalidation_keys(&self) -> Option<&KeySet> {
        self.keys.as_ref()
    }

    fn object_class(&self) -> Option<&ObjectClass> {
        self.class.as_ref()
    }

    fn expiration_time(&self, now: u64) -> Option<u64> {
        self.ttl.map(|ttl| now.saturating_add(ttl))
    }
}
