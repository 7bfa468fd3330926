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

use hashbrown::{HashMap, HashSet};
use objcache_common::code::{intersects, CacheDescription, KeySet};

/// Private overlay of one open transaction.
///
/// Objects created inside the transaction stay here until the transaction commits. Keys invalidated inside the
/// transaction hide the matching objects of every outer scope from this transaction.
#[derive(Debug)]
pub(crate) struct TransactionScope<D, V> {
    parent: Option<String>,
    objects: HashMap<D, (V, KeySet)>,
    key_map: HashMap<String, HashSet<D>>,
    invalidated: KeySet,
    read_locks: KeySet,
    write_locks: KeySet,
}

pub(crate) enum Lookup<V> {
    Hit(V),
    /// The object is shadowed by a key invalidated in this scope.
    Invalidated,
    /// Unknown to this scope, ask the parent.
    Unknown,
}

impl<D, V> TransactionScope<D, V>
where
    D: CacheDescription,
    V: Clone,
{
    pub fn new(parent: Option<String>) -> Self {
        Self {
            parent,
            objects: HashMap::new(),
            key_map: HashMap::new(),
            invalidated: KeySet::new(),
            read_locks: KeySet::new(),
            write_locks: KeySet::new(),
        }
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn lookup(&self, description: &D) -> Lookup<V> {
        if let Some((value, _)) = self.objects.get(description) {
            return Lookup::Hit(value.clone());
        }
        match description.invalidation_keys() {
            Some(keys) if intersects(keys, &self.invalidated) => Lookup::Invalidated,
            _ => Lookup::Unknown,
        }
    }

    /// Save an object into the overlay. Descriptions without invalidation keys are ignored.
    pub fn save(&mut self, description: D, value: V) {
        let Some(keys) = description.invalidation_keys().cloned() else {
            return;
        };
        for key in keys.iter() {
            self.key_map
                .entry_ref(key.as_str())
                .or_default()
                .insert(description.clone());
        }
        self.objects.insert(description, (value, keys));
    }

    /// Record `keys` as invalidated and drop the overlay objects that depend on them.
    pub fn invalidate<'a>(&mut self, keys: impl IntoIterator<Item = &'a String>) {
        for key in keys {
            self.invalidated.insert(key.clone());
            let Some(descriptions) = self.key_map.remove(key.as_str()) else {
                continue;
            };
            for description in descriptions {
                let Some((_, keys)) = self.objects.remove(&description) else {
                    continue;
                };
                for other in keys.iter().filter(|other| *other != key) {
                    if let Some(set) = self.key_map.get_mut(other.as_str()) {
                        set.remove(&description);
                        if set.is_empty() {
                            self.key_map.remove(other.as_str());
                        }
                    }
                }
            }
        }
    }

    pub fn holds_read(&self, key: &str) -> bool {
        self.read_locks.contains(key)
    }

    pub fn holds_write(&self, key: &str) -> bool {
        self.write_locks.contains(key)
    }

    /// Record locks acquired for this scope. Returns the read and write locks the scope already held; each of them
    /// has been acquired twice and must be released once by the caller.
    pub fn add_locks(
        &mut self,
        read: impl IntoIterator<Item = String>,
        write: impl IntoIterator<Item = String>,
    ) -> (KeySet, KeySet) {
        let read: KeySet = read.into_iter().filter(|key| !self.read_locks.insert(key.clone())).collect();
        let write: KeySet = write.into_iter().filter(|key| !self.write_locks.insert(key.clone())).collect();
        (read, write)
    }

    /// Take everything the scope owns: objects, invalidated keys, read locks and write locks.
    pub fn into_parts(self) -> (Vec<(D, V)>, KeySet, KeySet, KeySet) {
        let objects = self
            .objects
            .into_iter()
            .map(|(description, (value, _))| (description, value))
            .collect();
        (objects, self.invalidated, self.read_locks, self.write_locks)
    }

    pub fn read_locks(&self) -> &KeySet {
        &self.read_locks
    }

    pub fn write_locks(&self) -> &KeySet {
        &self.write_locks
    }
}
