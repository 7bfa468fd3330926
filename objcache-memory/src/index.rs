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
use objcache_common::code::KeySet;

use crate::slab::Token;

/// Multimap from invalidation keys to the records that depend on them.
///
/// Empty buckets are pruned eagerly.
#[derive(Debug, Default)]
pub struct InvalidationIndex {
    buckets: HashMap<String, HashSet<Token>>,
}

impl InvalidationIndex {
    /// Index `token` under each of `keys`.
    pub fn index(&mut self, token: Token, keys: &KeySet) {
        for key in keys {
            self.buckets.entry_ref(key.as_str()).or_default().insert(token);
        }
    }

    /// Remove `token` from the bucket of each of `keys`.
    pub fn deindex(&mut self, token: Token, keys: &KeySet) {
        for key in keys {
            if let Some(bucket) = self.buckets.get_mut(key.as_str()) {
                bucket.remove(&token);
                if bucket.is_empty() {
                    self.buckets.remove(key.as_str());
                }
            }
        }
    }

    /// Take the whole bucket of `key`.
    pub fn invalidate(&mut self, key: &str) -> HashSet<Token> {
        self.buckets.remove(key).unwrap_or_default()
    }

    /// Count of records indexed under `key`.
    pub fn count(&self, key: &str) -> usize {
        self.buckets.get(key).map(|bucket| bucket.len()).unwrap_or_default()
    }

    /// Count of non-empty buckets.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Returns `true` if no record is indexed.
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}
