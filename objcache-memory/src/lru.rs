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

use hashbrown::HashMap;
use objcache_common::{code::ObjectClass, strict_assert, strict_assert_eq};

use crate::{
    record::{Chain, Link, Record},
    slab::{Slab, Token},
};

fn lru_link<D, V>(record: &mut Record<D, V>) -> &mut Link {
    &mut record.lru
}

/// Per class recency lists with a maximum member count.
///
/// The head of each list is the least recently validated member.
#[derive(Debug, Default)]
pub struct LruClassTracker {
    classes: HashMap<String, Chain>,
}

impl LruClassTracker {
    /// Make `token` the most recent member of `class`, leaving its previous class if it differs.
    ///
    /// Returns the members pushed out of the class by the bound, oldest first. They are already unlinked and the
    /// caller is responsible for destroying them.
    pub fn touch<D, V>(&mut self, slab: &mut Slab<Record<D, V>>, token: Token, class: &ObjectClass) -> Vec<Token> {
        self.remove(slab, token);

        let Some(record) = slab.get_mut(token) else {
            return vec![];
        };
        record.class = Some(class.name().to_string());

        let chain = self.classes.entry_ref(class.name()).or_default();
        chain.push_back(slab, token, lru_link);

        let mut evicted = vec![];
        while chain.len() > class.max_count() {
            let Some(head) = chain.head() else {
                break;
            };
            chain.unlink(slab, head, lru_link);
            if let Some(record) = slab.get_mut(head) {
                record.class = None;
            }
            evicted.push(head);
        }
        if chain.is_empty() {
            self.classes.remove(class.name());
        }
        evicted
    }

    /// Remove `token` from its class, if it has one.
    pub fn remove<D, V>(&mut self, slab: &mut Slab<Record<D, V>>, token: Token) {
        let Some(name) = slab.get_mut(token).and_then(|record| record.class.take()) else {
            return;
        };
        strict_assert!(self.classes.contains_key(name.as_str()), "record of class {name} is not tracked");
        let Some(chain) = self.classes.get_mut(name.as_str()) else {
            return;
        };
        chain.unlink(slab, token, lru_link);
        if chain.is_empty() {
            self.classes.remove(name.as_str());
        }
    }

    /// Count of members of the class.
    pub fn count(&self, class: &str) -> usize {
        self.classes.get(class).map(|chain| chain.len()).unwrap_or_default()
    }

    /// Members of the class, least recent first.
    pub fn members<D, V>(&self, slab: &Slab<Record<D, V>>, class: &str) -> Vec<Token> {
        let mut res = vec![];
        let mut cursor = self.classes.get(class).and_then(|chain| chain.head());
        while let Some(token) = cursor {
            res.push(token);
            cursor = slab.get(token).and_then(|record| record.lru.next());
        }
        strict_assert_eq!(res.len(), self.count(class));
        res
    }
}
