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

use objcache_common::{code::KeySet, strict_assert};

use crate::slab::{Slab, Token};

/// Neighbours of a record in one doubly linked chain.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    prev: Option<Token>,
    next: Option<Token>,
}

impl Link {
    /// The next record in the chain.
    pub fn next(&self) -> Option<Token> {
        self.next
    }
}

/// A committed cache entry.
///
/// The record is owned by the slab of the general cache. The LRU list and the expiration chain refer to it by token.
#[derive(Debug)]
pub struct Record<D, V> {
    pub(crate) description: D,
    pub(crate) value: V,
    pub(crate) keys: KeySet,
    pub(crate) created_at: u64,

    /// Maintained by the expiration order.
    pub(crate) expire_at: Option<u64>,
    /// Maintained by the LRU class tracker.
    pub(crate) class: Option<String>,

    pub(crate) lru: Link,
    pub(crate) chain: Link,
}

impl<D, V> Record<D, V> {
    /// Create a record that belongs to no LRU class and never expires.
    pub fn new(description: D, value: V, keys: KeySet, created_at: u64) -> Self {
        Self {
            description,
            value,
            keys,
            created_at,
            expire_at: None,
            class: None,
            lru: Link::default(),
            chain: Link::default(),
        }
    }

    /// Description of the record.
    pub fn description(&self) -> &D {
        &self.description
    }

    /// Cached object of the record.
    pub fn value(&self) -> &V {
        &self.value
    }

    /// Invalidation keys of the record.
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

    /// Name of the LRU class the record belongs to.
    pub fn class(&self) -> Option<&str> {
        self.class.as_deref()
    }
}

pub(crate) type Accessor<D, V> = fn(&mut Record<D, V>) -> &mut Link;

/// Head and tail of a doubly linked chain of records.
///
/// Callers track chain membership themselves: unlinking a record that is not a member corrupts the chain.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct Chain {
    head: Option<Token>,
    tail: Option<Token>,
    len: usize,
}

impl Chain {
    pub fn head(&self) -> Option<Token> {
        self.head
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn push_back<D, V>(&mut self, slab: &mut Slab<Record<D, V>>, token: Token, link: Accessor<D, V>) {
        strict_assert!(slab.contains(token), "push a dead token {token:?} into a chain");
        let tail = self.tail;
        let Some(record) = slab.get_mut(token) else {
            return;
        };
        *link(record) = Link { prev: tail, next: None };

        match tail.and_then(|tail| slab.get_mut(tail)) {
            Some(record) => link(record).next = Some(token),
            None => self.head = Some(token),
        }
        self.tail = Some(token);
        self.len += 1;
    }

    pub fn unlink<D, V>(&mut self, slab: &mut Slab<Record<D, V>>, token: Token, link: Accessor<D, V>) {
        strict_assert!(slab.contains(token), "unlink a dead token {token:?} from a chain");
        let Some(record) = slab.get_mut(token) else {
            return;
        };
        let Link { prev, next } = std::mem::take(link(record));

        match prev.and_then(|prev| slab.get_mut(prev)) {
            Some(record) => link(record).next = next,
            None => self.head = next,
        }
        match next.and_then(|next| slab.get_mut(next)) {
            Some(record) => link(record).prev = prev,
            None => self.tail = prev,
        }

        strict_assert!(self.len > 0);
        self.len -= 1;
    }
}
