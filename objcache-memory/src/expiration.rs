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

use std::collections::BTreeMap;

use objcache_common::strict_assert;

use crate::{
    record::{Chain, Link, Record},
    slab::{Slab, Token},
};

fn chain_link<D, V>(record: &mut Record<D, V>) -> &mut Link {
    &mut record.chain
}

/// Records ordered by expiration time.
///
/// Records sharing the same expiration time are chained in insertion order.
#[derive(Debug, Default)]
pub struct ExpirationOrder {
    chains: BTreeMap<u64, Chain>,
    len: usize,
}

impl ExpirationOrder {
    /// Schedule `token` to expire at `at`, rescheduling it if it is already scheduled.
    pub fn insert<D, V>(&mut self, slab: &mut Slab<Record<D, V>>, token: Token, at: u64) {
        self.remove(slab, token);

        let Some(record) = slab.get_mut(token) else {
            return;
        };
        record.expire_at = Some(at);
        self.chains.entry(at).or_default().push_back(slab, token, chain_link);
        self.len += 1;
    }

    /// Unschedule `token`, if it is scheduled.
    pub fn remove<D, V>(&mut self, slab: &mut Slab<Record<D, V>>, token: Token) {
        let Some(at) = slab.get_mut(token).and_then(|record| record.expire_at.take()) else {
            return;
        };
        strict_assert!(self.chains.contains_key(&at));
        let Some(chain) = self.chains.get_mut(&at) else {
            return;
        };
        chain.unlink(slab, token, chain_link);
        if chain.is_empty() {
            self.chains.remove(&at);
        }
        self.len -= 1;
    }

    /// Unschedule and return the earliest record whose expiration time is at or before `at`.
    pub fn pop_expired<D, V>(&mut self, slab: &mut Slab<Record<D, V>>, at: u64) -> Option<Token> {
        let mut entry = self.chains.first_entry()?;
        if *entry.key() > at {
            return None;
        }

        let chain = entry.get_mut();
        let token = chain.head()?;
        chain.unlink(slab, token, chain_link);
        if chain.is_empty() {
            entry.remove();
        }
        if let Some(record) = slab.get_mut(token) {
            record.expire_at = None;
        }
        self.len -= 1;
        Some(token)
    }

    /// Earliest scheduled expiration time.
    pub fn next_expiration(&self) -> Option<u64> {
        self.chains.keys().next().copied()
    }

    /// Count of scheduled records.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if no record is scheduled.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
