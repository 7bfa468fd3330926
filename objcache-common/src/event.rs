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

use crate::code::{CacheDescription, Value};

/// Why an entry left the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    /// Removed by a key invalidation in this process.
    Invalidate,
    /// Removed because its expiration time passed.
    Expire,
    /// Removed because its LRU class exceeded the maximum member count.
    Evict,
    /// Removed because another process invalidated one of its keys after it was created.
    Stale,
    /// Replaced by a newer entry with the same description.
    Replace,
    /// Removed explicitly.
    Remove,
}

impl Event {
    /// Metrics label of the event.
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::Invalidate => "invalidate",
            Event::Expire => "expire",
            Event::Evict => "evict",
            Event::Stale => "stale",
            Event::Replace => "replace",
            Event::Remove => "remove",
        }
    }
}

/// Trait for the customized event listener.
///
/// The listener is called after the cache lock is released.
pub trait EventListener: Send + Sync + 'static {
    /// Associated description type.
    type Description: CacheDescription;
    /// Associated value type.
    type Value: Value;

    /// Called when a cache entry leaves the cache with the reason.
    #[expect(unused_variables)]
    fn on_leave(&self, reason: Event, description: &Self::Description, value: &Self::Value) {}
}
