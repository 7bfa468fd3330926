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

use serde::{Deserialize, Serialize};

/// Cache coordinator config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Name of the coordinator, used as the metrics label.
    ///
    /// Default: `objcache`.
    pub name: String,

    /// Prefix of the lock names handed to the lock manager.
    ///
    /// Every process sharing a lock manager must use the same prefix.
    ///
    /// Default: `_Cache_`.
    pub lock_prefix: String,

    /// Prefix of the keys of the invalidation timestamps in the shared store.
    ///
    /// Every process sharing a store must use the same prefix.
    ///
    /// Default: `cache-`.
    pub store_prefix: String,

    /// Recompute the expiration time of an entry from the lookup time on every hit.
    ///
    /// With sliding expiration disabled an entry expires at the time computed when it was saved.
    ///
    /// Default: `true`.
    pub sliding_expiration: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            name: "objcache".to_string(),
            lock_prefix: "_Cache_".to_string(),
            store_prefix: "cache-".to_string(),
            sliding_expiration: true,
        }
    }
}
