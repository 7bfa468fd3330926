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

use objcache_common::code::KeySet;

/// Locks held by one step-protocol batch, returned by [`crate::CacheSession::enter_cache`].
///
/// Must be passed back to [`crate::CacheSession::leave_cache`], also on error paths.
#[must_use = "the locks are held until the handle is passed to `leave_cache`"]
#[derive(Debug)]
pub struct CacheHandle<D> {
    pub(crate) descriptions: Vec<D>,
    pub(crate) invalidation_keys: Option<KeySet>,
    pub(crate) transaction: Option<String>,
    /// Prefixed lock names to release on leave. Empty inside a transaction.
    pub(crate) read_locks: Vec<String>,
    pub(crate) write_locks: Vec<String>,
}

impl<D> CacheHandle<D> {
    /// Descriptions of the batch.
    pub fn descriptions(&self) -> &[D] {
        &self.descriptions
    }

    /// Keys the batch invalidates.
    pub fn invalidation_keys(&self) -> Option<&KeySet> {
        self.invalidation_keys.as_ref()
    }

    /// Transaction the batch runs in.
    pub fn transaction(&self) -> Option<&str> {
        self.transaction.as_deref()
    }
}

/// Critical sections held while objects are looked up and created, returned by
/// [`crate::CacheSession::enter_create_section`].
///
/// Must be passed back to [`crate::CacheSession::leave_create_section`], also on error paths.
#[must_use = "the critical sections are held until the handle is passed to `leave_create_section`"]
#[derive(Debug)]
pub struct CreateHandle {
    pub(crate) critical_sections: Vec<String>,
    pub(crate) lookup_time: u64,
    pub(crate) transaction: Option<String>,
}

impl CreateHandle {
    /// Time the section was requested, used for expiration checks and as the creation time of saved objects.
    pub fn lookup_time(&self) -> u64 {
        self.lookup_time
    }

    /// Names of the entered critical sections.
    pub fn critical_sections(&self) -> &[String] {
        &self.critical_sections
    }

    /// Transaction the section belongs to.
    pub fn transaction(&self) -> Option<&str> {
        self.transaction.as_deref()
    }
}
