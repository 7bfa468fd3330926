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

//! This crate provides the process-local object table of objcache.
//!
//! Committed entries live in a generational slab. The object table, the invalidation index, the per class LRU lists
//! and the expiration order refer to entries by slab token, and [`GeneralCache`] keeps all of them consistent under
//! one mutex.

mod expiration;
mod general;
mod index;
mod lru;
mod record;
mod slab;
mod table;

mod prelude;
pub use prelude::*;
