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

//! A transaction-aware object cache.
//!
//! objcache builds expensive objects at most once per process, shares them between threads, and drops them when an
//! invalidation key they depend on is invalidated by any process that shares the same [`SharedStore`].
//!
//! Callers describe objects with a [`CacheDescription`] and work through a [`CacheSession`]. Work done inside a
//! transaction stays private to the transaction until the outermost transaction commits, and leaves no trace if it is
//! rolled back.
//!
//! ```rust
//! use objcache::{BaseDescription, CacheCoordinatorBuilder};
//!
//! let coordinator = CacheCoordinatorBuilder::<BaseDescription, String>::new().build();
//! let mut session = coordinator.session();
//!
//! let description = BaseDescription::new("greeting").with_keys(["lang:en"]);
//! let greeting = session
//!     .find_or_create(description.clone(), |_| Ok("hello".to_string()), None)
//!     .unwrap();
//! assert_eq!(greeting, "hello");
//! assert!(coordinator.cache().contains(&description));
//! ```

pub use objcache_common as common;
pub use objcache_memory as memory;

mod builder;
mod config;
mod coordinator;
mod executor;
mod handle;
mod lock;
mod session;
mod shared;
mod sweeper;
mod transaction;

mod prelude;
pub use prelude::*;
