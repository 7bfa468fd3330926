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

//! Shared components and utils for objcache.

/// Allow enable debug assertions in release profile with feature "strict_assertions".
pub mod assert;
/// Wall clock abstraction.
pub mod clock;
/// Description and value abstractions.
pub mod code;
/// Error type and result alias.
pub mod error;
/// Event listener trait.
pub mod event;
/// The shared metrics model and registries.
pub mod metrics;
/// Scoped functional programming extensions.
pub mod scope;
