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

use std::{
    sync::Arc,
    thread::{self, JoinHandle},
    time::Duration,
};

use objcache_common::{
    code::{CacheDescription, Value},
    error::{Error, Result},
};
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};

use crate::coordinator::CacheCoordinator;

/// Expiration sweeper config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweeperConfig {
    /// Interval between two sweeps, in milliseconds.
    ///
    /// Default: `60000`.
    pub interval_ms: u64,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self { interval_ms: 60_000 }
    }
}

#[derive(Debug, Default)]
struct Signal {
    stopped: Mutex<bool>,
    condvar: Condvar,
}

/// A background thread that removes expired objects periodically.
///
/// Expired objects are also dropped lazily when they are looked up. The sweeper bounds how long unused expired objects
/// stay in memory.
///
/// The thread stops when the sweeper is stopped or dropped.
#[derive(Debug)]
pub struct ExpirationSweeper {
    signal: Arc<Signal>,
    handle: Option<JoinHandle<()>>,
}

impl ExpirationSweeper {
    /// Spawn a sweeper for the coordinator. Each sweep expires the objects due at the coordinator clock time.
    pub fn spawn<D, V>(coordinator: CacheCoordinator<D, V>, config: SweeperConfig) -> Result<Self>
    where
        D: CacheDescription,
        V: Value,
    {
        if config.interval_ms == 0 {
            return Err(Error::config("sweeper interval must be positive"));
        }
        let interval = Duration::from_millis(config.interval_ms);
        let signal = Arc::new(Signal::default());

        let s = signal.clone();
        let handle = thread::Builder::new()
            .name(format!("{}-sweeper", coordinator.config().name))
            .spawn(move || {
                let mut stopped = s.stopped.lock();
                loop {
                    s.condvar.wait_for(&mut stopped, interval);
                    if *stopped {
                        break;
                    }
                    let count = parking_lot::MutexGuard::unlocked(&mut stopped, || {
                        coordinator.expire_objects(coordinator.now())
                    });
                    if count > 0 {
                        tracing::debug!("[sweeper]: {count} expired objects removed");
                    }
                }
                tracing::debug!("[sweeper]: stopped");
            })?;

        Ok(Self {
            signal,
            handle: Some(handle),
        })
    }

    /// Stop the sweeper and wait for the thread to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        *self.signal.stopped.lock() = true;
        self.signal.condvar.notify_all();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("[sweeper]: sweeper thread panicked");
            }
        }
    }
}

impl Drop for ExpirationSweeper {
    fn drop(&mut self) {
        self.shutdown();
    }
}
