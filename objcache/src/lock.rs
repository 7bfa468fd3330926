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
    fmt::Debug,
    sync::Arc,
    thread::{self, ThreadId},
    time::{Duration, Instant},
};

use hashbrown::HashMap;
use itertools::Itertools;
use objcache_common::error::{Error, ErrorKind, Result};
use parking_lot::{Condvar, Mutex, MutexGuard};

/// Lock service shared by every process that caches the same objects.
///
/// Lock names are opaque strings. All calls block until the whole request is granted.
pub trait LockManager: Send + Sync + 'static + Debug {
    /// Acquire read locks on `read` and write locks on `write`.
    fn enter_locks(&self, read: &[String], write: &[String]) -> Result<()>;

    /// Release locks acquired by [`LockManager::enter_locks`].
    fn leave_locks(&self, read: &[String], write: &[String]) -> Result<()>;

    /// Enter the exclusive critical sections `names`.
    ///
    /// Critical sections only need to exclude threads of the same process.
    fn enter_critical_sections(&self, names: &[String]) -> Result<()>;

    /// Leave critical sections entered by [`LockManager::enter_critical_sections`].
    fn leave_critical_sections(&self, names: &[String]) -> Result<()>;
}

impl<T> LockManager for Arc<T>
where
    T: LockManager,
{
    fn enter_locks(&self, read: &[String], write: &[String]) -> Result<()> {
        self.as_ref().enter_locks(read, write)
    }

    fn leave_locks(&self, read: &[String], write: &[String]) -> Result<()> {
        self.as_ref().leave_locks(read, write)
    }

    fn enter_critical_sections(&self, names: &[String]) -> Result<()> {
        self.as_ref().enter_critical_sections(names)
    }

    fn leave_critical_sections(&self, names: &[String]) -> Result<()> {
        self.as_ref().leave_critical_sections(names)
    }
}

#[derive(Debug, Default)]
struct LockTable {
    readers: HashMap<String, HashMap<ThreadId, usize>>,
    writers: HashMap<String, (ThreadId, usize)>,
    sections: HashMap<String, (ThreadId, usize)>,
}

impl LockTable {
    fn can_read(&self, name: &str, me: ThreadId) -> bool {
        self.writers.get(name).is_none_or(|(owner, _)| *owner == me)
    }

    fn can_write(&self, name: &str, me: ThreadId) -> bool {
        self.can_read(name, me)
            && self
                .readers
                .get(name)
                .is_none_or(|readers| readers.keys().all(|reader| *reader == me))
    }

    fn can_enter(&self, name: &str, me: ThreadId) -> bool {
        self.sections.get(name).is_none_or(|(owner, _)| *owner == me)
    }

    fn release_read(&mut self, name: &str, me: ThreadId) -> bool {
        let Some(readers) = self.readers.get_mut(name) else {
            return false;
        };
        let Some(count) = readers.get_mut(&me) else {
            return false;
        };
        *count -= 1;
        if *count == 0 {
            readers.remove(&me);
        }
        if readers.is_empty() {
            self.readers.remove(name);
        }
        true
    }

    fn release_exclusive(table: &mut HashMap<String, (ThreadId, usize)>, name: &str, me: ThreadId) -> bool {
        match table.get_mut(name) {
            Some((owner, count)) if *owner == me => {
                *count -= 1;
                if *count == 0 {
                    table.remove(name);
                }
                true
            }
            _ => false,
        }
    }
}

/// In-process [`LockManager`].
///
/// Locks are owned by the calling thread and are reentrant. A request is granted all at once or not at all, so a
/// thread may hold a read lock and a write lock on the same name, which transaction lock upgrades rely on.
///
/// Other processes are not excluded. Use a distributed lock manager for multi-process deployments.
#[derive(Debug, Default)]
pub struct LocalLockManager {
    table: Mutex<LockTable>,
    condvar: Condvar,
    timeout: Option<Duration>,
}

impl LocalLockManager {
    /// Create a lock manager that waits forever.
    pub fn new() -> Self {
        Self::default()
    }

    /// Give up waiting after `timeout` with an [`ErrorKind::ResourceUnavailable`] error.
    ///
    /// Default: wait forever.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Returns `true` if any thread holds a read or write lock on `name`.
    pub fn is_locked(&self, name: &str) -> bool {
        let table = self.table.lock();
        table.readers.contains_key(name) || table.writers.contains_key(name)
    }

    /// Returns `true` if any thread is inside the critical section `name`.
    pub fn is_in_critical_section(&self, name: &str) -> bool {
        self.table.lock().sections.contains_key(name)
    }

    /// Count of names with a read lock, a write lock or an entered critical section.
    pub fn held(&self) -> usize {
        let table = self.table.lock();
        table.readers.len() + table.writers.len() + table.sections.len()
    }

    fn wait<F>(&self, table: &mut MutexGuard<'_, LockTable>, ready: F, request: &'static str) -> Result<()>
    where
        F: Fn(&LockTable) -> bool,
    {
        let deadline = self.timeout.map(|timeout| Instant::now() + timeout);
        while !ready(&**table) {
            match deadline {
                None => self.condvar.wait(table),
                Some(deadline) => {
                    if self.condvar.wait_until(table, deadline).timed_out() && !ready(&**table) {
                        return Err(Error::new(ErrorKind::ResourceUnavailable, "lock wait timed out")
                            .with_context("request", request)
                            .with_context("timeout", format!("{:?}", self.timeout)));
                    }
                }
            }
        }
        Ok(())
    }
}

impl LockManager for LocalLockManager {
    fn enter_locks(&self, read: &[String], write: &[String]) -> Result<()> {
        if read.is_empty() && write.is_empty() {
            return Ok(());
        }
        let me = thread::current().id();
        let mut table = self.table.lock();
        self.wait(
            &mut table,
            |table| read.iter().all(|n| table.can_read(n, me)) && write.iter().all(|n| table.can_write(n, me)),
            "locks",
        )?;

        for name in read {
            *table.readers.entry_ref(name.as_str()).or_default().entry(me).or_default() += 1;
        }
        for name in write {
            table.writers.entry_ref(name.as_str()).or_insert((me, 0)).1 += 1;
        }
        tracing::trace!("[lock manager]: {me:?} entered locks, read: {read:?}, write: {write:?}");
        Ok(())
    }

    fn leave_locks(&self, read: &[String], write: &[String]) -> Result<()> {
        if read.is_empty() && write.is_empty() {
            return Ok(());
        }
        let me = thread::current().id();
        let mut table = self.table.lock();

        let mut missing = vec![];
        for name in write {
            if !LockTable::release_exclusive(&mut table.writers, name, me) {
                missing.push(name.as_str());
            }
        }
        for name in read {
            if !table.release_read(name, me) {
                missing.push(name.as_str());
            }
        }
        drop(table);
        self.condvar.notify_all();

        tracing::trace!("[lock manager]: {me:?} left locks, read: {read:?}, write: {write:?}");
        if !missing.is_empty() {
            return Err(Error::config("leave locks that are not held").with_context("locks", missing.iter().join(",")));
        }
        Ok(())
    }

    fn enter_critical_sections(&self, names: &[String]) -> Result<()> {
        if names.is_empty() {
            return Ok(());
        }
        let me = thread::current().id();
        let mut table = self.table.lock();
        self.wait(
            &mut table,
            |table| names.iter().all(|n| table.can_enter(n, me)),
            "critical sections",
        )?;

        for name in names {
            table.sections.entry_ref(name.as_str()).or_insert((me, 0)).1 += 1;
        }
        Ok(())
    }

    fn leave_critical_sections(&self, names: &[String]) -> Result<()> {
        if names.is_empty() {
            return Ok(());
        }
        let me = thread::current().id();
        let mut table = self.table.lock();

        let missing = names
            .iter()
            .filter(|name| !LockTable::release_exclusive(&mut table.sections, name, me))
            .join(",");
        drop(table);
        self.condvar.notify_all();

        if !missing.is_empty() {
            return Err(Error::config("leave critical sections that are not entered").with_context("sections", missing));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test_log::test]
    fn test_shared_read_locks() {
        let manager = Arc::new(LocalLockManager::new().with_timeout(Duration::from_millis(50)));
        manager.enter_locks(&names(&["a"]), &[]).unwrap();

        let m = manager.clone();
        thread::spawn(move || {
            m.enter_locks(&names(&["a"]), &[]).unwrap();
            m.leave_locks(&names(&["a"]), &[]).unwrap();
        })
        .join()
        .unwrap();

        manager.leave_locks(&names(&["a"]), &[]).unwrap();
        assert_eq!(manager.held(), 0);
    }

    #[test_log::test]
    fn test_write_lock_excludes_other_threads() {
        let manager = Arc::new(LocalLockManager::new().with_timeout(Duration::from_millis(50)));
        manager.enter_locks(&names(&["a"]), &[]).unwrap();

        let m = manager.clone();
        let err = thread::spawn(move || m.enter_locks(&[], &names(&["a"])).unwrap_err())
            .join()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::ResourceUnavailable);

        manager.leave_locks(&names(&["a"]), &[]).unwrap();
        assert!(!manager.is_locked("a"));
    }

    #[test_log::test]
    fn test_upgrade_by_the_same_thread() {
        let manager = LocalLockManager::new().with_timeout(Duration::from_millis(50));
        manager.enter_locks(&names(&["a", "b"]), &[]).unwrap();
        manager.enter_locks(&[], &names(&["a"])).unwrap();

        // Write first, then read.
        manager.leave_locks(&[], &names(&["a"])).unwrap();
        assert!(manager.is_locked("a"));
        manager.leave_locks(&names(&["a", "b"]), &[]).unwrap();
        assert_eq!(manager.held(), 0);
    }

    #[test_log::test]
    fn test_waiter_is_woken_up() {
        let manager = Arc::new(LocalLockManager::new());
        manager.enter_critical_sections(&names(&["s"])).unwrap();

        let entered = Arc::new(AtomicBool::new(false));
        let handle = {
            let manager = manager.clone();
            let entered = entered.clone();
            thread::spawn(move || {
                manager.enter_critical_sections(&names(&["s", "t"])).unwrap();
                entered.store(true, Ordering::SeqCst);
                manager.leave_critical_sections(&names(&["s", "t"])).unwrap();
            })
        };

        thread::sleep(Duration::from_millis(20));
        assert!(!entered.load(Ordering::SeqCst));
        // All-or-nothing: the waiter holds neither section while it waits.
        assert!(!manager.is_in_critical_section("t"));

        manager.leave_critical_sections(&names(&["s"])).unwrap();
        handle.join().unwrap();
        assert!(entered.load(Ordering::SeqCst));
        assert_eq!(manager.held(), 0);
    }

    #[test_log::test]
    fn test_leave_unheld_lock() {
        let manager = LocalLockManager::new();
        let err = manager.leave_locks(&names(&["a"]), &[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
        let err = manager.leave_critical_sections(&names(&["s"])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }
}
