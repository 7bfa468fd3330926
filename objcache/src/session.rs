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

use std::{collections::BTreeSet, fmt::Debug, marker::PhantomData, time::Instant};

use hashbrown::HashMap;
use itertools::Itertools;
use objcache_common::{
    code::{CacheDescription, KeySet, Value},
    error::{Error, ErrorKind, Result},
    strict_assert,
};

use crate::{
    coordinator::CacheCoordinator,
    executor::{CacheExecutor, SingleObjectExecutor},
    handle::{CacheHandle, CreateHandle},
    transaction::{Lookup, TransactionScope},
};

fn callback_failure(callback: &'static str) -> impl FnOnce(anyhow::Error) -> Error {
    move |e| {
        Error::new(ErrorKind::External, "cache executor callback failed")
            .with_context("callback", callback)
            .with_source(e)
    }
}

/// The per flow of control view of a [`CacheCoordinator`].
///
/// A session owns the open transactions of its flow. Transaction ids are only meaningful inside the session that
/// began them.
///
/// Locks held by transactions that are still open when the session is dropped are released on drop.
///
/// Lock managers track ownership per thread, so a session is confined to the thread that created it.
///
/// ```compile_fail
/// fn assert_send<T: Send>() {}
///
/// assert_send::<objcache::CacheSession<objcache::BaseDescription, u64>>();
/// ```
pub struct CacheSession<D, V>
where
    D: CacheDescription,
    V: Value,
{
    coordinator: CacheCoordinator<D, V>,
    transactions: HashMap<String, TransactionScope<D, V>>,
    _not_send: PhantomData<*const ()>,
}

impl<D, V> Debug for CacheSession<D, V>
where
    D: CacheDescription,
    V: Value,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheSession")
            .field("transactions", &self.transactions.keys().collect_vec())
            .finish()
    }
}

impl<D, V> CacheSession<D, V>
where
    D: CacheDescription,
    V: Value,
{
    pub(crate) fn new(coordinator: CacheCoordinator<D, V>) -> Self {
        Self {
            coordinator,
            transactions: HashMap::new(),
            _not_send: PhantomData,
        }
    }

    /// The coordinator of the session.
    pub fn coordinator(&self) -> &CacheCoordinator<D, V> {
        &self.coordinator
    }

    /// Returns `true` if the transaction is open in this session.
    pub fn has_transaction(&self, id: &str) -> bool {
        self.transactions.contains_key(id)
    }

    /// Count of open transactions.
    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }

    /// Locate or create the objects of `descriptions`, run the executor over them and invalidate
    /// `invalidation_keys`, all under the locks the batch needs.
    ///
    /// Missing objects are created with one call to [`CacheExecutor::create`] while the critical sections of the
    /// batch are held, so concurrent callers of this process never build the same object twice. Every object is
    /// then handed to [`CacheExecutor::exists`] in the order of `descriptions`, and [`CacheExecutor::execute`] runs
    /// last.
    ///
    /// Inside a transaction, created objects and invalidations stay private to the transaction until it commits,
    /// and the locks are kept until it ends.
    #[cfg_attr(feature = "tracing", fastrace::trace(name = "objcache::session::find_objects_and_execute"))]
    pub fn find_objects_and_execute<E>(
        &mut self,
        descriptions: &[D],
        invalidation_keys: Option<&KeySet>,
        executor: &mut E,
        transaction: Option<&str>,
    ) -> Result<()>
    where
        E: CacheExecutor<D, V>,
    {
        let handle = self.enter_cache(descriptions, invalidation_keys, transaction)?;
        let res = self.run_batch(&handle, executor);
        let left = self.leave_cache(handle);
        res.and(left)
    }

    /// Locate the object of `description` or build it with `builder`.
    pub fn find_or_create<F>(&mut self, description: D, builder: F, transaction: Option<&str>) -> Result<V>
    where
        F: FnOnce(&D) -> anyhow::Result<V>,
    {
        let mut executor = SingleObjectExecutor::new(builder);
        self.find_objects_and_execute(std::slice::from_ref(&description), None, &mut executor, transaction)?;
        executor
            .into_object()
            .ok_or_else(|| Error::config("no object produced").with_context("description", format!("{description:?}")))
    }

    fn run_batch<E>(&mut self, handle: &CacheHandle<D>, executor: &mut E) -> Result<()>
    where
        E: CacheExecutor<D, V>,
    {
        if !handle.descriptions.is_empty() {
            let create = self.enter_create_section(handle)?;
            let res = self.locate_or_create(&create, &handle.descriptions, executor);
            let left = self.leave_create_section(create);
            let objects = res?;
            left?;

            for (description, object) in handle.descriptions.iter().zip_eq(objects.iter()) {
                executor
                    .exists(description, object)
                    .map_err(callback_failure("exists"))?;
            }
        }

        executor.execute().map_err(callback_failure("execute"))?;
        self.invalidate_keys(handle)
    }

    fn locate_or_create<E>(&mut self, create: &CreateHandle, descriptions: &[D], executor: &mut E) -> Result<Vec<V>>
    where
        E: CacheExecutor<D, V>,
    {
        let mut objects = Vec::with_capacity(descriptions.len());
        let mut missing = vec![];
        for (i, description) in descriptions.iter().enumerate() {
            let object = self.lookup_object(create, description)?;
            if object.is_none() {
                missing.push(i);
            }
            objects.push(object);
        }

        if !missing.is_empty() {
            let wanted = missing.iter().map(|i| descriptions[*i].clone()).collect_vec();

            let now = Instant::now();
            let created = executor.create(&wanted).map_err(Error::builder_failure)?;
            let metrics = self.coordinator.metrics();
            metrics.cache_build_duration.record(now.elapsed().as_secs_f64());
            metrics.cache_build.increase(wanted.len() as _);

            if created.len() != wanted.len() {
                return Err(Error::config("cache executor created a wrong count of objects")
                    .with_context("expected", wanted.len())
                    .with_context("actual", created.len()));
            }
            tracing::debug!("[session]: created {} objects", created.len());

            for ((i, description), object) in missing.into_iter().zip(wanted).zip(created) {
                self.save_object(create, description, object.clone())?;
                objects[i] = Some(object);
            }
        }

        strict_assert!(objects.iter().all(|object| object.is_some()));
        Ok(objects.into_iter().flatten().collect())
    }

    /// Acquire the locks a batch needs: read locks on the keys of `descriptions`, write locks on
    /// `invalidation_keys`.
    ///
    /// Inside a transaction only the locks that neither the transaction nor one of its ancestors holds yet are
    /// acquired, and they are kept by the transaction. A read lock held by an ancestor is upgraded by acquiring the
    /// write lock as well.
    pub fn enter_cache(
        &mut self,
        descriptions: &[D],
        invalidation_keys: Option<&KeySet>,
        transaction: Option<&str>,
    ) -> Result<CacheHandle<D>> {
        let write_keys = invalidation_keys.cloned().unwrap_or_default();
        let read_keys: KeySet = descriptions
            .iter()
            .filter_map(|description| description.invalidation_keys())
            .flatten()
            .filter(|key| !write_keys.contains(*key))
            .cloned()
            .collect();

        let mut handle = CacheHandle {
            descriptions: descriptions.to_vec(),
            invalidation_keys: invalidation_keys.cloned(),
            transaction: transaction.map(str::to_string),
            read_locks: vec![],
            write_locks: vec![],
        };

        match transaction {
            None => {
                let read = self.coordinator.lock_names(&read_keys);
                let write = self.coordinator.lock_names(&write_keys);
                self.coordinator.enter_locks(&read, &write)?;
                handle.read_locks = read;
                handle.write_locks = write;
            }
            Some(id) => {
                self.scope("enter_cache", id)?;
                let read = read_keys
                    .into_iter()
                    .filter(|key| {
                        !self
                            .ancestry(id)
                            .any(|scope| scope.holds_read(key) || scope.holds_write(key))
                    })
                    .collect_vec();
                let write = write_keys
                    .into_iter()
                    .filter(|key| self.needs_write_lock(id, key))
                    .collect_vec();

                self.coordinator.enter_locks(
                    &self.coordinator.lock_names(&read),
                    &self.coordinator.lock_names(&write),
                )?;
                let (read, write) = self.scope_mut("enter_cache", id)?.add_locks(read, write);
                strict_assert!(read.is_empty() && write.is_empty());
            }
        }

        tracing::debug!(
            "[session]: entered cache, descriptions: {}, transaction: {transaction:?}",
            descriptions.len()
        );
        Ok(handle)
    }

    /// Enter the critical sections of the cacheable descriptions of the batch.
    ///
    /// The lookup time is taken before waiting for the sections.
    pub fn enter_create_section(&self, handle: &CacheHandle<D>) -> Result<CreateHandle> {
        if handle.descriptions.is_empty() {
            return Err(Error::config("enter a create section without descriptions"));
        }
        let lookup_time = self.coordinator.now();

        let critical_sections = handle
            .descriptions
            .iter()
            .filter(|description| description.invalidation_keys().is_some())
            .map(|description| description.critical_section_name().to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect_vec();
        self.coordinator.enter_critical_sections(&critical_sections)?;

        Ok(CreateHandle {
            critical_sections,
            lookup_time,
            transaction: handle.transaction.clone(),
        })
    }

    /// Look up the object of `description`.
    ///
    /// Inside a transaction the overlays of the transaction and its ancestors are consulted first, nearest first. A
    /// key invalidated by one of them hides the objects of every scope further out.
    pub fn lookup_object(&self, create: &CreateHandle, description: &D) -> Result<Option<V>> {
        if description.invalidation_keys().is_none() {
            return Ok(None);
        }

        if let Some(id) = create.transaction.as_deref() {
            self.scope("lookup_object", id)?;
            for scope in self.ancestry(id) {
                match scope.lookup(description) {
                    Lookup::Hit(object) => {
                        self.coordinator.metrics().cache_hit.increase(1);
                        return Ok(Some(object));
                    }
                    Lookup::Invalidated => {
                        self.coordinator.metrics().cache_miss.increase(1);
                        return Ok(None);
                    }
                    Lookup::Unknown => {}
                }
            }
        }

        self.coordinator.lookup_global(description, create.lookup_time)
    }

    /// Save a created object.
    ///
    /// Inside a transaction the object goes into the overlay of the transaction. Otherwise it is committed with the
    /// lookup time as its creation time. Objects of uncacheable descriptions are dropped.
    pub fn save_object(&mut self, create: &CreateHandle, description: D, object: V) -> Result<()> {
        if description.invalidation_keys().is_none() {
            return Ok(());
        }
        match create.transaction.as_deref() {
            Some(id) => self.scope_mut("save_object", id)?.save(description, object),
            None => self.coordinator.save_global(description, object, create.lookup_time),
        }
        Ok(())
    }

    /// Leave the critical sections of the handle.
    pub fn leave_create_section(&self, create: CreateHandle) -> Result<()> {
        self.coordinator.leave_critical_sections(&create.critical_sections)
    }

    /// Invalidate the keys of the batch.
    ///
    /// Inside a transaction the invalidation is recorded in the transaction and only published when the outermost
    /// transaction commits.
    pub fn invalidate_keys(&mut self, handle: &CacheHandle<D>) -> Result<()> {
        let Some(keys) = handle.invalidation_keys.as_ref().filter(|keys| !keys.is_empty()) else {
            return Ok(());
        };
        match handle.transaction.as_deref() {
            Some(id) => {
                self.scope_mut("invalidate_keys", id)?.invalidate(keys);
                tracing::debug!("[session]: transaction {id} invalidated keys {keys:?}");
                Ok(())
            }
            None => self.coordinator.perform_invalidation(keys),
        }
    }

    /// Release the locks of the batch. Locks of a batch inside a transaction are kept until the transaction ends.
    pub fn leave_cache(&self, handle: CacheHandle<D>) -> Result<()> {
        self.coordinator.leave_locks(&handle.read_locks, &handle.write_locks)
    }

    /// Begin a transaction, nested in `parent` if given.
    pub fn begin_transaction(&mut self, id: impl Into<String>, parent: Option<&str>) -> Result<()> {
        let id = id.into();
        if self.transactions.contains_key(&id) {
            tracing::error!("[session]: begin a transaction with a duplicated id {id}");
            return Err(Error::config("duplicated transaction id").with_context("transaction", id));
        }
        if let Some(parent) = parent {
            self.scope("begin_transaction", parent)?;
        }

        tracing::debug!("[session]: begin transaction {id}, parent: {parent:?}");
        self.transactions
            .insert(id, TransactionScope::new(parent.map(str::to_string)));
        self.coordinator.metrics().transaction_begin.increase(1);
        Ok(())
    }

    /// Commit a transaction.
    ///
    /// An outermost transaction commits its objects to the global table, publishes its invalidations and releases
    /// its locks. A nested transaction hands all of them over to its parent.
    ///
    /// Committing a transaction with open nested transactions is an error.
    #[cfg_attr(feature = "tracing", fastrace::trace(name = "objcache::session::commit_transaction"))]
    pub fn commit_transaction(&mut self, id: &str) -> Result<()> {
        self.scope("commit_transaction", id)?;
        if self.transactions.values().any(|scope| scope.parent() == Some(id)) {
            return Err(Error::config("commit a transaction with open nested transactions").with_context("transaction", id));
        }
        let Some(scope) = self.transactions.remove(id) else {
            return Err(Error::unknown_transaction("commit_transaction", id));
        };
        let parent = scope.parent().map(str::to_string);
        let (objects, invalidated, read, write) = scope.into_parts();
        self.coordinator.metrics().transaction_commit.increase(1);

        let Some(parent) = parent else {
            let now = self.coordinator.now();
            tracing::debug!(
                "[session]: commit transaction {id} at {now}, objects: {}, invalidated keys: {invalidated:?}",
                objects.len()
            );
            for (description, object) in objects {
                self.coordinator.save_global(description, object, now);
            }
            let res = self.coordinator.perform_invalidation(&invalidated);
            let left = self.coordinator.leave_locks(
                &self.coordinator.lock_names(&read),
                &self.coordinator.lock_names(&write),
            );
            return res.and(left);
        };

        tracing::debug!("[session]: commit transaction {id} into {parent}");
        let scope = self.scope_mut("commit_transaction", &parent)?;
        scope.invalidate(&invalidated);
        for (description, object) in objects {
            scope.save(description, object);
        }
        let (read, write) = scope.add_locks(read, write);

        // Locks the parent took on its own after the nested transaction did are held twice.
        self.coordinator.leave_locks(
            &self.coordinator.lock_names(&read),
            &self.coordinator.lock_names(&write),
        )
    }

    /// Roll back a transaction and every transaction nested in it, releasing their locks.
    ///
    /// Nothing the transactions did becomes visible outside them.
    #[cfg_attr(feature = "tracing", fastrace::trace(name = "objcache::session::rollback_transaction"))]
    pub fn rollback_transaction(&mut self, id: &str) -> Result<()> {
        self.scope("rollback_transaction", id)?;

        let doomed = self
            .transactions
            .keys()
            .filter_map(|tx| {
                let chain = self.ancestry(tx).count();
                let nested = self.ancestry_ids(tx).any(|ancestor| ancestor == id);
                nested.then(|| (chain, tx.clone()))
            })
            .sorted_by(|a, b| b.0.cmp(&a.0))
            .map(|(_, tx)| tx)
            .collect_vec();

        let mut res = Ok(());
        for tx in doomed {
            let Some(scope) = self.transactions.remove(&tx) else {
                continue;
            };
            tracing::debug!("[session]: rollback transaction {tx}");
            self.coordinator.metrics().transaction_rollback.increase(1);
            res = res.and(self.release_scope(scope));
        }
        res
    }

    fn release_scope(&self, scope: TransactionScope<D, V>) -> Result<()> {
        let read = self.coordinator.lock_names(scope.read_locks());
        let write = self.coordinator.lock_names(scope.write_locks());
        self.coordinator.leave_locks(&read, &write)
    }

    fn scope(&self, operation: &'static str, id: &str) -> Result<&TransactionScope<D, V>> {
        self.transactions.get(id).ok_or_else(|| {
            tracing::error!("[session]: {operation} with an illegal transaction id {id}");
            Error::unknown_transaction(operation, id)
        })
    }

    fn scope_mut(&mut self, operation: &'static str, id: &str) -> Result<&mut TransactionScope<D, V>> {
        self.transactions.get_mut(id).ok_or_else(|| {
            tracing::error!("[session]: {operation} with an illegal transaction id {id}");
            Error::unknown_transaction(operation, id)
        })
    }

    /// Ids of the transaction and its ancestors, nearest first.
    fn ancestry_ids<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        let mut cursor = Some(id);
        std::iter::from_fn(move || {
            let current = cursor?;
            cursor = self.transactions.get(current).and_then(|scope| scope.parent());
            Some(current)
        })
    }

    /// Scopes of the transaction and its ancestors, nearest first.
    fn ancestry<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a TransactionScope<D, V>> + 'a {
        self.ancestry_ids(id).filter_map(|id| self.transactions.get(id))
    }

    fn needs_write_lock(&self, id: &str, key: &str) -> bool {
        for scope in self.ancestry(id) {
            if scope.holds_write(key) {
                return false;
            }
            if scope.holds_read(key) {
                return true;
            }
        }
        true
    }
}

impl<D, V> Drop for CacheSession<D, V>
where
    D: CacheDescription,
    V: Value,
{
    fn drop(&mut self) {
        if self.transactions.is_empty() {
            return;
        }
        tracing::warn!(
            "[session]: session dropped with open transactions {:?}, release their locks",
            self.transactions.keys().collect_vec()
        );
        let scopes = std::mem::take(&mut self.transactions);
        for (id, scope) in scopes {
            if let Err(e) = self.release_scope(scope) {
                tracing::warn!("[session]: release locks of transaction {id} failed: {e}");
            }
        }
    }
}
