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

//! Transaction isolation observed through the public API.

use std::sync::Arc;

use objcache::{
    BaseDescription, CacheCoordinator, CacheCoordinatorBuilder, CacheExecutor, CacheSession, KeySet,
    LocalLockManager, ManualClock, MemorySharedStore, SharedStore,
};

struct Invalidate;

impl<D, V> CacheExecutor<D, V> for Invalidate {
    fn create(&mut self, _: &[D]) -> anyhow::Result<Vec<V>> {
        anyhow::bail!("nothing to create")
    }
}

struct Env {
    coordinator: CacheCoordinator<BaseDescription, u64>,
    locks: Arc<LocalLockManager>,
    store: MemorySharedStore,
    clock: ManualClock,
}

fn env() -> Env {
    let locks = Arc::new(LocalLockManager::new());
    let store = MemorySharedStore::new();
    let clock = ManualClock::new(1000);
    let coordinator = CacheCoordinatorBuilder::new()
        .with_lock_manager(locks.clone())
        .with_shared_store(store.clone())
        .with_clock(clock.clone())
        .build();
    Env {
        coordinator,
        locks,
        store,
        clock,
    }
}

fn desc(name: &str, keys: &[&str]) -> BaseDescription {
    BaseDescription::new(name).with_keys(keys.iter().copied())
}

fn keys(keys: &[&str]) -> KeySet {
    keys.iter().map(|k| k.to_string()).collect()
}

fn get(session: &mut CacheSession<BaseDescription, u64>, d: &BaseDescription, fallback: u64, tx: &str) -> u64 {
    session.find_or_create(d.clone(), |_| Ok(fallback), Some(tx)).unwrap()
}

fn invalidate(session: &mut CacheSession<BaseDescription, u64>, keys: &KeySet, tx: Option<&str>) {
    session
        .find_objects_and_execute(&[], Some(keys), &mut Invalidate, tx)
        .unwrap();
}

#[test_log::test]
fn test_nested_transaction_isolation_and_rollback() {
    let env = env();
    let mut session = env.coordinator.session();
    let a = desc("a", &["k"]);

    session.begin_transaction("t1", None).unwrap();
    session.begin_transaction("t2", Some("t1")).unwrap();

    assert_eq!(get(&mut session, &a, 1, "t1"), 1);
    assert!(!env.coordinator.cache().contains(&a));

    // The nested transaction sees the object of its parent.
    assert_eq!(get(&mut session, &a, 99, "t2"), 1);

    // After invalidating `k` the nested transaction no longer sees it, the parent still does.
    invalidate(&mut session, &keys(&["k"]), Some("t2"));
    assert_eq!(get(&mut session, &a, 2, "t2"), 2);
    assert_eq!(get(&mut session, &a, 99, "t1"), 1);

    // Committing the nested transaction carries both the invalidation and the new object to the parent.
    session.commit_transaction("t2").unwrap();
    assert_eq!(get(&mut session, &a, 99, "t1"), 2);

    // Other sessions never see uncommitted work.
    let mut other = env.coordinator.session();
    assert_eq!(other.find_or_create(desc("b", &["j"]), |_| Ok(5), None).unwrap(), 5);

    session.rollback_transaction("t1").unwrap();
    assert!(!env.coordinator.cache().contains(&a));
    assert_eq!(env.store.read_timestamp("cache-k").unwrap(), None);
    assert_eq!(env.locks.held(), 0);
}

#[test_log::test]
fn test_nested_object_visibility() {
    let env = env();
    let mut session = env.coordinator.session();
    let b = desc("b", &["k"]);

    session.begin_transaction("t1", None).unwrap();
    session.begin_transaction("t2", Some("t1")).unwrap();
    session.begin_transaction("t3", Some("t2")).unwrap();

    assert_eq!(get(&mut session, &b, 2, "t2"), 2);

    // Visible to the nested transaction, not to the parent nor to the global table.
    assert_eq!(get(&mut session, &b, 99, "t3"), 2);
    assert_eq!(get(&mut session, &b, 1, "t1"), 1);
    assert!(!env.coordinator.cache().contains(&b));

    session.commit_transaction("t3").unwrap();
    session.commit_transaction("t2").unwrap();
    assert_eq!(get(&mut session, &b, 99, "t1"), 2);
    assert!(!env.coordinator.cache().contains(&b));

    session.commit_transaction("t1").unwrap();
    assert!(env.coordinator.cache().contains(&b));
    assert_eq!(session.find_or_create(b, |_| Ok(99), None).unwrap(), 2);
    assert_eq!(env.locks.held(), 0);
}

#[test_log::test]
fn test_root_commit_publishes() {
    let env = env();
    let mut session = env.coordinator.session();
    let stale = desc("stale", &["ka"]);
    let fresh = desc("fresh", &["kb"]);

    session.find_or_create(stale.clone(), |_| Ok(1), None).unwrap();
    env.clock.advance(1);

    session.begin_transaction("t", None).unwrap();
    assert_eq!(get(&mut session, &fresh, 2, "t"), 2);
    invalidate(&mut session, &keys(&["ka"]), Some("t"));

    // Nothing is published before the commit.
    assert!(env.coordinator.cache().contains(&stale));
    assert!(!env.coordinator.cache().contains(&fresh));
    assert!(env.locks.is_locked("_Cache_ka"));
    assert!(env.locks.is_locked("_Cache_kb"));

    env.clock.advance(1);
    session.commit_transaction("t").unwrap();

    let cache = env.coordinator.cache();
    assert!(!cache.contains(&stale));
    assert!(cache.contains(&fresh));
    assert_eq!(cache.info(&fresh).unwrap().created_at, 1002);
    assert_eq!(env.store.read_timestamp("cache-ka").unwrap(), Some(1002));
    assert_eq!(env.locks.held(), 0);
}

#[test_log::test]
fn test_transaction_sees_committed_objects() {
    let env = env();
    let mut session = env.coordinator.session();
    let a = desc("a", &["k"]);

    session.find_or_create(a.clone(), |_| Ok(1), None).unwrap();
    env.clock.advance(1);

    session.begin_transaction("t", None).unwrap();
    assert_eq!(get(&mut session, &a, 99, "t"), 1);

    // Invalidated inside the transaction: hidden from it, still committed for everyone else.
    invalidate(&mut session, &keys(&["k"]), Some("t"));
    assert_eq!(get(&mut session, &a, 2, "t"), 2);
    assert!(env.coordinator.cache().contains(&a));

    session.rollback_transaction("t").unwrap();
    assert_eq!(session.find_or_create(a, |_| Ok(99), None).unwrap(), 1);
    assert_eq!(env.locks.held(), 0);
}

#[test_log::test]
fn test_dropped_session_releases_locks() {
    let env = env();
    {
        let mut session = env.coordinator.session();
        session.begin_transaction("t", None).unwrap();
        get(&mut session, &desc("a", &["k"]), 1, "t");
        invalidate(&mut session, &keys(&["j"]), Some("t"));
        assert_eq!(env.locks.held(), 2);
    }
    assert_eq!(env.locks.held(), 0);
    assert!(env.coordinator.cache().is_empty());
}
