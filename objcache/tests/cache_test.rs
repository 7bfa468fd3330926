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

//! Object cache behavior observed through the public API.

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Barrier, Mutex,
    },
    thread,
    time::Duration,
};

use objcache::{
    BaseDescription, CacheCoordinator, CacheCoordinatorBuilder, CacheExecutor, Event, EventListener, FileSharedStore,
    KeySet, LocalLockManager, ManualClock, MemorySharedStore, ObjectClass, SharedStore,
};

fn desc(name: &str, keys: &[&str]) -> BaseDescription {
    BaseDescription::new(name).with_keys(keys.iter().copied())
}

fn keys(keys: &[&str]) -> KeySet {
    keys.iter().map(|k| k.to_string()).collect()
}

/// Executor for batches that only invalidate.
struct Invalidate;

impl<D, V> CacheExecutor<D, V> for Invalidate {
    fn create(&mut self, _: &[D]) -> anyhow::Result<Vec<V>> {
        anyhow::bail!("nothing to create")
    }
}

fn invalidate<V: objcache::Value>(coordinator: &CacheCoordinator<BaseDescription, V>, keys: &KeySet) {
    coordinator
        .session()
        .find_objects_and_execute(&[], Some(keys), &mut Invalidate, None)
        .unwrap();
}

#[derive(Debug, Default)]
struct Recorder {
    events: Mutex<Vec<(Event, String)>>,
}

impl EventListener for Recorder {
    type Description = BaseDescription;
    type Value = u64;

    fn on_leave(&self, reason: Event, description: &BaseDescription, _: &u64) {
        use objcache::CacheDescription;
        self.events
            .lock()
            .unwrap()
            .push((reason, description.critical_section_name().to_string()));
    }
}

#[test_log::test]
fn test_concurrent_callers_build_once() {
    const CALLERS: usize = 16;

    let coordinator = CacheCoordinatorBuilder::<BaseDescription, Arc<String>>::new().build();
    let builds = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(CALLERS));

    let handles = (0..CALLERS)
        .map(|_| {
            let coordinator = coordinator.clone();
            let builds = builds.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                let mut session = coordinator.session();
                barrier.wait();
                session
                    .find_or_create(
                        desc("session:1", &["space:1"]),
                        |_| {
                            builds.fetch_add(1, Ordering::SeqCst);
                            thread::sleep(Duration::from_millis(20));
                            Ok(Arc::new("connected".to_string()))
                        },
                        None,
                    )
                    .unwrap()
            })
        })
        .collect::<Vec<_>>();

    let objects = handles.into_iter().map(|h| h.join().unwrap()).collect::<Vec<_>>();
    assert_eq!(builds.load(Ordering::SeqCst), 1);
    assert!(objects.iter().all(|o| Arc::ptr_eq(o, &objects[0])));
}

#[test_log::test]
fn test_uncacheable_objects_are_always_built() {
    let coordinator = CacheCoordinatorBuilder::<BaseDescription, u64>::new().build();
    let mut session = coordinator.session();
    let scratch = BaseDescription::new("scratch");

    assert_eq!(session.find_or_create(scratch.clone(), |_| Ok(1), None).unwrap(), 1);
    assert_eq!(session.find_or_create(scratch, |_| Ok(2), None).unwrap(), 2);
    assert!(coordinator.cache().is_empty());
}

#[test_log::test]
fn test_batch_protocol_order() {
    #[derive(Default)]
    struct Trace {
        calls: Vec<String>,
    }

    impl CacheExecutor<BaseDescription, u64> for Trace {
        fn create(&mut self, missing: &[BaseDescription]) -> anyhow::Result<Vec<u64>> {
            use objcache::CacheDescription;
            self.calls.push(format!(
                "create {}",
                missing.iter().map(|d| d.critical_section_name()).collect::<Vec<_>>().join(",")
            ));
            Ok(missing.iter().map(|_| 2).collect())
        }

        fn exists(&mut self, description: &BaseDescription, value: &u64) -> anyhow::Result<()> {
            use objcache::CacheDescription;
            self.calls
                .push(format!("exists {}={value}", description.critical_section_name()));
            Ok(())
        }

        fn execute(&mut self) -> anyhow::Result<()> {
            self.calls.push("execute".to_string());
            Ok(())
        }
    }

    let coordinator = CacheCoordinatorBuilder::<BaseDescription, u64>::new().build();
    let mut session = coordinator.session();
    session.find_or_create(desc("b", &["k"]), |_| Ok(1), None).unwrap();

    let mut trace = Trace::default();
    session
        .find_objects_and_execute(
            &[desc("a", &["k"]), desc("b", &["k"]), desc("c", &["k"])],
            None,
            &mut trace,
            None,
        )
        .unwrap();
    assert_eq!(trace.calls, vec!["create a,c", "exists a=2", "exists b=1", "exists c=2", "execute"]);

    // Nothing missing: no create call.
    let mut trace = Trace::default();
    session
        .find_objects_and_execute(&[desc("a", &["k"])], None, &mut trace, None)
        .unwrap();
    assert_eq!(trace.calls, vec!["exists a=2", "execute"]);
}

#[test_log::test]
fn test_execute_failure_keeps_created_objects() {
    struct FailingExecute;

    impl CacheExecutor<BaseDescription, u64> for FailingExecute {
        fn create(&mut self, missing: &[BaseDescription]) -> anyhow::Result<Vec<u64>> {
            Ok(vec![1; missing.len()])
        }

        fn execute(&mut self) -> anyhow::Result<()> {
            anyhow::bail!("downstream failed")
        }
    }

    let locks = Arc::new(LocalLockManager::new());
    let coordinator = CacheCoordinatorBuilder::<BaseDescription, u64>::new()
        .with_lock_manager(locks.clone())
        .build();
    let err = coordinator
        .session()
        .find_objects_and_execute(&[desc("a", &["k"])], Some(&keys(&["j"])), &mut FailingExecute, None)
        .unwrap_err();

    assert_eq!(err.kind(), objcache::ErrorKind::External);
    assert!(coordinator.cache().contains(&desc("a", &["k"])));
    assert_eq!(locks.held(), 0);
}

#[test_log::test]
fn test_invalidation_removes_dependents() {
    let clock = ManualClock::new(1000);
    let store = MemorySharedStore::new();
    let coordinator = CacheCoordinatorBuilder::<BaseDescription, u64>::new()
        .with_clock(clock.clone())
        .with_shared_store(store.clone())
        .build();
    let mut session = coordinator.session();

    let a = desc("a", &["space:1"]);
    let b = desc("b", &["space:1", "user:1"]);
    let c = desc("c", &["user:1"]);
    for (i, d) in [&a, &b, &c].into_iter().enumerate() {
        session.find_or_create(d.clone(), |_| Ok(i as u64), None).unwrap();
    }
    assert_eq!(coordinator.cache().indexed_count("space:1"), 2);

    clock.advance(1);
    invalidate(&coordinator, &keys(&["space:1"]));

    let cache = coordinator.cache();
    assert!(!cache.contains(&a));
    assert!(!cache.contains(&b));
    assert!(cache.contains(&c));
    assert_eq!(cache.indexed_count("space:1"), 0);
    assert_eq!(cache.indexed_count("user:1"), 1);
    assert_eq!(store.read_timestamp("cache-space:1").unwrap(), Some(1001));

    // Rebuilt after the invalidation.
    clock.advance(1);
    assert_eq!(session.find_or_create(a.clone(), |_| Ok(10), None).unwrap(), 10);
    assert_eq!(session.find_or_create(a, |_| Ok(11), None).unwrap(), 10);
}

#[test_log::test]
fn test_lru_class_bound() {
    let class = ObjectClass::new("session", 2);
    let d = |name: &str| desc(name, &["k"]).with_class(class.clone());

    // A, B, C: A is the least recent.
    let coordinator = CacheCoordinatorBuilder::<BaseDescription, u64>::new().build();
    let mut session = coordinator.session();
    for name in ["a", "b", "c"] {
        session.find_or_create(d(name), |_| Ok(0), None).unwrap();
    }
    assert_eq!(coordinator.cache().class_members("session"), vec![d("b"), d("c")]);

    // A, B, revalidate A, C: B is the least recent.
    let coordinator = CacheCoordinatorBuilder::<BaseDescription, u64>::new().build();
    let mut session = coordinator.session();
    for name in ["a", "b", "a", "c"] {
        session.find_or_create(d(name), |_| Ok(0), None).unwrap();
    }
    assert_eq!(coordinator.cache().class_members("session"), vec![d("a"), d("c")]);
    assert_eq!(coordinator.cache().class_count("session"), 2);
    assert_eq!(coordinator.cache().indexed_count("k"), 2);
}

#[test_log::test]
fn test_ttl_expiration() {
    let clock = ManualClock::new(0);
    let coordinator = CacheCoordinatorBuilder::<BaseDescription, u64>::new()
        .with_clock(clock.clone())
        .with_sliding_expiration(false)
        .build();
    let mut session = coordinator.session();
    let d = desc("a", &["k"]).with_ttl(100);

    session.find_or_create(d.clone(), |_| Ok(1), None).unwrap();
    clock.set(99);
    assert_eq!(session.find_or_create(d.clone(), |_| Ok(2), None).unwrap(), 1);
    clock.set(100);
    assert_eq!(session.find_or_create(d.clone(), |_| Ok(3), None).unwrap(), 3);
    assert_eq!(coordinator.cache().info(&d).unwrap().expire_at, Some(200));
}

#[test_log::test]
fn test_sliding_expiration() {
    let clock = ManualClock::new(0);
    let coordinator = CacheCoordinatorBuilder::<BaseDescription, u64>::new()
        .with_clock(clock.clone())
        .build();
    let mut session = coordinator.session();
    let d = desc("a", &["k"]).with_ttl(100);

    session.find_or_create(d.clone(), |_| Ok(1), None).unwrap();
    clock.set(99);
    assert_eq!(session.find_or_create(d.clone(), |_| Ok(2), None).unwrap(), 1);
    assert_eq!(coordinator.cache().info(&d).unwrap().expire_at, Some(199));

    clock.set(150);
    assert_eq!(session.find_or_create(d, |_| Ok(3), None).unwrap(), 1);
}

#[test_log::test]
fn test_expire_objects_removes_from_every_structure() {
    let recorder = Arc::new(Recorder::default());
    let clock = ManualClock::new(0);
    let coordinator = CacheCoordinatorBuilder::<BaseDescription, u64>::new()
        .with_clock(clock.clone())
        .with_event_listener(recorder.clone())
        .build();
    let mut session = coordinator.session();

    let a = desc("a", &["k"]).with_ttl(100).with_class(ObjectClass::new("c", 8));
    let b = desc("b", &["k"]).with_ttl(500);
    session.find_or_create(a.clone(), |_| Ok(1), None).unwrap();
    session.find_or_create(b.clone(), |_| Ok(2), None).unwrap();

    assert_eq!(coordinator.expire_objects(99), 0);
    assert_eq!(coordinator.expire_objects(100), 1);

    let cache = coordinator.cache();
    assert!(!cache.contains(&a));
    assert_eq!(cache.class_count("c"), 0);
    assert_eq!(cache.indexed_count("k"), 1);
    assert_eq!(cache.expiring_count(), 1);

    assert_eq!(coordinator.expire_objects(1000), 1);
    assert!(cache.is_empty());
    assert_eq!(cache.indexed_count("k"), 0);
    assert_eq!(cache.expiring_count(), 0);

    assert_eq!(
        recorder.events.lock().unwrap().as_slice(),
        &[(Event::Expire, "a".to_string()), (Event::Expire, "b".to_string())]
    );
}

#[test_log::test]
fn test_cross_process_staleness() {
    let clock = ManualClock::new(1000);
    let store = MemorySharedStore::new();
    let recorder = Arc::new(Recorder::default());
    let p1 = CacheCoordinatorBuilder::<BaseDescription, u64>::new()
        .with_clock(clock.clone())
        .with_shared_store(store.clone())
        .with_event_listener(recorder.clone())
        .build();
    let p2 = CacheCoordinatorBuilder::<BaseDescription, u64>::new()
        .with_clock(clock.clone())
        .with_shared_store(store.clone())
        .build();

    let d = desc("doc", &["space:1"]);
    let mut session = p1.session();
    session.find_or_create(d.clone(), |_| Ok(1), None).unwrap();

    clock.advance(1);
    invalidate(&p2, &keys(&["space:1"]));
    // Only the shared timestamp reaches the first process.
    assert!(p1.cache().contains(&d));

    clock.advance(1);
    assert_eq!(session.find_or_create(d.clone(), |_| Ok(2), None).unwrap(), 2);
    assert_eq!(recorder.events.lock().unwrap().as_slice(), &[(Event::Stale, "doc".to_string())]);

    // The rebuilt object is newer than the invalidation.
    clock.advance(1);
    assert_eq!(session.find_or_create(d, |_| Ok(3), None).unwrap(), 2);
}

#[test_log::test]
fn test_cross_process_staleness_through_files() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::new(1000);
    let build = |clock: &ManualClock| {
        CacheCoordinatorBuilder::<BaseDescription, u64>::new()
            .with_clock(clock.clone())
            .with_shared_store(FileSharedStore::open(dir.path()).unwrap())
            .build()
    };
    let p1 = build(&clock);
    let p2 = build(&clock);

    let d = desc("doc", &["space:1"]);
    let mut session = p1.session();
    session.find_or_create(d.clone(), |_| Ok(1), None).unwrap();

    clock.advance(1);
    invalidate(&p2, &keys(&["space:1"]));
    clock.advance(1);
    assert_eq!(session.find_or_create(d, |_| Ok(2), None).unwrap(), 2);
}

#[test_log::test]
fn test_eviction_is_idempotent() {
    let recorder = Arc::new(Recorder::default());
    let clock = ManualClock::new(0);
    let coordinator = CacheCoordinatorBuilder::<BaseDescription, u64>::new()
        .with_clock(clock.clone())
        .with_event_listener(recorder.clone())
        .build();
    let mut session = coordinator.session();
    let d = desc("a", &["k"]).with_ttl(10);
    session.find_or_create(d.clone(), |_| Ok(1), None).unwrap();

    clock.set(5);
    invalidate(&coordinator, &keys(&["k"]));
    invalidate(&coordinator, &keys(&["k"]));
    assert_eq!(coordinator.expire_objects(u64::MAX), 0);
    assert!(coordinator.cache().remove(&d).is_none());

    assert!(coordinator.cache().is_empty());
    assert_eq!(coordinator.cache().expiring_count(), 0);
    assert_eq!(recorder.events.lock().unwrap().len(), 1);
}
