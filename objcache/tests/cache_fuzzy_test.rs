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

//! Fuzzy test for the object cache.

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use objcache::{
    BaseDescription, CacheCoordinator, CacheCoordinatorBuilder, CacheDescription, CacheExecutor, KeySet,
    LocalLockManager, ObjectClass,
};
use rand::{rng, Rng};

const WORKERS: usize = 8;
const OPS: usize = 500;
const OBJECTS: usize = 32;
const KEYS: usize = 8;
const CLASS_CAPACITY: usize = 6;

struct Invalidate;

impl<D, V> CacheExecutor<D, V> for Invalidate {
    fn create(&mut self, _: &[D]) -> anyhow::Result<Vec<V>> {
        anyhow::bail!("nothing to create")
    }
}

fn description(i: usize) -> BaseDescription {
    let keys = [format!("key:{}", i % KEYS), format!("key:{}", (i * 7 + 3) % KEYS)];
    let mut d = BaseDescription::new(format!("object:{i}")).with_keys(keys);
    if i % 2 == 0 {
        d = d.with_class(ObjectClass::new("even", CLASS_CAPACITY));
    }
    if i % 3 == 0 {
        d = d.with_ttl(5);
    }
    d
}

fn worker(coordinator: CacheCoordinator<BaseDescription, Arc<u64>>, builds: Arc<AtomicU64>) {
    let mut session = coordinator.session();
    let mut rng = rng();

    for op in 0..OPS {
        match rng.random_range(0..10) {
            0 => {
                let keys: KeySet = [format!("key:{}", rng.random_range(0..KEYS))].into_iter().collect();
                session
                    .find_objects_and_execute(&[], Some(&keys), &mut Invalidate, None)
                    .unwrap();
            }
            1 => {
                let tx = format!("tx-{op}");
                session.begin_transaction(tx.as_str(), None).unwrap();
                let d = description(rng.random_range(0..OBJECTS));
                let build = |_: &BaseDescription| -> anyhow::Result<Arc<u64>> {
                    Ok(Arc::new(builds.fetch_add(1, Ordering::Relaxed)))
                };
                session.find_or_create(d, build, Some(tx.as_str())).unwrap();
                if rng.random_bool(0.5) {
                    session.commit_transaction(&tx).unwrap();
                } else {
                    session.rollback_transaction(&tx).unwrap();
                }
            }
            2 => {
                coordinator.expire_objects(coordinator.now());
            }
            _ => {
                let d = description(rng.random_range(0..OBJECTS));
                session
                    .find_or_create(d, |_| Ok(Arc::new(builds.fetch_add(1, Ordering::Relaxed))), None)
                    .unwrap();
            }
        }
        if op % 50 == 0 {
            thread::sleep(Duration::from_millis(1));
        }
    }
}

#[test_log::test]
fn test_concurrent_random_operations() {
    let locks = Arc::new(LocalLockManager::new().with_timeout(Duration::from_secs(30)));
    let coordinator = CacheCoordinatorBuilder::<BaseDescription, Arc<u64>>::new()
        .with_lock_manager(locks.clone())
        .build();
    let builds = Arc::new(AtomicU64::new(0));

    let handles = (0..WORKERS)
        .map(|_| {
            let coordinator = coordinator.clone();
            let builds = builds.clone();
            thread::spawn(move || worker(coordinator, builds))
        })
        .collect::<Vec<_>>();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(locks.held(), 0);

    let cache = coordinator.cache();
    assert!(cache.len() <= OBJECTS);
    assert!(cache.class_count("even") <= CLASS_CAPACITY);
    assert_eq!(cache.class_members("even").len(), cache.class_count("even"));
    for k in 0..KEYS {
        assert!(cache.indexed_count(&format!("key:{k}")) <= cache.len());
    }
    for i in 0..OBJECTS {
        let d = description(i);
        let Some(info) = cache.info(&d) else {
            continue;
        };
        assert_eq!(Some(&info.keys), d.invalidation_keys());
        assert_eq!(info.class.is_some(), i % 2 == 0);
        assert_eq!(info.expire_at.is_some(), i % 3 == 0);
    }

    let expiring = (0..OBJECTS)
        .filter(|i| i % 3 == 0 && cache.contains(&description(*i)))
        .count();
    assert_eq!(cache.expiring_count(), expiring);
    assert_eq!(coordinator.expire_objects(u64::MAX), expiring);
    assert_eq!(cache.expiring_count(), 0);
}
