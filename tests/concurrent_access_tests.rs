/// Concurrent access tests
///
/// Parallel readers and writers against one shared master.
/// Run with: cargo test --test concurrent_access_tests
use bitemporal_master::{
    HistoryRequest, Master, MasterConfig, MasterError, SearchRequest, VersionCorrection, VersionId,
};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Barrier;

fn shared_master(enforce_unique_keys: bool) -> Arc<Master<String>> {
    let config = MasterConfig::new("Conc").enforce_unique_keys(enforce_unique_keys);
    Arc::new(Master::new(config).unwrap())
}

#[tokio::test]
async fn test_concurrent_reads() {
    let master = shared_master(false);
    for i in 0..100 {
        master.add(format!("data_{}", i), format!("data_{}", i)).await.unwrap();
    }

    let mut handles = vec![];
    for task_id in 0..10 {
        let master = Arc::clone(&master);
        handles.push(tokio::spawn(async move {
            for _ in 0..20 {
                let page = master.search(&SearchRequest::new()).await.unwrap();
                assert_eq!(page.total(), 100, "Task {} read incorrect count", task_id);
            }
        }));
    }

    for handle in handles {
        handle.await.unwrap();
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_adds_allocate_distinct_ids() {
    let master = shared_master(false);
    let num_tasks = 5;
    let adds_per_task = 20;

    let mut handles = vec![];
    for task_id in 0..num_tasks {
        let master = Arc::clone(&master);
        handles.push(tokio::spawn(async move {
            let mut ids = Vec::new();
            for i in 0..adds_per_task {
                let key = format!("{}-{}", task_id, i);
                ids.push(master.add(key.clone(), key).await.unwrap());
            }
            ids
        }));
    }

    let mut seen = HashSet::new();
    for handle in handles {
        for uid in handle.await.unwrap() {
            assert!(seen.insert(uid.object_id().clone()));
        }
    }
    assert_eq!(master.object_count().await, num_tasks * adds_per_task);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_updates_to_one_object_are_serialized() {
    let master = shared_master(false);
    let uid = master.add("v".to_string(), "doc").await.unwrap();
    let latest = uid.to_latest();
    let barrier = Arc::new(Barrier::new(8));

    let mut handles = vec![];
    for task_id in 0..8 {
        let master = Arc::clone(&master);
        let barrier = Arc::clone(&barrier);
        let latest = latest.clone();
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            for i in 0..10 {
                master.update(&latest, format!("{}-{}", task_id, i)).await.unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let current = master.get(&latest).await.unwrap();
    assert_eq!(current.version_id, VersionId::new(81));

    // The version axis is still one unbroken chain.
    let mut rows = master
        .history(&HistoryRequest::new(uid.object_id().clone()))
        .await
        .unwrap()
        .items;
    assert_eq!(rows.len(), 81);
    rows.sort_by_key(|row| row.version_from());
    for pair in rows.windows(2) {
        assert_eq!(pair[0].version_to(), Some(pair[1].version_from()));
        assert!(pair[0].version_id < pair[1].version_id);
    }
    assert!(rows.last().unwrap().version_to().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_read_write_mix() {
    let master = shared_master(false);
    let uid = master.add("0".to_string(), "counter").await.unwrap();
    let oid = uid.object_id().clone();
    let barrier = Arc::new(Barrier::new(4));

    let writer = {
        let master = Arc::clone(&master);
        let barrier = Arc::clone(&barrier);
        let latest = uid.to_latest();
        tokio::spawn(async move {
            barrier.wait().await;
            for i in 1..=50 {
                master.update(&latest, i.to_string()).await.unwrap();
            }
        })
    };

    let mut readers = vec![];
    for _ in 0..3 {
        let master = Arc::clone(&master);
        let barrier = Arc::clone(&barrier);
        let oid = oid.clone();
        readers.push(tokio::spawn(async move {
            barrier.wait().await;
            let mut last = 0u64;
            for _ in 0..50 {
                let row = master.get_at(&oid, VersionCorrection::LATEST).await.unwrap();
                let seen: u64 = row.value().parse().unwrap();
                assert!(seen >= last, "a reader went back in time");
                last = seen;
            }
        }));
    }

    writer.await.unwrap();
    for reader in readers {
        reader.await.unwrap();
    }
    assert_eq!(master.get_at(&oid, VersionCorrection::LATEST).await.unwrap().value(), "50");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_adds_of_one_business_key() {
    let master = shared_master(true);
    let barrier = Arc::new(Barrier::new(10));

    let mut handles = vec![];
    for _ in 0..10 {
        let master = Arc::clone(&master);
        let barrier = Arc::clone(&barrier);
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            master.add("EUR".to_string(), "EUR").await
        }));
    }

    let mut added = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => added += 1,
            Err(err) => assert!(matches!(err, MasterError::DuplicateKey(_))),
        }
    }
    assert_eq!(added, 1);
    assert_eq!(master.object_count().await, 1);
}
