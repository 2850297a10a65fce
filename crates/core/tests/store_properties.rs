//! Store behavior over the in-memory backend

use std::collections::HashSet;
use std::sync::Arc;

use s3kv_core::{Error, ListOptions, MemoryStore, Record, Store, transfer};

const BUCKET: &str = "props";

fn setup() -> (MemoryStore, Store) {
    let backend = MemoryStore::new();
    let store = Store::new(Arc::new(backend.clone()), BUCKET);
    (backend, store)
}

#[tokio::test]
async fn round_trip_including_empty_value() {
    let (_, store) = setup();

    store.set("k", "hello", None).await.unwrap();
    assert_eq!(store.get("k", None).await.unwrap(), b"hello");

    store.set("empty", Vec::new(), None).await.unwrap();
    assert!(store.get("empty", None).await.unwrap().is_empty());
    assert_eq!(store.get_info("empty", None).await.unwrap().size(), 0);
}

#[tokio::test]
async fn overwrite_replaces_value() {
    let (_, store) = setup();
    store.set("k", "v1", None).await.unwrap();
    store.set("k", "v2", None).await.unwrap();
    assert_eq!(store.get("k", None).await.unwrap(), b"v2");
}

#[tokio::test]
async fn missing_key_is_not_found() {
    let (_, store) = setup();
    assert!(matches!(
        store.get("absent", None).await,
        Err(Error::NotFound(_))
    ));
    assert!(matches!(
        store.get_info("absent", None).await,
        Err(Error::NotFound(_))
    ));
}

#[tokio::test]
async fn prefix_listing_is_ordered() {
    let (_, store) = setup();
    for key in ["a/3", "a/1", "b/1", "a/2"] {
        store.set(key, "x", None).await.unwrap();
    }

    assert_eq!(store.list_ar("a/", None).await, vec!["a/1", "a/2", "a/3"]);
}

#[tokio::test]
async fn max_keys_caps_list_and_len() {
    let (_, store) = setup();
    for i in 0..10 {
        store.set(&format!("n/{i}"), "x", None).await.unwrap();
    }

    let capped = || Some(ListOptions::new().max_keys(3));
    assert_eq!(store.list_ar("n/", capped()).await.len(), 3);
    assert_eq!(store.list_len("n/", capped()).await, 3);
    assert_eq!(store.list_len("n/", None).await, 10);
}

#[tokio::test]
async fn folder_delete_removes_everything_below() {
    let (backend, store) = setup();
    for key in ["f/", "f/1", "f/2", "f/sub/", "f/sub/x", "g"] {
        store.set(key, "x", None).await.unwrap();
    }

    store.del("f/", None).await.unwrap();
    assert_eq!(backend.keys(BUCKET), vec!["g"]);
}

#[tokio::test]
async fn folder_delete_stops_at_first_failure() {
    let (backend, store) = setup();
    for key in ["f/", "f/1", "f/2"] {
        store.set(key, "x", None).await.unwrap();
    }
    backend.fail_remove("f/1");

    assert!(matches!(store.del("f/", None).await, Err(Error::Backend(_))));

    let left = backend.keys(BUCKET);
    assert!(left.contains(&"f/".to_string()));
    assert!(left.contains(&"f/1".to_string()));
    assert!(left.contains(&"f/2".to_string()));
}

#[tokio::test]
async fn list_body_returns_every_record() {
    let (_, store) = setup();
    let mut expected = HashSet::new();
    for i in 0..5 {
        let key = format!("r/{i}");
        let value = format!("value-{i}").into_bytes();
        store.set(&key, value.clone(), None).await.unwrap();
        expected.insert(Record { key, value });
    }

    let records: HashSet<Record> = store.list_body_ar("r/", None).await.into_iter().collect();
    assert_eq!(records, expected);

    let capped = store.clone().with_list_body_concurrency(2);
    let records: HashSet<Record> = capped.list_body_ar("r/", None).await.into_iter().collect();
    assert_eq!(records, expected);
}

#[tokio::test]
async fn copy_refuses_existing_destination() {
    let (_, store) = setup();
    store.set("src", "new", None).await.unwrap();
    store.set("dst", "old", None).await.unwrap();

    assert!(matches!(
        store.copy("src", "dst", None).await,
        Err(Error::AlreadyExists(_))
    ));
    assert_eq!(store.get("dst", None).await.unwrap(), b"old");
}

#[tokio::test]
async fn copy_keeps_source() {
    let (_, store) = setup();
    store.set("src", "data", None).await.unwrap();

    store.copy("src", "dst", None).await.unwrap();
    assert_eq!(store.get("src", None).await.unwrap(), b"data");
    assert_eq!(store.get("dst", None).await.unwrap(), b"data");
}

#[tokio::test]
async fn move_is_not_atomic() {
    let (backend, store) = setup();
    store.set("src", "data", None).await.unwrap();
    backend.fail_remove("src");

    assert!(store.move_object("src", "dst", None).await.is_err());
    assert_eq!(store.get("src", None).await.unwrap(), b"data");
    assert_eq!(store.get("dst", None).await.unwrap(), b"data");

    backend.clear_faults();
    store.del("dst", None).await.unwrap();
    store.move_object("src", "dst", None).await.unwrap();
    assert_eq!(backend.keys(BUCKET), vec!["dst"]);
}

#[tokio::test]
async fn transfer_round_trip_through_store() {
    let dir = tempfile::TempDir::new().unwrap();
    let hello = dir.path().join("hello.txt");
    let hello2 = dir.path().join("hello2.txt");
    std::fs::write(&hello, "hi").unwrap();

    let (_, store) = setup();
    let connect = || std::future::ready(Ok(store.clone()));

    let hello_arg = hello.to_string_lossy().to_string();
    let hello2_arg = hello2.to_string_lossy().to_string();

    let up = transfer(&[hello_arg, "s3:notes/a".to_string()], connect)
        .await
        .unwrap();
    assert_eq!(up, 2);
    assert_eq!(store.get("notes/a", None).await.unwrap(), b"hi");

    let down = transfer(&["s3:notes/a".to_string(), hello2_arg], connect)
        .await
        .unwrap();
    assert_eq!(down, 2);
    assert_eq!(std::fs::read_to_string(&hello2).unwrap(), "hi");
}
