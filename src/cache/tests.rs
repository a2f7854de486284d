use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Arc;

use tempfile::TempDir;

use super::*;
use crate::document::{Hit, ResultSet};
use crate::hashing::fingerprint;

fn results(ids: &[(&str, f64)]) -> ResultSet {
    ids.iter()
        .map(|(id, score)| Hit {
            doc_id: id.to_string(),
            text: format!("Title: {id}"),
            score: *score,
            metadata: [("title".to_string(), id.to_string())].into(),
        })
        .collect::<Vec<_>>()
        .into()
}

fn open_in(dir: &TempDir) -> ResultCache {
    ResultCache::open(dir.path().join("cache.log"), 100).unwrap()
}

#[test]
fn test_status_header_values() {
    assert_eq!(CacheStatus::Hit.as_header_value(), "HIT");
    assert_eq!(CacheStatus::Miss.to_string(), "MISS");
    assert!(CacheStatus::Hit.is_hit());
    assert!(!CacheStatus::Miss.is_hit());
}

#[test]
fn test_get_missing() {
    let dir = TempDir::new().unwrap();
    let cache = open_in(&dir);

    assert!(cache.get(&fingerprint("q", 20, 3)).unwrap().is_none());
    assert!(cache.is_empty());
}

#[test]
fn test_set_then_get() {
    let dir = TempDir::new().unwrap();
    let cache = open_in(&dir);
    let fp = fingerprint("summer dress", 20, 3);
    let value = results(&[("d2", 4.5), ("d4", 1.25)]);

    cache.set(fp, &value).unwrap();

    assert_eq!(cache.get(&fp).unwrap(), Some(value));
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_empty_result_set_is_cached() {
    let dir = TempDir::new().unwrap();
    let cache = open_in(&dir);
    let fp = fingerprint("nothing", 20, 3);

    cache.set(fp, &ResultSet::empty()).unwrap();

    assert_eq!(cache.get(&fp).unwrap(), Some(ResultSet::empty()));
}

#[test]
fn test_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let fp = fingerprint("hoodie", 20, 3);
    let value = results(&[("d1", 2.0)]);

    {
        let cache = open_in(&dir);
        cache.set(fp, &value).unwrap();
    }

    let reopened = open_in(&dir);
    assert_eq!(reopened.len(), 1);
    assert_eq!(reopened.get(&fp).unwrap(), Some(value));
}

#[test]
fn test_last_write_wins() {
    let dir = TempDir::new().unwrap();
    let fp = fingerprint("shoes", 20, 3);

    {
        let cache = open_in(&dir);
        cache.set(fp, &results(&[("old", 1.0)])).unwrap();
        cache.set(fp, &results(&[("new", 2.0)])).unwrap();
        assert_eq!(cache.get(&fp).unwrap(), Some(results(&[("new", 2.0)])));
    }

    let reopened = open_in(&dir);
    assert_eq!(reopened.len(), 1);
    assert_eq!(reopened.get(&fp).unwrap(), Some(results(&[("new", 2.0)])));
}

#[test]
fn test_torn_tail_is_truncated() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cache.log");
    let fp = fingerprint("dress", 20, 3);

    let clean_len = {
        let log = ResultLog::open(&path).unwrap();
        log.set(fp, b"[]".to_vec()).unwrap();
        log.size_bytes()
    };

    // Half-written frame from a crash mid-append.
    let mut file = OpenOptions::new().append(true).open(&path).unwrap();
    file.write_all(&[42, 0, 0, 0, 1, 2, 3]).unwrap();
    drop(file);

    let log = ResultLog::open(&path).unwrap();
    assert_eq!(log.size_bytes(), clean_len);
    assert_eq!(std::fs::metadata(&path).unwrap().len(), clean_len);
    assert_eq!(log.get(&fp).unwrap(), Some(b"[]".to_vec()));

    let other = fingerprint("other", 20, 3);
    log.set(other, b"[1]".to_vec()).unwrap();
    drop(log);

    let log = ResultLog::open(&path).unwrap();
    assert_eq!(log.len(), 2);
    assert_eq!(log.get(&other).unwrap(), Some(b"[1]".to_vec()));
}

#[test]
fn test_corrupted_record_is_reported() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cache.log");
    let fp = fingerprint("dress", 20, 3);

    let log = ResultLog::open(&path).unwrap();
    log.set(fp, b"[\"payload\"]".to_vec()).unwrap();

    // Flip the last byte of the frame in place.
    let len = log.size_bytes();
    let mut bytes = std::fs::read(&path).unwrap();
    bytes[(len - 1) as usize] ^= 0xFF;
    std::fs::write(&path, &bytes).unwrap();

    let err = log.get(&fp).unwrap_err();
    assert!(err.is_corruption());
}

#[test]
fn test_corrupted_value_through_cache() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cache.log");
    let fp = fingerprint("dress", 20, 3);

    // Well-framed record whose value is not a result set.
    ResultLog::open(&path)
        .unwrap()
        .set(fp, b"not json".to_vec())
        .unwrap();

    let cache = ResultCache::open(&path, 10).unwrap();
    assert!(cache.get(&fp).unwrap_err().is_corruption());
}

#[test]
fn test_clear() {
    let dir = TempDir::new().unwrap();
    let cache = open_in(&dir);
    let fp = fingerprint("q", 20, 3);

    cache.set(fp, &results(&[("d1", 1.0)])).unwrap();
    cache.clear().unwrap();

    assert!(cache.get(&fp).unwrap().is_none());
    assert_eq!(cache.size_bytes(), 0);

    drop(cache);
    assert!(open_in(&dir).is_empty());
}

#[test]
fn test_compact_keeps_latest() {
    let dir = TempDir::new().unwrap();
    let cache = open_in(&dir);
    let a = fingerprint("a", 20, 3);
    let b = fingerprint("b", 20, 3);

    for i in 0..5 {
        cache.set(a, &results(&[("a", i as f64)])).unwrap();
    }
    cache.set(b, &results(&[("b", 1.0)])).unwrap();

    let report = cache.compact().unwrap();

    assert_eq!(report.live_records, 2);
    assert!(report.bytes_after < report.bytes_before);
    assert_eq!(cache.size_bytes(), report.bytes_after);

    cache.l1().clear();
    assert_eq!(cache.get(&a).unwrap(), Some(results(&[("a", 4.0)])));
    assert_eq!(cache.get(&b).unwrap(), Some(results(&[("b", 1.0)])));

    // Appends after compaction land on the new file.
    let c = fingerprint("c", 20, 3);
    cache.set(c, &results(&[("c", 1.0)])).unwrap();
    drop(cache);

    let reopened = open_in(&dir);
    assert_eq!(reopened.len(), 3);
    assert_eq!(reopened.get(&a).unwrap(), Some(results(&[("a", 4.0)])));
}

#[test]
fn test_l1_does_not_change_results() {
    let dir = TempDir::new().unwrap();
    let cache = open_in(&dir);
    let fp = fingerprint("q", 20, 3);
    let value = results(&[("d1", 0.5), ("d2", 0.25)]);

    cache.set(fp, &value).unwrap();
    let warm = cache.get(&fp).unwrap();

    cache.l1().clear();
    let cold = cache.get(&fp).unwrap();

    assert_eq!(warm, cold);
}

#[test]
fn test_creates_parent_directories() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("deeper").join("cache.log");

    let cache = ResultCache::open(&path, 10).unwrap();
    cache
        .set(fingerprint("q", 1, 1), &ResultSet::empty())
        .unwrap();

    assert!(path.exists());
}

#[test]
fn test_concurrent_readers_and_writers() {
    let dir = TempDir::new().unwrap();
    let cache = Arc::new(open_in(&dir));

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let cache = Arc::clone(&cache);
            std::thread::spawn(move || {
                for i in 0..25 {
                    let fp = fingerprint(&format!("q{}", i % 5), 20, t % 2 + 1);
                    let value = results(&[(&format!("d{}", i % 5), 1.0)]);
                    cache.set(fp, &value).unwrap();
                    assert_eq!(cache.get(&fp).unwrap(), Some(value));
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(cache.len(), 10);
}

#[test]
fn test_mock_store_failures() {
    let store = MockResultStore::new();
    let fp = fingerprint("q", 20, 3);

    store.set_fail_writes(true);
    assert!(matches!(
        store.set(fp, &ResultSet::empty()),
        Err(CacheError::WriteFailed { .. })
    ));
    assert!(store.is_empty());

    store.set_fail_writes(false);
    store.set(fp, &results(&[("d1", 1.0)])).unwrap();
    store.corrupt(&fp);
    assert!(store.get(&fp).unwrap_err().is_corruption());
    assert_eq!(store.set_count(), 2);
    assert_eq!(store.get_count(), 1);
}

#[test]
fn test_clear_from_another_handle() {
    let dir = TempDir::new().unwrap();
    let live = open_in(&dir);
    let first = fingerprint("first", 20, 3);
    let second = fingerprint("second", 20, 3);

    live.set(first, &results(&[("d1", 1.0)])).unwrap();
    assert!(live.get(&first).unwrap().is_some());

    open_in(&dir).clear().unwrap();

    assert!(live.get(&first).unwrap().is_none());
    live.set(second, &results(&[("d2", 2.0)])).unwrap();
    assert_eq!(live.get(&second).unwrap(), Some(results(&[("d2", 2.0)])));
    drop(live);

    let reopened = open_in(&dir);
    assert!(reopened.get(&first).unwrap().is_none());
    assert_eq!(reopened.get(&second).unwrap(), Some(results(&[("d2", 2.0)])));
}

#[test]
fn test_cleared_and_refilled_by_another_handle() {
    let dir = TempDir::new().unwrap();
    let live = open_in(&dir);
    let mine = fingerprint("mine", 20, 3);
    let theirs = fingerprint("theirs", 20, 3);

    live.set(mine, &results(&[("short", 1.0)])).unwrap();

    let other = open_in(&dir);
    other.clear().unwrap();
    other
        .set(theirs, &results(&[("a-much-longer-document-id", 9.0), ("x", 1.0)]))
        .unwrap();
    drop(other);

    assert!(live.get(&mine).unwrap().is_none());
    assert_eq!(
        live.get(&theirs).unwrap(),
        Some(results(&[("a-much-longer-document-id", 9.0), ("x", 1.0)]))
    );
    live.set(mine, &results(&[("again", 2.0)])).unwrap();
    assert_eq!(live.get(&mine).unwrap(), Some(results(&[("again", 2.0)])));
    assert_eq!(open_in(&dir).len(), 2);
}

#[test]
fn test_deleted_file_is_recreated() {
    let dir = TempDir::new().unwrap();
    let live = open_in(&dir);
    let fp = fingerprint("q", 20, 3);

    live.set(fp, &results(&[("d1", 1.0)])).unwrap();
    std::fs::remove_file(live.path()).unwrap();

    assert!(live.get(&fp).unwrap().is_none());
    live.set(fp, &results(&[("d2", 2.0)])).unwrap();
    assert_eq!(live.get(&fp).unwrap(), Some(results(&[("d2", 2.0)])));

    drop(live);
    assert_eq!(
        open_in(&dir).get(&fp).unwrap(),
        Some(results(&[("d2", 2.0)]))
    );
}

#[test]
fn test_compaction_by_another_handle() {
    let dir = TempDir::new().unwrap();
    let live = open_in(&dir);
    let a = fingerprint("a", 20, 3);
    let b = fingerprint("b", 20, 3);

    for i in 0..4 {
        live.set(a, &results(&[("a", i as f64)])).unwrap();
    }
    live.set(b, &results(&[("b", 1.0)])).unwrap();

    open_in(&dir).compact().unwrap();

    live.l1().clear();
    assert_eq!(live.get(&a).unwrap(), Some(results(&[("a", 3.0)])));
    assert_eq!(live.get(&b).unwrap(), Some(results(&[("b", 1.0)])));

    let c = fingerprint("c", 20, 3);
    live.set(c, &results(&[("c", 1.0)])).unwrap();
    drop(live);
    assert_eq!(open_in(&dir).len(), 3);
}

#[test]
fn test_log_generation_moves_on_external_clear() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("results.log");
    let log = ResultLog::open(&path).unwrap();
    let fp = fingerprint("q", 20, 3);

    log.set(fp, b"one".to_vec()).unwrap();
    let before = log.generation();
    assert!(!log.reload_if_changed().unwrap());

    ResultLog::open(&path).unwrap().clear().unwrap();

    assert!(log.reload_if_changed().unwrap());
    assert!(log.generation() > before);
    assert!(log.get(&fp).unwrap().is_none());

    log.set(fp, b"two".to_vec()).unwrap();
    assert_eq!(log.get(&fp).unwrap(), Some(b"two".to_vec()));
}

#[test]
fn test_clear_racing_readers_leaves_nothing_behind() {
    let dir = TempDir::new().unwrap();
    let cache = Arc::new(open_in(&dir));
    let keys: Vec<_> = (0..16)
        .map(|i| fingerprint(&format!("q{i}"), 20, 3))
        .collect();
    for (i, fp) in keys.iter().enumerate() {
        cache.set(*fp, &results(&[(&format!("d{i}"), 1.0)])).unwrap();
    }

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let keys = keys.clone();
            std::thread::spawn(move || {
                for _ in 0..50 {
                    for fp in &keys {
                        cache.get(fp).unwrap();
                    }
                }
            })
        })
        .collect();

    cache.clear().unwrap();

    for reader in readers {
        reader.join().unwrap();
    }

    for fp in &keys {
        assert!(cache.get(fp).unwrap().is_none());
    }
    assert!(cache.is_empty());
}

#[test]
fn test_racing_writes_to_one_fingerprint_agree_across_tiers() {
    let dir = TempDir::new().unwrap();
    let cache = Arc::new(open_in(&dir));
    let fp = fingerprint("contended", 20, 3);

    let writers: Vec<_> = (0..8)
        .map(|t| {
            let cache = Arc::clone(&cache);
            std::thread::spawn(move || {
                for i in 0..20 {
                    let value = results(&[(&format!("t{t}-{i}"), t as f64)]);
                    cache.set(fp, &value).unwrap();
                }
            })
        })
        .collect();

    for writer in writers {
        writer.join().unwrap();
    }

    let served = cache.get(&fp).unwrap();
    cache.l1().clear();
    assert_eq!(cache.get(&fp).unwrap(), served);
    assert_eq!(open_in(&dir).get(&fp).unwrap(), served);
}
