//! Buffer pool behaviour across the disk boundary and across threads.

use std::sync::Arc;
use std::thread;

use pagedb::buffer::BufferPoolManager;
use pagedb::common::PageId;
use pagedb::storage::DiskManager;
use tempfile::tempdir;

fn create_bpm(pool_size: usize) -> (BufferPoolManager, tempfile::TempDir) {
    let dir = tempdir().unwrap();
    let dm = DiskManager::create(dir.path().join("pool.db")).unwrap();
    (BufferPoolManager::new(pool_size, 2, dm).unwrap(), dir)
}

#[test]
fn test_contents_survive_repeated_eviction() {
    let (bpm, _dir) = create_bpm(3);

    let pages: Vec<PageId> = (0u8..12)
        .map(|i| {
            let mut guard = bpm.new_page().unwrap();
            guard.as_mut_slice()[..2].copy_from_slice(&[i, i ^ 0x5A]);
            guard.page_id()
        })
        .collect();

    for _ in 0..2 {
        for (i, &pid) in pages.iter().enumerate().rev() {
            let guard = bpm.fetch_page_read(pid).unwrap();
            assert_eq!(&guard.as_slice()[..2], &[i as u8, i as u8 ^ 0x5A]);
        }
    }
    assert!(bpm.stats().snapshot().evictions >= 9);
    assert!(bpm.page_count() <= bpm.pool_size());
}

#[test]
fn test_flush_all_then_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("reopen.db");

    let pid = {
        let bpm = BufferPoolManager::new(8, 2, DiskManager::create(&path).unwrap()).unwrap();
        let mut guard = bpm.new_page().unwrap();
        guard.as_mut_slice()[..6].copy_from_slice(b"stable");
        let pid = guard.page_id();
        drop(guard);
        bpm.flush_all_pages().unwrap();
        pid
    };

    let bpm = BufferPoolManager::new(8, 2, DiskManager::open(&path).unwrap()).unwrap();
    let guard = bpm.fetch_page_read(pid).unwrap();
    assert_eq!(&guard.as_slice()[..6], b"stable");
}

#[test]
fn test_deleted_slot_is_reused_zeroed() {
    let (bpm, _dir) = create_bpm(4);

    let victim = {
        let mut guard = bpm.new_page().unwrap();
        guard.as_mut_slice()[100] = 0xEE;
        guard.page_id()
    };
    bpm.delete_page(victim).unwrap();
    // Deleting again is indistinguishable from the first time.
    bpm.delete_page(victim).unwrap();

    let guard = bpm.new_page().unwrap();
    assert_eq!(guard.page_id(), victim);
    assert!(guard.as_slice().iter().all(|&b| b == 0));
    assert_eq!(bpm.stats().snapshot().pages_deleted, 1);
}

#[test]
fn test_parallel_writers_on_disjoint_pages() {
    let (bpm, _dir) = create_bpm(8);
    let bpm = Arc::new(bpm);

    let pages: Vec<PageId> = (0..8).map(|_| bpm.new_page().unwrap().page_id()).collect();

    let handles: Vec<_> = pages
        .iter()
        .enumerate()
        .map(|(i, &pid)| {
            let bpm = Arc::clone(&bpm);
            thread::spawn(move || {
                for round in 0..40u32 {
                    let mut guard = bpm.fetch_page_write(pid).unwrap();
                    let stamp = ((i as u32) << 16) | round;
                    guard.as_mut_slice()[..4].copy_from_slice(&stamp.to_le_bytes());
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    for (i, &pid) in pages.iter().enumerate() {
        let guard = bpm.fetch_page_read(pid).unwrap();
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&guard.as_slice()[..4]);
        assert_eq!(u32::from_le_bytes(raw), ((i as u32) << 16) | 39);
    }
}

#[test]
fn test_stats_track_hits_and_misses() {
    let (bpm, _dir) = create_bpm(2);
    let pid = bpm.new_page().unwrap().page_id();

    for _ in 0..5 {
        drop(bpm.fetch_page_read(pid).unwrap());
    }
    let snap = bpm.stats().snapshot();
    assert_eq!(snap.cache_hits, 5);
    assert_eq!(snap.cache_misses, 0);

    let cold = bpm.new_page().unwrap().page_id();
    drop(bpm.new_page().unwrap());
    // `pid` has reached K accesses, so the cold page was the victim.
    assert!(bpm.contains_page(pid));
    assert!(!bpm.contains_page(cold));

    drop(bpm.fetch_page_read(cold).unwrap());
    let snap = bpm.stats().snapshot();
    assert_eq!(snap.cache_misses, 1);
    assert_eq!(snap.evictions, 2);
    assert!(snap.hit_rate() > 0.5);
}
