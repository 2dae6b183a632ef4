//! Concurrent readers stress tests
//!
//! Lazy structures must be built exactly once no matter how many threads
//! race to touch them first.

mod common;

use common::{dir, leaf, sample_image, NxImage, Value};
use nx_rs::{NodeValue, NxFile, NxOptions};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};

const THREADS: usize = 8;

#[test]
fn test_concurrent_root() {
    let nx = NxFile::from_bytes(sample_image().build(), NxOptions::default()).unwrap();
    let barrier = Barrier::new(THREADS);
    let (nx_ref, barrier_ref) = (&nx, &barrier);

    let ids: Vec<_> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                s.spawn(move || {
                    let (nx, barrier) = (nx_ref, barrier_ref);
                    barrier.wait();
                    nx.root().unwrap().id()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert!(ids.iter().all(|&id| id == ids[0]));
    assert_eq!(nx.stats().nodes_decoded, 1);
}

#[test]
fn test_concurrent_child_materialization() {
    for options in [NxOptions::eager(), NxOptions::lazy(), NxOptions::low_memory()] {
        let nx = NxFile::from_bytes(sample_image().build(), options).unwrap();
        let barrier = Barrier::new(THREADS);

        std::thread::scope(|s| {
            for t in 0..THREADS {
                let nx = &nx;
                let barrier = &barrier;
                s.spawn(move || {
                    barrier.wait();
                    let path: &[&str] = match t % 3 {
                        0 => &["Back", "grassySoil", "origin"],
                        1 => &["info", "name"],
                        _ => &["Sound", "bgm"],
                    };
                    for _ in 0..100 {
                        nx.resolve_path(path).unwrap();
                    }
                });
            }
        });

        let stats = nx.stats();
        // root, Back, grassySoil, Sound, info
        assert_eq!(stats.children_materialized, 5);
        assert_eq!(stats.nodes_decoded, 12);
    }
}

#[test]
fn test_concurrent_blob_decode() {
    let nx = Arc::new(NxFile::from_bytes(sample_image().build(), NxOptions::default()).unwrap());
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let nx = nx.clone();
            let barrier = barrier.clone();
            std::thread::spawn(move || {
                barrier.wait();
                let bitmap = nx.bitmap(0).unwrap();
                let clip = nx.audio(0).unwrap();
                (bitmap, clip)
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for (bitmap, clip) in &results {
        assert!(Arc::ptr_eq(bitmap, &results[0].0));
        assert!(Arc::ptr_eq(clip, &results[0].1));
    }

    let stats = nx.stats();
    assert_eq!(stats.blobs_decoded, 2);
    assert_eq!(stats.offset_tables_built, 2);
    assert_eq!(stats.blob_cache_hits, 2 * THREADS as u64 - 2);
}

#[test]
fn test_lazy_strings_under_contention() {
    let texts: Vec<String> = (0..200).map(|i| format!("text-{}", i)).collect();
    let children = texts
        .iter()
        .enumerate()
        .map(|(i, t)| leaf(&format!("k{}", i), Value::Str(t.clone())))
        .collect();
    let nx = NxFile::from_bytes(NxImage::new(dir("", children)).build(), NxOptions::lazy()).unwrap();
    let mismatches = AtomicUsize::new(0);

    std::thread::scope(|s| {
        for t in 0..THREADS {
            let nx = &nx;
            let texts = &texts;
            let mismatches = &mismatches;
            s.spawn(move || {
                // Each thread walks the children from a different start
                let root = nx.root().unwrap();
                for step in 0..texts.len() {
                    let i = (step + t * 25) % texts.len();
                    let node = root.child(&format!("k{}", i)).unwrap().unwrap();
                    if node.value().unwrap() != NodeValue::String(texts[i].as_str().into()) {
                        mismatches.fetch_add(1, Ordering::Relaxed);
                    }
                }
            });
        }
    });

    assert_eq!(mismatches.load(Ordering::Relaxed), 0);
    // "" + 200 keys + 200 texts, each decoded once
    assert_eq!(nx.stats().strings_decoded, 401);
}

#[test]
fn test_close_while_reading() {
    let nx = NxFile::from_bytes(sample_image().build(), NxOptions::low_memory()).unwrap();

    std::thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                for _ in 0..500 {
                    // Either a value or Closed, never a panic
                    match nx.resolve_path(&["info", "name"]) {
                        Ok(node) => {
                            let _ = node.value();
                        }
                        Err(e) => assert!(matches!(e, nx_rs::NxError::Closed), "{:?}", e),
                    }
                }
            });
        }
        s.spawn(|| nx.close());
    });

    assert!(nx.is_closed());
}
