//! Integration tests for the search result cache
//!
//! These exercise the cache the way separate processes would see it: several
//! independent instances pointed at the same directory.

use llmctl::cache::{SearchCache, SearchOptions, SearchResult, cache_key};
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

fn results(n: usize) -> Vec<SearchResult> {
    (0..n)
        .map(|i| SearchResult {
            title: format!("Result {}", i),
            link: format!("https://example.com/{}", i),
            content: "snippet".to_string(),
            ..Default::default()
        })
        .collect()
}

#[tokio::test]
async fn test_entries_visible_across_instances() {
    let temp_dir = TempDir::new().unwrap();
    let writer = SearchCache::new(temp_dir.path());
    let reader = SearchCache::new(temp_dir.path());

    writer
        .set("shared", &SearchOptions::default(), results(3), Duration::from_secs(60))
        .await
        .unwrap();

    assert_eq!(
        reader.get("shared", &SearchOptions::default()).await,
        Some(results(3))
    );
}

#[tokio::test]
async fn test_concurrent_instances_never_see_torn_entries() {
    let temp_dir = TempDir::new().unwrap();
    let mut handles = Vec::new();

    for writer in 0..4 {
        let cache = SearchCache::new(temp_dir.path());
        handles.push(tokio::spawn(async move {
            for round in 0..10 {
                cache
                    .set(
                        "contended",
                        &SearchOptions::default(),
                        results(1 + (writer + round) % 5),
                        Duration::from_secs(60),
                    )
                    .await
                    .unwrap();
            }
        }));
    }
    for _ in 0..4 {
        let cache = SearchCache::new(temp_dir.path());
        handles.push(tokio::spawn(async move {
            for _ in 0..20 {
                if let Some(found) = cache.get("contended", &SearchOptions::default()).await {
                    assert!(!found.is_empty() && found.len() <= 5);
                }
                tokio::task::yield_now().await;
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let leftovers: Vec<_> = fs::read_dir(temp_dir.path())
        .unwrap()
        .filter_map(Result::ok)
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty(), "temp files left behind: {:?}", leftovers);

    let stats = SearchCache::new(temp_dir.path()).stats().await.unwrap();
    assert_eq!(stats.total_entries, 1);
}

#[tokio::test]
async fn test_fresh_temp_files_survive_cleanup() {
    let temp_dir = TempDir::new().unwrap();
    let cache = SearchCache::new(temp_dir.path());
    let in_progress = temp_dir
        .path()
        .join(format!(".{}.writer.tmp", cache_key("q", &SearchOptions::default())));
    fs::write(&in_progress, b"{").unwrap();

    let stats = cache.cleanup().await.unwrap();

    assert_eq!(stats.removed_temp, 0);
    assert_eq!(stats.scanned, 0);
    assert!(in_progress.exists());
}

#[tokio::test]
async fn test_expired_entry_is_swept_after_miss() {
    let temp_dir = TempDir::new().unwrap();
    let cache = SearchCache::new(temp_dir.path());
    cache
        .set("old", &SearchOptions::default(), results(1), Duration::from_millis(10))
        .await
        .unwrap();
    let entry_path = temp_dir
        .path()
        .join(format!("{}.json", cache_key("old", &SearchOptions::default())));
    assert!(entry_path.exists());

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(cache.get("old", &SearchOptions::default()).await.is_none());

    // The miss schedules a background sweep; an explicit cleanup waits for it.
    cache.cleanup().await.unwrap();
    assert!(!entry_path.exists());
}
