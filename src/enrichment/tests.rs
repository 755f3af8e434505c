use super::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

fn page(url: &str, title: &str, body: &str) -> FetchedContent {
    FetchedContent {
        url: url.to_string(),
        title: Some(title.to_string()),
        body: body.to_string(),
    }
}

fn enricher() -> ContentEnricher {
    ContentEnricher::new(EnrichmentOptions {
        max_urls: 5,
        max_concurrent: 4,
        timeout: Some(Duration::from_secs(5)),
        max_content_chars: 1_000,
    })
}

#[tokio::test]
async fn test_prompt_without_urls_is_unchanged() {
    let calls = AtomicUsize::new(0);
    let prompt = "Explain ownership in Rust.";

    let result = enricher()
        .enrich(prompt, &CancellationToken::new(), |url| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok(page(&url, "never", "never")) }
        })
        .await;

    assert_eq!(result, prompt);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_blocks_follow_prompt_order() {
    let prompt = "Compare https://u1.example/ https://u2.example/ https://u3.example/";

    let result = enricher()
        .enrich(prompt, &CancellationToken::new(), |url| async move {
            match url.as_str() {
                "https://u1.example/" => {
                    tokio::time::sleep(Duration::from_millis(80)).await;
                    Ok(page(&url, "First", "first body"))
                }
                "https://u2.example/" => {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    Ok(page(&url, "Second", "second body"))
                }
                _ => Err(ApiError::Status {
                    status: 404,
                    body: "not found".to_string(),
                }),
            }
        })
        .await;

    let expected = format!(
        "{}\n\n{}\n\n{}",
        prompt,
        "--- Content from https://u1.example/ ---\nTitle: First\n\nfirst body\n--- End of content from https://u1.example/ ---",
        "--- Content from https://u2.example/ ---\nTitle: Second\n\nsecond body\n--- End of content from https://u2.example/ ---",
    );
    assert_eq!(result, expected);
    assert!(!result.contains("u3.example/ ---"));
}

#[tokio::test]
async fn test_fetches_run_concurrently() {
    let prompt = "https://a.example https://b.example https://c.example https://d.example";
    let start = Instant::now();

    let result = enricher()
        .enrich(prompt, &CancellationToken::new(), |url| async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok(page(&url, "t", "b"))
        })
        .await;

    assert_eq!(result.matches("--- Content from").count(), 4);
    assert!(start.elapsed() < Duration::from_millis(350));
}

#[tokio::test]
async fn test_concurrency_is_bounded() {
    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let enricher = ContentEnricher::new(EnrichmentOptions {
        max_concurrent: 2,
        ..enricher().options().clone()
    });
    let prompt = "https://a.example https://b.example https://c.example https://d.example https://e.example";

    enricher
        .enrich(prompt, &CancellationToken::new(), |url| {
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok(page(&url, "t", "b"))
            }
        })
        .await;

    assert_eq!(peak.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_all_failures_return_prompt() {
    let prompt = "Read https://down.example/page";

    let result = enricher()
        .enrich(prompt, &CancellationToken::new(), |_url| async move {
            Err(ApiError::Connection("refused".to_string()))
        })
        .await;

    assert_eq!(result, prompt);
}

#[tokio::test]
async fn test_timeout_keeps_completed_fetches() {
    let enricher = ContentEnricher::new(EnrichmentOptions {
        timeout: Some(Duration::from_millis(100)),
        ..enricher().options().clone()
    });
    let prompt = "https://fast.example/ https://slow.example/";
    let start = Instant::now();

    let result = enricher
        .enrich(prompt, &CancellationToken::new(), |url| async move {
            if url.contains("slow") {
                tokio::time::sleep(Duration::from_secs(10)).await;
            }
            Ok(page(&url, "t", "body"))
        })
        .await;

    assert!(start.elapsed() < Duration::from_secs(2));
    assert!(result.contains("--- Content from https://fast.example/ ---"));
    assert!(!result.contains("slow.example/ ---"));
}

#[tokio::test]
async fn test_cancellation_abandons_outstanding_fetches() {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });
    let start = Instant::now();

    let result = enricher()
        .enrich("https://slow.example/", &cancel, |url| async move {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(page(&url, "t", "body"))
        })
        .await;

    assert!(start.elapsed() < Duration::from_secs(2));
    assert_eq!(result, "https://slow.example/");
}

#[tokio::test]
async fn test_long_bodies_are_truncated() {
    let enricher = ContentEnricher::new(EnrichmentOptions {
        max_content_chars: 10,
        ..enricher().options().clone()
    });

    let result = enricher
        .enrich("https://long.example/", &CancellationToken::new(), |url| async move {
            Ok(FetchedContent {
                url,
                title: None,
                body: "ééééééééééééééé".to_string(),
            })
        })
        .await;

    assert!(result.contains("\n\néééééééééé\n[truncated]\n--- End of content"));
    assert!(!result.contains("Title:"));
}

#[test]
fn test_truncate_chars() {
    assert_eq!(truncate_chars("short", 10), "short");
    assert_eq!(truncate_chars("exactly", 7), "exactly");
    assert_eq!(truncate_chars("abcdef", 3), "abc\n[truncated]");
}

#[test]
fn test_config_options() {
    let config = EnrichmentConfig {
        timeout_secs: 0,
        max_concurrent: 0,
        ..Default::default()
    };
    let options = config.options();
    assert_eq!(options.timeout, None);
    assert_eq!(options.max_concurrent, 1);

    let defaults = EnrichmentOptions::default();
    assert_eq!(defaults.max_urls, DEFAULT_MAX_URLS);
    assert_eq!(defaults.timeout, Some(Duration::from_secs(DEFAULT_TIMEOUT_SECS)));
}
