//! Plain-text rendering of command results for stdout.

use crate::cache::{CacheStats, CleanupStats, OutputFormat, SearchResult};
use crate::client::{GeneratedImage, ModelInfo, VideoTask};
use crate::enrichment::FetchedContent;
use crate::resilience::BreakerSnapshot;
use crate::resilience::rate_limiter::RateLimiterStatus;
use std::fmt::Write;

pub fn search_results(results: &[SearchResult], format: OutputFormat) -> serde_json::Result<String> {
    if format == OutputFormat::Json {
        return serde_json::to_string_pretty(results);
    }
    if results.is_empty() {
        return Ok("No results.".to_string());
    }

    let mut out = String::new();
    for (i, result) in results.iter().enumerate() {
        let _ = writeln!(out, "{}. {}", i + 1, result.title.trim());
        let _ = writeln!(out, "   {}", result.link);
        if let Some(date) = &result.publish_date {
            let _ = writeln!(out, "   Published: {}", date);
        }
        let snippet = result.content.trim();
        if !snippet.is_empty() {
            let _ = writeln!(out, "   {}", snippet.replace('\n', " "));
        }
        out.push('\n');
    }
    Ok(out.trim_end().to_string())
}

pub fn page(content: &FetchedContent) -> String {
    match content.title.as_deref() {
        Some(title) if !title.trim().is_empty() => {
            format!("# {}\n{}\n\n{}", title.trim(), content.url, content.body.trim())
        }
        _ => format!("{}\n\n{}", content.url, content.body.trim()),
    }
}

pub fn models(models: &[ModelInfo]) -> String {
    if models.is_empty() {
        return "No models available.".to_string();
    }
    models
        .iter()
        .map(|model| match &model.owned_by {
            Some(owner) => format!("{} ({})", model.id, owner),
            None => model.id.clone(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn image(image: &GeneratedImage) -> String {
    if image.urls.is_empty() {
        return image.raw.to_string();
    }
    image.urls.join("\n")
}

pub fn video(task: &VideoTask) -> String {
    match (&task.id, &task.status) {
        (Some(id), Some(status)) => format!("Video task {} submitted ({})", id, status),
        (Some(id), None) => format!("Video task {} submitted", id),
        _ => task.raw.to_string(),
    }
}

pub fn cache_stats(stats: &CacheStats) -> String {
    format!(
        "Directory: {}\nEntries: {}\nExpired: {}\nCorrupt: {}\nSize: {} bytes",
        stats.directory.display(),
        stats.total_entries,
        stats.expired_entries,
        stats.corrupt_entries,
        stats.total_bytes
    )
}

pub fn cleanup_stats(stats: &CleanupStats) -> String {
    let mut out = format!(
        "Scanned {} entries; removed {} expired, {} corrupt, {} stale temp files",
        stats.scanned, stats.removed_expired, stats.removed_corrupt, stats.removed_temp
    );
    if stats.errors > 0 {
        let _ = write!(out, " ({} errors, see logs)", stats.errors);
    }
    out
}

pub fn status(breakers: &[BreakerSnapshot], limiter: Option<&RateLimiterStatus>) -> String {
    let mut out = String::from("Circuit breakers:\n");
    if breakers.is_empty() {
        out.push_str("  disabled\n");
    }
    for breaker in breakers {
        let _ = writeln!(
            out,
            "  {:<8} {:<9} failures={} successes={} since={}s",
            breaker.name,
            breaker.state.to_string(),
            breaker.consecutive_failures,
            breaker.consecutive_successes,
            breaker.since_transition.as_secs()
        );
    }

    out.push_str("Rate limiter:\n");
    match limiter {
        Some(limiter) => {
            let _ = write!(
                out,
                "  {:.1}/{:.0} tokens, refill {:.2}/s",
                limiter.available_tokens, limiter.capacity, limiter.refill_rate
            );
        }
        None => out.push_str("  disabled"),
    }
    out
}
