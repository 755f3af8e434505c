use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;
use url::Url;

const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', '"', '\''];

fn url_regex() -> &'static Regex {
    static URL_REGEX: OnceLock<Regex> = OnceLock::new();
    URL_REGEX.get_or_init(|| {
        Regex::new(r#"(?i)\b(?:https?://|www\.)[^\s<>"'`]+"#).expect("Invalid URL regex")
    })
}

/// Find up to `max` distinct http(s) URLs in `text`, in order of appearance.
///
/// Bare `www.` hosts are treated as https. URLs are returned normalized, and
/// two spellings that normalize to the same URL count once.
pub fn extract_urls(text: &str, max: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut urls = Vec::new();

    for candidate in url_regex().find_iter(text) {
        if urls.len() >= max {
            break;
        }
        let Some(url) = normalize(trim_candidate(candidate.as_str())) else {
            continue;
        };
        if seen.insert(url.clone()) {
            urls.push(url);
        }
    }

    urls
}

/// Strip sentence punctuation and unbalanced closing brackets off the end.
fn trim_candidate(candidate: &str) -> &str {
    let mut trimmed = candidate;
    loop {
        let Some(last) = trimmed.chars().last() else {
            return trimmed;
        };
        let unbalanced = match last {
            ')' => is_unbalanced(trimmed, '(', ')'),
            ']' => is_unbalanced(trimmed, '[', ']'),
            '}' => is_unbalanced(trimmed, '{', '}'),
            _ => TRAILING_PUNCTUATION.contains(&last),
        };
        if !unbalanced {
            return trimmed;
        }
        trimmed = &trimmed[..trimmed.len() - last.len_utf8()];
    }
}

fn is_unbalanced(text: &str, open: char, close: char) -> bool {
    text.matches(close).count() > text.matches(open).count()
}

fn normalize(candidate: &str) -> Option<String> {
    let with_scheme = if candidate
        .get(..4)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("www."))
    {
        format!("https://{}", candidate)
    } else {
        candidate.to_string()
    };

    let url = Url::parse(&with_scheme).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    if url.host_str().is_none_or(str::is_empty) {
        return None;
    }
    Some(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_in_order_and_dedupes() {
        let text = "See https://a.example/x, then www.b.example and https://a.example/x again.";
        assert_eq!(
            extract_urls(text, 10),
            vec!["https://a.example/x", "https://www.b.example/"]
        );
    }

    #[test]
    fn test_trims_trailing_punctuation() {
        let text = "Docs (https://docs.rs/tokio). Also \"http://example.com/a?b=1\"!";
        assert_eq!(
            extract_urls(text, 10),
            vec!["https://docs.rs/tokio", "http://example.com/a?b=1"]
        );
    }

    #[test]
    fn test_keeps_balanced_brackets() {
        let text = "https://en.wikipedia.org/wiki/Rust_(programming_language)";
        assert_eq!(
            extract_urls(text, 10),
            vec!["https://en.wikipedia.org/wiki/Rust_(programming_language)"]
        );
    }

    #[test]
    fn test_rejects_other_schemes_and_empty_hosts() {
        assert!(extract_urls("ftp://example.com file:///etc/passwd", 10).is_empty());
        assert!(extract_urls("broken http:// link", 10).is_empty());
        assert!(extract_urls("no links here", 10).is_empty());
    }

    #[test]
    fn test_respects_max() {
        let text = "https://one.example https://two.example https://three.example";
        assert_eq!(extract_urls(text, 2).len(), 2);
        assert!(extract_urls(text, 0).is_empty());
    }

    #[test]
    fn test_scheme_is_case_insensitive() {
        assert_eq!(
            extract_urls("HTTPS://Example.COM/Path", 10),
            vec!["https://example.com/Path"]
        );
    }
}
