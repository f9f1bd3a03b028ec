//! Searcher: one web search per subtopic, keeping up to five http(s) URLs.
//!
//! A failed search only affects its own subtopic, which receives three
//! placeholder URLs. On a retry pass the queries are broadened.

use super::StageContext;
use crate::cache::SEARCH_NAMESPACE;
use crate::error::SearchError;
use crate::research::records::Subtopic;
use crate::research::session::{PipelineState, SubtopicUrls};
use crate::web::{SearchHit, is_http_url};
use tracing::{debug, info, warn};

pub const RESULTS_PER_QUERY: usize = 5;
pub const PLACEHOLDER_URLS_PER_SUBTOPIC: usize = 3;

pub async fn run(mut state: PipelineState, ctx: &StageContext) -> PipelineState {
    let attempt = state.retry_count();
    let mut results = Vec::with_capacity(state.subtopics.len());

    for subtopic in &state.subtopics {
        let query = query_for_attempt(&state.topic, subtopic, attempt);
        let urls = match search_urls(ctx, &query).await {
            Ok(urls) => {
                debug!(subtopic = %subtopic.name, query = %query, found = urls.len(), "Search complete");
                urls
            }
            Err(e) => {
                warn!(subtopic = %subtopic.name, query = %query, error = %e, "Search failed; using placeholder URLs");
                placeholder_urls(&subtopic.name)
            }
        };
        results.push(SubtopicUrls {
            subtopic: subtopic.name.clone(),
            urls,
        });
    }

    state.search_results = results;
    info!(attempt, urls = state.url_count(), "Search stage finished");
    state
}

async fn search_urls(ctx: &StageContext, query: &str) -> Result<Vec<String>, SearchError> {
    let key = format!("{}:{}:{}", ctx.search.name(), query, RESULTS_PER_QUERY);
    if let Some(cache) = &ctx.cache
        && let Some(hits) = cache.get::<Vec<SearchHit>>(SEARCH_NAMESPACE, &key)
    {
        return Ok(filter_urls(&hits));
    }

    let hits = ctx.search.search(query, RESULTS_PER_QUERY).await?;
    if let Some(cache) = &ctx.cache
        && !hits.is_empty()
    {
        cache.put_or_warn(SEARCH_NAMESPACE, &key, &hits);
    }
    Ok(filter_urls(&hits))
}

/// Keep the first [`RESULTS_PER_QUERY`] http(s) URLs in backend order.
pub fn filter_urls(hits: &[SearchHit]) -> Vec<String> {
    hits.iter()
        .map(|h| h.url.trim())
        .filter(|u| is_http_url(u))
        .take(RESULTS_PER_QUERY)
        .map(String::from)
        .collect()
}

/// Deterministic stand-in URLs for a subtopic whose search failed.
pub fn placeholder_urls(subtopic_name: &str) -> Vec<String> {
    let slug = slugify(subtopic_name);
    (1..=PLACEHOLDER_URLS_PER_SUBTOPIC)
        .map(|i| format!("https://example.com/article{}-{}", i, slug))
        .collect()
}

fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "subtopic".to_string()
    } else {
        slug.to_string()
    }
}

/// The query to issue for `subtopic` on the given pass.
pub fn query_for_attempt(topic: &str, subtopic: &Subtopic, attempt: u32) -> String {
    if attempt == 0 {
        subtopic.search_query.clone()
    } else {
        broaden_query(topic, subtopic)
    }
}

/// A wider query: topic plus subtopic name without search operators, or the
/// bare topic when that would repeat the original query.
pub fn broaden_query(topic: &str, subtopic: &Subtopic) -> String {
    let candidate = strip_operators(&format!("{} {}", topic, subtopic.name));
    let original = strip_operators(&subtopic.search_query);
    if !candidate.is_empty() && !candidate.eq_ignore_ascii_case(&original) {
        return candidate;
    }
    let bare = strip_operators(topic);
    if bare.is_empty() {
        topic.trim().to_string()
    } else {
        bare
    }
}

/// Drop quotes, exclusions and `key:value` operators such as `site:`.
fn strip_operators(query: &str) -> String {
    query
        .split_whitespace()
        .filter(|w| !w.starts_with('-'))
        .filter(|w| !w.find(':').is_some_and(|i| i + 1 < w.len()))
        .map(|w| w.trim_matches('"'))
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
