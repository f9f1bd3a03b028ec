//! Fetcher: every URL the searcher found becomes exactly one [`Document`].

use super::StageContext;
use crate::error::FetchError;
use crate::research::chunking::truncate_chars;
use crate::research::records::{Document, DocumentOrigin};
use crate::research::session::PipelineState;
use futures::StreamExt;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const FETCH_TIMEOUT: Duration = Duration::from_secs(10);
/// Upper bound on stored page text, in characters.
pub const MAX_CONTENT_CHARS: usize = 10_000;

pub async fn run(mut state: PipelineState, ctx: &StageContext) -> PipelineState {
    let jobs: Vec<(String, String)> = state
        .search_results
        .iter()
        .flat_map(|entry| {
            entry
                .urls
                .iter()
                .map(move |url| (url.clone(), entry.subtopic.clone()))
        })
        .collect();

    // `buffered` yields in input order, so documents follow subtopic then URL order.
    let documents: Vec<Document> = futures::stream::iter(jobs)
        .map(|(url, subtopic)| async move { fetch_document(ctx, url, subtopic).await })
        .buffered(ctx.fetch_concurrency.max(1))
        .collect()
        .await;

    let placeholders = documents.iter().filter(|d| d.is_placeholder()).count();
    info!(
        documents = documents.len(),
        placeholders, "Fetch stage finished"
    );
    state.documents = documents;
    state
}

async fn fetch_document(ctx: &StageContext, url: String, subtopic: String) -> Document {
    match fetch_text(ctx, &url).await {
        Ok(text) => {
            debug!(url = %url, chars = text.chars().count(), "Fetched page");
            Document {
                content: truncate_chars(&text, MAX_CONTENT_CHARS).to_string(),
                title: format!("Article about {}", subtopic),
                url,
                subtopic,
                origin: DocumentOrigin::Fetched,
            }
        }
        Err(e) => {
            warn!(url = %url, error = %e, "Fetch failed; using placeholder document");
            placeholder_document(url, subtopic)
        }
    }
}

async fn fetch_text(ctx: &StageContext, url: &str) -> Result<String, FetchError> {
    let text = match tokio::time::timeout(FETCH_TIMEOUT, ctx.fetcher.fetch(url, FETCH_TIMEOUT)).await
    {
        Ok(result) => result?,
        Err(_) => {
            return Err(FetchError::Timeout {
                url: url.to_string(),
                timeout_secs: FETCH_TIMEOUT.as_secs(),
            });
        }
    };
    if text.trim().is_empty() {
        return Err(FetchError::EmptyContent {
            url: url.to_string(),
        });
    }
    Ok(text)
}

pub fn placeholder_document(url: String, subtopic: String) -> Document {
    Document {
        content: format!(
            "Placeholder content for {}. The page could not be retrieved.",
            url
        ),
        title: format!("Placeholder for {}", subtopic),
        url,
        subtopic,
        origin: DocumentOrigin::Placeholder,
    }
}
