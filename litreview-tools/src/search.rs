//! Web search backends.
//!
//! Each backend implements [`SearchBackend`]; [`create_search_backend`]
//! picks one from configuration once, before the pipeline starts.

use async_trait::async_trait;
use litreview_core::config::{SearchBackendKind, SearchConfig};
use litreview_core::error::SearchError;
use litreview_core::web::{SearchBackend, SearchHit};
use reqwest::Client;
use scraper::{Html, Selector};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const SEARCH_TIMEOUT: Duration = Duration::from_secs(15);
const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Build the backend named by `config`.
///
/// Keyed backends fail here, not per query, when their key is missing.
pub fn create_search_backend(config: &SearchConfig) -> Result<Arc<dyn SearchBackend>, SearchError> {
    let backend: Arc<dyn SearchBackend> = match config.backend {
        SearchBackendKind::DuckDuckGo => Arc::new(DuckDuckGoSearch::new()?),
        SearchBackendKind::Brave => Arc::new(BraveSearch::new(read_key(config, "brave")?)?),
        SearchBackendKind::Serp => Arc::new(SerpApiSearch::new(read_key(config, "serp")?)?),
    };
    Ok(backend)
}

fn read_key(config: &SearchConfig, backend: &str) -> Result<String, SearchError> {
    let var = config.key_env().unwrap_or_default();
    match std::env::var(&var) {
        Ok(key) if !key.trim().is_empty() => Ok(key.trim().to_string()),
        _ => Err(SearchError::MissingKey {
            backend: backend.to_string(),
            var,
        }),
    }
}

fn build_client(backend: &str) -> Result<Client, SearchError> {
    Client::builder()
        .timeout(SEARCH_TIMEOUT)
        .user_agent(BROWSER_USER_AGENT)
        .build()
        .map_err(|e| SearchError::Request {
            backend: backend.to_string(),
            message: format!("Failed to create HTTP client: {}", e),
        })
}

async fn get_text(backend: &str, request: reqwest::RequestBuilder) -> Result<String, SearchError> {
    let response = request.send().await.map_err(|e| SearchError::Request {
        backend: backend.to_string(),
        message: e.to_string(),
    })?;
    let status = response.status();
    if !status.is_success() {
        return Err(SearchError::Status {
            backend: backend.to_string(),
            status: status.as_u16(),
        });
    }
    response.text().await.map_err(|e| SearchError::Request {
        backend: backend.to_string(),
        message: format!("Failed to read response body: {}", e),
    })
}

// ---------------------------------------------------------------------------
// DuckDuckGo
// ---------------------------------------------------------------------------

/// Keyless search through DuckDuckGo's HTML endpoint.
pub struct DuckDuckGoSearch {
    client: Client,
    base_url: String,
}

impl DuckDuckGoSearch {
    pub fn new() -> Result<Self, SearchError> {
        Ok(Self {
            client: build_client("duckduckgo")?,
            base_url: "https://html.duckduckgo.com/html/".to_string(),
        })
    }
}

#[async_trait]
impl SearchBackend for DuckDuckGoSearch {
    async fn search(&self, query: &str, count: usize) -> Result<Vec<SearchHit>, SearchError> {
        let url = format!("{}?q={}", self.base_url, urlencoding::encode(query));
        let body = get_text(self.name(), self.client.get(&url)).await?;
        let hits = parse_duckduckgo_html(&body, count)?;
        debug!(query, hits = hits.len(), "DuckDuckGo search");
        Ok(hits)
    }

    fn name(&self) -> &str {
        "duckduckgo"
    }
}

fn selector(css: &str) -> Result<Selector, SearchError> {
    Selector::parse(css).map_err(|e| SearchError::Parse {
        backend: "duckduckgo".into(),
        message: format!("bad selector {}: {:?}", css, e),
    })
}

/// Extract organic results from a DuckDuckGo HTML results page, skipping ads.
pub fn parse_duckduckgo_html(html: &str, count: usize) -> Result<Vec<SearchHit>, SearchError> {
    let document = Html::parse_document(html);
    let result_sel = selector("div.result")?;
    let link_sel = selector("a.result__a")?;
    let snippet_sel = selector(".result__snippet")?;

    let mut hits = Vec::new();
    for result in document.select(&result_sel) {
        if hits.len() == count {
            break;
        }
        if result.value().classes().any(|c| c == "result--ad") {
            continue;
        }
        let Some(link) = result.select(&link_sel).next() else {
            continue;
        };
        let Some(url) = link.value().attr("href").and_then(decode_result_link) else {
            continue;
        };
        let title = collapse_whitespace(&link.text().collect::<String>());
        let snippet = result
            .select(&snippet_sel)
            .next()
            .map(|s| collapse_whitespace(&s.text().collect::<String>()))
            .unwrap_or_default();
        hits.push(SearchHit::new(title, url, snippet));
    }
    Ok(hits)
}

/// Resolve `//duckduckgo.com/l/?uddg=<target>` redirects to the target URL.
pub fn decode_result_link(href: &str) -> Option<String> {
    let absolute = if href.starts_with("//") {
        format!("https:{}", href)
    } else {
        href.to_string()
    };
    let parsed = url::Url::parse(&absolute).ok()?;
    let is_redirect = parsed
        .host_str()
        .is_some_and(|h| h.ends_with("duckduckgo.com"))
        && parsed.path().starts_with("/l/");
    if is_redirect {
        return parsed
            .query_pairs()
            .find(|(k, _)| k == "uddg")
            .map(|(_, v)| v.into_owned());
    }
    Some(absolute)
}

fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ---------------------------------------------------------------------------
// Brave
// ---------------------------------------------------------------------------

/// Brave Search API (`X-Subscription-Token`).
pub struct BraveSearch {
    client: Client,
    api_key: String,
    base_url: String,
}

impl BraveSearch {
    pub fn new(api_key: String) -> Result<Self, SearchError> {
        Ok(Self {
            client: build_client("brave")?,
            api_key,
            base_url: "https://api.search.brave.com/res/v1/web/search".to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct BraveResponse {
    #[serde(default)]
    web: Option<BraveWeb>,
}

#[derive(Debug, Deserialize)]
struct BraveWeb {
    #[serde(default)]
    results: Vec<BraveResult>,
}

#[derive(Debug, Deserialize)]
struct BraveResult {
    #[serde(default)]
    title: String,
    url: String,
    #[serde(default)]
    description: String,
}

#[async_trait]
impl SearchBackend for BraveSearch {
    async fn search(&self, query: &str, count: usize) -> Result<Vec<SearchHit>, SearchError> {
        let count_param = count.to_string();
        let request = self
            .client
            .get(&self.base_url)
            .query(&[("q", query), ("count", count_param.as_str())])
            .header("Accept", "application/json")
            .header("X-Subscription-Token", &self.api_key);
        let body = get_text(self.name(), request).await?;
        parse_brave_response(&body, count)
    }

    fn name(&self) -> &str {
        "brave"
    }
}

pub fn parse_brave_response(body: &str, count: usize) -> Result<Vec<SearchHit>, SearchError> {
    let response: BraveResponse = serde_json::from_str(body).map_err(|e| SearchError::Parse {
        backend: "brave".into(),
        message: e.to_string(),
    })?;
    Ok(response
        .web
        .map(|w| w.results)
        .unwrap_or_default()
        .into_iter()
        .take(count)
        .map(|r| SearchHit::new(r.title, r.url, r.description))
        .collect())
}

// ---------------------------------------------------------------------------
// SerpAPI
// ---------------------------------------------------------------------------

/// Google results through SerpAPI.
pub struct SerpApiSearch {
    client: Client,
    api_key: String,
    base_url: String,
}

impl SerpApiSearch {
    pub fn new(api_key: String) -> Result<Self, SearchError> {
        Ok(Self {
            client: build_client("serp")?,
            api_key,
            base_url: "https://serpapi.com/search.json".to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct SerpResponse {
    #[serde(default)]
    organic_results: Vec<SerpResult>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SerpResult {
    #[serde(default)]
    title: String,
    link: String,
    #[serde(default)]
    snippet: String,
}

#[async_trait]
impl SearchBackend for SerpApiSearch {
    async fn search(&self, query: &str, count: usize) -> Result<Vec<SearchHit>, SearchError> {
        let count_param = count.to_string();
        let request = self.client.get(&self.base_url).query(&[
            ("engine", "google"),
            ("q", query),
            ("num", count_param.as_str()),
            ("api_key", self.api_key.as_str()),
        ]);
        let body = get_text(self.name(), request).await?;
        parse_serp_response(&body, count)
    }

    fn name(&self) -> &str {
        "serp"
    }
}

pub fn parse_serp_response(body: &str, count: usize) -> Result<Vec<SearchHit>, SearchError> {
    let response: SerpResponse = serde_json::from_str(body).map_err(|e| SearchError::Parse {
        backend: "serp".into(),
        message: e.to_string(),
    })?;
    // SerpAPI reports "no results" as an error string; that is an empty result, not a failure.
    if let Some(error) = response.error
        && !error.contains("hasn't returned any results")
    {
        return Err(SearchError::Request {
            backend: "serp".into(),
            message: error,
        });
    }
    Ok(response
        .organic_results
        .into_iter()
        .take(count)
        .map(|r| SearchHit::new(r.title, r.link, r.snippet))
        .collect())
}
