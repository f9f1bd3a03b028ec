//! # Litreview Tools
//!
//! Concrete collaborators for the review pipeline: web search backends
//! (DuckDuckGo, Brave, SerpAPI) and the HTTP page fetcher.

pub mod fetch;
pub mod search;

pub use fetch::{HttpFetcher, extract_text_from_html};
pub use search::{BraveSearch, DuckDuckGoSearch, SerpApiSearch, create_search_backend};
