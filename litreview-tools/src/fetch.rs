//! HTTP page fetching and HTML-to-text extraction.

use async_trait::async_trait;
use litreview_core::config::FetchConfig;
use litreview_core::error::FetchError;
use litreview_core::web::{PageFetcher, is_http_url};
use reqwest::Client;
use scraper::{ElementRef, Html, Node};
use std::time::Duration;
use tracing::debug;

const MAX_REDIRECTS: usize = 5;
/// Elements whose text never reaches the reader.
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "svg", "head"];
const INLINE_ELEMENTS: &[&str] = &[
    "a", "abbr", "b", "code", "em", "i", "mark", "small", "span", "strong", "sub", "sup",
];

/// Fetches pages over HTTP(S) and returns their readable text.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(|e| FetchError::Request {
                url: String::new(),
                message: format!("Failed to create HTTP client: {}", e),
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<String, FetchError> {
        if !is_http_url(url) {
            return Err(FetchError::UnsupportedScheme {
                url: url.to_string(),
            });
        }

        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| map_fetch_error(url, timeout, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase();

        let body = response
            .text()
            .await
            .map_err(|e| map_fetch_error(url, timeout, e))?;

        let text = if content_type.is_empty()
            || content_type.contains("text/html")
            || content_type.contains("application/xhtml")
        {
            extract_text_from_html(&body)
        } else if content_type.starts_with("text/") {
            collapse_whitespace(&body)
        } else {
            return Err(FetchError::Request {
                url: url.to_string(),
                message: format!("Unsupported content type: {}", content_type),
            });
        };

        if text.is_empty() {
            return Err(FetchError::EmptyContent {
                url: url.to_string(),
            });
        }
        debug!(url, chars = text.chars().count(), "Extracted page text");
        Ok(text)
    }
}

fn map_fetch_error(url: &str, timeout: Duration, e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
            timeout_secs: timeout.as_secs(),
        }
    } else {
        FetchError::Request {
            url: url.to_string(),
            message: e.to_string(),
        }
    }
}

/// Readable text of an HTML document with whitespace collapsed to single spaces.
///
/// Script, style and similar non-content elements are dropped.
pub fn extract_text_from_html(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut raw = String::with_capacity(html.len() / 2);
    collect_text(document.root_element(), &mut raw);
    collapse_whitespace(&raw)
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => {
                if SKIPPED_ELEMENTS.contains(&el.name()) {
                    continue;
                }
                let Some(child_el) = ElementRef::wrap(child) else {
                    continue;
                };
                // Block boundaries become whitespace so words do not run together.
                let block = !INLINE_ELEMENTS.contains(&el.name());
                if block {
                    out.push(' ');
                }
                collect_text(child_el, out);
                if block {
                    out.push(' ');
                }
            }
            _ => {}
        }
    }
}

fn collapse_whitespace(input: &str) -> String {
    let mut buf = String::with_capacity(input.len());
    let mut last_space = false;
    for ch in input.chars() {
        if ch.is_whitespace() {
            if !last_space && !buf.is_empty() {
                buf.push(' ');
            }
            last_space = true;
        } else {
            buf.push(ch);
            last_space = false;
        }
    }
    buf.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_extract_text_from_html() {
        let html = r#"
        <html>
        <head><title>Test</title><style>.foo { color: red; }</style></head>
        <body>
            <h1>Hello World</h1>
            <p>This is a <b>test</b> paragraph.</p>
            <script>var x = 1;</script>
            <noscript>Enable JavaScript</noscript>
            <ul>
                <li>Item 1</li>
                <li>Item 2</li>
            </ul>
        </body>
        </html>"#;

        let text = extract_text_from_html(html);
        assert!(text.contains("Hello World"));
        assert!(text.contains("This is a test paragraph."));
        assert!(text.contains("Item 1 Item 2"));
        assert!(!text.contains("var x = 1"));
        assert!(!text.contains("color: red"));
        assert!(!text.contains("Enable JavaScript"));
        assert!(!text.contains("  "));
    }

    #[test]
    fn test_extract_text_decodes_entities() {
        let text = extract_text_from_html("<p>A &amp; B &lt; C &gt; D &quot;E&quot;</p>");
        assert_eq!(text, "A & B < C > D \"E\"");
    }

    #[test]
    fn test_extract_text_empty_page() {
        assert_eq!(extract_text_from_html("<html><body><script>x()</script></body></html>"), "");
    }

    #[test]
    fn test_inline_elements_do_not_split_words() {
        assert_eq!(extract_text_from_html("<p>qu<b>bit</b>s</p><p>next</p>"), "qubits next");
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  a \n\n b\t c  "), "a b c");
    }

    #[tokio::test]
    async fn test_fetch_rejects_non_http() {
        let fetcher = HttpFetcher::new(&FetchConfig::default()).unwrap();
        let result = fetcher
            .fetch("ftp://example.com/file", Duration::from_secs(1))
            .await;
        assert!(matches!(result, Err(FetchError::UnsupportedScheme { .. })));
    }
}
