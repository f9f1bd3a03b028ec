//! Configuration system for litreview.
//!
//! Uses `figment` for layered configuration: defaults -> user config file ->
//! workspace config file -> environment. Configuration is loaded from
//! `~/.config/litreview/config.toml` and then `litreview.toml` in the
//! working directory (or an explicit path from the command line).
//!
//! Pipeline thresholds are constants in the stage modules, not configuration.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the workspace-level configuration file.
pub const WORKSPACE_CONFIG_FILE: &str = "litreview.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReviewConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

impl ReviewConfig {
    /// Collect human-readable warnings about suspicious settings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        for w in self.llm.validate() {
            warnings.push(format!("[llm] {}", w));
        }
        if self.embedding.batch_size == 0 {
            warnings.push("[embedding] batch_size is 0; using 1".to_string());
        }
        if self.fetch.concurrency == 0 {
            warnings.push("[fetch] concurrency is 0; pages will be fetched one at a time".to_string());
        }
        if self.cache.ttl_hours == 0 {
            warnings.push("[cache] ttl_hours is 0; every cache entry is already expired".to_string());
        }
        warnings
    }
}

/// LLM provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider name: "openai" or "anthropic".
    pub provider: String,
    /// Model identifier (e.g., "gpt-4o-mini").
    pub model: String,
    /// Environment variable name containing the API key.
    pub api_key_env: String,
    /// Optional base URL override for the API endpoint.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Maximum tokens to generate in a response.
    pub max_tokens: usize,
    /// Sampling temperature.
    pub temperature: f32,
    /// Per-request timeout.
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_llm_timeout() -> u64 {
    120
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            base_url: None,
            max_tokens: 4096,
            temperature: 0.3,
            timeout_secs: default_llm_timeout(),
            retry: RetryConfig::default(),
        }
    }
}

impl LlmConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if !(0.0..=2.0).contains(&self.temperature) {
            warnings.push(format!(
                "temperature {} is outside the 0.0-2.0 range",
                self.temperature
            ));
        }
        if self.max_tokens == 0 {
            warnings.push("max_tokens is 0".to_string());
        }
        warnings
    }
}

/// Exponential backoff settings for transient provider errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 1000,
            max_backoff_ms: 30_000,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

/// Embedding provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Provider name: "openai" (default) or "local".
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_embedding_dimensions")]
    pub dimensions: usize,
    /// Texts per embedding request.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_embedding_key_env")]
    pub api_key_env: String,
    #[serde(default)]
    pub base_url: Option<String>,
}

fn default_embedding_provider() -> String {
    "openai".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_embedding_dimensions() -> usize {
    1536
}

fn default_batch_size() -> usize {
    64
}

fn default_embedding_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: default_embedding_model(),
            dimensions: default_embedding_dimensions(),
            batch_size: default_batch_size(),
            api_key_env: default_embedding_key_env(),
            base_url: None,
        }
    }
}

impl EmbeddingConfig {
    /// Whether this provider needs an API credential.
    pub fn requires_api_key(&self) -> bool {
        self.provider != "local"
    }
}

/// Which web search backend to construct.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchBackendKind {
    #[default]
    DuckDuckGo,
    Brave,
    Serp,
}

impl std::fmt::Display for SearchBackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchBackendKind::DuckDuckGo => write!(f, "duckduckgo"),
            SearchBackendKind::Brave => write!(f, "brave"),
            SearchBackendKind::Serp => write!(f, "serp"),
        }
    }
}

/// Web search configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default)]
    pub backend: SearchBackendKind,
    /// Env var holding the key for keyed backends. Defaults per backend when unset.
    #[serde(default)]
    pub api_key_env: Option<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            backend: SearchBackendKind::DuckDuckGo,
            api_key_env: None,
        }
    }
}

impl SearchConfig {
    /// The env var to read the backend key from, if the backend needs one.
    pub fn key_env(&self) -> Option<String> {
        match self.backend {
            SearchBackendKind::DuckDuckGo => None,
            SearchBackendKind::Brave => Some(
                self.api_key_env
                    .clone()
                    .unwrap_or_else(|| "BRAVE_API_KEY".to_string()),
            ),
            SearchBackendKind::Serp => Some(
                self.api_key_env
                    .clone()
                    .unwrap_or_else(|| "SERPAPI_API_KEY".to_string()),
            ),
        }
    }
}

/// Page fetching configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Maximum pages fetched at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_concurrency() -> usize {
    5
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36"
        .to_string()
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            user_agent: default_user_agent(),
        }
    }
}

/// On-disk response cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_ttl_hours")]
    pub ttl_hours: u64,
}

fn default_true() -> bool {
    true
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".cache")
}

fn default_ttl_hours() -> u64 {
    24
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: default_cache_dir(),
            ttl_hours: default_ttl_hours(),
        }
    }
}

/// Load configuration by merging layers in order of precedence (highest last):
///
/// 1. Built-in defaults
/// 2. User config (`~/.config/litreview/config.toml`)
/// 3. Workspace config (`<workspace>/litreview.toml`), or `explicit` when given
/// 4. Environment variables (`LITREVIEW_LLM__MODEL`, `LITREVIEW_CACHE__ENABLED`, ...)
pub fn load_config(
    workspace: Option<&Path>,
    explicit: Option<&Path>,
) -> Result<ReviewConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(ReviewConfig::default()));

    if let Some(dirs) = directories::ProjectDirs::from("dev", "litreview", "litreview") {
        let user_config = dirs.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    match explicit {
        Some(path) => {
            figment = figment.merge(Toml::file(path));
        }
        None => {
            if let Some(ws) = workspace {
                let ws_config = ws.join(WORKSPACE_CONFIG_FILE);
                if ws_config.exists() {
                    figment = figment.merge(Toml::file(&ws_config));
                }
            }
        }
    }

    figment = figment.merge(Env::prefixed("LITREVIEW_").split("__"));

    figment.extract().map_err(Box::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ReviewConfig::default();
        assert_eq!(config.llm.provider, "openai");
        assert_eq!(config.llm.api_key_env, "OPENAI_API_KEY");
        assert_eq!(config.search.backend, SearchBackendKind::DuckDuckGo);
        assert_eq!(config.fetch.concurrency, 5);
        assert_eq!(config.cache.ttl_hours, 24);
        assert!(config.cache.enabled);
    }

    #[test]
    fn test_load_config_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(Some(dir.path()), None).unwrap();
        assert_eq!(config.embedding.model, "text-embedding-3-small");
        assert_eq!(config.embedding.batch_size, 64);
    }

    #[test]
    fn test_load_config_from_workspace() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(WORKSPACE_CONFIG_FILE),
            r#"
[llm]
provider = "anthropic"
model = "claude-3-5-haiku-latest"
api_key_env = "ANTHROPIC_API_KEY"
max_tokens = 2048
temperature = 0.2

[search]
backend = "brave"

[cache]
ttl_hours = 6
"#,
        )
        .unwrap();

        let config = load_config(Some(dir.path()), None).unwrap();
        assert_eq!(config.llm.provider, "anthropic");
        assert_eq!(config.llm.max_tokens, 2048);
        assert_eq!(config.llm.timeout_secs, 120);
        assert_eq!(config.search.backend, SearchBackendKind::Brave);
        assert_eq!(config.cache.ttl_hours, 6);
        assert_eq!(config.cache.dir, PathBuf::from(".cache"));
    }

    #[test]
    fn test_load_config_explicit_path_wins_over_workspace() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(WORKSPACE_CONFIG_FILE),
            "[fetch]\nconcurrency = 2\n",
        )
        .unwrap();
        let explicit = dir.path().join("other.toml");
        std::fs::write(&explicit, "[fetch]\nconcurrency = 9\n").unwrap();

        let config = load_config(Some(dir.path()), Some(&explicit)).unwrap();
        assert_eq!(config.fetch.concurrency, 9);
    }

    #[test]
    fn test_search_key_env_defaults_per_backend() {
        let mut search = SearchConfig::default();
        assert_eq!(search.key_env(), None);

        search.backend = SearchBackendKind::Serp;
        assert_eq!(search.key_env().as_deref(), Some("SERPAPI_API_KEY"));

        search.backend = SearchBackendKind::Brave;
        search.api_key_env = Some("MY_BRAVE".into());
        assert_eq!(search.key_env().as_deref(), Some("MY_BRAVE"));
    }

    #[test]
    fn test_validate_defaults_clean() {
        let warnings = ReviewConfig::default().validate();
        assert!(warnings.is_empty(), "unexpected warnings: {:?}", warnings);
    }

    #[test]
    fn test_validate_flags_bad_values() {
        let mut config = ReviewConfig::default();
        config.llm.temperature = 3.0;
        config.embedding.batch_size = 0;
        config.fetch.concurrency = 0;
        let warnings = config.validate();
        assert_eq!(warnings.len(), 3);
        assert!(warnings[0].contains("temperature"));
        assert!(warnings[1].contains("batch_size"));
        assert!(warnings[2].contains("concurrency"));
    }

    #[test]
    fn test_backend_kind_serde() {
        let kind: SearchBackendKind = serde_json::from_str("\"serp\"").unwrap();
        assert_eq!(kind, SearchBackendKind::Serp);
        assert_eq!(SearchBackendKind::DuckDuckGo.to_string(), "duckduckgo");
    }

    #[test]
    fn test_embedding_requires_key() {
        let mut config = EmbeddingConfig::default();
        assert!(config.requires_api_key());
        config.provider = "local".into();
        assert!(!config.requires_api_key());
    }
}
