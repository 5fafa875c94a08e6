//! Configuration management for medrag.
//!
//! This module handles loading and merging configuration from multiple sources:
//! - Environment variables
//! - Command-line flags
//! - Config files (.medrag/config.yaml)
//!
//! The configuration is workspace-centric, with the prompt templates and the
//! local corpus conventionally stored under `.medrag/`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{AppError, AppResult};
use crate::logging::LogFormat;

/// Default number of documents retrieved per question.
pub const DEFAULT_TOP_K: usize = 20;

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .medrag/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Completion provider (e.g., "ollama", "openai")
    pub provider: String,

    /// Completion model identifier
    pub model: String,

    /// API key for the completion provider
    pub api_key: Option<String>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Log event format
    pub log_format: LogFormat,

    /// LLM provider configurations
    pub llm: Option<LlmConfig>,

    /// Nearest-neighbor search backend
    pub search: SearchConfig,

    /// Prompt template selection
    pub prompt: PromptConfig,

    /// Bounds on external calls
    pub timeouts: TimeoutConfig,
}

/// LLM configuration from config.yaml.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(rename = "activeProvider")]
    pub active_provider: String,

    pub providers: HashMap<String, ProviderConfig>,
}

/// Provider-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProviderConfig {
    OpenAI {
        #[serde(rename = "apiKeyEnv")]
        api_key_env: String,
        model: String,
        endpoint: Option<String>,
    },
    Ollama {
        endpoint: String,
        model: String,
        timeout: Option<u64>,
    },
}

impl ProviderConfig {
    /// Model configured for this provider.
    pub fn model(&self) -> &str {
        match self {
            ProviderConfig::OpenAI { model, .. } => model,
            ProviderConfig::Ollama { model, .. } => model,
        }
    }

    /// Completion timeout in seconds, if the provider block sets one.
    pub fn timeout_secs(&self) -> Option<u64> {
        match self {
            ProviderConfig::OpenAI { .. } => None,
            ProviderConfig::Ollama { timeout, .. } => *timeout,
        }
    }

    /// Endpoint override, if any.
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            ProviderConfig::OpenAI { endpoint, .. } => endpoint.as_deref(),
            ProviderConfig::Ollama { endpoint, .. } => Some(endpoint.as_str()),
        }
    }
}

/// Search backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchConfig {
    /// "opensearch" or "memory"
    pub backend: String,

    /// OpenSearch base URL
    pub endpoint: String,

    pub index_name: String,
    pub text_field: String,
    pub vector_field: String,
    pub title_field: String,
    pub pmid_field: String,
    pub year_field: String,
    pub keywords_field: String,

    /// Environment variables holding basic-auth credentials
    pub username_env: Option<String>,
    pub password_env: Option<String>,

    /// JSONL corpus for the in-memory backend
    pub corpus_path: Option<PathBuf>,

    /// Query embedder: "trigram" or "ollama"
    pub embedding_provider: String,
    pub embedding_model: String,
    pub embedding_endpoint: Option<String>,
    pub embedding_dim: usize,

    /// Documents retrieved per question
    pub top_k: usize,

    /// Retries performed by the remote search client
    pub max_retries: u32,

    /// Corpus documents embedded at once when building the memory index
    pub embed_concurrency: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            backend: "memory".to_string(),
            endpoint: "http://localhost:9200".to_string(),
            index_name: "pubmed_500_100".to_string(),
            text_field: "chunk".to_string(),
            vector_field: "embedding".to_string(),
            title_field: "title".to_string(),
            pmid_field: "pmid".to_string(),
            year_field: "year".to_string(),
            keywords_field: "keywords".to_string(),
            username_env: None,
            password_env: None,
            corpus_path: None,
            embedding_provider: "trigram".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            embedding_endpoint: None,
            embedding_dim: 384,
            top_k: DEFAULT_TOP_K,
            max_retries: 3,
            embed_concurrency: 8,
        }
    }
}

/// Prompt template configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PromptConfig {
    pub template_id: String,
    pub templates_dir: Option<PathBuf>,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            template_id: "rag-prompt".to_string(),
            templates_dir: None,
        }
    }
}

/// Timeouts applied to each external call, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimeoutConfig {
    pub search_secs: u64,
    pub completion_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            search_secs: 10,
            completion_secs: 120,
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigFile {
    llm: Option<LlmConfig>,
    workspace: Option<WorkspaceConfig>,
    logging: Option<LoggingConfig>,
    search: Option<SearchConfig>,
    prompt: Option<PromptConfig>,
    timeouts: Option<TimeoutConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceConfig {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
    format: Option<LogFormat>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            provider: "ollama".to_string(), // Local-first default
            model: "llama3.2".to_string(),
            api_key: None,
            log_level: None,
            verbose: false,
            no_color: false,
            log_format: LogFormat::default(),
            llm: None,
            search: SearchConfig::default(),
            prompt: PromptConfig::default(),
            timeouts: TimeoutConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables and defaults.
    ///
    /// Environment variables:
    /// - `MEDRAG_WORKSPACE`: Override workspace path
    /// - `MEDRAG_CONFIG`: Path to config file
    /// - `MEDRAG_PROVIDER`: Completion provider
    /// - `MEDRAG_MODEL`: Model identifier
    /// - `MEDRAG_API_KEY`: API key
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    /// - `MEDRAG_LOG_FORMAT`: `pretty` or `json`
    ///
    /// # Example
    /// ```no_run
    /// use medrag_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Index: {}", config.search.index_name);
    /// ```
    pub fn load() -> AppResult<Self> {
        let mut config = Self::default();

        if let Ok(workspace) = std::env::var("MEDRAG_WORKSPACE") {
            config.workspace = PathBuf::from(workspace);
        }

        if let Ok(config_file) = std::env::var("MEDRAG_CONFIG") {
            config.config_file = Some(PathBuf::from(config_file));
        }

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = match config.config_file {
            Some(ref cf) => cf.clone(),
            None => config.medrag_dir().join("config.yaml"),
        };

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        // Environment variables override YAML config
        if let Ok(provider) = std::env::var("MEDRAG_PROVIDER") {
            config.provider = provider;
        }

        if let Ok(model) = std::env::var("MEDRAG_MODEL") {
            config.model = model;
        }

        config.api_key = std::env::var("MEDRAG_API_KEY").ok();
        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        if let Ok(format) = std::env::var("MEDRAG_LOG_FORMAT") {
            config.log_format = format.parse()?;
        }

        Ok(config)
    }

    /// Merge a YAML configuration file into this config.
    pub fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        tracing::debug!("Merging config file {:?}", path);
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        if let Some(ws) = config_file.workspace {
            if let Some(path) = ws.path {
                result.workspace = PathBuf::from(path);
            }
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
            if let Some(format) = logging.format {
                result.log_format = format;
            }
        }

        if let Some(llm) = config_file.llm {
            result.provider = llm.active_provider.clone();
            if let Some(provider_config) = llm.providers.get(&llm.active_provider) {
                result.model = provider_config.model().to_string();
            }
            result.llm = Some(llm);
        }

        if let Some(search) = config_file.search {
            result.search = search;
        }

        if let Some(prompt) = config_file.prompt {
            result.prompt = prompt;
        }

        if let Some(timeouts) = config_file.timeouts {
            result.timeouts = timeouts;
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// CLI flags take precedence over environment variables and the file.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        provider: Option<String>,
        model: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> AppResult<Self> {
        let workspace_changed = workspace.is_some();
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        // An explicit config file on the command line is merged last
        if let Some(config_file) = config_file {
            self = self.merge_yaml(&config_file)?;
            self.config_file = Some(config_file);
        } else if workspace_changed && self.config_file.is_none() {
            let workspace_config = self.medrag_dir().join("config.yaml");
            if workspace_config.exists() {
                self = self.merge_yaml(&workspace_config)?;
            }
        }

        if let Some(provider) = provider {
            self.provider = provider;
        }

        if let Some(model) = model {
            self.model = model;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        Ok(self)
    }

    /// Get the path to the .medrag directory.
    pub fn medrag_dir(&self) -> PathBuf {
        self.workspace.join(".medrag")
    }

    /// Directory holding YAML prompt templates.
    pub fn templates_dir(&self) -> PathBuf {
        self.prompt
            .templates_dir
            .clone()
            .unwrap_or_else(|| self.medrag_dir().join("prompts"))
    }

    /// JSONL corpus for the in-memory backend, resolved against the workspace.
    pub fn corpus_path(&self) -> PathBuf {
        match self.search.corpus_path {
            Some(ref path) if path.is_absolute() => path.clone(),
            Some(ref path) => self.workspace.join(path),
            None => self.medrag_dir().join("corpus.jsonl"),
        }
    }

    pub fn search_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.search_secs)
    }

    /// The active provider's own `timeout` wins over `timeouts.completionSecs`.
    pub fn completion_timeout(&self) -> Duration {
        let secs = self
            .get_provider_config(&self.provider)
            .and_then(|provider| provider.timeout_secs())
            .unwrap_or(self.timeouts.completion_secs);
        Duration::from_secs(secs)
    }

    /// Get the configuration block for a provider.
    pub fn get_provider_config(&self, provider: &str) -> Option<ProviderConfig> {
        self.llm
            .as_ref()
            .and_then(|llm| llm.providers.get(provider).cloned())
    }

    /// Endpoint configured for the active provider, if any.
    pub fn resolve_endpoint(&self) -> Option<String> {
        self.get_provider_config(&self.provider)
            .and_then(|pc| pc.endpoint().map(str::to_string))
    }

    /// Resolve API key from environment variable.
    pub fn resolve_api_key(&self, provider: &str) -> Option<String> {
        // Check explicit MEDRAG_API_KEY first
        if let Some(ref key) = self.api_key {
            return Some(key.clone());
        }

        match self.get_provider_config(provider) {
            Some(ProviderConfig::OpenAI { api_key_env, .. }) => std::env::var(&api_key_env).ok(),
            _ => None,
        }
    }

    /// Validate configuration for the active provider and search backend.
    pub fn validate(&self) -> AppResult<()> {
        let provider = &self.provider;
        let known_providers = ["openai", "ollama"];

        if !known_providers.contains(&provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown provider: {}. Supported: {}",
                provider,
                known_providers.join(", ")
            )));
        }

        if provider == "openai" && self.resolve_api_key(provider).is_none() {
            return Err(AppError::Config(
                "API key not found for provider openai (set MEDRAG_API_KEY or apiKeyEnv)"
                    .to_string(),
            ));
        }

        let known_backends = ["opensearch", "memory"];
        if !known_backends.contains(&self.search.backend.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown search backend: {}. Supported: {}",
                self.search.backend,
                known_backends.join(", ")
            )));
        }

        if self.search.top_k == 0 {
            return Err(AppError::Config("search.topK must be at least 1".to_string()));
        }

        for env_var in [&self.search.username_env, &self.search.password_env]
            .into_iter()
            .flatten()
        {
            if std::env::var(env_var).is_err() {
                return Err(AppError::Config(format!(
                    "Search credential not found in environment variable: {}",
                    env_var
                )));
            }
        }

        Ok(())
    }
}
