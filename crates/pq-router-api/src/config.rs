//! Router service configuration.
//!
//! Loaded from the TOML file named by `PQ_CONFIG` (defaults otherwise), then
//! overridden by environment variables.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

/// Top-level service configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Listen address (e.g., "0.0.0.0").
    #[serde(default = "default_host")]
    pub host: String,
    /// Listen port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// PostgreSQL connection URL. In-memory mode when unset.
    #[serde(default)]
    pub database_url: Option<String>,
    /// Allowed CORS origins; any origin when empty.
    #[serde(default)]
    pub cors_origins: Vec<String>,
    /// Retrieval namespaces attached to retrieval decisions.
    #[serde(default = "default_namespaces")]
    pub namespaces: Vec<String>,
    /// Tables whose columns make up the schema dictionary.
    #[serde(default = "default_tables")]
    pub tables: Vec<String>,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub resilience: ResilienceConfig,
    #[serde(default)]
    pub thresholds: Thresholds,
    #[serde(default)]
    pub context: ContextConfig,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_namespaces() -> Vec<String> {
    vec!["operations_manuals".into(), "safety_procedures".into()]
}

fn default_tables() -> Vec<String> {
    vec!["production_summary".into(), "trip_summary".into()]
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            database_url: None,
            cors_origins: vec![],
            namespaces: default_namespaces(),
            tables: default_tables(),
            model: ModelConfig::default(),
            resilience: ResilienceConfig::default(),
            thresholds: Thresholds::default(),
            context: ContextConfig::default(),
        }
    }
}

impl ApiConfig {
    /// Load from `PQ_CONFIG` (if set) and apply environment overrides.
    pub fn load() -> anyhow::Result<Self> {
        let mut config = match std::env::var("PQ_CONFIG") {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Apply `DATABASE_URL`, `MODEL_PROVIDER`, `MODEL_API_KEY` and
    /// `BEDROCK_MODEL_ID` overrides from `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("DATABASE_URL").filter(|v| !v.is_empty()) {
            self.database_url = Some(url);
        }
        if let Some(provider) = lookup("MODEL_PROVIDER") {
            match provider.to_ascii_lowercase().as_str() {
                "chat" | "ollama" => self.model.provider = ModelProvider::Chat,
                "bedrock" => self.model.provider = ModelProvider::Bedrock,
                "disabled" | "none" | "off" => self.model.provider = ModelProvider::Disabled,
                other => tracing::warn!(provider = %other, "unknown MODEL_PROVIDER ignored"),
            }
        }
        if let Some(key) = lookup("MODEL_API_KEY").filter(|v| !v.is_empty()) {
            self.model.api_key = Some(key);
        }
        if let Some(model_id) = lookup("BEDROCK_MODEL_ID").filter(|v| !v.is_empty()) {
            self.model.bedrock_model_id = model_id;
        }
    }
}

// ── Model backend ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelProvider {
    /// Ollama-style `/api/chat` JSON endpoint.
    Chat,
    /// AWS Bedrock Converse API.
    Bedrock,
    #[default]
    Disabled,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub provider: ModelProvider,
    /// Chat endpoint base URL.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Chat model name.
    #[serde(default = "default_model")]
    pub model: String,
    /// Bearer token for the chat endpoint.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_bedrock_model_id")]
    pub bedrock_model_id: String,
    /// Per-request timeout.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_endpoint() -> String {
    "http://localhost:11434".into()
}
fn default_model() -> String {
    "llama3.1:8b".into()
}
fn default_bedrock_model_id() -> String {
    "us.amazon.nova-lite-v1:0".into()
}
fn default_request_timeout_secs() -> u64 {
    5
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: ModelProvider::default(),
            endpoint: default_endpoint(),
            model: default_model(),
            api_key: None,
            bedrock_model_id: default_bedrock_model_id(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl ModelConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

// ── Retry and circuit breaker ──────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct ResilienceConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Budget for a whole retry sequence.
    #[serde(default = "default_overall_timeout_secs")]
    pub overall_timeout_secs: u64,
    /// Failed sequences within `window_secs` that open the breaker.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    200
}
fn default_max_delay_ms() -> u64 {
    2_000
}
fn default_overall_timeout_secs() -> u64 {
    15
}
fn default_failure_threshold() -> u32 {
    5
}
fn default_window_secs() -> u64 {
    60
}
fn default_cooldown_secs() -> u64 {
    30
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            overall_timeout_secs: default_overall_timeout_secs(),
            failure_threshold: default_failure_threshold(),
            window_secs: default_window_secs(),
            cooldown_secs: default_cooldown_secs(),
        }
    }
}

// ── Decision thresholds ────────────────────────────────────────

/// Confidence thresholds. Empirically tuned; the bands overlap and each one
/// is set independently.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Thresholds {
    #[serde(default = "default_classifier_min_confidence")]
    pub classifier_min_confidence: f64,
    #[serde(default = "default_tie_margin")]
    pub tie_margin: f64,
    /// Lowest confidence a deterministic rule reports.
    #[serde(default = "default_rule_floor")]
    pub rule_floor: f64,
    /// Lowest confidence of the catch-all stage.
    #[serde(default = "default_catch_all_floor")]
    pub catch_all_floor: f64,
    /// Decisions below this ask the model to route.
    #[serde(default = "default_model_routing_threshold")]
    pub model_routing_threshold: f64,
    #[serde(default = "default_followup_assist_low")]
    pub followup_assist_low: f64,
    #[serde(default = "default_followup_assist_high")]
    pub followup_assist_high: f64,
    /// Model merges below this are discarded.
    #[serde(default = "default_merge_confidence_floor")]
    pub merge_confidence_floor: f64,
}

fn default_classifier_min_confidence() -> f64 {
    0.5
}
fn default_tie_margin() -> f64 {
    0.05
}
fn default_rule_floor() -> f64 {
    0.7
}
fn default_catch_all_floor() -> f64 {
    0.3
}
fn default_model_routing_threshold() -> f64 {
    0.6
}
fn default_followup_assist_low() -> f64 {
    0.5
}
fn default_followup_assist_high() -> f64 {
    0.75
}
fn default_merge_confidence_floor() -> f64 {
    0.7
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            classifier_min_confidence: default_classifier_min_confidence(),
            tie_margin: default_tie_margin(),
            rule_floor: default_rule_floor(),
            catch_all_floor: default_catch_all_floor(),
            model_routing_threshold: default_model_routing_threshold(),
            followup_assist_low: default_followup_assist_low(),
            followup_assist_high: default_followup_assist_high(),
            merge_confidence_floor: default_merge_confidence_floor(),
        }
    }
}

// ── Follow-up context cache ────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct ContextConfig {
    #[serde(default = "default_context_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_context_capacity")]
    pub capacity: u64,
}

fn default_context_ttl_secs() -> u64 {
    30 * 60
}
fn default_context_capacity() -> u64 {
    10_000
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_context_ttl_secs(),
            capacity: default_context_capacity(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config() {
        let config = ApiConfig::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert!(config.database_url.is_none());
        assert_eq!(config.model.provider, ModelProvider::Disabled);
        assert_eq!(config.resilience.max_attempts, 3);
        assert_eq!(config.thresholds.model_routing_threshold, 0.6);
        assert_eq!(config.context.ttl_secs, 1800);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let toml_str = r#"
port = 8080
namespaces = ["sop"]

[model]
provider = "chat"
endpoint = "http://10.0.0.5:11434"

[resilience]
failure_threshold = 2

[thresholds]
rule_floor = 0.75
"#;
        let config: ApiConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.namespaces, vec!["sop"]);
        assert_eq!(config.model.provider, ModelProvider::Chat);
        assert_eq!(config.model.model, "llama3.1:8b");
        assert_eq!(config.resilience.failure_threshold, 2);
        assert_eq!(config.resilience.cooldown_secs, 30);
        assert_eq!(config.thresholds.rule_floor, 0.75);
        assert_eq!(config.thresholds.catch_all_floor, 0.3);
    }

    #[test]
    fn env_overrides() {
        let env: HashMap<&str, &str> = [
            ("DATABASE_URL", "postgres://localhost/pq"),
            ("MODEL_PROVIDER", "Bedrock"),
            ("MODEL_API_KEY", "secret"),
            ("BEDROCK_MODEL_ID", "anthropic.model-v1"),
        ]
        .into_iter()
        .collect();
        let mut config = ApiConfig::default();
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/pq"));
        assert_eq!(config.model.provider, ModelProvider::Bedrock);
        assert_eq!(config.model.api_key.as_deref(), Some("secret"));
        assert_eq!(config.model.bedrock_model_id, "anthropic.model-v1");
    }

    #[test]
    fn unknown_provider_is_ignored() {
        let mut config = ApiConfig::default();
        config.model.provider = ModelProvider::Chat;
        config.apply_env(|key| (key == "MODEL_PROVIDER").then(|| "gpt".to_string()));
        assert_eq!(config.model.provider, ModelProvider::Chat);
    }

    #[test]
    fn sample_config_parses() {
        let raw = include_str!("../config/router.example.toml");
        let config: ApiConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.tables.len(), 2);
    }
}
