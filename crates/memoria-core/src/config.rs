use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{MemoriaError, Result};
use crate::types::Schedule;

pub const DEFAULT_PORT: u16 = 18790;
pub const DEFAULT_BIND: &str = "127.0.0.1";

/// Top-level config (memoria.toml + MEMORIA_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoriaConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub compression: CompressionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
    /// When set, every `/api/*` request must carry `Authorization: Bearer <token>`.
    #[serde(default)]
    pub auth_token: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
            auth_token: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Summarization backends. Every configured entry becomes a failover slot,
/// tried in declaration order: openai first, then ollama.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvidersConfig {
    pub openai: Option<OpenAiProviderConfig>,
    pub ollama: Option<OllamaConfig>,
}

/// Any OpenAI-compatible chat completions endpoint (OpenAI, DashScope/Qwen, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiProviderConfig {
    pub api_key: String,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    #[serde(default = "default_chat_path")]
    pub chat_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    #[serde(default = "default_ollama_base_url")]
    pub base_url: String,
}

/// Conversation compaction settings.
///
/// Passed explicitly to every compaction call; nothing reads it from
/// global state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressionConfig {
    /// Compaction is eligible once a history holds more than this many messages.
    #[serde(default = "default_threshold")]
    pub threshold: usize,
    /// Messages per summarization chunk. Must be at least 2.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Trailing messages that always survive verbatim.
    #[serde(default = "default_keep_recent")]
    pub keep_recent_messages: usize,
    /// Master switch for both the inline and the batch path.
    #[serde(default = "bool_true")]
    pub enabled: bool,
    /// When the batch pass fires.
    #[serde(default)]
    pub schedule: Schedule,
    /// Emit per-conversation diagnostics. No behavioural effect.
    #[serde(default)]
    pub verbose_logging: bool,
    /// Model name sent with every summarization request.
    #[serde(default = "default_summary_model")]
    pub summary_model: String,
    /// Upper bound on a single summarization call; a timeout degrades the chunk.
    #[serde(default = "default_summary_timeout_secs")]
    pub summary_timeout_secs: u64,
    /// Conversations compacted in parallel by a batch pass, and the cap on
    /// summarization calls in flight across all of them.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            chunk_size: default_chunk_size(),
            keep_recent_messages: default_keep_recent(),
            enabled: true,
            schedule: Schedule::default(),
            verbose_logging: false,
            summary_model: default_summary_model(),
            summary_timeout_secs: default_summary_timeout_secs(),
            max_concurrency: default_max_concurrency(),
        }
    }
}

impl CompressionConfig {
    /// Reject settings that would make compaction misbehave.
    ///
    /// `chunk_size < 2` never shrinks a level of the summary tree, so the
    /// summarizer would loop forever.
    pub fn validate(&self) -> Result<()> {
        if self.threshold == 0 {
            return Err(MemoriaError::Config(
                "compression.threshold must be greater than 0".to_string(),
            ));
        }
        if self.chunk_size < 2 {
            return Err(MemoriaError::Config(format!(
                "compression.chunk_size must be at least 2 (got {})",
                self.chunk_size
            )));
        }
        if self.max_concurrency == 0 {
            return Err(MemoriaError::Config(
                "compression.max_concurrency must be greater than 0".to_string(),
            ));
        }
        if let Schedule::Interval { every_secs: 0 } = self.schedule {
            return Err(MemoriaError::Config(
                "compression.schedule interval must be greater than 0".to_string(),
            ));
        }
        if self.keep_recent_messages >= self.threshold {
            tracing::warn!(
                keep_recent = self.keep_recent_messages,
                threshold = self.threshold,
                "keep_recent_messages >= threshold: compaction will rarely find anything to compress"
            );
        }
        Ok(())
    }
}

fn bool_true() -> bool {
    true
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_threshold() -> usize {
    10
}
fn default_chunk_size() -> usize {
    5
}
fn default_keep_recent() -> usize {
    3
}
fn default_summary_model() -> String {
    "qwen-plus".to_string()
}
fn default_summary_timeout_secs() -> u64 {
    30
}
fn default_max_concurrency() -> usize {
    4
}
fn default_openai_base_url() -> String {
    "https://api.openai.com".to_string()
}
fn default_chat_path() -> String {
    "/v1/chat/completions".to_string()
}
fn default_ollama_base_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.memoria/memoria.db", home)
}

impl MemoriaConfig {
    /// Load config from a TOML file with MEMORIA_* env var overrides, then
    /// validate it.
    ///
    /// Nested keys use a double underscore in env vars, e.g.
    /// `MEMORIA_COMPRESSION__CHUNK_SIZE=8`.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: MemoriaConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("MEMORIA_").split("__"))
            .extract()
            .map_err(|e| MemoriaError::Config(e.to_string()))?;

        config.compression.validate()?;
        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.memoria/memoria.toml", home)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn compression_defaults() {
        let c = CompressionConfig::default();
        assert_eq!(c.threshold, 10);
        assert_eq!(c.chunk_size, 5);
        assert_eq!(c.keep_recent_messages, 3);
        assert!(c.enabled);
        assert!(!c.verbose_logging);
        assert_eq!(c.summary_timeout_secs, 30);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn chunk_size_below_two_is_rejected() {
        let c = CompressionConfig {
            chunk_size: 1,
            ..Default::default()
        };
        assert!(matches!(c.validate(), Err(MemoriaError::Config(_))));
    }

    #[test]
    fn zero_threshold_is_rejected() {
        let c = CompressionConfig {
            threshold: 0,
            ..Default::default()
        };
        assert!(c.validate().is_err());
    }

    #[test]
    fn keep_recent_at_threshold_is_allowed() {
        let c = CompressionConfig {
            threshold: 3,
            keep_recent_messages: 3,
            ..Default::default()
        };
        assert!(c.validate().is_ok());
    }

    #[test]
    fn load_reads_toml_sections() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[gateway]
port = 9000

[compression]
threshold = 20
chunk_size = 4
schedule = {{ kind = "interval", every_secs = 600 }}

[providers.ollama]
base_url = "http://gpu-box:11434"
"#
        )
        .unwrap();

        let config = MemoriaConfig::load(file.path().to_str()).unwrap();
        assert_eq!(config.gateway.port, 9000);
        assert_eq!(config.gateway.bind, DEFAULT_BIND);
        assert_eq!(config.compression.threshold, 20);
        assert_eq!(config.compression.chunk_size, 4);
        assert_eq!(config.compression.keep_recent_messages, 3);
        assert_eq!(
            config.compression.schedule,
            Schedule::Interval { every_secs: 600 }
        );
        assert_eq!(
            config.providers.ollama.map(|o| o.base_url).as_deref(),
            Some("http://gpu-box:11434")
        );
        assert!(config.providers.openai.is_none());
    }

    #[test]
    fn load_rejects_invalid_chunk_size() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[compression]\nchunk_size = 1").unwrap();
        assert!(MemoriaConfig::load(file.path().to_str()).is_err());
    }
}
