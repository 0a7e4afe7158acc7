use std::path::Path;
use std::time::Duration;

use fs_err as fs;
use serde::{Deserialize, Serialize};

use crate::errors::{GenError, Result};
use crate::safety;

/// What the stream multiplexer does with a request that arrives while another
/// generation is still running on the same connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BusyPolicy {
    Queue,
    Reject,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub ollama_url: String,
    pub default_model: String,
    pub required_models: Vec<String>,
    pub timeout_secs: u64,
    pub probe_timeout_secs: u64,
    pub list_timeout_secs: u64,
    pub temperature: f32,
    pub max_tokens: u32,
    pub stop: Vec<String>,
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub busy_policy: BusyPolicy,
    pub queue_depth: usize,
    /// Skip the inference server entirely and answer with canned artifacts.
    pub mock: bool,
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ollama_url: "http://localhost:11434".into(),
            default_model: "llama3.2:3b".into(),
            required_models: vec!["gpt-oss-20b".into(), "llama3.2:3b".into()],
            timeout_secs: 300,
            probe_timeout_secs: 5,
            list_timeout_secs: 10,
            temperature: 0.0,
            max_tokens: 4096,
            stop: vec!["User:".into(), "Human:".into()],
            host: "127.0.0.1".into(),
            port: 8000,
            allowed_origins: vec![
                "http://localhost:5173".into(), "http://127.0.0.1:5173".into(),
                "http://localhost:5174".into(), "http://127.0.0.1:5174".into(),
            ],
            busy_policy: BusyPolicy::Queue,
            queue_depth: 8,
            mock: false,
            debug: false,
        }
    }
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| GenError::Config(e.to_string()))?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| GenError::Config(format!("invalid config file: {e}")))
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    fn apply_vars(&mut self, get: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = get("OLLAMA_BASE_URL") {
            self.ollama_url = url;
        }
        if let Some(model) = get("OLLAMA_MODEL_NAME") {
            self.default_model = model;
        }
        if let Some(list) = get("REQUIRED_OLLAMA_MODELS") {
            self.required_models = list
                .split(',')
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty())
                .collect();
        }
        if let Some(secs) = get("OLLAMA_TIMEOUT_SECS") {
            self.timeout_secs = secs
                .trim()
                .parse()
                .map_err(|_| GenError::Config(format!("OLLAMA_TIMEOUT_SECS is not a number: {secs}")))?;
        }
        if let Some(flag) = get("SHOULD_MOCK_AI_RESPONSE") {
            self.mock = parse_flag(&flag);
        }
        if let Some(flag) = get("IS_DEBUG_ENABLED") {
            self.debug = parse_flag(&flag);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        safety::ensure_loopback(&self.ollama_url)?;
        if self.required_models.is_empty() {
            return Err(GenError::Config("required_models must not be empty".into()));
        }
        if !safety::model_is_allowed(&self.default_model, &self.required_models) {
            return Err(GenError::Config(format!(
                "default_model '{}' is not in required_models ({})",
                self.default_model,
                self.required_models.join(", ")
            )));
        }
        if self.timeout_secs == 0 || self.probe_timeout_secs == 0 || self.list_timeout_secs == 0 {
            return Err(GenError::Config("timeouts must be greater than zero".into()));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn list_timeout(&self) -> Duration {
        Duration::from_secs(self.list_timeout_secs)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
