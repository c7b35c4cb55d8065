use anyhow::{Context, Result};
use classify::{OllamaSettings, RetryPolicy, RunnerSettings};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub ollama: OllamaConfig,
    pub retry: RetryConfig,
    pub pacing: PacingConfig,
    pub cache: CacheConfig,
    pub input: InputConfig,
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: usize,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    pub request_delay_ms: u64,
    pub checkpoint_every: usize,
    pub cooldown_every: usize,
    pub cooldown_ms: u64,
    pub max_concurrent_llm_calls: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub dir: PathBuf,
    pub recursive: bool,
    pub include_undescribed: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Defaults to a name derived from the model.
    pub output: Option<PathBuf>,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        let settings = OllamaSettings::default();
        Self {
            base_url: settings.base_url,
            model: settings.model,
            request_timeout_secs: settings.request_timeout_secs,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff_ms: 1000,
            max_backoff_ms: 10000,
        }
    }
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            request_delay_ms: 200,
            checkpoint_every: 5,
            cooldown_every: 10,
            cooldown_ms: 1000,
            max_concurrent_llm_calls: 1,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("ollama_analysis_cache.json"),
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("JSONFiles"),
            recursive: false,
            include_undescribed: false,
        }
    }
}

impl AppConfig {
    /// Read a JSON config file; missing sections keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))
    }

    pub fn ollama_settings(&self) -> OllamaSettings {
        OllamaSettings {
            base_url: self.ollama.base_url.clone(),
            model: self.ollama.model.clone(),
            request_timeout_secs: self.ollama.request_timeout_secs,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry.max_retries,
            self.retry.initial_backoff_ms,
            self.retry.max_backoff_ms,
        )
    }

    pub fn runner_settings(&self) -> RunnerSettings {
        RunnerSettings {
            pacing: Duration::from_millis(self.pacing.request_delay_ms),
            checkpoint_every: self.pacing.checkpoint_every,
            cooldown_every: self.pacing.cooldown_every,
            cooldown: Duration::from_millis(self.pacing.cooldown_ms),
            max_concurrent: self.pacing.max_concurrent_llm_calls.max(1),
        }
    }

    pub fn output_path(&self) -> PathBuf {
        self.report
            .output
            .clone()
            .unwrap_or_else(|| default_report_name(&self.ollama.model))
    }
}

/// `Analysis_Report_<model>.xlsx`, with path-hostile characters of the model replaced.
pub fn default_report_name(model: &str) -> PathBuf {
    let model = model.replace([':', '/'], "_");
    PathBuf::from(format!("Analysis_Report_{}.xlsx", model))
}
