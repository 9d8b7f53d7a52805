//! Core configuration (§10 "AMBIENT STACK").
//!
//! Deserialized from an optional TOML file, then overridden field-by-field
//! from the environment variables named in §6. Every sub-section carries
//! `#[serde(default)]` so a partial (or absent) config file is valid; a
//! hand-written [`Default`] impl matches the documented defaults exactly.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// `DEVICE_PREFERENCE` (§6): `auto`, `gpu`, or `cpu`. The actual placement
/// policy is left to each worker; the Orchestrator only needs to know what
/// was requested so it can report it in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DevicePreference {
    #[default]
    Auto,
    Gpu,
    Cpu,
}

impl DevicePreference {
    fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "auto" => Some(Self::Auto),
            "gpu" => Some(Self::Gpu),
            "cpu" => Some(Self::Cpu),
            _ => None,
        }
    }
}

/// How to spawn each worker subprocess.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerCommands {
    pub emotion_worker_cmd: String,
    pub response_worker_cmd: String,
    pub tts_worker_cmd: String,
}

impl Default for WorkerCommands {
    fn default() -> Self {
        Self {
            emotion_worker_cmd: "fae-emotion-worker".to_owned(),
            response_worker_cmd: "fae-response-worker".to_owned(),
            tts_worker_cmd: "fae-tts-worker".to_owned(),
        }
    }
}

/// Deadlines and bounds, all named directly after their §6 environment
/// variables.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct Deadlines {
    pub worker_ready_timeout_s: u64,
    pub turn_deadline_s: u64,
    pub history_max_pairs: usize,
    pub history_max_chars: usize,
}

impl Default for Deadlines {
    fn default() -> Self {
        Self {
            worker_ready_timeout_s: 90,
            turn_deadline_s: 20,
            history_max_pairs: 4,
            history_max_chars: 1600,
        }
    }
}

impl Deadlines {
    pub fn worker_ready_timeout(&self) -> Duration {
        Duration::from_secs(self.worker_ready_timeout_s)
    }

    pub fn turn_deadline(&self) -> Duration {
        Duration::from_secs(self.turn_deadline_s)
    }
}

/// Top-level process configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// `MODEL_CACHE_DIR` (§6): read-only to workers.
    pub model_cache_dir: Option<PathBuf>,
    pub workers: WorkerCommands,
    pub deadlines: Deadlines,
    pub device_preference: DevicePreference,
    /// Default bounded per-worker admission queue depth (§5).
    pub queue_depth: QueueDepth,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QueueDepth(pub usize);

impl Default for QueueDepth {
    fn default() -> Self {
        Self(crate::orchestrator::queue::DEFAULT_QUEUE_DEPTH)
    }
}

impl Config {
    /// Loads configuration from an optional TOML file at `path` (if it
    /// exists), then applies environment variable overrides (§6). A missing
    /// file is not an error — it just means every field keeps its default.
    pub fn load(path: Option<&std::path::Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) if p.exists() => {
                let text = std::fs::read_to_string(p)?;
                toml::from_str(&text).map_err(|e| CoreError::Config(format!("invalid config TOML: {e}")))?
            }
            _ => Config::default(),
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Resolves the effective model cache directory: `MODEL_CACHE_DIR` if
    /// set, else the config file's value, else a platform-appropriate cache
    /// directory (`dirs::cache_dir()/fae/models`), in the style of a small
    /// `dirs`-backed resolver (§10).
    pub fn resolve_model_cache_dir(&self) -> PathBuf {
        if let Ok(env_value) = std::env::var("MODEL_CACHE_DIR") {
            if !env_value.is_empty() {
                return PathBuf::from(env_value);
            }
        }
        if let Some(configured) = &self.model_cache_dir {
            return configured.clone();
        }
        dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("fae")
            .join("models")
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(v) = std::env::var("MODEL_CACHE_DIR") {
            if !v.is_empty() {
                self.model_cache_dir = Some(PathBuf::from(v));
            }
        }
        if let Ok(v) = std::env::var("EMOTION_WORKER_CMD") {
            self.workers.emotion_worker_cmd = v;
        }
        if let Ok(v) = std::env::var("RESPONSE_WORKER_CMD") {
            self.workers.response_worker_cmd = v;
        }
        if let Ok(v) = std::env::var("TTS_WORKER_CMD") {
            self.workers.tts_worker_cmd = v;
        }
        if let Ok(v) = std::env::var("WORKER_READY_TIMEOUT_S") {
            self.deadlines.worker_ready_timeout_s = parse_env_u64("WORKER_READY_TIMEOUT_S", &v)?;
        }
        if let Ok(v) = std::env::var("TURN_DEADLINE_S") {
            self.deadlines.turn_deadline_s = parse_env_u64("TURN_DEADLINE_S", &v)?;
        }
        if let Ok(v) = std::env::var("HISTORY_MAX_PAIRS") {
            self.deadlines.history_max_pairs = parse_env_u64("HISTORY_MAX_PAIRS", &v)? as usize;
        }
        if let Ok(v) = std::env::var("HISTORY_MAX_CHARS") {
            self.deadlines.history_max_chars = parse_env_u64("HISTORY_MAX_CHARS", &v)? as usize;
        }
        if let Ok(v) = std::env::var("DEVICE_PREFERENCE") {
            self.device_preference = DevicePreference::parse(&v)
                .ok_or_else(|| CoreError::Config(format!("invalid DEVICE_PREFERENCE: {v}")))?;
        }
        Ok(())
    }
}

fn parse_env_u64(name: &str, raw: &str) -> Result<u64> {
    raw.parse::<u64>()
        .map_err(|_| CoreError::Config(format!("invalid {name} value: {raw:?}")))
}
