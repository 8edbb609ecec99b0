use anyhow::{Context, Result};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use crate::flow::{DocumentMatcher, FixedOutcomeMatcher, NameAndDobMatcher, VerificationOutcome};
use crate::session::SessionConfig;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub live: LiveConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub verification: VerificationConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct LiveConfig {
    pub endpoint: String,
    pub model: String,
    pub voice: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    15
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub capture_block_size: usize,
    pub input_sample_rate: u32,
    pub output_sample_rate: u32,
    pub channel_capacity: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            capture_block_size: 4096,
            input_sample_rate: 16000,
            output_sample_rate: 24000,
            channel_capacity: 64,
        }
    }
}

/// Which document matcher backs the `verify_details` tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatcherKind {
    NameAndDob,
    AlwaysMatch,
    AlwaysMismatch,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct VerificationConfig {
    /// Simulated back-office latency before a verification result
    pub delay_ms: u64,
    pub matcher: MatcherKind,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            delay_ms: 1500,
            matcher: MatcherKind::NameAndDob,
        }
    }
}

impl VerificationConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn build_matcher(&self) -> Arc<dyn DocumentMatcher> {
        match self.matcher {
            MatcherKind::NameAndDob => Arc::new(NameAndDobMatcher),
            MatcherKind::AlwaysMatch => Arc::new(FixedOutcomeMatcher(VerificationOutcome::Match)),
            MatcherKind::AlwaysMismatch => {
                Arc::new(FixedOutcomeMatcher(VerificationOutcome::Mismatch))
            }
        }
    }
}

impl Config {
    /// Load from `path` (extension optional), overridden by `DIGIVERIFIER__*` variables
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(
                config::Environment::with_prefix("DIGIVERIFIER")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()
            .with_context(|| format!("Failed to read config from {}", path))?;

        settings
            .try_deserialize()
            .context("Failed to parse configuration")
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            model: self.live.model.clone(),
            voice: self.live.voice.clone(),
            input_sample_rate: self.audio.input_sample_rate,
            output_sample_rate: self.audio.output_sample_rate,
            capture_block_size: self.audio.capture_block_size,
            channel_capacity: self.audio.channel_capacity,
            connect_timeout: Duration::from_secs(self.live.connect_timeout_secs),
            ..SessionConfig::default()
        }
    }

    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.service.http.bind, self.service.http.port)
    }
}
