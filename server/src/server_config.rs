use anyhow::{ensure, Context};
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use std::{env, path::Path};
use url::Url;

pub const DEFAULT_AI_ENDPOINT: &str = "https://api.mistral.ai/v1/chat/completions";
const API_KEY_VARS: [&str; 2] = ["MISTRAL_API_KEY", "AI_API_KEY"];
const WEIGHT_TOLERANCE: f64 = 0.001;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub max_body_bytes: usize,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            cors_origins: vec!["*".to_string()],
            max_body_bytes: 5 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PromptLimits {
    pub rate_limit_per_sec: usize,
    pub refill_interval_ms: usize,
    pub refill_amount: usize,
    pub backoff_secs: u64,
}

impl Default for PromptLimits {
    fn default() -> Self {
        Self {
            rate_limit_per_sec: 5,
            refill_interval_ms: 1000,
            refill_amount: 5,
            backoff_secs: 60,
        }
    }
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub api_key: Option<String>,
    pub endpoint: Url,
    pub model: String,
    pub temperature: f64,
    pub timeout_secs: u64,
    pub prompt_limits: PromptLimits,
}

impl AiConfig {
    pub fn is_configured(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: Url::parse(DEFAULT_AI_ENDPOINT).expect("default AI endpoint is a valid url"),
            model: "mistral-small-latest".to_string(),
            temperature: 0.2,
            timeout_secs: 20,
            prompt_limits: PromptLimits::default(),
        }
    }
}

// Hand-written so the key never reaches the logs
impl std::fmt::Debug for AiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AiConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("endpoint", &self.endpoint.as_str())
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("timeout_secs", &self.timeout_secs)
            .field("prompt_limits", &self.prompt_limits)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Upper bound on action items the local analyzer extracts
    pub max_action_items: usize,
    /// How many action items focus mode lists
    pub focus_action_items: usize,
    pub summary_max_chars: usize,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            max_action_items: 5,
            focus_action_items: 5,
            summary_max_chars: 200,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub urgency: f64,
    pub importance: f64,
    pub action_density: f64,
    pub sender_weight: f64,
    pub time_sensitivity: f64,
}

impl ScoringWeights {
    pub fn total(&self) -> f64 {
        self.urgency
            + self.importance
            + self.action_density
            + self.sender_weight
            + self.time_sensitivity
    }
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            urgency: 0.30,
            importance: 0.20,
            action_density: 0.15,
            sender_weight: 0.10,
            time_sensitivity: 0.25,
        }
    }
}

/// Minimum score for each level; anything below `medium` is low
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct LevelThresholds {
    pub critical: u8,
    pub high: u8,
    pub medium: u8,
}

impl Default for LevelThresholds {
    fn default() -> Self {
        Self {
            critical: 75,
            high: 50,
            medium: 25,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub weights: ScoringWeights,
    pub thresholds: LevelThresholds,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub server: HttpServerConfig,
    pub ai: AiConfig,
    pub processing: ProcessingConfig,
    pub scoring: ScoringConfig,
}

impl ServerConfig {
    /// Build the process-wide config: defaults, then `config.toml`, then
    /// `TRIAGE__*` variables, then the AI key variables.
    pub fn load() -> anyhow::Result<Self> {
        let path = config_path();
        let builder = Config::builder()
            .add_source(File::with_name(&path).required(false))
            .add_source(env_source());
        let mut config: ServerConfig = builder
            .build()
            .context(format!("Could not read config from {path}"))?
            .try_deserialize()
            .context("config.toml is invalid")?;

        let key_from_env = API_KEY_VARS
            .iter()
            .find_map(|var| env::var(var).ok().filter(|v| !v.trim().is_empty()));
        if key_from_env.is_some() {
            config.ai.api_key = key_from_env;
        }
        config.normalize();
        config.validate()?;

        Ok(config)
    }

    pub fn from_toml_str(toml: &str) -> anyhow::Result<Self> {
        let mut config: ServerConfig = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .context("Could not parse config")?
            .try_deserialize()
            .context("Config is invalid")?;
        config.normalize();
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let weights = &self.scoring.weights;
        let all_weights = [
            weights.urgency,
            weights.importance,
            weights.action_density,
            weights.sender_weight,
            weights.time_sensitivity,
        ];
        ensure!(
            all_weights.iter().all(|w| (0.0..=1.0).contains(w)),
            "Scoring weights must each be between 0 and 1"
        );
        ensure!(
            (weights.total() - 1.0).abs() <= WEIGHT_TOLERANCE,
            "Scoring weights must sum to 1.0, got {}",
            weights.total()
        );

        let LevelThresholds {
            critical,
            high,
            medium,
        } = self.scoring.thresholds;
        ensure!(
            critical <= 100 && critical > high && high > medium && medium > 0,
            "Level thresholds must satisfy 100 >= critical > high > medium > 0, got {critical}/{high}/{medium}"
        );
        ensure!(self.ai.timeout_secs > 0, "ai.timeout_secs must be positive");
        ensure!(
            self.processing.summary_max_chars > 0,
            "processing.summary_max_chars must be positive"
        );

        Ok(())
    }

    fn normalize(&mut self) {
        if !self.ai.is_configured() {
            self.ai.api_key = None;
        }
    }
}

impl std::fmt::Display for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Server Config:\n{:?}\n\nAI: {:?}\n\nProcessing: {:?}\n\nScoring: {:?}",
            self.server, self.ai, self.processing, self.scoring,
        )
    }
}

fn env_source() -> Environment {
    Environment::with_prefix("TRIAGE")
        .separator("__")
        .list_separator(",")
        .with_list_parse_key("server.cors_origins")
        .try_parsing(true)
}

fn config_path() -> String {
    let root = env::var("APP_DIR").unwrap_or_else(|_| {
        let dir = env!("CARGO_MANIFEST_DIR");
        let dir = Path::new(dir)
            .parent()
            .unwrap_or_else(|| Path::new(dir))
            .display()
            .to_string();
        format!("{}/config", dir)
    });
    format!("{root}/config.toml")
}
