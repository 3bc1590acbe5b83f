//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development. The language model is mandatory; the
//! speech, video and stock-photo services are only wired up when their key is set.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Settings for the OpenAI-compatible language model endpoint.
#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: String,
    pub timeout: Duration,
}

#[derive(Clone, Debug)]
pub struct TtsConfig {
    pub api_key: String,
    pub base_url: Option<String>,
    pub model: String,
    /// Overrides the per-language voice map when set.
    pub voice: Option<String>,
}

#[derive(Clone, Debug)]
pub struct SynthesiaConfig {
    pub api_key: String,
    pub base_url: String,
    pub avatar_id: String,
    pub webhook_url: Option<String>,
}

#[derive(Clone, Debug)]
pub struct UnsplashConfig {
    pub access_key: String,
    pub base_url: String,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub cors_origin: Option<String>,
    pub audio_output_dir: PathBuf,
    pub llm: LlmConfig,
    pub tts: Option<TtsConfig>,
    pub synthesia: Option<SynthesiaConfig>,
    pub unsplash: Option<UnsplashConfig>,
    pub external_call_timeout: Duration,
    pub video_concurrency: usize,
    pub video_poll_interval: Duration,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let or = |key: &str, default: &str| var(key).unwrap_or_else(|| default.to_string());

        // --- Load Server and Database Settings ---
        let bind_address = parse("BIND_ADDRESS", &or("BIND_ADDRESS", "0.0.0.0:3000"))?;
        let database_url =
            var("DATABASE_URL").ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = or("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;
        let cors_origin = var("CORS_ORIGIN");
        let audio_output_dir = PathBuf::from(or("AUDIO_OUTPUT_DIR", "./generated/audio"));

        // --- Language Model ---
        let llm = LlmConfig {
            base_url: or("LLM_BASE_URL", "http://localhost:11434/v1"),
            model: or("LLM_MODEL", "llama3.2"),
            // Local endpoints accept any key.
            api_key: or("LLM_API_KEY", "ollama"),
            timeout: Duration::from_secs(positive(
                "LLM_TIMEOUT_SECS",
                parse("LLM_TIMEOUT_SECS", &or("LLM_TIMEOUT_SECS", "300"))?,
            )?),
        };

        // --- Optional Capabilities ---
        let tts = var("TTS_API_KEY").map(|api_key| TtsConfig {
            api_key,
            base_url: var("TTS_BASE_URL"),
            model: or("TTS_MODEL", "tts-1"),
            voice: var("TTS_VOICE"),
        });

        let synthesia = match var("SYNTHESIA_API_KEY") {
            Some(api_key) => Some(SynthesiaConfig {
                api_key,
                base_url: or("SYNTHESIA_BASE_URL", "https://api.synthesia.io/v2"),
                avatar_id: or("SYNTHESIA_AVATAR_ID", "anna_costume1_cameraA"),
                webhook_url: var("SYNTHESIA_WEBHOOK_URL"),
            }),
            None => None,
        };

        let unsplash = var("UNSPLASH_ACCESS_KEY").map(|access_key| UnsplashConfig {
            access_key,
            base_url: or("UNSPLASH_BASE_URL", "https://api.unsplash.com"),
        });

        // --- Workflow Tuning ---
        let external_call_timeout = Duration::from_secs(positive(
            "EXTERNAL_CALL_TIMEOUT_SECS",
            parse("EXTERNAL_CALL_TIMEOUT_SECS", &or("EXTERNAL_CALL_TIMEOUT_SECS", "60"))?,
        )?);
        let video_concurrency: usize = positive(
            "VIDEO_CONCURRENCY",
            parse("VIDEO_CONCURRENCY", &or("VIDEO_CONCURRENCY", "4"))?,
        )?;
        let video_poll_interval = Duration::from_secs(positive(
            "VIDEO_POLL_INTERVAL_SECS",
            parse("VIDEO_POLL_INTERVAL_SECS", &or("VIDEO_POLL_INTERVAL_SECS", "30"))?,
        )?);

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            cors_origin,
            audio_output_dir,
            llm,
            tts,
            synthesia,
            unsplash,
            external_call_timeout,
            video_concurrency,
            video_poll_interval,
        })
    }
}

fn parse<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string()))
}

/// Counts, intervals and timeouts must be at least 1.
fn positive<T>(key: &str, value: T) -> Result<T, ConfigError>
where
    T: PartialEq + From<u8>,
{
    if value == T::from(0) {
        return Err(ConfigError::InvalidValue(
            key.to_string(),
            "must be at least 1".to_string(),
        ));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_only_the_database_is_set() {
        let config = load(&[("DATABASE_URL", "postgres://localhost/courses")]).unwrap();
        assert_eq!(config.bind_address.port(), 3000);
        assert_eq!(config.llm.model, "llama3.2");
        assert_eq!(config.llm.timeout, Duration::from_secs(300));
        assert_eq!(config.video_concurrency, 4);
        assert!(config.tts.is_none());
        assert!(config.synthesia.is_none());
        assert!(config.unsplash.is_none());
    }

    #[test]
    fn missing_database_url_is_reported() {
        let err = load(&[]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(v) if v == "DATABASE_URL"));
    }

    #[test]
    fn optional_services_follow_their_keys() {
        let config = load(&[
            ("DATABASE_URL", "postgres://localhost/courses"),
            ("TTS_API_KEY", "sk-tts"),
            ("SYNTHESIA_API_KEY", "syn"),
            ("UNSPLASH_ACCESS_KEY", ""),
        ])
        .unwrap();
        assert_eq!(config.tts.unwrap().model, "tts-1");
        assert_eq!(config.synthesia.unwrap().base_url, "https://api.synthesia.io/v2");
        assert!(config.unsplash.is_none());
    }

    #[test]
    fn invalid_numbers_are_rejected() {
        let err = load(&[
            ("DATABASE_URL", "postgres://localhost/courses"),
            ("VIDEO_CONCURRENCY", "lots"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(k, _) if k == "VIDEO_CONCURRENCY"));

        for key in [
            "VIDEO_POLL_INTERVAL_SECS",
            "VIDEO_CONCURRENCY",
            "EXTERNAL_CALL_TIMEOUT_SECS",
            "LLM_TIMEOUT_SECS",
        ] {
            let err = load(&[("DATABASE_URL", "postgres://localhost/courses"), (key, "0")]).unwrap_err();
            assert!(matches!(err, ConfigError::InvalidValue(ref k, _) if k == key), "{}", key);
        }
    }
}
