use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub api: ApiConfig,
    pub room: RoomConfig,
    pub facilitator: FacilitatorConfig,
    pub timing: TimingConfig,
    pub participants: ParticipantsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub log_level: String,
    pub http: HttpConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "fac-gym".to_string(),
            log_level: "info".to_string(),
            http: HttpConfig::default(),
        }
    }
}

/// Local control surface
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 7878,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api".to_string(),
            timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RoomConfig {
    pub nats_url: String,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            nats_url: "nats://localhost:4222".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FacilitatorConfig {
    /// Room identity of the local user; also the speaker id of facilitator turns
    pub identity: String,
}

impl Default for FacilitatorConfig {
    fn default() -> Self {
        Self {
            identity: "user".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub ptt_watchdog_ms: u64,
    pub clock_tick_ms: u64,
    pub floor_open_ms: u64,
    pub unload_grace_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            ptt_watchdog_ms: crate::ptt::DEFAULT_WATCHDOG.as_millis() as u64,
            clock_tick_ms: 100,
            floor_open_ms: 3000,
            unload_grace_ms: 2000,
        }
    }
}

impl TimingConfig {
    pub fn ptt_watchdog(&self) -> Duration {
        Duration::from_millis(self.ptt_watchdog_ms)
    }

    pub fn clock_tick(&self) -> Duration {
        // A zero period would make tokio's interval panic
        Duration::from_millis(self.clock_tick_ms.max(1))
    }

    pub fn floor_open(&self) -> Duration {
        Duration::from_millis(self.floor_open_ms)
    }

    pub fn unload_grace(&self) -> Duration {
        Duration::from_millis(self.unload_grace_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ParticipantsConfig {
    /// Room identities never shown as participants
    pub hidden: Vec<String>,
    pub avatars: HashMap<String, String>,
    pub default_avatar: String,
}

impl Default for ParticipantsConfig {
    fn default() -> Self {
        let avatars = [
            ("alice", "/avatars/sarah.png"),
            ("bob", "/avatars/mike.png"),
            ("charlie", "/avatars/jessica.png"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            hidden: vec!["conductor-bot".to_string()],
            avatars,
            default_avatar: "/avatars/david.png".to_string(),
        }
    }
}

impl Config {
    /// Load from `path` (any format the `config` crate understands), with
    /// `FAC_GYM__SECTION__KEY` environment overrides.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("FAC_GYM").separator("__"))
            .build()
            .with_context(|| format!("Failed to read config from {}", path))?;

        Ok(settings.try_deserialize()?)
    }
}
