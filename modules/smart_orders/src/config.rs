//! Configuration for the smart orders module

use crate::contract::CompletionPolicy;
use serde::Deserialize;
use std::time::Duration;

/// Smart orders module configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// How `complete` obtains the traffic total
    #[serde(default)]
    pub completion_policy: CompletionPolicyConfig,

    /// External traffic calculator
    #[serde(default)]
    pub traffic: TrafficConfig,

    /// Session lifetime
    #[serde(default = "default_session_ttl", with = "humantime_serde")]
    pub session_ttl: Duration,

    /// Orders waiting longer than this for the traffic callback return to `formed`
    #[serde(default = "default_pending_timeout", with = "humantime_serde")]
    pub pending_completion_timeout: Duration,

    /// Period of the pending-completion and session sweep
    #[serde(default = "default_sweep_interval", with = "humantime_serde")]
    pub sweep_interval: Duration,

    /// Device image storage
    #[serde(default)]
    pub object_store: ObjectStoreConfig,
}

/// Serialized form of [`CompletionPolicy`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionPolicyConfig {
    #[default]
    Sync,
    Async,
}

impl From<CompletionPolicyConfig> for CompletionPolicy {
    fn from(value: CompletionPolicyConfig) -> Self {
        match value {
            CompletionPolicyConfig::Sync => CompletionPolicy::Sync,
            CompletionPolicyConfig::Async => CompletionPolicy::Async,
        }
    }
}

/// External traffic calculator settings
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrafficConfig {
    /// Endpoint receiving calculation requests
    #[serde(default = "default_calculator_url")]
    pub calculator_url: String,

    /// Shared secret the calculator presents on callback; empty rejects every callback
    #[serde(default)]
    pub callback_token: String,

    /// Per-attempt timeout
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Additional attempts after a transport error or 5xx
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for TrafficConfig {
    fn default() -> Self {
        Self {
            calculator_url: default_calculator_url(),
            callback_token: String::new(),
            request_timeout: default_request_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

/// Object storage for device images
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ObjectStoreConfig {
    /// Base URL images are served from
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,

    /// Bucket holding device images
    #[serde(default = "default_bucket")]
    pub bucket: String,
}

impl Default for ObjectStoreConfig {
    fn default() -> Self {
        Self {
            public_base_url: default_public_base_url(),
            bucket: default_bucket(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            completion_policy: CompletionPolicyConfig::default(),
            traffic: TrafficConfig::default(),
            session_ttl: default_session_ttl(),
            pending_completion_timeout: default_pending_timeout(),
            sweep_interval: default_sweep_interval(),
            object_store: ObjectStoreConfig::default(),
        }
    }
}

fn default_session_ttl() -> Duration {
    Duration::from_secs(24 * 60 * 60)
}

fn default_pending_timeout() -> Duration {
    Duration::from_secs(15 * 60)
}

fn default_sweep_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_calculator_url() -> String {
    "http://localhost:3000/api/traffic_calculation_async".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_max_retries() -> u32 {
    1
}

fn default_public_base_url() -> String {
    "http://localhost:9000".to_string()
}

fn default_bucket() -> String {
    "devices".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_legacy_deployment() {
        let cfg = Config::default();
        assert_eq!(cfg.session_ttl, Duration::from_secs(86_400));
        assert_eq!(cfg.traffic.max_retries, 1);
        assert_eq!(
            CompletionPolicy::from(cfg.completion_policy),
            CompletionPolicy::Sync
        );
    }

    #[test]
    fn test_humantime_and_policy_parsing() {
        let cfg: Config = serde_json::from_value(serde_json::json!({
            "completion_policy": "async",
            "session_ttl": "2h",
            "traffic": { "callback_token": "s3cret", "request_timeout": "750ms" }
        }))
        .unwrap();

        assert_eq!(cfg.completion_policy, CompletionPolicyConfig::Async);
        assert_eq!(cfg.session_ttl, Duration::from_secs(7200));
        assert_eq!(cfg.traffic.request_timeout, Duration::from_millis(750));
        assert_eq!(cfg.traffic.callback_token, "s3cret");
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let parsed: Result<Config, _> =
            serde_json::from_value(serde_json::json!({ "sesion_ttl": "1h" }));
        assert!(parsed.is_err());
    }
}
