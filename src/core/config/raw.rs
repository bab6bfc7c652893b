//! Raw TOML deserialization types.
//!
//! These structs mirror the TOML file shape and use `serde` defaults.
//! The `load` module converts them into the public `types` structs.

use serde::Deserialize;

// ── Top-level ────────────────────────────────────────────────────────────────

/// Raw TOML shape: serde target before resolution.
#[derive(Deserialize)]
pub(super) struct RawConfig {
    #[serde(default)]
    pub bootstrap: RawBootstrap,
    #[serde(default)]
    pub platform: RawPlatform,
    pub network: RawNetwork,
    #[serde(default)]
    pub chaincode: RawChaincode,
}

#[derive(Deserialize)]
pub(super) struct RawBootstrap {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_file: Option<String>,
}

impl Default for RawBootstrap {
    fn default() -> Self {
        Self { log_level: default_log_level(), log_file: None }
    }
}

// ── Platform ────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(super) struct RawPlatform {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub gateway: RawGateway,
    #[serde(default)]
    pub retry: RawRetry,
}

impl Default for RawPlatform {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            gateway: RawGateway::default(),
            retry: RawRetry::default(),
        }
    }
}

#[derive(Deserialize)]
pub(super) struct RawGateway {
    #[serde(default = "default_gateway_base_url")]
    pub base_url: String,
    #[serde(default = "default_gateway_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for RawGateway {
    fn default() -> Self {
        Self {
            base_url: default_gateway_base_url(),
            timeout_seconds: default_gateway_timeout_seconds(),
        }
    }
}

#[derive(Deserialize)]
pub(super) struct RawRetry {
    #[serde(default = "default_retry_attempts")]
    pub attempts: u32,
    #[serde(default = "default_retry_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_retry_max_backoff_ms")]
    pub max_backoff_ms: u64,
    #[serde(default = "default_retry_backoff_factor")]
    pub backoff_factor: f64,
}

impl Default for RawRetry {
    fn default() -> Self {
        Self {
            attempts: default_retry_attempts(),
            initial_backoff_ms: default_retry_initial_backoff_ms(),
            max_backoff_ms: default_retry_max_backoff_ms(),
            backoff_factor: default_retry_backoff_factor(),
        }
    }
}

// ── Network ─────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(super) struct RawNetwork {
    pub connection_profile: String,
    pub org_name: String,
    pub org_admin: String,
    pub user_name: String,
    pub orderer_id: String,
    pub channel_id: String,
    pub channel_config: String,
}

// ── Chaincode ───────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(super) struct RawChaincode {
    #[serde(default = "default_gopath")]
    pub gopath: String,
    #[serde(default = "default_chaincode_version")]
    pub version: String,
    #[serde(default = "default_init_args")]
    pub init_args: Vec<String>,
    #[serde(default)]
    pub endorsement_msps: Vec<String>,
    #[serde(default)]
    pub endorsement_policy: Option<String>,
    #[serde(default)]
    pub packages: Vec<RawPackage>,
}

impl Default for RawChaincode {
    fn default() -> Self {
        Self {
            gopath: default_gopath(),
            version: default_chaincode_version(),
            init_args: default_init_args(),
            endorsement_msps: Vec::new(),
            endorsement_policy: None,
            packages: Vec::new(),
        }
    }
}

#[derive(Deserialize)]
pub(super) struct RawPackage {
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub collections_dir: Option<String>,
}

// ── Defaults ────────────────────────────────────────────────────────────────

pub(super) fn default_log_level() -> String { "info".to_string() }
pub(super) fn default_provider() -> String { "dummy".to_string() }
pub(super) fn default_gateway_base_url() -> String { "http://127.0.0.1:8801/v1".to_string() }
pub(super) fn default_gateway_timeout_seconds() -> u64 { 30 }
pub(super) fn default_retry_attempts() -> u32 { 5 }
pub(super) fn default_retry_initial_backoff_ms() -> u64 { 1_000 }
pub(super) fn default_retry_max_backoff_ms() -> u64 { 5_000 }
pub(super) fn default_retry_backoff_factor() -> f64 { 2.5 }
pub(super) fn default_gopath() -> String { "~/go".to_string() }
pub(super) fn default_chaincode_version() -> String { "0".to_string() }
pub(super) fn default_init_args() -> Vec<String> { vec!["init".to_string()] }
