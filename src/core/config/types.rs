//! Resolved configuration types consumed by the rest of the crate.

use std::path::{Path, PathBuf};

use crate::platform::retry::RetryPolicy;

/// Gateway provider settings (`[platform.gateway]`).
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Base URL of the ledger REST gateway, without trailing slash.
    pub base_url: String,
    /// Per-request HTTP timeout in seconds.
    pub timeout_seconds: u64,
}

/// Which platform client to build and how it retries.
#[derive(Debug, Clone)]
pub struct PlatformConfig {
    /// `"dummy"` (in-memory) or `"gateway"`.
    pub provider: String,
    pub gateway: GatewayConfig,
    /// Default policy for resource-management calls (join, install, instantiate).
    pub retry: RetryPolicy,
}

/// Identities and endpoints of the network being bootstrapped.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// YAML connection profile the SDK is initialised from.
    pub connection_profile: PathBuf,
    pub org_name: String,
    pub org_admin: String,
    pub user_name: String,
    pub orderer_id: String,
    pub channel_id: String,
    /// Channel creation transaction (`channel.tx`).
    pub channel_config: PathBuf,
}

/// One chaincode to package, install and instantiate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChaincodeSpec {
    pub name: String,
    /// Import path below `$GOPATH/src`.
    pub path: String,
    /// Directory holding `collections_config.json`; the source dir when unset.
    pub collections_dir: Option<PathBuf>,
}

impl ChaincodeSpec {
    pub fn source_dir(&self, gopath: &Path) -> PathBuf {
        gopath.join("src").join(&self.path)
    }

    pub fn collections_dir(&self, gopath: &Path) -> PathBuf {
        self.collections_dir
            .clone()
            .unwrap_or_else(|| self.source_dir(gopath))
    }
}

#[derive(Debug, Clone)]
pub struct ChaincodeConfig {
    pub gopath: PathBuf,
    pub version: String,
    pub init_args: Vec<String>,
    /// MSPs whose members may endorse. Empty means the client org's MSP.
    pub endorsement_msps: Vec<String>,
    /// Explicit policy expression; takes precedence over `endorsement_msps`.
    pub endorsement_policy: Option<String>,
    /// Deployed in this order.
    pub packages: Vec<ChaincodeSpec>,
}

/// Fully-resolved configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    /// Append logs here instead of stderr.
    pub log_file: Option<PathBuf>,
    pub platform: PlatformConfig,
    pub network: NetworkConfig,
    pub chaincode: ChaincodeConfig,
    /// Bearer token from `LEDGER_BOOT_GATEWAY_TOKEN`. Never sourced from TOML.
    pub gateway_token: Option<String>,
}
