//! Configuration loading with env-var overrides.
//!
//! Reads `config/default.toml` (or the file given with `-f`) and applies the
//! `LEDGER_BOOT_PROFILE` and `LEDGER_BOOT_LOG_LEVEL` env overrides.
//!
//! # Module layout
//!
//! - **types**: public configuration structs (`Config`, `NetworkConfig`, …).
//! - **raw**: TOML deserialization types mirroring the file shape; private.
//! - **load**: `merge_toml`, `load_raw_merged`, `load`, `load_from`,
//!   `expand_home`.

mod load;
mod raw;
mod types;

pub use load::{DEFAULT_CONFIG_PATH, expand_home, load, load_from};
pub use types::*;

#[cfg(test)]
impl Config {
    /// In-memory platform, no retries, paths rooted at `root`.
    pub fn test_default(root: &std::path::Path) -> Self {
        Self {
            log_level: "info".into(),
            log_file: None,
            platform: PlatformConfig {
                provider: "dummy".into(),
                gateway: GatewayConfig {
                    base_url: "http://127.0.0.1:0/v1".into(),
                    timeout_seconds: 1,
                },
                retry: crate::platform::retry::RetryPolicy::none(),
            },
            network: NetworkConfig {
                connection_profile: root.join("connection-profile.yaml"),
                org_name: "org1".into(),
                org_admin: "Admin".into(),
                user_name: "User1".into(),
                orderer_id: "orderer.example.com".into(),
                channel_id: "mychannel".into(),
                channel_config: root.join("channel.tx"),
            },
            chaincode: ChaincodeConfig {
                gopath: root.join("go"),
                version: "0".into(),
                init_args: vec!["init".into()],
                endorsement_msps: Vec::new(),
                endorsement_policy: None,
                packages: vec![ChaincodeSpec {
                    name: "vote".into(),
                    path: "vote/chaincode".into(),
                    collections_dir: None,
                }],
            },
            gateway_token: None,
        }
    }
}
