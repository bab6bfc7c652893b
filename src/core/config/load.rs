//! Configuration loading with env-var overrides.
//!
//! Reads TOML files, supports `[meta] base = "..."` inheritance chains,
//! and applies `LEDGER_BOOT_PROFILE` and `LEDGER_BOOT_LOG_LEVEL` overrides.

use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::core::error::AppError;
use crate::platform::retry::RetryPolicy;

use super::raw::RawConfig;
use super::types::*;

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Deep-merge two TOML values. Tables merge recursively; any other overlay
/// value replaces the base value wholesale (arrays included).
fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_tbl), toml::Value::Table(overlay_tbl)) => {
            for (key, ov_val) in overlay_tbl {
                let merged = match base_tbl.remove(&key) {
                    Some(base_val) => merge_toml(base_val, ov_val),
                    None => ov_val,
                };
                base_tbl.insert(key, merged);
            }
            toml::Value::Table(base_tbl)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file, follow any `[meta] base = "..."` chain, and return the
/// merged `toml::Value`. `visited` holds canonical paths already seen so
/// cycles are reported instead of recursing forever.
fn load_raw_merged(path: &Path, visited: &mut HashSet<PathBuf>) -> Result<toml::Value, AppError> {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    if !visited.insert(canonical) {
        return Err(AppError::Config(format!(
            "circular base reference detected at: {}",
            path.display()
        )));
    }

    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;

    let overlay_val: toml::Value = toml::from_str(&raw)
        .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?;

    let base_str = overlay_val
        .get("meta")
        .and_then(|m| m.get("base"))
        .and_then(|b| b.as_str());

    match base_str {
        Some(base_str) => {
            let base_path = if Path::new(base_str).is_absolute() {
                PathBuf::from(base_str)
            } else {
                path.parent().unwrap_or(Path::new(".")).join(base_str)
            };
            let base_val = load_raw_merged(&base_path, visited)?;
            Ok(merge_toml(base_val, overlay_val))
        }
        None => Ok(overlay_val),
    }
}

/// Load config from the given path, or `config/default.toml`, then apply
/// env-var overrides. Network settings have no built-in defaults, so a
/// missing file is an error.
pub fn load(config_path: Option<&str>) -> Result<Config, AppError> {
    let profile_override = env::var("LEDGER_BOOT_PROFILE").ok();
    let log_level_override = env::var("LEDGER_BOOT_LOG_LEVEL").ok();

    let path = Path::new(config_path.unwrap_or(DEFAULT_CONFIG_PATH));
    let mut config = load_from(path, profile_override.as_deref(), log_level_override.as_deref())?;
    config.gateway_token = env::var("LEDGER_BOOT_GATEWAY_TOKEN").ok();
    Ok(config)
}

/// Loader with explicit overrides. Tests pass overrides directly instead of
/// mutating env vars.
pub fn load_from(
    path: &Path,
    profile_override: Option<&str>,
    log_level_override: Option<&str>,
) -> Result<Config, AppError> {
    let merged_val = load_raw_merged(path, &mut HashSet::new())?;

    let parsed: RawConfig = Deserialize::deserialize(merged_val).map_err(|e: toml::de::Error| {
        AppError::Config(format!("config error in {}: {e}", path.display()))
    })?;

    let n = parsed.network;
    let connection_profile = expand_home(profile_override.unwrap_or(&n.connection_profile));
    let log_level = log_level_override.unwrap_or(&parsed.bootstrap.log_level).to_string();

    let r = parsed.platform.retry;
    if !r.backoff_factor.is_finite() || r.backoff_factor < 1.0 {
        return Err(AppError::Config(format!(
            "platform.retry.backoff_factor must be >= 1.0, got {}",
            r.backoff_factor
        )));
    }
    let retry = RetryPolicy {
        attempts: r.attempts,
        initial_backoff: Duration::from_millis(r.initial_backoff_ms),
        max_backoff: Duration::from_millis(r.max_backoff_ms),
        backoff_factor: r.backoff_factor,
    };

    let cc = parsed.chaincode;
    let mut seen = HashSet::new();
    for p in &cc.packages {
        if !seen.insert(p.name.as_str()) {
            return Err(AppError::Config(format!(
                "duplicate chaincode package name '{}'",
                p.name
            )));
        }
    }
    let packages = cc
        .packages
        .into_iter()
        .map(|p| ChaincodeSpec {
            name: p.name,
            path: p.path,
            collections_dir: p.collections_dir.as_deref().map(expand_home),
        })
        .collect();

    Ok(Config {
        log_level,
        log_file: parsed.bootstrap.log_file.as_deref().map(expand_home),
        platform: PlatformConfig {
            provider: parsed.platform.provider,
            gateway: GatewayConfig {
                base_url: parsed.platform.gateway.base_url.trim_end_matches('/').to_string(),
                timeout_seconds: parsed.platform.gateway.timeout_seconds,
            },
            retry,
        },
        network: NetworkConfig {
            connection_profile,
            org_name: n.org_name,
            org_admin: n.org_admin,
            user_name: n.user_name,
            orderer_id: n.orderer_id,
            channel_id: n.channel_id,
            channel_config: expand_home(&n.channel_config),
        },
        chaincode: ChaincodeConfig {
            gopath: expand_home(&cc.gopath),
            version: cc.version,
            init_args: cc.init_args,
            endorsement_msps: cc.endorsement_msps,
            endorsement_policy: cc.endorsement_policy,
            packages,
        },
        gateway_token: None,
    })
}

/// Expand a leading `~` to the user's home directory.
/// Absolute or relative paths without `~` are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}
