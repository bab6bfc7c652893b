//! Private-data collection configuration.
//!
//! Reads `collections_config.json` from a directory and turns each
//! descriptor into a [`CollectionConfig`] ready for chaincode instantiation.
//!
//! The file holds a JSON array of descriptors; a single descriptor object is
//! accepted as a one-element array:
//!
//! ```json
//! [{
//!   "name": "votes",
//!   "policy": "OR('Org1MSP.member')",
//!   "requiredPeerCount": 1,
//!   "maxPeerCount": 2,
//!   "blockToLive": 1000000,
//!   "memberOnlyRead": false
//! }]
//! ```
//!
//! Entries are compiled in file order. The first invalid entry aborts the
//! whole load; no partial list is returned.

mod types;

use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::policy::{PolicyError, SignaturePolicyEnvelope};

pub use types::*;

/// File name looked up inside the collections directory.
pub const COLLECTIONS_FILE: &str = "collections_config.json";

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum CollectionError {
    #[error("collections config not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed collections config: {0}")]
    Parse(String),
    #[error("collection '{collection}': invalid policy: {source}")]
    Policy {
        collection: String,
        #[source]
        source: PolicyError,
    },
    #[error("invalid collection config: {0}")]
    Invalid(String),
}

// ── Raw JSON shape ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawCollection {
    name: String,
    policy: String,
    required_peer_count: i32,
    max_peer_count: i32,
    #[serde(default)]
    block_to_live: u64,
    #[serde(default)]
    member_only_read: bool,
    #[serde(default)]
    member_only_write: bool,
    #[serde(default)]
    endorsement_policy: Option<RawEndorsementPolicy>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawEndorsementPolicy {
    #[serde(default)]
    signature_policy: Option<String>,
    #[serde(default)]
    channel_config_policy: Option<String>,
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Load and compile `dir/collections_config.json`.
pub fn load_collections(dir: &Path) -> Result<Vec<CollectionConfig>, CollectionError> {
    let path = dir.join(COLLECTIONS_FILE);
    let raw = fs::read_to_string(&path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => CollectionError::NotFound(path.clone()),
        _ => CollectionError::Read { path: path.clone(), source: e },
    })?;
    debug!(path = %path.display(), bytes = raw.len(), "collections config read");
    parse_collections(&raw)
}

/// Compile collection descriptors from a JSON string.
pub fn parse_collections(json: &str) -> Result<Vec<CollectionConfig>, CollectionError> {
    // Dispatch on the first token rather than an untagged enum so schema
    // errors name the offending field.
    let raws: Vec<RawCollection> = if json.trim_start().starts_with('[') {
        serde_json::from_str(json).map_err(|e| CollectionError::Parse(e.to_string()))?
    } else {
        let one: RawCollection =
            serde_json::from_str(json).map_err(|e| CollectionError::Parse(e.to_string()))?;
        vec![one]
    };

    let mut seen = HashSet::new();
    let mut configs = Vec::with_capacity(raws.len());
    for raw in raws {
        if !seen.insert(raw.name.clone()) {
            return Err(CollectionError::Invalid(format!(
                "duplicate collection name '{}'",
                raw.name
            )));
        }
        configs.push(compile(raw)?);
    }
    Ok(configs)
}

fn compile(raw: RawCollection) -> Result<CollectionConfig, CollectionError> {
    if raw.name.trim().is_empty() {
        return Err(CollectionError::Invalid("collection name must not be empty".into()));
    }
    if raw.required_peer_count < 0 {
        return Err(CollectionError::Invalid(format!(
            "collection '{}': requiredPeerCount ({}) cannot be negative",
            raw.name, raw.required_peer_count
        )));
    }
    if raw.max_peer_count < raw.required_peer_count {
        return Err(CollectionError::Invalid(format!(
            "collection '{}': maxPeerCount ({}) cannot be less than requiredPeerCount ({})",
            raw.name, raw.max_peer_count, raw.required_peer_count
        )));
    }

    let member_orgs = SignaturePolicyEnvelope::from_expression(&raw.policy).map_err(|source| {
        CollectionError::Policy { collection: raw.name.clone(), source }
    })?;

    let endorsement_policy = match raw.endorsement_policy {
        None => None,
        Some(ep) => Some(compile_endorsement(&raw.name, ep)?),
    };

    debug!(collection = %raw.name, policy = %member_orgs, "collection compiled");

    Ok(CollectionConfig::Static(StaticCollectionConfig {
        name: raw.name,
        member_orgs_policy: CollectionPolicyConfig::SignaturePolicy(member_orgs),
        required_peer_count: raw.required_peer_count,
        maximum_peer_count: raw.max_peer_count,
        block_to_live: raw.block_to_live,
        member_only_read: raw.member_only_read,
        member_only_write: raw.member_only_write,
        endorsement_policy,
    }))
}

fn compile_endorsement(
    collection: &str,
    raw: RawEndorsementPolicy,
) -> Result<ApplicationPolicy, CollectionError> {
    match (raw.signature_policy, raw.channel_config_policy) {
        (Some(expr), None) => SignaturePolicyEnvelope::from_expression(&expr)
            .map(ApplicationPolicy::SignaturePolicy)
            .map_err(|source| CollectionError::Policy { collection: collection.to_string(), source }),
        (None, Some(reference)) if !reference.trim().is_empty() => {
            Ok(ApplicationPolicy::ChannelConfigPolicyReference(reference))
        }
        _ => Err(CollectionError::Invalid(format!(
            "collection '{collection}': endorsementPolicy needs exactly one of \
             signaturePolicy or channelConfigPolicy"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::signed_by_any_member;
    use tempfile::TempDir;

    const VOTES: &str = r#"[{"name":"votes","policy":"OR('Org1MSP.member')","requiredPeerCount":1,"maxPeerCount":2,"blockToLive":1000000,"memberOnlyRead":false}]"#;

    #[test]
    fn votes_scenario() {
        let configs = parse_collections(VOTES).unwrap();
        assert_eq!(configs.len(), 1);
        let c = configs[0].as_static();
        assert_eq!(c.name, "votes");
        assert_eq!(c.required_peer_count, 1);
        assert_eq!(c.maximum_peer_count, 2);
        assert_eq!(c.block_to_live, 1_000_000);
        assert!(!c.member_only_read);
        assert_eq!(c.signature_policy(), &signed_by_any_member(&["Org1MSP"]));
    }

    #[test]
    fn invalid_policy_yields_no_configs() {
        let json = r#"[
            {"name":"a","policy":"OR('Org1MSP.member')","requiredPeerCount":0,"maxPeerCount":1},
            {"name":"b","policy":"not-a-real-policy","requiredPeerCount":0,"maxPeerCount":1},
            {"name":"c","policy":"OR('Org2MSP.member')","requiredPeerCount":0,"maxPeerCount":1}
        ]"#;
        let err = parse_collections(json).unwrap_err();
        assert!(matches!(err, CollectionError::Policy { ref collection, .. } if collection == "b"));
    }

    #[test]
    fn single_object_is_accepted() {
        let json = r#"{"name":"solo","policy":"AND('Org1MSP.peer')","requiredPeerCount":0,"maxPeerCount":0}"#;
        let configs = parse_collections(json).unwrap();
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].name(), "solo");
        assert_eq!(configs[0].as_static().block_to_live, 0);
    }

    #[test]
    fn empty_array_yields_nothing() {
        assert!(parse_collections("[]").unwrap().is_empty());
    }

    #[test]
    fn order_is_preserved() {
        let json = r#"[
            {"name":"z","policy":"OR('A.member')","requiredPeerCount":0,"maxPeerCount":1},
            {"name":"a","policy":"OR('B.member')","requiredPeerCount":0,"maxPeerCount":1},
            {"name":"m","policy":"OR('C.member')","requiredPeerCount":0,"maxPeerCount":1}
        ]"#;
        let names: Vec<_> = parse_collections(json)
            .unwrap()
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        assert_eq!(names, vec!["z", "a", "m"]);
    }

    #[test]
    fn max_below_required_is_rejected() {
        let json = r#"[{"name":"x","policy":"OR('A.member')","requiredPeerCount":3,"maxPeerCount":2}]"#;
        let err = parse_collections(json).unwrap_err();
        assert!(err.to_string().contains("cannot be less than"));
    }

    #[test]
    fn negative_required_is_rejected() {
        let json = r#"[{"name":"x","policy":"OR('A.member')","requiredPeerCount":-1,"maxPeerCount":2}]"#;
        assert!(matches!(parse_collections(json).unwrap_err(), CollectionError::Invalid(_)));
    }

    #[test]
    fn negative_block_to_live_fails_schema() {
        let json = r#"[{"name":"x","policy":"OR('A.member')","requiredPeerCount":0,"maxPeerCount":2,"blockToLive":-5}]"#;
        assert!(matches!(parse_collections(json).unwrap_err(), CollectionError::Parse(_)));
    }

    #[test]
    fn string_count_fails_schema() {
        let json = r#"[{"name":"x","policy":"OR('A.member')","requiredPeerCount":"1","maxPeerCount":2}]"#;
        assert!(matches!(parse_collections(json).unwrap_err(), CollectionError::Parse(_)));
    }

    #[test]
    fn unknown_field_fails_schema() {
        let json = r#"[{"name":"x","policy":"OR('A.member')","requiredPeerCount":0,"maxPeerCount":2,"maxPeers":2}]"#;
        assert!(matches!(parse_collections(json).unwrap_err(), CollectionError::Parse(_)));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let json = r#"[
            {"name":"dup","policy":"OR('A.member')","requiredPeerCount":0,"maxPeerCount":1},
            {"name":"dup","policy":"OR('A.member')","requiredPeerCount":0,"maxPeerCount":1}
        ]"#;
        assert!(parse_collections(json).unwrap_err().to_string().contains("duplicate"));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        assert!(matches!(parse_collections("[{").unwrap_err(), CollectionError::Parse(_)));
    }

    #[test]
    fn endorsement_policy_variants() {
        let json = r#"[
            {"name":"sig","policy":"OR('A.member')","requiredPeerCount":0,"maxPeerCount":1,
             "memberOnlyWrite":true,"endorsementPolicy":{"signaturePolicy":"AND('A.peer')"}},
            {"name":"ref","policy":"OR('A.member')","requiredPeerCount":0,"maxPeerCount":1,
             "endorsementPolicy":{"channelConfigPolicy":"/Channel/Application/Endorsement"}}
        ]"#;
        let configs = parse_collections(json).unwrap();
        let sig = configs[0].as_static();
        assert!(sig.member_only_write);
        assert!(matches!(sig.endorsement_policy, Some(ApplicationPolicy::SignaturePolicy(_))));
        assert_eq!(
            configs[1].as_static().endorsement_policy,
            Some(ApplicationPolicy::ChannelConfigPolicyReference(
                "/Channel/Application/Endorsement".into()
            ))
        );
    }

    #[test]
    fn endorsement_policy_needs_exactly_one_form() {
        let json = r#"[{"name":"x","policy":"OR('A.member')","requiredPeerCount":0,"maxPeerCount":1,
            "endorsementPolicy":{}}]"#;
        assert!(matches!(parse_collections(json).unwrap_err(), CollectionError::Invalid(_)));
    }

    #[test]
    fn load_from_directory() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(COLLECTIONS_FILE), VOTES).unwrap();
        let configs = load_collections(dir.path()).unwrap();
        assert_eq!(configs[0].name(), "votes");
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = load_collections(dir.path()).unwrap_err();
        assert!(matches!(err, CollectionError::NotFound(ref p) if p.ends_with(COLLECTIONS_FILE)));
    }
}
