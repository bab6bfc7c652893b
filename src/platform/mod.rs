//! Ledger platform seam.
//!
//! [`LedgerSdk`] is the client API the bootstrap sequencer drives. Everything
//! the platform itself guarantees (ordering, endorsement, gossip, signatures)
//! lives behind it. `providers::build` picks an implementation from config.

pub mod package;
pub mod profile;
pub mod providers;
pub mod retry;

use serde::Serialize;
use thiserror::Error;

use crate::collections::CollectionConfig;
use crate::policy::SignaturePolicyEnvelope;

use package::ChaincodePackage;

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("unknown platform provider: {0}")]
    UnknownProvider(String),

    #[error("connection profile: {0}")]
    Profile(String),

    #[error("identity: {0}")]
    Identity(String),

    #[error("chaincode package: {0}")]
    Package(String),

    /// Worth retrying: busy peer, unavailable orderer, transport failure.
    #[error("transient failure: {0}")]
    Transient(String),

    #[error("rejected by platform: {0}")]
    Rejected(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        last: Box<PlatformError>,
    },

    #[error("sdk is closed")]
    Closed,
}

impl PlatformError {
    pub fn is_transient(&self) -> bool {
        matches!(self, PlatformError::Transient(_))
    }
}

// ── Channel ids ───────────────────────────────────────────────────────────────

/// Channel names the platform accepts: a lowercase letter followed by
/// lowercase letters, digits, '.' or '-', shorter than 250 characters.
pub fn valid_channel_id(id: &str) -> bool {
    let mut chars = id.chars();
    id.len() < 250
        && chars.next().is_some_and(|c| c.is_ascii_lowercase())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' || c == '-')
}

pub fn require_channel_id(id: &str) -> Result<(), PlatformError> {
    if valid_channel_id(id) {
        Ok(())
    } else {
        Err(PlatformError::Rejected(format!("invalid channel id '{id}'")))
    }
}

// ── Client handles ────────────────────────────────────────────────────────────

/// Resource-management client scoped to an organization's admin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceClient {
    pub org: String,
    pub user: String,
    pub msp_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningIdentity {
    pub msp_id: String,
    pub user: String,
    /// Hex SHA-256 of the enrolment certificate.
    pub certificate_fingerprint: String,
}

/// Application client for submitting transactions on one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelClient {
    pub channel_id: String,
    pub org: String,
    pub user: String,
}

/// Block/chaincode event subscription handle for one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventClient {
    pub channel_id: String,
    pub user: String,
}

// ── Requests and responses ────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SaveChannelRequest {
    pub channel_id: String,
    pub channel_config_path: std::path::PathBuf,
    pub signing_identities: Vec<SigningIdentity>,
}

#[derive(Debug, Clone)]
pub struct InstallRequest {
    pub name: String,
    pub path: String,
    pub version: String,
    pub package: ChaincodePackage,
}

#[derive(Debug, Clone)]
pub struct InstantiateRequest {
    pub name: String,
    pub path: String,
    pub version: String,
    pub args: Vec<Vec<u8>>,
    pub policy: SignaturePolicyEnvelope,
    pub collections: Vec<CollectionConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TxResponse {
    /// Empty when the platform accepted the call but produced no transaction.
    pub transaction_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeerInstall {
    pub target: String,
    pub status: i32,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub info: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallResponse {
    pub transaction_id: String,
    pub targets: Vec<PeerInstall>,
}

// ── SDK trait ─────────────────────────────────────────────────────────────────

/// Client API of the ledger platform.
///
/// Implementations apply their own retry policy to join, install and
/// instantiate. Every call after [`close`](LedgerSdk::close) fails with
/// [`PlatformError::Closed`].
pub trait LedgerSdk {
    fn resource_client(&mut self, org: &str, user: &str) -> Result<ResourceClient, PlatformError>;

    fn signing_identity(&mut self, org: &str, user: &str) -> Result<SigningIdentity, PlatformError>;

    fn save_channel(
        &mut self,
        client: &ResourceClient,
        request: &SaveChannelRequest,
        orderer: &str,
    ) -> Result<TxResponse, PlatformError>;

    /// Join the client organization's peers to `channel_id`.
    fn join_channel(
        &mut self,
        client: &ResourceClient,
        channel_id: &str,
        orderer: &str,
    ) -> Result<(), PlatformError>;

    fn channel_client(
        &mut self,
        channel_id: &str,
        org: &str,
        user: &str,
    ) -> Result<ChannelClient, PlatformError>;

    fn event_client(
        &mut self,
        channel_id: &str,
        org: &str,
        user: &str,
    ) -> Result<EventClient, PlatformError>;

    /// Install on every peer of the client's organization.
    fn install_chaincode(
        &mut self,
        client: &ResourceClient,
        request: &InstallRequest,
    ) -> Result<InstallResponse, PlatformError>;

    fn instantiate_chaincode(
        &mut self,
        client: &ResourceClient,
        channel_id: &str,
        request: &InstantiateRequest,
    ) -> Result<TxResponse, PlatformError>;

    /// Release connections. Idempotent.
    fn close(&mut self);
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_ids_follow_platform_naming() {
        assert!(valid_channel_id("mychannel"));
        assert!(valid_channel_id("vote-2.test"));
        assert!(!valid_channel_id(""));
        assert!(!valid_channel_id("MyChannel"));
        assert!(!valid_channel_id("1channel"));
        assert!(!valid_channel_id("bad/id?x"));
        assert!(!valid_channel_id(&"a".repeat(250)));
        assert!(matches!(require_channel_id("../admin"), Err(PlatformError::Rejected(_))));
    }

    #[test]
    fn only_transient_errors_are_transient() {
        assert!(PlatformError::Transient("busy".into()).is_transient());
        assert!(!PlatformError::Rejected("no".into()).is_transient());
        let exhausted = PlatformError::RetriesExhausted {
            attempts: 6,
            last: Box::new(PlatformError::Transient("busy".into())),
        };
        assert!(!exhausted.is_transient());
        assert_eq!(exhausted.to_string(), "gave up after 6 attempts: transient failure: busy");
    }

    #[test]
    fn install_response_serializes_targets() {
        let resp = InstallResponse {
            transaction_id: "abc".into(),
            targets: vec![PeerInstall { target: "peer0".into(), status: 200, info: String::new() }],
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["targets"][0]["status"], 200);
        assert!(json["targets"][0].get("info").is_none());
    }
}
