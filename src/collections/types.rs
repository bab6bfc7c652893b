//! Compiled collection configuration handed to chaincode instantiation.

use serde::{Deserialize, Serialize};

use crate::policy::SignaturePolicyEnvelope;

/// Which organizations may hold the collection's private data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionPolicyConfig {
    SignaturePolicy(SignaturePolicyEnvelope),
}

/// Collection-level endorsement policy, overriding the chaincode's.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationPolicy {
    SignaturePolicy(SignaturePolicyEnvelope),
    /// Name of a policy defined in the channel configuration.
    ChannelConfigPolicyReference(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticCollectionConfig {
    pub name: String,
    pub member_orgs_policy: CollectionPolicyConfig,
    pub required_peer_count: i32,
    pub maximum_peer_count: i32,
    /// Blocks after which private data is purged; `0` keeps it forever.
    pub block_to_live: u64,
    pub member_only_read: bool,
    pub member_only_write: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endorsement_policy: Option<ApplicationPolicy>,
}

impl StaticCollectionConfig {
    pub fn signature_policy(&self) -> &SignaturePolicyEnvelope {
        match &self.member_orgs_policy {
            CollectionPolicyConfig::SignaturePolicy(p) => p,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionConfig {
    Static(StaticCollectionConfig),
}

impl CollectionConfig {
    pub fn as_static(&self) -> &StaticCollectionConfig {
        match self {
            CollectionConfig::Static(c) => c,
        }
    }

    pub fn name(&self) -> &str {
        &self.as_static().name
    }
}
