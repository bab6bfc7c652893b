//! In-memory platform for tests and dry runs.
//!
//! Keeps the bookkeeping a real network would: which channels exist, which
//! peers joined them, what is installed on each peer and what is instantiated
//! on each channel. Transaction ids are deterministic hashes of a counter.
//! [`Faults`] injects transient failures and empty responses.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::platform::profile::ConnectionProfile;
use crate::platform::retry::{self, RetryPolicy};
use crate::platform::{
    ChannelClient, EventClient, InstallRequest, InstallResponse, InstantiateRequest, LedgerSdk,
    PeerInstall, PlatformError, ResourceClient, SaveChannelRequest, SigningIdentity, TxResponse,
    require_channel_id,
};

/// Failures to inject. Counters are consumed one per attempt.
#[derive(Debug, Clone, Default)]
pub struct Faults {
    pub transient_join_failures: u32,
    pub transient_install_failures: u32,
    pub transient_instantiate_failures: u32,
    pub empty_save_channel_tx: bool,
    pub empty_install_tx: bool,
    pub empty_instantiate_tx: bool,
}

#[derive(Debug, Default)]
struct ChannelState {
    joined: BTreeSet<String>,
    /// name → (version, collection names)
    instantiated: BTreeMap<String, (String, Vec<String>)>,
}

#[derive(Debug)]
pub struct DummyPlatform {
    profile: ConnectionProfile,
    retry: RetryPolicy,
    faults: Faults,
    channels: BTreeMap<String, ChannelState>,
    /// peer → {(name, version)}
    installed: BTreeMap<String, BTreeSet<(String, String)>>,
    tx_counter: u64,
    closed: bool,
}

impl DummyPlatform {
    pub fn new(profile: ConnectionProfile, retry: RetryPolicy) -> Self {
        Self {
            profile,
            retry,
            faults: Faults::default(),
            channels: BTreeMap::new(),
            installed: BTreeMap::new(),
            tx_counter: 0,
            closed: false,
        }
    }

    pub fn with_faults(mut self, faults: Faults) -> Self {
        self.faults = faults;
        self
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn joined_peers(&self, channel_id: &str) -> Vec<&str> {
        self.channels
            .get(channel_id)
            .map(|c| c.joined.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn is_installed(&self, peer: &str, name: &str, version: &str) -> bool {
        self.installed
            .get(peer)
            .is_some_and(|s| s.contains(&(name.to_string(), version.to_string())))
    }

    pub fn instantiated_version(&self, channel_id: &str, name: &str) -> Option<&str> {
        self.channels
            .get(channel_id)?
            .instantiated
            .get(name)
            .map(|(v, _)| v.as_str())
    }

    pub fn instantiated_collections(&self, channel_id: &str, name: &str) -> Vec<&str> {
        self.channels
            .get(channel_id)
            .and_then(|c| c.instantiated.get(name))
            .map(|(_, cols)| cols.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    fn ensure_open(&self) -> Result<(), PlatformError> {
        if self.closed { Err(PlatformError::Closed) } else { Ok(()) }
    }

    fn next_tx_id(&mut self, operation: &str) -> String {
        self.tx_counter += 1;
        let digest = Sha256::digest(format!("{}:{operation}:{}", self.profile.name, self.tx_counter));
        hex::encode(digest)
    }

    fn org_peers(&self, org: &str) -> Result<Vec<String>, PlatformError> {
        let (_, o) = self.profile.require_org(org)?;
        Ok(o.peers.clone())
    }

    fn require_orderer(&self, orderer: &str) -> Result<(), PlatformError> {
        if self.profile.has_orderer(orderer) {
            Ok(())
        } else {
            Err(PlatformError::Rejected(format!("unknown orderer '{orderer}'")))
        }
    }

    /// Channel must exist and at least one of `org`'s peers must have joined.
    fn require_joined(&self, channel_id: &str, org: &str) -> Result<&ChannelState, PlatformError> {
        let channel = self
            .channels
            .get(channel_id)
            .ok_or_else(|| PlatformError::Rejected(format!("channel '{channel_id}' does not exist")))?;
        let peers = self.org_peers(org)?;
        if !peers.iter().any(|p| channel.joined.contains(p)) {
            return Err(PlatformError::Rejected(format!(
                "no peer of '{org}' has joined channel '{channel_id}'"
            )));
        }
        Ok(channel)
    }

    fn try_join(&mut self, client: &ResourceClient, channel_id: &str) -> Result<(), PlatformError> {
        if self.faults.transient_join_failures > 0 {
            self.faults.transient_join_failures -= 1;
            return Err(PlatformError::Transient("peer busy".into()));
        }
        let peers = self.org_peers(&client.org)?;
        let channel = self
            .channels
            .get_mut(channel_id)
            .ok_or_else(|| PlatformError::Rejected(format!("channel '{channel_id}' does not exist")))?;
        if !peers.is_empty() && peers.iter().all(|p| channel.joined.contains(p)) {
            return Err(PlatformError::Rejected(format!(
                "peers of '{}' already joined channel '{channel_id}'",
                client.org
            )));
        }
        channel.joined.extend(peers);
        Ok(())
    }

    fn try_install(
        &mut self,
        client: &ResourceClient,
        request: &InstallRequest,
    ) -> Result<InstallResponse, PlatformError> {
        if self.faults.transient_install_failures > 0 {
            self.faults.transient_install_failures -= 1;
            return Err(PlatformError::Transient("peer busy".into()));
        }
        let peers = self.org_peers(&client.org)?;
        if peers.is_empty() {
            return Err(PlatformError::Rejected(format!("organization '{}' has no peers", client.org)));
        }
        let key = (request.name.clone(), request.version.clone());
        if peers.iter().all(|p| self.installed.get(p).is_some_and(|s| s.contains(&key))) {
            return Err(PlatformError::Rejected(format!(
                "chaincode {}:{} is already installed",
                request.name, request.version
            )));
        }

        let mut targets = Vec::with_capacity(peers.len());
        for peer in peers {
            let fresh = self.installed.entry(peer.clone()).or_default().insert(key.clone());
            targets.push(PeerInstall {
                target: peer,
                status: 200,
                info: if fresh { String::new() } else { "already installed".into() },
            });
        }
        let transaction_id = if self.faults.empty_install_tx {
            String::new()
        } else {
            self.next_tx_id("install")
        };
        debug!(name = %request.name, hash = %request.package.code_hash, "dummy install");
        Ok(InstallResponse { transaction_id, targets })
    }

    fn try_instantiate(
        &mut self,
        client: &ResourceClient,
        channel_id: &str,
        request: &InstantiateRequest,
    ) -> Result<TxResponse, PlatformError> {
        if self.faults.transient_instantiate_failures > 0 {
            self.faults.transient_instantiate_failures -= 1;
            return Err(PlatformError::Transient("endorser unavailable".into()));
        }

        let channel = self.require_joined(channel_id, &client.org)?;
        if channel.instantiated.contains_key(&request.name) {
            return Err(PlatformError::Rejected(format!(
                "chaincode '{}' is already instantiated on '{channel_id}'",
                request.name
            )));
        }
        let key = (request.name.clone(), request.version.clone());
        let installed = channel
            .joined
            .iter()
            .any(|p| self.installed.get(p).is_some_and(|s| s.contains(&key)));
        if !installed {
            return Err(PlatformError::Rejected(format!(
                "chaincode {}:{} is not installed on any joined peer",
                request.name, request.version
            )));
        }

        let policy_msps = request.policy.msp_ids().into_iter();
        let collection_msps = request
            .collections
            .iter()
            .flat_map(|c| c.as_static().signature_policy().msp_ids());
        if let Some(unknown) = policy_msps.chain(collection_msps).find(|m| !self.profile.is_known_msp(m)) {
            return Err(PlatformError::Rejected(format!("unknown MSP '{unknown}' in policy")));
        }

        let collection_names = request.collections.iter().map(|c| c.name().to_string()).collect();
        if let Some(channel) = self.channels.get_mut(channel_id) {
            channel
                .instantiated
                .insert(request.name.clone(), (request.version.clone(), collection_names));
        }
        let transaction_id = if self.faults.empty_instantiate_tx {
            String::new()
        } else {
            self.next_tx_id("instantiate")
        };
        Ok(TxResponse { transaction_id })
    }
}

/// Lowercase letter first, then `[a-z0-9.-]`, fewer than 250 characters.
impl LedgerSdk for DummyPlatform {
    fn resource_client(&mut self, org: &str, user: &str) -> Result<ResourceClient, PlatformError> {
        self.ensure_open()?;
        let msp_id = self.profile.require_user(org, user)?.to_string();
        let (org_name, _) = self.profile.require_org(org)?;
        Ok(ResourceClient { org: org_name.to_string(), user: user.to_string(), msp_id })
    }

    fn signing_identity(&mut self, org: &str, user: &str) -> Result<SigningIdentity, PlatformError> {
        self.ensure_open()?;
        let msp_id = self.profile.require_user(org, user)?.to_string();
        let certificate_fingerprint = hex::encode(Sha256::digest(format!("{msp_id}:{user}")));
        Ok(SigningIdentity { msp_id, user: user.to_string(), certificate_fingerprint })
    }

    fn save_channel(
        &mut self,
        _client: &ResourceClient,
        request: &SaveChannelRequest,
        orderer: &str,
    ) -> Result<TxResponse, PlatformError> {
        self.ensure_open()?;
        self.require_orderer(orderer)?;
        let id = &request.channel_id;
        require_channel_id(id)?;
        if request.signing_identities.is_empty() {
            return Err(PlatformError::Rejected("channel update carries no signatures".into()));
        }
        let envelope = fs::read(&request.channel_config_path).map_err(|e| {
            PlatformError::Request(format!(
                "cannot read channel config {}: {e}",
                request.channel_config_path.display()
            ))
        })?;
        if envelope.is_empty() {
            return Err(PlatformError::Rejected("channel config is empty".into()));
        }
        if self.channels.contains_key(id) {
            return Err(PlatformError::Rejected(format!("channel '{id}' already exists")));
        }

        self.channels.insert(id.clone(), ChannelState::default());
        let transaction_id = if self.faults.empty_save_channel_tx {
            String::new()
        } else {
            self.next_tx_id("save_channel")
        };
        Ok(TxResponse { transaction_id })
    }

    fn join_channel(
        &mut self,
        client: &ResourceClient,
        channel_id: &str,
        orderer: &str,
    ) -> Result<(), PlatformError> {
        self.ensure_open()?;
        self.require_orderer(orderer)?;
        let policy = self.retry.clone();
        retry::run(&policy, "join channel", || self.try_join(client, channel_id))
    }

    fn channel_client(
        &mut self,
        channel_id: &str,
        org: &str,
        user: &str,
    ) -> Result<ChannelClient, PlatformError> {
        self.ensure_open()?;
        self.profile.require_user(org, user)?;
        self.require_joined(channel_id, org)?;
        Ok(ChannelClient { channel_id: channel_id.into(), org: org.into(), user: user.into() })
    }

    fn event_client(
        &mut self,
        channel_id: &str,
        org: &str,
        user: &str,
    ) -> Result<EventClient, PlatformError> {
        self.ensure_open()?;
        self.profile.require_user(org, user)?;
        self.require_joined(channel_id, org)?;
        Ok(EventClient { channel_id: channel_id.into(), user: user.into() })
    }

    fn install_chaincode(
        &mut self,
        client: &ResourceClient,
        request: &InstallRequest,
    ) -> Result<InstallResponse, PlatformError> {
        self.ensure_open()?;
        let policy = self.retry.clone();
        retry::run(&policy, "install chaincode", || self.try_install(client, request))
    }

    fn instantiate_chaincode(
        &mut self,
        client: &ResourceClient,
        channel_id: &str,
        request: &InstantiateRequest,
    ) -> Result<TxResponse, PlatformError> {
        self.ensure_open()?;
        let policy = self.retry.clone();
        retry::run(&policy, "instantiate chaincode", || {
            self.try_instantiate(client, channel_id, request)
        })
    }

    fn close(&mut self) {
        self.closed = true;
    }
}
