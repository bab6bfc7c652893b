//! Platform provider implementations.
//!
//! `build(config, profile, token)` is the factory, called once per session.
//! Adding a backend = new module + new variant + new match arm.

pub mod dummy;
#[cfg(feature = "provider-gateway")]
pub mod gateway;

use crate::core::config::PlatformConfig;
use crate::platform::profile::ConnectionProfile;
use crate::platform::{
    ChannelClient, EventClient, InstallRequest, InstallResponse, InstantiateRequest, LedgerSdk,
    PlatformError, ResourceClient, SaveChannelRequest, SigningIdentity, TxResponse,
};

/// All available platform backends.
///
/// Enum dispatch keeps the session generic over one concrete type.
#[derive(Debug)]
pub enum PlatformProvider {
    Dummy(dummy::DummyPlatform),
    #[cfg(feature = "provider-gateway")]
    Gateway(gateway::GatewayPlatform),
}

/// Construct a provider from config, the parsed connection profile and an
/// optional bearer token.
///
/// `token` is sourced from `LEDGER_BOOT_GATEWAY_TOKEN` (never TOML) and is
/// ignored by the dummy platform.
pub fn build(
    config: &PlatformConfig,
    profile: ConnectionProfile,
    token: Option<String>,
) -> Result<PlatformProvider, PlatformError> {
    match config.provider.as_str() {
        "dummy" => Ok(PlatformProvider::Dummy(dummy::DummyPlatform::new(
            profile,
            config.retry.clone(),
        ))),
        #[cfg(feature = "provider-gateway")]
        "gateway" => {
            let gw = &config.gateway;
            let p = gateway::GatewayPlatform::new(
                gw.base_url.clone(),
                gw.timeout_seconds,
                token,
                profile,
                config.retry.clone(),
            )?;
            Ok(PlatformProvider::Gateway(p))
        }
        _ => {
            let _ = token;
            Err(PlatformError::UnknownProvider(config.provider.clone()))
        }
    }
}

macro_rules! dispatch {
    ($self:ident, $p:ident => $call:expr) => {
        match $self {
            PlatformProvider::Dummy($p) => $call,
            #[cfg(feature = "provider-gateway")]
            PlatformProvider::Gateway($p) => $call,
        }
    };
}

impl LedgerSdk for PlatformProvider {
    fn resource_client(&mut self, org: &str, user: &str) -> Result<ResourceClient, PlatformError> {
        dispatch!(self, p => p.resource_client(org, user))
    }

    fn signing_identity(&mut self, org: &str, user: &str) -> Result<SigningIdentity, PlatformError> {
        dispatch!(self, p => p.signing_identity(org, user))
    }

    fn save_channel(
        &mut self,
        client: &ResourceClient,
        request: &SaveChannelRequest,
        orderer: &str,
    ) -> Result<TxResponse, PlatformError> {
        dispatch!(self, p => p.save_channel(client, request, orderer))
    }

    fn join_channel(
        &mut self,
        client: &ResourceClient,
        channel_id: &str,
        orderer: &str,
    ) -> Result<(), PlatformError> {
        dispatch!(self, p => p.join_channel(client, channel_id, orderer))
    }

    fn channel_client(
        &mut self,
        channel_id: &str,
        org: &str,
        user: &str,
    ) -> Result<ChannelClient, PlatformError> {
        dispatch!(self, p => p.channel_client(channel_id, org, user))
    }

    fn event_client(
        &mut self,
        channel_id: &str,
        org: &str,
        user: &str,
    ) -> Result<EventClient, PlatformError> {
        dispatch!(self, p => p.event_client(channel_id, org, user))
    }

    fn install_chaincode(
        &mut self,
        client: &ResourceClient,
        request: &InstallRequest,
    ) -> Result<InstallResponse, PlatformError> {
        dispatch!(self, p => p.install_chaincode(client, request))
    }

    fn instantiate_chaincode(
        &mut self,
        client: &ResourceClient,
        channel_id: &str,
        request: &InstantiateRequest,
    ) -> Result<TxResponse, PlatformError> {
        dispatch!(self, p => p.instantiate_chaincode(client, channel_id, request))
    }

    fn close(&mut self) {
        dispatch!(self, p => p.close())
    }
}
