//! Network bootstrap sequencer.
//!
//! A [`Session`] walks the fixed bootstrap sequence against a [`LedgerSdk`]:
//!
//! 1. `initialize`: read the connection profile and build the SDK
//! 2. `admin_setup`: resource-management client and admin signing identity
//! 3. `channel_setup`: create the channel, then join the org's peers to it
//! 4. `client_setup`: channel and event clients for the application user
//! 5. `chaincode_install_instantiate`: package, install and instantiate each
//!    configured chaincode with its collection configs
//!
//! Each step is accepted only from the phase the previous step leaves behind;
//! a failed step leaves the phase where it was. [`setup`] runs the whole
//! sequence and releases the SDK on every exit path.

mod phase;
mod report;

pub use phase::Phase;
pub use report::{BootstrapReport, DeployedChaincode};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::collections::{CollectionError, load_collections};
use crate::core::config::{ChaincodeConfig, ChaincodeSpec, Config, NetworkConfig};
use crate::core::error::AppError;
use crate::platform::package::package_golang;
use crate::platform::profile::ConnectionProfile;
use crate::platform::providers;
use crate::platform::{
    ChannelClient, EventClient, InstallRequest, InstantiateRequest, LedgerSdk, PlatformError,
    ResourceClient, SaveChannelRequest, SigningIdentity, require_channel_id,
};
use crate::policy::{PolicyError, SignaturePolicyEnvelope, signed_by_any_member};

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("sdk is already initialized")]
    AlreadyInitialized,

    #[error("sdk is not initialized")]
    NotInitialized,

    #[error("sdk is closed")]
    Closed,

    #[error("{operation} needs phase '{expected}' but the session is '{actual}'")]
    OutOfOrder {
        operation: &'static str,
        expected: Phase,
        actual: Phase,
    },

    #[error("{context}: {source}")]
    Platform {
        context: &'static str,
        #[source]
        source: PlatformError,
    },

    /// The platform accepted the call but returned no transaction id.
    #[error("{context}: response carries no transaction id")]
    MissingTransactionId { context: &'static str },

    #[error("{context}: {source}")]
    Collections {
        context: &'static str,
        #[source]
        source: CollectionError,
    },

    #[error("invalid endorsement policy: {0}")]
    Policy(#[from] PolicyError),

    #[error("chaincode '{name}': {source}")]
    Chaincode {
        name: String,
        #[source]
        source: Box<SessionError>,
    },
}

fn platform(context: &'static str) -> impl FnOnce(PlatformError) -> SessionError {
    move |source| SessionError::Platform { context, source }
}

fn require_tx_id(tx_id: &str, context: &'static str) -> Result<(), SessionError> {
    if tx_id.is_empty() {
        Err(SessionError::MissingTransactionId { context })
    } else {
        Ok(())
    }
}

// ── Settings ──────────────────────────────────────────────────────────────────

/// Everything a session needs from configuration.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub network: NetworkConfig,
    pub chaincode: ChaincodeConfig,
}

impl SessionSettings {
    pub fn from_config(config: &Config) -> Self {
        Self { network: config.network.clone(), chaincode: config.chaincode.clone() }
    }
}

// ── Session ───────────────────────────────────────────────────────────────────

/// One bootstrap run. Owns the SDK handle and closes it on [`close`](Self::close)
/// or drop.
#[derive(Debug)]
pub struct Session<S: LedgerSdk> {
    settings: SessionSettings,
    phase: Phase,
    sdk: Option<S>,
    resource_client: Option<ResourceClient>,
    admin_identity: Option<SigningIdentity>,
    channel_client: Option<ChannelClient>,
    event_client: Option<EventClient>,
    report: BootstrapReport,
}

impl<S: LedgerSdk> Session<S> {
    pub fn new(settings: SessionSettings) -> Self {
        Self {
            settings,
            phase: Phase::Uninitialized,
            sdk: None,
            resource_client: None,
            admin_identity: None,
            channel_client: None,
            event_client: None,
            report: BootstrapReport::default(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// The SDK handle, once initialized. Kept after close.
    pub fn sdk(&self) -> Option<&S> {
        self.sdk.as_ref()
    }

    pub fn channel_client(&self) -> Option<&ChannelClient> {
        self.channel_client.as_ref()
    }

    pub fn event_client(&self) -> Option<&EventClient> {
        self.event_client.as_ref()
    }

    pub fn report(&self) -> &BootstrapReport {
        &self.report
    }

    fn expect_phase(&self, operation: &'static str, expected: Phase) -> Result<(), SessionError> {
        match self.phase {
            actual if actual == expected => Ok(()),
            Phase::Uninitialized => Err(SessionError::NotInitialized),
            Phase::Closed => Err(SessionError::Closed),
            actual => Err(SessionError::OutOfOrder { operation, expected, actual }),
        }
    }

    /// Read the connection profile and build the SDK with `connect`.
    ///
    /// A session initializes at most once, even after it has been closed.
    pub fn initialize<F>(&mut self, connect: F) -> Result<(), SessionError>
    where
        F: FnOnce(ConnectionProfile) -> Result<S, PlatformError>,
    {
        if self.phase != Phase::Uninitialized {
            return Err(SessionError::AlreadyInitialized);
        }
        let profile_path = &self.settings.network.connection_profile;
        let profile = ConnectionProfile::from_file(profile_path).map_err(platform("failed to create SDK"))?;
        debug!(profile = %profile_path.display(), network = %profile.name, "connection profile loaded");

        let sdk = connect(profile).map_err(platform("failed to create SDK"))?;
        self.sdk = Some(sdk);
        self.phase = Phase::Initialized;
        info!("sdk initialized");
        Ok(())
    }

    pub fn admin_setup(&mut self) -> Result<(), SessionError> {
        self.expect_phase("admin setup", Phase::Initialized)?;
        let net = &self.settings.network;
        let sdk = self.sdk.as_mut().ok_or(SessionError::NotInitialized)?;

        let rc = sdk
            .resource_client(&net.org_name, &net.org_admin)
            .map_err(platform("failed to create channel management client from admin identity"))?;
        info!(org = %rc.org, msp_id = %rc.msp_id, "resource management client created");

        let identity = sdk
            .signing_identity(&net.org_name, &net.org_admin)
            .map_err(platform("failed to get admin signing identity"))?;
        debug!(user = %identity.user, fingerprint = %identity.certificate_fingerprint, "admin signing identity ready");

        self.resource_client = Some(rc);
        self.admin_identity = Some(identity);
        self.phase = Phase::AdminReady;
        Ok(())
    }

    pub fn channel_setup(&mut self) -> Result<(), SessionError> {
        self.expect_phase("channel setup", Phase::AdminReady)?;
        let net = &self.settings.network;
        let sdk = self.sdk.as_mut().ok_or(SessionError::NotInitialized)?;
        let (Some(rc), Some(identity)) = (&self.resource_client, &self.admin_identity) else {
            return Err(SessionError::NotInitialized);
        };
        require_channel_id(&net.channel_id).map_err(platform("failed to save channel"))?;

        let request = SaveChannelRequest {
            channel_id: net.channel_id.clone(),
            channel_config_path: net.channel_config.clone(),
            signing_identities: vec![identity.clone()],
        };
        let resp = sdk
            .save_channel(rc, &request, &net.orderer_id)
            .map_err(platform("failed to save channel"))?;
        require_tx_id(&resp.transaction_id, "failed to save channel")?;
        info!(channel = %net.channel_id, tx_id = %resp.transaction_id, "channel created");

        sdk.join_channel(rc, &net.channel_id, &net.orderer_id)
            .map_err(platform("failed to make admin join channel"))?;
        info!(channel = %net.channel_id, "channel joined");

        self.report.channel_id = net.channel_id.clone();
        self.report.channel_tx_id = resp.transaction_id;
        self.phase = Phase::ChannelReady;
        Ok(())
    }

    pub fn client_setup(&mut self) -> Result<(), SessionError> {
        self.expect_phase("client setup", Phase::ChannelReady)?;
        let net = &self.settings.network;
        let sdk = self.sdk.as_mut().ok_or(SessionError::NotInitialized)?;

        let channel_client = sdk
            .channel_client(&net.channel_id, &net.org_name, &net.user_name)
            .map_err(platform("failed to create new channel client"))?;
        info!(user = %net.user_name, "channel client created");

        let event_client = sdk
            .event_client(&net.channel_id, &net.org_name, &net.user_name)
            .map_err(platform("failed to create new event client"))?;
        info!(user = %net.user_name, "event client created");

        self.channel_client = Some(channel_client);
        self.event_client = Some(event_client);
        self.phase = Phase::ClientReady;
        Ok(())
    }

    /// Package, install and instantiate every configured chaincode in order.
    /// The first failure stops the run; chaincodes deployed before it stay
    /// deployed and listed in the report.
    pub fn chaincode_install_instantiate(&mut self) -> Result<(), SessionError> {
        self.expect_phase("chaincode install/instantiate", Phase::ClientReady)?;
        let net = &self.settings.network;
        let cc = &self.settings.chaincode;
        let sdk = self.sdk.as_mut().ok_or(SessionError::NotInitialized)?;
        let rc = self.resource_client.as_ref().ok_or(SessionError::NotInitialized)?;

        let policy = endorsement_policy(cc, &rc.msp_id)?;
        debug!(policy = %policy, "endorsement policy");
        if cc.packages.is_empty() {
            warn!("no chaincode packages configured");
        }

        self.report.chaincodes.clear();
        for spec in &cc.packages {
            let d = deploy(sdk, rc, net, cc, spec, &policy).map_err(|e| SessionError::Chaincode {
                name: spec.name.clone(),
                source: Box::new(e),
            })?;
            self.report.chaincodes.push(d);
        }

        self.phase = Phase::ChaincodeReady;
        Ok(())
    }

    /// Release the SDK. Safe to call repeatedly once initialized.
    pub fn close(&mut self) -> Result<(), SessionError> {
        match self.phase {
            Phase::Uninitialized => Err(SessionError::NotInitialized),
            Phase::Closed => Ok(()),
            _ => {
                if let Some(sdk) = self.sdk.as_mut() {
                    sdk.close();
                }
                self.channel_client = None;
                self.event_client = None;
                self.phase = Phase::Closed;
                info!("sdk closed");
                Ok(())
            }
        }
    }
}

impl<S: LedgerSdk> Drop for Session<S> {
    fn drop(&mut self) {
        if !matches!(self.phase, Phase::Uninitialized | Phase::Closed) {
            let _ = self.close();
        }
    }
}

/// The configured expression if any, else any member of `endorsement_msps`,
/// else any member of the bootstrapping org.
fn endorsement_policy(cc: &ChaincodeConfig, org_msp: &str) -> Result<SignaturePolicyEnvelope, SessionError> {
    match &cc.endorsement_policy {
        Some(expr) => Ok(SignaturePolicyEnvelope::from_expression(expr)?),
        None if cc.endorsement_msps.is_empty() => Ok(signed_by_any_member(&[org_msp])),
        None => Ok(signed_by_any_member(&cc.endorsement_msps)),
    }
}

fn deploy<S: LedgerSdk>(
    sdk: &mut S,
    rc: &ResourceClient,
    net: &NetworkConfig,
    cc: &ChaincodeConfig,
    spec: &ChaincodeSpec,
    policy: &SignaturePolicyEnvelope,
) -> Result<DeployedChaincode, SessionError> {
    let package = package_golang(&spec.path, &cc.gopath).map_err(platform("failed to create chaincode package"))?;
    info!(name = %spec.name, files = package.entries.len(), hash = %package.code_hash, "chaincode package created");
    let package_hash = package.code_hash.clone();

    let install = InstallRequest {
        name: spec.name.clone(),
        path: spec.path.clone(),
        version: cc.version.clone(),
        package,
    };
    let installed = sdk
        .install_chaincode(rc, &install)
        .map_err(platform("failed to install chaincode"))?;
    require_tx_id(&installed.transaction_id, "failed to install chaincode")?;
    if let Some(t) = installed.targets.iter().find(|t| !(200..300).contains(&t.status)) {
        return Err(SessionError::Platform {
            context: "failed to install chaincode",
            source: PlatformError::Rejected(format!(
                "peer '{}' answered {}: {}",
                t.target, t.status, t.info
            )),
        });
    }
    info!(name = %spec.name, version = %cc.version, peers = installed.targets.len(), "chaincode installed");

    let collections_dir = spec.collections_dir(&cc.gopath);
    let collections = load_collections(&collections_dir).map_err(|source| SessionError::Collections {
        context: "failed to read collections config information",
        source,
    })?;
    let collection_names: Vec<String> = collections.iter().map(|c| c.name().to_string()).collect();
    debug!(name = %spec.name, collections = ?collection_names, "collections loaded");

    let instantiate = InstantiateRequest {
        name: spec.name.clone(),
        path: spec.path.clone(),
        version: cc.version.clone(),
        args: cc.init_args.iter().map(|a| a.as_bytes().to_vec()).collect(),
        policy: policy.clone(),
        collections,
    };
    let resp = sdk
        .instantiate_chaincode(rc, &net.channel_id, &instantiate)
        .map_err(platform("failed to instantiate the chaincode"))?;
    require_tx_id(&resp.transaction_id, "failed to instantiate the chaincode")?;
    info!(name = %spec.name, channel = %net.channel_id, tx_id = %resp.transaction_id, "chaincode instantiated");

    Ok(DeployedChaincode {
        name: spec.name.clone(),
        version: cc.version.clone(),
        package_hash,
        install_tx_id: installed.transaction_id,
        install_targets: installed.targets.into_iter().map(|t| t.target).collect(),
        instantiate_tx_id: resp.transaction_id,
        collections: collection_names,
    })
}

// ── Top-level entry points ────────────────────────────────────────────────────

/// Run the whole bootstrap with the provider named in `config`.
pub fn setup(config: &Config) -> Result<BootstrapReport, AppError> {
    let platform_config = config.platform.clone();
    let token = config.gateway_token.clone();
    setup_with(SessionSettings::from_config(config), move |profile| {
        providers::build(&platform_config, profile, token)
    })
}

/// Run the whole bootstrap against the SDK built by `connect`. Each failure is
/// tagged with the phase it happened in. The SDK is closed on every path once
/// it exists.
pub fn setup_with<S, F>(settings: SessionSettings, connect: F) -> Result<BootstrapReport, AppError>
where
    S: LedgerSdk,
    F: FnOnce(ConnectionProfile) -> Result<S, PlatformError>,
{
    let mut session = Session::new(settings);
    session
        .initialize(connect)
        .map_err(|e| AppError::setup("unable to initialize the SDK", e))?;

    session.admin_setup().map_err(|e| AppError::setup("failed to set up admin", e))?;
    session.channel_setup().map_err(|e| AppError::setup("failed to set up channel", e))?;
    session.client_setup().map_err(|e| AppError::setup("failed to set up client", e))?;
    session
        .chaincode_install_instantiate()
        .map_err(|e| AppError::setup("failed to set up chaincodes", e))?;

    let report = session.report().clone();
    session.close().map_err(|e| AppError::setup("failed to close the SDK", e))?;
    Ok(report)
}
