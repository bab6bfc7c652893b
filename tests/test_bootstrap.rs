//! End-to-end bootstrap runs against the shipped config and a recording SDK.

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use ledger_boot::config::{self, Config};
use ledger_boot::error::AppError;
use ledger_boot::platform::profile::ConnectionProfile;
use ledger_boot::platform::retry::RetryPolicy;
use ledger_boot::platform::{
    ChannelClient, EventClient, InstallRequest, InstallResponse, InstantiateRequest, LedgerSdk,
    PeerInstall, PlatformError, ResourceClient, SaveChannelRequest, SigningIdentity, TxResponse,
};
use ledger_boot::sequencer::{Phase, Session, SessionError, SessionSettings, setup, setup_with};

fn shipped_config() -> Config {
    let mut cfg = config::load_from(Path::new(config::DEFAULT_CONFIG_PATH), None, None).unwrap();
    cfg.platform.retry = RetryPolicy::none();
    cfg
}

// ── Recording SDK ─────────────────────────────────────────────────────────────

type CallLog = Rc<RefCell<Vec<String>>>;

/// Answers every call successfully and records its name.
struct RecordingSdk {
    log: CallLog,
    empty_save_channel_tx: bool,
}

impl RecordingSdk {
    fn record(&self, call: &str) {
        self.log.borrow_mut().push(call.to_string());
    }
}

impl LedgerSdk for RecordingSdk {
    fn resource_client(&mut self, org: &str, user: &str) -> Result<ResourceClient, PlatformError> {
        self.record("resource_client");
        Ok(ResourceClient { org: org.into(), user: user.into(), msp_id: "Org1MSP".into() })
    }

    fn signing_identity(&mut self, _org: &str, user: &str) -> Result<SigningIdentity, PlatformError> {
        self.record("signing_identity");
        Ok(SigningIdentity {
            msp_id: "Org1MSP".into(),
            user: user.into(),
            certificate_fingerprint: "ff".into(),
        })
    }

    fn save_channel(
        &mut self,
        _client: &ResourceClient,
        _request: &SaveChannelRequest,
        _orderer: &str,
    ) -> Result<TxResponse, PlatformError> {
        self.record("save_channel");
        let transaction_id = if self.empty_save_channel_tx { String::new() } else { "tx-channel".into() };
        Ok(TxResponse { transaction_id })
    }

    fn join_channel(&mut self, _: &ResourceClient, _: &str, _: &str) -> Result<(), PlatformError> {
        self.record("join_channel");
        Ok(())
    }

    fn channel_client(&mut self, channel_id: &str, org: &str, user: &str) -> Result<ChannelClient, PlatformError> {
        self.record("channel_client");
        Ok(ChannelClient { channel_id: channel_id.into(), org: org.into(), user: user.into() })
    }

    fn event_client(&mut self, channel_id: &str, _org: &str, user: &str) -> Result<EventClient, PlatformError> {
        self.record("event_client");
        Ok(EventClient { channel_id: channel_id.into(), user: user.into() })
    }

    fn install_chaincode(
        &mut self,
        _client: &ResourceClient,
        request: &InstallRequest,
    ) -> Result<InstallResponse, PlatformError> {
        self.record(&format!("install_chaincode:{}", request.name));
        Ok(InstallResponse {
            transaction_id: "tx-install".into(),
            targets: vec![PeerInstall { target: "peer0.org1.example.com".into(), status: 200, info: String::new() }],
        })
    }

    fn instantiate_chaincode(
        &mut self,
        _client: &ResourceClient,
        _channel_id: &str,
        request: &InstantiateRequest,
    ) -> Result<TxResponse, PlatformError> {
        self.record(&format!("instantiate_chaincode:{}:{}", request.name, request.policy));
        Ok(TxResponse { transaction_id: "tx-instantiate".into() })
    }

    fn close(&mut self) {
        self.record("close");
    }
}

fn recording(
    log: &CallLog,
    empty_save_channel_tx: bool,
) -> impl FnOnce(ConnectionProfile) -> Result<RecordingSdk, PlatformError> {
    let log = Rc::clone(log);
    move |_profile| Ok(RecordingSdk { log, empty_save_channel_tx })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[test]
fn dry_run_with_shipped_config() {
    let report = setup(&shipped_config()).unwrap();
    assert_eq!(report.channel_id, "mychannel");
    assert_eq!(report.chaincodes.len(), 1);
    let vote = &report.chaincodes[0];
    assert_eq!(vote.name, "vote");
    assert_eq!(vote.collections, vec!["collectionVotes", "collectionVotesPrivateDetails"]);
    assert_eq!(vote.install_targets.len(), 2);
}

#[test]
fn calls_follow_the_fixed_sequence() {
    let log = CallLog::default();
    let settings = SessionSettings::from_config(&shipped_config());
    setup_with(settings, recording(&log, false)).unwrap();
    assert_eq!(
        *log.borrow(),
        vec![
            "resource_client",
            "signing_identity",
            "save_channel",
            "join_channel",
            "channel_client",
            "event_client",
            "install_chaincode:vote",
            "instantiate_chaincode:vote:OR('Org1MSP.member')",
            "close",
        ]
    );
}

#[test]
fn empty_channel_tx_id_skips_client_setup_and_closes() {
    let log = CallLog::default();
    let settings = SessionSettings::from_config(&shipped_config());
    let err = setup_with(settings, recording(&log, true)).unwrap_err();

    match &err {
        AppError::Setup { stage, source } => {
            assert_eq!(*stage, "failed to set up channel");
            assert!(matches!(source, SessionError::MissingTransactionId { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
    let calls = log.borrow();
    assert!(!calls.iter().any(|c| c == "join_channel" || c == "channel_client"));
    assert_eq!(calls.iter().filter(|c| *c == "close").count(), 1);
    assert_eq!(calls.last().map(String::as_str), Some("close"));
}

#[test]
fn dropping_an_open_session_closes_the_sdk_once() {
    let log = CallLog::default();
    {
        let mut session = Session::new(SessionSettings::from_config(&shipped_config()));
        session.initialize(recording(&log, false)).unwrap();
        session.admin_setup().unwrap();
        assert_eq!(session.phase(), Phase::AdminReady);
    }
    assert_eq!(log.borrow().iter().filter(|c| *c == "close").count(), 1);
}

#[test]
fn explicit_close_is_not_repeated_on_drop() {
    let log = CallLog::default();
    {
        let mut session = Session::new(SessionSettings::from_config(&shipped_config()));
        session.initialize(recording(&log, false)).unwrap();
        session.close().unwrap();
        session.close().unwrap();
    }
    assert_eq!(*log.borrow(), vec!["close"]);
}

#[test]
fn uninitialized_session_never_touches_the_sdk() {
    let mut session: Session<RecordingSdk> = Session::new(SessionSettings::from_config(&shipped_config()));
    assert!(matches!(session.close(), Err(SessionError::NotInitialized)));
    assert!(session.sdk().is_none());
}
