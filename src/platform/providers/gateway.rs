//! Ledger REST gateway provider.
//!
//! Speaks JSON over HTTP to a gateway that fronts the platform's native
//! client SDK. All wire types are private to this module. Client handles
//! (resource, channel, event) are derived locally from the connection
//! profile; only signing, channel and chaincode calls hit the network.

use std::fs;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, trace};

use crate::collections::CollectionConfig;
use crate::platform::package::ChaincodePackage;
use crate::platform::profile::ConnectionProfile;
use crate::platform::retry::{self, RetryPolicy};
use crate::platform::{
    ChannelClient, EventClient, InstallRequest, InstallResponse, InstantiateRequest, LedgerSdk,
    PeerInstall, PlatformError, ResourceClient, SaveChannelRequest, SigningIdentity, TxResponse,
    require_channel_id,
};
use crate::policy::SignaturePolicyEnvelope;

// ── Public provider ───────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct GatewayPlatform {
    client: Client,
    base_url: String,
    token: Option<String>,
    profile: ConnectionProfile,
    retry: RetryPolicy,
    closed: bool,
}

impl GatewayPlatform {
    /// `base_url` has no trailing slash. `token`, when present, is sent as
    /// `Authorization: Bearer <token>` on every request.
    pub fn new(
        base_url: String,
        timeout_seconds: u64,
        token: Option<String>,
        profile: ConnectionProfile,
        retry: RetryPolicy,
    ) -> Result<Self, PlatformError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|e| PlatformError::Request(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, base_url, token, profile, retry, closed: false })
    }

    fn ensure_open(&self) -> Result<(), PlatformError> {
        if self.closed { Err(PlatformError::Closed) } else { Ok(()) }
    }

    fn org_peers(&self, org: &str) -> Result<Vec<String>, PlatformError> {
        Ok(self.profile.require_org(org)?.1.peers.clone())
    }

    fn post<B: Serialize, R: DeserializeOwned>(&self, path: &str, body: &B) -> Result<R, PlatformError> {
        let url = format!("{}{path}", self.base_url);
        debug!(%url, "gateway request");
        if tracing::enabled!(tracing::Level::TRACE) {
            let json = serde_json::to_string_pretty(body)
                .unwrap_or_else(|e| format!("<serialization failed: {e}>"));
            trace!(payload = %json, "full gateway request payload");
        }

        let mut req = self.client.post(&url).json(body);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        let response = req.send().map_err(|e| {
            error!(%url, error = %e, "gateway request failed (transport)");
            PlatformError::Transient(e.to_string())
        })?;
        let response = check_status(response)?;
        response
            .json::<R>()
            .map_err(|e| PlatformError::Request(format!("failed to parse response body: {e}")))
    }
}

impl LedgerSdk for GatewayPlatform {
    fn resource_client(&mut self, org: &str, user: &str) -> Result<ResourceClient, PlatformError> {
        self.ensure_open()?;
        let msp_id = self.profile.require_user(org, user)?.to_string();
        let (org_name, _) = self.profile.require_org(org)?;
        Ok(ResourceClient { org: org_name.to_string(), user: user.to_string(), msp_id })
    }

    fn signing_identity(&mut self, org: &str, user: &str) -> Result<SigningIdentity, PlatformError> {
        self.ensure_open()?;
        let msp_id = self.profile.require_user(org, user)?.to_string();
        let body = SigningIdentityBody { msp_id: &msp_id, user };
        let resp: SigningIdentityReply = self.post("/identities/signing", &body)?;
        Ok(SigningIdentity {
            msp_id,
            user: user.to_string(),
            certificate_fingerprint: resp.certificate_fingerprint,
        })
    }

    fn save_channel(
        &mut self,
        client: &ResourceClient,
        request: &SaveChannelRequest,
        orderer: &str,
    ) -> Result<TxResponse, PlatformError> {
        self.ensure_open()?;
        require_channel_id(&request.channel_id)?;
        let envelope = fs::read(&request.channel_config_path).map_err(|e| {
            PlatformError::Request(format!(
                "cannot read channel config {}: {e}",
                request.channel_config_path.display()
            ))
        })?;
        let body = SaveChannelBody {
            submitter: Submitter::of(client),
            channel_id: &request.channel_id,
            orderer,
            channel_config: BASE64.encode(envelope),
            signatures: request
                .signing_identities
                .iter()
                .map(|s| SignatureRef {
                    msp_id: &s.msp_id,
                    user: &s.user,
                    certificate_fingerprint: &s.certificate_fingerprint,
                })
                .collect(),
        };
        let resp: TxReply = self.post("/channels", &body)?;
        Ok(TxResponse { transaction_id: resp.transaction_id })
    }

    fn join_channel(
        &mut self,
        client: &ResourceClient,
        channel_id: &str,
        orderer: &str,
    ) -> Result<(), PlatformError> {
        self.ensure_open()?;
        // The id is spliced into the request path.
        require_channel_id(channel_id)?;
        let peers = self.org_peers(&client.org)?;
        let body = JoinBody { submitter: Submitter::of(client), orderer, peers: &peers };
        let path = format!("/channels/{channel_id}/join");
        retry::run(&self.retry, "join channel", || {
            self.post::<_, serde_json::Value>(&path, &body).map(|_| ())
        })
    }

    fn channel_client(
        &mut self,
        channel_id: &str,
        org: &str,
        user: &str,
    ) -> Result<ChannelClient, PlatformError> {
        self.ensure_open()?;
        self.profile.require_user(org, user)?;
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
        Ok(EventClient { channel_id: channel_id.into(), user: user.into() })
    }

    fn install_chaincode(
        &mut self,
        client: &ResourceClient,
        request: &InstallRequest,
    ) -> Result<InstallResponse, PlatformError> {
        self.ensure_open()?;
        let peers = self.org_peers(&client.org)?;
        let body = InstallBody {
            submitter: Submitter::of(client),
            name: &request.name,
            path: &request.path,
            version: &request.version,
            targets: &peers,
            package: &request.package,
        };
        let resp: InstallReply = retry::run(&self.retry, "install chaincode", || {
            self.post("/chaincodes/install", &body)
        })?;
        Ok(InstallResponse {
            transaction_id: resp.transaction_id,
            targets: resp
                .targets
                .into_iter()
                .map(|t| PeerInstall { target: t.target, status: t.status, info: t.info })
                .collect(),
        })
    }

    fn instantiate_chaincode(
        &mut self,
        client: &ResourceClient,
        channel_id: &str,
        request: &InstantiateRequest,
    ) -> Result<TxResponse, PlatformError> {
        self.ensure_open()?;
        require_channel_id(channel_id)?;
        let body = InstantiateBody {
            submitter: Submitter::of(client),
            name: &request.name,
            path: &request.path,
            version: &request.version,
            args: request.args.iter().map(|a| BASE64.encode(a)).collect(),
            policy: &request.policy,
            policy_expression: request.policy.to_string(),
            collections: &request.collections,
        };
        let path = format!("/channels/{channel_id}/chaincodes/instantiate");
        let resp: TxReply = retry::run(&self.retry, "instantiate chaincode", || self.post(&path, &body))?;
        Ok(TxResponse { transaction_id: resp.transaction_id })
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

// ── Private wire types ────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct Submitter<'a> {
    org: &'a str,
    user: &'a str,
    msp_id: &'a str,
}

impl<'a> Submitter<'a> {
    fn of(client: &'a ResourceClient) -> Self {
        Self { org: &client.org, user: &client.user, msp_id: &client.msp_id }
    }
}

#[derive(Debug, Serialize)]
struct SigningIdentityBody<'a> {
    msp_id: &'a str,
    user: &'a str,
}

#[derive(Debug, Deserialize)]
struct SigningIdentityReply {
    certificate_fingerprint: String,
}

#[derive(Debug, Serialize)]
struct SignatureRef<'a> {
    msp_id: &'a str,
    user: &'a str,
    certificate_fingerprint: &'a str,
}

#[derive(Debug, Serialize)]
struct SaveChannelBody<'a> {
    submitter: Submitter<'a>,
    channel_id: &'a str,
    orderer: &'a str,
    /// Base64 channel creation transaction.
    channel_config: String,
    signatures: Vec<SignatureRef<'a>>,
}

#[derive(Debug, Serialize)]
struct JoinBody<'a> {
    submitter: Submitter<'a>,
    orderer: &'a str,
    peers: &'a [String],
}

#[derive(Debug, Serialize)]
struct InstallBody<'a> {
    submitter: Submitter<'a>,
    name: &'a str,
    path: &'a str,
    version: &'a str,
    targets: &'a [String],
    package: &'a ChaincodePackage,
}

#[derive(Debug, Serialize)]
struct InstantiateBody<'a> {
    submitter: Submitter<'a>,
    name: &'a str,
    path: &'a str,
    version: &'a str,
    /// Base64, one per init argument.
    args: Vec<String>,
    policy: &'a SignaturePolicyEnvelope,
    policy_expression: String,
    collections: &'a [CollectionConfig],
}

#[derive(Debug, Deserialize)]
struct TxReply {
    #[serde(default)]
    transaction_id: String,
}

#[derive(Debug, Deserialize)]
struct InstallReply {
    #[serde(default)]
    transaction_id: String,
    #[serde(default)]
    targets: Vec<InstallTarget>,
}

#[derive(Debug, Deserialize)]
struct InstallTarget {
    target: String,
    status: i32,
    #[serde(default)]
    info: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(default)]
    code: Option<serde_json::Value>,
}

/// Return the response if successful, otherwise a classified error.
fn check_status(response: Response) -> Result<Response, PlatformError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .unwrap_or_else(|_| "<failed to read error body>".to_string());
    let err = status_error(status, &body);
    error!(%status, error = %err, "gateway returned an error");
    Err(err)
}

/// 5xx and 429 are transient; any other failure status is a rejection.
fn status_error(status: StatusCode, body: &str) -> PlatformError {
    let message = if let Ok(env) = serde_json::from_str::<ErrorEnvelope>(body) {
        let code = env
            .error
            .code
            .map(|v| match v {
                serde_json::Value::String(s) => format!(" [code={s}]"),
                other => format!(" [code={other}]"),
            })
            .unwrap_or_default();
        format!("HTTP {status}{code}: {}", env.error.message)
    } else {
        format!("HTTP {status}: {body}")
    };

    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        PlatformError::Transient(message)
    } else {
        PlatformError::Rejected(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::fixtures;

    fn unreachable() -> GatewayPlatform {
        // Port 1 is never served in the test environment.
        GatewayPlatform::new(
            "http://127.0.0.1:1/v1".into(),
            2,
            Some("secret".into()),
            fixtures::profile(),
            RetryPolicy::none(),
        )
        .unwrap()
    }

    #[test]
    fn server_errors_are_transient() {
        let err = status_error(StatusCode::SERVICE_UNAVAILABLE, "down");
        assert!(err.is_transient());
        assert!(err.to_string().contains("503"));
        assert!(status_error(StatusCode::TOO_MANY_REQUESTS, "").is_transient());
    }

    #[test]
    fn client_errors_are_rejections_with_envelope_message() {
        let body = r#"{"error":{"message":"channel exists","code":"CHANNEL_EXISTS"}}"#;
        let err = status_error(StatusCode::CONFLICT, body);
        assert!(matches!(err, PlatformError::Rejected(_)));
        let msg = err.to_string();
        assert!(msg.contains("[code=CHANNEL_EXISTS]"));
        assert!(msg.contains("channel exists"));
    }

    #[test]
    fn client_handles_are_derived_locally() {
        let mut gw = unreachable();
        let rc = gw.resource_client("org1", "Admin").unwrap();
        assert_eq!(rc.msp_id, "Org1MSP");
        assert!(gw.channel_client("mychannel", "org1", "User1").is_ok());
        assert!(gw.event_client("mychannel", "org1", "Mallory").is_err());
    }

    #[test]
    fn transport_failure_is_transient_and_retried_out() {
        let mut gw = unreachable();
        let rc = gw.resource_client("org1", "Admin").unwrap();
        let err = gw.join_channel(&rc, "mychannel", "orderer.example.com").unwrap_err();
        assert!(matches!(err, PlatformError::RetriesExhausted { attempts: 1, .. }));
    }

    #[test]
    fn malformed_channel_ids_are_rejected_before_any_request() {
        let mut gw = unreachable();
        let rc = gw.resource_client("org1", "Admin").unwrap();

        let err = gw.join_channel(&rc, "bad/id?x", "orderer.example.com").unwrap_err();
        assert!(matches!(err, PlatformError::Rejected(ref m) if m.contains("invalid channel id")));

        let policy = SignaturePolicyEnvelope::from_expression("OR('Org1MSP.member')").unwrap();
        let request = InstantiateRequest {
            name: "vote".into(),
            path: "vote/chaincode".into(),
            version: "0".into(),
            args: Vec::new(),
            policy,
            collections: Vec::new(),
        };
        let err = gw.instantiate_chaincode(&rc, "../admin", &request).unwrap_err();
        assert!(matches!(err, PlatformError::Rejected(_)));

        let save = SaveChannelRequest {
            channel_id: "My Channel".into(),
            channel_config_path: "/nonexistent/channel.tx".into(),
            signing_identities: Vec::new(),
        };
        assert!(matches!(gw.save_channel(&rc, &save, "orderer.example.com"), Err(PlatformError::Rejected(_))));
    }

    #[test]
    fn closed_gateway_refuses_calls() {
        let mut gw = unreachable();
        gw.close();
        assert!(matches!(gw.resource_client("org1", "Admin"), Err(PlatformError::Closed)));
    }

    #[test]
    fn instantiate_body_carries_policy_expression() {
        let client = ResourceClient { org: "org1".into(), user: "Admin".into(), msp_id: "Org1MSP".into() };
        let policy = SignaturePolicyEnvelope::from_expression("OR('Org1MSP.member')").unwrap();
        let body = InstantiateBody {
            submitter: Submitter::of(&client),
            name: "vote",
            path: "vote/chaincode",
            version: "0",
            args: vec![BASE64.encode(b"init")],
            policy: &policy,
            policy_expression: policy.to_string(),
            collections: &[],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["policy_expression"], "OR('Org1MSP.member')");
        assert_eq!(json["args"][0], "aW5pdA==");
        assert_eq!(json["submitter"]["msp_id"], "Org1MSP");
    }
}
