// Genie door API HTTP client
//
// Wraps `reqwest::Client` with URL construction for the per-door action
// endpoints and uniform response handling. Each action performs its own
// login; the client holds no session state between calls.

use secrecy::ExposeSecret;
use serde_json::Value;
use tracing::{debug, info, trace};
use url::Url;

use crate::auth::Credentials;
use crate::error::{Error, preview};
use crate::transport::TransportConfig;

/// Production API root.
pub const DEFAULT_BASE_URL: &str = "https://geniecompany.com/api";

/// Identifies one door on the account: the opener's device index and the
/// garage number behind it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DoorAddress {
    pub device_number: u32,
    pub garage_number: u32,
}

impl Default for DoorAddress {
    fn default() -> Self {
        Self {
            device_number: 0,
            garage_number: 1,
        }
    }
}

/// The four remote verbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoorAction {
    Status,
    Battery,
    Open,
    Close,
}

impl DoorAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::Battery => "battery",
            Self::Open => "open",
            Self::Close => "close",
        }
    }

    fn method(self) -> reqwest::Method {
        match self {
            Self::Status | Self::Battery => reqwest::Method::GET,
            Self::Open | Self::Close => reqwest::Method::POST,
        }
    }
}

impl std::fmt::Display for DoorAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HTTP client for the Genie cloud door API.
///
/// Cheap to clone (the inner `reqwest::Client` is reference counted).
/// Every call returns the raw JSON payload; classifying it is the
/// caller's concern.
#[derive(Debug, Clone)]
pub struct GenieClient {
    http: reqwest::Client,
    base_url: Url,
    log_responses: bool,
}

impl GenieClient {
    /// Create a client from a `TransportConfig`.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, base_url))
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self {
            http,
            base_url,
            log_responses: false,
        }
    }

    /// Log raw response payloads at info level instead of trace.
    pub fn log_responses(mut self, enabled: bool) -> Self {
        self.log_responses = enabled;
        self
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// `{base}/{path}`, tolerating a trailing slash on the base.
    pub(crate) fn endpoint(&self, path: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}/{path}"))?)
    }

    /// `{base}/v1/devices/{device}/garages/{garage}/{action}`
    pub(crate) fn door_url(&self, door: DoorAddress, action: DoorAction) -> Result<Url, Error> {
        self.endpoint(&format!(
            "v1/devices/{}/garages/{}/{}",
            door.device_number, door.garage_number, action
        ))
    }

    // ── Door actions ─────────────────────────────────────────────────

    /// Current door status payload.
    pub async fn status(&self, credentials: &Credentials, door: DoorAddress) -> Result<Value, Error> {
        self.call(credentials, door, DoorAction::Status).await
    }

    /// Battery payload for the door sensor.
    pub async fn battery(
        &self,
        credentials: &Credentials,
        door: DoorAddress,
    ) -> Result<Value, Error> {
        self.call(credentials, door, DoorAction::Battery).await
    }

    /// Request the door to open. Success means "accepted", not "open".
    pub async fn open(&self, credentials: &Credentials, door: DoorAddress) -> Result<Value, Error> {
        self.call(credentials, door, DoorAction::Open).await
    }

    /// Request the door to close. Success means "accepted", not "closed".
    pub async fn close(&self, credentials: &Credentials, door: DoorAddress) -> Result<Value, Error> {
        self.call(credentials, door, DoorAction::Close).await
    }

    /// Log in, then issue a single door action.
    pub async fn call(
        &self,
        credentials: &Credentials,
        door: DoorAddress,
        action: DoorAction,
    ) -> Result<Value, Error> {
        let token = self.login(credentials).await?;
        let url = self.door_url(door, action)?;
        let method = action.method();

        debug!("{} {}", method, url);

        let resp = self
            .http
            .request(method, url)
            .bearer_auth(token.expose_secret())
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .send()
            .await
            .map_err(Error::Transport)?;

        let payload = Self::parse_payload(action, resp).await?;

        if self.log_responses {
            info!(action = %action, response = %payload, "genie response");
        } else {
            trace!(action = %action, response = %payload, "genie response");
        }

        Ok(payload)
    }

    /// Map status codes to errors and decode the body.
    ///
    /// An empty body is a `null` payload (open/close often return nothing);
    /// a non-empty body that is not JSON is a deserialization error.
    async fn parse_payload(action: DoorAction, resp: reqwest::Response) -> Result<Value, Error> {
        let status = resp.status();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::Authentication {
                message: format!("{action} rejected (HTTP 401)"),
            });
        }

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Api {
                action: action.as_str(),
                status: status.as_u16(),
                message: preview(&body),
            });
        }

        let body = resp.text().await.map_err(Error::Transport)?;
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: format!("{action} response: {e} (body preview: {:?})", preview(&body)),
            body,
        })
    }
}
