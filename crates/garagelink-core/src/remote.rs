// ── Remote door seam ──
//
// The engine talks to the cloud only through `RemoteDoor`. The production
// implementation binds a `GenieClient` to one account and one door; tests
// substitute a scripted fake.

use std::future::Future;

use secrecy::ExposeSecret;
use serde_json::Value;
use tracing::debug;

use garagelink_api::{Credentials, DoorAction, GenieClient};

use crate::config::DoorConfig;
use crate::error::{CoreError, RemoteError};
use crate::normalize::battery_percent;

/// The four remote verbs for a single door.
///
/// Implementations must not retry and must not hang forever: every
/// returned future has to resolve (transport timeouts are the usual
/// guarantee).
///
/// The engine keeps at most one call of each kind outstanding, but calls of
/// different kinds may overlap: an `open`/`close` can start while a
/// `get_status` from before the command is still in flight, and a battery
/// check runs independently of both. Implementations must tolerate that.
pub trait RemoteDoor: Send + Sync + 'static {
    /// Raw status payload, classified by the caller.
    fn get_status(&self) -> impl Future<Output = Result<Value, RemoteError>> + Send;

    /// Request the door to open. Success means the request was accepted.
    fn open(&self) -> impl Future<Output = Result<Value, RemoteError>> + Send;

    /// Request the door to close. Success means the request was accepted.
    fn close(&self) -> impl Future<Output = Result<Value, RemoteError>> + Send;

    /// Battery percentage, or `None` when the payload has no usable number.
    fn get_battery(&self) -> impl Future<Output = Result<Option<u8>, RemoteError>> + Send;
}

/// [`RemoteDoor`] backed by the Genie cloud API.
#[derive(Debug, Clone)]
pub struct GenieDoor {
    client: GenieClient,
    credentials: Credentials,
    door: DoorConfig,
}

impl GenieDoor {
    /// Bind a client to an account and a door.
    ///
    /// Fails fast when the credentials are blank.
    pub fn new(
        client: GenieClient,
        credentials: Credentials,
        door: DoorConfig,
    ) -> Result<Self, CoreError> {
        if credentials.username.trim().is_empty()
            || credentials.password.expose_secret().is_empty()
        {
            return Err(CoreError::config("account id and secret are required"));
        }
        if door.name.trim().is_empty() {
            return Err(CoreError::config("door name must not be empty"));
        }
        Ok(Self {
            client,
            credentials,
            door,
        })
    }

    pub fn door(&self) -> &DoorConfig {
        &self.door
    }

    async fn run(&self, action: DoorAction) -> Result<Value, RemoteError> {
        debug!(door = %self.door.name, action = %action, "calling remote");
        self.client
            .call(&self.credentials, self.door.address, action)
            .await
            .map_err(|e| RemoteError::from_api(action.as_str(), &e))
    }
}

impl RemoteDoor for GenieDoor {
    async fn get_status(&self) -> Result<Value, RemoteError> {
        self.run(DoorAction::Status).await
    }

    async fn open(&self) -> Result<Value, RemoteError> {
        self.run(DoorAction::Open).await
    }

    async fn close(&self) -> Result<Value, RemoteError> {
        self.run(DoorAction::Close).await
    }

    async fn get_battery(&self) -> Result<Option<u8>, RemoteError> {
        let raw = self.run(DoorAction::Battery).await?;
        Ok(battery_percent(&raw))
    }
}
