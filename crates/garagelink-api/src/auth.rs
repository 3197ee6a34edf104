// Genie cloud authentication
//
// Username/password login that yields a short-lived bearer token. The
// client logs in afresh before every door action and never caches the
// token, so expiry is never observable by callers.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::client::GenieClient;
use crate::error::{Error, preview};

/// Account credentials for the Genie cloud.
///
/// The password is wrapped in [`SecretString`], so `Debug` output and
/// logs never reveal it.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }
}

/// Login response body. Deployments disagree on the token field name.
#[derive(Deserialize)]
struct LoginResponse {
    token: Option<String>,
    #[serde(rename = "accessToken")]
    access_token: Option<String>,
    #[serde(rename = "idToken")]
    id_token: Option<String>,
}

impl LoginResponse {
    fn into_token(self) -> Option<String> {
        self.token
            .or(self.access_token)
            .or(self.id_token)
            .filter(|t| !t.is_empty())
    }
}

impl GenieClient {
    /// Authenticate and return a bearer token.
    ///
    /// `POST {base}/v1/login` with `{ "username", "password" }`.
    pub async fn login(&self, credentials: &Credentials) -> Result<SecretString, Error> {
        let url = self.endpoint("v1/login")?;
        debug!("logging in at {}", url);

        let body = json!({
            "username": credentials.username,
            "password": credentials.password.expose_secret(),
        });

        let resp = self
            .http()
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(Error::Transport)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Authentication {
                message: format!("login failed (HTTP {status}): {}", preview(&body)),
            });
        }

        let body = resp.text().await.map_err(Error::Transport)?;
        let parsed: LoginResponse =
            serde_json::from_str(&body).map_err(|e| Error::Deserialization {
                message: format!("login response: {e}"),
                body: body.clone(),
            })?;

        let token = parsed.into_token().ok_or_else(|| Error::Authentication {
            message: "missing access token in login response".into(),
        })?;

        debug!("login successful");
        Ok(SecretString::from(token))
    }
}
