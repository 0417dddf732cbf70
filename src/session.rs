//! Session management: login and token-expiry detection.
//!
//! The platform invalidates sessions at arbitrary points between polls,
//! signalling it with a fixed error code/message pair on the *next*
//! authenticated call. [`is_token_expired`] must therefore be checked
//! against every authenticated response before it is parsed — an expiry
//! payload does not have the shape the accessors expect and would
//! otherwise be misread as a parse failure.

use anyhow::{Context, Result};
use secrecy::{ExposeSecret, Secret};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

use crate::client::ApiClient;
use crate::types::MirrorError;

/// Error code the platform uses for an invalidated session.
const EXPIRED_CODE: i64 = 100_007;

/// Message fragment accompanying [`EXPIRED_CODE`] on expiry. The code is
/// shared with other credential errors, so both must match.
const EXPIRED_MESSAGE: &str = "Invalid credentials used or login expired";

const LOGIN_PATH: &str = "/user/login";

/// True iff the response carries the token-expiry signature.
pub fn is_token_expired(response: &Value) -> bool {
    response.get("errCode").and_then(Value::as_i64) == Some(EXPIRED_CODE)
        && response
            .get("errCodeDes")
            .and_then(Value::as_str)
            .is_some_and(|msg| msg.contains(EXPIRED_MESSAGE))
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Authenticated session over the shared transport.
///
/// Holds the credentials so the loop can re-login transparently when
/// the platform expires the token mid-run.
pub struct Session {
    client: Arc<ApiClient>,
    email: String,
    password: Secret<String>,
}

impl Session {
    pub fn new(client: Arc<ApiClient>, email: String, password: Secret<String>) -> Self {
        Self {
            client,
            email,
            password,
        }
    }

    /// Log in and install the returned token into the transport.
    ///
    /// Fails with [`MirrorError::Auth`] when the platform rejects the
    /// credentials; the remote's description is embedded in the error.
    pub async fn login(&self) -> Result<String> {
        let payload = json!({
            "email": self.email,
            "password": self.password.expose_secret(),
        });

        let response = self
            .client
            .post(LOGIN_PATH, &payload)
            .await
            .context("Login request failed")?;

        if !result_code(&response) {
            return Err(MirrorError::Auth(error_description(&response)).into());
        }

        let token = response
            .get("data")
            .and_then(Value::as_str)
            .ok_or_else(|| MirrorError::Auth("login response carried no token".to_string()))?
            .to_string();

        self.client.set_token(&token);
        info!(email = %self.email, "Logged in, session token installed");

        Ok(token)
    }

    /// The currently installed token, if any.
    pub fn token(&self) -> Option<String> {
        self.client.token()
    }
}

/// The remote's boolean success flag (absent counts as failure).
pub fn result_code(response: &Value) -> bool {
    response
        .get("resultCode")
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

/// The remote's human-readable error description, defaulting to
/// "Unknown" like every other consumer of this envelope.
pub fn error_description(response: &Value) -> String {
    response
        .get("errCodeDes")
        .and_then(Value::as_str)
        .unwrap_or("Unknown")
        .to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
