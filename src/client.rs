//! Platform HTTP transport.
//!
//! One pooled client per process, created at startup and shared by
//! reference into the session and accessors. Carries the platform's
//! fixed header set, a mutable auth-token header, and a bounded retry
//! policy for transient failures.
//!
//! Responses are returned as raw `serde_json::Value`: the token-expiry
//! signature has to be checked before any shape-parsing, so typed
//! decoding happens in the accessors, not here.

use anyhow::{Context, Result};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use std::sync::RwLock;
use std::time::Duration;
use tracing::warn;

use crate::config::Config;

// ---------------------------------------------------------------------------
// Retry policy
// ---------------------------------------------------------------------------

/// Status codes retried automatically.
const RETRY_STATUS: &[u16] = &[429, 500, 502, 503, 504];

/// Retries after the initial attempt.
const MAX_RETRIES: u32 = 3;

/// Base backoff; doubles per retry (1 s, 2 s, 4 s).
const BACKOFF_BASE: Duration = Duration::from_secs(1);

/// Request timeout for platform calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Idle connections kept per host.
const POOL_MAX_IDLE: usize = 20;

/// Auth header carrying the session token.
pub const TOKEN_HEADER: &str = "app-login-token";

fn is_retryable(status: StatusCode) -> bool {
    RETRY_STATUS.contains(&status.as_u16())
}

fn backoff_delay(retry: u32) -> Duration {
    // retry is 1-based: 1 s, 2 s, 4 s, ...
    BACKOFF_BASE * (1 << (retry - 1))
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Pooled HTTP client for the trading platform.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    /// Current session token. `None` means the auth header is absent
    /// entirely — never sent empty.
    token: RwLock<Option<String>>,
}

impl ApiClient {
    /// Build the transport from configuration. Called once at startup;
    /// connections are released when the client is dropped.
    pub fn new(cfg: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .default_headers(cfg.common_headers()?)
            .timeout(REQUEST_TIMEOUT)
            .pool_max_idle_per_host(POOL_MAX_IDLE)
            .danger_accept_invalid_certs(cfg.accept_invalid_certs)
            .build()
            .context("Failed to build platform HTTP client")?;

        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            token: RwLock::new(None),
        })
    }

    /// Install a session token. Replaces any prior token atomically —
    /// every subsequent request carries the new value.
    pub fn set_token(&self, token: &str) {
        let mut guard = self.token.write().unwrap_or_else(|e| e.into_inner());
        *guard = Some(token.to_string());
    }

    /// Remove the session token; subsequent requests carry no auth
    /// header at all.
    pub fn clear_token(&self) {
        let mut guard = self.token.write().unwrap_or_else(|e| e.into_inner());
        *guard = None;
    }

    /// The currently installed token, if any.
    pub fn token(&self) -> Option<String> {
        self.token.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// POST a JSON body to `path` (e.g. `/user/login`).
    pub async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        self.request(Method::POST, path, Some(body)).await
    }

    /// GET `path`.
    pub async fn get(&self, path: &str) -> Result<Value> {
        self.request(Method::GET, path, None).await
    }

    /// Send one logical request, retrying transient failures with
    /// exponential backoff. The request is rebuilt per attempt so the
    /// token reflects any re-login that happened in between.
    async fn request(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        let mut retry = 0u32;

        loop {
            let mut req = self.http.request(method.clone(), &url);
            if let Some(token) = self.token() {
                req = req.header(TOKEN_HEADER, token);
            }
            if let Some(body) = body {
                req = req.json(body);
            }

            match req.send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        return resp
                            .json::<Value>()
                            .await
                            .with_context(|| format!("Failed to decode {path} response as JSON"));
                    }

                    if is_retryable(status) && retry < MAX_RETRIES {
                        retry += 1;
                        let delay = backoff_delay(retry);
                        warn!(
                            %status,
                            path,
                            retry,
                            delay_secs = delay.as_secs(),
                            "Transient status, backing off"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }

                    let text = resp.text().await.unwrap_or_default();
                    anyhow::bail!("{method} {path} failed {status}: {text}");
                }
                Err(e) if retry < MAX_RETRIES => {
                    retry += 1;
                    let delay = backoff_delay(retry);
                    warn!(
                        error = %e,
                        path,
                        retry,
                        delay_secs = delay.as_secs(),
                        "Request error, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("{method} {path} failed after retries"));
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
