//! IP geolocation lookup.
//!
//! Resolves the login IP to an organization/country pair for banner
//! display. Uses the free ip-api.com JSON endpoint (no key required).
//! This is cosmetic enrichment: every failure — network, status,
//! decode, or an unsuccessful lookup — is logged and absorbed into
//! `None`, and must never abort the main loop.
//!
//! API: `http://ip-api.com/json/{ip}`
//! Auth: None required.
//! Rate limit: 45 requests/minute (free tier) — one call per run here.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::types::GeoInfo;

const BASE_URL: &str = "http://ip-api.com/json";

/// Lookup request timeout.
const LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Response shape
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LookupResponse {
    /// "success" or "fail".
    status: String,
    org: String,
    country: String,
}

impl LookupResponse {
    fn into_geo_info(self) -> Option<GeoInfo> {
        if self.status != "success" || self.org.is_empty() || self.country.is_empty() {
            return None;
        }
        Some(GeoInfo {
            organization: self.org,
            country: self.country,
        })
    }
}

// ---------------------------------------------------------------------------
// Locator
// ---------------------------------------------------------------------------

/// Geolocation client with its own short-timeout HTTP client, kept off
/// the main platform session.
pub struct GeoLocator {
    http: reqwest::Client,
}

impl GeoLocator {
    pub fn new() -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(LOOKUP_TIMEOUT)
            .build()
            .context("Failed to build geolocation HTTP client")?;
        Ok(Self { http })
    }

    /// Resolve an IP to organization/country. Absent on any failure.
    pub async fn resolve(&self, ip: &str) -> Option<GeoInfo> {
        match self.lookup(ip).await {
            Ok(Some(info)) => {
                debug!(ip, location = %info, "Geolocation resolved");
                Some(info)
            }
            Ok(None) => {
                warn!(ip, "Geolocation lookup returned no usable data");
                None
            }
            Err(e) => {
                warn!(ip, error = %e, "Geolocation lookup failed");
                None
            }
        }
    }

    async fn lookup(&self, ip: &str) -> Result<Option<GeoInfo>> {
        let url = format!(
            "{BASE_URL}/{}?fields=status,org,country",
            urlencoding::encode(ip)
        );

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .context("Geolocation request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            anyhow::bail!("Geolocation API error: {status}");
        }

        let data: LookupResponse = resp
            .json()
            .await
            .context("Failed to parse geolocation response")?;

        Ok(data.into_geo_info())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
