//! REST accessors for the trading platform.
//!
//! Thin, typed mappings from the platform's loosely-structured JSON
//! envelopes into the crate's data model. Each accessor is one POST via
//! the shared transport plus a pure parse function; the parse functions
//! carry no I/O and are tested directly.
//!
//! Envelope shape: `{resultCode: bool, errCode?: int, errCodeDes?:
//! string, data?: ...}`. The expiry signature is checked before any
//! shape-parsing (see `session::is_token_expired`).

use anyhow::{Context, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

use super::CopyPlatform;
use crate::client::ApiClient;
use crate::session::{self, Session};
use crate::types::{Balance, FollowOutcome, FollowResult, ListOutcome, MirrorError, Trade};

const LIST_PATH: &str = "/second/share/user/list";
const FOLLOW_PATH: &str = "/second/share/user/follow";
const FUNDS_PATH: &str = "/funds/overview";
const USER_INFO_PATH: &str = "/user/get/info";

// ---------------------------------------------------------------------------
// Response shapes (platform JSON → Rust)
// ---------------------------------------------------------------------------

/// `data` payload of the listing endpoint. Both trade arrays are
/// optional; the merged sequence is `show_all` followed by
/// `page.content`, in that concatenation order.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ListingData {
    show_all: Vec<Trade>,
    page: ListingPage,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ListingPage {
    content: Vec<Trade>,
}

// ---------------------------------------------------------------------------
// Pure mappers
// ---------------------------------------------------------------------------

/// Classify a raw listing response.
pub fn parse_list_outcome(response: &Value) -> ListOutcome {
    if session::is_token_expired(response) {
        return ListOutcome::Expired;
    }
    if !session::result_code(response) {
        return ListOutcome::Malformed(session::error_description(response));
    }

    let data = match response.get("data") {
        Some(data) if !data.is_null() => data.clone(),
        _ => return ListOutcome::Malformed("listing carried no data object".to_string()),
    };

    let listing: ListingData = match serde_json::from_value(data) {
        Ok(listing) => listing,
        Err(e) => return ListOutcome::Malformed(format!("unexpected listing shape: {e}")),
    };

    let mut trades = listing.show_all;
    trades.extend(listing.page.content);

    if trades.is_empty() {
        ListOutcome::Empty
    } else {
        ListOutcome::Trades(trades)
    }
}

/// Classify a raw follow response. A rejected follow is a completed
/// outcome with `success == false`, not an error.
pub fn parse_follow_outcome(response: &Value) -> FollowOutcome {
    if session::is_token_expired(response) {
        return FollowOutcome::Expired;
    }
    FollowOutcome::Completed(FollowResult {
        success: session::result_code(response),
        message: session::error_description(response),
    })
}

/// Parse a balance response. Remote business failure is an error here —
/// the balance is fetched once at startup and the run cannot proceed
/// without it.
pub fn parse_balance(response: &Value) -> Result<Balance> {
    if !session::result_code(response) {
        return Err(MirrorError::Remote(format!(
            "balance fetch rejected: {}",
            session::error_description(response)
        ))
        .into());
    }

    let data = response
        .get("data")
        .filter(|d| !d.is_null())
        .cloned()
        .unwrap_or_else(|| json!({}));

    serde_json::from_value(data).context("Unexpected balance shape")
}

/// Extract the recorded login IP from a user-info response, if present.
pub fn parse_login_ip(response: &Value) -> Option<String> {
    response
        .get("data")
        .and_then(|d| d.get("loginIp"))
        .and_then(Value::as_str)
        .map(String::from)
}

// ---------------------------------------------------------------------------
// REST platform
// ---------------------------------------------------------------------------

/// Live platform client: session plus shared transport.
pub struct RestPlatform {
    session: Session,
    client: Arc<ApiClient>,
}

impl RestPlatform {
    pub fn new(session: Session, client: Arc<ApiClient>) -> Self {
        Self { session, client }
    }

    /// Raw listing call. The loop only ever asks for unfinished trades;
    /// finished ones are reachable here for ad-hoc inspection.
    pub async fn list_trades(&self, is_finish: bool) -> Result<ListOutcome> {
        let response = self
            .client
            .post(LIST_PATH, &json!({"isFinish": is_finish}))
            .await
            .context("Trade listing request failed")?;
        let outcome = parse_list_outcome(&response);
        debug!(?outcome, "Listing classified");
        Ok(outcome)
    }
}

#[async_trait]
impl CopyPlatform for RestPlatform {
    async fn login(&self) -> Result<String> {
        self.session.login().await
    }

    async fn fetch_login_ip(&self) -> Result<Option<String>> {
        let response = self
            .client
            .post(USER_INFO_PATH, &json!({}))
            .await
            .context("User info request failed")?;
        Ok(parse_login_ip(&response))
    }

    async fn fetch_balance(&self) -> Result<Balance> {
        let response = self
            .client
            .post(FUNDS_PATH, &json!({}))
            .await
            .context("Balance request failed")?;
        parse_balance(&response)
    }

    async fn list_open_trades(&self) -> Result<ListOutcome> {
        self.list_trades(false).await
    }

    async fn follow_trade(&self, trade_id: &str, stake: Decimal) -> Result<FollowOutcome> {
        // The platform expects the quantity as a decimal string.
        let payload = json!({
            "shareId": trade_id,
            "quantity": stake.to_string(),
        });
        let response = self
            .client
            .post(FOLLOW_PATH, &payload)
            .await
            .context("Follow request failed")?;
        Ok(parse_follow_outcome(&response))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
