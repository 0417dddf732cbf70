//! Shared types for the MIRROR agent.
//!
//! These types form the data model used across all modules.
//! They are designed to be stable so that platform, notification,
//! and engine modules can depend on them without circular references.

use chrono::TimeZone;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Timezone the remote platform operates in. Order timestamps and
/// banner times are rendered in this zone.
pub const PLATFORM_TZ: chrono_tz::Tz = chrono_tz::Asia::Shanghai;

/// Render a platform timestamp (ms since epoch) as a wall-clock string.
pub fn format_platform_millis(millis: i64) -> String {
    match PLATFORM_TZ.timestamp_millis_opt(millis).single() {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => format!("invalid timestamp ({millis})"),
    }
}

// ---------------------------------------------------------------------------
// Trade
// ---------------------------------------------------------------------------

/// A shareable order published on the platform, available to follow.
///
/// Built by concatenating the listing's `showAll` and `page.content`
/// arrays. The merge order matters only for display — follow logic
/// must not assume any ordering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    #[serde(rename = "shareId")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    /// Order creation time, ms since epoch.
    #[serde(rename = "createTime", default)]
    pub create_time_millis: i64,
}

impl fmt::Display for Trade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] created {}",
            self.title,
            self.id,
            format_platform_millis(self.create_time_millis),
        )
    }
}

// ---------------------------------------------------------------------------
// Balance
// ---------------------------------------------------------------------------

/// Wallet balance overview. Every field is defaulted because the remote
/// omits fields it considers zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Balance {
    pub usdt_total: Decimal,
    pub usdt_available: Decimal,
    pub usdt_unavailable: Decimal,
    pub today_income: String,
}

impl Default for Balance {
    fn default() -> Self {
        Self {
            usdt_total: Decimal::ZERO,
            usdt_available: Decimal::ZERO,
            usdt_unavailable: Decimal::ZERO,
            today_income: "0".to_string(),
        }
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "total={:.2} USDT | available={:.2} USDT | frozen={:.2} USDT | today={}",
            self.usdt_total, self.usdt_available, self.usdt_unavailable, self.today_income,
        )
    }
}

// ---------------------------------------------------------------------------
// Follow result
// ---------------------------------------------------------------------------

/// Parsed outcome of a follow request. `success` mirrors the remote's
/// `resultCode`; `message` carries the remote's description, falling
/// back to "Unknown".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowResult {
    pub success: bool,
    pub message: String,
}

impl fmt::Display for FollowResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.success { "followed" } else { "rejected" };
        write!(f, "{status}: {}", self.message)
    }
}

// ---------------------------------------------------------------------------
// Geolocation
// ---------------------------------------------------------------------------

/// Organization/country resolved from the login IP. Purely cosmetic —
/// lookup failure leaves the banner showing "unknown".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoInfo {
    pub organization: String,
    pub country: String,
}

impl fmt::Display for GeoInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.organization, self.country)
    }
}

// ---------------------------------------------------------------------------
// Accessor outcomes
// ---------------------------------------------------------------------------

/// Classified result of a trade-listing call.
///
/// Session expiry and malformed payloads are routine outcomes of the
/// polling cycle, not errors — the loop matches on this enum instead of
/// catching exceptions.
#[derive(Debug, Clone, PartialEq)]
pub enum ListOutcome {
    /// The response carried the token-expiry signature.
    Expired,
    /// The response could not be read as a listing (remote failure flag
    /// or unexpected shape). Treated as "no data this cycle".
    Malformed(String),
    /// A well-formed listing with zero open trades.
    Empty,
    /// One or more trades, in merge order.
    Trades(Vec<Trade>),
}

/// Classified result of a follow call. A rejected follow is a normal
/// per-trade outcome, so the only special case is expiry.
#[derive(Debug, Clone, PartialEq)]
pub enum FollowOutcome {
    Expired,
    Completed(FollowResult),
}

// ---------------------------------------------------------------------------
// Run state
// ---------------------------------------------------------------------------

/// Logical state of the poll-and-follow loop, used for logging and the
/// final run report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    LoggingIn,
    Polling,
    Following,
    Done,
    Aborted,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::LoggingIn => write!(f, "LOGGING_IN"),
            RunState::Polling => write!(f, "POLLING"),
            RunState::Following => write!(f, "FOLLOWING"),
            RunState::Done => write!(f, "DONE"),
            RunState::Aborted => write!(f, "ABORTED"),
        }
    }
}

/// Summary of a completed run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub state: RunState,
    pub followed: u32,
    pub target: u32,
    pub cycles: u64,
    pub stake: Decimal,
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | followed {}/{} | cycles={} | stake={:.2} USDT",
            self.state, self.followed, self.target, self.cycles, self.stake,
        )
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for MIRROR.
///
/// Session expiry is deliberately absent: it is a recoverable signal
/// carried by [`ListOutcome`]/[`FollowOutcome`], not an error.
#[derive(Debug, thiserror::Error)]
pub enum MirrorError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Remote reported failure: {0}")]
    Remote(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
