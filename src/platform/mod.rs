//! Platform integration.
//!
//! Defines the `CopyPlatform` trait — the seam the poll-and-follow loop
//! consumes — and the REST implementation talking to the live platform.
//! Tests drive the loop through mocked or scripted implementations of
//! this trait instead of a network.

pub mod rest;

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::types::{Balance, FollowOutcome, ListOutcome};

/// Abstraction over the copy-trading platform.
///
/// Listing and follow calls return classified outcomes rather than
/// errors for the routine cases (expiry, empty, malformed); a `Result`
/// error from any method means the transport itself gave up.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CopyPlatform: Send + Sync {
    /// Authenticate and install a fresh session token.
    async fn login(&self) -> Result<String>;

    /// The IP the platform recorded for this login, for banner display.
    async fn fetch_login_ip(&self) -> Result<Option<String>>;

    /// Wallet balance overview. Remote business failure is an error —
    /// the balance is mandatory at run start.
    async fn fetch_balance(&self) -> Result<Balance>;

    /// List open (unfinished) shared trades.
    async fn list_open_trades(&self) -> Result<ListOutcome>;

    /// Follow a shared trade with the given stake.
    async fn follow_trade(&self, trade_id: &str, stake: Decimal) -> Result<FollowOutcome>;
}
