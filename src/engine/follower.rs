//! The poll-and-follow loop.
//!
//! Runs the whole copy-trading cycle against the platform seam:
//! log in, compute the per-follow stake once from the opening balance,
//! then poll the shared-trade listing until the target number of
//! follows has completed. Session expiry is handled inline by
//! re-logging-in; malformed or empty listings simply wait out a poll
//! interval. Each successful follow pushes a banner to the notifier.
//!
//! The loop is strictly sequential — one request or sleep at a time —
//! and is cancelled from the outside (ctrl-c) at those blocking points.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{debug, info, warn};

use crate::config::MAX_LOGIN_ATTEMPTS;
use crate::geo::GeoLocator;
use crate::notify::Notifier;
use crate::platform::CopyPlatform;
use crate::types::{
    FollowOutcome, GeoInfo, ListOutcome, RunReport, RunState, Trade, PLATFORM_TZ,
    format_platform_millis,
};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Fraction of the opening available balance committed per follow.
const STAKE_FRACTION: Decimal = dec!(0.01);

/// Poll interval bounds, seconds. The actual wait is sampled uniformly
/// per cycle so polling doesn't land on a fixed beat.
const POLL_INTERVAL_SECS: (f64, f64) = (30.0, 40.0);

/// Loop parameters. Defaults match production; tests shrink the poll
/// interval to zero.
#[derive(Debug, Clone)]
pub struct FollowerConfig {
    /// Follows to complete before the run ends.
    pub target_follows: u32,
    /// Consecutive login failures tolerated before aborting.
    pub max_login_attempts: u32,
    /// Poll interval bounds in seconds, inclusive.
    pub poll_interval_secs: (f64, f64),
}

impl Default for FollowerConfig {
    fn default() -> Self {
        Self {
            target_follows: 1,
            max_login_attempts: MAX_LOGIN_ATTEMPTS,
            poll_interval_secs: POLL_INTERVAL_SECS,
        }
    }
}

/// The per-follow stake: 1% of the available balance, rounded to cents.
/// Computed once per run — balance changes during the run do not move it.
pub fn compute_stake(available: Decimal) -> Decimal {
    (available * STAKE_FRACTION).round_dp(2)
}

// ---------------------------------------------------------------------------
// Banner
// ---------------------------------------------------------------------------

/// Render the success banner pushed to the operator after each follow.
pub fn build_banner(
    trade: &Trade,
    follow_time: DateTime<Utc>,
    stake: Decimal,
    available: Decimal,
    login_ip: Option<&str>,
    geo: Option<&GeoInfo>,
) -> String {
    let created = format_platform_millis(trade.create_time_millis);
    let followed = follow_time
        .with_timezone(&PLATFORM_TZ)
        .format("%Y-%m-%d %H:%M:%S");
    let location = geo.map_or_else(|| "unknown".to_string(), |g| g.to_string());

    let lines = [
        String::new(),
        "✨ Follow placed ✨".to_string(),
        String::new(),
        "📋 Order".to_string(),
        format!("  🆔 Order ID: {}", trade.id),
        format!("  🕐 Created: {created}"),
        format!("  🕒 Followed: {followed}"),
        String::new(),
        "💰 Funds".to_string(),
        format!("  💎 Available: {available:.2} USDT"),
        format!("  📊 Stake: {stake:.2} USDT"),
        String::new(),
        "🌐 Login".to_string(),
        format!("  📍 IP: {}", login_ip.unwrap_or("unknown")),
        format!("  🏢 Location: {location}"),
    ];

    lines.join("\n")
}

// ---------------------------------------------------------------------------
// Follower
// ---------------------------------------------------------------------------

/// The poll-and-follow loop over a platform and a notification sink.
pub struct Follower<P, N> {
    platform: P,
    notifier: N,
    config: FollowerConfig,
    /// Optional IP → location enrichment for the banner. Absent in
    /// tests; lookup failure at runtime is equally fine.
    geo: Option<GeoLocator>,
}

impl<P: CopyPlatform, N: Notifier> Follower<P, N> {
    pub fn new(platform: P, notifier: N, config: FollowerConfig) -> Self {
        Self {
            platform,
            notifier,
            config,
            geo: None,
        }
    }

    pub fn with_geo(mut self, geo: GeoLocator) -> Self {
        self.geo = Some(geo);
        self
    }

    /// Run to completion: returns the report once the target number of
    /// follows is reached, or an error on an unrecoverable failure.
    pub async fn run(&self) -> Result<RunReport> {
        let target = self.config.target_follows;

        // -- One-time initialization ---------------------------------

        info!(state = %RunState::LoggingIn, "Logging in");
        self.login_with_retry().await?;

        let login_ip = match self.platform.fetch_login_ip().await {
            Ok(ip) => ip,
            Err(e) => {
                // Banner enrichment only — never worth aborting over.
                warn!(error = %e, "Could not fetch login IP");
                None
            }
        };

        let geo = match (&self.geo, login_ip.as_deref()) {
            (Some(locator), Some(ip)) => locator.resolve(ip).await,
            _ => None,
        };

        info!(
            login_ip = login_ip.as_deref().unwrap_or("unknown"),
            location = %geo.as_ref().map_or_else(|| "unknown".to_string(), |g| g.to_string()),
            "Login context resolved"
        );

        let balance = self
            .platform
            .fetch_balance()
            .await
            .context("Opening balance fetch failed")?;
        let available = balance.usdt_available;
        let stake = compute_stake(available);

        info!(%balance, stake = %format!("{stake:.2}"), "Stake fixed for this run");
        info!(
            target,
            "Watching for shared trades, polling every 30–40 s. Ctrl-C to stop."
        );

        // -- Poll cycle ----------------------------------------------

        let mut followed = 0u32;
        let mut cycles = 0u64;

        while followed < target {
            cycles += 1;
            debug!(state = %RunState::Polling, cycle = cycles, followed, "Listing open trades");

            let batch = match self.platform.list_open_trades().await? {
                ListOutcome::Expired => {
                    info!("Session expired mid-poll, re-logging-in");
                    self.login_with_retry().await?;
                    // Straight back to listing — expiry does not consume
                    // a poll interval.
                    continue;
                }
                ListOutcome::Malformed(reason) => {
                    debug!(reason, "Listing unreadable, treating as no data");
                    self.poll_wait().await;
                    continue;
                }
                ListOutcome::Empty => {
                    self.poll_wait().await;
                    continue;
                }
                ListOutcome::Trades(batch) => batch,
            };

            info!(state = %RunState::Following, count = batch.len(), "Found shared trades");

            for trade in &batch {
                info!(trade = %trade, "Submitting follow");

                match self.platform.follow_trade(&trade.id, stake).await? {
                    FollowOutcome::Expired => {
                        // The expired attempt is not retried within the
                        // batch; the trade reappears in the next listing
                        // if still open. See DESIGN.md.
                        warn!(
                            trade_id = %trade.id,
                            "Session expired mid-batch, re-logging-in and moving on"
                        );
                        self.login_with_retry().await?;
                        continue;
                    }
                    FollowOutcome::Completed(result) => {
                        info!(trade_id = %trade.id, outcome = %result, "Follow completed");

                        if result.success {
                            followed += 1;
                            let banner = build_banner(
                                trade,
                                Utc::now(),
                                stake,
                                available,
                                login_ip.as_deref(),
                                geo.as_ref(),
                            );
                            println!("{banner}");

                            if let Err(e) = self.notifier.notify(&banner).await {
                                warn!(error = %e, "Notification delivery failed, continuing");
                            }

                            if followed >= target {
                                break;
                            }
                        }
                    }
                }
            }

            if followed >= target {
                break;
            }
            self.poll_wait().await;
        }

        let report = RunReport {
            state: RunState::Done,
            followed,
            target,
            cycles,
            stake,
        };
        info!(%report, "Target reached, run complete");

        Ok(report)
    }

    /// Re-login with a bounded number of attempts. The original design
    /// re-logged-in forever on persistent rejection; this caps it.
    async fn login_with_retry(&self) -> Result<String> {
        let mut failures = 0u32;
        loop {
            match self.platform.login().await {
                Ok(token) => return Ok(token),
                Err(e) => {
                    failures += 1;
                    if failures >= self.config.max_login_attempts {
                        return Err(e).with_context(|| {
                            format!("Login failed {failures} times in a row, giving up")
                        });
                    }
                    warn!(error = %e, attempt = failures, "Login failed, retrying");
                }
            }
        }
    }

    /// Wait a randomized poll interval.
    async fn poll_wait(&self) {
        let (min, max) = self.config.poll_interval_secs;
        let secs = if max > min {
            rand::thread_rng().gen_range(min..=max)
        } else {
            min
        };
        info!(wait_secs = format!("{secs:.2}"), "No trades to follow, waiting");
        tokio::time::sleep(std::time::Duration::from_secs_f64(secs)).await;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
