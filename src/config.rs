//! Configuration loading from environment variables.
//!
//! The whole configuration surface is the process environment (a `.env`
//! file is honored via `dotenv` in `main`). Mandatory variables fail
//! fast with a descriptive error before any network call; optional ones
//! carry defaults. The login password is held as a [`Secret`] and only
//! exposed at the login call site.

use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use secrecy::Secret;
use std::env;

use crate::types::MirrorError;

/// Consecutive login failures tolerated before the run aborts.
pub const MAX_LOGIN_ATTEMPTS: u32 = 3;

/// What to do when the scheduled start time is already in the past.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PastTargetPolicy {
    /// Skip the gate and start right away.
    StartImmediately,
    /// Wait for the same wall-clock time tomorrow.
    RollToNextDay,
}

/// Top-level application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// API origin, e.g. `https://api.example.com` — no trailing slash.
    pub base_url: String,
    /// Web origin sent in `origin`/`referer` headers.
    pub origin: String,
    pub user_agent: String,

    pub email: String,
    pub password: Secret<String>,

    /// Text-message webhook receiving follow banners.
    pub webhook_url: String,

    /// Optional "HH:MM" start gate in platform time.
    pub schedule_time: Option<String>,
    /// Minutes to start ahead of `schedule_time`.
    pub advance_minutes: i64,
    pub on_past_target: PastTargetPolicy,

    /// Follows to complete before the run exits.
    pub max_follows: u32,

    /// Skip TLS certificate verification (the platform runs with broken
    /// certificates; off unless explicitly enabled).
    pub accept_invalid_certs: bool,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        let schedule_time = env::var("SCHEDULE_TIME").ok().filter(|s| !s.is_empty());

        let advance_minutes = match env::var("ADVANCE_MINUTES") {
            Ok(v) => v
                .trim()
                .parse::<i64>()
                .context("Failed to parse ADVANCE_MINUTES as an integer")?,
            Err(_) => 0,
        };

        let on_past_target = match env::var("SCHEDULE_ON_PAST").as_deref() {
            Ok("roll") => PastTargetPolicy::RollToNextDay,
            Ok("immediate") | Err(_) => PastTargetPolicy::StartImmediately,
            Ok(other) => {
                return Err(MirrorError::Config(format!(
                    "SCHEDULE_ON_PAST must be \"roll\" or \"immediate\", got {other:?}"
                ))
                .into())
            }
        };

        let max_follows = match env::var("MAX_FOLLOWS") {
            Ok(v) => {
                let n = v
                    .trim()
                    .parse::<u32>()
                    .context("Failed to parse MAX_FOLLOWS as an integer")?;
                if n == 0 {
                    return Err(
                        MirrorError::Config("MAX_FOLLOWS must be at least 1".to_string()).into(),
                    );
                }
                n
            }
            Err(_) => 1,
        };

        let accept_invalid_certs = env::var("ACCEPT_INVALID_CERTS")
            .map(|v| v.to_lowercase() == "true")
            .unwrap_or(false);

        Ok(Self {
            base_url: env::var("BASE_URL")
                .context("BASE_URL not set in environment")?,
            origin: env::var("ORIGIN")
                .context("ORIGIN not set in environment")?,
            user_agent: env::var("USER_AGENT")
                .context("USER_AGENT not set in environment")?,
            email: env::var("TRADE_EMAIL")
                .context("TRADE_EMAIL not set in environment")?,
            password: Secret::new(
                env::var("TRADE_PASSWORD")
                    .context("TRADE_PASSWORD not set in environment")?,
            ),
            webhook_url: env::var("FEISHU_WEBHOOK_URL")
                .context("FEISHU_WEBHOOK_URL not set in environment")?,
            schedule_time,
            advance_minutes,
            on_past_target,
            max_follows,
            accept_invalid_certs,
        })
    }

    /// The fixed header set sent with every platform request. The auth
    /// token is NOT part of this set — the transport attaches it only
    /// while one is installed.
    pub fn common_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();

        let mut insert = |name: &'static str, value: &str| -> Result<()> {
            headers.insert(
                HeaderName::from_static(name),
                HeaderValue::from_str(value)
                    .with_context(|| format!("Invalid header value for {name}"))?,
            );
            Ok(())
        };

        insert("user-agent", &self.user_agent)?;
        insert("accept", "application/json, text/plain, */*")?;
        insert("sec-ch-ua-platform", "\"Android\"")?;
        insert(
            "sec-ch-ua",
            "\"Not/A)Brand\";v=\"8\", \"Chromium\";v=\"143\", \"Google Chrome\";v=\"143\"",
        )?;
        insert("app-analog", "false")?;
        insert("sec-ch-ua-mobile", "?1")?;
        insert("set-aws", "true")?;
        insert("set-language", "TRADITIONAL_CHINESE")?;
        insert("content-type", "application/json;charset=UTF-8")?;
        insert("origin", &self.origin)?;
        insert("referer", &format!("{}/", self.origin))?;
        insert("accept-language", "zh-CN,zh;q=0.9")?;
        insert("priority", "u=1, i")?;

        Ok(headers)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
