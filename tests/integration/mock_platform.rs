//! Scripted platform and notifier doubles for integration testing.
//!
//! `ScriptedPlatform` implements `CopyPlatform` deterministically: each
//! call pops the next scripted outcome, and every call is recorded so
//! tests can assert on ordering — all in-memory with no external
//! dependencies.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use mirror::notify::Notifier;
use mirror::platform::CopyPlatform;
use mirror::types::{Balance, FollowOutcome, ListOutcome};

/// Scripted login outcome.
#[derive(Debug, Clone)]
pub enum LoginScript {
    Succeed,
    Fail(String),
}

/// A deterministic `CopyPlatform` for integration tests.
///
/// Outcomes are consumed front-to-back; when a script runs dry the
/// platform falls back to benign defaults (successful login, empty
/// listing) so a test only scripts what it cares about.
pub struct ScriptedPlatform {
    balance: Balance,
    login_ip: Option<String>,
    logins: Mutex<VecDeque<LoginScript>>,
    listings: Mutex<VecDeque<ListOutcome>>,
    follows: Mutex<VecDeque<FollowOutcome>>,
    /// Ordered record of every call: "login", "list", "follow:<id>".
    calls: Arc<Mutex<Vec<String>>>,
    /// Stakes submitted with each follow, in call order.
    stakes: Arc<Mutex<Vec<Decimal>>>,
}

impl ScriptedPlatform {
    pub fn new(balance: Balance) -> Self {
        Self {
            balance,
            login_ip: Some("203.0.113.7".to_string()),
            logins: Mutex::new(VecDeque::new()),
            listings: Mutex::new(VecDeque::new()),
            follows: Mutex::new(VecDeque::new()),
            calls: Arc::new(Mutex::new(Vec::new())),
            stakes: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn without_login_ip(mut self) -> Self {
        self.login_ip = None;
        self
    }

    pub fn script_login(self, script: LoginScript) -> Self {
        self.logins.lock().unwrap().push_back(script);
        self
    }

    pub fn script_listing(self, outcome: ListOutcome) -> Self {
        self.listings.lock().unwrap().push_back(outcome);
        self
    }

    pub fn script_follow(self, outcome: FollowOutcome) -> Self {
        self.follows.lock().unwrap().push_back(outcome);
        self
    }

    /// Handle for asserting on recorded calls after the run.
    pub fn call_log(&self) -> Arc<Mutex<Vec<String>>> {
        self.calls.clone()
    }

    pub fn stake_log(&self) -> Arc<Mutex<Vec<Decimal>>> {
        self.stakes.clone()
    }
}

#[async_trait]
impl CopyPlatform for ScriptedPlatform {
    async fn login(&self) -> Result<String> {
        self.calls.lock().unwrap().push("login".to_string());
        match self.logins.lock().unwrap().pop_front() {
            Some(LoginScript::Fail(reason)) => Err(anyhow!("{reason}")),
            Some(LoginScript::Succeed) | None => {
                let n = self.calls.lock().unwrap().len();
                Ok(format!("token-{n}"))
            }
        }
    }

    async fn fetch_login_ip(&self) -> Result<Option<String>> {
        self.calls.lock().unwrap().push("login_ip".to_string());
        Ok(self.login_ip.clone())
    }

    async fn fetch_balance(&self) -> Result<Balance> {
        self.calls.lock().unwrap().push("balance".to_string());
        Ok(self.balance.clone())
    }

    async fn list_open_trades(&self) -> Result<ListOutcome> {
        self.calls.lock().unwrap().push("list".to_string());
        Ok(self
            .listings
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(ListOutcome::Empty))
    }

    async fn follow_trade(&self, trade_id: &str, stake: Decimal) -> Result<FollowOutcome> {
        self.calls.lock().unwrap().push(format!("follow:{trade_id}"));
        self.stakes.lock().unwrap().push(stake);
        Ok(self.follows.lock().unwrap().pop_front().unwrap_or_else(|| {
            FollowOutcome::Completed(mirror::types::FollowResult {
                success: false,
                message: "unscripted follow".to_string(),
            })
        }))
    }
}

// ---------------------------------------------------------------------------
// Notifier double
// ---------------------------------------------------------------------------

/// Records every delivered banner; optionally fails every delivery.
pub struct RecordingNotifier {
    messages: Arc<Mutex<Vec<String>>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self {
            messages: Arc::new(Mutex::new(Vec::new())),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            messages: Arc::new(Mutex::new(Vec::new())),
            fail: true,
        }
    }

    pub fn messages(&self) -> Arc<Mutex<Vec<String>>> {
        self.messages.clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, text: &str) -> Result<()> {
        self.messages.lock().unwrap().push(text.to_string());
        if self.fail {
            return Err(anyhow!("simulated webhook outage"));
        }
        Ok(())
    }
}
