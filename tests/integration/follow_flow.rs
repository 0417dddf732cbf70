//! End-to-end poll-and-follow scenarios through the public API.

use rust_decimal_macros::dec;

use mirror::engine::follower::{Follower, FollowerConfig};
use mirror::types::{Balance, FollowOutcome, FollowResult, ListOutcome, RunState, Trade};

use crate::mock_platform::{LoginScript, RecordingNotifier, ScriptedPlatform};

fn trade(id: &str) -> Trade {
    Trade {
        id: id.to_string(),
        title: format!("trade {id}"),
        create_time_millis: 1_700_000_000_000,
    }
}

fn test_config(target: u32) -> FollowerConfig {
    FollowerConfig {
        target_follows: target,
        max_login_attempts: 3,
        poll_interval_secs: (0.0, 0.0),
    }
}

fn balance(available: rust_decimal::Decimal) -> Balance {
    Balance {
        usdt_available: available,
        ..Balance::default()
    }
}

fn ok_follow() -> FollowOutcome {
    FollowOutcome::Completed(FollowResult {
        success: true,
        message: "ok".to_string(),
    })
}

#[tokio::test]
async fn full_run_discovers_follows_and_notifies() {
    let platform = ScriptedPlatform::new(balance(dec!(2500)))
        .script_listing(ListOutcome::Trades(vec![trade("X")]))
        .script_follow(ok_follow());
    let calls = platform.call_log();
    let stakes = platform.stake_log();

    let notifier = RecordingNotifier::new();
    let messages = notifier.messages();

    let follower = Follower::new(platform, notifier, test_config(1));
    let report = follower.run().await.unwrap();

    assert_eq!(report.state, RunState::Done);
    assert_eq!(report.followed, 1);
    assert_eq!(report.cycles, 1);

    // Stake is 1% of the opening balance.
    assert_eq!(report.stake, dec!(25.00));
    assert_eq!(*stakes.lock().unwrap(), vec![dec!(25.00)]);

    // One banner, referencing the followed order.
    let messages = messages.lock().unwrap();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("Order ID: X"));
    assert!(messages[0].contains("Stake: 25.00 USDT"));
    assert!(messages[0].contains("IP: 203.0.113.7"));

    // Initialization happened exactly once, in order.
    let calls = calls.lock().unwrap();
    let calls: Vec<&str> = calls.iter().map(String::as_str).collect();
    assert_eq!(calls, vec!["login", "login_ip", "balance", "list", "follow:X"]);
}

#[tokio::test]
async fn expired_listing_triggers_relogin_then_retry() {
    let platform = ScriptedPlatform::new(balance(dec!(1000)))
        .script_login(LoginScript::Succeed)
        .script_login(LoginScript::Succeed)
        .script_listing(ListOutcome::Expired)
        .script_listing(ListOutcome::Trades(vec![trade("X")]))
        .script_follow(ok_follow());
    let calls = platform.call_log();

    let follower = Follower::new(platform, RecordingNotifier::new(), test_config(1));
    let report = follower.run().await.unwrap();
    assert_eq!(report.followed, 1);

    // Expiry goes straight back to listing: login, list, login, list.
    let calls = calls.lock().unwrap();
    let calls: Vec<&str> = calls.iter().map(String::as_str).collect();
    assert_eq!(
        calls,
        vec!["login", "login_ip", "balance", "list", "login", "list", "follow:X"]
    );
}

#[tokio::test]
async fn empty_cycles_keep_polling_until_a_trade_appears() {
    let platform = ScriptedPlatform::new(balance(dec!(1000)))
        .script_listing(ListOutcome::Empty)
        .script_listing(ListOutcome::Malformed("resultCode false".to_string()))
        .script_listing(ListOutcome::Trades(vec![trade("X")]))
        .script_follow(ok_follow());

    let follower = Follower::new(platform, RecordingNotifier::new(), test_config(1));
    let report = follower.run().await.unwrap();

    assert_eq!(report.followed, 1);
    assert_eq!(report.cycles, 3);
}

#[tokio::test]
async fn rejected_follow_keeps_the_run_alive() {
    let platform = ScriptedPlatform::new(balance(dec!(1000)))
        .script_listing(ListOutcome::Trades(vec![trade("X")]))
        .script_follow(FollowOutcome::Completed(FollowResult {
            success: false,
            message: "Sold out".to_string(),
        }))
        .script_listing(ListOutcome::Trades(vec![trade("Y")]))
        .script_follow(ok_follow());

    let notifier = RecordingNotifier::new();
    let messages = notifier.messages();

    let follower = Follower::new(platform, notifier, test_config(1));
    let report = follower.run().await.unwrap();

    assert_eq!(report.followed, 1);
    let messages = messages.lock().unwrap();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("Order ID: Y"));
}

#[tokio::test]
async fn mid_batch_expiry_skips_the_expired_trade() {
    let platform = ScriptedPlatform::new(balance(dec!(1000)))
        .script_listing(ListOutcome::Trades(vec![trade("a"), trade("b")]))
        .script_follow(FollowOutcome::Expired)
        .script_follow(ok_follow());
    let calls = platform.call_log();

    let follower = Follower::new(platform, RecordingNotifier::new(), test_config(1));
    let report = follower.run().await.unwrap();
    assert_eq!(report.followed, 1);

    // "a" expired; after re-login the loop moves straight to "b".
    let calls = calls.lock().unwrap();
    let calls: Vec<&str> = calls.iter().map(String::as_str).collect();
    assert_eq!(
        calls,
        vec!["login", "login_ip", "balance", "list", "follow:a", "login", "follow:b"]
    );
}

#[tokio::test]
async fn webhook_outage_does_not_abort_the_run() {
    let platform = ScriptedPlatform::new(balance(dec!(1000)))
        .script_listing(ListOutcome::Trades(vec![trade("X")]))
        .script_follow(ok_follow());

    let notifier = RecordingNotifier::failing();
    let messages = notifier.messages();

    let follower = Follower::new(platform, notifier, test_config(1));
    let report = follower.run().await.unwrap();

    assert_eq!(report.state, RunState::Done);
    assert_eq!(report.followed, 1);
    assert_eq!(messages.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn missing_login_ip_renders_unknown_in_banner() {
    let platform = ScriptedPlatform::new(balance(dec!(1000)))
        .without_login_ip()
        .script_listing(ListOutcome::Trades(vec![trade("X")]))
        .script_follow(ok_follow());

    let notifier = RecordingNotifier::new();
    let messages = notifier.messages();

    let follower = Follower::new(platform, notifier, test_config(1));
    follower.run().await.unwrap();

    let messages = messages.lock().unwrap();
    assert!(messages[0].contains("IP: unknown"));
    assert!(messages[0].contains("Location: unknown"));
}

#[tokio::test]
async fn persistent_login_rejection_aborts() {
    let platform = ScriptedPlatform::new(balance(dec!(1000)))
        .script_login(LoginScript::Fail("bad credentials".to_string()))
        .script_login(LoginScript::Fail("bad credentials".to_string()))
        .script_login(LoginScript::Fail("bad credentials".to_string()));
    let calls = platform.call_log();

    let follower = Follower::new(platform, RecordingNotifier::new(), test_config(1));
    let err = follower.run().await.unwrap_err();

    assert!(err.to_string().contains("giving up"));
    assert_eq!(calls.lock().unwrap().len(), 3); // three logins, nothing else
}

#[tokio::test]
async fn multi_follow_run_reuses_the_opening_stake() {
    let platform = ScriptedPlatform::new(balance(dec!(1234.56)))
        .script_listing(ListOutcome::Trades(vec![trade("a")]))
        .script_follow(ok_follow())
        .script_listing(ListOutcome::Trades(vec![trade("b")]))
        .script_follow(ok_follow());
    let stakes = platform.stake_log();

    let follower = Follower::new(platform, RecordingNotifier::new(), test_config(2));
    let report = follower.run().await.unwrap();

    assert_eq!(report.followed, 2);
    // Balance was read once; both follows carry the same rounded stake.
    assert_eq!(*stakes.lock().unwrap(), vec![dec!(12.35), dec!(12.35)]);
}
