//! MIRROR — Automated Copy-Trading Agent
//!
//! Entry point. Loads configuration from the environment, initialises
//! structured logging, optionally waits for the scheduled start time,
//! and runs the poll-and-follow loop with graceful shutdown.

use anyhow::Result;
use std::sync::Arc;
use tracing::{error, info};

use mirror::client::ApiClient;
use mirror::config::Config;
use mirror::engine::follower::{Follower, FollowerConfig};
use mirror::engine::schedule;
use mirror::geo::GeoLocator;
use mirror::notify::WebhookNotifier;
use mirror::platform::rest::RestPlatform;
use mirror::session::Session;
use mirror::types::{RunReport, RunState};

const BANNER: &str = r#"
 __  __ ___ ____  ____   ___  ____
|  \/  |_ _|  _ \|  _ \ / _ \|  _ \
| |\/| || || |_) | |_) | | | | |_) |
| |  | || ||  _ <|  _ <| |_| |  _ <
|_|  |_|___|_| \_\_| \_\\___/|_| \_\

  Shared-trade follower — watch, follow, notify
  v0.1.0 — Autonomous Agent
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    // Initialise structured logging
    init_logging();

    // Load configuration from the environment
    let cfg = Config::from_env()?;

    // Print startup banner
    println!("{BANNER}");
    let run_id = uuid::Uuid::new_v4();
    info!(
        run_id = %run_id,
        base_url = %cfg.base_url,
        max_follows = cfg.max_follows,
        schedule = cfg.schedule_time.as_deref().unwrap_or("none"),
        "MIRROR starting up"
    );

    // -- Initialise components -------------------------------------------

    let client = Arc::new(ApiClient::new(&cfg)?);
    let session = Session::new(client.clone(), cfg.email.clone(), cfg.password.clone());
    let platform = RestPlatform::new(session, client.clone());
    let notifier = WebhookNotifier::new(cfg.webhook_url.clone())?;
    let geo = GeoLocator::new()?;

    let follower = Follower::new(
        platform,
        notifier,
        FollowerConfig {
            target_follows: cfg.max_follows,
            ..FollowerConfig::default()
        },
    )
    .with_geo(geo);

    // -- Gate, then run, racing against ctrl-c ---------------------------

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let outcome = tokio::select! {
        result = gate_and_run(&cfg, &follower) => result,
        _ = &mut shutdown => {
            info!("Shutdown signal received, stopping at the current step.");
            Ok(None)
        }
    };

    // Everything below runs on all paths: dropping the follower and the
    // client Arc at end of scope releases the pooled connections.

    match outcome {
        Ok(Some(report)) => {
            info!(%report, "MIRROR shut down cleanly, transport released.");
            Ok(())
        }
        Ok(None) => {
            info!("Run interrupted before completion, transport released.");
            Ok(())
        }
        Err(e) => {
            error!(state = %RunState::Aborted, error = format!("{e:#}"), "Run aborted");
            Err(e)
        }
    }
}

/// Wait for the configured start time (if any), then run the loop.
async fn gate_and_run<P, N>(cfg: &Config, follower: &Follower<P, N>) -> Result<Option<RunReport>>
where
    P: mirror::platform::CopyPlatform,
    N: mirror::notify::Notifier,
{
    if let Some(schedule_time) = &cfg.schedule_time {
        schedule::wait_until_scheduled(schedule_time, cfg.advance_minutes, cfg.on_past_target)
            .await?;
    }

    let report = follower.run().await?;
    Ok(Some(report))
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("mirror=info"));

    let json_logging = std::env::var("MIRROR_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
