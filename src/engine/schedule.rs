//! Pre-loop start gate.
//!
//! Optionally delays the run until a configured wall-clock time (in
//! platform time) minus a lead, plus a small random jitter so repeated
//! runs don't hit the platform at the exact same instant. What happens
//! when the target is already past is an explicit policy, not a silent
//! choice: start immediately, or roll to the same time tomorrow.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use rand::Rng;
use tracing::info;

use crate::config::PastTargetPolicy;
use crate::types::PLATFORM_TZ;

/// Random jitter added to the wake time, seconds.
const JITTER_RANGE_SECS: (f64, f64) = (1.0, 10.0);

/// Parse a "HH:MM" schedule string.
fn parse_schedule_time(schedule: &str) -> Result<(u32, u32)> {
    let (hour, minute) = schedule
        .split_once(':')
        .with_context(|| format!("Schedule time {schedule:?} is not in HH:MM form"))?;
    let hour: u32 = hour
        .trim()
        .parse()
        .with_context(|| format!("Invalid hour in schedule time {schedule:?}"))?;
    let minute: u32 = minute
        .trim()
        .parse()
        .with_context(|| format!("Invalid minute in schedule time {schedule:?}"))?;
    anyhow::ensure!(hour < 24 && minute < 60, "Schedule time {schedule:?} out of range");
    Ok((hour, minute))
}

/// Compute the instant to wake at, before jitter.
///
/// Returns `None` when the target (today's `schedule` minus
/// `advance_minutes`) is already past and the policy says to start
/// immediately.
pub fn compute_wake_time(
    now: DateTime<Tz>,
    schedule: &str,
    advance_minutes: i64,
    policy: PastTargetPolicy,
) -> Result<Option<DateTime<Tz>>> {
    let (hour, minute) = parse_schedule_time(schedule)?;

    let naive = now
        .date_naive()
        .and_hms_opt(hour, minute, 0)
        .context("Schedule time does not exist on today's date")?;
    let target = naive
        .and_local_timezone(now.timezone())
        .single()
        .context("Schedule time is ambiguous in the platform timezone")?
        - Duration::minutes(advance_minutes);

    if now >= target {
        return match policy {
            PastTargetPolicy::StartImmediately => Ok(None),
            PastTargetPolicy::RollToNextDay => Ok(Some(target + Duration::days(1))),
        };
    }

    Ok(Some(target))
}

/// Sleep until the configured start time, if one is set and still ahead.
pub async fn wait_until_scheduled(
    schedule: &str,
    advance_minutes: i64,
    policy: PastTargetPolicy,
) -> Result<()> {
    let now = Utc::now().with_timezone(&PLATFORM_TZ);

    let target = match compute_wake_time(now, schedule, advance_minutes, policy)? {
        Some(target) => target,
        None => {
            info!(schedule, "Scheduled start already past, starting immediately");
            return Ok(());
        }
    };

    let jitter = rand::thread_rng().gen_range(JITTER_RANGE_SECS.0..=JITTER_RANGE_SECS.1);
    let wake = target + Duration::milliseconds((jitter * 1000.0) as i64);
    let wait = (wake - now)
        .to_std()
        .context("Computed wake time is in the past")?;

    info!(
        now = %now.format("%Y-%m-%d %H:%M:%S"),
        wake = %wake.format("%Y-%m-%d %H:%M:%S"),
        wait_mins = format!("{:.2}", wait.as_secs_f64() / 60.0),
        "Waiting for scheduled start"
    );

    tokio::time::sleep(wait).await;
    info!("Scheduled start reached, beginning run");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
