//! Daily wall-clock ETL trigger.
//!
//! Independent of request traffic: a background task sleeps until the
//! configured local time, runs the pipeline, refreshes the snapshot and
//! reschedules. Failures are logged and retried at the next fire time;
//! a stale dataset keeps serving in the meantime.

use chrono::{DateTime, Duration as ChronoDuration, Local, NaiveTime};
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::api::AppState;
use crate::etl::EtlMode;

/// Spawn the daily trigger loop. Runs for the life of the process.
pub fn spawn_daily_etl(state: AppState) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let fire_at = next_fire_time(&state.config.etl.schedule_time, Local::now());
            let wait = (fire_at - Local::now())
                .to_std()
                .unwrap_or(Duration::from_secs(3600));
            info!(next = %fire_at, "Next scheduled ETL run");
            sleep(wait).await;

            if state
                .etl_running
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
            {
                warn!("Scheduled ETL skipped; a run is already in flight");
                continue;
            }

            match crate::services::run_etl_and_refresh(&state, EtlMode::Full).await {
                Ok(report) => info!(state = %report.state, "Scheduled ETL run finished"),
                Err(e) => error!(error = %e, "Scheduled ETL run failed"),
            }
            state.etl_running.store(false, Ordering::SeqCst);
        }
    })
}

/// Next occurrence of `HH:MM` local time strictly after `now`.
fn next_fire_time(schedule_time: &str, now: DateTime<Local>) -> DateTime<Local> {
    let time = NaiveTime::parse_from_str(schedule_time, "%H:%M")
        .unwrap_or_else(|_| NaiveTime::from_hms_opt(6, 0, 0).unwrap());

    let today = now.date_naive().and_time(time);
    let today = today
        .and_local_timezone(Local)
        .earliest()
        .unwrap_or_else(|| now + ChronoDuration::hours(24));

    if today > now {
        today
    } else {
        today + ChronoDuration::days(1)
    }
}
