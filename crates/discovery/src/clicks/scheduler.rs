//! Background task that ticks the click rollover at local midnight

use chrono::{DateTime, Duration as ChronoDuration, FixedOffset, TimeZone, Utc};
use novel_hub_core::Clock;
use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use tracing::{error, info};

use crate::facade::QueryFacade;

/// First local midnight strictly after `now`
pub fn next_local_midnight(now: DateTime<Utc>, offset: FixedOffset) -> DateTime<Utc> {
    now.with_timezone(&offset)
        .date_naive()
        .succ_opt()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .and_then(|midnight| offset.from_local_datetime(&midnight).single())
        .map(|local| local.with_timezone(&Utc))
        .unwrap_or_else(|| now + ChronoDuration::days(1))
}

/// Sleeps until each local midnight and rolls the click windows over
pub async fn run_rollover_task(facade: Arc<QueryFacade>, clock: Arc<dyn Clock>) {
    let offset = facade.click_accountant().offset();
    info!(utc_offset_secs = offset.local_minus_utc(), "Starting click rollover task");

    loop {
        let now = clock.now();
        let next = next_local_midnight(now, offset);
        let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
        time::sleep(wait).await;

        match facade.rollover(clock.now()).await {
            Ok(report) => {
                info!(
                    windows = ?report.reset,
                    rows = report.rows_affected,
                    "Click rollover completed"
                );
            }
            Err(e) => {
                error!(error = %e, "Click rollover failed");
            }
        }
    }
}
