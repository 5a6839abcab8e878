//! Click accounting over four time windows
//!
//! Each recorded click advances `total`, `today`, `week` and `month` together
//! through the [`ClickCounterStore`]. Window resets are driven from outside via
//! [`ClickAccountant::rollover`], which compares the local calendar period of
//! `now` with the period seen on the previous tick.

pub mod scheduler;

pub use scheduler::{next_local_midnight, run_rollover_task};

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Utc};
use novel_hub_core::{ClickCounterStore, ClickCounters, ClickWindow, NovelId, Result};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, instrument};

/// Calendar periods of one instant in local time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PeriodMarks {
    day: NaiveDate,
    /// ISO year and week; ISO weeks start on Monday
    week: (i32, u32),
    month: (i32, u32),
}

impl PeriodMarks {
    fn at(instant: DateTime<Utc>, offset: FixedOffset) -> Self {
        let local = instant.with_timezone(&offset).date_naive();
        let iso = local.iso_week();
        Self {
            day: local,
            week: (iso.year(), iso.week()),
            month: (local.year(), local.month()),
        }
    }

    /// Windows whose period advanced between `self` and `later`
    fn advanced(&self, later: &PeriodMarks) -> Vec<ClickWindow> {
        let mut windows = Vec::new();
        if later.day > self.day {
            windows.push(ClickWindow::Day);
        }
        if later.week > self.week {
            windows.push(ClickWindow::Week);
        }
        if later.month > self.month {
            windows.push(ClickWindow::Month);
        }
        windows
    }

    fn adopt(&mut self, window: ClickWindow, later: &PeriodMarks) {
        match window {
            ClickWindow::Day => self.day = later.day,
            ClickWindow::Week => self.week = later.week,
            ClickWindow::Month => self.month = later.month,
        }
    }
}

/// Outcome of one rollover tick
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RolloverReport {
    pub reset: Vec<ClickWindow>,
    pub rows_affected: u64,
}

pub struct ClickAccountant {
    store: Arc<dyn ClickCounterStore>,
    offset: FixedOffset,
    marks: Mutex<PeriodMarks>,
}

impl ClickAccountant {
    /// `started_at` anchors the periods the first rollover compares against
    pub fn new(
        store: Arc<dyn ClickCounterStore>,
        offset: FixedOffset,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            store,
            offset,
            marks: Mutex::new(PeriodMarks::at(started_at, offset)),
        }
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Records one reader open of an approved novel
    #[instrument(skip(self))]
    pub async fn record(&self, novel_id: NovelId) -> Result<ClickCounters> {
        let counters = self.store.increment(novel_id).await?;
        debug!(novel_id, total = counters.total, "Click recorded");
        Ok(counters)
    }

    /// Zeroes one window immediately
    #[instrument(skip(self))]
    pub async fn reset(&self, window: ClickWindow) -> Result<u64> {
        let rows = self.store.reset(window).await?;
        info!(window = %window, rows, "Click window reset");
        Ok(rows)
    }

    /// Resets every window whose local period changed since the previous tick.
    ///
    /// The total counter is never reset. A window whose reset fails keeps its
    /// old period, so the next tick retries it.
    #[instrument(skip(self))]
    pub async fn rollover(&self, now: DateTime<Utc>) -> Result<RolloverReport> {
        let later = PeriodMarks::at(now, self.offset);
        let due = {
            let marks = self.marks.lock().unwrap_or_else(|e| e.into_inner());
            marks.advanced(&later)
        };

        let mut report = RolloverReport::default();
        for window in due {
            report.rows_affected += self.reset(window).await?;
            report.reset.push(window);

            let mut marks = self.marks.lock().unwrap_or_else(|e| e.into_inner());
            marks.adopt(window, &later);
        }

        if report.reset.is_empty() {
            debug!(now = %now, "No click window rolled over");
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn utc_offset() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    #[test]
    fn test_same_day_advances_nothing() {
        let a = PeriodMarks::at(utc(2024, 6, 12, 1), utc_offset());
        let b = PeriodMarks::at(utc(2024, 6, 12, 23), utc_offset());
        assert!(a.advanced(&b).is_empty());
    }

    #[test]
    fn test_midweek_midnight_advances_day_only() {
        // Wednesday -> Thursday
        let a = PeriodMarks::at(utc(2024, 6, 12, 12), utc_offset());
        let b = PeriodMarks::at(utc(2024, 6, 13, 0), utc_offset());
        assert_eq!(a.advanced(&b), vec![ClickWindow::Day]);
    }

    #[test]
    fn test_monday_advances_week() {
        // Sunday -> Monday
        let a = PeriodMarks::at(utc(2024, 6, 9, 12), utc_offset());
        let b = PeriodMarks::at(utc(2024, 6, 10, 0), utc_offset());
        assert_eq!(a.advanced(&b), vec![ClickWindow::Day, ClickWindow::Week]);
    }

    #[test]
    fn test_first_of_month_advances_month() {
        // Friday May 31 -> Saturday June 1
        let a = PeriodMarks::at(utc(2024, 5, 31, 12), utc_offset());
        let b = PeriodMarks::at(utc(2024, 6, 1, 0), utc_offset());
        assert_eq!(a.advanced(&b), vec![ClickWindow::Day, ClickWindow::Month]);
    }

    #[test]
    fn test_year_boundary_week() {
        // Sunday Dec 31 2023 (ISO week 52 of 2023) -> Monday Jan 1 2024 (week 1 of 2024)
        let a = PeriodMarks::at(utc(2023, 12, 31, 12), utc_offset());
        let b = PeriodMarks::at(utc(2024, 1, 1, 0), utc_offset());
        assert_eq!(
            a.advanced(&b),
            vec![ClickWindow::Day, ClickWindow::Week, ClickWindow::Month]
        );
    }

    #[test]
    fn test_local_offset_shifts_midnight() {
        let offset = FixedOffset::east_opt(8 * 3600).unwrap();
        // 15:00 UTC and 16:00 UTC straddle local midnight at UTC+8
        let a = PeriodMarks::at(utc(2024, 6, 12, 15), offset);
        let b = PeriodMarks::at(utc(2024, 6, 12, 16), offset);
        assert_eq!(a.advanced(&b), vec![ClickWindow::Day]);
    }

    #[test]
    fn test_clock_going_backwards_advances_nothing() {
        let a = PeriodMarks::at(utc(2024, 6, 12, 12), utc_offset());
        let b = PeriodMarks::at(utc(2024, 6, 1, 0), utc_offset());
        assert!(a.advanced(&b).is_empty());
    }
}
