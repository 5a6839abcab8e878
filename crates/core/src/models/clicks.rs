//! Click counters and the ranking windows they feed

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::DiscoveryError;

/// The four counters advanced by one click, as a group
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClickCounters {
    pub total: i64,
    pub today: i64,
    pub week: i64,
    pub month: i64,
}

impl ClickCounters {
    pub fn new(total: i64, today: i64, week: i64, month: i64) -> Self {
        Self {
            total,
            today,
            week,
            month,
        }
    }

    /// Applies one click to all four counters
    pub fn increment(&mut self) {
        self.total += 1;
        self.today += 1;
        self.week += 1;
        self.month += 1;
    }

    pub fn reset(&mut self, window: ClickWindow) {
        match window {
            ClickWindow::Day => self.today = 0,
            ClickWindow::Week => self.week = 0,
            ClickWindow::Month => self.month = 0,
        }
    }

    pub fn for_board(&self, board: Board) -> i64 {
        match board {
            Board::Total => self.total,
            Board::Month => self.month,
            Board::Week => self.week,
            Board::Day => self.today,
        }
    }

    /// No window counter exceeds the all-time counter
    pub fn is_consistent(&self) -> bool {
        self.today <= self.total && self.week <= self.total && self.month <= self.total
    }
}

/// A resettable click window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClickWindow {
    Day,
    Week,
    Month,
}

impl ClickWindow {
    pub const ALL: [ClickWindow; 3] = [ClickWindow::Day, ClickWindow::Week, ClickWindow::Month];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
        }
    }
}

impl fmt::Display for ClickWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named ranking board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Board {
    Total,
    Month,
    Week,
    Day,
}

impl Board {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Total => "total",
            Self::Month => "month",
            Self::Week => "week",
            Self::Day => "day",
        }
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Board {
    type Err = DiscoveryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "total" | "all" => Ok(Self::Total),
            "month" => Ok(Self::Month),
            "week" => Ok(Self::Week),
            "day" | "today" => Ok(Self::Day),
            other => Err(DiscoveryError::invalid(format!(
                "unknown ranking board: {}",
                other
            ))),
        }
    }
}
