//! Failure ledger
//!
//! Per-user tally of todos that expired, were abandoned (deleted while
//! unfinished) or got completed, bucketed by UTC day. Every day without a
//! single completion extends the procrastination streak and costs a point.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

/// Points for a todo that ran past its deadline
pub const EXPIRED_POINTS: u64 = 5;
/// Points for deleting a todo that was never finished
pub const DELETED_POINTS: u64 = 2;
/// Points for a day that closed without a completion
pub const ZERO_DAY_POINTS: u64 = 1;

/// Something that happened to a todo
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureEvent {
    Expired,
    Deleted,
    Completed,
}

/// Counts for one day
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, utoipa::ToSchema)]
pub struct DayTally {
    pub expired: u64,
    pub deleted: u64,
    pub completed: u64,
}

/// A user's failure ledger
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FailureStats {
    pub total_expired: u64,
    pub total_deleted_unfinished: u64,
    /// Consecutive closed days without a completion
    pub streak_days: u64,
    pub shame_points: u64,
    /// Last day the ledger was rolled over to
    pub last_date: Option<NaiveDate>,
    pub history: BTreeMap<NaiveDate, DayTally>,
}

impl FailureStats {
    /// Close every day from the last seen day up to, not including, `today`.
    ///
    /// The first roll-over only opens `today`. Days missing from the history
    /// count as days without a completion.
    pub fn roll_over(&mut self, today: NaiveDate) {
        if let Some(last) = self.last_date {
            let mut day = last;
            while day < today {
                let completed = self.history.get(&day).map_or(0, |t| t.completed);
                if completed == 0 {
                    self.streak_days += 1;
                    self.shame_points += ZERO_DAY_POINTS;
                } else {
                    self.streak_days = 0;
                }
                match day.succ_opt() {
                    Some(next) => day = next,
                    None => break,
                }
            }
        }

        self.history.entry(today).or_default();
        // A clock that went backwards never reopens closed days
        if self.last_date.is_none_or(|last| last < today) {
            self.last_date = Some(today);
        }
    }

    /// Roll over to `today`, then count `event` against it
    pub fn record(&mut self, event: FailureEvent, today: NaiveDate) {
        self.roll_over(today);
        let tally = self.history.entry(today).or_default();
        match event {
            FailureEvent::Expired => {
                tally.expired += 1;
                self.total_expired += 1;
                self.shame_points += EXPIRED_POINTS;
            }
            FailureEvent::Deleted => {
                tally.deleted += 1;
                self.total_deleted_unfinished += 1;
                self.shame_points += DELETED_POINTS;
            }
            FailureEvent::Completed => {
                tally.completed += 1;
                self.streak_days = 0;
            }
        }
    }

    pub fn rank(&self) -> &'static str {
        rank_title(self.shame_points)
    }

    /// History as CSV, oldest day first, without a trailing newline
    pub fn history_csv(&self) -> String {
        let mut rows = vec!["date,expired,deleted,completed".to_string()];
        rows.extend(self.history.iter().map(|(day, t)| {
            format!("{},{},{},{}", day.format("%Y-%m-%d"), t.expired, t.deleted, t.completed)
        }));
        rows.join("\n")
    }
}

/// Title for a shame point total
pub fn rank_title(points: u64) -> &'static str {
    match points {
        0..=9 => "Mildly Guilty",
        10..=49 => "Procrastination Apprentice",
        50..=99 => "Master of Delay",
        _ => "Overlord of Sloth",
    }
}
