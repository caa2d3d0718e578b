// Reporting windows
//
// Resolves the five canonical rolling windows plus custom ranges into
// concrete timestamp bounds. Resolution is a pure function of the
// caller-supplied "now", which keeps every window independently
// testable against a fixed clock.

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, NaiveTime, Utc};

use crate::analytics::error::{AnalyticsError, AnalyticsResult};

/// A named or custom date range used to bucket transactions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportingWindow {
    /// First of the current month through now
    CurrentMonth,
    /// Trailing three months
    Quarterly,
    /// Trailing six months
    HalfYearly,
    /// January 1 of the current year through now
    Yearly,
    /// No lower bound
    Lifetime,
    /// Caller-supplied inclusive date range
    Custom { start: NaiveDate, end: NaiveDate },
}

impl ReportingWindow {
    /// Parse a window from its wire name plus optional custom bounds
    pub fn parse(
        name: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Self, String> {
        match name {
            "current_month" => Ok(ReportingWindow::CurrentMonth),
            "quarterly" => Ok(ReportingWindow::Quarterly),
            "half_yearly" => Ok(ReportingWindow::HalfYearly),
            "yearly" => Ok(ReportingWindow::Yearly),
            "lifetime" => Ok(ReportingWindow::Lifetime),
            "custom" => match (start, end) {
                (Some(start), Some(end)) => Ok(ReportingWindow::Custom { start, end }),
                _ => Err("custom window requires both start and end dates".to_string()),
            },
            other => Err(format!("Invalid reporting window: {}", other)),
        }
    }

    /// Wire name used as the snapshot period label
    pub fn label(&self) -> &'static str {
        match self {
            ReportingWindow::CurrentMonth => "current_month",
            ReportingWindow::Quarterly => "quarterly",
            ReportingWindow::HalfYearly => "half_yearly",
            ReportingWindow::Yearly => "yearly",
            ReportingWindow::Lifetime => "lifetime",
            ReportingWindow::Custom { .. } => "custom",
        }
    }

    /// Resolve the window against a reference "now".
    ///
    /// A custom range with `start > end` is rejected here, before any
    /// query runs. The custom end bound is pushed to end-of-day so a
    /// same-day range is non-empty.
    pub fn resolve(&self, now: DateTime<Utc>) -> AnalyticsResult<ResolvedWindow> {
        let window = match self {
            ReportingWindow::CurrentMonth => {
                let first = now.date_naive().with_day(1).unwrap_or_else(|| now.date_naive());
                ResolvedWindow {
                    start: Some(day_start(first)),
                    end: now,
                }
            }
            ReportingWindow::Quarterly => ResolvedWindow {
                start: Some(months_back(now, 3)),
                end: now,
            },
            ReportingWindow::HalfYearly => ResolvedWindow {
                start: Some(months_back(now, 6)),
                end: now,
            },
            ReportingWindow::Yearly => {
                let jan_first = NaiveDate::from_ymd_opt(now.year(), 1, 1)
                    .unwrap_or_else(|| now.date_naive());
                ResolvedWindow {
                    start: Some(day_start(jan_first)),
                    end: now,
                }
            }
            ReportingWindow::Lifetime => ResolvedWindow { start: None, end: now },
            ReportingWindow::Custom { start, end } => {
                if start > end {
                    return Err(AnalyticsError::InvalidRange { start: *start, end: *end });
                }
                ResolvedWindow {
                    start: Some(day_start(*start)),
                    end: day_end(*end),
                }
            }
        };

        Ok(window)
    }
}

/// A resolved window with concrete, inclusive timestamp bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedWindow {
    /// Lower bound; `None` means no bound (lifetime)
    pub start: Option<DateTime<Utc>>,
    pub end: DateTime<Utc>,
}

impl ResolvedWindow {
    /// True when a timestamp falls inside the window
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        let after_start = match self.start {
            Some(start) => ts >= start,
            None => true,
        };
        after_start && ts <= self.end
    }
}

/// Midnight at the start of the given date, in UTC
fn day_start(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// Last second of the given date, in UTC
fn day_end(date: NaiveDate) -> DateTime<Utc> {
    day_start(date) + Duration::days(1) - Duration::seconds(1)
}

/// `now` shifted back a whole number of calendar months, saturating
/// at the epoch floor for clocks near the representable minimum
fn months_back(now: DateTime<Utc>, months: u32) -> DateTime<Utc> {
    now.checked_sub_months(Months::new(months))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
