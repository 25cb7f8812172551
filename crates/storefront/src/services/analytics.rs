//! Admin analytics report.

use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::db::analytics::{AnalyticsRepository, DailySalesRow};

/// Days covered by the report when no range is given.
pub const DEFAULT_WINDOW_DAYS: u64 = 7;

/// Longest range a single report may cover.
pub const MAX_WINDOW_DAYS: i64 = 366;

/// Errors from building a report.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("start date must not be after end date")]
    InvertedRange,

    #[error("date range may cover at most {MAX_WINDOW_DAYS} days")]
    RangeTooLong,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Store-wide totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSummary {
    pub users: i64,
    pub products: i64,
    pub total_sales: i64,
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub total_revenue: Decimal,
}

/// Sales on one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailySales {
    /// `YYYY-MM-DD`.
    pub date: NaiveDate,
    pub sales: i64,
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub revenue: Decimal,
}

/// Full analytics response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsReport {
    pub analytics_data: AnalyticsSummary,
    pub daily_sales_data: Vec<DailySales>,
}

/// An inclusive range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    /// Build a range, rejecting inverted or overly long ones.
    ///
    /// # Errors
    ///
    /// Returns `AnalyticsError::InvertedRange` or `AnalyticsError::RangeTooLong`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, AnalyticsError> {
        if start > end {
            return Err(AnalyticsError::InvertedRange);
        }
        if (end - start).num_days() >= MAX_WINDOW_DAYS {
            return Err(AnalyticsError::RangeTooLong);
        }
        Ok(Self { start, end })
    }

    /// The [`DEFAULT_WINDOW_DAYS`] days ending on `today`.
    #[must_use]
    pub fn ending_on(today: NaiveDate) -> Self {
        let start = today
            .checked_sub_days(Days::new(DEFAULT_WINDOW_DAYS - 1))
            .unwrap_or(today);
        Self { start, end: today }
    }

    /// Resolve optional query bounds against `today`.
    ///
    /// A missing end defaults to `today`; a missing start defaults to the
    /// default window ending on the end date.
    ///
    /// # Errors
    ///
    /// Propagates [`DateRange::new`] validation errors.
    pub fn resolve(
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        today: NaiveDate,
    ) -> Result<Self, AnalyticsError> {
        let end = end.unwrap_or(today);
        let start = start.unwrap_or(Self::ending_on(end).start);
        Self::new(start, end)
    }

    #[must_use]
    pub const fn start(&self) -> NaiveDate {
        self.start
    }

    #[must_use]
    pub const fn end(&self) -> NaiveDate {
        self.end
    }

    /// Every day in the range, ascending.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        self.start.iter_days().take_while({
            let end = self.end;
            move |day| *day <= end
        })
    }
}

/// Left-join sparse per-day rows against every day of `range`.
///
/// Yields exactly one entry per day, ascending, with zeros for days that
/// had no orders. Rows outside the range are ignored.
#[must_use]
pub fn fill_daily_series(range: DateRange, rows: &[DailySalesRow]) -> Vec<DailySales> {
    range
        .days()
        .map(|date| {
            rows.iter().find(|row| row.date == date).map_or(
                DailySales {
                    date,
                    sales: 0,
                    revenue: Decimal::ZERO,
                },
                |row| DailySales {
                    date,
                    sales: row.sales,
                    revenue: row.revenue,
                },
            )
        })
        .collect()
}

/// Build the analytics report for `range`.
///
/// # Errors
///
/// Returns `AnalyticsError::Repository` if a query fails.
pub async fn build_report(pool: &PgPool, range: DateRange) -> Result<AnalyticsReport, AnalyticsError> {
    let repo = AnalyticsRepository::new(pool);
    let summary = repo.summary().await?;
    let rows = repo.daily_sales(range.start(), range.end()).await?;

    Ok(AnalyticsReport {
        analytics_data: AnalyticsSummary {
            users: summary.users,
            products: summary.products,
            total_sales: summary.total_sales,
            total_revenue: summary.total_revenue,
        },
        daily_sales_data: fill_daily_series(range, &rows),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn test_series_covers_every_day_ascending() {
        let range = DateRange::new(date("2024-02-27"), date("2024-03-02")).unwrap();
        let rows = vec![
            DailySalesRow {
                date: date("2024-03-01"),
                sales: 3,
                revenue: Decimal::new(4500, 2),
            },
            DailySalesRow {
                date: date("2024-02-27"),
                sales: 1,
                revenue: Decimal::new(999, 2),
            },
        ];

        let series = fill_daily_series(range, &rows);
        let dates: Vec<String> = series.iter().map(|d| d.date.to_string()).collect();
        assert_eq!(
            dates,
            ["2024-02-27", "2024-02-28", "2024-02-29", "2024-03-01", "2024-03-02"]
        );
        let sales: Vec<i64> = series.iter().map(|d| d.sales).collect();
        assert_eq!(sales, [1, 0, 0, 3, 0]);
        assert_eq!(series.get(1).unwrap().revenue, Decimal::ZERO);
    }

    #[test]
    fn test_single_day_range() {
        let day = date("2024-05-05");
        let series = fill_daily_series(DateRange::new(day, day).unwrap(), &[]);
        assert_eq!(series.len(), 1);
    }

    #[test]
    fn test_rows_outside_range_ignored() {
        let range = DateRange::new(date("2024-01-10"), date("2024-01-11")).unwrap();
        let rows = vec![DailySalesRow {
            date: date("2024-01-09"),
            sales: 8,
            revenue: Decimal::ONE,
        }];
        let series = fill_daily_series(range, &rows);
        assert!(series.iter().all(|d| d.sales == 0));
    }

    #[test]
    fn test_default_window_is_seven_days() {
        let range = DateRange::resolve(None, None, date("2024-03-03")).unwrap();
        assert_eq!(range.start(), date("2024-02-26"));
        assert_eq!(range.end(), date("2024-03-03"));
        assert_eq!(range.days().count(), 7);
    }

    #[test]
    fn test_range_validation() {
        assert!(matches!(
            DateRange::new(date("2024-03-02"), date("2024-03-01")),
            Err(AnalyticsError::InvertedRange)
        ));
        assert!(matches!(
            DateRange::new(date("2023-01-01"), date("2024-12-31")),
            Err(AnalyticsError::RangeTooLong)
        ));
    }

    #[test]
    fn test_report_serialization_shape() {
        let report = AnalyticsReport {
            analytics_data: AnalyticsSummary {
                users: 2,
                products: 5,
                total_sales: 3,
                total_revenue: Decimal::new(12_550, 2),
            },
            daily_sales_data: vec![DailySales {
                date: date("2024-03-01"),
                sales: 0,
                revenue: Decimal::ZERO,
            }],
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["analyticsData"]["totalSales"], 3);
        assert_eq!(json["analyticsData"]["totalRevenue"], 125.5);
        assert_eq!(json["dailySalesData"][0]["date"], "2024-03-01");
        assert_eq!(json["dailySalesData"][0]["revenue"], 0.0);
    }
}
