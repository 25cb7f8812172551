//! Aggregate queries for the admin analytics report.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::PgPool;

use super::RepositoryError;

/// Store-wide counts.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct SummaryRow {
    pub users: i64,
    pub products: i64,
    pub total_sales: i64,
    pub total_revenue: Decimal,
}

/// Orders and revenue on one UTC calendar day.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct DailySalesRow {
    pub date: NaiveDate,
    pub sales: i64,
    pub revenue: Decimal,
}

/// Repository for analytics queries.
pub struct AnalyticsRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AnalyticsRepository<'a> {
    /// Create a new analytics repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Count users, products and orders, and sum revenue.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn summary(&self) -> Result<SummaryRow, RepositoryError> {
        let row = sqlx::query_as::<_, SummaryRow>(
            "SELECT \
                 (SELECT COUNT(*) FROM users) AS users, \
                 (SELECT COUNT(*) FROM products) AS products, \
                 COUNT(*) AS total_sales, \
                 COALESCE(SUM(total_amount), 0) AS total_revenue \
             FROM orders",
        )
        .fetch_one(self.pool)
        .await?;
        Ok(row)
    }

    /// Orders grouped by UTC day within `start..=end`.
    ///
    /// Only days with at least one order are returned.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn daily_sales(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailySalesRow>, RepositoryError> {
        let rows = sqlx::query_as::<_, DailySalesRow>(
            "SELECT (created_at AT TIME ZONE 'UTC')::date AS date, \
                    COUNT(*) AS sales, \
                    COALESCE(SUM(total_amount), 0) AS revenue \
             FROM orders \
             WHERE (created_at AT TIME ZONE 'UTC')::date BETWEEN $1 AND $2 \
             GROUP BY 1 \
             ORDER BY 1",
        )
        .bind(start)
        .bind(end)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }
}
