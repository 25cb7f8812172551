//! Analytics route handler.

use axum::{Json, extract::State};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;

use crate::error::AppError;
use crate::extract::ValidQuery;
use crate::middleware::RequireAdmin;
use crate::services::analytics::{self, AnalyticsReport, DateRange};
use crate::state::AppState;

/// Optional report bounds, `YYYY-MM-DD`.
#[derive(Debug, Default, Deserialize)]
pub struct AnalyticsQuery {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

/// Store totals plus one entry per day of the requested range.
///
/// GET /api/analytics (admin)
///
/// Defaults to the seven days ending today (UTC).
///
/// # Errors
///
/// Returns 400 for an inverted or overlong range.
pub async fn show(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    ValidQuery(query): ValidQuery<AnalyticsQuery>,
) -> Result<Json<AnalyticsReport>, AppError> {
    let range = DateRange::resolve(query.start, query.end, Utc::now().date_naive())?;
    let report = analytics::build_report(state.pool(), range).await?;
    Ok(Json(report))
}
