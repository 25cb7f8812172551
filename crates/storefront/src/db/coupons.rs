//! Coupon repository for database operations.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use cartwheel_core::{CouponId, DiscountPercent, UserId};

use super::RepositoryError;
use crate::models::Coupon;

#[derive(sqlx::FromRow)]
struct CouponRow {
    id: CouponId,
    code: String,
    discount_percentage: i32,
    expiration_date: DateTime<Utc>,
    user_id: UserId,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CouponRow> for Coupon {
    type Error = RepositoryError;

    fn try_from(row: CouponRow) -> Result<Self, Self::Error> {
        let discount_percentage = DiscountPercent::new(row.discount_percentage).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid discount on coupon {}: {e}", row.id))
        })?;

        Ok(Self {
            id: row.id,
            code: row.code,
            discount_percentage,
            expiration_date: row.expiration_date,
            user_id: row.user_id,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const COUPON_COLUMNS: &str = "id, code, discount_percentage, expiration_date, user_id, \
                              is_active, created_at, updated_at";

/// Repository for coupon database operations.
pub struct CouponRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CouponRepository<'a> {
    /// Create a new coupon repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// The active coupon owned by a user, if any.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_active_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Option<Coupon>, RepositoryError> {
        let row = sqlx::query_as::<_, CouponRow>(&format!(
            "SELECT {COUPON_COLUMNS} FROM coupons WHERE user_id = $1 AND is_active"
        ))
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        row.map(Coupon::try_from).transpose()
    }

    /// The active coupon with `code` owned by `user_id`, if any.
    ///
    /// Codes owned by other users are never returned.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_active_by_code(
        &self,
        code: &str,
        user_id: UserId,
    ) -> Result<Option<Coupon>, RepositoryError> {
        let row = sqlx::query_as::<_, CouponRow>(&format!(
            "SELECT {COUPON_COLUMNS} FROM coupons \
             WHERE code = $1 AND user_id = $2 AND is_active"
        ))
        .bind(code)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        row.map(Coupon::try_from).transpose()
    }

    /// Mark a coupon inactive.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn deactivate(&self, id: CouponId) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE coupons SET is_active = FALSE, updated_at = now() WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Mark the active coupon with `code` owned by `user_id` inactive.
    ///
    /// Returns whether a coupon was deactivated.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn deactivate_by_code(
        &self,
        code: &str,
        user_id: UserId,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE coupons SET is_active = FALSE, updated_at = now() \
             WHERE code = $1 AND user_id = $2 AND is_active",
        )
        .bind(code)
        .bind(user_id)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Replace whatever coupon a user holds with a new active one.
    ///
    /// Each attempt deletes and inserts in one transaction, so a failed
    /// insert leaves the old coupon in place. `next_code` is called again
    /// when the generated code is already active for someone else.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if every generated code was taken,
    /// or if another award for the same user committed first.
    pub async fn replace_for_user(
        &self,
        user_id: UserId,
        mut next_code: impl FnMut() -> String,
        discount: DiscountPercent,
        expires_at: DateTime<Utc>,
    ) -> Result<Coupon, RepositoryError> {
        for attempt in 1..=CODE_ATTEMPTS {
            let code = next_code();
            match self
                .try_replace(user_id, &code, discount, expires_at)
                .await?
            {
                Some(coupon) => return Ok(coupon),
                None => tracing::debug!(%user_id, %code, attempt, "Coupon code taken, regenerating"),
            }
        }
        Err(RepositoryError::Conflict(CODE_IN_USE.to_owned()))
    }

    /// One delete-and-insert. `None` if `code` is already active.
    async fn try_replace(
        &self,
        user_id: UserId,
        code: &str,
        discount: DiscountPercent,
        expires_at: DateTime<Utc>,
    ) -> Result<Option<Coupon>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM coupons WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        let inserted = sqlx::query_as::<_, CouponRow>(&format!(
            "INSERT INTO coupons (code, discount_percentage, expiration_date, user_id) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COUPON_COLUMNS}"
        ))
        .bind(code)
        .bind(i32::from(discount))
        .bind(expires_at)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await;

        let row = match inserted {
            Ok(row) => row,
            Err(sqlx::Error::Database(ref db_err))
                if db_err.is_unique_violation() && is_code_collision(db_err.constraint()) =>
            {
                return Ok(None);
            }
            Err(e) => return Err(RepositoryError::from_insert(e, USER_HAS_COUPON)),
        };

        tx.commit().await?;
        Coupon::try_from(row).map(Some)
    }
}

/// Partial unique index over active coupon codes.
const ACTIVE_CODE_INDEX: &str = "coupons_active_code_idx";

/// Codes generated per award before giving up.
const CODE_ATTEMPTS: usize = 5;

const CODE_IN_USE: &str = "coupon code already in use";
const USER_HAS_COUPON: &str = "user already holds an active coupon";

/// Whether a unique violation came from another user's active code.
fn is_code_collision(constraint: Option<&str>) -> bool {
    constraint == Some(ACTIVE_CODE_INDEX)
}
