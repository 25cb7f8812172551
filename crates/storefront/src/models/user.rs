//! User domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use cartwheel_core::{Cart, Email, UserId, UserRole};

/// A storefront user (domain type).
///
/// The credential hash never leaves the repository layer, so a `User` is
/// always safe to serialize back to the account owner.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Normalized email address.
    pub email: Email,
    /// Access role.
    pub role: UserRole,
    /// Embedded shopping cart.
    #[serde(rename = "cartItems")]
    pub cart: Cart,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
    /// When the user was last updated.
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Whether the user may manage the catalog and read analytics.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}
