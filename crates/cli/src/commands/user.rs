//! User account commands.

use cartwheel_core::{Email, UserRole};
use cartwheel_storefront::db::users::UserRepository;
use cartwheel_storefront::services::auth::AuthService;
use tracing::info;

/// Set the role of an existing user.
///
/// # Errors
///
/// Returns an error if the email is invalid, no such user exists, or the
/// database update fails.
pub async fn set_role(email: &str, role: UserRole) -> Result<(), Box<dyn std::error::Error>> {
    let email = Email::parse(email)?;
    let pool = super::connect().await?;

    let user = UserRepository::new(&pool)
        .set_role(&email, role)
        .await?
        .ok_or_else(|| format!("No user with email {email}"))?;

    info!(user_id = %user.id, email = %user.email, ?role, "Role updated");
    Ok(())
}

/// Create an account and grant it the admin role.
///
/// # Errors
///
/// Returns an error if signup validation fails, the email is taken, or the
/// database update fails.
pub async fn create_admin(
    email: &str,
    name: &str,
    password: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let pool = super::connect().await?;

    let user = AuthService::new(&pool).signup(name, email, password).await?;
    UserRepository::new(&pool)
        .set_role(&user.email, UserRole::Admin)
        .await?;

    info!(user_id = %user.id, email = %user.email, "Admin account created");
    Ok(())
}
