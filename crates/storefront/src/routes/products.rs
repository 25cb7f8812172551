//! Product route handlers.

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use serde_json::json;

use cartwheel_core::ProductId;

use crate::error::AppError;
use crate::extract::{ValidJson, ValidPath};
use crate::middleware::RequireAdmin;
use crate::models::{NewProduct, Product, RecommendedProduct};
use crate::services::catalog::CatalogService;
use crate::state::AppState;

/// A list of products wrapped in an object.
#[derive(Debug, Serialize)]
pub struct ProductList {
    pub products: Vec<Product>,
}

fn catalog(state: &AppState) -> CatalogService<'_> {
    CatalogService::new(state.pool(), state.cache(), state.media())
}

/// Every product.
///
/// GET /api/products (admin)
///
/// # Errors
///
/// Returns 401/403 for non-admins.
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<ProductList>, AppError> {
    let products = catalog(&state).list().await?;
    Ok(Json(ProductList { products }))
}

/// Featured products, cache first.
///
/// GET /api/products/featured
///
/// # Errors
///
/// Returns 404 "No featured products found" when nothing is featured.
pub async fn featured(State(state): State<AppState>) -> Result<Json<Vec<Product>>, AppError> {
    Ok(Json(catalog(&state).featured().await?))
}

/// A random sample of products.
///
/// GET /api/products/recommended
///
/// # Errors
///
/// Returns 500 if the query fails.
pub async fn recommended(
    State(state): State<AppState>,
) -> Result<Json<Vec<RecommendedProduct>>, AppError> {
    Ok(Json(catalog(&state).recommended().await?))
}

/// Products in a category.
///
/// GET /api/products/category/{category}
///
/// # Errors
///
/// Returns 500 if the query fails.
pub async fn by_category(
    State(state): State<AppState>,
    ValidPath(category): ValidPath<String>,
) -> Result<Json<ProductList>, AppError> {
    let products = catalog(&state).list_by_category(&category).await?;
    Ok(Json(ProductList { products }))
}

/// Create a product.
///
/// POST /api/products (admin)
///
/// # Errors
///
/// Returns 400 for blank fields or a negative price, 502 if the image
/// upload fails.
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ValidJson(new): ValidJson<NewProduct>,
) -> Result<impl IntoResponse, AppError> {
    let product = catalog(&state).create(&new).await?;
    tracing::info!(admin_id = %admin.id, product_id = %product.id, "Admin created product");
    Ok((StatusCode::CREATED, Json(product)))
}

/// Flip a product's featured flag.
///
/// PATCH /api/products/{id} (admin)
///
/// # Errors
///
/// Returns 404 "Product not found" for unknown IDs.
pub async fn toggle_featured(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    ValidPath(id): ValidPath<ProductId>,
) -> Result<Json<Product>, AppError> {
    Ok(Json(catalog(&state).toggle_featured(id).await?))
}

/// Delete a product.
///
/// DELETE /api/products/{id} (admin)
///
/// # Errors
///
/// Returns 404 "Product not found" for unknown IDs.
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ValidPath(id): ValidPath<ProductId>,
) -> Result<impl IntoResponse, AppError> {
    catalog(&state).delete(id).await?;
    tracing::info!(admin_id = %admin.id, product_id = %id, "Admin deleted product");
    Ok(Json(json!({ "message": "Product deleted successfully" })))
}
