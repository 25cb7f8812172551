//! Cart route handlers.
//!
//! The cart lives on the user record. Mutations load the user through the
//! auth extractor, apply the change to the [`Cart`] value and write the
//! whole cart back.

use std::collections::HashMap;

use axum::{Json, body::Bytes, extract::State};
use serde::{Deserialize, Serialize};

use cartwheel_core::{Cart, CartError, ProductId};

use crate::db::products::ProductRepository;
use crate::db::users::UserRepository;
use crate::error::{AppError, add_breadcrumb};
use crate::extract::{ValidJson, ValidPath};
use crate::middleware::RequireAuth;
use crate::models::Product;
use crate::state::AppState;

/// A cart line joined with its product.
#[derive(Debug, Clone, Serialize)]
pub struct CartItem {
    #[serde(flatten)]
    pub product: Product,
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartRequest {
    pub product_id: ProductId,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveFromCartRequest {
    #[serde(default)]
    pub product_id: Option<ProductId>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: u32,
}

/// Join cart lines with the catalog, in cart order.
///
/// Lines whose product no longer exists are dropped.
#[must_use]
pub fn materialize(cart: &Cart, products: Vec<Product>) -> Vec<CartItem> {
    let mut by_id: HashMap<ProductId, Product> =
        products.into_iter().map(|p| (p.id, p)).collect();

    cart.lines()
        .iter()
        .filter_map(|line| match by_id.remove(&line.product_id) {
            Some(product) => Some(CartItem {
                product,
                quantity: line.quantity.get(),
            }),
            None => {
                tracing::warn!(product_id = %line.product_id, "Dropping cart line for deleted product");
                None
            }
        })
        .collect()
}

/// The cart with full product details.
///
/// GET /api/cart
///
/// # Errors
///
/// Returns 401 without a valid session.
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<CartItem>>, AppError> {
    if user.cart.is_empty() {
        return Ok(Json(Vec::new()));
    }

    let products = ProductRepository::new(state.pool())
        .get_many(&user.cart.product_ids())
        .await?;
    Ok(Json(materialize(&user.cart, products)))
}

/// Add one unit of a product.
///
/// POST /api/cart
///
/// # Errors
///
/// Returns 404 "Product not found" for unknown products.
pub async fn add(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ValidJson(req): ValidJson<AddToCartRequest>,
) -> Result<Json<Cart>, AppError> {
    if !ProductRepository::new(state.pool())
        .exists(req.product_id)
        .await?
    {
        return Err(AppError::NotFound("Product not found".to_string()));
    }

    let mut cart = user.cart;
    cart.add(req.product_id);
    UserRepository::new(state.pool())
        .save_cart(user.id, &cart)
        .await?;

    let product_id = req.product_id.to_string();
    add_breadcrumb("cart", "Added product", Some(&[("product_id", product_id.as_str())]));
    Ok(Json(cart))
}

/// Remove one product, or everything when no `productId` is given.
///
/// DELETE /api/cart
///
/// # Errors
///
/// Returns 400 for a malformed body.
pub async fn remove(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    body: Bytes,
) -> Result<Json<Cart>, AppError> {
    let req = parse_remove_body(&body)?;

    let mut cart = user.cart;
    match req.product_id {
        Some(product_id) => cart.remove(product_id),
        None => cart.clear(),
    }
    UserRepository::new(state.pool())
        .save_cart(user.id, &cart)
        .await?;

    Ok(Json(cart))
}

fn parse_remove_body(body: &[u8]) -> Result<RemoveFromCartRequest, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(RemoveFromCartRequest::default());
    }
    serde_json::from_slice(body).map_err(|e| AppError::BadRequest(e.to_string()))
}

/// Set the quantity of a cart line; zero removes it.
///
/// PUT /api/cart/{id}
///
/// # Errors
///
/// Returns 404 "Product not found" if the product is not in the cart.
pub async fn update_quantity(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ValidPath(product_id): ValidPath<ProductId>,
    ValidJson(req): ValidJson<UpdateQuantityRequest>,
) -> Result<Json<Cart>, AppError> {
    let mut cart = user.cart;
    cart.set_quantity(product_id, req.quantity)
        .map_err(|CartError::LineNotFound(_)| AppError::NotFound("Product not found".to_string()))?;

    UserRepository::new(state.pool())
        .save_cart(user.id, &cart)
        .await?;

    Ok(Json(cart))
}
