//! Checkout and coupon flow.
//!
//! Building a session prices the requested products from the catalog,
//! applies the caller's coupon if one was named, and opens a Stripe
//! Checkout session whose metadata records everything needed to create the
//! order later. Large purchases earn the buyer a gift coupon.
//!
//! Confirmation only trusts the gateway: the session is fetched again, must
//! be paid, and the order is rebuilt from the session metadata and the
//! amount actually charged. Confirming the same session twice returns the
//! order created the first time.

use std::collections::HashMap;

use chrono::{Duration, Utc};
use rand::Rng;
use rand::seq::IndexedRandom;
use serde::Deserialize;
use sqlx::PgPool;
use thiserror::Error;

use cartwheel_core::{DiscountPercent, OrderLine, Price, ProductId, Quantity, UserId};

use crate::db::RepositoryError;
use crate::db::coupons::CouponRepository;
use crate::db::orders::OrderRepository;
use crate::db::products::ProductRepository;
use crate::models::{Coupon, Order, Product};
use crate::stripe::{NewCheckoutSession, PaymentStatus, SessionLineItem, StripeClient, StripeError};

/// Pre-discount subtotal, in minor units, that earns a gift coupon.
pub const REWARD_THRESHOLD_MINOR: i64 = 20_000;

/// Discount granted by a gift coupon.
pub const REWARD_PERCENT: i32 = 10;

/// How long a gift coupon stays valid.
pub const REWARD_VALIDITY_DAYS: i64 = 30;

const GIFT_CODE_PREFIX: &str = "GIFT";
const GIFT_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const GIFT_CODE_SUFFIX_LEN: usize = 4;

const META_USER_ID: &str = "userId";
const META_COUPON_CODE: &str = "couponCode";
const META_PRODUCTS: &str = "products";

/// Errors from the checkout flow.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("Invalid or empty products array")]
    EmptyProducts,

    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    #[error("Payment not completed")]
    PaymentNotCompleted,

    #[error("checkout session not found")]
    SessionNotFound,

    #[error("invalid checkout session metadata: {0}")]
    InvalidMetadata(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Stripe(#[from] StripeError),
}

/// One requested product. `quantity` defaults to one.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CheckoutItem {
    pub id: ProductId,
    #[serde(default = "one")]
    pub quantity: Quantity,
}

const fn one() -> Quantity {
    Quantity::ONE
}

/// A catalog product with the quantity being bought and its unit price in minor units.
#[derive(Debug, Clone)]
pub struct PricedLine {
    pub product: Product,
    pub quantity: Quantity,
    pub unit_amount: i64,
}

impl PricedLine {
    fn new(product: Product, quantity: Quantity) -> Self {
        let unit_amount = product.price.to_minor_units();
        Self {
            product,
            quantity,
            unit_amount,
        }
    }

    /// Line total in minor units.
    #[must_use]
    pub fn total(&self) -> i64 {
        self.unit_amount
            .saturating_mul(i64::from(self.quantity.get()))
    }
}

/// Priced checkout contents.
#[derive(Debug, Clone)]
pub struct PricedCart {
    pub lines: Vec<PricedLine>,
    /// Sum of line totals before any discount.
    pub subtotal: i64,
    /// Discount taken off the subtotal.
    pub discount: i64,
}

impl PricedCart {
    /// Amount due after the discount, in minor units.
    #[must_use]
    pub const fn total(&self) -> i64 {
        self.subtotal - self.discount
    }
}

/// Price lines and apply an optional percentage discount.
#[must_use]
pub fn price_lines(
    lines: impl IntoIterator<Item = (Product, Quantity)>,
    discount: Option<DiscountPercent>,
) -> PricedCart {
    let lines: Vec<PricedLine> = lines
        .into_iter()
        .map(|(product, quantity)| PricedLine::new(product, quantity))
        .collect();
    let subtotal = lines
        .iter()
        .fold(0_i64, |acc, line| acc.saturating_add(line.total()));
    let discount = discount.map_or(0, |pct| pct.discount_on(subtotal));

    PricedCart {
        lines,
        subtotal,
        discount,
    }
}

/// Whether a purchase with this pre-discount subtotal earns a gift coupon.
#[must_use]
pub const fn qualifies_for_reward(subtotal_minor: i64) -> bool {
    subtotal_minor >= REWARD_THRESHOLD_MINOR
}

/// A gift coupon code: `GIFT` followed by four random uppercase alphanumerics.
pub fn generate_coupon_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    let suffix: String = (0..GIFT_CODE_SUFFIX_LEN)
        .filter_map(|_| GIFT_CODE_ALPHABET.choose(rng).copied().map(char::from))
        .collect();
    format!("{GIFT_CODE_PREFIX}{suffix}")
}

/// Whether a string looks like a gateway checkout session ID.
#[must_use]
pub fn is_valid_session_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 255
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// What a checkout session records for confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutMetadata {
    pub user_id: UserId,
    pub coupon_code: Option<String>,
    pub products: Vec<OrderLine>,
}

impl CheckoutMetadata {
    fn from_priced(user_id: UserId, coupon_code: Option<String>, cart: &PricedCart) -> Self {
        Self {
            user_id,
            coupon_code,
            products: cart
                .lines
                .iter()
                .map(|line| OrderLine {
                    product_id: line.product.id,
                    quantity: line.quantity,
                    price: line.product.price,
                })
                .collect(),
        }
    }

    /// Encode as gateway metadata pairs.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::InvalidMetadata` if the products cannot be encoded.
    pub fn to_pairs(&self) -> Result<Vec<(String, String)>, CheckoutError> {
        let products = serde_json::to_string(&self.products)
            .map_err(|e| CheckoutError::InvalidMetadata(e.to_string()))?;
        Ok(vec![
            (META_USER_ID.to_string(), self.user_id.to_string()),
            (
                META_COUPON_CODE.to_string(),
                self.coupon_code.clone().unwrap_or_default(),
            ),
            (META_PRODUCTS.to_string(), products),
        ])
    }

    /// Decode from gateway metadata.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::InvalidMetadata` if a field is missing or malformed.
    pub fn from_map(metadata: &HashMap<String, String>) -> Result<Self, CheckoutError> {
        let field = |key: &str| {
            metadata
                .get(key)
                .ok_or_else(|| CheckoutError::InvalidMetadata(format!("missing {key}")))
        };

        let user_id = field(META_USER_ID)?
            .parse()
            .map_err(|_| CheckoutError::InvalidMetadata(format!("bad {META_USER_ID}")))?;
        let coupon_code = metadata
            .get(META_COUPON_CODE)
            .map(|code| code.trim())
            .filter(|code| !code.is_empty())
            .map(str::to_owned);
        let products: Vec<OrderLine> = serde_json::from_str(field(META_PRODUCTS)?)
            .map_err(|e| CheckoutError::InvalidMetadata(format!("bad {META_PRODUCTS}: {e}")))?;

        if products.is_empty() {
            return Err(CheckoutError::InvalidMetadata("no products".to_string()));
        }

        Ok(Self {
            user_id,
            coupon_code,
            products,
        })
    }
}

/// Result of building a checkout session.
#[derive(Debug, Clone)]
pub struct CheckoutStarted {
    pub session_id: String,
    /// Hosted payment page, when the gateway returned one.
    pub url: Option<String>,
    /// Amount due in minor units.
    pub total: i64,
    /// Gift coupon earned by this purchase.
    pub awarded: Option<Coupon>,
}

/// Checkout operations.
pub struct CheckoutService<'a> {
    pool: &'a PgPool,
    stripe: &'a StripeClient,
    base_url: &'a str,
}

impl<'a> CheckoutService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, stripe: &'a StripeClient, base_url: &'a str) -> Self {
        Self {
            pool,
            stripe,
            base_url,
        }
    }

    /// Price the items, open a gateway session and award a gift coupon if earned.
    ///
    /// An unknown, foreign, inactive or expired `coupon_code` is ignored.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::EmptyProducts` for an empty request,
    /// `CheckoutError::ProductNotFound` for unknown products and
    /// `CheckoutError::Stripe` if the gateway rejects the session.
    pub async fn start(
        &self,
        user_id: UserId,
        items: &[CheckoutItem],
        coupon_code: Option<&str>,
    ) -> Result<CheckoutStarted, CheckoutError> {
        if items.is_empty() {
            return Err(CheckoutError::EmptyProducts);
        }

        let lines = self.resolve_items(items).await?;

        let coupons = CouponRepository::new(self.pool);
        let coupon = match coupon_code.map(str::trim).filter(|c| !c.is_empty()) {
            Some(code) => coupons
                .find_active_by_code(code, user_id)
                .await?
                .filter(|coupon| !coupon.is_expired_at(Utc::now())),
            None => None,
        };

        let cart = price_lines(lines, coupon.as_ref().map(|c| c.discount_percentage));

        let gateway_coupon = match &coupon {
            Some(coupon) => Some(
                self.stripe
                    .create_coupon(coupon.discount_percentage.get())
                    .await?
                    .id,
            ),
            None => None,
        };

        let metadata =
            CheckoutMetadata::from_priced(user_id, coupon.as_ref().map(|c| c.code.clone()), &cart);

        let session = self
            .stripe
            .create_checkout_session(&NewCheckoutSession {
                line_items: cart
                    .lines
                    .iter()
                    .map(|line| SessionLineItem {
                        name: line.product.name.clone(),
                        image: line.product.image.clone(),
                        unit_amount: line.unit_amount,
                        quantity: line.quantity.get(),
                    })
                    .collect(),
                success_url: format!(
                    "{}/purchase-success?session_id={{CHECKOUT_SESSION_ID}}",
                    self.base_url
                ),
                cancel_url: format!("{}/purchase-cancel", self.base_url),
                coupon_id: gateway_coupon,
                metadata: metadata.to_pairs()?,
            })
            .await?;

        let awarded = if qualifies_for_reward(cart.subtotal) {
            self.award_gift_coupon(&coupons, user_id).await
        } else {
            None
        };

        Ok(CheckoutStarted {
            session_id: session.id,
            url: session.url,
            total: cart.total(),
            awarded,
        })
    }

    /// Load each requested product, keeping request order.
    async fn resolve_items(
        &self,
        items: &[CheckoutItem],
    ) -> Result<Vec<(Product, Quantity)>, CheckoutError> {
        let ids: Vec<ProductId> = items.iter().map(|item| item.id).collect();
        let products: HashMap<ProductId, Product> = ProductRepository::new(self.pool)
            .get_many(&ids)
            .await?
            .into_iter()
            .map(|product| (product.id, product))
            .collect();

        items
            .iter()
            .map(|item| {
                let product = products
                    .get(&item.id)
                    .cloned()
                    .ok_or(CheckoutError::ProductNotFound(item.id))?;
                Ok((product, item.quantity))
            })
            .collect()
    }

    /// Replace the user's coupon with a fresh gift coupon.
    ///
    /// Failures are logged; the purchase itself has already been set up.
    async fn award_gift_coupon(
        &self,
        coupons: &CouponRepository<'_>,
        user_id: UserId,
    ) -> Option<Coupon> {
        let discount = DiscountPercent::new(REWARD_PERCENT).ok()?;
        let expires_at = Utc::now() + Duration::days(REWARD_VALIDITY_DAYS);

        match coupons
            .replace_for_user(
                user_id,
                || generate_coupon_code(&mut rand::rng()),
                discount,
                expires_at,
            )
            .await
        {
            Ok(coupon) => {
                tracing::info!(%user_id, code = %coupon.code, "Gift coupon awarded");
                Some(coupon)
            }
            Err(e) => {
                tracing::warn!(%user_id, error = %e, "Failed to award gift coupon");
                None
            }
        }
    }

    /// Create the order for a paid session, redeeming its coupon.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::SessionNotFound` for malformed IDs or sessions
    /// started by another user, and `CheckoutError::PaymentNotCompleted`
    /// unless the gateway reports the session as paid.
    pub async fn confirm(&self, user_id: UserId, session_id: &str) -> Result<Order, CheckoutError> {
        if !is_valid_session_id(session_id) {
            return Err(CheckoutError::SessionNotFound);
        }

        let session = self.stripe.retrieve_checkout_session(session_id).await?;
        if session.payment_status != PaymentStatus::Paid {
            return Err(CheckoutError::PaymentNotCompleted);
        }

        let orders = OrderRepository::new(self.pool);
        if let Some(existing) = orders.find_by_session(&session.id).await? {
            tracing::debug!(order_id = %existing.id, "Checkout already confirmed");
            return owned_by(existing, user_id);
        }

        let metadata = CheckoutMetadata::from_map(&session.metadata)?;
        if metadata.user_id != user_id {
            tracing::warn!(%user_id, owner = %metadata.user_id, "Confirmation of another user's session");
            return Err(CheckoutError::SessionNotFound);
        }

        if let Some(code) = &metadata.coupon_code {
            let redeemed = CouponRepository::new(self.pool)
                .deactivate_by_code(code, metadata.user_id)
                .await?;
            tracing::debug!(%code, redeemed, "Coupon redemption");
        }

        let total = Price::from_minor_units(session.amount_total.unwrap_or(0));
        let order = match orders
            .create(metadata.user_id, &metadata.products, total, &session.id)
            .await
        {
            Ok(order) => order,
            Err(RepositoryError::Conflict(_)) => owned_by(
                orders
                    .find_by_session(&session.id)
                    .await?
                    .ok_or(CheckoutError::SessionNotFound)?,
                user_id,
            )?,
            Err(e) => return Err(e.into()),
        };

        tracing::info!(order_id = %order.id, %user_id, total = %order.total_amount, "Order created");
        Ok(order)
    }
}

/// An already created order, but only to the user who paid for it.
fn owned_by(order: Order, user_id: UserId) -> Result<Order, CheckoutError> {
    if order.user_id == user_id {
        Ok(order)
    } else {
        tracing::warn!(%user_id, owner = %order.user_id, "Confirmation of another user's session");
        Err(CheckoutError::SessionNotFound)
    }
}
