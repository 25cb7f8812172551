//! Cart lines embedded on the user record.
//!
//! A [`Cart`] never stores a line with zero units: setting a quantity to zero
//! removes the line instead.

use serde::{Deserialize, Serialize};

use super::id::ProductId;

/// Errors that can occur when constructing a [`Quantity`].
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("quantity must be at least 1")]
pub struct QuantityError;

/// A number of units, always `>= 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Quantity(u32);

impl Quantity {
    /// A single unit.
    pub const ONE: Self = Self(1);

    /// Create a quantity.
    ///
    /// # Errors
    ///
    /// Returns [`QuantityError`] for zero.
    pub const fn new(units: u32) -> Result<Self, QuantityError> {
        if units == 0 {
            return Err(QuantityError);
        }
        Ok(Self(units))
    }

    /// The number of units.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// One more unit, saturating at `u32::MAX`.
    #[must_use]
    pub const fn incremented(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl TryFrom<u32> for Quantity {
    type Error = QuantityError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quantity> for u32 {
    fn from(quantity: Quantity) -> Self {
        quantity.0
    }
}

/// One product reference in a cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    /// Referenced product.
    pub product_id: ProductId,
    /// Units of the product.
    pub quantity: Quantity,
}

/// Errors returned by cart mutations.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartError {
    /// The cart has no line for the product.
    #[error("product {0} is not in the cart")]
    LineNotFound(ProductId),
}

/// A user's cart: an ordered list of lines, at most one per product.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    /// Create an empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { lines: Vec::new() }
    }

    /// Build a cart from stored lines, merging duplicates.
    #[must_use]
    pub fn from_lines(lines: impl IntoIterator<Item = CartLine>) -> Self {
        let mut cart = Self::new();
        for line in lines {
            match cart.line_mut(line.product_id) {
                Some(existing) => {
                    existing.quantity = Quantity(
                        existing.quantity.get().saturating_add(line.quantity.get()),
                    );
                }
                None => cart.lines.push(line),
            }
        }
        cart
    }

    /// The lines in insertion order.
    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Quantity held for `product_id`, if any.
    #[must_use]
    pub fn quantity_of(&self, product_id: ProductId) -> Option<Quantity> {
        self.lines
            .iter()
            .find(|line| line.product_id == product_id)
            .map(|line| line.quantity)
    }

    /// Product IDs referenced by the cart.
    #[must_use]
    pub fn product_ids(&self) -> Vec<ProductId> {
        self.lines.iter().map(|line| line.product_id).collect()
    }

    /// Add one unit of `product_id`, appending a new line if needed.
    pub fn add(&mut self, product_id: ProductId) {
        match self.line_mut(product_id) {
            Some(line) => line.quantity = line.quantity.incremented(),
            None => self.lines.push(CartLine {
                product_id,
                quantity: Quantity::ONE,
            }),
        }
    }

    /// Overwrite the quantity of an existing line; zero removes it.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::LineNotFound`] if the product is not in the cart.
    pub fn set_quantity(&mut self, product_id: ProductId, units: u32) -> Result<(), CartError> {
        let Some(line) = self.line_mut(product_id) else {
            return Err(CartError::LineNotFound(product_id));
        };

        match Quantity::new(units) {
            Ok(quantity) => line.quantity = quantity,
            Err(QuantityError) => self.remove(product_id),
        }
        Ok(())
    }

    /// Remove the line for `product_id` if present.
    pub fn remove(&mut self, product_id: ProductId) {
        self.lines.retain(|line| line.product_id != product_id);
    }

    /// Remove every line.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    fn line_mut(&mut self, product_id: ProductId) -> Option<&mut CartLine> {
        self.lines
            .iter_mut()
            .find(|line| line.product_id == product_id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const P1: ProductId = ProductId::new(1);
    const P2: ProductId = ProductId::new(2);

    #[test]
    fn test_add_twice_gives_quantity_two() {
        let mut cart = Cart::new();
        cart.add(P1);
        cart.add(P1);
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.quantity_of(P1), Some(Quantity::new(2).unwrap()));
    }

    #[test]
    fn test_set_quantity_zero_removes_line() {
        let mut cart = Cart::new();
        cart.add(P1);
        cart.add(P2);
        cart.set_quantity(P1, 0).unwrap();
        assert_eq!(cart.quantity_of(P1), None);
        assert_eq!(cart.product_ids(), vec![P2]);
    }

    #[test]
    fn test_set_quantity_overwrites() {
        let mut cart = Cart::new();
        cart.add(P1);
        cart.set_quantity(P1, 7).unwrap();
        assert_eq!(cart.quantity_of(P1).map(Quantity::get), Some(7));
    }

    #[test]
    fn test_set_quantity_missing_line() {
        let mut cart = Cart::new();
        assert_eq!(cart.set_quantity(P1, 3), Err(CartError::LineNotFound(P1)));
    }

    #[test]
    fn test_clear_and_remove() {
        let mut cart = Cart::new();
        cart.add(P1);
        cart.add(P2);
        cart.remove(P1);
        assert_eq!(cart.product_ids(), vec![P2]);
        cart.clear();
        assert!(cart.is_empty());
    }

    #[test]
    fn test_from_lines_merges_duplicates() {
        let cart = Cart::from_lines([
            CartLine { product_id: P1, quantity: Quantity::ONE },
            CartLine { product_id: P1, quantity: Quantity::new(2).unwrap() },
        ]);
        assert_eq!(cart.quantity_of(P1).map(Quantity::get), Some(3));
    }

    #[test]
    fn test_stored_zero_quantity_is_rejected() {
        let json = r#"[{"productId": 1, "quantity": 0}]"#;
        assert!(serde_json::from_str::<Cart>(json).is_err());

        let json = r#"[{"productId": 1, "quantity": 4}]"#;
        let cart: Cart = serde_json::from_str(json).unwrap();
        assert_eq!(cart.quantity_of(P1).map(Quantity::get), Some(4));
    }
}
