//! Cart domain model.
//!
//! A [`Cart`] is an ordered sequence of [`CartLine`]s, most recently mutated
//! first. Line identity is the composite [`LineKey`] of product and optional
//! condition variant; no two lines ever share a key.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use reloved_core::{Condition, InventoryId, ProductId};

// =============================================================================
// Line Types
// =============================================================================

/// Denormalized catalog fields carried on a line for rendering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineDisplay {
    /// Product display name.
    #[serde(default)]
    pub name: String,
    /// Brand, when the catalog provides one.
    #[serde(default)]
    pub brand: Option<String>,
    /// Canonical image URL (already normalized at ingestion).
    #[serde(default)]
    pub image: Option<String>,
    /// Selling partner's shop name.
    #[serde(default)]
    pub shop_name: Option<String>,
    /// Pre-discount price, for strike-through rendering.
    #[serde(default)]
    pub original_price: Option<Decimal>,
}

/// Identity of a cart line: product plus optional condition variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LineKey {
    pub product_id: ProductId,
    pub condition: Option<Condition>,
}

/// One cart entry for a single product+condition combination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    /// Catalog reference.
    pub product_id: ProductId,
    /// Sellable-unit reference; may equal the product id.
    pub inventory_id: InventoryId,
    /// Always >= 1; a mutation driving it to zero removes the line instead.
    pub quantity: u32,
    pub unit_price: Decimal,
    /// Derived: `unit_price * quantity`. Recomputed on every change, never
    /// set independently.
    pub subtotal: Decimal,
    /// Variant selector; part of line identity.
    pub condition: Option<Condition>,
    /// Timestamp of the last mutation touching this line; drives ordering.
    pub added_at: DateTime<Utc>,
    /// Server-validated availability flag.
    pub is_available: bool,
    #[serde(default)]
    pub display: LineDisplay,
}

impl CartLine {
    /// The composite identity of this line.
    #[must_use]
    pub fn key(&self) -> LineKey {
        LineKey {
            product_id: self.product_id.clone(),
            condition: self.condition.clone(),
        }
    }

    pub(crate) fn recompute_subtotal(&mut self) {
        self.subtotal = self.unit_price * Decimal::from(self.quantity);
    }
}

/// Caller-supplied data for a new line (catalog snapshot at add time).
#[derive(Debug, Clone)]
pub struct LineDraft {
    pub product_id: ProductId,
    pub inventory_id: InventoryId,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub condition: Option<Condition>,
    pub display: LineDisplay,
}

impl LineDraft {
    #[must_use]
    pub fn key(&self) -> LineKey {
        LineKey {
            product_id: self.product_id.clone(),
            condition: self.condition.clone(),
        }
    }

    fn into_line(self, now: DateTime<Utc>) -> CartLine {
        let mut line = CartLine {
            product_id: self.product_id,
            inventory_id: self.inventory_id,
            quantity: self.quantity,
            unit_price: self.unit_price,
            subtotal: Decimal::ZERO,
            condition: self.condition,
            added_at: now,
            is_available: true,
            display: self.display,
        };
        line.recompute_subtotal();
        line
    }
}

// =============================================================================
// Cart
// =============================================================================

/// Outcome of resolving a mutation target by product id and optional
/// condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyLookup {
    Found(LineKey),
    /// No line matches the product (and condition, when given).
    Missing,
    /// Condition omitted but several condition variants of the product are
    /// present; the caller must disambiguate.
    Ambiguous,
}

/// An ordered cart snapshot, most recently mutated line first.
///
/// Serializes as a plain array of lines - the shape of the durable local
/// blob.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    #[must_use]
    pub fn new(lines: Vec<CartLine>) -> Self {
        let mut cart = Self { lines };
        cart.normalize_order();
        cart
    }

    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Sum of line quantities.
    #[must_use]
    pub fn total_quantity(&self) -> u32 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    /// Sum of line subtotals.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.lines.iter().map(|l| l.subtotal).sum()
    }

    #[must_use]
    pub fn find(&self, key: &LineKey) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.key() == *key)
    }

    fn position(&self, key: &LineKey) -> Option<usize> {
        self.lines.iter().position(|l| l.key() == *key)
    }

    /// Resolve a mutation target. With `condition` given, only an exact
    /// `(product_id, condition)` match counts. Without it, the product id
    /// alone must identify a single line.
    #[must_use]
    pub fn lookup_key(
        &self,
        product_id: &ProductId,
        condition: Option<&Condition>,
    ) -> KeyLookup {
        if let Some(cond) = condition {
            let key = LineKey {
                product_id: product_id.clone(),
                condition: Some(cond.clone()),
            };
            if self.position(&key).is_some() {
                KeyLookup::Found(key)
            } else {
                KeyLookup::Missing
            }
        } else {
            let mut matches = self.lines.iter().filter(|l| &l.product_id == product_id);
            match (matches.next(), matches.next()) {
                (None, _) => KeyLookup::Missing,
                (Some(line), None) => KeyLookup::Found(line.key()),
                (Some(_), Some(_)) => KeyLookup::Ambiguous,
            }
        }
    }

    /// Merge the draft into an existing line with the same key (increment
    /// quantity, refresh `added_at`, move to index 0) or prepend a new line.
    pub fn merge_or_prepend(&mut self, draft: LineDraft, now: DateTime<Utc>) {
        let key = draft.key();
        if let Some(pos) = self.position(&key) {
            let mut line = self.lines.remove(pos);
            line.quantity = line.quantity.saturating_add(draft.quantity);
            line.recompute_subtotal();
            line.added_at = now;
            self.lines.insert(0, line);
        } else {
            self.lines.insert(0, draft.into_line(now));
        }
    }

    /// Set a line's quantity, refresh `added_at`, and move it to index 0.
    /// Returns false when the key is absent.
    pub fn set_quantity(&mut self, key: &LineKey, quantity: u32, now: DateTime<Utc>) -> bool {
        let Some(pos) = self.position(key) else {
            return false;
        };
        let mut line = self.lines.remove(pos);
        line.quantity = quantity;
        line.recompute_subtotal();
        line.added_at = now;
        self.lines.insert(0, line);
        true
    }

    /// Remove the line with the given key, returning it.
    pub fn remove(&mut self, key: &LineKey) -> Option<CartLine> {
        let pos = self.position(key)?;
        Some(self.lines.remove(pos))
    }

    /// Empty the cart, returning the removed lines in their prior order.
    pub fn drain_lines(&mut self) -> Vec<CartLine> {
        std::mem::take(&mut self.lines)
    }

    /// Restore the recency ordering (most recent first). Used after adopting
    /// a server cart, whose wire order is unspecified.
    pub fn normalize_order(&mut self) {
        self.lines.sort_by(|a, b| b.added_at.cmp(&a.added_at));
    }
}
