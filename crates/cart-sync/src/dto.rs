//! Wire types for the marketplace cart API.
//!
//! The API is loosely typed in places (notably `images`, which arrives
//! either as an array of URLs or as an object with `main`/`gallery`/
//! `thumbnail`). Everything is normalized here, at the ingestion boundary,
//! so internal logic never re-inspects wire shapes.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use reloved_core::{Condition, InventoryId, ProductId};

use crate::cart::{Cart, CartLine, LineDisplay};

// =============================================================================
// Responses
// =============================================================================

/// Body of `GET /cart` and `POST /cart`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartPayload {
    #[serde(default)]
    pub cart: Vec<CartLineDto>,
    /// Server-computed grand total; advisory, the engine recomputes.
    #[serde(default)]
    pub total: Option<Decimal>,
}

/// One cart line as the server sends it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineDto {
    pub product_id: ProductId,
    #[serde(default)]
    pub inventory_id: Option<InventoryId>,
    pub quantity: u32,
    pub price: Decimal,
    #[serde(default)]
    pub original_price: Option<Decimal>,
    #[serde(default)]
    pub subtotal: Option<Decimal>,
    #[serde(default)]
    pub product: Option<ProductInfoDto>,
    #[serde(default)]
    pub partner: Option<PartnerDto>,
    #[serde(default = "default_true")]
    pub is_available: bool,
    #[serde(default)]
    pub added_at: Option<DateTime<Utc>>,
}

/// Denormalized catalog data embedded in a line.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductInfoDto {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub images: Option<ImageSet>,
    #[serde(default)]
    pub condition: Option<Condition>,
    /// Some endpoints call the variant selector `variant` instead of
    /// `condition`.
    #[serde(default)]
    pub variant: Option<Condition>,
}

/// Selling partner data embedded in a line.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerDto {
    #[serde(default)]
    pub shop_name: Option<String>,
}

/// Product images as the server sends them: either a bare URL array or a
/// keyed object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ImageSet {
    List(Vec<String>),
    Keyed {
        #[serde(default)]
        main: Option<String>,
        #[serde(default)]
        gallery: Vec<String>,
        #[serde(default)]
        thumbnail: Option<String>,
    },
}

impl ImageSet {
    /// The one canonical URL internal logic gets to see.
    #[must_use]
    pub fn canonical_url(&self) -> Option<&str> {
        match self {
            Self::List(urls) => urls.first().map(String::as_str),
            Self::Keyed {
                main,
                gallery,
                thumbnail,
            } => main
                .as_deref()
                .or_else(|| gallery.first().map(String::as_str))
                .or(thumbnail.as_deref()),
        }
    }
}

const fn default_true() -> bool {
    true
}

// =============================================================================
// Requests
// =============================================================================

/// Body of `POST /cart`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddItemRequest {
    pub product_id: ProductId,
    pub quantity: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_condition: Option<Condition>,
}

/// Body of `PUT /cart/{productId}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateQuantityRequest {
    pub quantity: u32,
}

// =============================================================================
// Ingestion
// =============================================================================

impl From<CartLineDto> for CartLine {
    fn from(dto: CartLineDto) -> Self {
        let product = dto.product.unwrap_or_default();
        let display = LineDisplay {
            name: product
                .name
                .or(product.model)
                .unwrap_or_default(),
            brand: product.brand,
            image: product
                .images
                .as_ref()
                .and_then(ImageSet::canonical_url)
                .map(str::to_string),
            shop_name: dto.partner.and_then(|p| p.shop_name),
            original_price: dto.original_price,
        };

        let mut line = Self {
            inventory_id: dto
                .inventory_id
                .unwrap_or_else(|| InventoryId::new(dto.product_id.as_str())),
            product_id: dto.product_id,
            quantity: dto.quantity,
            unit_price: dto.price,
            // The wire `subtotal` is advisory; the derived invariant wins.
            subtotal: Decimal::ZERO,
            condition: product.condition.or(product.variant),
            added_at: dto.added_at.unwrap_or_else(Utc::now),
            is_available: dto.is_available,
            display,
        };
        line.recompute_subtotal();
        line
    }
}

/// Convert a server payload into a domain cart, most recent line first.
#[must_use]
pub fn ingest_cart(payload: CartPayload) -> Cart {
    Cart::new(payload.cart.into_iter().map(CartLine::from).collect())
}
