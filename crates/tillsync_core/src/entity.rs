//! Entity kinds, typed payloads, and natural-key derivation.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The business entity types the sync engine knows about.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum EntityKind {
    /// A salesperson attached to a branch.
    Seller,
    /// A stocked product.
    Product,
    /// A customer account.
    Customer,
    /// A completed sale.
    Sale,
}

impl EntityKind {
    /// All entity kinds, in reconciliation order.
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Seller,
        EntityKind::Product,
        EntityKind::Customer,
        EntityKind::Sale,
    ];

    /// Returns the stable name used in storage and logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Seller => "seller",
            EntityKind::Product => "product",
            EntityKind::Customer => "customer",
            EntityKind::Sale => "sale",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "seller" => Ok(EntityKind::Seller),
            "product" => Ok(EntityKind::Product),
            "customer" => Ok(EntityKind::Customer),
            "sale" => Ok(EntityKind::Sale),
            other => Err(CoreError::UnknownEntityKind(other.to_owned())),
        }
    }
}

/// Stable business identity used to match records across id spaces.
///
/// Natural keys are derived, never stored as authoritative state: the
/// same payload always yields the same key on every device, which is
/// what lets two records created independently be recognized as one.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NaturalKey(String);

impl NaturalKey {
    /// Builds a key from its parts: trimmed, lowercased, joined by `_`.
    #[must_use]
    pub fn from_parts(parts: &[&str]) -> Self {
        let joined = parts
            .iter()
            .map(|p| p.trim().to_lowercase().replace(' ', "-"))
            .collect::<Vec<_>>()
            .join("_");
        Self(joined)
    }

    /// Returns the normalized key string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NaturalKey({})", self.0)
    }
}

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Seller fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SellerFields {
    /// Display name.
    pub name: String,
    /// Branch the seller works at.
    pub branch: String,
    /// Contact phone number.
    pub phone: Option<String>,
    /// Whether the seller is active.
    pub active: bool,
}

/// Product fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductFields {
    /// Product name.
    pub name: String,
    /// Branch carrying the product.
    pub branch: String,
    /// Unit price in cents.
    pub price_cents: i64,
    /// Units on hand.
    pub stock: i64,
}

/// Customer fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerFields {
    /// Display name.
    pub name: String,
    /// Contact phone number; part of the customer's identity.
    pub phone: String,
    /// Accumulated loyalty points.
    pub loyalty_points: i64,
}

/// Sale fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleFields {
    /// Receipt number printed at the till.
    pub receipt_number: String,
    /// Branch the sale happened at.
    pub branch: String,
    /// Sale total in cents.
    pub total_cents: i64,
    /// Name of the seller who rang it up.
    pub seller_name: String,
}

/// Typed payload per entity kind, sharing the record envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntityPayload {
    /// Seller payload.
    Seller(SellerFields),
    /// Product payload.
    Product(ProductFields),
    /// Customer payload.
    Customer(CustomerFields),
    /// Sale payload.
    Sale(SaleFields),
}

impl EntityPayload {
    /// Returns the entity kind of this payload.
    #[must_use]
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityPayload::Seller(_) => EntityKind::Seller,
            EntityPayload::Product(_) => EntityKind::Product,
            EntityPayload::Customer(_) => EntityKind::Customer,
            EntityPayload::Sale(_) => EntityKind::Sale,
        }
    }

    /// Derives the natural key for this payload.
    ///
    /// Pure per-kind function: sellers and products key on name+branch,
    /// customers on name+phone, sales on receipt+branch.
    #[must_use]
    pub fn natural_key(&self) -> NaturalKey {
        match self {
            EntityPayload::Seller(s) => NaturalKey::from_parts(&[&s.name, &s.branch]),
            EntityPayload::Product(p) => NaturalKey::from_parts(&[&p.name, &p.branch]),
            EntityPayload::Customer(c) => NaturalKey::from_parts(&[&c.name, &c.phone]),
            EntityPayload::Sale(s) => NaturalKey::from_parts(&[&s.receipt_number, &s.branch]),
        }
    }

    /// Human-readable label, used by tombstones for "X was deleted".
    #[must_use]
    pub fn display_label(&self) -> String {
        match self {
            EntityPayload::Seller(s) => s.name.clone(),
            EntityPayload::Product(p) => p.name.clone(),
            EntityPayload::Customer(c) => c.name.clone(),
            EntityPayload::Sale(s) => format!("receipt {}", s.receipt_number),
        }
    }

    /// Branch scope of the payload, if it has one.
    #[must_use]
    pub fn branch(&self) -> Option<&str> {
        match self {
            EntityPayload::Seller(s) => Some(&s.branch),
            EntityPayload::Product(p) => Some(&p.branch),
            EntityPayload::Customer(_) => None,
            EntityPayload::Sale(s) => Some(&s.branch),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seller(name: &str, branch: &str) -> EntityPayload {
        EntityPayload::Seller(SellerFields {
            name: name.into(),
            branch: branch.into(),
            phone: None,
            active: true,
        })
    }

    #[test]
    fn kind_round_trips_through_str() {
        for kind in EntityKind::ALL {
            assert_eq!(kind.as_str().parse::<EntityKind>().unwrap(), kind);
        }
        assert!("warehouse".parse::<EntityKind>().is_err());
    }

    #[test]
    fn natural_key_is_normalized() {
        let key = seller(" Alice ", "Main Branch").natural_key();
        assert_eq!(key.as_str(), "alice_main-branch");
    }

    #[test]
    fn natural_key_matches_across_devices() {
        // Same business identity typed on two devices must collide.
        assert_eq!(
            seller("Alice", "downtown").natural_key(),
            seller("alice", "Downtown").natural_key()
        );
        assert_ne!(
            seller("Alice", "downtown").natural_key(),
            seller("Alice", "uptown").natural_key()
        );
    }

    #[test]
    fn payload_kind_and_label() {
        let payload = EntityPayload::Sale(SaleFields {
            receipt_number: "R-100".into(),
            branch: "downtown".into(),
            total_cents: 1250,
            seller_name: "Alice".into(),
        });
        assert_eq!(payload.kind(), EntityKind::Sale);
        assert_eq!(payload.display_label(), "receipt R-100");
        assert_eq!(payload.branch(), Some("downtown"));
    }

    #[test]
    fn payload_serde_round_trip() {
        let payload = seller("Alice", "downtown");
        let json = serde_json::to_string(&payload).unwrap();
        let back: EntityPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(back, payload);
    }
}
