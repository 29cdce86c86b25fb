//! Common types used across the platform

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The two concrete kinds of stocked item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    /// Bahan baku, bought from suppliers
    RawMaterial,
    /// Produk, made in-house through production assignments
    Product,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::RawMaterial => "raw_material",
            ItemKind::Product => "product",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "raw_material" => Some(ItemKind::RawMaterial),
            "product" => Some(ItemKind::Product),
            _ => None,
        }
    }

    /// Table holding items of this kind
    pub fn table_name(&self) -> &'static str {
        match self {
            ItemKind::RawMaterial => "raw_materials",
            ItemKind::Product => "products",
        }
    }
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemKind::RawMaterial => write!(f, "Raw Material"),
            ItemKind::Product => write!(f, "Product"),
        }
    }
}

/// Weak reference to an item: kind tag plus identifier, lookup only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemRef {
    pub kind: ItemKind,
    pub id: Uuid,
}

impl ItemRef {
    pub fn new(kind: ItemKind, id: Uuid) -> Self {
        Self { kind, id }
    }

    pub fn raw_material(id: Uuid) -> Self {
        Self::new(ItemKind::RawMaterial, id)
    }

    pub fn product(id: Uuid) -> Self {
        Self::new(ItemKind::Product, id)
    }
}

impl std::fmt::Display for ItemRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.id)
    }
}

/// Pagination parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
}

impl Pagination {
    pub fn offset(&self) -> i64 {
        (self.page.saturating_sub(1) as i64) * self.per_page as i64
    }

    pub fn limit(&self) -> i64 {
        self.per_page as i64
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 20,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_kind_round_trip_names() {
        assert_eq!(ItemKind::parse("raw_material"), Some(ItemKind::RawMaterial));
        assert_eq!(ItemKind::parse("product"), Some(ItemKind::Product));
        assert_eq!(ItemKind::parse("service"), None);
        assert_eq!(ItemKind::RawMaterial.table_name(), "raw_materials");
        assert_eq!(ItemKind::Product.table_name(), "products");
    }

    #[test]
    fn test_pagination_offset() {
        let page = Pagination { page: 3, per_page: 20 };
        assert_eq!(page.offset(), 40);
        assert_eq!(Pagination { page: 0, per_page: 20 }.offset(), 0);
    }
}
