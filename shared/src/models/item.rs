//! Pantry Item Model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::util::{new_id, normalize_key, now};

/// Unit of measure (known units or free-form text)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Unit {
    #[default]
    Piece,
    Pack,
    Bottle,
    Can,
    Cup,
    Plate,
    Custom(String),
}

impl Unit {
    pub fn as_str(&self) -> &str {
        match self {
            Unit::Piece => "piece",
            Unit::Pack => "pack",
            Unit::Bottle => "bottle",
            Unit::Can => "can",
            Unit::Cup => "cup",
            Unit::Plate => "plate",
            Unit::Custom(s) => s.as_str(),
        }
    }
}

impl From<String> for Unit {
    fn from(value: String) -> Self {
        match normalize_key(&value).as_str() {
            "piece" => Unit::Piece,
            "pack" => Unit::Pack,
            "bottle" => Unit::Bottle,
            "can" => Unit::Can,
            "cup" => Unit::Cup,
            "plate" => Unit::Plate,
            _ => Unit::Custom(value.trim().to_string()),
        }
    }
}

impl From<&str> for Unit {
    fn from(value: &str) -> Self {
        Unit::from(value.to_string())
    }
}

impl From<Unit> for String {
    fn from(value: Unit) -> Self {
        match value {
            Unit::Custom(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Catalog classification (known categories or free-form text)
///
/// `Other` is the default; merge-add never overwrites an existing category
/// with `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Category {
    Beverages,
    Snacks,
    Breakfast,
    Meals,
    Toiletries,
    #[default]
    Other,
    Custom(String),
}

impl Category {
    pub fn as_str(&self) -> &str {
        match self {
            Category::Beverages => "Beverages",
            Category::Snacks => "Snacks",
            Category::Breakfast => "Breakfast",
            Category::Meals => "Meals",
            Category::Toiletries => "Toiletries",
            Category::Other => "Other",
            Category::Custom(s) => s.as_str(),
        }
    }

    pub fn is_default(&self) -> bool {
        matches!(self, Category::Other)
    }
}

impl From<String> for Category {
    fn from(value: String) -> Self {
        match normalize_key(&value).as_str() {
            "beverages" => Category::Beverages,
            "snacks" => Category::Snacks,
            "breakfast" => Category::Breakfast,
            "meals" => Category::Meals,
            "toiletries" => Category::Toiletries,
            "other" | "" => Category::Other,
            _ => Category::Custom(value.trim().to_string()),
        }
    }
}

impl From<&str> for Category {
    fn from(value: &str) -> Self {
        Category::from(value.to_string())
    }
}

impl From<Category> for String {
    fn from(value: Category) -> Self {
        match value {
            Category::Custom(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Catalog entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PantryItem {
    pub id: String,
    pub name: String,
    /// Available stock
    pub quantity: u32,
    pub unit: Unit,
    #[serde(default)]
    pub category: Category,
    pub added_date: DateTime<Utc>,
    /// Informational only, never enforced
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl PantryItem {
    /// Create a new catalog entry from a candidate (fresh id, added now)
    pub fn from_candidate(candidate: ItemCandidate) -> Self {
        Self {
            id: new_id(),
            name: candidate.name.trim().to_string(),
            quantity: candidate.quantity,
            unit: candidate.unit,
            category: candidate.category,
            added_date: now(),
            expiry_date: candidate.expiry_date,
            notes: candidate.notes,
            image_url: candidate.image_url,
        }
    }

    /// Normalized `(name, unit)` pair
    pub fn dedup_key(&self) -> (String, String) {
        (normalize_key(&self.name), normalize_key(self.unit.as_str()))
    }

    /// Whether this item collides with the candidate's normalized `(name, unit)`
    pub fn matches(&self, candidate: &ItemCandidate) -> bool {
        self.dedup_key() == candidate.dedup_key()
    }

    /// `0 < quantity <= threshold`. Zero stock is "out of stock", not "low".
    pub fn is_low_stock(&self, threshold: u32) -> bool {
        self.quantity > 0 && self.quantity <= threshold
    }

    pub fn is_out_of_stock(&self) -> bool {
        self.quantity == 0
    }
}

/// Add-or-restock payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemCandidate {
    pub name: String,
    pub quantity: u32,
    pub unit: Unit,
    #[serde(default)]
    pub category: Category,
    #[serde(default)]
    pub expiry_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl ItemCandidate {
    pub fn new(name: impl Into<String>, quantity: u32, unit: impl Into<Unit>) -> Self {
        Self {
            name: name.into(),
            quantity,
            unit: unit.into(),
            category: Category::Other,
            expiry_date: None,
            notes: None,
            image_url: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<Category>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_expiry_date(mut self, expiry_date: DateTime<Utc>) -> Self {
        self.expiry_date = Some(expiry_date);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_image_url(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = Some(image_url.into());
        self
    }

    pub fn dedup_key(&self) -> (String, String) {
        (normalize_key(&self.name), normalize_key(self.unit.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_parse_known_and_custom() {
        assert_eq!(Unit::from("Cup"), Unit::Cup);
        assert_eq!(Unit::from(" bottle "), Unit::Bottle);
        assert_eq!(Unit::from("Box"), Unit::Custom("Box".to_string()));
        assert_eq!(String::from(Unit::Custom("Box".to_string())), "Box");
    }

    #[test]
    fn test_category_default_and_custom() {
        assert!(Category::default().is_default());
        assert_eq!(Category::from("beverages"), Category::Beverages);
        assert_eq!(Category::from(""), Category::Other);
        assert_eq!(
            Category::from("Minibar"),
            Category::Custom("Minibar".to_string())
        );
    }

    #[test]
    fn test_item_json_shape() {
        let item = PantryItem::from_candidate(
            ItemCandidate::new("Coffee", 5, Unit::Cup).with_category(Category::Beverages),
        );
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["unit"], "cup");
        assert_eq!(json["category"], "Beverages");
        assert!(json.get("addedDate").is_some());
        assert!(json.get("expiryDate").is_none());

        let back: PantryItem = serde_json::from_value(json).unwrap();
        assert_eq!(back, item);
    }

    #[test]
    fn test_missing_category_defaults_to_other() {
        let json = serde_json::json!({
            "id": "a",
            "name": "Tea",
            "quantity": 3,
            "unit": "cup",
            "addedDate": "2026-01-01T00:00:00Z"
        });
        let item: PantryItem = serde_json::from_value(json).unwrap();
        assert_eq!(item.category, Category::Other);
    }

    #[test]
    fn test_dedup_key_is_case_and_whitespace_insensitive() {
        let item = PantryItem::from_candidate(ItemCandidate::new("Coffee", 5, "cup"));
        assert!(item.matches(&ItemCandidate::new("  coffee ", 1, "Cup")));
        assert!(!item.matches(&ItemCandidate::new("coffee", 1, "pack")));
    }

    #[test]
    fn test_stock_predicates() {
        let mut item = PantryItem::from_candidate(ItemCandidate::new("Tea", 0, "cup"));
        assert!(item.is_out_of_stock());
        assert!(!item.is_low_stock(10));
        item.quantity = 10;
        assert!(item.is_low_stock(10));
        item.quantity = 11;
        assert!(!item.is_low_stock(10));
    }
}
