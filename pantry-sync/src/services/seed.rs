//! Starter catalog for a fresh local install

use shared::{ItemCandidate, PantryItem};

/// (name, quantity, unit, category)
const STARTER_ITEMS: &[(&str, u32, &str, &str)] = &[
    ("Mineral Water", 24, "bottle", "Beverages"),
    ("Coffee", 20, "cup", "Beverages"),
    ("Green Tea", 30, "cup", "Beverages"),
    ("Orange Juice", 12, "bottle", "Beverages"),
    ("Cola", 18, "can", "Beverages"),
    ("Potato Chips", 15, "pack", "Snacks"),
    ("Chocolate Bar", 20, "piece", "Snacks"),
    ("Mixed Nuts", 10, "pack", "Snacks"),
    ("Croissant", 8, "piece", "Breakfast"),
    ("Cereal", 10, "cup", "Breakfast"),
    ("Instant Noodles", 12, "cup", "Meals"),
    ("Club Sandwich", 6, "plate", "Meals"),
    ("Toothbrush", 10, "piece", "Toiletries"),
    ("Shampoo", 8, "bottle", "Toiletries"),
];

/// Fresh catalog entries (new ids, added now)
pub fn starter_catalog() -> Vec<PantryItem> {
    STARTER_ITEMS
        .iter()
        .map(|(name, quantity, unit, category)| {
            PantryItem::from_candidate(
                ItemCandidate::new(*name, *quantity, *unit).with_category(*category),
            )
        })
        .collect()
}
