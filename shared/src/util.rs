use chrono::{DateTime, Utc};

/// 获取当前 UTC 时间
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Generate an opaque resource id (UUID v4, hyphenated).
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Dedup key normalization: trim + lowercase.
///
/// Used for item names and units so that `" Coffee "` and `"coffee"` collide.
pub fn normalize_key(value: &str) -> String {
    value.trim().to_lowercase()
}
