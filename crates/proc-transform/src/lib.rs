//! Per-shop raw-to-canonical transformers (spec.md §4.2).
//!
//! A transformer never throws to signal a recoverable condition: it returns
//! a [`TransformOutcome`], a tagged `Ok`/`Err` the caller can match on
//! without `catch`-style control flow.

mod ah;
mod aldi;
mod common;
mod jumbo;
mod kruidvat;
mod plus;

use proc_model::{ErrorKind, ProductRecord, ShopType};
use serde_json::Value;
use std::collections::HashMap;

/// A transformer's result: either a complete canonical record plus the
/// shop-native external id it was built from, or a typed, non-fatal error.
#[derive(Debug, Clone)]
pub enum TransformOutcome {
    Ok {
        record: ProductRecord,
        external_id: String,
    },
    Err(TransformError),
}

/// A recoverable per-row transformation failure (spec.md §4.2, §7
/// `TRANSFORMATION_ERROR` / `VALIDATION_ERROR`).
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct TransformError {
    pub kind: ErrorKind,
    pub message: String,
    pub severity: proc_model::Severity,
}

impl TransformError {
    fn validation(message: impl Into<String>, required_field_missing: bool) -> Self {
        let kind = ErrorKind::ValidationError;
        TransformError {
            severity: kind.severity(required_field_missing),
            kind,
            message: message.into(),
        }
    }
}

/// `(rawRow) → Record` (spec.md §4.2). Implementors map a shop's raw
/// payload onto the canonical template and extract `external_id`.
pub trait Transformer: Send + Sync {
    fn shop_type(&self) -> ShopType;

    /// Extract the shop-native external id from `raw_data` (first
    /// non-empty key wins, per the per-shop table in spec.md §4.2).
    fn extract_external_id(&self, raw_data: &Value) -> Option<String>;

    /// Map `raw_data` onto the canonical template.
    fn transform(&self, raw_data: &Value, schema_version: &str) -> TransformOutcome;
}

/// Looks up the first non-empty string value among `keys`, in order, on a
/// JSON object. Shared by every per-shop module's `extract_external_id`.
fn first_non_empty(obj: &serde_json::Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match obj.get(*key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Trait-object registry of one transformer per shop, built once at
/// startup (spec.md §4.2's "`Transformer` trait object registry").
pub struct Registry(HashMap<ShopType, Box<dyn Transformer>>);

impl Default for Registry {
    fn default() -> Self {
        let mut map: HashMap<ShopType, Box<dyn Transformer>> = HashMap::new();
        map.insert(ShopType::Ah, Box::new(ah::AhTransformer));
        map.insert(ShopType::Jumbo, Box::new(jumbo::JumboTransformer));
        map.insert(ShopType::Aldi, Box::new(aldi::AldiTransformer));
        map.insert(ShopType::Plus, Box::new(plus::PlusTransformer));
        map.insert(ShopType::Kruidvat, Box::new(kruidvat::KruidvatTransformer));
        Registry(map)
    }
}

impl Registry {
    /// Resolve the transformer for `shop`. A missing shop is a fatal
    /// initialization error (spec.md §4.4 step 1), not a per-row outcome,
    /// so this returns `Option` rather than `TransformOutcome`.
    pub fn get(&self, shop: ShopType) -> Option<&dyn Transformer> {
        self.0.get(&shop).map(|b| b.as_ref())
    }

    /// Builds a registry with a single shop bound to an arbitrary
    /// transformer, bypassing the production `ah`/`jumbo`/`aldi`/`plus`/
    /// `kruidvat` set. Used by `proc-engine`'s batch adapter tests to
    /// exercise paths (e.g. structural non-compliance) the real
    /// transformers can't produce by construction.
    pub fn single(shop: ShopType, transformer: Box<dyn Transformer>) -> Self {
        let mut map: HashMap<ShopType, Box<dyn Transformer>> = HashMap::new();
        map.insert(shop, transformer);
        Registry(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_has_one_transformer_per_shop() {
        let registry = Registry::default();
        for shop in ShopType::all() {
            assert!(registry.get(*shop).is_some(), "missing transformer for {shop}");
        }
    }
}
