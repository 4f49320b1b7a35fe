//! The canonical 32-field product template and its structural validator.
//!
//! This crate has no I/O and no async: it is a pure function library shared
//! by every other crate in the workspace (storage, transformers, the batch
//! adapter) so that "what a valid canonical record looks like" has exactly
//! one definition.

mod error;
mod field_table;
mod hash;
mod record;
mod validate;

pub use error::{ErrorKind, ModelError, ProcessingError, Severity};
pub use field_table::{field_name_set, FieldKind, PrimKind, FIELD_TABLE};
pub use hash::content_hash;
pub use record::{ensure_complete, new_template, PartialRecord, ProductRecord};
pub use validate::{drift, validate, DriftReport, FieldIssue, ValidateOptions, ValidationReport};

/// The five shop types the engine knows how to process. Kept here, rather
/// than in `proc-transform`, because the Validator and Storage Contract
/// both need to recognize the set independent of transformer wiring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShopType {
    Ah,
    Jumbo,
    Aldi,
    Plus,
    Kruidvat,
}

impl ShopType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShopType::Ah => "ah",
            ShopType::Jumbo => "jumbo",
            ShopType::Aldi => "aldi",
            ShopType::Plus => "plus",
            ShopType::Kruidvat => "kruidvat",
        }
    }

    pub fn all() -> &'static [ShopType] {
        &[
            ShopType::Ah,
            ShopType::Jumbo,
            ShopType::Aldi,
            ShopType::Plus,
            ShopType::Kruidvat,
        ]
    }
}

impl std::str::FromStr for ShopType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ah" => Ok(ShopType::Ah),
            "jumbo" => Ok(ShopType::Jumbo),
            "aldi" => Ok(ShopType::Aldi),
            "plus" => Ok(ShopType::Plus),
            "kruidvat" => Ok(ShopType::Kruidvat),
            other => Err(ModelError::UnknownShopType(other.to_string())),
        }
    }
}

impl std::fmt::Display for ShopType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `unified_id` generation: `<shop>_<external_id>_<schema>`.
pub fn unified_id(shop: &str, external_id: &str, schema_version: &str) -> String {
    format!("{shop}_{external_id}_{schema_version}")
}
