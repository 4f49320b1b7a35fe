//! The static 32-field schema table (spec.md §3.1) and its O(1) presence index.

use std::collections::HashSet;
use std::sync::OnceLock;

/// A leaf primitive. Arrays, objects and functions are never valid at leaf
/// positions (spec.md §4.1's algorithmic contract).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimKind {
    Str,
    Num,
    Bool,
}

/// One of the six type-compatibility cells from spec.md §4.1:
/// `string | number | boolean | string|null | number? | string? | boolean?`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Required: must be present, typed, never null.
    Required(PrimKind),
    /// Nullable: must be present, either typed or explicitly `null`.
    Nullable(PrimKind),
    /// Optional: may be absent entirely, or present-and-typed. Never `null`.
    Optional(PrimKind),
}

impl FieldKind {
    pub fn prim(&self) -> PrimKind {
        match self {
            FieldKind::Required(p) | FieldKind::Nullable(p) | FieldKind::Optional(p) => *p,
        }
    }

    pub fn is_optional(&self) -> bool {
        matches!(self, FieldKind::Optional(_))
    }

    pub fn is_nullable(&self) -> bool {
        matches!(self, FieldKind::Nullable(_))
    }
}

use FieldKind::{Nullable as N, Optional as O, Required as R};
use PrimKind::{Bool as B, Num, Str};

/// The canonical record's 32 fields, in the taxonomy order of spec.md §3.1.
/// This slice is the single source of truth for validation, drift reporting
/// and default construction.
pub const FIELD_TABLE: &[(&str, FieldKind)] = &[
    ("unified_id", R(Str)),
    ("shop_type", R(Str)),
    ("title", R(Str)),
    ("main_category", N(Str)),
    ("brand", R(Str)),
    ("image_url", R(Str)),
    ("sales_unit_size", R(Str)),
    ("quantity_amount", R(Num)),
    ("quantity_unit", R(Str)),
    ("default_quantity_amount", O(Num)),
    ("default_quantity_unit", O(Str)),
    ("price_before_bonus", R(Num)),
    ("current_price", R(Num)),
    ("unit_price", O(Num)),
    ("unit_price_unit", O(Str)),
    ("is_promotion", R(B)),
    ("promotion_type", R(Str)),
    ("promotion_mechanism", R(Str)),
    ("promotion_start_date", N(Str)),
    ("promotion_end_date", N(Str)),
    ("parsed_promotion_effective_unit_price", O(Num)),
    ("parsed_promotion_required_quantity", O(Num)),
    ("parsed_promotion_total_price", O(Num)),
    ("parsed_promotion_is_multi_purchase_required", O(B)),
    ("normalized_quantity_amount", O(Num)),
    ("normalized_quantity_unit", O(Str)),
    ("conversion_factor", O(Num)),
    ("price_per_standard_unit", O(Num)),
    ("current_price_per_standard_unit", O(Num)),
    ("discount_absolute", O(Num)),
    ("discount_percentage", O(Num)),
    ("is_active", R(B)),
];

/// Field names, same order as `FIELD_TABLE`.
pub fn field_names() -> impl Iterator<Item = &'static str> {
    FIELD_TABLE.iter().map(|(name, _)| *name)
}

/// Lazily-built set of all 32 field names, for O(1) membership checks.
pub fn field_name_set() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| field_names().collect())
}

pub fn field_kind_of(name: &str) -> Option<FieldKind> {
    FIELD_TABLE
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, k)| *k)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_has_exactly_32_fields() {
        assert_eq!(FIELD_TABLE.len(), 32);
    }

    #[test]
    fn names_are_unique() {
        let names: HashSet<_> = field_names().collect();
        assert_eq!(names.len(), 32);
    }

    #[test]
    fn is_promotion_none_are_both_required_booleans() {
        assert_eq!(field_kind_of("is_promotion"), Some(R(B)));
        assert_eq!(field_kind_of("promotion_type"), Some(R(Str)));
    }
}
