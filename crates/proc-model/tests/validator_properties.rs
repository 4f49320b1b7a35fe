//! Property-based tests for the structural validator (spec.md §8 properties
//! 1 and 6). Runs against `new_template`/`validate` directly rather than a
//! shop transformer, since the validator's contract is independent of any
//! one shop's raw payload shape.

use proc_model::{field_name_set, new_template, validate, FieldKind, ValidateOptions, FIELD_TABLE};
use proptest::prelude::*;
use serde_json::json;

fn arb_title() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ]{1,40}"
}

fn arb_price() -> impl Strategy<Value = f64> {
    0.01f64..10_000.0
}

/// Arbitrary partials that only ever touch well-typed fields, so `validate`
/// is exercised against a realistic spread of required-field values rather
/// than a single fixed fixture.
fn arb_partial() -> impl Strategy<Value = serde_json::Value> {
    (arb_title(), arb_title(), arb_price(), arb_price(), any::<bool>()).prop_map(
        |(title, brand, price_before_bonus, current_price, is_active)| {
            json!({
                "title": title,
                "brand": brand,
                "priceBeforeBonus": price_before_bonus,
                "currentPrice": current_price,
                "isActive": is_active,
            })
        },
    )
}

proptest! {
    /// Property 1 / 6 (first half): `new_template(partial)` always produces
    /// a record that validates clean with `allowExtras:false` — every
    /// required field has a default or supplied value, never a missing key.
    #[test]
    fn new_template_always_validates(partial in arb_partial()) {
        let record = new_template(Some(&partial));
        let report = validate(&record.to_value(), ValidateOptions::default());
        prop_assert!(report.ok, "report not ok: {:?}", report);
        prop_assert_eq!(report.score, 1.0);
        prop_assert!(report.missing.is_empty());
    }

    /// Property 6 (second half): deleting any one required field from an
    /// otherwise-valid record's JSON makes `validate` report exactly that
    /// field in `missing`.
    #[test]
    fn removing_a_required_field_is_reported_missing(
        partial in arb_partial(),
        field_index in 0..FIELD_TABLE.len(),
    ) {
        let (name, kind) = FIELD_TABLE[field_index];
        prop_assume!(matches!(kind, FieldKind::Required(_)));

        let record = new_template(Some(&partial));
        let mut value = record.to_value();
        value.as_object_mut().unwrap().remove(name);

        let report = validate(&value, ValidateOptions::default());
        prop_assert!(!report.ok);
        prop_assert!(report.missing.contains(&name.to_string()));
    }

    /// Sanity check alongside the two spec properties: every key the
    /// serialized template carries is a recognized field (no `allow_extras`
    /// violations from the construction path itself).
    #[test]
    fn template_output_has_no_unrecognized_keys(partial in arb_partial()) {
        let record = new_template(Some(&partial));
        let value = record.to_value();
        let names = field_name_set();
        for key in value.as_object().unwrap().keys() {
            prop_assert!(names.contains(key.as_str()), "unexpected key {key}");
        }
    }
}
