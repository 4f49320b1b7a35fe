use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Untyped seed data for `new_template`/`ensure_complete`. An arbitrary JSON
/// object; unrecognized keys are ignored, matching fields are read by name.
pub type PartialRecord = Value;

/// The canonical 32-field product record (spec.md §3.1).
///
/// Field order matches the taxonomy table exactly. `Option<T>` fields
/// without `skip_serializing_if` are *nullable* (always present, may be
/// `null`); `Option<T>` fields with `skip_serializing_if = "Option::is_none"`
/// are *optional* (absent entirely when unset).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub unified_id: String,
    pub shop_type: String,
    pub title: String,
    pub main_category: Option<String>,
    pub brand: String,
    pub image_url: String,
    pub sales_unit_size: String,
    pub quantity_amount: f64,
    pub quantity_unit: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_quantity_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_quantity_unit: Option<String>,
    pub price_before_bonus: f64,
    pub current_price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_price_unit: Option<String>,
    pub is_promotion: bool,
    pub promotion_type: String,
    pub promotion_mechanism: String,
    pub promotion_start_date: Option<String>,
    pub promotion_end_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parsed_promotion_effective_unit_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parsed_promotion_required_quantity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parsed_promotion_total_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parsed_promotion_is_multi_purchase_required: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normalized_quantity_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normalized_quantity_unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversion_factor: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_per_standard_unit: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_price_per_standard_unit: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_absolute: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_percentage: Option<f64>,
    pub is_active: bool,
}

impl Default for ProductRecord {
    fn default() -> Self {
        ProductRecord {
            unified_id: String::new(),
            shop_type: String::new(),
            title: String::new(),
            main_category: None,
            brand: String::new(),
            image_url: String::new(),
            sales_unit_size: String::new(),
            quantity_amount: 0.0,
            quantity_unit: String::new(),
            default_quantity_amount: None,
            default_quantity_unit: None,
            price_before_bonus: 0.0,
            current_price: 0.0,
            unit_price: None,
            unit_price_unit: None,
            is_promotion: false,
            promotion_type: "none".to_string(),
            promotion_mechanism: "none".to_string(),
            promotion_start_date: None,
            promotion_end_date: None,
            parsed_promotion_effective_unit_price: None,
            parsed_promotion_required_quantity: None,
            parsed_promotion_total_price: None,
            parsed_promotion_is_multi_purchase_required: None,
            normalized_quantity_amount: None,
            normalized_quantity_unit: None,
            conversion_factor: None,
            price_per_standard_unit: None,
            current_price_per_standard_unit: None,
            discount_absolute: None,
            discount_percentage: None,
            is_active: true,
        }
    }
}

impl ProductRecord {
    /// Project to `serde_json::Value` the way a transformer's raw output
    /// would look: nullable fields always present, optional fields present
    /// only when `Some`. This is what the Validator inspects.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).expect("ProductRecord always serializes")
    }
}

fn read_str(obj: &serde_json::Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(|v| v.as_str()).map(str::to_string)
}

fn read_num(obj: &serde_json::Map<String, Value>, key: &str) -> Option<f64> {
    obj.get(key).and_then(|v| v.as_f64())
}

fn read_bool(obj: &serde_json::Map<String, Value>, key: &str) -> Option<bool> {
    obj.get(key).and_then(|v| v.as_bool())
}

/// `null` is distinct from absence (spec.md §4.1): a nullable field explicitly
/// set to `null` in `partial` is honored as `None`, while an absent key falls
/// back to the default.
fn read_nullable_str(obj: &serde_json::Map<String, Value>, key: &str) -> Option<String> {
    match obj.get(key) {
        Some(Value::Null) => None,
        Some(v) => v.as_str().map(str::to_string),
        None => None,
    }
}

fn has_key(obj: &serde_json::Map<String, Value>, key: &str) -> bool {
    obj.get(key).map(|v| !v.is_null()).unwrap_or(false)
}

/// Build a complete canonical record from an arbitrary JSON seed. Required
/// and nullable fields are always populated (from `partial` when present and
/// correctly typed, otherwise from defaults); optional fields are included
/// only when `partial` supplied them. Never mutates `partial`.
fn build(partial: Option<&Value>) -> ProductRecord {
    let empty = serde_json::Map::new();
    let obj = partial.and_then(Value::as_object).unwrap_or(&empty);
    let defaults = ProductRecord::default();

    ProductRecord {
        unified_id: read_str(obj, "unified_id").unwrap_or(defaults.unified_id),
        shop_type: read_str(obj, "shop_type").unwrap_or(defaults.shop_type),
        title: read_str(obj, "title").unwrap_or(defaults.title),
        main_category: if has_key(obj, "main_category") {
            read_nullable_str(obj, "main_category")
        } else {
            defaults.main_category
        },
        brand: read_str(obj, "brand").unwrap_or(defaults.brand),
        image_url: read_str(obj, "image_url").unwrap_or(defaults.image_url),
        sales_unit_size: read_str(obj, "sales_unit_size").unwrap_or(defaults.sales_unit_size),
        quantity_amount: read_num(obj, "quantity_amount").unwrap_or(defaults.quantity_amount),
        quantity_unit: read_str(obj, "quantity_unit").unwrap_or(defaults.quantity_unit),
        default_quantity_amount: read_num(obj, "default_quantity_amount"),
        default_quantity_unit: read_str(obj, "default_quantity_unit"),
        price_before_bonus: read_num(obj, "price_before_bonus").unwrap_or(defaults.price_before_bonus),
        current_price: read_num(obj, "current_price").unwrap_or(defaults.current_price),
        unit_price: read_num(obj, "unit_price"),
        unit_price_unit: read_str(obj, "unit_price_unit"),
        is_promotion: read_bool(obj, "is_promotion").unwrap_or(defaults.is_promotion),
        promotion_type: read_str(obj, "promotion_type").unwrap_or(defaults.promotion_type),
        promotion_mechanism: read_str(obj, "promotion_mechanism").unwrap_or(defaults.promotion_mechanism),
        promotion_start_date: if has_key(obj, "promotion_start_date") {
            read_nullable_str(obj, "promotion_start_date")
        } else {
            defaults.promotion_start_date
        },
        promotion_end_date: if has_key(obj, "promotion_end_date") {
            read_nullable_str(obj, "promotion_end_date")
        } else {
            defaults.promotion_end_date
        },
        parsed_promotion_effective_unit_price: read_num(obj, "parsed_promotion_effective_unit_price"),
        parsed_promotion_required_quantity: read_num(obj, "parsed_promotion_required_quantity"),
        parsed_promotion_total_price: read_num(obj, "parsed_promotion_total_price"),
        parsed_promotion_is_multi_purchase_required: read_bool(
            obj,
            "parsed_promotion_is_multi_purchase_required",
        ),
        normalized_quantity_amount: read_num(obj, "normalized_quantity_amount"),
        normalized_quantity_unit: read_str(obj, "normalized_quantity_unit"),
        conversion_factor: read_num(obj, "conversion_factor"),
        price_per_standard_unit: read_num(obj, "price_per_standard_unit"),
        current_price_per_standard_unit: read_num(obj, "current_price_per_standard_unit"),
        discount_absolute: read_num(obj, "discount_absolute"),
        discount_percentage: read_num(obj, "discount_percentage"),
        is_active: read_bool(obj, "is_active").unwrap_or(defaults.is_active),
    }
}

/// `newTemplate(partial) → Record` (spec.md §4.1).
pub fn new_template(partial: Option<&PartialRecord>) -> ProductRecord {
    build(partial)
}

/// `ensureComplete(anything) → Record` (spec.md §4.1): identical construction
/// rules as `new_template`, but documented to accept arbitrary, possibly
/// untrusted, shapes rather than a record-shaped partial.
pub fn ensure_complete(anything: &Value) -> ProductRecord {
    build(Some(anything))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_match_spec_table() {
        let r = new_template(None);
        assert_eq!(r.brand, "");
        assert_eq!(r.promotion_type, "none");
        assert_eq!(r.promotion_mechanism, "none");
        assert!(!r.is_promotion);
        assert!(r.is_active);
        assert_eq!(r.quantity_amount, 0.0);
        assert!(r.main_category.is_none());
        assert!(r.unit_price.is_none());
    }

    #[test]
    fn partial_overrides_required_fields() {
        let partial = json!({"title": "Milk 1L", "shop_type": "ah", "current_price": 1.29});
        let r = new_template(Some(&partial));
        assert_eq!(r.title, "Milk 1L");
        assert_eq!(r.shop_type, "ah");
        assert_eq!(r.current_price, 1.29);
        assert_eq!(r.price_before_bonus, 0.0);
    }

    #[test]
    fn optional_fields_are_absent_from_serialized_value_unless_supplied() {
        let r = new_template(None);
        let v = r.to_value();
        let obj = v.as_object().unwrap();
        assert!(!obj.contains_key("unit_price"));
        assert!(obj.contains_key("main_category"));
        assert_eq!(obj.get("main_category"), Some(&Value::Null));
    }

    #[test]
    fn ensure_complete_never_mutates_input() {
        let input = json!({"title": "x"});
        let before = input.clone();
        let _ = ensure_complete(&input);
        assert_eq!(input, before);
    }
}
