//! Kruidvat raw payload → canonical record (spec.md §4.2).

use crate::common::{best_image_url, is_promotion, parse_quantity};
use crate::{first_non_empty, TransformError, TransformOutcome, Transformer};
use proc_model::{unified_id, ErrorKind, ProductRecord, ShopType};
use serde_json::Value;

pub struct KruidvatTransformer;

impl Transformer for KruidvatTransformer {
    fn shop_type(&self) -> ShopType {
        ShopType::Kruidvat
    }

    fn extract_external_id(&self, raw_data: &Value) -> Option<String> {
        let obj = raw_data.as_object()?;
        first_non_empty(obj, &["productId"])
    }

    fn transform(&self, raw_data: &Value, schema_version: &str) -> TransformOutcome {
        let Some(obj) = raw_data.as_object() else {
            return TransformOutcome::Err(TransformError {
                kind: ErrorKind::TransformationError,
                message: "raw_data is not a JSON object".to_string(),
                severity: proc_model::Severity::High,
            });
        };

        let Some(external_id) = self.extract_external_id(raw_data) else {
            return TransformOutcome::Err(TransformError::validation(
                "could not extract external_id from productId",
                true,
            ));
        };

        let title = match obj.get("displayName").and_then(Value::as_str) {
            Some(t) if !t.is_empty() => t.to_string(),
            _ => {
                return TransformOutcome::Err(TransformError::validation(
                    "displayName is required but missing or null",
                    true,
                ))
            }
        };

        let current_price = obj
            .get("price")
            .and_then(|p| p.get("value"))
            .and_then(Value::as_f64)
            .unwrap_or(0.0);
        let price_before_bonus = obj
            .get("listPrice")
            .and_then(|p| p.get("value"))
            .and_then(Value::as_f64)
            .unwrap_or(current_price);
        let brand = obj.get("brandName").and_then(Value::as_str).unwrap_or("").to_string();
        let sales_unit_size = obj
            .get("contentValue")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        let (quantity_amount, quantity_unit) = parse_quantity(&sales_unit_size);
        let image_url = best_image_url(obj.get("images"));
        let main_category = obj
            .get("categoryPath")
            .and_then(Value::as_str)
            .map(str::to_string);
        let is_active = obj.get("stockLevel").and_then(Value::as_str) != Some("OUT_OF_STOCK");
        let promotion = is_promotion(current_price, price_before_bonus);

        let record = ProductRecord {
            unified_id: unified_id("kruidvat", &external_id, schema_version),
            shop_type: "kruidvat".to_string(),
            title,
            main_category,
            brand,
            image_url,
            sales_unit_size,
            quantity_amount,
            quantity_unit,
            price_before_bonus,
            current_price,
            is_promotion: promotion,
            promotion_type: if promotion { "discount".to_string() } else { "none".to_string() },
            promotion_mechanism: if promotion { "direct".to_string() } else { "none".to_string() },
            is_active,
            ..ProductRecord::default()
        };

        TransformOutcome::Ok { record, external_id }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proc_model::{validate, ValidateOptions};
    use serde_json::json;

    fn fixture() -> Value {
        json!({
            "productId": "KV-55",
            "displayName": "Shampoo 250ml",
            "price": {"value": 3.49},
            "brandName": "Andrelon",
            "contentValue": "250 ml",
            "categoryPath": "Haarverzorging",
            "stockLevel": "IN_STOCK",
        })
    }

    #[test]
    fn happy_path_produces_valid_record() {
        let raw = fixture();
        let outcome = KruidvatTransformer.transform(&raw, "1.0.0");
        let TransformOutcome::Ok { record, external_id } = outcome else {
            panic!("expected Ok outcome");
        };
        assert_eq!(external_id, "KV-55");
        assert!(record.is_active);
        let report = validate(&record.to_value(), ValidateOptions::default());
        assert!(report.ok, "{report:?}");
    }

    #[test]
    fn out_of_stock_marks_inactive() {
        let mut raw = fixture();
        raw["stockLevel"] = json!("OUT_OF_STOCK");
        let outcome = KruidvatTransformer.transform(&raw, "1.0.0");
        let TransformOutcome::Ok { record, .. } = outcome else {
            panic!("expected Ok outcome");
        };
        assert!(!record.is_active);
    }

    #[test]
    fn not_an_object_is_transformation_error() {
        let raw = json!("not an object");
        let outcome = KruidvatTransformer.transform(&raw, "1.0.0");
        let TransformOutcome::Err(err) = outcome else {
            panic!("expected Err outcome");
        };
        assert_eq!(err.kind, ErrorKind::TransformationError);
    }
}
