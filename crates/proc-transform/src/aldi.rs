//! Aldi raw payload → canonical record (spec.md §4.2).

use crate::common::{best_image_url, is_promotion, parse_quantity};
use crate::{first_non_empty, TransformError, TransformOutcome, Transformer};
use proc_model::{unified_id, ErrorKind, ProductRecord, ShopType};
use serde_json::Value;

pub struct AldiTransformer;

impl Transformer for AldiTransformer {
    fn shop_type(&self) -> ShopType {
        ShopType::Aldi
    }

    fn extract_external_id(&self, raw_data: &Value) -> Option<String> {
        let obj = raw_data.as_object()?;
        first_non_empty(obj, &["articleNumber"])
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
                "could not extract external_id from articleNumber",
                true,
            ));
        };

        let title = match obj.get("name").and_then(Value::as_str) {
            Some(t) if !t.is_empty() => t.to_string(),
            _ => {
                return TransformOutcome::Err(TransformError::validation(
                    "name is required but missing or null",
                    true,
                ))
            }
        };

        let current_price = obj.get("price").and_then(Value::as_f64).unwrap_or(0.0);
        let price_before_bonus = obj
            .get("oldPrice")
            .and_then(Value::as_f64)
            .unwrap_or(current_price);
        let brand = obj.get("brandName").and_then(Value::as_str).unwrap_or("").to_string();
        let sales_unit_size = obj
            .get("packagingUnit")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        let (quantity_amount, quantity_unit) = parse_quantity(&sales_unit_size);
        let image_url = best_image_url(obj.get("assets"));
        let main_category = obj
            .get("categoryName")
            .and_then(Value::as_str)
            .map(str::to_string);
        let is_active = !obj
            .get("isSoldOut")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let promotion = is_promotion(current_price, price_before_bonus);

        let record = ProductRecord {
            unified_id: unified_id("aldi", &external_id, schema_version),
            shop_type: "aldi".to_string(),
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
            "articleNumber": "A-100",
            "name": "Paprika's",
            "price": 1.49,
            "brandName": "",
            "packagingUnit": "500 g",
            "categoryName": "Groente",
            "isSoldOut": false,
        })
    }

    #[test]
    fn happy_path_produces_valid_record() {
        let raw = fixture();
        let outcome = AldiTransformer.transform(&raw, "1.0.0");
        let TransformOutcome::Ok { record, external_id } = outcome else {
            panic!("expected Ok outcome");
        };
        assert_eq!(external_id, "A-100");
        assert!(record.is_active);
        let report = validate(&record.to_value(), ValidateOptions::default());
        assert!(report.ok, "{report:?}");
    }

    #[test]
    fn sold_out_marks_inactive() {
        let mut raw = fixture();
        raw["isSoldOut"] = json!(true);
        let outcome = AldiTransformer.transform(&raw, "1.0.0");
        let TransformOutcome::Ok { record, .. } = outcome else {
            panic!("expected Ok outcome");
        };
        assert!(!record.is_active);
    }

    #[test]
    fn missing_name_is_validation_error() {
        let mut raw = fixture();
        raw.as_object_mut().unwrap().remove("name");
        let outcome = AldiTransformer.transform(&raw, "1.0.0");
        assert!(matches!(outcome, TransformOutcome::Err(_)));
    }
}
