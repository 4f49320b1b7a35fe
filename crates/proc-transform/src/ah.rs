//! Albert Heijn raw payload → canonical record (spec.md §4.2).

use crate::common::{best_image_url, is_promotion, parse_quantity};
use crate::{first_non_empty, TransformError, TransformOutcome, Transformer};
use proc_model::{unified_id, ErrorKind, ProductRecord, ShopType};
use serde_json::Value;

pub struct AhTransformer;

impl Transformer for AhTransformer {
    fn shop_type(&self) -> ShopType {
        ShopType::Ah
    }

    fn extract_external_id(&self, raw_data: &Value) -> Option<String> {
        let obj = raw_data.as_object()?;
        first_non_empty(obj, &["webshopId"])
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
                "could not extract external_id from webshopId",
                true,
            ));
        };

        let title = match obj.get("title").and_then(Value::as_str) {
            Some(t) if !t.is_empty() => t.to_string(),
            _ => {
                return TransformOutcome::Err(TransformError::validation(
                    "title is required but missing or null",
                    true,
                ))
            }
        };

        let current_price = obj.get("currentPrice").and_then(Value::as_f64).unwrap_or(0.0);
        let price_before_bonus = obj
            .get("priceBeforeBonus")
            .and_then(Value::as_f64)
            .unwrap_or(current_price);
        let brand = obj.get("brand").and_then(Value::as_str).unwrap_or("").to_string();
        let sales_unit_size = obj
            .get("salesUnitSize")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        let (quantity_amount, quantity_unit) = parse_quantity(&sales_unit_size);
        let image_url = best_image_url(obj.get("images"));
        let main_category = obj
            .get("mainCategory")
            .and_then(Value::as_str)
            .map(str::to_string);
        let is_active = obj
            .get("orderAvailabilityStatus")
            .and_then(Value::as_str)
            .map(|s| s == "IN_ASSORTMENT")
            .unwrap_or(true);
        let promotion = is_promotion(current_price, price_before_bonus);

        let record = ProductRecord {
            unified_id: unified_id("ah", &external_id, schema_version),
            shop_type: "ah".to_string(),
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
            "webshopId": 1010,
            "title": "Milk 1L",
            "currentPrice": 1.29,
            "priceBeforeBonus": 1.49,
            "brand": "B",
            "salesUnitSize": "1l",
            "shopType": "AH",
            "images": [{"url": "u", "width": 300}],
            "mainCategory": "Dairy",
            "orderAvailabilityStatus": "IN_ASSORTMENT",
        })
    }

    #[test]
    fn happy_path_produces_valid_record() {
        let raw = fixture();
        let outcome = AhTransformer.transform(&raw, "1.0.0");
        let TransformOutcome::Ok { record, external_id } = outcome else {
            panic!("expected Ok outcome");
        };
        assert_eq!(external_id, "1010");
        assert_eq!(record.unified_id, "ah_1010_1.0.0");
        assert!(record.is_active);
        assert!(!record.is_promotion);
        assert_eq!(record.promotion_type, "none");

        let report = validate(&record.to_value(), ValidateOptions::default());
        assert!(report.ok, "{report:?}");
    }

    #[test]
    fn missing_title_is_validation_error_high_severity() {
        let mut raw = fixture();
        raw["title"] = Value::Null;
        let outcome = AhTransformer.transform(&raw, "1.0.0");
        let TransformOutcome::Err(err) = outcome else {
            panic!("expected Err outcome");
        };
        assert_eq!(err.kind, ErrorKind::ValidationError);
        assert_eq!(err.severity, proc_model::Severity::High);
    }

    #[test]
    fn promotion_flag_set_when_current_price_is_lower() {
        let mut raw = fixture();
        raw["currentPrice"] = json!(0.99);
        let outcome = AhTransformer.transform(&raw, "1.0.0");
        let TransformOutcome::Ok { record, .. } = outcome else {
            panic!("expected Ok outcome");
        };
        assert!(record.is_promotion);
        assert_eq!(record.promotion_type, "discount");
        assert!(record.current_price <= record.price_before_bonus);
    }

    #[test]
    fn not_in_assortment_marks_inactive() {
        let mut raw = fixture();
        raw["orderAvailabilityStatus"] = json!("NOT_AVAILABLE");
        let outcome = AhTransformer.transform(&raw, "1.0.0");
        let TransformOutcome::Ok { record, .. } = outcome else {
            panic!("expected Ok outcome");
        };
        assert!(!record.is_active);
    }
}
