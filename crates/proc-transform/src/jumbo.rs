//! Jumbo raw payload → canonical record (spec.md §4.2).
//!
//! External id extraction tries `productId` then falls back to `sku`
//! (spec.md §9 open question (a), resolved in DESIGN.md: `productId` wins
//! when both are present).

use crate::common::{best_image_url, is_promotion, parse_quantity};
use crate::{first_non_empty, TransformError, TransformOutcome, Transformer};
use proc_model::{unified_id, ErrorKind, ProductRecord, ShopType};
use serde_json::Value;

pub struct JumboTransformer;

impl Transformer for JumboTransformer {
    fn shop_type(&self) -> ShopType {
        ShopType::Jumbo
    }

    fn extract_external_id(&self, raw_data: &Value) -> Option<String> {
        let obj = raw_data.as_object()?;
        first_non_empty(obj, &["productId", "sku"])
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
                "could not extract external_id from productId or sku",
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

        let current_price = obj
            .get("prices")
            .and_then(|p| p.get("price"))
            .and_then(|p| p.get("amount"))
            .and_then(Value::as_f64)
            .map(|cents| cents / 100.0)
            .unwrap_or(0.0);
        let price_before_bonus = obj
            .get("prices")
            .and_then(|p| p.get("promoPrice"))
            .and_then(|p| p.get("was"))
            .and_then(|w| w.get("amount"))
            .and_then(Value::as_f64)
            .map(|cents| cents / 100.0)
            .unwrap_or(current_price);
        let brand = obj.get("brand").and_then(Value::as_str).unwrap_or("").to_string();
        let sales_unit_size = obj
            .get("quantity")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        let (quantity_amount, quantity_unit) = parse_quantity(&sales_unit_size);
        let image_url = best_image_url(obj.get("imageInfo").and_then(|i| i.get("primaryView")));
        let main_category = obj
            .get("category")
            .and_then(Value::as_str)
            .map(str::to_string);
        let is_active = obj
            .get("available")
            .and_then(Value::as_bool)
            .unwrap_or(true);
        let promotion = is_promotion(current_price, price_before_bonus)
            || obj.get("promotion").map(|p| !p.is_null()).unwrap_or(false);

        let record = ProductRecord {
            unified_id: unified_id("jumbo", &external_id, schema_version),
            shop_type: "jumbo".to_string(),
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
            "productId": "jum-42",
            "sku": "sku-99",
            "title": "Coffee 500g",
            "prices": {"price": {"amount": 399}},
            "brand": "Douwe",
            "quantity": "500 g",
            "category": "Koffie",
            "available": true,
        })
    }

    #[test]
    fn prefers_product_id_over_sku() {
        let raw = fixture();
        let id = JumboTransformer.extract_external_id(&raw).unwrap();
        assert_eq!(id, "jum-42");
    }

    #[test]
    fn falls_back_to_sku_when_product_id_absent() {
        let mut raw = fixture();
        raw.as_object_mut().unwrap().remove("productId");
        let id = JumboTransformer.extract_external_id(&raw).unwrap();
        assert_eq!(id, "sku-99");
    }

    #[test]
    fn happy_path_produces_valid_record() {
        let raw = fixture();
        let outcome = JumboTransformer.transform(&raw, "1.0.0");
        let TransformOutcome::Ok { record, .. } = outcome else {
            panic!("expected Ok outcome");
        };
        assert_eq!(record.current_price, 3.99);
        let report = validate(&record.to_value(), ValidateOptions::default());
        assert!(report.ok, "{report:?}");
    }
}
