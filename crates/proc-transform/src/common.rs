//! Shared parsing helpers used by more than one per-shop transformer.
//! Per-shop quirks (field names, promotion encodings) stay in their own
//! modules; only the genuinely shop-agnostic parsing lives here.

use serde_json::Value;

/// Picks the best image URL out of a shop's `images` array: the entry
/// with the largest `width`, or the first entry's `url` if none carry a
/// width, or `""` if the array is missing or empty.
pub fn best_image_url(images: Option<&Value>) -> String {
    let Some(Value::Array(items)) = images else {
        return String::new();
    };

    let mut best: Option<(i64, String)> = None;
    for item in items {
        let Some(url) = item.get("url").and_then(Value::as_str) else {
            continue;
        };
        let width = item.get("width").and_then(Value::as_i64).unwrap_or(0);
        match &best {
            Some((best_width, _)) if *best_width >= width => {}
            _ => best = Some((width, url.to_string())),
        }
    }
    best.map(|(_, url)| url).unwrap_or_default()
}

/// Splits a sales-unit-size string like `"1l"`, `"500 g"`, `"6 stuks"` into
/// `(amount, unit)`. Falls back to `(0.0, "")` when no leading number is
/// found, matching the template's required-field defaults.
pub fn parse_quantity(sales_unit_size: &str) -> (f64, String) {
    let trimmed = sales_unit_size.trim();
    let digits_end = trimmed
        .char_indices()
        .take_while(|(_, c)| c.is_ascii_digit() || *c == '.' || *c == ',')
        .last()
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0);

    if digits_end == 0 {
        return (0.0, String::new());
    }

    let amount_str = trimmed[..digits_end].replace(',', ".");
    let amount = amount_str.parse::<f64>().unwrap_or(0.0);
    let unit = trimmed[digits_end..].trim().to_lowercase();
    (amount, unit)
}

/// `current_price < price_before_bonus` ⇒ promotion (spec.md invariant I2
/// read in reverse: if the shop hands us an explicit discount, the
/// current price must already respect it).
pub fn is_promotion(current_price: f64, price_before_bonus: f64) -> bool {
    current_price > 0.0 && price_before_bonus > 0.0 && current_price < price_before_bonus
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn best_image_picks_largest_width() {
        let images = json!([{"url": "small", "width": 100}, {"url": "big", "width": 800}]);
        assert_eq!(best_image_url(Some(&images)), "big");
    }

    #[test]
    fn best_image_missing_is_empty() {
        assert_eq!(best_image_url(None), "");
    }

    #[test]
    fn parse_quantity_splits_number_and_unit() {
        assert_eq!(parse_quantity("1l"), (1.0, "l".to_string()));
        assert_eq!(parse_quantity("500 g"), (500.0, "g".to_string()));
        assert_eq!(parse_quantity("6 stuks"), (6.0, "stuks".to_string()));
        assert_eq!(parse_quantity(""), (0.0, "".to_string()));
    }

    #[test]
    fn parse_quantity_handles_comma_decimal() {
        assert_eq!(parse_quantity("1,5l"), (1.5, "l".to_string()));
    }
}
