//! Request validation rules of spec.md §6.1: `shop_type` membership,
//! `batch_size` range, `reason` length.

use crate::error::ApiError;
use proc_model::ShopType;
use std::str::FromStr;

pub fn parse_shop_type(raw: &str) -> Result<ShopType, ApiError> {
    ShopType::from_str(raw).map_err(|_| {
        ApiError::BadRequest(format!(
            "shop_type must be one of ah, jumbo, aldi, plus, kruidvat; got {raw:?}"
        ))
    })
}

pub fn validate_batch_size(batch_size: Option<i32>) -> Result<i32, ApiError> {
    match batch_size {
        None => Ok(0), // JobManager substitutes its configured default.
        Some(n) if (1..=10_000).contains(&n) => Ok(n),
        Some(n) => Err(ApiError::BadRequest(format!(
            "batch_size must be in [1, 10000], got {n}"
        ))),
    }
}

pub fn validate_reason(reason: Option<String>) -> Result<String, ApiError> {
    let reason = reason.unwrap_or_else(|| "cancelled via API".to_string());
    if reason.is_empty() || reason.len() > 500 {
        return Err(ApiError::BadRequest(
            "reason must be 1..500 characters".to_string(),
        ));
    }
    Ok(reason)
}
