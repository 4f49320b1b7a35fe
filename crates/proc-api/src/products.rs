//! `/products*` routes of spec.md §6.1.

use crate::envelope::Envelope;
use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use proc_storage::{ProcessedRow, ProductFilter};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ProductListQuery {
    pub shop_type: Option<String>,
    pub is_active: Option<bool>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductListQuery>,
) -> Result<Envelope<Vec<ProcessedRow>>, ApiError> {
    let rows = state
        .store
        .list_processed(ProductFilter {
            shop_type: query.shop_type,
            is_active: query.is_active,
            limit: query.limit.unwrap_or(50),
            offset: query.offset.unwrap_or(0),
        })
        .await?;
    Ok(Envelope::ok(rows))
}

pub async fn get_product(
    State(state): State<AppState>,
    Path(unified_id): Path<String>,
) -> Result<Envelope<ProcessedRow>, ApiError> {
    let row = state
        .store
        .get_product_by_unified_id(&unified_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("product {unified_id} not found")))?;
    Ok(Envelope::ok(row))
}
