//! Warehouse and stock administration endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{ProductId, Sku, VariantId, WarehouseId};
use inventory::{
    AuditContext, InventoryRecord, NewWarehouse, StockAdjustment, StockUpdate, TransactionType,
    Transfer, Warehouse,
};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::ApiError;
use crate::routes::Caller;

#[derive(Deserialize)]
pub struct SetStockRequest {
    pub warehouse_id: WarehouseId,
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    #[serde(flatten)]
    pub update: StockUpdate,
}

#[derive(Deserialize)]
pub struct AdjustStockRequest {
    pub warehouse_id: WarehouseId,
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub transaction_type: TransactionType,
    pub quantity: u32,
    pub reason: Option<String>,
}

#[derive(Deserialize)]
pub struct TransferStockRequest {
    pub from_warehouse_id: WarehouseId,
    pub to_warehouse_id: WarehouseId,
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub quantity: u32,
    pub reason: Option<String>,
}

#[derive(Serialize)]
pub struct ProductStockResponse {
    pub product_id: ProductId,
    pub total_on_hand: u32,
    pub total_available: u32,
    pub records: Vec<InventoryRecord>,
}

fn audit(caller: &Caller, reason: Option<String>) -> AuditContext {
    let audit = AuditContext::new().actor(caller.actor());
    match reason {
        Some(reason) => audit.reason(reason),
        None => audit,
    }
}

/// POST /warehouses
#[tracing::instrument(skip(state, req))]
pub async fn register_warehouse(
    State(state): State<Arc<AppState>>,
    _caller: Caller,
    Json(req): Json<NewWarehouse>,
) -> Result<(StatusCode, Json<Warehouse>), ApiError> {
    let warehouse = state.ledger().register_warehouse(req).await?;
    Ok((StatusCode::CREATED, Json(warehouse)))
}

/// GET /inventory/{product_id}: every record of the product and its variants.
#[tracing::instrument(skip(state))]
pub async fn product_stock(
    State(state): State<Arc<AppState>>,
    Path(product_id): Path<u64>,
) -> Json<ProductStockResponse> {
    let product_id = ProductId::new(product_id);
    let records = state.ledger().records_for_product(product_id).await;
    Json(ProductStockResponse {
        product_id,
        total_on_hand: records.iter().map(InventoryRecord::quantity_on_hand).sum(),
        total_available: records.iter().map(InventoryRecord::quantity_available).sum(),
        records,
    })
}

/// POST /inventory/stock: set the absolute on-hand level, creating the record
/// when needed.
#[tracing::instrument(skip(state, req))]
pub async fn set_stock(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(req): Json<SetStockRequest>,
) -> Result<Json<InventoryRecord>, ApiError> {
    let sku = Sku::new(req.product_id, req.variant_id);
    let record = state
        .ledger()
        .upsert_record(req.warehouse_id, sku, req.update, &audit(&caller, None))
        .await?;
    Ok(Json(record))
}

/// POST /inventory/adjust
#[tracing::instrument(skip(state, req))]
pub async fn adjust(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(req): Json<AdjustStockRequest>,
) -> Result<Json<InventoryRecord>, ApiError> {
    let adjustment = StockAdjustment {
        warehouse_id: req.warehouse_id,
        sku: Sku::new(req.product_id, req.variant_id),
        transaction_type: req.transaction_type,
        quantity: req.quantity,
    };
    let record = state
        .coordinator()
        .adjust_stock(adjustment, &audit(&caller, req.reason))
        .await?;
    Ok(Json(record))
}

/// POST /inventory/transfer
#[tracing::instrument(skip(state, req))]
pub async fn transfer(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(req): Json<TransferStockRequest>,
) -> Result<Json<Transfer>, ApiError> {
    let transfer = state
        .coordinator()
        .transfer_stock(
            req.from_warehouse_id,
            req.to_warehouse_id,
            Sku::new(req.product_id, req.variant_id),
            req.quantity,
            &audit(&caller, req.reason),
        )
        .await?;
    Ok(Json(transfer))
}
