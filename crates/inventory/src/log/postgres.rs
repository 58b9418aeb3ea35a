use async_trait::async_trait;
use common::{InventoryRecordId, ProductId, Sku, VariantId, WarehouseId};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use super::TransactionLog;
use crate::{
    Balance, InventoryTransaction, LogResult, TransactionId, TransactionLogError, TransactionQuery,
    TransactionType,
};

const SELECT_COLUMNS: &str = "SELECT id, reference, record_id, warehouse_id, product_id, variant_id, \
     transaction_type, quantity, previous_on_hand, previous_reserved, resulting_on_hand, \
     resulting_reserved, reason, actor, order_reference, timestamp FROM inventory_transactions";

/// PostgreSQL-backed inventory ledger.
#[derive(Clone)]
pub struct PostgresTransactionLog {
    pool: PgPool,
}

impl PostgresTransactionLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> LogResult<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_transaction(row: PgRow) -> LogResult<InventoryTransaction> {
        let transaction_type: String = row.try_get("transaction_type")?;
        let variant_id: Option<i64> = row.try_get("variant_id")?;

        Ok(InventoryTransaction {
            id: TransactionId::from_uuid(row.try_get::<Uuid, _>("id")?),
            reference: row.try_get("reference")?,
            record_id: InventoryRecordId::new(to_u64(row.try_get("record_id")?)?),
            warehouse_id: WarehouseId::new(to_u64(row.try_get("warehouse_id")?)?),
            sku: Sku::new(
                ProductId::new(to_u64(row.try_get("product_id")?)?),
                variant_id.map(to_u64).transpose()?.map(VariantId::new),
            ),
            transaction_type: transaction_type
                .parse::<TransactionType>()
                .map_err(TransactionLogError::Corrupt)?,
            quantity: to_u32(row.try_get("quantity")?)?,
            previous: Balance::new(
                to_u32(row.try_get("previous_on_hand")?)?,
                to_u32(row.try_get("previous_reserved")?)?,
            ),
            resulting: Balance::new(
                to_u32(row.try_get("resulting_on_hand")?)?,
                to_u32(row.try_get("resulting_reserved")?)?,
            ),
            reason: row.try_get("reason")?,
            actor: row.try_get("actor")?,
            order_reference: row.try_get("order_reference")?,
            timestamp: row.try_get("timestamp")?,
        })
    }
}

fn to_u64(value: i64) -> LogResult<u64> {
    u64::try_from(value).map_err(|_| TransactionLogError::Corrupt(format!("negative id {value}")))
}

fn to_u32(value: i64) -> LogResult<u32> {
    u32::try_from(value)
        .map_err(|_| TransactionLogError::Corrupt(format!("quantity out of range: {value}")))
}

#[async_trait]
impl TransactionLog for PostgresTransactionLog {
    async fn append(&self, tx: InventoryTransaction) -> LogResult<()> {
        sqlx::query(
            r#"
            INSERT INTO inventory_transactions (
                id, reference, record_id, warehouse_id, product_id, variant_id,
                transaction_type, quantity, previous_on_hand, previous_reserved,
                resulting_on_hand, resulting_reserved, reason, actor, order_reference, timestamp
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(tx.id.as_uuid())
        .bind(&tx.reference)
        .bind(tx.record_id.get() as i64)
        .bind(tx.warehouse_id.get() as i64)
        .bind(tx.sku.product_id.get() as i64)
        .bind(tx.sku.variant_id.map(|v| v.get() as i64))
        .bind(tx.transaction_type.as_str())
        .bind(i64::from(tx.quantity))
        .bind(i64::from(tx.previous.on_hand))
        .bind(i64::from(tx.previous.reserved))
        .bind(i64::from(tx.resulting.on_hand))
        .bind(i64::from(tx.resulting.reserved))
        .bind(&tx.reason)
        .bind(&tx.actor)
        .bind(&tx.order_reference)
        .bind(tx.timestamp)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn query(&self, query: TransactionQuery) -> LogResult<Vec<InventoryTransaction>> {
        let mut sql = format!("{SELECT_COLUMNS} WHERE 1=1");
        let mut param_count = 0;

        if query.record_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND record_id = ${param_count}"));
        }
        if query.warehouse_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND warehouse_id = ${param_count}"));
        }
        if query.sku.is_some() {
            param_count += 2;
            sql.push_str(&format!(
                " AND product_id = ${} AND variant_id IS NOT DISTINCT FROM ${}",
                param_count - 1,
                param_count
            ));
        }
        if query.transaction_types.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND transaction_type = ANY(${param_count})"));
        }
        if query.order_reference.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND order_reference = ${param_count}"));
        }
        if query.from_timestamp.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND timestamp >= ${param_count}"));
        }
        if query.to_timestamp.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND timestamp <= ${param_count}"));
        }

        sql.push_str(" ORDER BY seq ASC");

        if query.limit.is_some() {
            param_count += 1;
            sql.push_str(&format!(" LIMIT ${param_count}"));
        }
        if query.offset.is_some() {
            param_count += 1;
            sql.push_str(&format!(" OFFSET ${param_count}"));
        }

        let mut sqlx_query = sqlx::query(&sql);

        if let Some(id) = query.record_id {
            sqlx_query = sqlx_query.bind(id.get() as i64);
        }
        if let Some(id) = query.warehouse_id {
            sqlx_query = sqlx_query.bind(id.get() as i64);
        }
        if let Some(sku) = query.sku {
            sqlx_query = sqlx_query
                .bind(sku.product_id.get() as i64)
                .bind(sku.variant_id.map(|v| v.get() as i64));
        }
        if let Some(types) = query.transaction_types {
            let names: Vec<String> = types.iter().map(|t| t.as_str().to_string()).collect();
            sqlx_query = sqlx_query.bind(names);
        }
        if let Some(order) = query.order_reference {
            sqlx_query = sqlx_query.bind(order);
        }
        if let Some(from_ts) = query.from_timestamp {
            sqlx_query = sqlx_query.bind(from_ts);
        }
        if let Some(to_ts) = query.to_timestamp {
            sqlx_query = sqlx_query.bind(to_ts);
        }
        if let Some(limit) = query.limit {
            sqlx_query = sqlx_query.bind(limit as i64);
        }
        if let Some(offset) = query.offset {
            sqlx_query = sqlx_query.bind(offset as i64);
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_transaction).collect()
    }
}
