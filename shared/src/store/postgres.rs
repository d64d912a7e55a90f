use anyhow::Result;
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel::{Connection, PgConnection};
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use num_traits::{FromPrimitive, ToPrimitive};
use tracing::info;

use super::{OrderStore, StoreError, StoreResult};
use crate::record::OrderRecord;
use crate::schema::orders;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

type Manager = AsyncDieselConnectionManager<AsyncPgConnection>;

pub type DbPool = bb8::Pool<Manager>;

pub fn run_migrations(database_url: &str) -> Result<()> {
    info!("Running database migrations...");
    let mut conn = PgConnection::establish(database_url)?;
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|e| anyhow::anyhow!("Migration error: {}", e))?;
    info!("Migrations completed successfully");
    Ok(())
}

pub async fn connect(database_url: &str) -> Result<DbPool> {
    let config = Manager::new(database_url);
    let pool = bb8::Pool::builder().build(config).await?;
    Ok(pool)
}

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = orders)]
struct OrderRow {
    order_id: String,
    customer_id: String,
    status: String,
    total_amount: BigDecimal,
    order_date: DateTime<Utc>,
    items_json: String,
}

impl TryFrom<OrderRecord> for OrderRow {
    type Error = StoreError;

    fn try_from(record: OrderRecord) -> Result<Self, Self::Error> {
        let total_amount =
            BigDecimal::from_f64(record.total_amount).ok_or_else(|| StoreError::InvalidRecord {
                order_id: record.order_id.clone(),
                reason: format!("total amount {} is not a decimal", record.total_amount),
            })?;

        Ok(Self {
            order_id: record.order_id,
            customer_id: record.customer_id,
            status: record.status,
            total_amount,
            order_date: record.order_date,
            items_json: record.items_json,
        })
    }
}

impl TryFrom<OrderRow> for OrderRecord {
    type Error = StoreError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let total_amount = row
            .total_amount
            .to_f64()
            .filter(|amount| amount.is_finite())
            .ok_or_else(|| StoreError::InvalidRecord {
                order_id: row.order_id.clone(),
                reason: format!("total amount {} does not fit a float", row.total_amount),
            })?;

        Ok(Self {
            order_id: row.order_id,
            customer_id: row.customer_id,
            status: row.status,
            total_amount,
            order_date: row.order_date,
            items_json: row.items_json,
        })
    }
}

pub struct PgOrderStore {
    pool: DbPool,
}

impl PgOrderStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn conn(&self) -> StoreResult<bb8::PooledConnection<'_, Manager>> {
        self.pool
            .get()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn get(&self, order_id: &str) -> StoreResult<Option<OrderRecord>> {
        let mut conn = self.conn().await?;
        let row = orders::table
            .filter(orders::order_id.eq(order_id))
            .first::<OrderRow>(&mut conn)
            .await
            .optional()?;
        row.map(OrderRecord::try_from).transpose()
    }

    async fn list(&self, customer_id: Option<&str>) -> StoreResult<Vec<OrderRecord>> {
        let mut conn = self.conn().await?;
        let mut query = orders::table.order(orders::order_id.asc()).into_boxed();
        if let Some(customer_id) = customer_id {
            query = query.filter(orders::customer_id.eq(customer_id));
        }
        let rows = query.load::<OrderRow>(&mut conn).await?;
        rows.into_iter().map(OrderRecord::try_from).collect()
    }

    async fn upsert(&self, record: OrderRecord) -> StoreResult<()> {
        let row = OrderRow::try_from(record)?;
        let mut conn = self.conn().await?;

        diesel::insert_into(orders::table)
            .values(&row)
            .on_conflict(orders::order_id)
            .do_update()
            .set((
                orders::customer_id.eq(excluded(orders::customer_id)),
                orders::status.eq(excluded(orders::status)),
                orders::total_amount.eq(excluded(orders::total_amount)),
                orders::order_date.eq(excluded(orders::order_date)),
                orders::items_json.eq(excluded(orders::items_json)),
            ))
            .execute(&mut conn)
            .await?;

        Ok(())
    }

    async fn delete(&self, order_id: &str) -> StoreResult<bool> {
        let mut conn = self.conn().await?;
        let deleted = diesel::delete(orders::table.filter(orders::order_id.eq(order_id)))
            .execute(&mut conn)
            .await?;
        Ok(deleted > 0)
    }
}
