// SQLite SessionStore / OrderSource Implementation

use crate::error::{from_db_int, map_sqlx_error, to_db_int};
use async_trait::async_trait;
use chrono::{DateTime, Local};
use linecount_core::domain::{OrderRecord, StoppageMarker, DEFAULT_NOMINAL_RATE};
use linecount_core::error::Result;
use linecount_core::port::{OrderSource, PartialRecord, SessionStore, SessionSummary};
use sqlx::{Row, SqlitePool};
use tracing::{debug, warn};

pub struct SqliteSessionStore {
    pool: SqlitePool,
}

impl SqliteSessionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Add an order to the catalogue; `nominal_rate = None` falls back to the default on lookup
    pub async fn register_order(
        &self,
        order_number: &str,
        article: &str,
        description: &str,
        nominal_rate: Option<u32>,
    ) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO production_orders (order_number, article, description, nominal_rate)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(order_number)
        .bind(article)
        .bind(description)
        .bind(nominal_rate)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.last_insert_rowid())
    }

    /// Number of sessions still marked active
    pub async fn active_session_count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM line_sessions WHERE active = 1")
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(from_db_int(count))
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn open_session(
        &self,
        order_label: &str,
        initial_quantity: u64,
        article: &str,
        opened_at: DateTime<Local>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO line_sessions (opened_at, active, order_label, initial_quantity, article)
            VALUES (?, 1, ?, ?, ?)
            "#,
        )
        .bind(opened_at)
        .bind(order_label)
        .bind(to_db_int(initial_quantity))
        .bind(article)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        debug!(order = %order_label, initial_quantity, "Session row opened");
        Ok(())
    }

    async fn append_partial_record(&self, record: &PartialRecord) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        sqlx::query(
            r#"
            INSERT INTO partial_counts (order_id, current_count, target_count, recorded_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(record.order_id)
        .bind(to_db_int(record.current_count))
        .bind(to_db_int(record.target_count))
        .bind(record.recorded_at)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        sqlx::query(
            r#"
            INSERT INTO count_history (
                recorded_at, order_id, order_label, article, description, nominal_rate,
                started_at, ended_at, current_count, target_count, breakage_count,
                stoppage, gate_state, run_state, configured,
                last_rate, last_average, last_cadence, time_label
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.recorded_at)
        .bind(record.order_id)
        .bind(&record.order_label)
        .bind(&record.article)
        .bind(&record.description)
        .bind(record.nominal_rate)
        .bind(record.started_at)
        .bind(record.ended_at)
        .bind(to_db_int(record.current_count))
        .bind(to_db_int(record.target_count))
        .bind(to_db_int(record.breakage_count))
        .bind(record.last_stoppage.map(StoppageMarker::as_str))
        .bind(record.gate_state.code())
        .bind(record.run_state.code())
        .bind(record.configured)
        .bind(record.last_rate)
        .bind(record.last_average.map(to_db_int))
        .bind(record.last_cadence)
        .bind(&record.last_time_label)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn finalize_session(&self, summary: &SessionSummary) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE line_sessions
            SET active = 0,
                final_count = ?,
                breakage_count = ?,
                average_rate = ?,
                started_at = ?,
                ended_at = ?
            WHERE active = 1 AND order_label = ?
            "#,
        )
        .bind(to_db_int(summary.final_count))
        .bind(to_db_int(summary.breakage_count))
        .bind(to_db_int(summary.average_rate))
        .bind(summary.started_at)
        .bind(summary.ended_at)
        .bind(&summary.order_label)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            warn!(order = %summary.order_label, "No active session row to finalize");
        }
        Ok(())
    }

    async fn deactivate_open_sessions(&self) -> Result<u64> {
        let result = sqlx::query("UPDATE line_sessions SET active = 0 WHERE active = 1")
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl OrderSource for SqliteSessionStore {
    async fn lookup_order(&self, order_label: &str) -> Result<Option<OrderRecord>> {
        // Labels arrive with '-' where the catalogue stores '/'
        let row = sqlx::query(
            r#"
            SELECT id, article, description, COALESCE(nominal_rate, ?) AS nominal_rate
            FROM production_orders
            WHERE order_number = REPLACE(?, '-', '/')
            "#,
        )
        .bind(DEFAULT_NOMINAL_RATE)
        .bind(order_label)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let nominal_rate: i64 = row.try_get("nominal_rate").map_err(map_sqlx_error)?;
        Ok(Some(OrderRecord {
            id: row.try_get("id").map_err(map_sqlx_error)?,
            article: row.try_get("article").map_err(map_sqlx_error)?,
            description: row.try_get("description").map_err(map_sqlx_error)?,
            nominal_rate: u32::try_from(nominal_rate).unwrap_or(DEFAULT_NOMINAL_RATE),
        }))
    }
}
