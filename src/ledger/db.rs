//! Ledger Database Layer
//!
//! PostgreSQL persistence for operation execution info.
//! Guarded state changes are atomic CAS updates on the `state` column.

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use super::error::LedgerError;
use super::state::OperationState;
use super::store::LedgerStore;
use super::types::LedgerRow;

pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_ledger(row: &sqlx::postgres::PgRow) -> Result<LedgerRow, LedgerError> {
        let state_id: i16 = row.get("state");
        let state = OperationState::from_id(state_id).ok_or(LedgerError::InvalidState(state_id))?;

        Ok(LedgerRow {
            operation_name: row.get("operation_name"),
            operation_id: row.get("operation_id"),
            state,
            data: row.get("data"),
            last_modified: row.get("last_modified"),
        })
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn insert_if_absent(&self, row: LedgerRow) -> Result<(LedgerRow, bool), LedgerError> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO operation_execution_info_tb
                (operation_name, operation_id, state, data, last_modified)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (operation_name, operation_id) DO NOTHING
            "#,
        )
        .bind(&row.operation_name)
        .bind(&row.operation_id)
        .bind(row.state.id())
        .bind(&row.data)
        .bind(row.last_modified)
        .execute(&self.pool)
        .await?
        .rows_affected()
            > 0;

        if inserted {
            return Ok((row, true));
        }

        let existing = self
            .get(&row.operation_name, &row.operation_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(row.operation_id.clone()))?;
        Ok((existing, false))
    }

    async fn get(
        &self,
        operation_name: &str,
        operation_id: &str,
    ) -> Result<Option<LedgerRow>, LedgerError> {
        let row = sqlx::query(
            r#"
            SELECT operation_name, operation_id, state, data, last_modified
            FROM operation_execution_info_tb
            WHERE operation_name = $1 AND operation_id = $2
            "#,
        )
        .bind(operation_name)
        .bind(operation_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_ledger).transpose()
    }

    async fn update_state_if(
        &self,
        row: &LedgerRow,
        expected: OperationState,
    ) -> Result<bool, LedgerError> {
        let result = sqlx::query(
            r#"
            UPDATE operation_execution_info_tb
            SET state = $1, data = $2, last_modified = NOW()
            WHERE operation_name = $3 AND operation_id = $4 AND state = $5
            "#,
        )
        .bind(row.state.id())
        .bind(&row.data)
        .bind(&row.operation_name)
        .bind(&row.operation_id)
        .bind(expected.id())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn save(&self, row: &LedgerRow) -> Result<(), LedgerError> {
        sqlx::query(
            r#"
            INSERT INTO operation_execution_info_tb
                (operation_name, operation_id, state, data, last_modified)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (operation_name, operation_id)
            DO UPDATE SET state = EXCLUDED.state, data = EXCLUDED.data,
                          last_modified = EXCLUDED.last_modified
            "#,
        )
        .bind(&row.operation_name)
        .bind(&row.operation_id)
        .bind(row.state.id())
        .bind(&row.data)
        .bind(row.last_modified)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
