//! Position and account-value operations for the repository.

use super::{decode_decimal, Repository};
use crate::domain::{Decimal, Position, Symbol};
use chrono::NaiveDate;
use sqlx::Row;

/// One persisted valuation snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountValueRow {
    pub total_value: Decimal,
    pub cash: Decimal,
    pub positions_value: Decimal,
    pub recorded_at: String,
}

const DATE_FORMAT: &str = "%Y-%m-%d";

impl Repository {
    /// List open positions for a model. Rows always have quantity > 0;
    /// closing deletes the row.
    pub async fn get_positions(&self, model_id: i64) -> Result<Vec<Position>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT symbol, quantity, avg_cost, acquired_on
            FROM positions WHERE model_id = ? ORDER BY symbol ASC
            "#,
        )
        .bind(model_id)
        .fetch_all(self.pool())
        .await?;

        rows.into_iter().map(position_from_row).collect()
    }

    pub async fn get_position(
        &self,
        model_id: i64,
        symbol: &Symbol,
    ) -> Result<Option<Position>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT symbol, quantity, avg_cost, acquired_on
            FROM positions WHERE model_id = ? AND symbol = ?
            "#,
        )
        .bind(model_id)
        .bind(symbol.as_str())
        .fetch_optional(self.pool())
        .await?;

        row.map(position_from_row).transpose()
    }

    /// Insert or replace a position row.
    pub async fn upsert_position(
        &self,
        model_id: i64,
        position: &Position,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO positions (model_id, symbol, quantity, avg_cost, acquired_on, updated_at)
            VALUES (?, ?, ?, ?, ?, datetime('now'))
            ON CONFLICT(model_id, symbol) DO UPDATE SET
                quantity = excluded.quantity,
                avg_cost = excluded.avg_cost,
                acquired_on = excluded.acquired_on,
                updated_at = datetime('now')
            "#,
        )
        .bind(model_id)
        .bind(position.symbol.as_str())
        .bind(position.quantity)
        .bind(position.avg_cost.to_canonical_string())
        .bind(position.acquired_on.format(DATE_FORMAT).to_string())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Remove a position row entirely (full liquidation).
    pub async fn close_position(
        &self,
        model_id: i64,
        symbol: &Symbol,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM positions WHERE model_id = ? AND symbol = ?")
            .bind(model_id)
            .bind(symbol.as_str())
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Append one valuation snapshot to the account-value time series.
    pub async fn record_account_value(
        &self,
        model_id: i64,
        total_value: Decimal,
        cash: Decimal,
        positions_value: Decimal,
        recorded_at: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO account_values (model_id, total_value, cash, positions_value, recorded_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(model_id)
        .bind(total_value.to_canonical_string())
        .bind(cash.to_canonical_string())
        .bind(positions_value.to_canonical_string())
        .bind(recorded_at)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Most recent valuation snapshots, newest first.
    pub async fn account_value_history(
        &self,
        model_id: i64,
        limit: i64,
    ) -> Result<Vec<AccountValueRow>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT total_value, cash, positions_value, recorded_at
            FROM account_values WHERE model_id = ?
            ORDER BY recorded_at DESC, id DESC LIMIT ?
            "#,
        )
        .bind(model_id)
        .bind(limit)
        .fetch_all(self.pool())
        .await?;

        rows.into_iter()
            .map(|r| {
                Ok(AccountValueRow {
                    total_value: decode_decimal(&r.get::<String, _>("total_value"))?,
                    cash: decode_decimal(&r.get::<String, _>("cash"))?,
                    positions_value: decode_decimal(&r.get::<String, _>("positions_value"))?,
                    recorded_at: r.get("recorded_at"),
                })
            })
            .collect()
    }
}

fn position_from_row(r: sqlx::sqlite::SqliteRow) -> Result<Position, sqlx::Error> {
    let avg_cost = decode_decimal(&r.get::<String, _>("avg_cost"))?;
    let acquired_on = NaiveDate::parse_from_str(&r.get::<String, _>("acquired_on"), DATE_FORMAT)
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
    Ok(Position {
        symbol: Symbol::new(r.get::<String, _>("symbol")),
        quantity: r.get("quantity"),
        avg_cost,
        acquired_on,
    })
}
