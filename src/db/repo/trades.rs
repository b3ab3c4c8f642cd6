//! Trade and conversation operations for the repository.

use super::{decode_decimal, Repository};
use crate::domain::{Decimal, Side, Symbol, TradeRecord};
use chrono::{DateTime, Utc};
use sqlx::Row;

/// One decision-provider exchange kept for the audit log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationRow {
    pub prompt: String,
    pub response: String,
    pub recorded_at: String,
}

impl Repository {
    /// Append one trade. Trade rows are never updated or deleted except
    /// when the whole model is removed.
    pub async fn insert_trade(&self, trade: &TradeRecord) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO trades (model_id, symbol, side, quantity, price, commission, levy, realized_pnl, executed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(trade.model_id)
        .bind(trade.symbol.as_str())
        .bind(trade.side.to_string())
        .bind(trade.quantity)
        .bind(trade.price.to_canonical_string())
        .bind(trade.commission.to_canonical_string())
        .bind(trade.levy.to_canonical_string())
        .bind(trade.realized_pnl.to_canonical_string())
        .bind(trade.executed_at.to_rfc3339())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Most recent trades, newest first.
    pub async fn list_trades(
        &self,
        model_id: i64,
        limit: i64,
    ) -> Result<Vec<TradeRecord>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT model_id, symbol, side, quantity, price, commission, levy, realized_pnl, executed_at
            FROM trades WHERE model_id = ?
            ORDER BY executed_at DESC, id DESC LIMIT ?
            "#,
        )
        .bind(model_id)
        .bind(limit)
        .fetch_all(self.pool())
        .await?;

        rows.into_iter().map(trade_from_row).collect()
    }

    /// Sum of realized PnL across all trades for a model. Buys contribute
    /// zero; sells contribute their fee-netted PnL.
    pub async fn sum_realized_pnl(&self, model_id: i64) -> Result<Decimal, sqlx::Error> {
        let rows = sqlx::query("SELECT realized_pnl FROM trades WHERE model_id = ?")
            .bind(model_id)
            .fetch_all(self.pool())
            .await?;

        let mut total = Decimal::zero();
        for row in rows {
            total = total + decode_decimal(&row.get::<String, _>("realized_pnl"))?;
        }
        Ok(total)
    }

    pub async fn insert_conversation(
        &self,
        model_id: i64,
        prompt: &str,
        response: &str,
        recorded_at: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO conversations (model_id, prompt, response, recorded_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(model_id)
        .bind(prompt)
        .bind(response)
        .bind(recorded_at)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn list_conversations(
        &self,
        model_id: i64,
        limit: i64,
    ) -> Result<Vec<ConversationRow>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT prompt, response, recorded_at
            FROM conversations WHERE model_id = ?
            ORDER BY recorded_at DESC, id DESC LIMIT ?
            "#,
        )
        .bind(model_id)
        .bind(limit)
        .fetch_all(self.pool())
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| ConversationRow {
                prompt: r.get("prompt"),
                response: r.get("response"),
                recorded_at: r.get("recorded_at"),
            })
            .collect())
    }
}

fn trade_from_row(r: sqlx::sqlite::SqliteRow) -> Result<TradeRecord, sqlx::Error> {
    let side_raw: String = r.get("side");
    let side = Side::parse(&side_raw).ok_or_else(|| {
        sqlx::Error::Decode(format!("invalid trade side: {}", side_raw).into())
    })?;
    let executed_at: String = r.get("executed_at");
    let executed_at = DateTime::parse_from_rfc3339(&executed_at)
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))?
        .with_timezone(&Utc);

    Ok(TradeRecord {
        model_id: r.get("model_id"),
        symbol: Symbol::new(r.get::<String, _>("symbol")),
        side,
        quantity: r.get("quantity"),
        price: decode_decimal(&r.get::<String, _>("price"))?,
        commission: decode_decimal(&r.get::<String, _>("commission"))?,
        levy: decode_decimal(&r.get::<String, _>("levy"))?,
        realized_pnl: decode_decimal(&r.get::<String, _>("realized_pnl"))?,
        executed_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::init_db;
    use tempfile::TempDir;

    async fn setup() -> (Repository, i64, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir
            .path()
            .join("test.db")
            .to_string_lossy()
            .to_string();
        let pool = init_db(&db_path).await.expect("init_db failed");
        let repo = Repository::new(pool);
        let model_id = repo
            .add_model("test", "rules", None, None, d("100000"))
            .await
            .unwrap();
        (repo, model_id, temp_dir)
    }

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    #[tokio::test]
    async fn test_trade_roundtrip() {
        let (repo, model_id, _dir) = setup().await;

        let trade = TradeRecord::sell(
            model_id,
            Symbol::new("600519"),
            100,
            d("1848"),
            d("55.44"),
            d("184.8"),
            d("16559.76"),
            Utc::now(),
        );
        repo.insert_trade(&trade).await.unwrap();

        let trades = repo.list_trades(model_id, 10).await.unwrap();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].side, Side::Sell);
        assert_eq!(trades[0].levy, d("184.8"));
        assert_eq!(trades[0].realized_pnl, d("16559.76"));
    }

    #[tokio::test]
    async fn test_sum_realized_pnl_mixes_buys_and_sells() {
        let (repo, model_id, _dir) = setup().await;

        let buy = TradeRecord::buy(
            model_id,
            Symbol::new("600519"),
            100,
            d("1680"),
            d("50.4"),
            Utc::now(),
        );
        repo.insert_trade(&buy).await.unwrap();
        let sell = TradeRecord::sell(
            model_id,
            Symbol::new("600519"),
            100,
            d("1848"),
            d("55.44"),
            d("184.8"),
            d("16559.76"),
            Utc::now(),
        );
        repo.insert_trade(&sell).await.unwrap();

        let total = repo.sum_realized_pnl(model_id).await.unwrap();
        assert_eq!(total, d("16559.76"));
    }

    #[tokio::test]
    async fn test_sum_realized_pnl_empty_is_zero() {
        let (repo, model_id, _dir) = setup().await;
        assert!(repo.sum_realized_pnl(model_id).await.unwrap().is_zero());
    }

    #[tokio::test]
    async fn test_conversation_roundtrip() {
        let (repo, model_id, _dir) = setup().await;

        repo.insert_conversation(model_id, "prompt text", "{}", "2024-03-01T10:00:00Z")
            .await
            .unwrap();
        let conversations = repo.list_conversations(model_id, 10).await.unwrap();
        assert_eq!(conversations.len(), 1);
        assert_eq!(conversations[0].prompt, "prompt text");
    }
}
