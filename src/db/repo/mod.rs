//! Repository layer for ledger operations.
//!
//! Methods are organized across submodules by domain:
//! - `positions.rs` - position and account-value operations
//! - `trades.rs` - trade and conversation operations
//!
//! Decimal values are stored as canonical strings and quantities as
//! integers; every call is its own transaction.

mod positions;
mod trades;

pub use positions::AccountValueRow;
pub use trades::ConversationRow;

use crate::domain::Decimal;
use sqlx::sqlite::SqlitePool;
use sqlx::Row;

/// A configured trading persona: its own capital, ledger rows, and
/// decision source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRow {
    pub id: i64,
    pub name: String,
    /// "rules" or "llm".
    pub decision_mode: String,
    pub provider_id: Option<i64>,
    pub model_name: Option<String>,
    pub initial_capital: Decimal,
}

/// LLM endpoint credentials for llm-mode models.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderRow {
    pub id: i64,
    pub name: String,
    pub api_url: String,
    pub api_key: String,
}

/// Repository for ledger operations.
pub struct Repository {
    pool: SqlitePool,
}

pub(crate) fn decode_decimal(raw: &str) -> Result<Decimal, sqlx::Error> {
    Decimal::from_str_canonical(raw).map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // =========================================================================
    // Provider operations
    // =========================================================================

    pub async fn add_provider(
        &self,
        name: &str,
        api_url: &str,
        api_key: &str,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO providers (name, api_url, api_key) VALUES (?, ?, ?)",
        )
        .bind(name)
        .bind(api_url)
        .bind(api_key)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn get_provider(&self, id: i64) -> Result<Option<ProviderRow>, sqlx::Error> {
        let row = sqlx::query("SELECT id, name, api_url, api_key FROM providers WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| ProviderRow {
            id: r.get("id"),
            name: r.get("name"),
            api_url: r.get("api_url"),
            api_key: r.get("api_key"),
        }))
    }

    pub async fn list_providers(&self) -> Result<Vec<ProviderRow>, sqlx::Error> {
        let rows =
            sqlx::query("SELECT id, name, api_url, api_key FROM providers ORDER BY id ASC")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows
            .into_iter()
            .map(|r| ProviderRow {
                id: r.get("id"),
                name: r.get("name"),
                api_url: r.get("api_url"),
                api_key: r.get("api_key"),
            })
            .collect())
    }

    pub async fn delete_provider(&self, id: i64) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM providers WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // =========================================================================
    // Model operations
    // =========================================================================

    pub async fn add_model(
        &self,
        name: &str,
        decision_mode: &str,
        provider_id: Option<i64>,
        model_name: Option<&str>,
        initial_capital: Decimal,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO models (name, decision_mode, provider_id, model_name, initial_capital)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(name)
        .bind(decision_mode)
        .bind(provider_id)
        .bind(model_name)
        .bind(initial_capital.to_canonical_string())
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn get_model(&self, id: i64) -> Result<Option<ModelRow>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT id, name, decision_mode, provider_id, model_name, initial_capital
            FROM models WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(model_from_row).transpose()
    }

    pub async fn list_models(&self) -> Result<Vec<ModelRow>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, decision_mode, provider_id, model_name, initial_capital
            FROM models ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(model_from_row).collect()
    }

    /// Delete a model and every ledger row attached to it.
    pub async fn delete_model(&self, id: i64) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        for table in ["positions", "trades", "account_values", "conversations"] {
            sqlx::query(&format!("DELETE FROM {} WHERE model_id = ?", table))
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        sqlx::query("DELETE FROM models WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }
}

fn model_from_row(r: sqlx::sqlite::SqliteRow) -> Result<ModelRow, sqlx::Error> {
    let initial_capital = decode_decimal(&r.get::<String, _>("initial_capital"))?;
    Ok(ModelRow {
        id: r.get("id"),
        name: r.get("name"),
        decision_mode: r.get("decision_mode"),
        provider_id: r.get("provider_id"),
        model_name: r.get("model_name"),
        initial_capital,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::init_db;
    use tempfile::TempDir;

    async fn setup() -> (Repository, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir
            .path()
            .join("test.db")
            .to_string_lossy()
            .to_string();
        let pool = init_db(&db_path).await.expect("init_db failed");
        (Repository::new(pool), temp_dir)
    }

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    #[tokio::test]
    async fn test_model_roundtrip() {
        let (repo, _dir) = setup().await;

        let id = repo
            .add_model("momentum", "rules", None, None, d("100000"))
            .await
            .unwrap();
        let model = repo.get_model(id).await.unwrap().unwrap();
        assert_eq!(model.name, "momentum");
        assert_eq!(model.decision_mode, "rules");
        assert_eq!(model.initial_capital, d("100000"));
        assert_eq!(model.provider_id, None);
    }

    #[tokio::test]
    async fn test_llm_model_references_provider() {
        let (repo, _dir) = setup().await;

        let provider_id = repo
            .add_provider("deepseek", "https://api.deepseek.com", "sk-test")
            .await
            .unwrap();
        let id = repo
            .add_model(
                "llm-trader",
                "llm",
                Some(provider_id),
                Some("deepseek-chat"),
                d("200000"),
            )
            .await
            .unwrap();

        let model = repo.get_model(id).await.unwrap().unwrap();
        assert_eq!(model.provider_id, Some(provider_id));
        assert_eq!(model.model_name.as_deref(), Some("deepseek-chat"));

        let provider = repo.get_provider(provider_id).await.unwrap().unwrap();
        assert_eq!(provider.api_url, "https://api.deepseek.com");
    }

    #[tokio::test]
    async fn test_delete_model_removes_dependents() {
        let (repo, _dir) = setup().await;

        let id = repo
            .add_model("short-lived", "rules", None, None, d("100000"))
            .await
            .unwrap();
        repo.record_account_value(id, d("100000"), d("100000"), Decimal::zero(), "2024-03-01T10:00:00Z")
            .await
            .unwrap();

        repo.delete_model(id).await.unwrap();
        assert!(repo.get_model(id).await.unwrap().is_none());
        assert!(repo.account_value_history(id, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_models_ordered_by_id() {
        let (repo, _dir) = setup().await;
        let a = repo.add_model("a", "rules", None, None, d("1")).await.unwrap();
        let b = repo.add_model("b", "rules", None, None, d("2")).await.unwrap();

        let models = repo.list_models().await.unwrap();
        assert_eq!(models.len(), 2);
        assert_eq!(models[0].id, a);
        assert_eq!(models[1].id, b);
    }
}
