//! Explicit engine registry: one trading engine per configured model,
//! keyed by model id.
//!
//! Rebuilt from ledger rows at startup and kept in sync by the model API;
//! nothing here is ambient process state.

use super::cycle::TradingEngine;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct EngineRegistry {
    engines: RwLock<HashMap<i64, Arc<TradingEngine>>>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, engine: Arc<TradingEngine>) {
        let mut guard = self.engines.write().await;
        guard.insert(engine.model_id(), engine);
    }

    pub async fn remove(&self, model_id: i64) -> Option<Arc<TradingEngine>> {
        let mut guard = self.engines.write().await;
        guard.remove(&model_id)
    }

    pub async fn get(&self, model_id: i64) -> Option<Arc<TradingEngine>> {
        let guard = self.engines.read().await;
        guard.get(&model_id).cloned()
    }

    /// All registered engines in model-id order, for deterministic cycle
    /// sweeps.
    pub async fn engines(&self) -> Vec<Arc<TradingEngine>> {
        let guard = self.engines.read().await;
        let mut engines: Vec<_> = guard.values().cloned().collect();
        engines.sort_by_key(|e| e.model_id());
        engines
    }

    pub async fn len(&self) -> usize {
        self.engines.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
