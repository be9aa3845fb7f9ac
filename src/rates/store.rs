//! Durable settings store seam

use std::collections::BTreeMap;

use async_trait::async_trait;
use dashmap::DashMap;

use super::error::RateSettingsError;
use super::types::RateKind;

/// Durable home of rate settings, keyed `(kind, natural key)`.
/// Values are JSON documents.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn read_all(&self, kind: RateKind) -> Result<Vec<(String, String)>, RateSettingsError>;

    async fn read_one(
        &self,
        kind: RateKind,
        key: &str,
    ) -> Result<Option<String>, RateSettingsError>;

    /// Upsert by natural key; keys not mentioned are left as they are
    async fn merge(
        &self,
        kind: RateKind,
        entries: Vec<(String, String)>,
    ) -> Result<(), RateSettingsError>;
}

#[derive(Default)]
pub struct InMemorySettingsStore {
    kinds: DashMap<RateKind, BTreeMap<String, String>>,
}

impl InMemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SettingsStore for InMemorySettingsStore {
    async fn read_all(&self, kind: RateKind) -> Result<Vec<(String, String)>, RateSettingsError> {
        Ok(self
            .kinds
            .get(&kind)
            .map(|rows| rows.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default())
    }

    async fn read_one(
        &self,
        kind: RateKind,
        key: &str,
    ) -> Result<Option<String>, RateSettingsError> {
        Ok(self
            .kinds
            .get(&kind)
            .and_then(|rows| rows.get(key).cloned()))
    }

    async fn merge(
        &self,
        kind: RateKind,
        entries: Vec<(String, String)>,
    ) -> Result<(), RateSettingsError> {
        self.kinds.entry(kind).or_default().extend(entries);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_merge_upserts_by_key() {
        let store = InMemorySettingsStore::new();
        store
            .merge(
                RateKind::OrderExecution,
                vec![("A".into(), "1".into()), ("B".into(), "1".into())],
            )
            .await
            .unwrap();
        store
            .merge(RateKind::OrderExecution, vec![("B".into(), "2".into())])
            .await
            .unwrap();

        let all = store.read_all(RateKind::OrderExecution).await.unwrap();
        assert_eq!(
            all,
            vec![("A".to_string(), "1".to_string()), ("B".to_string(), "2".to_string())]
        );
        assert!(store.read_all(RateKind::OvernightSwap).await.unwrap().is_empty());
    }
}
