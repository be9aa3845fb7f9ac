//! Three-level rate settings resolution: fast cache → durable store → default

use std::sync::Arc;

use chrono::Utc;

use super::cache::FastCache;
use super::error::RateSettingsError;
use super::store::SettingsStore;
use super::types::{
    ON_BEHALF_KEY, OnBehalfRate, OrderExecutionRate, OvernightSwapRate, RateSetting,
};
use crate::config::DefaultRateSettings;
use crate::events::{EventPublisher, ServiceEvent};

pub struct RateSettingsService {
    cache: Arc<dyn FastCache>,
    store: Arc<dyn SettingsStore>,
    publisher: Arc<dyn EventPublisher>,
    defaults: DefaultRateSettings,
}

impl RateSettingsService {
    pub fn new(
        cache: Arc<dyn FastCache>,
        store: Arc<dyn SettingsStore>,
        publisher: Arc<dyn EventPublisher>,
        defaults: DefaultRateSettings,
    ) -> Self {
        Self {
            cache,
            store,
            publisher,
            defaults,
        }
    }

    pub async fn get_order_execution_rate(
        &self,
        asset_pair_id: &str,
    ) -> Result<OrderExecutionRate, RateSettingsError> {
        self.get(asset_pair_id).await
    }

    pub async fn get_overnight_swap_rate(
        &self,
        asset_pair_id: &str,
    ) -> Result<OvernightSwapRate, RateSettingsError> {
        self.get(asset_pair_id).await
    }

    pub async fn get_on_behalf_rate(&self) -> Result<OnBehalfRate, RateSettingsError> {
        self.get(ON_BEHALF_KEY).await
    }

    /// Resolve one rate.
    ///
    /// A cache miss repopulates the kind's whole namespace from the durable
    /// store. A key unknown to both levels resolves to the configured default,
    /// which is cached under that key only and never written to the durable
    /// store.
    pub async fn get<R: RateSetting>(&self, key: &str) -> Result<R, RateSettingsError> {
        let namespace = R::KIND.cache_key();

        if let Some(cached) = self.cache.get(&namespace, key).await? {
            match serde_json::from_str::<R>(&cached) {
                Ok(rate) => {
                    tracing::debug!(kind = %R::KIND, key, "Rate settings cache hit");
                    return Ok(rate);
                }
                Err(e) => tracing::warn!(
                    kind = %R::KIND,
                    key,
                    error = %e,
                    "Corrupt cached rate, reloading from durable store"
                ),
            }
        }

        tracing::debug!(kind = %R::KIND, key, "Rate settings cache miss");
        let stored = self.refresh_from_store::<R>().await?;
        if let Some(rate) = stored.into_iter().find(|r| r.key() == key) {
            return Ok(rate);
        }

        tracing::warn!(
            kind = %R::KIND,
            key,
            "No rate configured, using the default one"
        );
        let rate = R::from_default(&self.defaults, key);
        self.cache
            .set(&namespace, key, serde_json::to_string(&rate)?)
            .await?;
        Ok(rate)
    }

    /// Every rate of a kind, served from the fast cache when it has any
    pub async fn get_all<R: RateSetting>(&self) -> Result<Vec<R>, RateSettingsError> {
        let cached = self.cache.get_all(&R::KIND.cache_key()).await?;

        if !cached.is_empty() {
            let mut rates = cached
                .values()
                .map(|json| serde_json::from_str::<R>(json))
                .collect::<Result<Vec<_>, _>>()?;
            rates.sort_by_key(|r| r.key());
            return Ok(rates);
        }

        self.refresh_from_store::<R>().await
    }

    /// Validate, default the legal entity, merge into the durable store,
    /// rebuild the fast cache for the kind and announce the change.
    pub async fn replace_all<R: RateSetting>(
        &self,
        mut rates: Vec<R>,
    ) -> Result<(), RateSettingsError> {
        for rate in &mut rates {
            rate.validate()?;
            let legal_entity = rate.legal_entity_mut();
            if legal_entity.as_deref().is_none_or(|le| le.trim().is_empty()) {
                *legal_entity = Some(self.defaults.default_legal_entity.clone());
            }
        }

        let entries = rates
            .iter()
            .map(|rate| serde_json::to_string(rate).map(|json| (rate.key(), json)))
            .collect::<Result<Vec<_>, _>>()?;
        let count = entries.len();

        self.store.merge(R::KIND, entries).await?;

        // The cache mirrors the merged durable set, not just this request
        let merged = self.store.read_all(R::KIND).await?;
        self.cache
            .replace_all(&R::KIND.cache_key(), merged)
            .await?;

        self.publisher
            .publish(ServiceEvent::RateSettingsChanged {
                kind: R::KIND,
                timestamp: Utc::now(),
            })
            .await?;

        tracing::info!(kind = %R::KIND, count, "Rate settings replaced");
        Ok(())
    }

    pub async fn replace_on_behalf_rate(&self, rate: OnBehalfRate) -> Result<(), RateSettingsError> {
        self.replace_all(vec![rate]).await
    }

    /// Reload the kind from the durable store. A non-empty result replaces
    /// the cached namespace, an empty one leaves the cache untouched.
    async fn refresh_from_store<R: RateSetting>(&self) -> Result<Vec<R>, RateSettingsError> {
        let rows = self.store.read_all(R::KIND).await?;
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let rates = rows
            .iter()
            .map(|(_, json)| serde_json::from_str::<R>(json))
            .collect::<Result<Vec<_>, _>>()?;

        self.cache.replace_all(&R::KIND.cache_key(), rows).await?;
        tracing::debug!(kind = %R::KIND, count = rates.len(), "Fast cache repopulated");
        Ok(rates)
    }
}
