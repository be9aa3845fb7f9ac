//! Trading backend HTTP client

use async_trait::async_trait;
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

use super::error::SourceError;
use super::types::{AssetPair, InterestRate, OpenPosition};
use super::{AssetPairSource, InterestRateSource, PositionSource, QuoteSource};

#[derive(Debug, Deserialize)]
struct QuoteResponse {
    rate: Decimal,
}

/// One client for every backend read this service needs
pub struct BackendClient {
    base_url: String,
    client: reqwest::Client,
}

impl BackendClient {
    pub fn new(base_url: &str) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<R: DeserializeOwned>(&self, path: &str) -> Result<R, SourceError> {
        let response = self.client.get(self.url(path)).send().await?;

        if !response.status().is_success() {
            return Err(SourceError::Status {
                endpoint: path.to_string(),
                status: response.status().as_u16(),
            });
        }

        Ok(response.json().await?)
    }

    /// 404 means "no such quote"
    async fn get_quote(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Option<Decimal>, SourceError> {
        let response = self.client.get(self.url(path)).query(query).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let quote: QuoteResponse = response.json().await?;
                Ok(Some(quote.rate))
            }
            status => Err(SourceError::Status {
                endpoint: path.to_string(),
                status: status.as_u16(),
            }),
        }
    }
}

#[async_trait]
impl PositionSource for BackendClient {
    async fn get_active(&self) -> Result<Vec<OpenPosition>, SourceError> {
        self.get_json("/api/positions/active").await
    }
}

#[async_trait]
impl AssetPairSource for BackendClient {
    async fn list(&self) -> Result<Vec<AssetPair>, SourceError> {
        self.get_json("/api/asset-pairs").await
    }
}

#[async_trait]
impl InterestRateSource for BackendClient {
    async fn get_all_latest(&self) -> Result<Vec<InterestRate>, SourceError> {
        self.get_json("/api/interest-rates/latest").await
    }
}

#[async_trait]
impl QuoteSource for BackendClient {
    async fn quote_rate_for_quote_asset(
        &self,
        asset: &str,
        instrument: &str,
        legal_entity: &str,
    ) -> Result<Option<Decimal>, SourceError> {
        self.get_quote(
            "/api/quotes/quote-asset-rate",
            &[
                ("asset", asset),
                ("instrument", instrument),
                ("legalEntity", legal_entity),
            ],
        )
        .await
    }

    async fn quote(
        &self,
        from_asset: &str,
        to_asset: &str,
        legal_entity: &str,
    ) -> Result<Option<Decimal>, SourceError> {
        self.get_quote(
            "/api/quotes/convert",
            &[
                ("from", from_asset),
                ("to", to_asset),
                ("legalEntity", legal_entity),
            ],
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash() {
        let client = BackendClient::new("http://localhost:5000/").unwrap();
        assert_eq!(
            client.url("/api/asset-pairs"),
            "http://localhost:5000/api/asset-pairs"
        );
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_http_error() {
        let client = BackendClient::new("http://127.0.0.1:9").unwrap();
        let result = client.get_active().await;
        assert!(matches!(result, Err(SourceError::Http(_))));
    }
}
