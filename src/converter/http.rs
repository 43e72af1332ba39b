//! HTTP rate provider (freecurrencyapi-compatible).
//!
//! `GET {base_url}/v1/latest?apikey=..&currencies=TO&base_currency=FROM`
//! answers `{"data": {"TO": <rate>}}`.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{apply_rate, checked_rate, ConversionError, CurrencyConverter};
use crate::account::CurrencyCode;
use crate::money::Money;

#[derive(Debug, Deserialize)]
struct LatestRatesResponse {
    data: HashMap<String, serde_json::Value>,
}

pub struct HttpRateConverter {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpRateConverter {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ConversionError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    async fn fetch_rate(
        &self,
        from: &CurrencyCode,
        to: &CurrencyCode,
    ) -> Result<Option<Decimal>, ConversionError> {
        let url = format!("{}/v1/latest", self.base_url);
        let resp = self
            .client
            .get(&url)
            .query(&[
                ("apikey", self.api_key.as_str()),
                ("currencies", to.as_str()),
                ("base_currency", from.as_str()),
            ])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ConversionError::Status(status.as_u16()));
        }

        let body: LatestRatesResponse = resp
            .json()
            .await
            .map_err(|e| ConversionError::Malformed(e.to_string()))?;

        body.data.get(to.as_str()).map(parse_rate).transpose()
    }
}

/// Rates arrive as JSON numbers; go through their text form to keep every digit.
fn parse_rate(value: &serde_json::Value) -> Result<Decimal, ConversionError> {
    let text = match value {
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => s.clone(),
        other => return Err(ConversionError::Malformed(format!("rate is {}", other))),
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|e| ConversionError::Malformed(format!("rate '{}': {}", text, e)))
}

#[async_trait]
impl CurrencyConverter for HttpRateConverter {
    async fn convert(
        &self,
        from: &CurrencyCode,
        to: &CurrencyCode,
        amount: Money,
    ) -> Result<Money, ConversionError> {
        let rate = match self.fetch_rate(from, to).await {
            Ok(rate) => checked_rate(from, to, rate)?,
            Err(e) => {
                warn!(from = %from, to = %to, error = %e, "Rate lookup failed");
                return Err(e);
            }
        };
        let converted = apply_rate(from, to, amount, rate)?;
        debug!(
            from = %from,
            to = %to,
            rate = %rate,
            amount = %amount,
            converted = %converted,
            "Rate applied"
        );
        Ok(converted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Query;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{Json, Router};
    use rust_decimal_macros::dec;

    fn code(s: &str) -> CurrencyCode {
        CurrencyCode::new(s).unwrap()
    }

    async fn latest(
        Query(params): Query<HashMap<String, String>>,
    ) -> Result<Json<serde_json::Value>, StatusCode> {
        if params.get("apikey").map(String::as_str) != Some("test-key") {
            return Err(StatusCode::UNAUTHORIZED);
        }
        let rate = match (
            params.get("base_currency").map(String::as_str),
            params.get("currencies").map(String::as_str),
        ) {
            (Some("USD"), Some("EUR")) => serde_json::json!(0.9),
            (Some("USD"), Some("JPY")) => serde_json::json!(0),
            _ => return Ok(Json(serde_json::json!({ "data": {} }))),
        };
        let mut data = serde_json::Map::new();
        data.insert(params["currencies"].clone(), rate);
        Ok(Json(serde_json::json!({ "data": data })))
    }

    async fn spawn_provider() -> String {
        let app = Router::new().route("/v1/latest", get(latest));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn converter(base_url: &str, key: &str) -> HttpRateConverter {
        HttpRateConverter::new(base_url, key, Duration::from_secs(2)).unwrap()
    }

    #[test]
    fn test_parse_rate() {
        assert_eq!(parse_rate(&serde_json::json!(0.9012)).unwrap(), dec!(0.9012));
        assert_eq!(parse_rate(&serde_json::json!("1.25")).unwrap(), dec!(1.25));
        assert!(parse_rate(&serde_json::json!(null)).is_err());
    }

    #[tokio::test]
    async fn test_convert_over_http() {
        let base = spawn_provider().await;
        let out = converter(&base, "test-key")
            .convert(&code("USD"), &code("EUR"), Money::new(dec!(100.00)))
            .await
            .unwrap();
        assert_eq!(out, Money::new(dec!(90.00)));
    }

    #[tokio::test]
    async fn test_missing_rate_in_response() {
        let base = spawn_provider().await;
        let err = converter(&base, "test-key")
            .convert(&code("EUR"), &code("GBP"), Money::new(dec!(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, ConversionError::MissingRate { .. }));
    }

    #[tokio::test]
    async fn test_zero_rate_rejected() {
        let base = spawn_provider().await;
        let err = converter(&base, "test-key")
            .convert(&code("USD"), &code("JPY"), Money::new(dec!(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, ConversionError::InvalidRate { .. }));
    }

    #[tokio::test]
    async fn test_non_success_status() {
        let base = spawn_provider().await;
        let err = converter(&base, "wrong-key")
            .convert(&code("USD"), &code("EUR"), Money::new(dec!(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, ConversionError::Status(401)));
    }

    #[tokio::test]
    async fn test_unreachable_provider() {
        // Nothing listens on port 9 (discard) in the test environment
        let err = converter("http://127.0.0.1:9", "test-key")
            .convert(&code("USD"), &code("EUR"), Money::new(dec!(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, ConversionError::Transport(_)));
    }
}
