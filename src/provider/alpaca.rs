use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::model::{Feed, Quote, Snapshot, Trade};

use super::{FetchError, MarketData};

const BASE_URL: &str = "https://data.alpaca.markets";

const KEY_HEADER: &str = "APCA-API-KEY-ID";
const SECRET_HEADER: &str = "APCA-API-SECRET-KEY";

/// Alpaca Market Data v2 client (latest trade / latest quote endpoints).
#[derive(Clone)]
pub struct AlpacaClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    secret_key: String,
}

impl AlpacaClient {
    pub fn new(api_key: String, secret_key: String) -> Self {
        Self::with_base_url(BASE_URL.to_string(), api_key, secret_key)
    }

    /// Point the client at a different data endpoint. Tests use this to
    /// target a local stub server.
    pub fn with_base_url(base_url: String, api_key: String, secret_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            api_key,
            secret_key,
        }
    }

    /// Latest trade for `symbol` on `feed`.
    pub async fn latest_trade(&self, symbol: &str, feed: Feed) -> Result<Trade, FetchError> {
        let url = format!("{}/v2/stocks/trades/latest", self.base_url);
        let mut body: LatestTrades = self.get_json(&url, symbol, feed).await?;
        let dto = body
            .trades
            .remove(symbol)
            .ok_or_else(|| FetchError::MissingSymbol(symbol.to_string()))?;
        Ok(Trade {
            price: dto.price,
            size: dto.size,
            timestamp: dto.timestamp,
            exchange: dto.exchange,
        })
    }

    /// Latest quote for `symbol` on `feed`.
    pub async fn latest_quote(&self, symbol: &str, feed: Feed) -> Result<Quote, FetchError> {
        let url = format!("{}/v2/stocks/quotes/latest", self.base_url);
        let mut body: LatestQuotes = self.get_json(&url, symbol, feed).await?;
        let dto = body
            .quotes
            .remove(symbol)
            .ok_or_else(|| FetchError::MissingSymbol(symbol.to_string()))?;
        Ok(Quote {
            bid_price: dto.bid_price,
            ask_price: dto.ask_price,
            bid_size: dto.bid_size,
            ask_size: dto.ask_size,
            timestamp: dto.timestamp,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        symbol: &str,
        feed: Feed,
    ) -> Result<T, FetchError> {
        let response = self
            .http
            .get(url)
            .query(&[("symbols", symbol), ("feed", feed.as_str())])
            .header(KEY_HEADER, &self.api_key)
            .header(SECRET_HEADER, &self.secret_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = format!(
                "status {}, response: {}",
                status,
                body.chars().take(200).collect::<String>()
            );
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => FetchError::Auth(detail),
                StatusCode::TOO_MANY_REQUESTS => FetchError::RateLimited(detail),
                _ => FetchError::Api(detail),
            });
        }

        Ok(response.json().await?)
    }
}

#[derive(Debug, Deserialize)]
struct LatestTrades {
    trades: HashMap<String, TradeDto>,
}

#[derive(Debug, Deserialize)]
struct TradeDto {
    #[serde(rename = "t")]
    timestamp: String,
    #[serde(rename = "p")]
    price: f64,
    #[serde(rename = "s", default)]
    size: f64,
    #[serde(rename = "x", default)]
    exchange: String,
}

#[derive(Debug, Deserialize)]
struct LatestQuotes {
    quotes: HashMap<String, QuoteDto>,
}

#[derive(Debug, Deserialize)]
struct QuoteDto {
    #[serde(rename = "t")]
    timestamp: String,
    #[serde(rename = "bp")]
    bid_price: f64,
    #[serde(rename = "ap")]
    ask_price: f64,
    #[serde(rename = "bs", default)]
    bid_size: f64,
    #[serde(rename = "as", default)]
    ask_size: f64,
}

#[async_trait]
impl MarketData for AlpacaClient {
    fn name(&self) -> &'static str {
        "alpaca"
    }

    async fn fetch_latest(&self, symbol: &str, feed: Feed) -> Result<Snapshot, FetchError> {
        let trade = self.latest_trade(symbol, feed).await?;
        let quote = self.latest_quote(symbol, feed).await?;
        Ok(Snapshot::assemble(&trade, &quote))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> AlpacaClient {
        AlpacaClient::with_base_url(server.uri(), "test-key".into(), "test-secret".into())
    }

    async fn mount_trade(server: &MockServer, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/v2/stocks/trades/latest"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    async fn mount_quote(server: &MockServer, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/v2/stocks/quotes/latest"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    fn nvda_trade_body() -> serde_json::Value {
        json!({"trades": {"NVDA": {"t": "2024-01-01T15:30:01Z", "p": 904.70, "s": 100, "x": "V"}}})
    }

    fn nvda_quote_body() -> serde_json::Value {
        json!({"quotes": {"NVDA": {
            "t": "2024-01-01T15:30:00Z", "bp": 904.50, "ap": 904.80, "bs": 3, "as": 5
        }}})
    }

    #[tokio::test]
    async fn fetch_latest_combines_trade_and_quote() {
        let server = MockServer::start().await;
        mount_trade(&server, nvda_trade_body()).await;
        mount_quote(&server, nvda_quote_body()).await;

        let snapshot = client_for(&server)
            .fetch_latest("NVDA", Feed::Iex)
            .await
            .unwrap();

        assert_eq!(snapshot.bid_price, 904.50);
        assert_eq!(snapshot.ask_price, 904.80);
        assert_eq!(snapshot.last_price, 904.70);
        // the quote timestamp is the one propagated, not the trade's
        assert_eq!(snapshot.timestamp, "2024-01-01T15:30:00Z");
    }

    #[tokio::test]
    async fn requests_carry_credentials_and_feed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/stocks/trades/latest"))
            .and(query_param("symbols", "NVDA"))
            .and(query_param("feed", "boats"))
            .and(header(KEY_HEADER, "test-key"))
            .and(header(SECRET_HEADER, "test-secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(nvda_trade_body()))
            .expect(1)
            .mount(&server)
            .await;

        let trade = client_for(&server)
            .latest_trade("NVDA", Feed::Boats)
            .await
            .unwrap();
        assert_eq!(trade.price, 904.70);
        assert_eq!(trade.size, 100.0);
        assert_eq!(trade.exchange, "V");
    }

    #[tokio::test]
    async fn inverted_quote_is_passed_through() {
        let server = MockServer::start().await;
        mount_trade(&server, nvda_trade_body()).await;
        mount_quote(
            &server,
            json!({"quotes": {"NVDA": {
                "t": "2024-01-01T15:30:00Z", "bp": 905.10, "ap": 904.20, "bs": 1, "as": 1
            }}}),
        )
        .await;

        let snapshot = client_for(&server)
            .fetch_latest("NVDA", Feed::Iex)
            .await
            .unwrap();
        assert!(snapshot.bid_price > snapshot.ask_price);
    }

    #[tokio::test]
    async fn fetch_is_idempotent_up_to_update_time() {
        let server = MockServer::start().await;
        mount_trade(&server, nvda_trade_body()).await;
        mount_quote(&server, nvda_quote_body()).await;

        let client = client_for(&server);
        let first = client.fetch_latest("NVDA", Feed::Iex).await.unwrap();
        let second = client.fetch_latest("NVDA", Feed::Iex).await.unwrap();

        assert_eq!(first.bid_price, second.bid_price);
        assert_eq!(first.ask_price, second.ask_price);
        assert_eq!(first.last_price, second.last_price);
        assert_eq!(first.timestamp, second.timestamp);
    }

    #[tokio::test]
    async fn missing_symbol_in_trades() {
        let server = MockServer::start().await;
        mount_trade(&server, json!({"trades": {}})).await;
        mount_quote(&server, nvda_quote_body()).await;

        let err = client_for(&server)
            .fetch_latest("NVDA", Feed::Iex)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::MissingSymbol(ref s) if s == "NVDA"));
    }

    #[tokio::test]
    async fn missing_symbol_in_quotes() {
        let server = MockServer::start().await;
        mount_trade(&server, nvda_trade_body()).await;
        mount_quote(&server, json!({"quotes": {"AMD": {
            "t": "2024-01-01T15:30:00Z", "bp": 1.0, "ap": 2.0, "bs": 1, "as": 1
        }}}))
        .await;

        let err = client_for(&server)
            .fetch_latest("NVDA", Feed::Iex)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::MissingSymbol(_)));
    }

    #[tokio::test]
    async fn forbidden_maps_to_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/stocks/trades/latest"))
            .respond_with(
                ResponseTemplate::new(403)
                    .set_body_json(json!({"message": "subscription does not permit this feed"})),
            )
            .mount(&server)
            .await;

        let err = client_for(&server)
            .latest_trade("NVDA", Feed::Boats)
            .await
            .unwrap_err();
        match err {
            FetchError::Auth(detail) => assert!(detail.contains("403")),
            other => panic!("expected auth error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn too_many_requests_maps_to_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/stocks/quotes/latest"))
            .respond_with(ResponseTemplate::new(429).set_body_string("too many requests"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .latest_quote("NVDA", Feed::Iex)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::RateLimited(_)));
    }

    #[tokio::test]
    async fn server_error_maps_to_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/stocks/trades/latest"))
            .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .latest_trade("NVDA", Feed::Iex)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Api(_)));
    }
}
