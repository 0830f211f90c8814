//! Bybit v5 REST adapter for the exchange capability.
//!
//! Market data endpoints are public; account and order endpoints are
//! signed with HMAC-SHA256 over `timestamp + api_key + recv_window +
//! payload`, Bybit's v5 authentication scheme. The testnet and mainnet
//! share the same API surface, so one client covers both.

use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::Client;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::debug;

use crate::error::TradeError;
use crate::models::InstrumentLimits;

use super::exchange::{Exchange, OrderSide};

const MAINNET_URL: &str = "https://api.bybit.com";
const TESTNET_URL: &str = "https://api-testnet.bybit.com";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const RECV_WINDOW: u64 = 5000;

/// USDT-perpetual contracts live in the "linear" category.
const CATEGORY: &str = "linear";

/// Bybit "leverage not modified" — the requested leverage was already set.
const RET_LEVERAGE_NOT_MODIFIED: i64 = 110043;

type HmacSha256 = Hmac<Sha256>;

/// Client for Bybit v5 REST.
pub struct BybitClient {
    http: Client,
    base_url: String,
    api_key: String,
    api_secret: String,
}

impl BybitClient {
    /// Create a client with explicit credentials.
    pub fn new(api_key: String, api_secret: String, testnet: bool) -> Result<Self> {
        let http = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url(testnet).to_string(),
            api_key,
            api_secret,
        })
    }

    /// Create a client from `BYBIT_API_KEY`, `BYBIT_API_SECRET`, and
    /// the optional `BYBIT_TESTNET` environment variables.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("BYBIT_API_KEY").context("BYBIT_API_KEY not set")?;
        let api_secret = std::env::var("BYBIT_API_SECRET").context("BYBIT_API_SECRET not set")?;
        Self::new(api_key, api_secret, testnet_from_env())
    }

    /// Credential-free client: public market data works, signed
    /// endpoints return an error. Enough for dry runs and price checks.
    pub fn public(testnet: bool) -> Result<Self> {
        Self::new(String::new(), String::new(), testnet)
    }

    fn sign(&self, timestamp: i64, payload: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(self.api_secret.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(format!("{}{}{}{}", timestamp, self.api_key, RECV_WINDOW, payload).as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    async fn public_get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &str,
    ) -> Result<T> {
        let url = format!("{}{}?{}", self.base_url, path, query);
        debug!(url = %url, "Bybit GET");

        let response = self.http.get(&url).send().await.context("Request failed")?;
        parse_envelope(response).await
    }

    async fn signed_get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &str,
    ) -> Result<T> {
        self.require_credentials()?;

        let timestamp = Utc::now().timestamp_millis();
        let signature = self.sign(timestamp, query);
        let url = format!("{}{}?{}", self.base_url, path, query);
        debug!(url = %url, "Bybit signed GET");

        let response = self
            .http
            .get(&url)
            .header("X-BAPI-API-KEY", &self.api_key)
            .header("X-BAPI-TIMESTAMP", timestamp.to_string())
            .header("X-BAPI-RECV-WINDOW", RECV_WINDOW.to_string())
            .header("X-BAPI-SIGN", signature)
            .send()
            .await
            .context("Request failed")?;
        parse_envelope(response).await
    }

    async fn signed_post<B: Serialize, T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        ok_codes: &[i64],
    ) -> Result<T> {
        self.require_credentials()?;

        let body_json = serde_json::to_string(body).context("Failed to serialize request body")?;
        let timestamp = Utc::now().timestamp_millis();
        let signature = self.sign(timestamp, &body_json);
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "Bybit signed POST");

        let response = self
            .http
            .post(&url)
            .header("X-BAPI-API-KEY", &self.api_key)
            .header("X-BAPI-TIMESTAMP", timestamp.to_string())
            .header("X-BAPI-RECV-WINDOW", RECV_WINDOW.to_string())
            .header("X-BAPI-SIGN", signature)
            .header("Content-Type", "application/json")
            .body(body_json)
            .send()
            .await
            .context("Request failed")?;
        parse_envelope_with(response, ok_codes).await
    }

    fn require_credentials(&self) -> Result<()> {
        if self.api_key.is_empty() || self.api_secret.is_empty() {
            bail!("API credentials not configured (set BYBIT_API_KEY / BYBIT_API_SECRET)");
        }
        Ok(())
    }

    async fn fetch_ticker(&self, symbol: &str) -> Result<Decimal> {
        let query = format!("category={}&symbol={}", CATEGORY, symbol);
        let result: TickerResult = self.public_get("/v5/market/tickers", &query).await?;

        let ticker = result
            .list
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("No ticker returned for {}", symbol))?;

        Decimal::from_str(&ticker.last_price)
            .with_context(|| format!("Unparseable last price '{}'", ticker.last_price))
    }

    async fn fetch_limits(&self, symbol: &str) -> Result<InstrumentLimits> {
        let query = format!("category={}&symbol={}", CATEGORY, symbol);
        let result: InstrumentResult = self
            .public_get("/v5/market/instruments-info", &query)
            .await?;

        let instrument = result
            .list
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("No instrument info returned for {}", symbol))?;

        let min_qty = Decimal::from_str(&instrument.lot_size_filter.min_order_qty)
            .context("Unparseable minOrderQty")?;
        let qty_step = Decimal::from_str(&instrument.lot_size_filter.qty_step)
            .context("Unparseable qtyStep")?;
        let max_leverage = Decimal::from_str(&instrument.leverage_filter.max_leverage)
            .context("Unparseable maxLeverage")?
            .to_u32()
            .ok_or_else(|| anyhow!("maxLeverage out of range"))?;
        let min_notional = if instrument.lot_size_filter.min_notional_value.is_empty() {
            Decimal::ZERO
        } else {
            Decimal::from_str(&instrument.lot_size_filter.min_notional_value)
                .context("Unparseable minNotionalValue")?
        };

        Ok(InstrumentLimits {
            min_qty,
            qty_step,
            max_leverage,
            min_notional,
        })
    }

    async fn fetch_balance(&self) -> Result<Decimal> {
        let query = "accountType=UNIFIED";
        let result: WalletResult = self.signed_get("/v5/account/wallet-balance", query).await?;

        let account = result
            .list
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("No wallet account returned"))?;

        if account.total_available_balance.is_empty() {
            return Ok(Decimal::ZERO);
        }
        Decimal::from_str(&account.total_available_balance)
            .context("Unparseable totalAvailableBalance")
    }

    async fn send_leverage(&self, symbol: &str, leverage: u32) -> Result<()> {
        let request = SetLeverageRequest {
            category: CATEGORY,
            symbol,
            buy_leverage: leverage.to_string(),
            sell_leverage: leverage.to_string(),
        };

        let _: EmptyResult = self
            .signed_post(
                "/v5/position/set-leverage",
                &request,
                &[0, RET_LEVERAGE_NOT_MODIFIED],
            )
            .await?;
        Ok(())
    }

    async fn send_order(&self, symbol: &str, side: OrderSide, qty: Decimal) -> Result<String> {
        let request = CreateOrderRequest {
            category: CATEGORY,
            symbol,
            side: side.as_str(),
            order_type: "Market",
            qty: qty.to_string(),
            order_link_id: uuid::Uuid::new_v4().to_string(),
        };

        let result: OrderResult = self.signed_post("/v5/order/create", &request, &[0]).await?;
        Ok(result.order_id)
    }
}

#[async_trait]
impl Exchange for BybitClient {
    async fn get_price(&self, symbol: &str) -> Result<Decimal, TradeError> {
        self.fetch_ticker(symbol)
            .await
            .map_err(|e| TradeError::PriceFetch {
                symbol: symbol.to_string(),
                reason: format!("{:#}", e),
            })
    }

    async fn get_instrument_limits(
        &self,
        symbol: &str,
    ) -> Result<InstrumentLimits, TradeError> {
        self.fetch_limits(symbol)
            .await
            .map_err(|e| TradeError::LimitsFetch {
                symbol: symbol.to_string(),
                reason: format!("{:#}", e),
            })
    }

    async fn get_balance(&self) -> Result<Decimal, TradeError> {
        self.fetch_balance()
            .await
            .map_err(|e| TradeError::BalanceFetch {
                reason: format!("{:#}", e),
            })
    }

    async fn set_leverage(&self, symbol: &str, leverage: u32) -> Result<(), TradeError> {
        self.send_leverage(symbol, leverage)
            .await
            .map_err(|e| TradeError::Leverage {
                symbol: symbol.to_string(),
                reason: format!("{:#}", e),
            })
    }

    async fn place_order(
        &self,
        symbol: &str,
        side: OrderSide,
        qty: Decimal,
    ) -> Result<String, TradeError> {
        self.send_order(symbol, side, qty)
            .await
            .map_err(|e| TradeError::OrderPlacement {
                symbol: symbol.to_string(),
                side,
                reason: format!("{:#}", e),
            })
    }
}

fn base_url(testnet: bool) -> &'static str {
    if testnet {
        TESTNET_URL
    } else {
        MAINNET_URL
    }
}

pub fn testnet_from_env() -> bool {
    std::env::var("BYBIT_TESTNET")
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

async fn parse_envelope<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    parse_envelope_with(response, &[0]).await
}

async fn parse_envelope_with<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
    ok_codes: &[i64],
) -> Result<T> {
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        bail!("HTTP {} - {}", status, body);
    }

    let envelope: ApiEnvelope<T> = response
        .json()
        .await
        .context("Failed to parse API response")?;

    if !ok_codes.contains(&envelope.ret_code) {
        bail!("API error {}: {}", envelope.ret_code, envelope.ret_msg);
    }

    envelope
        .result
        .ok_or_else(|| anyhow!("API response missing result payload"))
}

// ==================== Wire types ====================

#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    #[serde(rename = "retCode")]
    ret_code: i64,
    #[serde(rename = "retMsg", default)]
    ret_msg: String,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct TickerResult {
    list: Vec<Ticker>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Ticker {
    last_price: String,
}

#[derive(Debug, Deserialize)]
struct InstrumentResult {
    list: Vec<Instrument>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Instrument {
    lot_size_filter: LotSizeFilter,
    leverage_filter: LeverageFilter,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LotSizeFilter {
    min_order_qty: String,
    qty_step: String,
    #[serde(default)]
    min_notional_value: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LeverageFilter {
    max_leverage: String,
}

#[derive(Debug, Deserialize)]
struct WalletResult {
    list: Vec<WalletAccount>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WalletAccount {
    #[serde(default)]
    total_available_balance: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SetLeverageRequest<'a> {
    category: &'a str,
    symbol: &'a str,
    buy_leverage: String,
    sell_leverage: String,
}

#[derive(Debug, Deserialize)]
struct EmptyResult {}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateOrderRequest<'a> {
    category: &'a str,
    symbol: &'a str,
    side: &'a str,
    order_type: &'a str,
    qty: String,
    order_link_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderResult {
    order_id: String,
}
