//! KuCoin Spot adapter (REST).
//!
//! Public market data works without credentials, so demo mode still quotes
//! live prices. Balance and order endpoints are signed with API key version 2.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::Sha256;
use tracing::debug;

use super::{
    symbols::to_kucoin_symbol,
    traits::{ExchangeGateway, ExchangeResult},
    types::{MarketOrder, OrderAck},
};

use crate::config::KucoinConfig;
use crate::constants::kucoin as k;
use crate::error::ExchangeError;

type HmacSha256 = Hmac<Sha256>;

#[derive(Deserialize)]
struct Envelope<T> {
    code: String,
    data: Option<T>,
    msg: Option<String>,
}

#[derive(Deserialize)]
struct Level1 {
    price: Option<String>,
}

#[derive(Deserialize)]
struct Account {
    currency: String,
    available: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderCreated {
    order_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SymbolInfo {
    base_increment: String,
    base_min_size: String,
}

/// Order size rules for one pair
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct LotSize {
    increment: f64,
    /// Decimal places of `increment`, used when formatting sizes
    decimals: usize,
    min_size: f64,
}

impl LotSize {
    pub(crate) fn parse(base_increment: &str, base_min_size: &str) -> ExchangeResult<Self> {
        let increment = parse_decimal("baseIncrement", base_increment)?;
        if increment <= 0.0 {
            return Err(ExchangeError::UnexpectedResponse(format!(
                "baseIncrement must be positive, got {}",
                base_increment
            )));
        }
        let trimmed = base_increment.trim();
        let decimals = trimmed
            .split_once('.')
            .map(|(_, frac)| frac.trim_end_matches('0').len())
            .unwrap_or(0);

        Ok(Self {
            increment,
            decimals,
            min_size: parse_decimal("baseMinSize", base_min_size)?.max(0.0),
        })
    }

    /// Round `amount` down to whole increments. `None` when nothing
    /// tradable is left.
    pub(crate) fn round_down(&self, amount: f64) -> Option<f64> {
        if !amount.is_finite() || amount <= 0.0 {
            return None;
        }
        // Snap binary noise such as 0.3 / 0.1 = 2.9999999999999996 before flooring
        let raw = amount / self.increment;
        let nearest = raw.round();
        let steps = if (raw - nearest).abs() < 1e-6 { nearest } else { raw.floor() };
        let size = format!("{:.*}", self.decimals, steps * self.increment)
            .parse::<f64>()
            .ok()?;
        if size <= 0.0 || size < self.min_size {
            return None;
        }
        Some(size)
    }

    pub(crate) fn format(&self, size: f64) -> String {
        format!("{:.*}", self.decimals, size)
    }
}

#[derive(Clone)]
struct Credentials {
    api_key: String,
    secret: String,
    passphrase: String,
}

#[derive(Clone)]
pub struct KucoinExchange {
    client: Client,
    base_url: String,
    credentials: Option<Credentials>,
    lot_sizes: Arc<Mutex<HashMap<String, LotSize>>>,
}

impl KucoinExchange {
    pub fn new(config: KucoinConfig) -> ExchangeResult<Self> {
        let client = Client::builder().timeout(k::REQUEST_TIMEOUT).build()?;

        let credentials = match (config.api_key, config.secret_key, config.passphrase) {
            (Some(api_key), Some(secret), Some(passphrase)) => Some(Credentials {
                api_key,
                secret,
                passphrase,
            }),
            _ => None,
        };

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            credentials,
            lot_sizes: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Lot size for a KuCoin symbol, fetched once and cached.
    async fn lot_size(&self, kucoin_symbol: &str) -> ExchangeResult<LotSize> {
        let cached = self
            .lot_sizes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(kucoin_symbol)
            .cloned();
        if let Some(lot) = cached {
            return Ok(lot);
        }

        let info: SymbolInfo = self
            .public_get(&format!("{}/{}", k::SYMBOL_PATH, kucoin_symbol))
            .await?;
        let lot = LotSize::parse(&info.base_increment, &info.base_min_size)?;
        debug!("[KUCOIN] {} lot size: {:?}", kucoin_symbol, lot);

        self.lot_sizes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(kucoin_symbol.to_string(), lot.clone());
        Ok(lot)
    }

    fn credentials(&self) -> ExchangeResult<&Credentials> {
        self.credentials
            .as_ref()
            .ok_or(ExchangeError::MissingCredentials("kucoin api_key/secret_key/passphrase"))
    }

    fn auth_headers(
        &self,
        req: RequestBuilder,
        method: &Method,
        endpoint: &str,
        body: &str,
    ) -> ExchangeResult<RequestBuilder> {
        let creds = self.credentials()?;
        let timestamp = Utc::now().timestamp_millis().to_string();
        let prehash = format!("{}{}{}{}", timestamp, method.as_str(), endpoint, body);

        Ok(req
            .header("KC-API-KEY", &creds.api_key)
            .header("KC-API-SIGN", sign(&creds.secret, &prehash)?)
            .header("KC-API-TIMESTAMP", timestamp)
            .header("KC-API-PASSPHRASE", sign(&creds.secret, &creds.passphrase)?)
            .header("KC-API-KEY-VERSION", k::API_KEY_VERSION))
    }

    async fn public_get<T: DeserializeOwned>(&self, endpoint: &str) -> ExchangeResult<T> {
        let resp = self
            .client
            .get(format!("{}{}", self.base_url, endpoint))
            .send()
            .await?;
        Self::decode(resp).await
    }

    async fn signed<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<Value>,
    ) -> ExchangeResult<T> {
        let body = body.map(|b| b.to_string()).unwrap_or_default();
        let mut req = self
            .client
            .request(method.clone(), format!("{}{}", self.base_url, endpoint));
        if !body.is_empty() {
            req = req
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body.clone());
        }
        let req = self.auth_headers(req, &method, endpoint, &body)?;
        Self::decode(req.send().await?).await
    }

    async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> ExchangeResult<T> {
        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(ExchangeError::Http {
                status: status.as_u16(),
                body: text,
            });
        }
        parse_envelope(&text)
    }
}

/// base64(HMAC-SHA256(secret, payload))
pub(crate) fn sign(secret: &str, payload: &str) -> ExchangeResult<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ExchangeError::Signing(e.to_string()))?;
    mac.update(payload.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Unwrap KuCoin's `{code, data, msg}` envelope.
pub(crate) fn parse_envelope<T: DeserializeOwned>(text: &str) -> ExchangeResult<T> {
    let envelope: Envelope<T> = serde_json::from_str(text)?;
    if envelope.code != k::SUCCESS_CODE {
        return Err(ExchangeError::Api {
            code: envelope.code,
            msg: envelope.msg.unwrap_or_default(),
        });
    }
    envelope
        .data
        .ok_or_else(|| ExchangeError::UnexpectedResponse("response has no data".to_string()))
}

fn parse_decimal(field: &str, raw: &str) -> ExchangeResult<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ExchangeError::UnexpectedResponse(format!("{} is not a number: {}", field, raw)))
}

#[async_trait]
impl ExchangeGateway for KucoinExchange {
    fn name(&self) -> &'static str {
        "kucoin"
    }

    async fn fetch_price(&self, symbol: &str) -> ExchangeResult<f64> {
        let endpoint = format!("{}?symbol={}", k::TICKER_PATH, to_kucoin_symbol(symbol));
        let ticker: Level1 = self.public_get(&endpoint).await?;
        let raw = ticker
            .price
            .ok_or_else(|| ExchangeError::UnexpectedResponse(format!("no price for {}", symbol)))?;
        let price = parse_decimal("price", &raw)?;
        if price <= 0.0 {
            return Err(ExchangeError::UnexpectedResponse(format!(
                "non-positive price {} for {}",
                price, symbol
            )));
        }
        Ok(price)
    }

    async fn fetch_balance(&self, currency: &str) -> ExchangeResult<f64> {
        let endpoint = format!("{}?currency={}&type=trade", k::ACCOUNTS_PATH, currency);
        let accounts: Vec<Account> = self.signed(Method::GET, &endpoint, None).await?;

        let mut total = 0.0;
        for account in accounts
            .iter()
            .filter(|a| a.currency.eq_ignore_ascii_case(currency))
        {
            total += parse_decimal("available", &account.available)?;
        }
        debug!("[KUCOIN] {} available: {}", currency, total);
        Ok(total)
    }

    async fn place_market_order(&self, order: &MarketOrder) -> ExchangeResult<OrderAck> {
        let symbol = to_kucoin_symbol(&order.symbol);
        let lot = self.lot_size(&symbol).await?;
        let size = lot
            .round_down(order.amount)
            .ok_or_else(|| ExchangeError::OrderTooSmall {
                symbol: symbol.clone(),
                amount: order.amount,
            })?;

        let body = json!({
            "clientOid": uuid::Uuid::new_v4().to_string(),
            "side": order.side.as_str(),
            "symbol": symbol,
            "type": "market",
            "size": lot.format(size),
        });

        let raw: Value = self.signed(Method::POST, k::ORDERS_PATH, Some(body)).await?;
        let created: OrderCreated = serde_json::from_value(raw.clone())?;

        Ok(OrderAck {
            id: created.order_id,
            status: "submitted".to_string(),
            size,
            raw,
        })
    }
}
