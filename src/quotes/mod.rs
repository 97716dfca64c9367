//! DEX aggregator quotes
//!
//! Every aggregator is normalized to `SwapQuote { buy_amount, to, data, value }`.
//!
//! - One HTTP round per step, bounded timeout, never retried
//! - Non-2xx statuses become `KeeperError::Quote`
//! - Missing or unparsable required fields become `KeeperError::MalformedResponse`

pub mod odos;
pub mod one_inch;
pub mod open_ocean;
pub mod zero_ex;

#[cfg(test)]
pub mod mock;

use crate::context::KeeperContext;
use crate::error::KeeperError;
use crate::guards::min_out;
use alloy_primitives::{address, Address, Bytes, U256};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

pub use odos::OdosQuoter;
pub use one_inch::OneInchQuoter;
pub use open_ocean::OpenOceanQuoter;
pub use zero_ex::ZeroExQuoter;

// ============================================
// CONSTANTS
// ============================================

/// Default timeout for every upstream HTTP call
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Native-asset placeholder used by OpenOcean and 1inch
pub const NATIVE_PLACEHOLDER: Address = address!("EeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE");

// ============================================
// REQUEST / RESPONSE
// ============================================

/// What to sell, what to buy, who executes the swap
///
/// `sell_token == Address::ZERO` denotes the chain's native asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteRequest {
    pub chain_id: u64,
    pub sell_token: Address,
    pub buy_token: Address,
    pub sell_amount: U256,
    pub slippage_bips: u64,
    /// Account that will execute the returned calldata
    pub taker: Address,
}

impl QuoteRequest {
    pub fn is_native_sell(&self) -> bool {
        self.sell_token == Address::ZERO
    }

    /// Slippage as a percentage (50 bips -> 0.5)
    pub fn slippage_percent(&self) -> f64 {
        self.slippage_bips as f64 / 100.0
    }
}

/// Normalized aggregator answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapQuote {
    pub buy_amount: U256,
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
}

impl SwapQuote {
    /// Buy amount reduced by the slippage tolerance
    pub fn min_out(&self, slippage_bips: u64) -> U256 {
        min_out(self.buy_amount, slippage_bips)
    }
}

#[async_trait]
pub trait SwapQuoter: Send + Sync {
    /// Aggregator name for logs and errors
    fn name(&self) -> &'static str;

    async fn quote(&self, ctx: &KeeperContext, request: &QuoteRequest) -> Result<SwapQuote, KeeperError>;
}

// ============================================
// AGGREGATOR SELECTION
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Aggregator {
    ZeroEx,
    Odos,
    OpenOcean,
    OneInch,
}

impl std::fmt::Display for Aggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Aggregator::ZeroEx => write!(f, "0x"),
            Aggregator::Odos => write!(f, "Odos"),
            Aggregator::OpenOcean => write!(f, "OpenOcean"),
            Aggregator::OneInch => write!(f, "1inch"),
        }
    }
}

/// Build a quoter for `aggregator`, falling back to its public endpoint
pub fn build_quoter(
    aggregator: Aggregator,
    endpoint: Option<&str>,
    timeout: Duration,
) -> Result<Arc<dyn SwapQuoter>, KeeperError> {
    let client = http_client(timeout)?;
    let quoter: Arc<dyn SwapQuoter> = match aggregator {
        Aggregator::ZeroEx => Arc::new(ZeroExQuoter::new(
            client,
            endpoint.unwrap_or(zero_ex::DEFAULT_ENDPOINT),
        )),
        Aggregator::Odos => Arc::new(OdosQuoter::new(client, endpoint.unwrap_or(odos::DEFAULT_ENDPOINT))),
        Aggregator::OpenOcean => Arc::new(OpenOceanQuoter::new(
            client,
            endpoint.unwrap_or(open_ocean::DEFAULT_ENDPOINT),
        )),
        Aggregator::OneInch => Arc::new(OneInchQuoter::new(
            client,
            endpoint.unwrap_or(one_inch::DEFAULT_ENDPOINT),
        )),
    };
    Ok(quoter)
}

/// HTTP client shared by every upstream: bounded timeout, no retries
pub fn http_client(timeout: Duration) -> Result<Client, KeeperError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| KeeperError::config(format!("failed to build http client: {}", e)))
}

/// Join a base URL and a path without doubling slashes
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Send a prepared request and decode a JSON body, mapping failures per upstream
pub(crate) async fn send_json<T: serde::de::DeserializeOwned>(
    source_name: &'static str,
    request: reqwest::RequestBuilder,
) -> Result<T, KeeperError> {
    let response = request.send().await.map_err(|e| KeeperError::http(source_name, e))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(KeeperError::quote(source_name, format!("{} {}", status, body.trim())));
    }

    response.json::<T>().await.map_err(|e| KeeperError::http(source_name, e))
}

/// Amount that may arrive as a decimal string or a JSON number
///
/// Unparsable values decode to `None` so callers report the field by name.
pub(crate) fn de_amount<'de, D>(deserializer: D) -> Result<Option<U256>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => U256::from_str(s.trim()).ok(),
        Some(serde_json::Value::Number(n)) => U256::from_str(&n.to_string()).ok(),
        _ => None,
    })
}
