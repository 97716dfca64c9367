//! OpenOcean v2: `/{chainId}/gas-price` then `/{chainId}/swap`
//!
//! Used on chains the other aggregators do not cover (Kava).

use super::{de_amount, join_url, send_json, QuoteRequest, SwapQuote, SwapQuoter, NATIVE_PLACEHOLDER};
use crate::context::KeeperContext;
use crate::error::KeeperError;
use alloy_primitives::{Address, Bytes, U256};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

pub const DEFAULT_ENDPOINT: &str = "https://ethapi.openocean.finance/v2";

const SOURCE: &str = "openocean";

#[derive(Debug, Deserialize)]
struct GasPriceResponse {
    standard: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SwapResponse {
    #[serde(default, deserialize_with = "de_amount")]
    out_amount: Option<U256>,
    to: Option<Address>,
    data: Option<Bytes>,
    #[serde(default, deserialize_with = "de_amount")]
    value: Option<U256>,
}

pub struct OpenOceanQuoter {
    client: Client,
    endpoint: String,
}

impl OpenOceanQuoter {
    pub fn new(client: Client, endpoint: &str) -> Self {
        Self { client, endpoint: endpoint.to_string() }
    }

    /// `standard` is a number on most chains and a decimal string on some
    fn gas_price(response: GasPriceResponse) -> Result<String, KeeperError> {
        match response.standard {
            Some(serde_json::Value::Number(n)) => Ok(n.to_string()),
            Some(serde_json::Value::String(s)) if !s.is_empty() => Ok(s),
            _ => Err(KeeperError::missing(SOURCE, "standard")),
        }
    }

    fn swap_query(request: &QuoteRequest, gas_price: String) -> Vec<(&'static str, String)> {
        let in_token = if request.is_native_sell() { NATIVE_PLACEHOLDER } else { request.sell_token };
        vec![
            ("inTokenAddress", in_token.to_string()),
            ("outTokenAddress", request.buy_token.to_string()),
            ("amount", request.sell_amount.to_string()),
            ("gasPrice", gas_price),
            ("disabledDexIds", String::new()),
            ("slippage", request.slippage_percent().to_string()),
            ("account", request.taker.to_string()),
        ]
    }

    fn normalize(response: SwapResponse) -> Result<SwapQuote, KeeperError> {
        let buy_amount = response.out_amount.ok_or_else(|| KeeperError::missing(SOURCE, "outAmount"))?;
        let data = response.data.ok_or_else(|| KeeperError::missing(SOURCE, "data"))?;
        let to = response.to.ok_or_else(|| KeeperError::missing(SOURCE, "to"))?;

        Ok(SwapQuote { buy_amount, to, data, value: response.value.unwrap_or_default() })
    }
}

#[async_trait]
impl SwapQuoter for OpenOceanQuoter {
    fn name(&self) -> &'static str {
        SOURCE
    }

    async fn quote(&self, _ctx: &KeeperContext, request: &QuoteRequest) -> Result<SwapQuote, KeeperError> {
        let chain = request.chain_id.to_string();

        let gas: GasPriceResponse =
            send_json(SOURCE, self.client.get(join_url(&self.endpoint, &format!("{}/gas-price", chain)))).await?;
        let gas_price = Self::gas_price(gas)?;

        let query = Self::swap_query(request, gas_price);
        debug!("openocean swap: {:?}", query);
        let swap: SwapResponse = send_json(
            SOURCE,
            self.client.get(join_url(&self.endpoint, &format!("{}/swap", chain))).query(&query),
        )
        .await?;

        let quote = Self::normalize(swap)?;
        info!("openocean: {} {} -> {} {}", request.sell_amount, request.sell_token, quote.buy_amount, request.buy_token);
        Ok(quote)
    }
}
