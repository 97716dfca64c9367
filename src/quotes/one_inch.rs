//! 1inch v4.0: `/{chainId}/quote` for the expected amount, `/{chainId}/swap` for the transaction

use super::{de_amount, join_url, send_json, QuoteRequest, SwapQuote, SwapQuoter, NATIVE_PLACEHOLDER};
use crate::context::KeeperContext;
use crate::error::KeeperError;
use alloy_primitives::{Address, Bytes, U256};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

pub const DEFAULT_ENDPOINT: &str = "https://api.1inch.io/v4.0";

const SOURCE: &str = "1inch";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteResponse {
    #[serde(default, deserialize_with = "de_amount")]
    to_token_amount: Option<U256>,
}

#[derive(Debug, Deserialize)]
struct SwapTransaction {
    to: Option<Address>,
    data: Option<Bytes>,
    #[serde(default, deserialize_with = "de_amount")]
    value: Option<U256>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SwapResponse {
    #[serde(default, deserialize_with = "de_amount")]
    to_token_amount: Option<U256>,
    tx: Option<SwapTransaction>,
}

pub struct OneInchQuoter {
    client: Client,
    endpoint: String,
}

impl OneInchQuoter {
    pub fn new(client: Client, endpoint: &str) -> Self {
        Self { client, endpoint: endpoint.to_string() }
    }

    fn token_query(request: &QuoteRequest) -> Vec<(&'static str, String)> {
        let from = if request.is_native_sell() { NATIVE_PLACEHOLDER } else { request.sell_token };
        vec![
            ("fromTokenAddress", from.to_string()),
            ("toTokenAddress", request.buy_token.to_string()),
            ("amount", request.sell_amount.to_string()),
        ]
    }

    fn swap_query(request: &QuoteRequest) -> Vec<(&'static str, String)> {
        let mut query = Self::token_query(request);
        query.push(("fromAddress", request.taker.to_string()));
        query.push(("slippage", request.slippage_percent().to_string()));
        query.push(("disableEstimate", "true".to_string()));
        query
    }

    /// Quoted amount, falling back to the swap's own estimate
    fn normalize(quoted: Option<U256>, swap: SwapResponse) -> Result<SwapQuote, KeeperError> {
        let buy_amount = quoted
            .or(swap.to_token_amount)
            .ok_or_else(|| KeeperError::missing(SOURCE, "toTokenAmount"))?;
        let tx = swap.tx.ok_or_else(|| KeeperError::missing(SOURCE, "tx"))?;
        let data = tx.data.ok_or_else(|| KeeperError::missing(SOURCE, "tx.data"))?;
        let to = tx.to.ok_or_else(|| KeeperError::missing(SOURCE, "tx.to"))?;

        Ok(SwapQuote { buy_amount, to, data, value: tx.value.unwrap_or_default() })
    }
}

#[async_trait]
impl SwapQuoter for OneInchQuoter {
    fn name(&self) -> &'static str {
        SOURCE
    }

    async fn quote(&self, _ctx: &KeeperContext, request: &QuoteRequest) -> Result<SwapQuote, KeeperError> {
        let base = join_url(&self.endpoint, &request.chain_id.to_string());

        let quoted: QuoteResponse =
            send_json(SOURCE, self.client.get(join_url(&base, "quote")).query(&Self::token_query(request))).await?;
        if quoted.to_token_amount.is_none() {
            warn!("1inch quote without toTokenAmount, using swap estimate");
        }

        let query = Self::swap_query(request);
        debug!("1inch swap: {:?}", query);
        let swap: SwapResponse = send_json(SOURCE, self.client.get(join_url(&base, "swap")).query(&query)).await?;

        let quote = Self::normalize(quoted.to_token_amount, swap)?;
        info!("1inch: {} {} -> {} {}", request.sell_amount, request.sell_token, quote.buy_amount, request.buy_token);
        Ok(quote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swap_query_extends_quote_query() {
        let request = QuoteRequest {
            chain_id: 1,
            sell_token: Address::repeat_byte(0x01),
            buy_token: Address::repeat_byte(0x02),
            sell_amount: U256::from(3u64),
            slippage_bips: 100,
            taker: Address::repeat_byte(0x03),
        };
        let query = OneInchQuoter::swap_query(&request);
        assert_eq!(query.len(), 6);
        assert_eq!(query[4], ("slippage", "1".to_string()));
    }

    #[test]
    fn test_normalize_prefers_quoted_amount() {
        let swap: SwapResponse = serde_json::from_str(
            r#"{"toTokenAmount": "90", "tx": {"to": "0x1111111254fb6c44bAC0beD2854e76F90643097d", "data": "0x12aa3caf", "value": "0"}}"#,
        )
        .unwrap();
        let quote = OneInchQuoter::normalize(Some(U256::from(100u64)), swap).unwrap();
        assert_eq!(quote.buy_amount, U256::from(100u64));

        let swap: SwapResponse = serde_json::from_str(r#"{"toTokenAmount": "90"}"#).unwrap();
        assert!(matches!(
            OneInchQuoter::normalize(None, swap),
            Err(KeeperError::MalformedResponse { field: "tx", .. })
        ));
    }
}
