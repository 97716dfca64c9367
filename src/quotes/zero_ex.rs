//! 0x swap API (`/swap/v1/quote`)
//!
//! The API key comes from the `ZEROX_API_KEY` secret and is sent as the
//! `0x-api-key` header. Older regional endpoints accept anonymous requests,
//! so the key is only mandatory when the quoter is built with `require_api_key`.

use super::{de_amount, join_url, send_json, QuoteRequest, SwapQuote, SwapQuoter};
use crate::context::KeeperContext;
use crate::error::KeeperError;
use alloy_primitives::{Address, Bytes, U256};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

/// Public mainnet endpoint
pub const DEFAULT_ENDPOINT: &str = "https://api.0x.org";

/// Secret holding the API key
pub const API_KEY_SECRET: &str = "ZEROX_API_KEY";

const API_KEY_HEADER: &str = "0x-api-key";
const SOURCE: &str = "0x";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteResponse {
    #[serde(default, deserialize_with = "de_amount")]
    buy_amount: Option<U256>,
    to: Option<Address>,
    data: Option<Bytes>,
    #[serde(default, deserialize_with = "de_amount")]
    value: Option<U256>,
}

pub struct ZeroExQuoter {
    client: Client,
    endpoint: String,
    require_api_key: bool,
}

impl ZeroExQuoter {
    pub fn new(client: Client, endpoint: &str) -> Self {
        Self { client, endpoint: endpoint.to_string(), require_api_key: false }
    }

    /// Fail with a missing-secret error instead of sending anonymous requests
    pub fn require_api_key(mut self) -> Self {
        self.require_api_key = true;
        self
    }

    fn query(request: &QuoteRequest) -> Vec<(&'static str, String)> {
        let sell_token = if request.is_native_sell() {
            "ETH".to_string()
        } else {
            request.sell_token.to_string()
        };

        vec![
            ("buyToken", request.buy_token.to_string()),
            ("sellToken", sell_token),
            ("sellAmount", request.sell_amount.to_string()),
            ("slippagePercentage", (request.slippage_bips as f64 / 10_000.0).to_string()),
        ]
    }

    fn normalize(response: QuoteResponse) -> Result<SwapQuote, KeeperError> {
        let buy_amount = response.buy_amount.ok_or_else(|| KeeperError::missing(SOURCE, "buyAmount"))?;
        let data = response.data.ok_or_else(|| KeeperError::missing(SOURCE, "data"))?;
        let to = response.to.ok_or_else(|| KeeperError::missing(SOURCE, "to"))?;

        Ok(SwapQuote { buy_amount, to, data, value: response.value.unwrap_or_default() })
    }
}

#[async_trait]
impl SwapQuoter for ZeroExQuoter {
    fn name(&self) -> &'static str {
        SOURCE
    }

    async fn quote(&self, ctx: &KeeperContext, request: &QuoteRequest) -> Result<SwapQuote, KeeperError> {
        let api_key = if self.require_api_key {
            Some(ctx.secrets.require(API_KEY_SECRET)?)
        } else {
            ctx.secrets.get(API_KEY_SECRET).filter(|k| !k.is_empty())
        };

        let url = join_url(&self.endpoint, "swap/v1/quote");
        debug!("0x quote: {} {:?}", url, Self::query(request));

        let mut builder = self.client.get(&url).query(&Self::query(request));
        if let Some(key) = api_key {
            builder = builder.header(API_KEY_HEADER, key);
        }

        let quote = Self::normalize(send_json(SOURCE, builder).await?)?;
        info!("0x: {} {} -> {} {}", request.sell_amount, request.sell_token, quote.buy_amount, request.buy_token);
        Ok(quote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::testing::test_context;
    use alloy_primitives::address;

    fn request() -> QuoteRequest {
        QuoteRequest {
            chain_id: 1,
            sell_token: address!("99D8a9C45b2ecA8864373A26D1459e3Dff1e17F3"),
            buy_token: address!("090185f2135308BaD17527004364eBcC2D37e5F6"),
            sell_amount: U256::from(1_000u64),
            slippage_bips: 50,
            taker: Address::ZERO,
        }
    }

    #[test]
    fn test_query_parameters() {
        let query = ZeroExQuoter::query(&request());
        assert_eq!(query[2], ("sellAmount", "1000".to_string()));
        assert_eq!(query[3], ("slippagePercentage", "0.005".to_string()));

        let native = QuoteRequest { sell_token: Address::ZERO, ..request() };
        assert_eq!(ZeroExQuoter::query(&native)[1].1, "ETH");
    }

    #[test]
    fn test_normalize_full_response() {
        let response: QuoteResponse = serde_json::from_str(
            r#"{
                "buyAmount": "100000",
                "to": "0xdef1c0ded9bec7f1a1670819833240f027b25eff",
                "data": "0xd9627aa4",
                "value": "0",
                "price": "1.0"
            }"#,
        )
        .unwrap();
        let quote = ZeroExQuoter::normalize(response).unwrap();
        assert_eq!(quote.buy_amount, U256::from(100_000u64));
        assert_eq!(quote.data, Bytes::from(vec![0xd9, 0x62, 0x7a, 0xa4]));
        assert_eq!(quote.min_out(200), U256::from(98_000u64));
    }

    #[test]
    fn test_normalize_names_missing_fields() {
        let response: QuoteResponse = serde_json::from_str(r#"{"data": "0x01"}"#).unwrap();
        let err = ZeroExQuoter::normalize(response).unwrap_err();
        assert!(matches!(err, KeeperError::MalformedResponse { field: "buyAmount", .. }));

        let response: QuoteResponse = serde_json::from_str(r#"{"buyAmount": "5"}"#).unwrap();
        let err = ZeroExQuoter::normalize(response).unwrap_err();
        assert!(matches!(err, KeeperError::MalformedResponse { field: "data", .. }));
    }

    #[tokio::test]
    async fn test_required_key_is_checked_before_any_request() {
        let t = test_context(1, 0);
        let quoter = ZeroExQuoter::new(Client::new(), DEFAULT_ENDPOINT).require_api_key();
        let err = quoter.quote(&t.ctx, &request()).await.unwrap_err();
        assert_eq!(err.to_string(), "ZEROX_API_KEY not set in secrets");
    }
}
