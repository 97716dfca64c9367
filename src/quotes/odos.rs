//! Odos smart order router: `sor/quote/v2` then `sor/assemble`

use super::{de_amount, join_url, send_json, QuoteRequest, SwapQuote, SwapQuoter};
use crate::context::KeeperContext;
use crate::error::KeeperError;
use alloy_primitives::{Address, Bytes, U256};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub const DEFAULT_ENDPOINT: &str = "https://api.odos.xyz";

const SOURCE: &str = "odos";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InputToken {
    token_address: Address,
    amount: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OutputToken {
    token_address: Address,
    proportion: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QuoteBody {
    chain_id: u64,
    input_tokens: Vec<InputToken>,
    output_tokens: Vec<OutputToken>,
    user_addr: Address,
    slippage_limit_percent: f64,
    #[serde(rename = "disableRFQs")]
    disable_rfqs: bool,
    compact: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AssembleBody {
    path_id: String,
    user_addr: Address,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteResponse {
    path_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssembledToken {
    #[serde(default, deserialize_with = "de_amount")]
    amount: Option<U256>,
}

#[derive(Debug, Deserialize)]
struct AssembledTransaction {
    to: Option<Address>,
    data: Option<Bytes>,
    #[serde(default, deserialize_with = "de_amount")]
    value: Option<U256>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssembleResponse {
    #[serde(default)]
    output_tokens: Vec<AssembledToken>,
    transaction: Option<AssembledTransaction>,
}

pub struct OdosQuoter {
    client: Client,
    endpoint: String,
}

impl OdosQuoter {
    pub fn new(client: Client, endpoint: &str) -> Self {
        Self { client, endpoint: endpoint.to_string() }
    }

    fn quote_body(request: &QuoteRequest) -> QuoteBody {
        QuoteBody {
            chain_id: request.chain_id,
            input_tokens: vec![InputToken {
                token_address: request.sell_token,
                amount: request.sell_amount.to_string(),
            }],
            output_tokens: vec![OutputToken { token_address: request.buy_token, proportion: 1 }],
            user_addr: request.taker,
            slippage_limit_percent: request.slippage_percent(),
            disable_rfqs: false,
            compact: true,
        }
    }

    fn normalize(response: AssembleResponse) -> Result<SwapQuote, KeeperError> {
        let buy_amount = response
            .output_tokens
            .first()
            .and_then(|t| t.amount)
            .ok_or_else(|| KeeperError::missing(SOURCE, "outputTokens[0].amount"))?;
        let tx = response.transaction.ok_or_else(|| KeeperError::missing(SOURCE, "transaction"))?;
        let data = tx.data.ok_or_else(|| KeeperError::missing(SOURCE, "transaction.data"))?;
        let to = tx.to.ok_or_else(|| KeeperError::missing(SOURCE, "transaction.to"))?;

        Ok(SwapQuote { buy_amount, to, data, value: tx.value.unwrap_or_default() })
    }
}

#[async_trait]
impl SwapQuoter for OdosQuoter {
    fn name(&self) -> &'static str {
        SOURCE
    }

    async fn quote(&self, _ctx: &KeeperContext, request: &QuoteRequest) -> Result<SwapQuote, KeeperError> {
        let body = Self::quote_body(request);
        debug!("odos quote: {:?}", body);

        let quoted: QuoteResponse =
            send_json(SOURCE, self.client.post(join_url(&self.endpoint, "sor/quote/v2")).json(&body)).await?;
        let path_id = quoted.path_id.ok_or_else(|| KeeperError::missing(SOURCE, "pathId"))?;

        let assemble = AssembleBody { path_id, user_addr: request.taker };
        let assembled: AssembleResponse =
            send_json(SOURCE, self.client.post(join_url(&self.endpoint, "sor/assemble")).json(&assemble)).await?;

        let quote = Self::normalize(assembled)?;
        info!("odos: {} {} -> {} {}", request.sell_amount, request.sell_token, quote.buy_amount, request.buy_token);
        Ok(quote)
    }
}
