//! GMX v2 market helpers
//!
//! - Oracle tickers from the GM REST API (`prices/tickers`)
//! - `Reader.getMarket` and `Reader.getDepositAmountOut`
//! - Data store gas limits and the keeper execution fee

use crate::chain::abi::{IGmDataStore, IGmReader};
use crate::chain::ChainReader;
use crate::error::KeeperError;
use crate::quotes::{de_amount, join_url, send_json};
use alloy_primitives::{b256, Address, B256, U256};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

const SOURCE: &str = "gm";

// ============================================
// DATA STORE KEYS
// ============================================

/// keccak256(abi.encode("DEPOSIT_GAS_LIMIT")) for single token deposits
pub const DEPOSIT_GAS_LIMIT_KEY: B256 =
    b256!("efc0960e00ee78ec9c4ac47dfe361c3ed2dc14c6be6004a1e6593b843b045001");

/// ESTIMATED_GAS_FEE_BASE_AMOUNT
pub const GAS_FEE_BASE_AMOUNT_KEY: B256 =
    b256!("b240624f82b02b1a8e07fd5d67821e9664f273e0dc86415a33c1f3f444c81db4");

/// ESTIMATED_GAS_FEE_MULTIPLIER_FACTOR, 30 decimals
pub const GAS_FEE_MULTIPLIER_FACTOR_KEY: B256 =
    b256!("ce135f2a886cf6d862269f215b1e64498fa09cb04f90b771b163399df2a82b81");

/// SINGLE_SWAP_GAS_LIMIT
pub const SINGLE_SWAP_GAS_LIMIT_KEY: B256 =
    b256!("3be28fb346f7abc4a956a16d3739c8c4bfcca9385988c64bf86cdd16638c1f81");

/// Deposit pricing: two-step
const SWAP_PRICING_TWO_STEP: u8 = 0;

fn multiplier_precision() -> U256 {
    U256::from(10u64).pow(U256::from(30u64))
}

// ============================================
// TICKERS
// ============================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TickerResponse {
    token_address: Option<Address>,
    #[serde(default, deserialize_with = "de_amount")]
    min_price: Option<U256>,
    #[serde(default, deserialize_with = "de_amount")]
    max_price: Option<U256>,
}

/// Oracle price of one token, 30 decimals minus token decimals
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticker {
    pub token_address: Address,
    pub min_price: U256,
    pub max_price: U256,
}

impl TryFrom<TickerResponse> for Ticker {
    type Error = KeeperError;

    fn try_from(raw: TickerResponse) -> Result<Self, Self::Error> {
        Ok(Self {
            token_address: raw.token_address.ok_or_else(|| KeeperError::missing(SOURCE, "tokenAddress"))?,
            min_price: raw.min_price.ok_or_else(|| KeeperError::missing(SOURCE, "minPrice"))?,
            max_price: raw.max_price.ok_or_else(|| KeeperError::missing(SOURCE, "maxPrice"))?,
        })
    }
}

/// Where market prices come from
#[async_trait]
pub trait TickerSource: Send + Sync {
    async fn tickers(&self) -> Result<Vec<Ticker>, KeeperError>;
}

/// GM REST API client
pub struct GmApi {
    client: Client,
    endpoint: String,
}

impl GmApi {
    pub fn new(client: Client, endpoint: &str) -> Self {
        Self { client, endpoint: endpoint.to_string() }
    }
}

#[async_trait]
impl TickerSource for GmApi {
    async fn tickers(&self) -> Result<Vec<Ticker>, KeeperError> {
        let url = join_url(&self.endpoint, "prices/tickers");
        debug!("gm tickers: {}", url);
        let raw: Vec<TickerResponse> = send_json(SOURCE, self.client.get(url)).await?;
        raw.into_iter().map(Ticker::try_from).collect()
    }
}

/// Index, long and short prices of `market`; every token must have a ticker
pub fn market_prices(
    market: &IGmReader::MarketProps,
    tickers: &[Ticker],
) -> Result<IGmReader::MarketPrices, KeeperError> {
    let price = |token: Address| -> Result<IGmReader::PriceProps, KeeperError> {
        tickers
            .iter()
            .find(|t| t.token_address == token)
            .map(|t| IGmReader::PriceProps { min: t.min_price, max: t.max_price })
            .ok_or_else(|| KeeperError::quote(SOURCE, format!("tickers do not have token {}", token)))
    };

    Ok(IGmReader::MarketPrices {
        indexTokenPrice: price(market.indexToken)?,
        longTokenPrice: price(market.longToken)?,
        shortTokenPrice: price(market.shortToken)?,
    })
}

// ============================================
// ON-CHAIN READS
// ============================================

/// Reader and data store of one GMX deployment
#[derive(Clone)]
pub struct GmMarkets {
    chain: Arc<dyn ChainReader>,
    reader: Address,
    data_store: Address,
}

impl GmMarkets {
    pub fn new(chain: Arc<dyn ChainReader>, reader: Address, data_store: Address) -> Self {
        Self { chain, reader, data_store }
    }

    pub async fn market(&self, market: Address) -> Result<IGmReader::MarketProps, KeeperError> {
        self.chain
            .read(self.reader, IGmReader::getMarketCall { dataStore: self.data_store, key: market })
            .await
    }

    /// GM tokens minted for depositing `long` and `short` into `market`
    pub async fn deposit_amount_out(
        &self,
        tickers: &dyn TickerSource,
        market: Address,
        long: U256,
        short: U256,
    ) -> Result<U256, KeeperError> {
        let (props, tickers) = futures::try_join!(self.market(market), tickers.tickers())?;
        let prices = market_prices(&props, &tickers)?;

        let out = self
            .chain
            .read(
                self.reader,
                IGmReader::getDepositAmountOutCall {
                    dataStore: self.data_store,
                    market: props,
                    prices,
                    longTokenAmount: long,
                    shortTokenAmount: short,
                    uiFeeReceiver: Address::ZERO,
                    swapPricingType: SWAP_PRICING_TWO_STEP,
                    includeVirtualInventoryImpact: true,
                },
            )
            .await?;
        info!("GM deposit amount out: {}", out);
        Ok(out)
    }

    async fn get_uint(&self, key: B256) -> Result<U256, KeeperError> {
        self.chain.read(self.data_store, IGmDataStore::getUintCall { key }).await
    }

    pub async fn deposit_gas_limit(&self) -> Result<U256, KeeperError> {
        self.get_uint(DEPOSIT_GAS_LIMIT_KEY).await
    }

    pub async fn single_swap_gas_limit(&self) -> Result<U256, KeeperError> {
        self.get_uint(SINGLE_SWAP_GAS_LIMIT_KEY).await
    }

    /// `(gas_limit * multiplier / 1e30 + base) * gas_price`
    pub async fn execution_fee(&self, gas_limit: U256, gas_price: U256) -> Result<U256, KeeperError> {
        let (base, multiplier) = futures::try_join!(
            self.get_uint(GAS_FEE_BASE_AMOUNT_KEY),
            self.get_uint(GAS_FEE_MULTIPLIER_FACTOR_KEY),
        )?;
        let adjusted = gas_limit * multiplier / multiplier_precision() + base;
        Ok(adjusted * gas_price)
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;

    /// Fixed tickers
    pub struct StaticTickers(pub Vec<Ticker>);

    #[async_trait]
    impl TickerSource for StaticTickers {
        async fn tickers(&self) -> Result<Vec<Ticker>, KeeperError> {
            Ok(self.0.clone())
        }
    }

    pub fn ticker(token: Address, price: u64) -> Ticker {
        Ticker { token_address: token, min_price: U256::from(price), max_price: U256::from(price + 1) }
    }
}
