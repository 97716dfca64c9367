//! GM (GMX v2 market token) strategy harvester
//!
//! Pending staking rewards are deposited into the strategy's GM market,
//! swapped through 0x first unless the reward already is the market input
//! token. The keeper pays GMX's execution fee, sent as the call value.

use super::{require_address, require_endpoint, Keeper};
use crate::chain::abi::{IERC20, IGmHarvester, IMultiRewardsStaking};
use crate::context::KeeperContext;
use crate::error::KeeperError;
use crate::gm::{GmMarkets, TickerSource};
use crate::guards::{check_bips, min_out, NOTHING_TO_HARVEST};
use crate::quotes::{http_client, zero_ex, QuoteRequest, SwapQuoter, ZeroExQuoter};
use crate::result::{CallData, KeeperResult};
use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const MAX_BENTOBOX_AMOUNT_INCREASE_IN_BIPS: u64 = 1_000;
const MAX_BENTOBOX_CHANGE_AMOUNT_IN_BIPS: u64 = 1_000;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GmArgs {
    pub exec_address: Address,
    pub zero_ex_api_endpoint: String,
    pub gm_api_endpoint: String,
    pub max_swap_slippage_bips: u64,
    pub max_deposit_slippage_bips: u64,
    pub reward_token: Address,
    pub market_input_token: Address,
    pub data_store_address: Address,
    pub gm_reader_address: Address,
    pub staking_address: Address,
    /// GM market token
    pub strategy_token: Address,
}

impl GmArgs {
    pub fn validate(&self) -> Result<(), KeeperError> {
        require_address("execAddress", self.exec_address)?;
        require_endpoint("zeroExApiEndpoint", &self.zero_ex_api_endpoint)?;
        require_endpoint("gmApiEndpoint", &self.gm_api_endpoint)?;
        require_address("rewardToken", self.reward_token)?;
        require_address("marketInputToken", self.market_input_token)?;
        require_address("dataStoreAddress", self.data_store_address)?;
        require_address("gmReaderAddress", self.gm_reader_address)?;
        require_address("stakingAddress", self.staking_address)?;
        require_address("strategyToken", self.strategy_token)?;
        check_bips("maxSwapSlippageBips", self.max_swap_slippage_bips)?;
        check_bips("maxDepositSlippageBips", self.max_deposit_slippage_bips)
    }

    /// Reward is deposited as the long token without a swap
    fn deposits_reward_token(&self) -> bool {
        self.reward_token == self.market_input_token
    }
}

/// Rewards are swapped through 0x with a mandatory API key
pub fn build_quoter(args: &GmArgs, timeout: Duration) -> Result<Arc<dyn SwapQuoter>, KeeperError> {
    let quoter = ZeroExQuoter::new(http_client(timeout)?, &args.zero_ex_api_endpoint).require_api_key();
    Ok(Arc::new(quoter))
}

pub struct GmKeeper {
    args: GmArgs,
    quoter: Arc<dyn SwapQuoter>,
    tickers: Arc<dyn TickerSource>,
}

impl GmKeeper {
    pub fn new(args: GmArgs, quoter: Arc<dyn SwapQuoter>, tickers: Arc<dyn TickerSource>) -> Self {
        Self { args, quoter, tickers }
    }

    /// Swap `pending` rewards into the market input token, returning the
    /// amount to deposit and the swap calldata
    async fn swap_rewards(&self, ctx: &KeeperContext, pending: U256) -> Result<(U256, Bytes), KeeperError> {
        ctx.secrets.require(zero_ex::API_KEY_SECRET)?;
        let chain = ctx.provider()?;
        let harvester = self.args.exec_address;

        let request = QuoteRequest {
            chain_id: ctx.chain_id,
            sell_token: self.args.reward_token,
            buy_token: self.args.market_input_token,
            sell_amount: pending,
            slippage_bips: self.args.max_swap_slippage_bips,
            taker: harvester,
        };
        let (quote, held) = futures::try_join!(
            self.quoter.quote(ctx, &request),
            chain.read(self.args.market_input_token, IERC20::balanceOfCall { account: harvester }),
        )?;

        let deposit = quote.min_out(self.args.max_swap_slippage_bips) + held;
        info!("swap {} rewards for at least {} input tokens, depositing {}", pending, quote.buy_amount, deposit);
        Ok((deposit, quote.data))
    }
}

#[async_trait]
impl Keeper for GmKeeper {
    fn name(&self) -> &'static str {
        "gm"
    }

    async fn evaluate(&self, ctx: &KeeperContext) -> Result<KeeperResult, KeeperError> {
        let chain = ctx.provider()?;
        let a = &self.args;
        let harvester = a.exec_address;

        let (balance, earned, rewards, callback_gas_limit) = futures::try_join!(
            chain.read(a.reward_token, IERC20::balanceOfCall { account: harvester }),
            chain.read(a.staking_address, IMultiRewardsStaking::earnedCall { user: harvester, rewardToken: a.reward_token }),
            chain.read(a.staking_address, IMultiRewardsStaking::rewardsCall { user: harvester, rewardToken: a.reward_token }),
            chain.read(harvester, IGmHarvester::callbackGasLimitCall {}),
        )?;
        // `rewards` is already part of `earned`
        let pending = (balance + earned).saturating_sub(rewards);
        info!("pending reward tokens: {}", pending);
        if pending.is_zero() {
            return Ok(KeeperResult::skip(NOTHING_TO_HARVEST));
        }

        let (deposit_in, swap_data) = if a.deposits_reward_token() {
            (pending, Bytes::new())
        } else {
            self.swap_rewards(ctx, pending).await?
        };
        let (long, short) = if a.deposits_reward_token() { (deposit_in, U256::ZERO) } else { (U256::ZERO, deposit_in) };

        let markets = GmMarkets::new(chain.clone(), a.gm_reader_address, a.data_store_address);
        let execution_fee = async {
            let (deposit_gas, swap_gas, gas_price) = futures::try_join!(
                markets.deposit_gas_limit(),
                markets.single_swap_gas_limit(),
                chain.gas_price(),
            )?;
            markets.execution_fee(callback_gas_limit + deposit_gas + swap_gas, gas_price).await
        };
        let (deposit_out, execution_fee) = futures::try_join!(
            markets.deposit_amount_out(self.tickers.as_ref(), a.strategy_token, long, short),
            execution_fee,
        )?;

        let min_deposit_out = min_out(deposit_out, a.max_deposit_slippage_bips);
        info!("minimum GM out: {}, execution fee: {}", min_deposit_out, execution_fee);

        let data = IGmHarvester::runCall {
            rewardToken: a.reward_token,
            marketInputToken: a.market_input_token,
            minOut: min_deposit_out,
            executionFee: execution_fee,
            swapData: swap_data,
            maxBentoBoxAmountIncreaseInBips: U256::from(MAX_BENTOBOX_AMOUNT_INCREASE_IN_BIPS),
            maxBentoBoxChangeAmountInBips: U256::from(MAX_BENTOBOX_CHANGE_AMOUNT_IN_BIPS),
        }
        .abi_encode();

        Ok(KeeperResult::exec(vec![CallData::new(harvester, data).with_value(execution_fee)]))
    }
}
