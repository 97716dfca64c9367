//! Liquity stability pool strategy
//!
//! ETH and LQTY gains (held plus pending in the stability pool) are swapped
//! back into the strategy token, one `swapRewards` per reward with a
//! balance, all inside a single executor `run`.

use super::{require_address, Keeper, QuoteArgs};
use crate::chain::abi::{IERC20, ILiquityStrategy, IStabilityPool, IStrategyExecutor};
use crate::chain::ChainReader;
use crate::context::KeeperContext;
use crate::error::KeeperError;
use crate::guards::{check_bips, timestamp_from, Readiness, NOTHING_TO_HARVEST, TIME_NOT_ELAPSED};
use crate::quotes::{Aggregator, QuoteRequest, SwapQuoter};
use crate::registry::{LIQUITY_STABILITY_POOL, LQTY};
use crate::result::{CallData, KeeperResult};
use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use futures::future::try_join_all;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

fn default_interval() -> u64 {
    86_400
}

fn default_slippage() -> u64 {
    200
}

fn default_max_increase() -> u64 {
    1
}

fn default_max_change() -> u64 {
    1_000
}

/// Native ETH, then LQTY
fn default_reward_tokens() -> Vec<Address> {
    vec![Address::ZERO, LQTY]
}

fn default_quote() -> QuoteArgs {
    QuoteArgs::new(Aggregator::ZeroEx)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LusdArgs {
    pub exec_address: Address,
    pub strategy: Address,
    #[serde(default = "default_interval")]
    pub interval_in_seconds: u64,
    #[serde(default = "default_slippage")]
    pub reward_swapping_slippage_in_bips: u64,
    #[serde(default = "default_max_increase")]
    pub max_bento_box_amount_increase_in_bips: u64,
    #[serde(default = "default_max_change")]
    pub max_bento_box_change_amount_in_bips: u64,
    /// `0x0` stands for native ETH
    #[serde(default = "default_reward_tokens")]
    pub reward_tokens: Vec<Address>,
    #[serde(default = "default_quote")]
    pub quote: QuoteArgs,
}

impl LusdArgs {
    pub fn validate(&self) -> Result<(), KeeperError> {
        require_address("execAddress", self.exec_address)?;
        require_address("strategy", self.strategy)?;
        check_bips("rewardSwappingSlippageInBips", self.reward_swapping_slippage_in_bips)?;
        check_bips("maxBentoBoxAmountIncreaseInBips", self.max_bento_box_amount_increase_in_bips)?;
        check_bips("maxBentoBoxChangeAmountInBips", self.max_bento_box_change_amount_in_bips)?;
        if self.reward_tokens.is_empty() {
            return Err(KeeperError::Config("rewardTokens must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Held plus pending amount of one reward
async fn reward_balance(chain: &Arc<dyn ChainReader>, strategy: Address, token: Address) -> Result<U256, KeeperError> {
    let pool = LIQUITY_STABILITY_POOL;
    let (held, gain) = if token == Address::ZERO {
        futures::try_join!(
            chain.balance(strategy),
            chain.read(pool, IStabilityPool::getDepositorETHGainCall { depositor: strategy }),
        )?
    } else if token == LQTY {
        futures::try_join!(
            chain.read(token, IERC20::balanceOfCall { account: strategy }),
            chain.read(pool, IStabilityPool::getDepositorLQTYGainCall { depositor: strategy }),
        )?
    } else {
        (chain.read(token, IERC20::balanceOfCall { account: strategy }).await?, U256::ZERO)
    };
    debug!("{}: held {}, to harvest {}", token, held, gain);
    Ok(held + gain)
}

pub struct LusdKeeper {
    args: LusdArgs,
    quoter: Arc<dyn SwapQuoter>,
}

impl LusdKeeper {
    pub fn new(args: LusdArgs, quoter: Arc<dyn SwapQuoter>) -> Self {
        Self { args, quoter }
    }

    /// `swapRewards` calldata for one reward, `None` when nothing is held
    async fn swap_call(
        &self,
        ctx: &KeeperContext,
        chain: &Arc<dyn ChainReader>,
        strategy_token: Address,
        token: Address,
    ) -> Result<Option<Bytes>, KeeperError> {
        let amount = reward_balance(chain, self.args.strategy, token).await?;
        if amount.is_zero() {
            return Ok(None);
        }

        let slippage = self.args.reward_swapping_slippage_in_bips;
        let quote = self
            .quoter
            .quote(
                ctx,
                &QuoteRequest {
                    chain_id: ctx.chain_id,
                    sell_token: token,
                    buy_token: strategy_token,
                    sell_amount: amount,
                    slippage_bips: slippage,
                    taker: self.args.strategy,
                },
            )
            .await?;
        info!("swap {} of {} for at least {}", amount, token, quote.min_out(slippage));

        let data = ILiquityStrategy::swapRewardsCall {
            amountOutMin: quote.min_out(slippage),
            rewardToken: token,
            data: quote.data,
        }
        .abi_encode();
        Ok(Some(data.into()))
    }
}

#[async_trait]
impl Keeper for LusdKeeper {
    fn name(&self) -> &'static str {
        "lusd"
    }

    async fn evaluate(&self, ctx: &KeeperContext) -> Result<KeeperResult, KeeperError> {
        let chain = ctx.provider()?;
        let a = &self.args;

        let last = chain.read(a.exec_address, IStrategyExecutor::lastExecutionCall {}).await?;
        info!("Last harvester update: {}", last);
        let last = timestamp_from(last);
        if !Readiness::new(last, a.interval_in_seconds, ctx.block_timestamp).is_ready() {
            return Ok(KeeperResult::skip(TIME_NOT_ELAPSED));
        }

        let strategy_token = chain.read(a.strategy, ILiquityStrategy::strategyTokenCall {}).await?;

        let swaps = try_join_all(
            a.reward_tokens
                .iter()
                .map(|token| self.swap_call(ctx, &chain, strategy_token, *token)),
        )
        .await?;
        let calls: Vec<Bytes> = swaps.into_iter().flatten().collect();
        if calls.is_empty() {
            return Ok(KeeperResult::skip(NOTHING_TO_HARVEST));
        }

        let data = IStrategyExecutor::runCall {
            strategy: a.strategy,
            maxBentoBoxAmountIncreaseInBips: U256::from(a.max_bento_box_amount_increase_in_bips),
            maxBentoBoxChangeAmountInBips: U256::from(a.max_bento_box_change_amount_in_bips),
            calls,
        }
        .abi_encode();
        Ok(KeeperResult::exec(vec![CallData::new(a.exec_address, data)]))
    }
}
