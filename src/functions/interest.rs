//! Interest strategy fee compounding
//!
//! Accrued interest plus earned fees, both in the strategy token, are priced
//! through an aggregator (0x by default) and swapped with
//! `swapRewards(minOut, strategyToken, data)` inside one executor `run`.

use super::{require_address, Keeper, QuoteArgs};
use crate::chain::abi::{IInterestLens, IInterestStrategy, IStrategyExecutor};
use crate::context::KeeperContext;
use crate::error::KeeperError;
use crate::guards::{check_bips, ReadinessGate, NOTHING_TO_HARVEST, TIME_NOT_ELAPSED};
use crate::quotes::{Aggregator, QuoteRequest, SwapQuoter};
use crate::registry::{self, INTEREST_LENS};
use crate::result::{CallData, KeeperResult};
use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

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

fn default_quote() -> QuoteArgs {
    QuoteArgs::new(Aggregator::ZeroEx)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterestArgs {
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
    /// Token the fees are sold for; MIM of the task chain when unset
    #[serde(default)]
    pub buy_token: Option<Address>,
    #[serde(default = "default_quote")]
    pub quote: QuoteArgs,
}

impl InterestArgs {
    pub fn validate(&self) -> Result<(), KeeperError> {
        require_address("execAddress", self.exec_address)?;
        require_address("strategy", self.strategy)?;
        if let Some(token) = self.buy_token {
            require_address("buyToken", token)?;
        }
        check_bips("rewardSwappingSlippageInBips", self.reward_swapping_slippage_in_bips)?;
        check_bips("maxBentoBoxAmountIncreaseInBips", self.max_bento_box_amount_increase_in_bips)?;
        check_bips("maxBentoBoxChangeAmountInBips", self.max_bento_box_change_amount_in_bips)
    }
}

pub struct InterestKeeper {
    args: InterestArgs,
    quoter: Arc<dyn SwapQuoter>,
    gate: ReadinessGate,
}

impl InterestKeeper {
    pub fn new(args: InterestArgs, quoter: Arc<dyn SwapQuoter>) -> Self {
        let gate = ReadinessGate::new(args.interval_in_seconds);
        Self { args, quoter, gate }
    }
}

#[async_trait]
impl Keeper for InterestKeeper {
    fn name(&self) -> &'static str {
        "interest"
    }

    async fn evaluate(&self, ctx: &KeeperContext) -> Result<KeeperResult, KeeperError> {
        if !self.gate.check_store(ctx).await?.is_ready() {
            return Ok(KeeperResult::skip(TIME_NOT_ELAPSED));
        }

        let chain = ctx.provider()?;
        let strategy = self.args.strategy;

        let (strategy_token, accrued, earned) = futures::try_join!(
            chain.read(strategy, IInterestStrategy::strategyTokenCall {}),
            chain.read(INTEREST_LENS, IInterestLens::previewAccrueCall { strategy }),
            chain.read(strategy, IInterestStrategy::pendingFeeEarnedCall {}),
        )?;
        info!("Pending accrued interest: {}", accrued);
        let pending = U256::from(accrued) + U256::from(earned);
        if pending.is_zero() {
            return Ok(KeeperResult::skip(NOTHING_TO_HARVEST));
        }

        let buy_token = match self.args.buy_token {
            Some(token) => token,
            None => registry::mim(ctx.chain_id)?,
        };
        let slippage = self.args.reward_swapping_slippage_in_bips;
        let quote = self
            .quoter
            .quote(
                ctx,
                &QuoteRequest {
                    chain_id: ctx.chain_id,
                    sell_token: strategy_token,
                    buy_token,
                    sell_amount: pending,
                    slippage_bips: slippage,
                    taker: strategy,
                },
            )
            .await?;
        let min_amount_out = quote.min_out(slippage);
        info!("swap {} fees for at least {}", pending, min_amount_out);

        let swap: Bytes = IInterestStrategy::swapRewardsCall {
            amountOutMin: min_amount_out,
            rewardToken: strategy_token,
            data: quote.data,
        }
        .abi_encode()
        .into();

        let data = IStrategyExecutor::runCall {
            strategy,
            maxBentoBoxAmountIncreaseInBips: U256::from(self.args.max_bento_box_amount_increase_in_bips),
            maxBentoBoxChangeAmountInBips: U256::from(self.args.max_bento_box_change_amount_in_bips),
            calls: vec![swap],
        }
        .abi_encode();

        self.gate.commit(ctx).await?;
        Ok(KeeperResult::exec(vec![CallData::new(self.args.exec_address, data)]))
    }
}
