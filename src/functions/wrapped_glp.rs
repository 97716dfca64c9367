//! Wrapped GLP harvester: claimed rewards swapped into the output token

use super::{require_address, Keeper, QuoteArgs};
use crate::chain::abi::IWrappedGlpHarvester;
use crate::context::KeeperContext;
use crate::error::KeeperError;
use crate::guards::{check_bips, timestamp_from, Readiness, NOTHING_TO_HARVEST, TIME_NOT_ELAPSED};
use crate::quotes::{Aggregator, QuoteRequest, SwapQuoter};
use crate::result::{CallData, KeeperResult};
use alloy_primitives::Address;
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

fn default_interval() -> u64 {
    86_400
}

fn default_slippage() -> u64 {
    100
}

fn default_quote() -> QuoteArgs {
    QuoteArgs::with_endpoint(Aggregator::ZeroEx, "https://arbitrum.api.0x.org")
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WrappedGlpArgs {
    pub exec_address: Address,
    #[serde(default = "default_interval")]
    pub interval_in_seconds: u64,
    #[serde(default = "default_slippage")]
    pub reward_swapping_slippage_in_bips: u64,
    #[serde(default = "default_quote")]
    pub quote: QuoteArgs,
}

impl WrappedGlpArgs {
    pub fn validate(&self) -> Result<(), KeeperError> {
        require_address("execAddress", self.exec_address)?;
        check_bips("rewardSwappingSlippageInBips", self.reward_swapping_slippage_in_bips)
    }
}

pub struct WrappedGlpKeeper {
    args: WrappedGlpArgs,
    quoter: Arc<dyn SwapQuoter>,
}

impl WrappedGlpKeeper {
    pub fn new(args: WrappedGlpArgs, quoter: Arc<dyn SwapQuoter>) -> Self {
        Self { args, quoter }
    }
}

#[async_trait]
impl Keeper for WrappedGlpKeeper {
    fn name(&self) -> &'static str {
        "wrapped-glp"
    }

    async fn evaluate(&self, ctx: &KeeperContext) -> Result<KeeperResult, KeeperError> {
        let chain = ctx.provider()?;
        let harvester = self.args.exec_address;

        let last = timestamp_from(chain.read(harvester, IWrappedGlpHarvester::lastExecutionCall {}).await?);
        if !Readiness::new(last, self.args.interval_in_seconds, ctx.block_timestamp).is_ready() {
            return Ok(KeeperResult::skip(TIME_NOT_ELAPSED));
        }

        let (reward_token, output_token, rewards) = futures::try_join!(
            chain.read(harvester, IWrappedGlpHarvester::rewardTokenCall {}),
            chain.read(harvester, IWrappedGlpHarvester::outputTokenCall {}),
            chain.read(harvester, IWrappedGlpHarvester::totalRewardsBalanceAfterClaimingCall {}),
        )?;
        if rewards.is_zero() {
            return Ok(KeeperResult::skip(NOTHING_TO_HARVEST));
        }

        let slippage = self.args.reward_swapping_slippage_in_bips;
        let quote = self
            .quoter
            .quote(
                ctx,
                &QuoteRequest {
                    chain_id: ctx.chain_id,
                    sell_token: reward_token,
                    buy_token: output_token,
                    sell_amount: rewards,
                    slippage_bips: slippage,
                    taker: harvester,
                },
            )
            .await?;
        let min_out = quote.min_out(slippage);
        info!("swap {} {} for at least {} {}", rewards, reward_token, min_out, output_token);

        let data = IWrappedGlpHarvester::runCall { minOut: min_out, data: quote.data }.abi_encode();
        Ok(KeeperResult::exec(vec![CallData::new(harvester, data)]))
    }
}
