//! Velodrome OP/USDC strategy executor
//!
//! Two optional steps, each priced by the strategy lens:
//! - harvest the Solidly wrapper into LP
//! - swap the strategy's gauge rewards into LP
//!
//! A lens quote that reverts counts as nothing to do for that step. Any other
//! read failure aborts the run without touching the store.

use super::{require_address, Keeper};
use crate::chain::abi::{ISolidlyFactory, ISolidlyLens, ISolidlyStrategy, ISolidlyWrapper, IVelodromeExecutor};
use crate::chain::ChainReader;
use crate::context::KeeperContext;
use crate::error::KeeperError;
use crate::guards::{check_bips, min_out, ReadinessGate, TIME_NOT_ELAPSED};
use crate::result::{CallData, KeeperResult};
use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

pub const CANNOT_EXECUTE: &str = "Cannot execute";

/// Volatile pool fee when no factory is configured
const DEFAULT_VOLATILE_FEE: u64 = 3;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VelodromeArgs {
    pub exec_address: Address,
    pub interval_in_seconds: u64,
    pub wrapper: Address,
    pub pair: Address,
    pub router: Address,
    #[serde(default)]
    pub factory: Option<Address>,
    pub wrapper_reward_quote_slippage_bips: u64,
    pub strategy_reward_quote_slippage_bips: u64,
    pub strategy: Address,
    pub strategy_lens: Address,
    pub max_bento_box_amount_increase_in_bips: u64,
    pub max_bento_box_change_amount_in_bips: u64,
}

impl VelodromeArgs {
    pub fn validate(&self) -> Result<(), KeeperError> {
        require_address("execAddress", self.exec_address)?;
        require_address("wrapper", self.wrapper)?;
        require_address("pair", self.pair)?;
        require_address("router", self.router)?;
        require_address("strategy", self.strategy)?;
        require_address("strategyLens", self.strategy_lens)?;
        check_bips("wrapperRewardQuoteSlippageBips", self.wrapper_reward_quote_slippage_bips)?;
        check_bips("strategyRewardQuoteSlippageBips", self.strategy_reward_quote_slippage_bips)?;
        check_bips("maxBentoBoxAmountIncreaseInBips", self.max_bento_box_amount_increase_in_bips)?;
        check_bips("maxBentoBoxChangeAmountInBips", self.max_bento_box_change_amount_in_bips)
    }
}

/// Lens quote, zero when the lens reverts
async fn quote_or_zero<C>(chain: &Arc<dyn ChainReader>, lens: Address, call: C) -> Result<U256, KeeperError>
where
    C: SolCall<Return = U256> + Send,
{
    match chain.read(lens, call).await {
        Ok(amount) => Ok(amount),
        Err(KeeperError::Revert(e)) => {
            debug!("lens quote reverted: {}", e);
            Ok(U256::ZERO)
        }
        Err(e) => Err(e),
    }
}

pub struct VelodromeKeeper {
    args: VelodromeArgs,
    gate: ReadinessGate,
}

impl VelodromeKeeper {
    pub fn new(args: VelodromeArgs) -> Self {
        let gate = ReadinessGate::new(args.interval_in_seconds);
        Self { args, gate }
    }
}

#[async_trait]
impl Keeper for VelodromeKeeper {
    fn name(&self) -> &'static str {
        "velodrome-op-usdc"
    }

    async fn evaluate(&self, ctx: &KeeperContext) -> Result<KeeperResult, KeeperError> {
        if !self.gate.check_store(ctx).await?.is_ready() {
            return Ok(KeeperResult::skip(TIME_NOT_ELAPSED));
        }

        let chain = ctx.provider()?;
        let a = &self.args;

        let fee = match a.factory {
            Some(factory) => chain.read(factory, ISolidlyFactory::volatileFeeCall {}).await?,
            None => U256::from(DEFAULT_VOLATILE_FEE),
        };

        let (wrapper_lp, strategy_lp) = futures::try_join!(
            quote_or_zero(
                &chain,
                a.strategy_lens,
                ISolidlyLens::quoteSolidlyWrapperHarvestAmountOutCall { wrapper: a.wrapper, router: a.router, fee },
            ),
            quote_or_zero(
                &chain,
                a.strategy_lens,
                ISolidlyLens::quoteSolidlyGaugeVolatileStrategySwapToLPAmountCall {
                    strategy: a.strategy,
                    pair: a.pair,
                    router: a.router,
                    fee,
                },
            ),
        )?;

        let mut callees: Vec<Address> = Vec::with_capacity(2);
        let mut datas: Vec<Bytes> = Vec::with_capacity(2);

        if !wrapper_lp.is_zero() {
            let min_lp = min_out(wrapper_lp, a.wrapper_reward_quote_slippage_bips);
            info!("minLpOutFromWrapperRewards: {}", min_lp);
            callees.push(a.wrapper);
            datas.push(ISolidlyWrapper::harvestCall { minAmountOut: min_lp }.abi_encode().into());
        }

        if !strategy_lp.is_zero() {
            let min_lp = min_out(strategy_lp, a.strategy_reward_quote_slippage_bips);
            info!("minLpOutFromStrategyRewards: {}", min_lp);
            callees.push(a.strategy);
            datas.push(ISolidlyStrategy::swapToLPCall { amountOutMin: min_lp, fee }.abi_encode().into());
        }

        if datas.is_empty() {
            return Ok(KeeperResult::skip(CANNOT_EXECUTE));
        }

        let data = IVelodromeExecutor::runCall {
            strategy: a.strategy,
            maxBentoBoxAmountIncreaseInBips: U256::from(a.max_bento_box_amount_increase_in_bips),
            maxBentoBoxChangeAmountInBips: U256::from(a.max_bento_box_change_amount_in_bips),
            callees,
            datas,
            postRebalanceEnabled: true,
        }
        .abi_encode();

        self.gate.commit(ctx).await?;
        Ok(KeeperResult::exec(vec![CallData::new(a.exec_address, data)]))
    }
}
