//! Stargate v2 strategy: rewards swapped to the underlying through an
//! aggregator, minted into LP, then `safeHarvest`

use super::stargate_v1::safe_harvest;
use super::{require_address, Keeper, QuoteArgs};
use crate::chain::abi::{IBentoBox, IERC20, IStargateV2Strategy};
use crate::context::KeeperContext;
use crate::error::KeeperError;
use crate::guards::{check_bips, min_out, ReadinessGate, TIME_NOT_ELAPSED};
use crate::quotes::{Aggregator, QuoteRequest, SwapQuoter};
use crate::registry;
use crate::result::{CallData, KeeperResult};
use alloy_primitives::utils::parse_ether;
use alloy_primitives::{Address, U256};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

/// Reward balance (in whole tokens) above which rewards are minted into LP
const MIN_REWARD_BALANCE: &str = "10";

fn default_quote() -> QuoteArgs {
    QuoteArgs::new(Aggregator::OpenOcean)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StargateV2Args {
    pub exec_address: Address,
    pub degen_box_address: Address,
    pub lp_address: Address,
    pub reward_address: Address,
    pub underlying_address: Address,
    #[serde(default)]
    pub gelato_proxy_address: Option<Address>,
    pub swap_to_lp_slippage_bips: u64,
    pub interval_in_seconds: u64,
    #[serde(default = "default_quote")]
    pub quote: QuoteArgs,
}

impl StargateV2Args {
    pub fn validate(&self) -> Result<(), KeeperError> {
        require_address("execAddress", self.exec_address)?;
        require_address("degenBoxAddress", self.degen_box_address)?;
        require_address("lpAddress", self.lp_address)?;
        require_address("rewardAddress", self.reward_address)?;
        require_address("underlyingAddress", self.underlying_address)?;
        check_bips("swapToLpSlippageBips", self.swap_to_lp_slippage_bips)
    }
}

pub struct StargateV2Keeper {
    args: StargateV2Args,
    quoter: Arc<dyn SwapQuoter>,
    gate: ReadinessGate,
}

impl StargateV2Keeper {
    pub fn new(args: StargateV2Args, quoter: Arc<dyn SwapQuoter>) -> Self {
        let gate = ReadinessGate::new(args.interval_in_seconds);
        Self { args, quoter, gate }
    }
}

#[async_trait]
impl Keeper for StargateV2Keeper {
    fn name(&self) -> &'static str {
        "stargate-v2"
    }

    async fn evaluate(&self, ctx: &KeeperContext) -> Result<KeeperResult, KeeperError> {
        if !self.gate.check_store(ctx).await?.is_ready() {
            return Ok(KeeperResult::skip(TIME_NOT_ELAPSED));
        }

        let chain = ctx.provider()?;
        let strategy = self.args.exec_address;

        let (reward_balance, totals) = futures::try_join!(
            chain.read(self.args.reward_address, IERC20::balanceOfCall { account: strategy }),
            chain.read(self.args.degen_box_address, IBentoBox::totalsCall { token: self.args.lp_address }),
        )?;
        info!("totalElastic {}", totals.elastic);
        info!("Reward balance {}", reward_balance);

        let threshold = parse_ether(MIN_REWARD_BALANCE).map_err(KeeperError::config)?;
        let mut calls = Vec::with_capacity(2);

        if reward_balance > threshold {
            let quote = self
                .quoter
                .quote(
                    ctx,
                    &QuoteRequest {
                        chain_id: ctx.chain_id,
                        sell_token: self.args.reward_address,
                        buy_token: self.args.underlying_address,
                        sell_amount: reward_balance,
                        slippage_bips: self.args.swap_to_lp_slippage_bips,
                        taker: strategy,
                    },
                )
                .await?;
            debug!("{} quote: {} out", self.quoter.name(), quote.buy_amount);

            let executor = self
                .args
                .gelato_proxy_address
                .unwrap_or_else(|| registry::automation_proxy(ctx.chain_id));
            let simulated = chain
                .read_from(
                    strategy,
                    IStargateV2Strategy::swapToLPCall { amountOutMin: U256::ZERO, data: quote.data.clone() },
                    Some(executor),
                )
                .await?;
            let amount_out_min = min_out(simulated, self.args.swap_to_lp_slippage_bips);
            info!("amountOutMin {}, with slippage {}", simulated, amount_out_min);

            calls.push(CallData::new(
                strategy,
                IStargateV2Strategy::swapToLPCall { amountOutMin: amount_out_min, data: quote.data }.abi_encode(),
            ));
        } else {
            info!("Reward balance too low, not minting lp yet");
        }

        calls.push(safe_harvest(strategy, totals.elastic));

        self.gate.commit(ctx).await?;
        Ok(KeeperResult::exec(calls))
    }
}
