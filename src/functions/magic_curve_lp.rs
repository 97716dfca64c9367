//! magicCurveLP harvester
//!
//! Rewards are swapped into one of the pool's coins, then added as single
//! sided liquidity. Nothing is minted below `minimumLpAmount`.

use super::{de_u256, require_address, Keeper, QuoteArgs};
use crate::chain::abi::{ICurveLens, IERC20, IERC4626, IMagicCurveLpHarvester};
use crate::context::KeeperContext;
use crate::error::KeeperError;
use crate::guards::{check_bips, ReadinessGate, NOTHING_TO_HARVEST, TIME_NOT_ELAPSED};
use crate::quotes::{Aggregator, QuoteRequest, SwapQuoter};
use crate::result::{CallData, KeeperResult};
use alloy_primitives::{Address, U256};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

/// Message when the projected LP is under the minimum
pub const BALANCE_TOO_LOW: &str = "reward balance too low, not minting lp yet";

fn default_quote() -> QuoteArgs {
    QuoteArgs::new(Aggregator::OpenOcean)
}

/// 100 LP
fn default_minimum_lp() -> U256 {
    U256::from(100u64) * U256::from(10u64).pow(U256::from(18u64))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MagicCurveLpArgs {
    pub exec_address: Address,
    pub vault_address: Address,
    pub curve_lens_address: Address,
    pub swap_reward_to_token_address: Address,
    pub swap_rewards_slippage_bips: u64,
    pub interval_in_seconds: u64,
    #[serde(default = "default_minimum_lp", deserialize_with = "de_u256")]
    pub minimum_lp_amount: U256,
    #[serde(default = "default_quote")]
    pub quote: QuoteArgs,
}

impl MagicCurveLpArgs {
    pub fn validate(&self) -> Result<(), KeeperError> {
        require_address("execAddress", self.exec_address)?;
        require_address("vaultAddress", self.vault_address)?;
        require_address("curveLensAddress", self.curve_lens_address)?;
        require_address("swapRewardToTokenAddress", self.swap_reward_to_token_address)?;
        check_bips("swapRewardsSlippageBips", self.swap_rewards_slippage_bips)
    }
}

pub struct MagicCurveLpKeeper {
    args: MagicCurveLpArgs,
    quoter: Arc<dyn SwapQuoter>,
    gate: ReadinessGate,
}

impl MagicCurveLpKeeper {
    pub fn new(args: MagicCurveLpArgs, quoter: Arc<dyn SwapQuoter>) -> Self {
        let gate = ReadinessGate::new(args.interval_in_seconds);
        Self { args, quoter, gate }
    }
}

#[async_trait]
impl Keeper for MagicCurveLpKeeper {
    fn name(&self) -> &'static str {
        "magic-curve-lp"
    }

    async fn evaluate(&self, ctx: &KeeperContext) -> Result<KeeperResult, KeeperError> {
        if !self.gate.check_store(ctx).await?.is_ready() {
            return Ok(KeeperResult::skip(TIME_NOT_ELAPSED));
        }

        let chain = ctx.provider()?;
        let harvester = self.args.exec_address;
        let token = self.args.swap_reward_to_token_address;

        let (reward_token, pool, reward_amount) = futures::try_join!(
            chain.read(harvester, IMagicCurveLpHarvester::rewardTokenCall {}),
            chain.read(self.args.vault_address, IERC4626::assetCall {}),
            chain.read(harvester, IMagicCurveLpHarvester::totalRewardsBalanceAfterClaimingCall {}),
        )?;
        info!("reward amount: {} of {}", reward_amount, reward_token);
        if reward_amount.is_zero() {
            return Ok(KeeperResult::skip(NOTHING_TO_HARVEST));
        }

        let quote = self
            .quoter
            .quote(
                ctx,
                &QuoteRequest {
                    chain_id: ctx.chain_id,
                    sell_token: reward_token,
                    buy_token: token,
                    sell_amount: reward_amount,
                    slippage_bips: self.args.swap_rewards_slippage_bips,
                    taker: harvester,
                },
            )
            .await?;
        let swapped = quote.min_out(self.args.swap_rewards_slippage_bips);

        let (held, num_coins, token_in_index) = futures::try_join!(
            chain.read(token, IERC20::balanceOfCall { account: harvester }),
            chain.read(harvester, IMagicCurveLpHarvester::poolNumCoinsCall {}),
            chain.read(harvester, IMagicCurveLpHarvester::poolTokenInIndexCall {}),
        )?;
        let total = held + swapped;
        info!("total {} to add as liquidity: {}", token, total);

        let index = usize::from(token_in_index);
        if index >= 4 {
            return Err(KeeperError::Rpc(format!("pool token index {} out of range", index)));
        }
        let mut amounts = [U256::ZERO; 4];
        amounts[index] = total;

        let min_lp = chain
            .read(
                self.args.curve_lens_address,
                ICurveLens::calc_token_amountCall {
                    pool,
                    lpToken: pool,
                    amounts,
                    numCoins: U256::from(num_coins),
                    deposit: true,
                },
            )
            .await?;
        info!("projected lp mint amount: {}", min_lp);

        if min_lp <= self.args.minimum_lp_amount {
            return Ok(KeeperResult::skip(BALANCE_TOO_LOW));
        }

        let data = IMagicCurveLpHarvester::runCall {
            minLp: min_lp,
            tokenIn: token,
            maxAmountIn: U256::MAX,
            swapData: quote.data,
        }
        .abi_encode();

        self.gate.commit(ctx).await?;
        Ok(KeeperResult::exec(vec![CallData::new(harvester, data)]))
    }
}
