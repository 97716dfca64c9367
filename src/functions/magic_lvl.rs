//! magicLVL harvester (BSC)
//!
//! - Gate from the store, falling back to the harvester's `lastExecution()`
//! - LVL pending in staking plus balances held by the vault and harvester
//! - LVL -> WBNB quote, APY capped against the tranche vault value
//! - LP estimate from the vault oracle, 1% slippage

use super::{require_address, Keeper, QuoteArgs};
use crate::chain::abi::{IAggregator, IERC20, IERC4626, ILevelStakingLens, IMagicLevelHarvester, IProxyOracle};
use crate::context::KeeperContext;
use crate::error::KeeperError;
use crate::guards::{
    check_bips, min_out, positive_price, timestamp_from, ApyCap, ReadinessGate, CHAINLINK_PRICE_SCALE,
    NOTHING_TO_HARVEST, TIME_NOT_ELAPSED,
};
use crate::quotes::{Aggregator, QuoteRequest, SwapQuoter};
use crate::registry::level;
use crate::result::{CallData, KeeperResult};
use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

/// Slippage on the projected LP mint
const MINT_LP_SLIPPAGE_BIPS: u64 = 100;

fn default_harvester() -> Address {
    level::HARVESTER
}

fn default_quote() -> QuoteArgs {
    QuoteArgs::with_endpoint(Aggregator::ZeroEx, "https://bsc.api.0x.org")
}

fn default_swap_slippage() -> u64 {
    100
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MagicLvlArgs {
    #[serde(default = "default_harvester")]
    pub exec_address: Address,
    pub vault_oracle: Address,
    pub interval_in_seconds: u64,
    pub max_apy_in_bips: u64,
    #[serde(default = "default_swap_slippage")]
    pub swap_slippage_in_bips: u64,
    #[serde(default = "default_quote")]
    pub quote: QuoteArgs,
}

impl MagicLvlArgs {
    pub fn validate(&self) -> Result<(), KeeperError> {
        require_address("execAddress", self.exec_address)?;
        require_address("vaultOracle", self.vault_oracle)?;
        check_bips("swapSlippageInBips", self.swap_slippage_in_bips)
    }
}

pub struct MagicLvlKeeper {
    args: MagicLvlArgs,
    quoter: Arc<dyn SwapQuoter>,
    gate: ReadinessGate,
}

impl MagicLvlKeeper {
    pub fn new(args: MagicLvlArgs, quoter: Arc<dyn SwapQuoter>) -> Self {
        let gate = ReadinessGate::new(args.interval_in_seconds);
        Self { args, quoter, gate }
    }
}

#[async_trait]
impl Keeper for MagicLvlKeeper {
    fn name(&self) -> &'static str {
        "magic-lvl"
    }

    async fn evaluate(&self, ctx: &KeeperContext) -> Result<KeeperResult, KeeperError> {
        let chain = ctx.provider()?;
        let harvester = self.args.exec_address;

        let last = match self.gate.stored(ctx).await? {
            Some(last) => last,
            None => timestamp_from(chain.read(harvester, IMagicLevelHarvester::lastExecutionCall {}).await?),
        };
        let readiness = self.gate.check(last, ctx.block_timestamp);
        if !readiness.is_ready() {
            return Ok(KeeperResult::skip(TIME_NOT_ELAPSED));
        }

        let implementation = chain.read(self.args.vault_oracle, IProxyOracle::oracleImplementationCall {}).await?;
        let vault = chain.read(implementation, IProxyOracle::trancheVaultCall {}).await?;
        let pid = level::staking_pid(vault)?;
        info!("vault: {} (pid {})", vault, pid);

        let (pending, in_vault, in_harvester) = futures::try_join!(
            chain.read(level::STAKING_LENS, ILevelStakingLens::pendingRewardsCall { pid: U256::from(pid), user: vault }),
            chain.read(level::LVL, IERC20::balanceOfCall { account: vault }),
            chain.read(level::LVL, IERC20::balanceOfCall { account: harvester }),
        )?;
        let lvl_amount = pending + in_vault + in_harvester;
        info!("reward amount in LVL: {}", lvl_amount);
        if lvl_amount.is_zero() {
            return Ok(KeeperResult::skip(NOTHING_TO_HARVEST));
        }

        let quote = self
            .quoter
            .quote(
                ctx,
                &QuoteRequest {
                    chain_id: ctx.chain_id,
                    sell_token: level::LVL,
                    buy_token: level::WBNB,
                    sell_amount: lvl_amount,
                    slippage_bips: self.args.swap_slippage_in_bips,
                    taker: harvester,
                },
            )
            .await?;
        let mut wbnb_amount = quote.buy_amount;
        if wbnb_amount.is_zero() {
            return Ok(KeeperResult::skip(NOTHING_TO_HARVEST));
        }

        let spot = chain.read(self.args.vault_oracle, IProxyOracle::peekSpotCall { data: Bytes::new() }).await?;
        if spot.is_zero() {
            return Err(KeeperError::Rpc(format!("peekSpot on {} returned 0", self.args.vault_oracle)));
        }
        let (assets_per_spot, supply, answer) = futures::try_join!(
            chain.read(vault, IERC4626::convertToAssetsCall { shares: spot }),
            chain.read(vault, IERC4626::totalSupplyCall {}),
            chain.read(level::BNB_USD_ORACLE, IAggregator::latestAnswerCall {}),
        )?;
        if assets_per_spot.is_zero() {
            return Err(KeeperError::Rpc(format!("convertToAssets on {} returned 0", vault)));
        }
        let bnb_price = positive_price(answer)?;
        let e18 = U256::from(10u64).pow(U256::from(18u64));
        let e36 = e18 * e18;
        let one_lp_price = e36 / assets_per_spot;
        let vault_value = e18 * supply / spot;
        info!("LLP price: {}, vault value: {}, BNB price: {}", one_lp_price, vault_value, bnb_price);

        if readiness.is_first_run() {
            info!("first harvest: ignoring apy for now");
        } else {
            let outcome = ApyCap::new(self.args.max_apy_in_bips).apply(
                wbnb_amount,
                bnb_price,
                U256::from(CHAINLINK_PRICE_SCALE),
                readiness.elapsed(),
                vault_value,
            );
            wbnb_amount = outcome.amount;
        }

        if one_lp_price.is_zero() {
            return Err(KeeperError::Rpc(format!("LP price of {} rounds to 0", vault)));
        }
        // 8 decimal price, 18 decimal LP
        let mint_lp = wbnb_amount * bnb_price / one_lp_price * U256::from(10_000_000_000u64);
        let min_lp = min_out(mint_lp, MINT_LP_SLIPPAGE_BIPS);
        info!("projected lp mint amount: {}", min_lp);

        let data = IMagicLevelHarvester::runCall {
            vault,
            minLp: min_lp,
            tokenIn: level::WBNB,
            maxAmountIn: wbnb_amount,
            swapData: quote.data,
        }
        .abi_encode();

        self.gate.commit(ctx).await?;
        Ok(KeeperResult::exec(vec![CallData::new(harvester, data)]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::testing::{test_context, TestContext};
    use crate::quotes::mock::MockQuoter;
    use crate::registry::BSC;
    use crate::store::{KeyValueStore, LAST_TIMESTAMP_KEY};
    use alloy_primitives::I256;
    use alloy_sol_types::SolValue;

    const NOW: u64 = 1_700_000_000;

    fn args() -> MagicLvlArgs {
        MagicLvlArgs {
            exec_address: level::HARVESTER,
            vault_oracle: Address::repeat_byte(0x0a),
            interval_in_seconds: 3_600,
            max_apy_in_bips: 3_000,
            swap_slippage_in_bips: 100,
            quote: default_quote(),
        }
    }

    fn e18(n: u64) -> U256 {
        U256::from(n) * U256::from(10u64).pow(U256::from(18u64))
    }

    fn mock_vault(t: &TestContext, pending: U256) {
        let implementation = Address::repeat_byte(0x0b);
        let vault = level::JUNIOR_VAULT;
        t.chain
            .respond(args().vault_oracle, IProxyOracle::oracleImplementationCall {}, implementation.abi_encode())
            .respond(implementation, IProxyOracle::trancheVaultCall {}, vault.abi_encode())
            .respond_any::<ILevelStakingLens::pendingRewardsCall>(level::STAKING_LENS, pending.abi_encode())
            .respond_any::<IERC20::balanceOfCall>(level::LVL, U256::ZERO.abi_encode())
            .respond_any::<IProxyOracle::peekSpotCall>(args().vault_oracle, e18(1).abi_encode())
            // 1 LP = $1
            .respond_any::<IERC4626::convertToAssetsCall>(vault, e18(1).abi_encode())
            .respond(vault, IERC4626::totalSupplyCall {}, e18(10_000_000).abi_encode())
            // $300
            .respond(level::BNB_USD_ORACLE, IAggregator::latestAnswerCall {}, I256::try_from(30_000_000_000i64).unwrap().abi_encode());
    }

    #[tokio::test]
    async fn test_falls_back_to_last_execution() {
        let t = test_context(BSC, NOW);
        t.chain.respond(level::HARVESTER, IMagicLevelHarvester::lastExecutionCall {}, U256::from(NOW - 60).abi_encode());
        let quoter = Arc::new(MockQuoter::returning(1, b""));

        let result = MagicLvlKeeper::new(args(), quoter.clone()).evaluate(&t.ctx).await.unwrap();
        assert_eq!(result.message(), Some(TIME_NOT_ELAPSED));
        assert_eq!(quoter.call_count(), 0);
    }

    #[tokio::test]
    async fn test_no_rewards_skips_quote() {
        let t = test_context(BSC, NOW);
        t.store.set(LAST_TIMESTAMP_KEY, "1".to_string()).await.unwrap();
        mock_vault(&t, U256::ZERO);
        let quoter = Arc::new(MockQuoter::returning(1, b""));

        let result = MagicLvlKeeper::new(args(), quoter.clone()).evaluate(&t.ctx).await.unwrap();
        assert_eq!(result.message(), Some(NOTHING_TO_HARVEST));
        assert_eq!(quoter.call_count(), 0);
    }

    #[tokio::test]
    async fn test_first_harvest_mints_full_quote() {
        let t = test_context(BSC, NOW);
        t.chain.respond(level::HARVESTER, IMagicLevelHarvester::lastExecutionCall {}, U256::ZERO.abi_encode());
        mock_vault(&t, e18(50));
        // 1 WBNB
        let quoter = Arc::new(MockQuoter::returning(1_000_000_000_000_000_000, &[0x5a, 0x5a]));

        let result = MagicLvlKeeper::new(args(), quoter.clone()).evaluate(&t.ctx).await.unwrap();
        let run = IMagicLevelHarvester::runCall::abi_decode(&result.calls()[0].data).unwrap();
        assert_eq!(run.vault, level::JUNIOR_VAULT);
        assert_eq!(run.maxAmountIn, e18(1));
        // 1 BNB at $300 mints 300 LP at $1, minus 1%
        assert_eq!(run.minLp, e18(297));
        assert_eq!(run.swapData, Bytes::from(vec![0x5a, 0x5a]));
        assert_eq!(quoter.requests()[0].sell_amount, e18(50));
        assert_eq!(t.store.snapshot()[LAST_TIMESTAMP_KEY], NOW.to_string());
    }
}
