//! magicGLP harvester
//!
//! Rewards (claimable plus native balance) are minted into GLP. The reward
//! amount is capped so a single harvest never implies more than
//! `maxApyInBips` on the vault's TVL.

use super::{require_address, Keeper};
use crate::chain::abi::{IAggregator, IERC4626, IGlpLens, IMagicGlpHarvester, IProxyOracle};
use crate::context::KeeperContext;
use crate::error::KeeperError;
use crate::guards::{
    check_bips, min_out, positive_price, ApyCap, ReadinessGate, CHAINLINK_PRICE_SCALE, NOTHING_TO_HARVEST,
    TIME_NOT_ELAPSED,
};
use crate::result::{CallData, KeeperResult};
use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MagicGlpArgs {
    pub exec_address: Address,
    pub interval_in_seconds: u64,
    pub lens_address: Address,
    pub reward_token: Address,
    pub mint_glp_slippage_in_bips: u64,
    pub reward_token_chainlink_address: Address,
    pub magic_glp_oracle_address: Address,
    pub max_apy_in_bips: u64,
}

impl MagicGlpArgs {
    pub fn validate(&self) -> Result<(), KeeperError> {
        require_address("execAddress", self.exec_address)?;
        require_address("lensAddress", self.lens_address)?;
        require_address("rewardToken", self.reward_token)?;
        require_address("rewardTokenChainlinkAddress", self.reward_token_chainlink_address)?;
        require_address("magicGlpOracleAddress", self.magic_glp_oracle_address)?;
        check_bips("mintGlpSlippageInBips", self.mint_glp_slippage_in_bips)
    }
}

pub struct MagicGlpKeeper {
    args: MagicGlpArgs,
    gate: ReadinessGate,
}

impl MagicGlpKeeper {
    pub fn new(args: MagicGlpArgs) -> Self {
        let gate = ReadinessGate::new(args.interval_in_seconds);
        Self { args, gate }
    }

    /// magicGLP TVL in USD (18 decimals): `1e18 * supply / peekSpot`
    async fn vault_value(&self, ctx: &KeeperContext) -> Result<U256, KeeperError> {
        let chain = ctx.provider()?;
        let oracle = self.args.magic_glp_oracle_address;

        let implementation = chain.read(oracle, IProxyOracle::oracleImplementationCall {}).await?;
        let magic_glp = chain.read(implementation, IProxyOracle::magicGlpCall {}).await?;

        let (spot, supply) = futures::try_join!(
            chain.read(oracle, IProxyOracle::peekSpotCall { data: Bytes::new() }),
            chain.read(magic_glp, IERC4626::totalSupplyCall {}),
        )?;
        if spot.is_zero() {
            return Err(KeeperError::Rpc(format!("peekSpot on {} returned 0", oracle)));
        }
        Ok(U256::from(10u64).pow(U256::from(18u64)) * supply / spot)
    }
}

#[async_trait]
impl Keeper for MagicGlpKeeper {
    fn name(&self) -> &'static str {
        "magic-glp"
    }

    async fn evaluate(&self, ctx: &KeeperContext) -> Result<KeeperResult, KeeperError> {
        let readiness = self.gate.check_store(ctx).await?;
        if !readiness.is_ready() {
            return Ok(KeeperResult::skip(TIME_NOT_ELAPSED));
        }

        let chain = ctx.provider()?;
        let harvester = self.args.exec_address;
        let (claimable, native) = futures::try_join!(
            chain.read(harvester, IMagicGlpHarvester::totalRewardsBalanceAfterClaimingCall {}),
            chain.balance(harvester),
        )?;
        let mut reward_amount = claimable + native;
        info!("reward amount: {}", reward_amount);

        if reward_amount.is_zero() {
            return Ok(KeeperResult::skip(NOTHING_TO_HARVEST));
        }

        if readiness.is_first_run() {
            info!("first harvest: ignoring apy for now");
        } else {
            let (vault_value, answer) = futures::try_join!(
                self.vault_value(ctx),
                chain.read(self.args.reward_token_chainlink_address, IAggregator::latestAnswerCall {}),
            )?;
            let price = positive_price(answer)?;
            info!("reward price: {} (8 decimals), magicGLP value: {}", price, vault_value);
            info!("time elapsed since last harvest: {} seconds", readiness.elapsed());

            let outcome = ApyCap::new(self.args.max_apy_in_bips).apply(
                reward_amount,
                price,
                U256::from(CHAINLINK_PRICE_SCALE),
                readiness.elapsed(),
                vault_value,
            );
            reward_amount = outcome.amount;
        }

        let minted = chain
            .read(
                self.args.lens_address,
                IGlpLens::getMintedGlpFromTokenInCall { tokenIn: self.args.reward_token, amount: reward_amount },
            )
            .await?;
        info!("projected glp mint amount: {}", minted.glpAmount);

        let min_glp = min_out(minted.glpAmount, self.args.mint_glp_slippage_in_bips);
        let data = IMagicGlpHarvester::runCall { minGlp: min_glp, rewardAmount: reward_amount }.abi_encode();

        self.gate.commit(ctx).await?;
        Ok(KeeperResult::exec(vec![CallData::new(harvester, data)]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::testing::test_context;
    use crate::functions::run_keeper;
    use crate::store::{KeyValueStore, LAST_TIMESTAMP_KEY};
    use alloy_primitives::I256;
    use alloy_sol_types::SolValue;

    const NOW: u64 = 1_700_000_000;

    fn args() -> MagicGlpArgs {
        MagicGlpArgs {
            exec_address: Address::repeat_byte(0x01),
            interval_in_seconds: 3_600,
            lens_address: Address::repeat_byte(0x02),
            reward_token: Address::repeat_byte(0x03),
            mint_glp_slippage_in_bips: 100,
            reward_token_chainlink_address: Address::repeat_byte(0x04),
            magic_glp_oracle_address: Address::repeat_byte(0x05),
            max_apy_in_bips: 2_000,
        }
    }

    fn e18(n: u64) -> U256 {
        U256::from(n) * U256::from(10u64).pow(U256::from(18u64))
    }

    fn mock_vault(t: &crate::context::testing::TestContext) {
        let a = args();
        let implementation = Address::repeat_byte(0x06);
        let magic_glp = Address::repeat_byte(0x07);
        t.chain
            .respond(a.magic_glp_oracle_address, IProxyOracle::oracleImplementationCall {}, implementation.abi_encode())
            .respond(implementation, IProxyOracle::magicGlpCall {}, magic_glp.abi_encode())
            // 1 GLP = $1
            .respond_any::<IProxyOracle::peekSpotCall>(a.magic_glp_oracle_address, e18(1).abi_encode())
            .respond(magic_glp, IERC4626::totalSupplyCall {}, e18(1_000_000).abi_encode())
            // $2000
            .respond(
                a.reward_token_chainlink_address,
                IAggregator::latestAnswerCall {},
                I256::try_from(200_000_000_000i64).unwrap().abi_encode(),
            );
    }

    #[tokio::test]
    async fn test_time_not_elapsed_short_circuits() {
        let t = test_context(42161, NOW);
        t.store.set(LAST_TIMESTAMP_KEY, (NOW - 10).to_string()).await.unwrap();

        let result = MagicGlpKeeper::new(args()).evaluate(&t.ctx).await.unwrap();
        assert_eq!(result.message(), Some(TIME_NOT_ELAPSED));
        assert_eq!(t.chain.call_count(), 0);
    }

    #[tokio::test]
    async fn test_nothing_to_harvest() {
        let t = test_context(42161, NOW);
        t.chain.respond(args().exec_address, IMagicGlpHarvester::totalRewardsBalanceAfterClaimingCall {}, U256::ZERO.abi_encode());

        let result = MagicGlpKeeper::new(args()).evaluate(&t.ctx).await.unwrap();
        assert_eq!(result.message(), Some(NOTHING_TO_HARVEST));
        assert!(t.store.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_apy_cap_limits_reward_amount() {
        let a = args();
        let t = test_context(42161, NOW);
        let last = NOW - 86_400;
        t.store.set(LAST_TIMESTAMP_KEY, last.to_string()).await.unwrap();
        mock_vault(&t);
        // 10 ETH of rewards ($20k) on $1M in a day: far above 20%
        t.chain.respond(a.exec_address, IMagicGlpHarvester::totalRewardsBalanceAfterClaimingCall {}, e18(10).abi_encode());
        t.chain.respond_any::<IGlpLens::getMintedGlpFromTokenInCall>(
            a.lens_address,
            (e18(100), U256::from(30u64)).abi_encode_params(),
        );

        let result = MagicGlpKeeper::new(a.clone()).evaluate(&t.ctx).await.unwrap();
        assert!(result.can_exec());

        let run = IMagicGlpHarvester::runCall::abi_decode(&result.calls()[0].data).unwrap();
        let expected = ApyCap::new(a.max_apy_in_bips).apply(
            e18(10),
            U256::from(200_000_000_000u64),
            U256::from(CHAINLINK_PRICE_SCALE),
            86_400,
            e18(1_000_000),
        );
        assert!(expected.capped);
        assert_eq!(run.rewardAmount, expected.amount);
        assert_eq!(run.minGlp, e18(99));
        assert_eq!(t.store.snapshot().get(LAST_TIMESTAMP_KEY).cloned(), Some(NOW.to_string()));
    }

    #[tokio::test]
    async fn test_first_run_skips_apy_cap() {
        let a = args();
        let t = test_context(42161, NOW);
        t.chain.set_balance(a.exec_address, e18(1));
        t.chain.respond(a.exec_address, IMagicGlpHarvester::totalRewardsBalanceAfterClaimingCall {}, e18(10).abi_encode());
        t.chain.respond_any::<IGlpLens::getMintedGlpFromTokenInCall>(
            a.lens_address,
            (e18(100), U256::ZERO).abi_encode_params(),
        );

        let result = MagicGlpKeeper::new(a).evaluate(&t.ctx).await.unwrap();
        let run = IMagicGlpHarvester::runCall::abi_decode(&result.calls()[0].data).unwrap();
        assert_eq!(run.rewardAmount, e18(11));
    }

    #[tokio::test]
    async fn test_rpc_failure_leaves_store_untouched() {
        let t = test_context(42161, NOW);
        t.chain.respond(args().exec_address, IMagicGlpHarvester::totalRewardsBalanceAfterClaimingCall {}, e18(1).abi_encode());

        let result = run_keeper(&MagicGlpKeeper::new(args()), &t.ctx).await;
        assert!(!result.can_exec());
        assert!(result.message().unwrap().contains("getMintedGlpFromTokenIn"));
        assert!(t.store.snapshot().is_empty());
    }
}
