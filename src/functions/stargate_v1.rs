//! Stargate v1 strategy: STG rewards to LP, then `safeHarvest`
//!
//! The LP out of `swapToLP` is only known by simulating the call as the
//! automation proxy, which is the strategy's authorized executor.

use super::{require_address, Keeper};
use crate::chain::abi::{IBentoBox, IERC20, IStargateStrategy};
use crate::context::KeeperContext;
use crate::error::KeeperError;
use crate::guards::{check_bips, min_out, ReadinessGate, TIME_NOT_ELAPSED};
use crate::registry;
use crate::result::{CallData, KeeperResult};
use alloy_primitives::utils::parse_ether;
use alloy_primitives::{Address, U256};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

/// STG balance (in STG) above which rewards are minted into LP
const MIN_STG_BALANCE: &str = "10";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StargateV1Args {
    pub exec_address: Address,
    pub degen_box_address: Address,
    pub lp_address: Address,
    pub stg_address: Address,
    /// Defaults to the chain's automation proxy
    #[serde(default)]
    pub gelato_proxy_address: Option<Address>,
    pub swap_to_lp_slippage_bips: u64,
    pub interval_in_seconds: u64,
}

impl StargateV1Args {
    pub fn validate(&self) -> Result<(), KeeperError> {
        require_address("execAddress", self.exec_address)?;
        require_address("degenBoxAddress", self.degen_box_address)?;
        require_address("lpAddress", self.lp_address)?;
        require_address("stgAddress", self.stg_address)?;
        check_bips("swapToLpSlippageBips", self.swap_to_lp_slippage_bips)
    }

    fn executor(&self, chain_id: u64) -> Address {
        self.gelato_proxy_address.unwrap_or_else(|| registry::automation_proxy(chain_id))
    }
}

/// `safeHarvest(elastic, true, elastic / 10, false)`
pub(crate) fn safe_harvest(strategy: Address, total_elastic: u128) -> CallData {
    let elastic = U256::from(total_elastic);
    let data = IStargateStrategy::safeHarvestCall {
        maxBalance: elastic,
        rebalance: true,
        maxChangeAmount: elastic / U256::from(10u64),
        harvestRewards: false,
    }
    .abi_encode();
    CallData::new(strategy, data)
}

pub struct StargateV1Keeper {
    args: StargateV1Args,
    gate: ReadinessGate,
}

impl StargateV1Keeper {
    pub fn new(args: StargateV1Args) -> Self {
        let gate = ReadinessGate::new(args.interval_in_seconds);
        Self { args, gate }
    }
}

#[async_trait]
impl Keeper for StargateV1Keeper {
    fn name(&self) -> &'static str {
        "stargate-v1"
    }

    async fn evaluate(&self, ctx: &KeeperContext) -> Result<KeeperResult, KeeperError> {
        if !self.gate.check_store(ctx).await?.is_ready() {
            return Ok(KeeperResult::skip(TIME_NOT_ELAPSED));
        }

        let chain = ctx.provider()?;
        let strategy = self.args.exec_address;

        let (stg_balance, totals) = futures::try_join!(
            chain.read(self.args.stg_address, IERC20::balanceOfCall { account: strategy }),
            chain.read(self.args.degen_box_address, IBentoBox::totalsCall { token: self.args.lp_address }),
        )?;
        info!("totalElastic {}", totals.elastic);
        info!("STG balance {}", stg_balance);

        let threshold = parse_ether(MIN_STG_BALANCE).map_err(KeeperError::config)?;
        let mut calls = Vec::with_capacity(2);

        if stg_balance > threshold {
            let simulated = chain
                .read_from(
                    strategy,
                    IStargateStrategy::swapToLPCall { amountOutMin: U256::ZERO },
                    Some(self.args.executor(ctx.chain_id)),
                )
                .await?;
            let amount_out_min = min_out(simulated, self.args.swap_to_lp_slippage_bips);
            info!("amountOutMin {}, with slippage {}", simulated, amount_out_min);

            calls.push(CallData::new(
                strategy,
                IStargateStrategy::swapToLPCall { amountOutMin: amount_out_min }.abi_encode(),
            ));
        } else {
            info!("STG balance too low, not minting lp yet");
        }

        calls.push(safe_harvest(strategy, totals.elastic));

        self.gate.commit(ctx).await?;
        Ok(KeeperResult::exec(calls))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::testing::{test_context, TestContext};
    use crate::store::{KeyValueStore, LAST_TIMESTAMP_KEY};
    use alloy_sol_types::SolValue;

    const NOW: u64 = 1_700_000_000;

    fn e18(n: u64) -> U256 {
        U256::from(n) * U256::from(10u64).pow(U256::from(18u64))
    }

    fn args() -> StargateV1Args {
        StargateV1Args {
            exec_address: Address::repeat_byte(0x51),
            degen_box_address: Address::repeat_byte(0xdb),
            lp_address: Address::repeat_byte(0x1b),
            stg_address: Address::repeat_byte(0x57),
            gelato_proxy_address: None,
            swap_to_lp_slippage_bips: 50,
            interval_in_seconds: 3_600,
        }
    }

    fn mock_strategy(t: &TestContext, stg: U256) {
        let a = args();
        t.chain
            .respond(a.stg_address, IERC20::balanceOfCall { account: a.exec_address }, stg.abi_encode())
            .respond(
                a.degen_box_address,
                IBentoBox::totalsCall { token: a.lp_address },
                (1_000_000u128, 900_000u128).abi_encode_params(),
            )
            .respond(a.exec_address, IStargateStrategy::swapToLPCall { amountOutMin: U256::ZERO }, U256::from(20_000u64).abi_encode());
    }

    #[tokio::test]
    async fn test_swaps_then_harvests() {
        let t = test_context(42161, NOW);
        mock_strategy(&t, e18(11));

        let result = StargateV1Keeper::new(args()).evaluate(&t.ctx).await.unwrap();
        let calls = result.calls();
        assert_eq!(calls.len(), 2);

        let swap = IStargateStrategy::swapToLPCall::abi_decode(&calls[0].data).unwrap();
        assert_eq!(swap.amountOutMin, U256::from(19_900u64));

        let harvest = IStargateStrategy::safeHarvestCall::abi_decode(&calls[1].data).unwrap();
        assert_eq!(harvest.maxBalance, U256::from(1_000_000u64));
        assert_eq!(harvest.maxChangeAmount, U256::from(100_000u64));
        assert!(harvest.rebalance);
        assert!(!harvest.harvestRewards);
        assert_eq!(t.store.snapshot()[LAST_TIMESTAMP_KEY], NOW.to_string());
    }

    #[tokio::test]
    async fn test_low_stg_only_harvests() {
        let t = test_context(42161, NOW);
        mock_strategy(&t, e18(10));

        let result = StargateV1Keeper::new(args()).evaluate(&t.ctx).await.unwrap();
        assert_eq!(result.calls().len(), 1);
        assert!(IStargateStrategy::safeHarvestCall::abi_decode(&result.calls()[0].data).is_ok());
        assert_eq!(t.chain.call_count(), 2);
    }

    #[tokio::test]
    async fn test_interval_not_elapsed() {
        let t = test_context(42161, NOW);
        t.store.set(LAST_TIMESTAMP_KEY, (NOW - 60).to_string()).await.unwrap();

        let result = StargateV1Keeper::new(args()).evaluate(&t.ctx).await.unwrap();
        assert_eq!(result.message(), Some(TIME_NOT_ELAPSED));
        assert_eq!(t.chain.call_count(), 0);
    }

    #[test]
    fn test_executor_defaults_to_automation_proxy() {
        assert_eq!(args().executor(42161), registry::automation_proxy(42161));
        let explicit = StargateV1Args { gelato_proxy_address: Some(Address::repeat_byte(0x9f)), ..args() };
        assert_eq!(explicit.executor(42161), Address::repeat_byte(0x9f));
    }
}
