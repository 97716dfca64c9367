//! Reward distributors: `distribute(staking)` for every staking contract whose
//! distributor reports `ready`

use super::{require_address, Keeper};
use crate::chain::abi::IRewardDistributor;
use crate::context::KeeperContext;
use crate::error::KeeperError;
use crate::result::{CallData, KeeperResult};
use alloy_primitives::Address;
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use futures::future::try_join_all;
use serde::Deserialize;
use tracing::debug;

pub const NO_DISTRIBUTIONS: &str = "No distributions to execute";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardDistributorArgs {
    pub multi_reward_distributor_address: Address,
    #[serde(default)]
    pub multi_reward_staking_addresses: Vec<Address>,
    pub epoch_based_distributor_address: Address,
    #[serde(default)]
    pub epoch_based_staking_addresses: Vec<Address>,
}

impl RewardDistributorArgs {
    pub fn validate(&self) -> Result<(), KeeperError> {
        require_address("multiRewardDistributorAddress", self.multi_reward_distributor_address)?;
        require_address("epochBasedDistributorAddress", self.epoch_based_distributor_address)
    }

    /// `(distributor, staking)` in configuration order
    fn pairs(&self) -> Vec<(Address, Address)> {
        let multi = self
            .multi_reward_staking_addresses
            .iter()
            .map(|s| (self.multi_reward_distributor_address, *s));
        let epoch = self
            .epoch_based_staking_addresses
            .iter()
            .map(|s| (self.epoch_based_distributor_address, *s));
        multi.chain(epoch).collect()
    }
}

pub struct RewardDistributorKeeper {
    args: RewardDistributorArgs,
}

impl RewardDistributorKeeper {
    pub fn new(args: RewardDistributorArgs) -> Self {
        Self { args }
    }
}

#[async_trait]
impl Keeper for RewardDistributorKeeper {
    fn name(&self) -> &'static str {
        "reward-distributor"
    }

    async fn evaluate(&self, ctx: &KeeperContext) -> Result<KeeperResult, KeeperError> {
        let chain = ctx.provider()?;
        let pairs = self.args.pairs();

        let ready = try_join_all(
            pairs
                .iter()
                .map(|(distributor, staking)| chain.read(*distributor, IRewardDistributor::readyCall { staking: *staking })),
        )
        .await?;

        let calls: Vec<CallData> = pairs
            .into_iter()
            .zip(ready)
            .filter(|(_, ready)| *ready)
            .map(|((distributor, staking), _)| {
                debug!("{} ready on {}", staking, distributor);
                CallData::new(distributor, IRewardDistributor::distributeCall { staking }.abi_encode())
            })
            .collect();

        if calls.is_empty() {
            return Ok(KeeperResult::skip(NO_DISTRIBUTIONS));
        }
        Ok(KeeperResult::exec(calls))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::testing::test_context;
    use alloy_sol_types::SolValue;

    fn args() -> RewardDistributorArgs {
        RewardDistributorArgs {
            multi_reward_distributor_address: Address::repeat_byte(0xd1),
            multi_reward_staking_addresses: vec![Address::repeat_byte(0x01), Address::repeat_byte(0x02)],
            epoch_based_distributor_address: Address::repeat_byte(0xd2),
            epoch_based_staking_addresses: vec![Address::repeat_byte(0x03)],
        }
    }

    #[tokio::test]
    async fn test_only_ready_pairs_are_distributed() {
        let a = args();
        let t = test_context(42161, 1_000);
        t.chain
            .respond(a.multi_reward_distributor_address, IRewardDistributor::readyCall { staking: Address::repeat_byte(0x01) }, false.abi_encode())
            .respond(a.multi_reward_distributor_address, IRewardDistributor::readyCall { staking: Address::repeat_byte(0x02) }, true.abi_encode())
            .respond(a.epoch_based_distributor_address, IRewardDistributor::readyCall { staking: Address::repeat_byte(0x03) }, true.abi_encode());

        let result = RewardDistributorKeeper::new(a.clone()).evaluate(&t.ctx).await.unwrap();
        let calls = result.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].to, a.multi_reward_distributor_address);
        assert_eq!(
            IRewardDistributor::distributeCall::abi_decode(&calls[0].data).unwrap().staking,
            Address::repeat_byte(0x02)
        );
        assert_eq!(calls[1].to, a.epoch_based_distributor_address);
    }

    #[tokio::test]
    async fn test_nothing_ready() {
        let a = args();
        let t = test_context(42161, 1_000);
        t.chain
            .respond_any::<IRewardDistributor::readyCall>(a.multi_reward_distributor_address, false.abi_encode())
            .respond_any::<IRewardDistributor::readyCall>(a.epoch_based_distributor_address, false.abi_encode());

        let result = RewardDistributorKeeper::new(a).evaluate(&t.ctx).await.unwrap();
        assert_eq!(result.message(), Some(NO_DISTRIBUTIONS));
        assert_eq!(t.chain.call_count(), 3);
    }
}
