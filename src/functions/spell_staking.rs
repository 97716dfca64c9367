//! Cauldron fee distribution to SPELL stakers
//!
//! Mainnet withdraws its fees and distributes every MIM collected so far:
//! a treasury cut, then the rest pro-rata to sSPELL and to mSPELL staking on
//! every chain holding SPELL (bridged through LayerZero). Altchains bridge
//! their fees to mainnet once above a minimum.

use super::{de_u256, Keeper};
use crate::chain::abi::{ICauldronFeeWithdrawer, IERC20, ISpellStakingRewardDistributor};
use crate::context::KeeperContext;
use crate::error::KeeperError;
use crate::guards::{ReadinessGate, TIME_NOT_ELAPSED};
use crate::registry::{self, spell_staking as addresses, MAINNET};
use crate::result::{CallData, KeeperResult};
use alloy_primitives::aliases::U80;
use alloy_primitives::{Address, U256};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use futures::future::try_join_all;
use serde::Deserialize;
use tracing::info;

/// Store key of the last run
pub const LAST_RUN_KEY: &str = "lastRun";

pub const NOTHING_TO_DO: &str = "Nothing to do";

/// `treasuryPercentage` is in whole percents
const TREASURY_FEE_PRECISION: u64 = 100;

type Distribution = ISpellStakingRewardDistributor::Distribution;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpellStakingArgs {
    #[serde(deserialize_with = "de_u256")]
    pub distribution_min_mim_amount: U256,
    pub treasury_percentage: u64,
    #[serde(deserialize_with = "de_u256")]
    pub bridging_min_mim_amount: U256,
    pub interval_in_seconds: u64,
}

impl SpellStakingArgs {
    pub fn validate(&self) -> Result<(), KeeperError> {
        if self.treasury_percentage > TREASURY_FEE_PRECISION {
            return Err(KeeperError::Config(format!(
                "treasuryPercentage must be within 0..=100, got {}",
                self.treasury_percentage
            )));
        }
        Ok(())
    }
}

/// SPELL staked on one chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Staked {
    chain_id: u64,
    mspell: U256,
    /// sSPELL, mainnet only
    sspell: U256,
}

fn to_u128(name: &str, value: U256) -> Result<u128, KeeperError> {
    u128::try_from(value).map_err(|_| KeeperError::Rpc(format!("{} {} does not fit uint128", name, value)))
}

fn local(recipient: Address, amount: U256) -> Result<Distribution, KeeperError> {
    Ok(Distribution { recipient, gas: U80::ZERO, lzChainId: 0, fee: 0, amount: to_u128("amount", amount)? })
}

pub struct SpellStakingKeeper {
    args: SpellStakingArgs,
    gate: ReadinessGate,
}

impl SpellStakingKeeper {
    pub fn new(args: SpellStakingArgs) -> Self {
        let gate = ReadinessGate::with_key(LAST_RUN_KEY, args.interval_in_seconds);
        Self { args, gate }
    }

    /// MIM the withdrawer would pull plus what it (and on mainnet the
    /// distributor) already holds
    async fn distributable(&self, ctx: &KeeperContext) -> Result<U256, KeeperError> {
        let chain = ctx.provider()?;
        let withdrawer = registry::fee_withdrawer(ctx.chain_id)?;
        let mim = registry::mim(ctx.chain_id)?;

        let (to_withdraw, held) = futures::try_join!(
            chain.read(withdrawer, ICauldronFeeWithdrawer::withdrawCall {}),
            chain.read(mim, IERC20::balanceOfCall { account: withdrawer }),
        )?;
        info!("Amount to withdraw: {} MIM", to_withdraw);

        let mut amount = to_withdraw + held;
        if ctx.chain_id == MAINNET {
            amount += chain.read(mim, IERC20::balanceOfCall { account: addresses::DISTRIBUTOR }).await?;
        }
        info!("Amount to distribute: {} MIM", amount);
        Ok(amount)
    }

    /// Staked SPELL on mainnet and every altchain with SPELL, mainnet first
    async fn staked(&self, ctx: &KeeperContext) -> Result<Vec<Staked>, KeeperError> {
        let chains = std::iter::once(MAINNET)
            .chain(addresses::ALTCHAINS)
            .filter_map(|chain_id| registry::spell(chain_id).map(|spell| (chain_id, spell)));

        try_join_all(chains.map(|(chain_id, spell)| async move {
            let reader = ctx.chain(chain_id)?;
            let mspell = reader
                .read(spell, IERC20::balanceOfCall { account: registry::mspell_staking(chain_id)? })
                .await?;
            let sspell = if chain_id == MAINNET {
                reader.read(spell, IERC20::balanceOfCall { account: addresses::SSPELL }).await?
            } else {
                U256::ZERO
            };
            Ok::<_, KeeperError>(Staked { chain_id, mspell, sspell })
        }))
        .await
    }

    async fn mainnet_calls(&self, ctx: &KeeperContext, amount: U256) -> Result<Vec<CallData>, KeeperError> {
        if amount < self.args.distribution_min_mim_amount {
            info!(
                "Not enough MIM in distributor. Minimum amount: {}. Current amount: {}",
                self.args.distribution_min_mim_amount, amount
            );
            return Ok(vec![]);
        }

        let staked = self.staked(ctx).await?;
        let total = staked.iter().fold(U256::ZERO, |acc, s| acc + s.mspell + s.sspell);
        if total.is_zero() {
            return Err(KeeperError::Rpc("no SPELL staked on any chain".to_string()));
        }

        let treasury = amount * U256::from(self.args.treasury_percentage) / U256::from(TREASURY_FEE_PRECISION);
        let remaining = amount - treasury;
        let share = |staked: U256| remaining * staked / total;

        let mut distributions = vec![local(addresses::TREASURY, treasury)?];
        let chain = ctx.provider()?;
        for s in &staked {
            if s.chain_id == MAINNET {
                distributions.push(local(addresses::SSPELL_BUYBACK, share(s.sspell))?);
                distributions.push(local(registry::mspell_staking(MAINNET)?, share(s.mspell))?);
                continue;
            }

            let amount = share(s.mspell);
            let lz_chain_id = registry::lz_chain_id(s.chain_id)?;
            let recipient = registry::mspell_staking(s.chain_id)?;
            let estimate = chain
                .read(
                    addresses::DISTRIBUTOR,
                    ISpellStakingRewardDistributor::estimateBridgingFeeCall { amount, lzDstChainId: lz_chain_id, recipient },
                )
                .await?;
            info!("chain {}: {} MIM, bridging fee {}", s.chain_id, amount, estimate.fee);

            distributions.push(Distribution {
                recipient,
                gas: U80::try_from(to_u128("gas", estimate.gas)?)
                    .map_err(|_| KeeperError::Rpc(format!("gas {} does not fit uint80", estimate.gas)))?,
                lzChainId: lz_chain_id,
                fee: to_u128("fee", estimate.fee)?,
                amount: to_u128("amount", amount)?,
            });
        }

        Ok(vec![
            CallData::new(registry::fee_withdrawer(MAINNET)?, ICauldronFeeWithdrawer::withdrawCall {}.abi_encode()),
            CallData::new(
                addresses::DISTRIBUTOR,
                ISpellStakingRewardDistributor::distributeCall { distributions }.abi_encode(),
            ),
        ])
    }

    async fn altchain_calls(&self, ctx: &KeeperContext, amount: U256) -> Result<Vec<CallData>, KeeperError> {
        if amount < self.args.bridging_min_mim_amount {
            info!(
                "Not enough MIM in distributor. Minimum amount: {}. Current amount after withdraw: {}",
                self.args.bridging_min_mim_amount, amount
            );
            return Ok(vec![]);
        }

        let withdrawer = registry::fee_withdrawer(ctx.chain_id)?;
        let estimate = ctx
            .provider()?
            .read(withdrawer, ICauldronFeeWithdrawer::estimateBridgingFeeCall { amount })
            .await?;
        info!("bridging {} MIM, fee {}, gas {}", amount, estimate.fee, estimate.gas);

        Ok(vec![
            CallData::new(withdrawer, ICauldronFeeWithdrawer::withdrawCall {}.abi_encode()),
            CallData::new(
                withdrawer,
                ICauldronFeeWithdrawer::bridgeCall { amount, fee: estimate.fee, gas: estimate.gas }.abi_encode(),
            ),
        ])
    }
}

#[async_trait]
impl Keeper for SpellStakingKeeper {
    fn name(&self) -> &'static str {
        "spell-staking"
    }

    async fn evaluate(&self, ctx: &KeeperContext) -> Result<KeeperResult, KeeperError> {
        if !self.gate.check_store(ctx).await?.is_ready() {
            return Ok(KeeperResult::skip(TIME_NOT_ELAPSED));
        }

        let amount = self.distributable(ctx).await?;
        let calls = if ctx.chain_id == MAINNET {
            self.mainnet_calls(ctx, amount).await?
        } else {
            self.altchain_calls(ctx, amount).await?
        };

        if calls.is_empty() {
            return Ok(KeeperResult::skip(NOTHING_TO_DO));
        }

        self.gate.commit(ctx).await?;
        Ok(KeeperResult::exec(calls))
    }
}
