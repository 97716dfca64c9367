//! magicAPE harvester: `run()` whenever anything is claimable

use super::{require_address, Keeper};
use crate::chain::abi::IMagicApeHarvester;
use crate::context::KeeperContext;
use crate::error::KeeperError;
use crate::guards::{ReadinessGate, NOTHING_TO_HARVEST, TIME_NOT_ELAPSED};
use crate::result::{CallData, KeeperResult};
use alloy_primitives::Address;
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MagicApeArgs {
    pub exec_address: Address,
    pub interval_in_seconds: u64,
}

impl MagicApeArgs {
    pub fn validate(&self) -> Result<(), KeeperError> {
        require_address("execAddress", self.exec_address)
    }
}

pub struct MagicApeKeeper {
    args: MagicApeArgs,
    gate: ReadinessGate,
}

impl MagicApeKeeper {
    pub fn new(args: MagicApeArgs) -> Self {
        let gate = ReadinessGate::new(args.interval_in_seconds);
        Self { args, gate }
    }
}

#[async_trait]
impl Keeper for MagicApeKeeper {
    fn name(&self) -> &'static str {
        "magic-ape"
    }

    async fn evaluate(&self, ctx: &KeeperContext) -> Result<KeeperResult, KeeperError> {
        if !self.gate.check_store(ctx).await?.is_ready() {
            return Ok(KeeperResult::skip(TIME_NOT_ELAPSED));
        }

        let claimable = ctx.provider()?.read(self.args.exec_address, IMagicApeHarvester::claimableCall {}).await?;
        info!("claimable: {}", claimable);
        if claimable.is_zero() {
            return Ok(KeeperResult::skip(NOTHING_TO_HARVEST));
        }

        self.gate.commit(ctx).await?;
        Ok(KeeperResult::exec(vec![CallData::new(
            self.args.exec_address,
            IMagicApeHarvester::runCall {}.abi_encode(),
        )]))
    }
}
