//! xF33d: push a Chainlink feed to another chain
//!
//! The xF33d oracle lives at the same address on every chain. The update is
//! paid with its quoted LayerZero fee.

use super::{require_address, Keeper};
use crate::chain::abi::IXF33dOracle;
use crate::context::KeeperContext;
use crate::error::KeeperError;
use crate::guards::{ReadinessGate, TIME_NOT_ELAPSED};
use crate::registry::XF33D_ORACLE;
use crate::result::{CallData, KeeperResult};
use alloy_primitives::Address;
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Xf33dArgs {
    pub interval_in_seconds: u64,
    /// LayerZero id of the chain receiving the feed
    pub destination_chain: u16,
    pub chainlink_oracle: Address,
}

impl Xf33dArgs {
    pub fn validate(&self) -> Result<(), KeeperError> {
        require_address("chainlinkOracle", self.chainlink_oracle)?;
        if self.destination_chain == 0 {
            return Err(KeeperError::Config("destinationChain must be a LayerZero chain id".to_string()));
        }
        Ok(())
    }
}

pub struct Xf33dKeeper {
    args: Xf33dArgs,
    gate: ReadinessGate,
}

impl Xf33dKeeper {
    pub fn new(args: Xf33dArgs) -> Self {
        let gate = ReadinessGate::new(args.interval_in_seconds);
        Self { args, gate }
    }
}

#[async_trait]
impl Keeper for Xf33dKeeper {
    fn name(&self) -> &'static str {
        "xf33d"
    }

    async fn evaluate(&self, ctx: &KeeperContext) -> Result<KeeperResult, KeeperError> {
        if !self.gate.check_store(ctx).await?.is_ready() {
            return Ok(KeeperResult::skip(TIME_NOT_ELAPSED));
        }

        let dst = self.args.destination_chain;
        let oracle = self.args.chainlink_oracle;
        let fees = ctx
            .provider()?
            .read(XF33D_ORACLE, IXF33dOracle::getFeesForFeedUpdateCall { dstChainId: dst, oracle })
            .await?;
        info!("feed update to lz chain {} costs {}", dst, fees);

        let data = IXF33dOracle::sendUpdatedRateCall { dstChainId: dst, oracle }.abi_encode();

        self.gate.commit(ctx).await?;
        Ok(KeeperResult::exec(vec![CallData::new(XF33D_ORACLE, data).with_value(fees)]))
    }
}
