//! Release expired locks on a locking multi-rewards staking contract
//!
//! Locks expired at the evaluation block come from the subgraph. The contract
//! takes one lock index per user, so only each user's oldest expired lock is
//! released per execution.

use super::{require_address, require_endpoint, Keeper};
use crate::chain::abi::ILockingMultiRewards;
use crate::context::KeeperContext;
use crate::error::KeeperError;
use crate::result::{CallData, KeeperResult};
use crate::subgraph::{UserLock, UserLockSource};
use alloy_primitives::{Address, U256};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

pub const NO_LOCKS: &str = "No locks to release";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessLocksArgs {
    pub exec_address: Address,
    pub subgraph_url: String,
    pub lock_limit_per_execution: u32,
}

impl ProcessLocksArgs {
    pub fn validate(&self) -> Result<(), KeeperError> {
        require_address("execAddress", self.exec_address)?;
        require_endpoint("subgraphUrl", &self.subgraph_url)?;
        if self.lock_limit_per_execution == 0 {
            return Err(KeeperError::Config("lockLimitPerExecution must be positive".to_string()));
        }
        Ok(())
    }
}

/// First lock index per user, users in first-seen order
pub fn first_lock_per_user(locks: &[UserLock]) -> (Vec<Address>, Vec<U256>) {
    let mut users: Vec<Address> = Vec::new();
    let mut indexes: Vec<U256> = Vec::new();
    for lock in locks {
        if !users.contains(&lock.user) {
            users.push(lock.user);
            indexes.push(lock.lock_index);
        }
    }
    (users, indexes)
}

pub struct ProcessLocksKeeper {
    args: ProcessLocksArgs,
    locks: Arc<dyn UserLockSource>,
}

impl ProcessLocksKeeper {
    pub fn new(args: ProcessLocksArgs, locks: Arc<dyn UserLockSource>) -> Self {
        Self { args, locks }
    }
}

#[async_trait]
impl Keeper for ProcessLocksKeeper {
    fn name(&self) -> &'static str {
        "process-locks"
    }

    async fn evaluate(&self, ctx: &KeeperContext) -> Result<KeeperResult, KeeperError> {
        let locks = self
            .locks
            .expired_locks(self.args.lock_limit_per_execution, ctx.block_timestamp)
            .await?;
        if locks.is_empty() {
            return Ok(KeeperResult::skip(NO_LOCKS));
        }

        let (users, lock_indexes) = first_lock_per_user(&locks);
        info!("releasing {} lock(s) for {} user(s)", locks.len(), users.len());

        let data = ILockingMultiRewards::processExpiredLocksCall { users, lockIndexes: lock_indexes }.abi_encode();
        Ok(KeeperResult::exec(vec![CallData::new(self.args.exec_address, data)]))
    }
}
