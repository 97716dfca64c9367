//! Invocation context handed to every keeper

use crate::chain::ChainReader;
use crate::error::KeeperError;
use crate::store::{KeyValueStore, SecretStore};
use std::collections::HashMap;
use std::sync::Arc;

/// Everything one evaluation may touch
#[derive(Clone)]
pub struct KeeperContext {
    /// Chain the task runs on
    pub chain_id: u64,
    /// Timestamp of the block the evaluation is pinned to
    pub block_timestamp: u64,
    /// Readers for every configured chain, including `chain_id`
    pub chains: HashMap<u64, Arc<dyn ChainReader>>,
    pub secrets: Arc<dyn SecretStore>,
    pub storage: Arc<dyn KeyValueStore>,
}

impl KeeperContext {
    pub fn new(
        chain_id: u64,
        block_timestamp: u64,
        secrets: Arc<dyn SecretStore>,
        storage: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self { chain_id, block_timestamp, chains: HashMap::new(), secrets, storage }
    }

    /// Register a reader for `chain_id`
    pub fn with_chain(mut self, chain_id: u64, reader: Arc<dyn ChainReader>) -> Self {
        self.chains.insert(chain_id, reader);
        self
    }

    /// Reader for the task's own chain
    pub fn provider(&self) -> Result<Arc<dyn ChainReader>, KeeperError> {
        self.chain(self.chain_id)
    }

    /// Reader for another chain; unconfigured chains fail loudly
    pub fn chain(&self, chain_id: u64) -> Result<Arc<dyn ChainReader>, KeeperError> {
        self.chains
            .get(&chain_id)
            .cloned()
            .ok_or(KeeperError::UnsupportedChain(chain_id))
    }

    /// Same context viewed from another chain, sharing readers and secrets
    pub fn on_chain(&self, chain_id: u64) -> Self {
        Self { chain_id, ..self.clone() }
    }

    /// Same context with a different store
    pub fn with_storage(&self, storage: Arc<dyn KeyValueStore>) -> Self {
        Self { storage, ..self.clone() }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::test_context;
    use super::*;

    #[test]
    fn test_unconfigured_chain_fails_loudly() {
        let t = test_context(1, 1_000);
        assert!(t.ctx.provider().is_ok());

        match t.ctx.chain(56) {
            Err(KeeperError::UnsupportedChain(56)) => {}
            _ => panic!("expected UnsupportedChain"),
        }

        let remote = t.ctx.on_chain(56);
        assert!(remote.provider().is_err());
        assert_eq!(remote.block_timestamp, 1_000);
    }
}
