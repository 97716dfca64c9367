//! In-memory `ChainReader` for unit tests

use super::{ChainReader, ReadCall};
use crate::error::KeeperError;
use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Answers `eth_call`s from canned ABI-encoded returns
///
/// Exact calldata matches win over selector-only matches. Anything not
/// registered fails like a reverted call; `fail` simulates the node being
/// unreachable instead.
#[derive(Default)]
pub struct MockChain {
    exact: Mutex<HashMap<(Address, Bytes), Bytes>>,
    by_selector: Mutex<HashMap<(Address, [u8; 4]), Bytes>>,
    reverts: Mutex<HashMap<(Address, [u8; 4]), String>>,
    failures: Mutex<HashMap<(Address, [u8; 4]), String>>,
    balances: Mutex<HashMap<Address, U256>>,
    gas_price: Mutex<U256>,
    timestamp: Mutex<u64>,
    calls: AtomicUsize,
}

impl MockChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer this exact call on `to`
    pub fn respond<C: SolCall>(&self, to: Address, call: C, ret: Vec<u8>) -> &Self {
        self.exact.lock().unwrap().insert((to, call.abi_encode().into()), ret.into());
        self
    }

    /// Answer any call to function `C` on `to`
    pub fn respond_any<C: SolCall>(&self, to: Address, ret: Vec<u8>) -> &Self {
        self.by_selector.lock().unwrap().insert((to, C::SELECTOR), ret.into());
        self
    }

    /// Make function `C` on `to` revert
    pub fn revert<C: SolCall>(&self, to: Address, reason: &str) -> &Self {
        self.reverts.lock().unwrap().insert((to, C::SELECTOR), reason.to_string());
        self
    }

    /// Make function `C` on `to` fail before reaching a node
    pub fn fail<C: SolCall>(&self, to: Address, reason: &str) -> &Self {
        self.failures.lock().unwrap().insert((to, C::SELECTOR), reason.to_string());
        self
    }

    pub fn set_balance(&self, account: Address, balance: U256) -> &Self {
        self.balances.lock().unwrap().insert(account, balance);
        self
    }

    pub fn set_gas_price(&self, price: U256) -> &Self {
        *self.gas_price.lock().unwrap() = price;
        self
    }

    pub fn set_timestamp(&self, timestamp: u64) -> &Self {
        *self.timestamp.lock().unwrap() = timestamp;
        self
    }

    /// Number of `eth_call`s served (including failed ones)
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainReader for MockChain {
    async fn call(&self, call: ReadCall) -> Result<Bytes, KeeperError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let selector: [u8; 4] = call
            .data
            .get(..4)
            .and_then(|s| s.try_into().ok())
            .ok_or_else(|| KeeperError::Rpc("calldata too short".to_string()))?;

        if let Some(reason) = self.failures.lock().unwrap().get(&(call.to, selector)) {
            return Err(KeeperError::Rpc(format!("error sending request: {}", reason)));
        }
        if let Some(reason) = self.reverts.lock().unwrap().get(&(call.to, selector)) {
            return Err(KeeperError::Revert(format!("execution reverted: {}", reason)));
        }
        if let Some(ret) = self.exact.lock().unwrap().get(&(call.to, call.data.clone())) {
            return Ok(ret.clone());
        }
        if let Some(ret) = self.by_selector.lock().unwrap().get(&(call.to, selector)) {
            return Ok(ret.clone());
        }
        Err(KeeperError::Revert("execution reverted".to_string()))
    }

    async fn balance(&self, account: Address) -> Result<U256, KeeperError> {
        Ok(self.balances.lock().unwrap().get(&account).copied().unwrap_or_default())
    }

    async fn gas_price(&self) -> Result<U256, KeeperError> {
        Ok(*self.gas_price.lock().unwrap())
    }

    async fn latest_timestamp(&self) -> Result<u64, KeeperError> {
        Ok(*self.timestamp.lock().unwrap())
    }
}
