//! Read-only chain access
//!
//! Keepers never sign or send. They issue `eth_call`s, read native balances,
//! the gas price and the latest block timestamp. `ChainReader` is the seam
//! between keeper logic and the RPC provider so tests can answer calls from
//! canned ABI returns.

pub mod abi;

#[cfg(test)]
pub mod mock;

use crate::error::KeeperError;
use alloy_eips::BlockNumberOrTag;
use alloy_primitives::{Address, Bytes, U256};
use alloy_provider::{DynProvider, Provider, ProviderBuilder};
use alloy_rpc_types::TransactionRequest;
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use tracing::trace;

/// One `eth_call` against the latest block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadCall {
    pub to: Address,
    pub data: Bytes,
    /// Caller override, used for static simulation of permissioned calls
    pub from: Option<Address>,
}

#[async_trait]
pub trait ChainReader: Send + Sync {
    async fn call(&self, call: ReadCall) -> Result<Bytes, KeeperError>;
    async fn balance(&self, account: Address) -> Result<U256, KeeperError>;
    async fn gas_price(&self) -> Result<U256, KeeperError>;
    async fn latest_timestamp(&self) -> Result<u64, KeeperError>;
}

impl dyn ChainReader {
    /// Typed `eth_call`: encode `call`, send it to `to`, decode the return
    pub async fn read<C>(&self, to: Address, call: C) -> Result<C::Return, KeeperError>
    where
        C: SolCall + Send,
        C::Return: Send,
    {
        self.read_from(to, call, None).await
    }

    /// Typed `eth_call` with an explicit sender
    pub async fn read_from<C>(
        &self,
        to: Address,
        call: C,
        from: Option<Address>,
    ) -> Result<C::Return, KeeperError>
    where
        C: SolCall + Send,
        C::Return: Send,
    {
        let data = self
            .call(ReadCall { to, data: call.abi_encode().into(), from })
            .await
            .map_err(|e| match e {
                KeeperError::Rpc(msg) => KeeperError::Rpc(format!("{} on {}: {}", C::SIGNATURE, to, msg)),
                KeeperError::Revert(msg) => KeeperError::Revert(format!("{} on {}: {}", C::SIGNATURE, to, msg)),
                other => other,
            })?;

        C::abi_decode_returns(&data)
            .map_err(|e| KeeperError::Abi(format!("{} on {}: {}", C::SIGNATURE, to, e)))
    }
}

// ============================================
// RPC IMPLEMENTATION
// ============================================

/// JSON-RPC code geth and most nodes use for a reverted `eth_call`
const EXECUTION_REVERTED_CODE: i64 = 3;

/// `ChainReader` over an alloy HTTP provider
pub struct RpcChainReader {
    provider: DynProvider,
}

impl RpcChainReader {
    pub fn connect(rpc_url: &str) -> Result<Self, KeeperError> {
        let url = rpc_url
            .parse()
            .map_err(|e| KeeperError::config(format!("invalid rpc url {}: {}", rpc_url, e)))?;
        let provider = ProviderBuilder::new().connect_http(url).erased();
        Ok(Self { provider })
    }
}

#[async_trait]
impl ChainReader for RpcChainReader {
    async fn call(&self, call: ReadCall) -> Result<Bytes, KeeperError> {
        trace!("eth_call {} {}", call.to, call.data);

        let mut tx = TransactionRequest::default().to(call.to).input(call.data.into());
        if let Some(from) = call.from {
            tx = tx.from(from);
        }

        // Only an error response from the node is a revert; transport failures stay `Rpc`
        self.provider.call(tx).await.map_err(|e| match e.as_error_resp() {
            Some(payload) if payload.code == EXECUTION_REVERTED_CODE || payload.message.contains("revert") => {
                KeeperError::revert(&payload.message)
            }
            _ => KeeperError::rpc(e),
        })
    }

    async fn balance(&self, account: Address) -> Result<U256, KeeperError> {
        self.provider.get_balance(account).await.map_err(KeeperError::rpc)
    }

    async fn gas_price(&self) -> Result<U256, KeeperError> {
        let price = self.provider.get_gas_price().await.map_err(KeeperError::rpc)?;
        Ok(U256::from(price))
    }

    async fn latest_timestamp(&self) -> Result<u64, KeeperError> {
        let block = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Latest)
            .await
            .map_err(KeeperError::rpc)?
            .ok_or_else(|| KeeperError::Rpc("latest block not found".to_string()))?;
        Ok(block.header.timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::abi::{IERC20, ICauldron};
    use super::mock::MockChain;
    use super::*;
    use alloy_primitives::address;
    use alloy_sol_types::SolValue;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_read_decodes_single_and_tuple_returns() {
        let token = address!("99D8a9C45b2ecA8864373A26D1459e3Dff1e17F3");
        let holder = address!("2C9f65BD1a501CB406584F5532cE57c28829B131");
        let cauldron = address!("207763511da879a900973A5E092382117C3c1588");

        let mock = MockChain::new();
        mock.respond(token, IERC20::balanceOfCall { account: holder }, U256::from(42u64).abi_encode());
        mock.respond(
            cauldron,
            ICauldron::totalBorrowCall {},
            (7u128, 5u128).abi_encode_params(),
        );
        let reader: Arc<dyn ChainReader> = Arc::new(mock);

        let balance = reader.read(token, IERC20::balanceOfCall { account: holder }).await.unwrap();
        assert_eq!(balance, U256::from(42u64));

        let borrow = reader.read(cauldron, ICauldron::totalBorrowCall {}).await.unwrap();
        assert_eq!(borrow.elastic, 7);
        assert_eq!(borrow.base, 5);
    }

    #[tokio::test]
    async fn test_read_reports_signature_on_failure() {
        let reader: Arc<dyn ChainReader> = Arc::new(MockChain::new());
        let err = reader
            .read(Address::ZERO, IERC20::totalSupplyCall {})
            .await
            .unwrap_err();
        assert!(err.to_string().contains("totalSupply()"));
        assert!(err.is_revert());
    }

    #[tokio::test]
    async fn test_transport_failure_is_not_a_revert() {
        let mock = MockChain::new();
        mock.fail::<IERC20::totalSupplyCall>(Address::ZERO, "operation timed out");
        let reader: Arc<dyn ChainReader> = Arc::new(mock);

        let err = reader.read(Address::ZERO, IERC20::totalSupplyCall {}).await.unwrap_err();
        assert!(!err.is_revert());
        assert!(err.to_string().contains("operation timed out"));
    }
}
