//! LayerZero multicall relay
//!
//! Calls meant for another chain are packed into one
//! `send(dstChainId, calls)` on the multicall sender/receiver of the source
//! chain, paying the messaging fee quoted by the source chain's endpoint.

use crate::chain::abi::{ILzEndpoint, ILzMulticallSenderReceiver};
use crate::chain::ChainReader;
use crate::context::KeeperContext;
use crate::error::KeeperError;
use crate::functions::Keeper;
use crate::registry::{self, LZ_MULTICALL_SENDER_RECEIVER};
use crate::result::{CallData, KeeperResult};
use crate::store::KeyValueStore;
use alloy_primitives::{Bytes, U256};
use alloy_sol_types::{SolCall, SolValue};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::info;

/// Inner calls in the multicall's wire order
fn to_multicall(calls: &[CallData]) -> Vec<ILzMulticallSenderReceiver::Call> {
    calls
        .iter()
        .map(|c| ILzMulticallSenderReceiver::Call { to: c.to, value: c.value_or_zero(), data: c.data.clone() })
        .collect()
}

/// `abi.encode(Call[])`, the payload the endpoint prices
pub fn encode_payload(calls: &[CallData]) -> Bytes {
    to_multicall(calls).abi_encode().into()
}

/// Native fee for delivering `calls` to `dst_lz_chain_id`
pub async fn relay_fee(
    source: &Arc<dyn ChainReader>,
    dst_lz_chain_id: u16,
    calls: &[CallData],
) -> Result<U256, KeeperError> {
    let endpoint = source
        .read(LZ_MULTICALL_SENDER_RECEIVER, ILzMulticallSenderReceiver::lzEndpointCall {})
        .await?;

    let fees = source
        .read(
            endpoint,
            ILzEndpoint::estimateFeesCall {
                dstChainId: dst_lz_chain_id,
                userApplication: LZ_MULTICALL_SENDER_RECEIVER,
                payload: encode_payload(calls),
                payInZRO: false,
                adapterParams: Bytes::new(),
            },
        )
        .await?;
    Ok(fees.nativeFee)
}

/// Wrap `calls` for `destination`, reading fees on `source`
pub async fn wrap(
    source: &Arc<dyn ChainReader>,
    destination: u64,
    calls: &[CallData],
) -> Result<CallData, KeeperError> {
    let dst = registry::lz_chain_id(destination)?;
    let fee = relay_fee(source, dst, calls).await?;
    info!("Relaying {} call(s) to chain {} (lz {}), fee {}", calls.len(), destination, dst, fee);

    let data = ILzMulticallSenderReceiver::sendCall { dstChainId: dst, calls: to_multicall(calls) }.abi_encode();
    Ok(CallData::new(LZ_MULTICALL_SENDER_RECEIVER, data).with_value(fee))
}

// ============================================
// STAGED STORE
// ============================================

/// Buffers writes until `flush`, so a failed wrap leaves the store untouched
pub struct StagedStore {
    inner: Arc<dyn KeyValueStore>,
    pending: RwLock<HashMap<String, String>>,
}

impl StagedStore {
    pub fn new(inner: Arc<dyn KeyValueStore>) -> Self {
        Self { inner, pending: RwLock::new(HashMap::new()) }
    }

    pub async fn flush(&self) -> Result<(), KeeperError> {
        let pending: Vec<(String, String)> = {
            let mut pending = self.pending.write().map_err(KeeperError::storage)?;
            pending.drain().collect()
        };
        for (key, value) in pending {
            self.inner.set(&key, value).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for StagedStore {
    async fn get(&self, key: &str) -> Result<Option<String>, KeeperError> {
        let staged = self.pending.read().map_err(KeeperError::storage)?.get(key).cloned();
        match staged {
            Some(value) => Ok(Some(value)),
            None => self.inner.get(key).await,
        }
    }

    async fn set(&self, key: &str, value: String) -> Result<(), KeeperError> {
        self.pending.write().map_err(KeeperError::storage)?.insert(key.to_string(), value);
        Ok(())
    }
}

// ============================================
// RELAYED FUNCTION
// ============================================

/// Evaluates `inner` against `destination` and relays its calls there
pub struct Relayed {
    inner: Box<dyn Keeper>,
    destination: u64,
}

impl Relayed {
    pub fn new(inner: Box<dyn Keeper>, destination: u64) -> Self {
        Self { inner, destination }
    }
}

#[async_trait]
impl Keeper for Relayed {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn evaluate(&self, ctx: &KeeperContext) -> Result<KeeperResult, KeeperError> {
        let staged = Arc::new(StagedStore::new(ctx.storage.clone()));
        let remote = ctx.on_chain(self.destination).with_storage(staged.clone());

        let calls = match self.inner.evaluate(&remote).await? {
            KeeperResult::Exec { calls } => calls,
            skip => return Ok(skip),
        };

        let source = ctx.provider()?;
        let relayed = wrap(&source, self.destination, &calls).await?;
        staged.flush().await?;

        Ok(KeeperResult::exec(vec![relayed]))
    }
}
