//! Canned `SwapQuoter` for unit tests

use super::{QuoteRequest, SwapQuote, SwapQuoter};
use crate::context::KeeperContext;
use crate::error::KeeperError;
use alloy_primitives::{Address, Bytes, U256};
use async_trait::async_trait;
use std::sync::Mutex;

pub struct MockQuoter {
    answer: Result<SwapQuote, KeeperError>,
    requests: Mutex<Vec<QuoteRequest>>,
}

impl MockQuoter {
    /// Always quote `buy_amount` with the given calldata
    pub fn returning(buy_amount: u64, data: &[u8]) -> Self {
        Self::with_quote(SwapQuote {
            buy_amount: U256::from(buy_amount),
            to: Address::repeat_byte(0x0e),
            data: Bytes::copy_from_slice(data),
            value: U256::ZERO,
        })
    }

    pub fn with_quote(quote: SwapQuote) -> Self {
        Self { answer: Ok(quote), requests: Mutex::new(Vec::new()) }
    }

    /// Always fail, e.g. to simulate a timeout
    pub fn failing(error: KeeperError) -> Self {
        Self { answer: Err(error), requests: Mutex::new(Vec::new()) }
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<QuoteRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl SwapQuoter for MockQuoter {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn quote(&self, _ctx: &KeeperContext, request: &QuoteRequest) -> Result<SwapQuote, KeeperError> {
        self.requests.lock().unwrap().push(request.clone());
        self.answer.clone()
    }
}
