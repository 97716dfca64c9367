//! Buy SPELL with the MIM held by the swapper
//!
//! - sells `min(balance, maximumInputAmount)` once the balance reaches `minimumInputAmount`
//! - 0x quote with a mandatory API key
//! - refuses quotes under `minimumOutputAmount`

use super::{de_ether, de_u256, require_address, require_endpoint, Keeper};
use crate::chain::abi::{IERC20, ISpellSwapper};
use crate::context::KeeperContext;
use crate::error::KeeperError;
use crate::guards::{check_bips, ReadinessGate, TIME_NOT_ELAPSED};
use crate::quotes::{http_client, zero_ex, QuoteRequest, SwapQuoter, ZeroExQuoter};
use crate::registry::{self, MAINNET};
use crate::result::{CallData, KeeperResult};
use alloy_primitives::{Address, U256};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub const NOT_ENOUGH_MIM: &str = "Not enough MIM";
pub const NOT_ENOUGH_SPELL: &str = "Not enough SPELL received";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpellSwapperArgs {
    pub exec_address: Address,
    pub zero_ex_api_base_url: String,
    /// In MIM, e.g. `"1000"`
    #[serde(deserialize_with = "de_ether")]
    pub minimum_input_amount: U256,
    #[serde(deserialize_with = "de_ether")]
    pub maximum_input_amount: U256,
    /// In SPELL wei
    #[serde(deserialize_with = "de_u256")]
    pub minimum_output_amount: U256,
    pub maximum_swap_slippage_bips: u64,
    pub sell_frequency_seconds: u64,
}

impl SpellSwapperArgs {
    pub fn validate(&self) -> Result<(), KeeperError> {
        require_address("execAddress", self.exec_address)?;
        require_endpoint("zeroExApiBaseUrl", &self.zero_ex_api_base_url)?;
        check_bips("maximumSwapSlippageBips", self.maximum_swap_slippage_bips)?;
        if self.minimum_input_amount > self.maximum_input_amount {
            return Err(KeeperError::Config(format!(
                "minimumInputAmount {} exceeds maximumInputAmount {}",
                self.minimum_input_amount, self.maximum_input_amount
            )));
        }
        Ok(())
    }
}

/// 0x quoter on the configured endpoint, refusing anonymous requests
pub fn build_quoter(args: &SpellSwapperArgs, timeout: Duration) -> Result<Arc<dyn SwapQuoter>, KeeperError> {
    let quoter = ZeroExQuoter::new(http_client(timeout)?, &args.zero_ex_api_base_url).require_api_key();
    Ok(Arc::new(quoter))
}

pub struct SpellSwapperKeeper {
    args: SpellSwapperArgs,
    quoter: Arc<dyn SwapQuoter>,
    gate: ReadinessGate,
}

impl SpellSwapperKeeper {
    pub fn new(args: SpellSwapperArgs, quoter: Arc<dyn SwapQuoter>) -> Self {
        let gate = ReadinessGate::new(args.sell_frequency_seconds);
        Self { args, quoter, gate }
    }
}

#[async_trait]
impl Keeper for SpellSwapperKeeper {
    fn name(&self) -> &'static str {
        "spell-swapper"
    }

    async fn evaluate(&self, ctx: &KeeperContext) -> Result<KeeperResult, KeeperError> {
        if !self.gate.check_store(ctx).await?.is_ready() {
            return Ok(KeeperResult::skip(TIME_NOT_ELAPSED));
        }
        ctx.secrets.require(zero_ex::API_KEY_SECRET)?;

        let mim = registry::mim(MAINNET)?;
        let spell = registry::spell(MAINNET).ok_or(KeeperError::UnsupportedChain(MAINNET))?;
        let swapper = self.args.exec_address;

        let balance = ctx
            .provider()?
            .read(mim, IERC20::balanceOfCall { account: swapper })
            .await?;
        if balance < self.args.minimum_input_amount {
            return Ok(KeeperResult::skip(NOT_ENOUGH_MIM));
        }
        let sell_amount = balance.min(self.args.maximum_input_amount);

        let quote = self
            .quoter
            .quote(
                ctx,
                &QuoteRequest {
                    chain_id: ctx.chain_id,
                    sell_token: mim,
                    buy_token: spell,
                    sell_amount,
                    slippage_bips: self.args.maximum_swap_slippage_bips,
                    taker: swapper,
                },
            )
            .await?;
        info!("Swap {} MIM to {} SPELL", sell_amount, quote.buy_amount);

        if quote.buy_amount < self.args.minimum_output_amount {
            return Ok(KeeperResult::skip(NOT_ENOUGH_SPELL));
        }

        let data = ISpellSwapper::swapMimForSpell1InchCall { swapper: quote.to, data: quote.data }.abi_encode();

        self.gate.commit(ctx).await?;
        Ok(KeeperResult::exec(vec![CallData::new(swapper, data)]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::testing::{test_context, test_context_with_secrets, TestContext};
    use crate::functions::run_keeper;
    use crate::quotes::mock::MockQuoter;
    use crate::store::{KeyValueStore, MemorySecrets, LAST_TIMESTAMP_KEY};
    use alloy_primitives::Bytes;
    use alloy_sol_types::SolValue;

    const NOW: u64 = 1_700_000_000;

    fn e18(n: u64) -> U256 {
        U256::from(n) * U256::from(10u64).pow(U256::from(18u64))
    }

    fn args() -> SpellSwapperArgs {
        SpellSwapperArgs {
            exec_address: Address::repeat_byte(0x5a),
            zero_ex_api_base_url: "https://api.0x.org".to_string(),
            minimum_input_amount: e18(1_000),
            maximum_input_amount: e18(50_000),
            minimum_output_amount: e18(100_000),
            maximum_swap_slippage_bips: 50,
            sell_frequency_seconds: 86_400,
        }
    }

    fn with_key() -> TestContext {
        test_context_with_secrets(1, NOW, MemorySecrets::new().with("ZEROX_API_KEY", "key"))
    }

    fn mock_balance(t: &TestContext, balance: U256) {
        let mim = registry::mim(MAINNET).unwrap();
        t.chain.respond(mim, IERC20::balanceOfCall { account: args().exec_address }, balance.abi_encode());
    }

    #[tokio::test]
    async fn test_sells_at_most_the_maximum() {
        let t = with_key();
        mock_balance(&t, e18(80_000));
        let quoter = Arc::new(MockQuoter::with_quote(crate::quotes::SwapQuote {
            buy_amount: e18(2_000_000),
            to: Address::repeat_byte(0x0e),
            data: Bytes::from(vec![0x12, 0x34]),
            value: U256::ZERO,
        }));

        let result = SpellSwapperKeeper::new(args(), quoter.clone()).evaluate(&t.ctx).await.unwrap();
        assert_eq!(quoter.requests()[0].sell_amount, e18(50_000));
        assert_eq!(quoter.requests()[0].buy_token, registry::spell(MAINNET).unwrap());

        let call = ISpellSwapper::swapMimForSpell1InchCall::abi_decode(&result.calls()[0].data).unwrap();
        assert_eq!(call.swapper, Address::repeat_byte(0x0e));
        assert_eq!(call.data, Bytes::from(vec![0x12, 0x34]));
        assert_eq!(result.calls()[0].to, args().exec_address);
        assert_eq!(t.store.snapshot()[LAST_TIMESTAMP_KEY], NOW.to_string());
    }

    #[tokio::test]
    async fn test_missing_api_key_is_named() {
        let t = test_context(1, NOW);
        let quoter = Arc::new(MockQuoter::returning(1, b""));

        let result = run_keeper(&SpellSwapperKeeper::new(args(), quoter.clone()), &t.ctx).await;
        assert_eq!(result.message(), Some("ZEROX_API_KEY not set in secrets"));
        assert_eq!(t.chain.call_count(), 0);
        assert_eq!(quoter.call_count(), 0);
    }

    #[tokio::test]
    async fn test_small_balance_is_not_sold() {
        let t = with_key();
        mock_balance(&t, e18(999));
        let quoter = Arc::new(MockQuoter::returning(1, b""));

        let result = SpellSwapperKeeper::new(args(), quoter.clone()).evaluate(&t.ctx).await.unwrap();
        assert_eq!(result.message(), Some(NOT_ENOUGH_MIM));
        assert_eq!(quoter.call_count(), 0);
    }

    #[tokio::test]
    async fn test_poor_quote_is_refused() {
        let t = with_key();
        mock_balance(&t, e18(5_000));
        let quoter = Arc::new(MockQuoter::returning(1_000, b""));

        let result = SpellSwapperKeeper::new(args(), quoter.clone()).evaluate(&t.ctx).await.unwrap();
        assert_eq!(result.message(), Some(NOT_ENOUGH_SPELL));
        assert_eq!(quoter.requests()[0].sell_amount, e18(5_000));
        assert!(t.store.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_sell_frequency() {
        let t = with_key();
        t.store.set(LAST_TIMESTAMP_KEY, (NOW - 3_600).to_string()).await.unwrap();

        let result = SpellSwapperKeeper::new(args(), Arc::new(MockQuoter::returning(1, b"")))
            .evaluate(&t.ctx)
            .await
            .unwrap();
        assert_eq!(result.message(), Some(TIME_NOT_ELAPSED));
        assert_eq!(t.chain.call_count(), 0);
    }

    #[test]
    fn test_amounts_parse_from_ether_strings() {
        let parsed: SpellSwapperArgs = serde_json::from_value(serde_json::json!({
            "execAddress": "0x000000000000000000000000000000000000005a",
            "zeroExApiBaseUrl": "https://api.0x.org",
            "minimumInputAmount": "1000",
            "maximumInputAmount": "50000.5",
            "minimumOutputAmount": "100000000000000000000000",
            "maximumSwapSlippageBips": 50,
            "sellFrequencySeconds": 86400
        }))
        .unwrap();
        assert_eq!(parsed.minimum_input_amount, e18(1_000));
        assert_eq!(parsed.maximum_input_amount, e18(50_000) + e18(1) / U256::from(2u64));
        assert_eq!(parsed.minimum_output_amount, e18(100_000));
        assert!(parsed.validate().is_ok());
    }
}
