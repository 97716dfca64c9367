//! Negative interest strategies
//!
//! One `run(strategy, maxIncrease, maxChange, calls)` per interval, where
//! `calls` is built from:
//!
//! - an optional interest adjustment (`CRV_AIP_13_6`)
//! - fee withdrawal, swapped through Odos when an endpoint is configured
//!   and fees are pending, or a plain `withdrawFees()` otherwise

use super::{require_address, Keeper};
use crate::chain::abi::{IAggregator, IBentoBox, ICauldron, IInterestLens, IInterestStrategy, IStrategyExecutor};
use crate::chain::ChainReader;
use crate::context::KeeperContext;
use crate::error::KeeperError;
use crate::guards::{check_bips, positive_price, ReadinessGate, CHAINLINK_PRICE_SCALE, TIME_NOT_ELAPSED};
use crate::quotes::{send_json, QuoteRequest, SwapQuoter};
use crate::registry::{CRV, CRV_USD_ORACLE, INTEREST_LENS};
use crate::result::{CallData, KeeperResult};
use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use futures::future::try_join_all;
use reqwest::Client;
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

pub const CURVE_POOLS_URL: &str = "https://api.curve.fi/api/getPools/ethereum/factory-tricrypto";

/// TriCRV pool, the reference liquidity for CRV
const TRICRV_POOL_ID: &str = "factory-tricrypto-4";

const CURVE_SOURCE: &str = "curve";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum InterestAdjuster {
    /// Abracadabra AIP 13.6 CRV schedule
    #[serde(rename = "CRV_AIP_13_6")]
    CrvAip13_6,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NegativeInterestsArgs {
    pub exec_address: Address,
    pub strategy_address: Address,
    pub interval_in_seconds: u64,
    /// Empty disables swapping, fees are withdrawn as is
    #[serde(default)]
    pub odos_api_endpoint: String,
    pub reward_swapping_slippage_in_bips: u64,
    pub max_bento_box_amount_increase_in_bips: u64,
    pub max_bento_box_change_amount_in_bips: u64,
    #[serde(default)]
    pub interest_adjuster_type: Option<InterestAdjuster>,
    /// Comma separated CRV cauldrons
    #[serde(default)]
    pub interest_adjuster_parameters: String,
    pub swap_to_address: Address,
}

impl NegativeInterestsArgs {
    pub fn validate(&self) -> Result<(), KeeperError> {
        require_address("execAddress", self.exec_address)?;
        require_address("strategyAddress", self.strategy_address)?;
        check_bips("rewardSwappingSlippageInBips", self.reward_swapping_slippage_in_bips)?;
        check_bips("maxBentoBoxAmountIncreaseInBips", self.max_bento_box_amount_increase_in_bips)?;
        check_bips("maxBentoBoxChangeAmountInBips", self.max_bento_box_change_amount_in_bips)?;
        if self.fee_swap_endpoint().is_some() {
            require_address("swapToAddress", self.swap_to_address)?;
        }
        if self.interest_adjuster_type.is_some() {
            self.cauldrons()?;
        }
        Ok(())
    }

    /// Odos endpoint, when fees should be swapped
    pub fn fee_swap_endpoint(&self) -> Option<&str> {
        let endpoint = self.odos_api_endpoint.trim();
        (!endpoint.is_empty()).then_some(endpoint)
    }

    /// The two CRV cauldrons named in `interestAdjusterParameters`
    pub fn cauldrons(&self) -> Result<Vec<Address>, KeeperError> {
        let cauldrons = self
            .interest_adjuster_parameters
            .split(',')
            .map(|s| Address::from_str(s.trim()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| KeeperError::Config(format!("interestAdjusterParameters: {}", e)))?;
        if cauldrons.len() != 2 {
            return Err(KeeperError::Config(format!(
                "interestAdjusterParameters must list 2 cauldrons, got {}",
                cauldrons.len()
            )));
        }
        Ok(cauldrons)
    }
}

// ============================================
// CURVE POOL LIQUIDITY
// ============================================

#[async_trait]
pub trait PoolLiquiditySource: Send + Sync {
    /// USD liquidity of the TriCRV pool
    async fn tricrv_liquidity_usd(&self) -> Result<f64, KeeperError>;
}

#[derive(Debug, Deserialize)]
struct CurvePoolsResponse {
    #[serde(default)]
    success: bool,
    data: Option<CurvePoolsData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CurvePoolsData {
    #[serde(default)]
    pool_data: Vec<CurvePool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CurvePool {
    id: String,
    usd_total: Option<f64>,
}

pub struct CurveApi {
    client: Client,
    url: String,
}

impl CurveApi {
    pub fn new(client: Client, url: &str) -> Self {
        Self { client, url: url.to_string() }
    }

    fn liquidity(response: CurvePoolsResponse) -> Result<f64, KeeperError> {
        if !response.success {
            return Err(KeeperError::http(CURVE_SOURCE, "fail to query curve api"));
        }
        let pool = response
            .data
            .map(|d| d.pool_data)
            .unwrap_or_default()
            .into_iter()
            .find(|p| p.id == TRICRV_POOL_ID)
            .ok_or_else(|| KeeperError::missing(CURVE_SOURCE, "poolData.factory-tricrypto-4"))?;
        pool.usd_total.ok_or_else(|| KeeperError::missing(CURVE_SOURCE, "usdTotal"))
    }
}

#[async_trait]
impl PoolLiquiditySource for CurveApi {
    async fn tricrv_liquidity_usd(&self) -> Result<f64, KeeperError> {
        let response: CurvePoolsResponse = send_json(CURVE_SOURCE, self.client.get(&self.url)).await?;
        Self::liquidity(response)
    }
}

// ============================================
// AIP 13.6 SCHEDULE
// ============================================

fn usd(amount: u64) -> U256 {
    U256::from(amount) * U256::from(10u64).pow(U256::from(18u64))
}

/// Yearly interest in bips from the CRV cauldrons' state
///
/// - base from the borrowed principal (MIM, 18 decimals)
/// - adjusted by the principal / collateral ratio
/// - lowered as TriCRV liquidity deepens
///
/// Never negative.
pub fn aip_13_6_rate(principal: U256, collateral_usd: U256, liquidity_usd: f64) -> Result<u64, KeeperError> {
    if collateral_usd.is_zero() {
        return Err(KeeperError::Rpc("CRV cauldrons hold no collateral".to_string()));
    }

    let mut rate: i64 = if principal > usd(10_000_000) {
        15_000
    } else if principal > usd(5_000_000) {
        8_000
    } else {
        3_000
    };
    debug!("base interest rate: {}", rate);

    // percent, 18 decimals
    let ratio = principal * U256::from(100u64) * usd(1) / collateral_usd;
    if ratio < usd(40) {
        rate -= 2_000;
    } else if ratio < usd(50) {
        // unchanged
    } else if ratio < usd(60) {
        rate += 1_500;
    } else {
        rate += 2_500;
    }
    debug!("interest rate after collateral ratio: {}", rate);

    if liquidity_usd > 30_000_000.0 {
        rate -= 2_000;
    } else if liquidity_usd > 20_000_000.0 {
        rate -= 1_500;
    } else if liquidity_usd > 10_000_000.0 {
        rate -= 1_000;
    } else if liquidity_usd > 5_000_000.0 {
        rate -= 500;
    }

    Ok(rate.max(0) as u64)
}

/// A strategy holding `target_percentage`% of the asset earns on that share only
pub fn scale_to_allocation(rate: u64, target_percentage: u64) -> u64 {
    if target_percentage == 0 {
        return rate;
    }
    rate * 100 / target_percentage
}

// ============================================
// FUNCTION
// ============================================

pub struct NegativeInterestsKeeper {
    args: NegativeInterestsArgs,
    quoter: Option<Arc<dyn SwapQuoter>>,
    liquidity: Arc<dyn PoolLiquiditySource>,
    gate: ReadinessGate,
}

impl NegativeInterestsKeeper {
    pub fn new(
        args: NegativeInterestsArgs,
        quoter: Option<Arc<dyn SwapQuoter>>,
        liquidity: Arc<dyn PoolLiquiditySource>,
    ) -> Self {
        let gate = ReadinessGate::new(args.interval_in_seconds);
        Self { args, quoter, liquidity, gate }
    }

    /// `setInterest` when the AIP 13.6 rate differs from the current one
    async fn adjust_interest(
        &self,
        chain: &Arc<dyn ChainReader>,
        bento_box: Address,
    ) -> Result<Option<Bytes>, KeeperError> {
        info!("Using AIP_13_6 interest adjusting...");
        let cauldrons = self.args.cauldrons()?;
        let strategy = self.args.strategy_address;

        let (answer, borrows, shares, liquidity) = futures::try_join!(
            chain.read(CRV_USD_ORACLE, IAggregator::latestAnswerCall {}),
            try_join_all(cauldrons.iter().map(|c| chain.read(*c, ICauldron::totalBorrowCall {}))),
            try_join_all(cauldrons.iter().map(|c| chain.read(bento_box, IBentoBox::balanceOfCall { token: CRV, account: *c }))),
            self.liquidity.tricrv_liquidity_usd(),
        )?;
        let crv_price = positive_price(answer)?;

        let amounts = try_join_all(
            shares
                .into_iter()
                .map(|share| chain.read(bento_box, IBentoBox::toAmountCall { token: CRV, share, roundUp: true })),
        )
        .await?;

        let principal = borrows.iter().fold(U256::ZERO, |acc, b| acc + U256::from(b.elastic));
        let collateral_usd = amounts
            .iter()
            .fold(U256::ZERO, |acc, amount| acc + *amount * crv_price / U256::from(CHAINLINK_PRICE_SCALE));
        info!("principal (MIM): {}, collateral (USD): {}, TriCRV liquidity: ${}", principal, collateral_usd, liquidity);

        let rate = aip_13_6_rate(principal, collateral_usd, liquidity)?;

        let (allocation, current) = futures::try_join!(
            chain.read(bento_box, IBentoBox::strategyDataCall { token: CRV }),
            chain.read(strategy, IInterestStrategy::getYearlyInterestBipsCall {}),
        )?;
        let rate = scale_to_allocation(rate, allocation.targetPercentage);
        info!("Strategy Allocation: {}%, final interest rate: {}", allocation.targetPercentage, rate);

        if current == U256::from(rate) {
            info!("Interest rate unchanged");
            return Ok(None);
        }
        Ok(Some(IInterestStrategy::setInterestCall { interestBips: U256::from(rate) }.abi_encode().into()))
    }

    /// `swapAndwithdrawFees` with an Odos quote for the pending fees, if any
    async fn swap_fees(
        &self,
        ctx: &KeeperContext,
        chain: &Arc<dyn ChainReader>,
        quoter: &Arc<dyn SwapQuoter>,
    ) -> Result<Option<Bytes>, KeeperError> {
        let strategy = self.args.strategy_address;
        let (accrued, earned, strategy_token) = futures::try_join!(
            chain.read(INTEREST_LENS, IInterestLens::previewAccrueCall { strategy }),
            chain.read(strategy, IInterestStrategy::pendingFeeEarnedCall {}),
            chain.read(strategy, IInterestStrategy::strategyTokenCall {}),
        )?;
        let pending = U256::from(accrued) + U256::from(earned);
        info!("Pending fees: {} (accrued interest {})", pending, accrued);
        if pending.is_zero() {
            return Ok(None);
        }

        let quote = quoter
            .quote(
                ctx,
                &QuoteRequest {
                    chain_id: ctx.chain_id,
                    sell_token: strategy_token,
                    buy_token: self.args.swap_to_address,
                    sell_amount: pending,
                    slippage_bips: self.args.reward_swapping_slippage_in_bips,
                    taker: strategy,
                },
            )
            .await?;
        let min_amount_out = quote.min_out(self.args.reward_swapping_slippage_in_bips);
        info!("min amount out: {}", min_amount_out);

        let data = IInterestStrategy::swapAndwithdrawFeesCall {
            amountOutMin: min_amount_out,
            outputToken: self.args.swap_to_address,
            data: quote.data,
        }
        .abi_encode();
        Ok(Some(data.into()))
    }
}

#[async_trait]
impl Keeper for NegativeInterestsKeeper {
    fn name(&self) -> &'static str {
        "negative-interests"
    }

    async fn evaluate(&self, ctx: &KeeperContext) -> Result<KeeperResult, KeeperError> {
        if !self.gate.check_store(ctx).await?.is_ready() {
            return Ok(KeeperResult::skip(TIME_NOT_ELAPSED));
        }

        let chain = ctx.provider()?;
        let mut calls: Vec<Bytes> = Vec::new();

        if let Some(InterestAdjuster::CrvAip13_6) = self.args.interest_adjuster_type {
            let bento_box = chain.read(self.args.strategy_address, IInterestStrategy::bentoBoxCall {}).await?;
            calls.extend(self.adjust_interest(&chain, bento_box).await?);
        }

        match &self.quoter {
            Some(quoter) => calls.extend(self.swap_fees(ctx, &chain, quoter).await?),
            None => calls.push(IInterestStrategy::withdrawFeesCall {}.abi_encode().into()),
        }

        let data = IStrategyExecutor::runCall {
            strategy: self.args.strategy_address,
            maxBentoBoxAmountIncreaseInBips: U256::from(self.args.max_bento_box_amount_increase_in_bips),
            maxBentoBoxChangeAmountInBips: U256::from(self.args.max_bento_box_change_amount_in_bips),
            calls,
        }
        .abi_encode();

        self.gate.commit(ctx).await?;
        Ok(KeeperResult::exec(vec![CallData::new(self.args.exec_address, data)]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::testing::{test_context, TestContext};
    use crate::functions::run_keeper;
    use crate::quotes::mock::MockQuoter;
    use crate::store::LAST_TIMESTAMP_KEY;
    use alloy_primitives::I256;
    use alloy_sol_types::SolValue;

    const NOW: u64 = 1_700_000_000;

    struct FixedLiquidity(f64);

    #[async_trait]
    impl PoolLiquiditySource for FixedLiquidity {
        async fn tricrv_liquidity_usd(&self) -> Result<f64, KeeperError> {
            Ok(self.0)
        }
    }

    fn cauldron(n: u8) -> Address {
        Address::repeat_byte(0xc0 + n)
    }

    fn args() -> NegativeInterestsArgs {
        NegativeInterestsArgs {
            exec_address: Address::repeat_byte(0x41),
            strategy_address: Address::repeat_byte(0x42),
            interval_in_seconds: 86_400,
            odos_api_endpoint: String::new(),
            reward_swapping_slippage_in_bips: 200,
            max_bento_box_amount_increase_in_bips: 1,
            max_bento_box_change_amount_in_bips: 1_000,
            interest_adjuster_type: None,
            interest_adjuster_parameters: String::new(),
            swap_to_address: Address::repeat_byte(0x43),
        }
    }

    fn keeper(args: NegativeInterestsArgs, quoter: Option<Arc<dyn SwapQuoter>>) -> NegativeInterestsKeeper {
        NegativeInterestsKeeper::new(args, quoter, Arc::new(FixedLiquidity(12_000_000.0)))
    }

    fn run_calls(result: &KeeperResult) -> Vec<Bytes> {
        IStrategyExecutor::runCall::abi_decode(&result.calls()[0].data).unwrap().calls
    }

    fn mock_crv_cauldrons(t: &TestContext, current_rate: u64) {
        let a = args();
        let bento_box = Address::repeat_byte(0xbb);
        t.chain
            .respond(a.strategy_address, IInterestStrategy::bentoBoxCall {}, bento_box.abi_encode())
            // $0.50
            .respond(CRV_USD_ORACLE, IAggregator::latestAnswerCall {}, I256::try_from(50_000_000i64).unwrap().abi_encode())
            // 6M MIM borrowed in total
            .respond(cauldron(1), ICauldron::totalBorrowCall {}, (4_000_000u128 * 10u128.pow(18), 0u128).abi_encode_params())
            .respond(cauldron(2), ICauldron::totalBorrowCall {}, (2_000_000u128 * 10u128.pow(18), 0u128).abi_encode_params())
            .respond_any::<IBentoBox::balanceOfCall>(bento_box, usd(1).abi_encode())
            // 15M CRV per cauldron, $15M collateral: ratio 40%
            .respond_any::<IBentoBox::toAmountCall>(bento_box, usd(15_000_000).abi_encode())
            .respond(bento_box, IBentoBox::strategyDataCall { token: CRV }, (0u64, 50u64, 0u128).abi_encode_params())
            .respond(a.strategy_address, IInterestStrategy::getYearlyInterestBipsCall {}, U256::from(current_rate).abi_encode());
    }

    fn adjusted_args() -> NegativeInterestsArgs {
        NegativeInterestsArgs {
            interest_adjuster_type: Some(InterestAdjuster::CrvAip13_6),
            interest_adjuster_parameters: format!("{},{}", cauldron(1), cauldron(2)),
            ..args()
        }
    }

    #[test]
    fn test_aip_13_6_tiers() {
        // 12M principal on 24M collateral (50%), deep liquidity
        assert_eq!(aip_13_6_rate(usd(12_000_000), usd(24_000_000), 35_000_000.0).unwrap(), 14_500);
        // 6M on 10M (60%), shallow liquidity
        assert_eq!(aip_13_6_rate(usd(6_000_000), usd(10_000_000), 1_000_000.0).unwrap(), 10_500);
        // small principal, low ratio, deep liquidity clamps at zero
        assert_eq!(aip_13_6_rate(usd(1_000_000), usd(10_000_000), 40_000_000.0).unwrap(), 0);
        assert!(aip_13_6_rate(usd(1), U256::ZERO, 0.0).is_err());
    }

    #[test]
    fn test_allocation_scaling() {
        assert_eq!(scale_to_allocation(3_000, 50), 6_000);
        assert_eq!(scale_to_allocation(3_000, 0), 3_000);
    }

    #[test]
    fn test_adjuster_parameters() {
        let parsed: NegativeInterestsArgs = serde_json::from_value(serde_json::json!({
            "execAddress": "0x4141414141414141414141414141414141414141",
            "strategyAddress": "0x4242424242424242424242424242424242424242",
            "intervalInSeconds": 86400,
            "rewardSwappingSlippageInBips": 200,
            "maxBentoBoxAmountIncreaseInBips": 1,
            "maxBentoBoxChangeAmountInBips": 1000,
            "interestAdjusterType": "CRV_AIP_13_6",
            "interestAdjusterParameters": "0xc1c1c1c1c1c1c1c1c1c1c1c1c1c1c1c1c1c1c1c1, 0xc2c2c2c2c2c2c2c2c2c2c2c2c2c2c2c2c2c2c2c2",
            "swapToAddress": "0x4343434343434343434343434343434343434343"
        }))
        .unwrap();
        assert_eq!(parsed.cauldrons().unwrap(), vec![cauldron(1), cauldron(2)]);
        assert_eq!(parsed.fee_swap_endpoint(), None);
        assert!(parsed.validate().is_ok());

        let broken = NegativeInterestsArgs { interest_adjuster_parameters: "0x01".to_string(), ..parsed };
        assert!(broken.validate().is_err());
    }

    #[tokio::test]
    async fn test_plain_fee_withdrawal() {
        let t = test_context(1, NOW);
        let result = keeper(args(), None).evaluate(&t.ctx).await.unwrap();

        let calls = run_calls(&result);
        assert_eq!(calls, vec![Bytes::from(IInterestStrategy::withdrawFeesCall {}.abi_encode())]);
        assert_eq!(t.store.snapshot()[LAST_TIMESTAMP_KEY], NOW.to_string());
        assert_eq!(t.chain.call_count(), 0);
    }

    #[tokio::test]
    async fn test_interest_adjusted_for_allocation() {
        let t = test_context(1, NOW);
        mock_crv_cauldrons(&t, 3_000);

        let result = keeper(adjusted_args(), None).evaluate(&t.ctx).await.unwrap();
        let calls = run_calls(&result);
        assert_eq!(calls.len(), 2);
        // 8000 base, 40% ratio unchanged, -1000 at 12M liquidity, doubled at 50% allocation
        let set = IInterestStrategy::setInterestCall::abi_decode(&calls[0]).unwrap();
        assert_eq!(set.interestBips, U256::from(14_000u64));
    }

    #[tokio::test]
    async fn test_unchanged_interest_is_not_reset() {
        let t = test_context(1, NOW);
        mock_crv_cauldrons(&t, 14_000);

        let result = keeper(adjusted_args(), None).evaluate(&t.ctx).await.unwrap();
        assert_eq!(run_calls(&result).len(), 1);
    }

    #[tokio::test]
    async fn test_swaps_pending_fees_through_quote() {
        let a = args();
        let t = test_context(1, NOW);
        t.chain
            .respond(INTEREST_LENS, IInterestLens::previewAccrueCall { strategy: a.strategy_address }, 600u128.abi_encode())
            .respond(a.strategy_address, IInterestStrategy::pendingFeeEarnedCall {}, 400u128.abi_encode())
            .respond(a.strategy_address, IInterestStrategy::strategyTokenCall {}, Address::repeat_byte(0x55).abi_encode());
        let quoter = Arc::new(MockQuoter::returning(10_000, &[0x0d]));

        let result = keeper(a.clone(), Some(quoter.clone())).evaluate(&t.ctx).await.unwrap();
        let request = &quoter.requests()[0];
        assert_eq!(request.sell_amount, U256::from(1_000u64));
        assert_eq!(request.taker, a.strategy_address);

        let swap = IInterestStrategy::swapAndwithdrawFeesCall::abi_decode(&run_calls(&result)[0]).unwrap();
        assert_eq!(swap.amountOutMin, U256::from(9_800u64));
        assert_eq!(swap.outputToken, a.swap_to_address);
    }

    #[tokio::test]
    async fn test_quote_failure_keeps_gate_open() {
        let a = args();
        let t = test_context(1, NOW);
        t.chain
            .respond_any::<IInterestLens::previewAccrueCall>(INTEREST_LENS, 1u128.abi_encode())
            .respond(a.strategy_address, IInterestStrategy::pendingFeeEarnedCall {}, 0u128.abi_encode())
            .respond(a.strategy_address, IInterestStrategy::strategyTokenCall {}, Address::repeat_byte(0x55).abi_encode());
        let quoter = Arc::new(MockQuoter::failing(KeeperError::quote("odos", "503 Service Unavailable")));

        let result = run_keeper(&keeper(a, Some(quoter)), &t.ctx).await;
        assert!(result.message().unwrap().contains("odos quote failed"));
        assert!(t.store.snapshot().is_empty());
    }

    #[test]
    fn test_curve_liquidity_decoding() {
        let response: CurvePoolsResponse = serde_json::from_str(
            r#"{"success": true, "data": {"poolData": [
                {"id": "factory-tricrypto-0", "usdTotal": 1.5},
                {"id": "factory-tricrypto-4", "usdTotal": 23456789.12}
            ]}}"#,
        )
        .unwrap();
        assert_eq!(CurveApi::liquidity(response).unwrap(), 23_456_789.12);

        let failed: CurvePoolsResponse = serde_json::from_str(r#"{"success": false}"#).unwrap();
        assert!(CurveApi::liquidity(failed).is_err());
    }
}
