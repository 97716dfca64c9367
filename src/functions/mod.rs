//! Keeper functions
//!
//! Each function decides, from on-chain state and optional off-chain
//! pricing, whether the automation network should execute calls now:
//!
//! 1. Readiness gate (cheapest exit)
//! 2. Aggregate claimable amounts
//! 3. Price through an aggregator or lens
//! 4. Guards (slippage, APY cap, minimums)
//! 5. Assemble calldata
//! 6. Commit the execution timestamp, then return
//!
//! Functions return `Err` for upstream failures; `run_keeper` turns those
//! into a non-executable result carrying the error text.

pub mod gm;
pub mod interest;
pub mod lusd;
pub mod magic_ape;
pub mod magic_curve_lp;
pub mod magic_glp;
pub mod magic_lvl;
pub mod magic_usd0pp;
pub mod negative_interests;
pub mod process_locks;
pub mod reward_distributor;
pub mod spell_staking;
pub mod spell_swapper;
pub mod stargate_v1;
pub mod stargate_v2;
pub mod velodrome_op_usdc;
pub mod wrapped_glp;
pub mod xf33d;

use crate::context::KeeperContext;
use crate::crosschain::Relayed;
use crate::error::KeeperError;
use crate::gm::GmApi;
use crate::quotes::{build_quoter, http_client, Aggregator, SwapQuoter};
use crate::registry;
use crate::result::KeeperResult;
use crate::subgraph::SubgraphClient;
use alloy_primitives::utils::parse_ether;
use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use serde::{de, Deserialize, Deserializer};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[async_trait]
pub trait Keeper: Send + Sync {
    /// Function name as registered with the automation network
    fn name(&self) -> &'static str;

    /// One evaluation against `ctx`
    async fn evaluate(&self, ctx: &KeeperContext) -> Result<KeeperResult, KeeperError>;
}

/// Evaluate `keeper`, folding every error into a non-executable result
pub async fn run_keeper(keeper: &dyn Keeper, ctx: &KeeperContext) -> KeeperResult {
    match keeper.evaluate(ctx).await {
        Ok(result) => {
            match &result {
                KeeperResult::Exec { calls } => info!("✓ {}: {} call(s) to execute", keeper.name(), calls.len()),
                KeeperResult::Skip { message } => info!("{}: {}", keeper.name(), message),
            }
            result.log_simulations(registry::automation_proxy(ctx.chain_id), ctx.chain_id);
            result
        }
        Err(e) => {
            warn!("{} failed: {}", keeper.name(), e);
            KeeperResult::skip(e.to_string())
        }
    }
}

// ============================================
// ARGUMENT HELPERS
// ============================================

/// Reject the zero address for a required argument
pub(crate) fn require_address(name: &str, address: Address) -> Result<(), KeeperError> {
    if address == Address::ZERO {
        return Err(KeeperError::Config(format!("{} must not be the zero address", name)));
    }
    Ok(())
}

/// Reject empty endpoints
pub(crate) fn require_endpoint(name: &str, endpoint: &str) -> Result<(), KeeperError> {
    if endpoint.trim().is_empty() {
        return Err(KeeperError::Config(format!("{} must not be empty", name)));
    }
    Ok(())
}

/// Integer amount written as a decimal string (or a small TOML integer)
pub(crate) fn de_u256<'de, D>(deserializer: D) -> Result<U256, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => s,
        serde_json::Value::Number(n) => n.to_string(),
        other => return Err(de::Error::custom(format!("expected an integer amount, got {}", other))),
    };
    U256::from_str(raw.trim()).map_err(|e| de::Error::custom(format!("invalid amount {:?}: {}", raw, e)))
}

/// Amount in ether units ("1.5"), scaled to 18 decimals
pub(crate) fn de_ether<'de, D>(deserializer: D) -> Result<U256, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => s,
        serde_json::Value::Number(n) => n.to_string(),
        other => return Err(de::Error::custom(format!("expected an ether amount, got {}", other))),
    };
    parse_ether(raw.trim()).map_err(|e| de::Error::custom(format!("invalid ether amount {:?}: {}", raw, e)))
}

/// Aggregator choice shared by swapping functions
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteArgs {
    pub aggregator: Aggregator,
    /// Overrides the aggregator's public endpoint
    #[serde(default)]
    pub endpoint: Option<String>,
}

impl QuoteArgs {
    pub fn new(aggregator: Aggregator) -> Self {
        Self { aggregator, endpoint: None }
    }

    pub fn with_endpoint(aggregator: Aggregator, endpoint: &str) -> Self {
        Self { aggregator, endpoint: Some(endpoint.to_string()) }
    }

    fn build(&self, timeout: Duration) -> Result<Arc<dyn SwapQuoter>, KeeperError> {
        build_quoter(self.aggregator, self.endpoint.as_deref(), timeout)
    }
}

// ============================================
// REGISTRY OF FUNCTIONS
// ============================================

/// Every function with its typed arguments, as written in task configs
///
/// ```toml
/// kind = "magic-glp"
/// [tasks.args]
/// execAddress = "0x..."
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", content = "args", rename_all = "kebab-case")]
pub enum KeeperSpec {
    MagicGlp(magic_glp::MagicGlpArgs),
    MagicApe(magic_ape::MagicApeArgs),
    MagicLvl(magic_lvl::MagicLvlArgs),
    MagicCurveLp(magic_curve_lp::MagicCurveLpArgs),
    MagicUsd0pp(magic_usd0pp::MagicUsd0ppArgs),
    RewardDistributor(reward_distributor::RewardDistributorArgs),
    ProcessLocks(process_locks::ProcessLocksArgs),
    NegativeInterests(negative_interests::NegativeInterestsArgs),
    Interest(interest::InterestArgs),
    SpellStaking(spell_staking::SpellStakingArgs),
    SpellSwapper(spell_swapper::SpellSwapperArgs),
    StargateV1(stargate_v1::StargateV1Args),
    StargateV2(stargate_v2::StargateV2Args),
    VelodromeOpUsdc(velodrome_op_usdc::VelodromeArgs),
    Gm(gm::GmArgs),
    Xf33d(xf33d::Xf33dArgs),
    Lusd(lusd::LusdArgs),
    WrappedGlp(wrapped_glp::WrappedGlpArgs),
}

/// `(kind, description)` for every function
pub const KINDS: [(&str, &str); 18] = [
    ("magic-glp", "Compound magicGLP rewards into GLP, APY capped"),
    ("magic-ape", "Harvest magicAPE when claimable"),
    ("magic-lvl", "Compound Level LVL rewards into tranche LP (BSC)"),
    ("magic-curve-lp", "Compound curve gauge rewards into LP"),
    ("magic-usd0pp", "Claim the current off-chain USUAL distribution"),
    ("reward-distributor", "Distribute rewards to staking contracts that are ready"),
    ("process-locks", "Release expired staking locks"),
    ("negative-interests", "Adjust strategy interest and withdraw fees"),
    ("interest", "Swap interest strategy fees through 0x"),
    ("spell-staking", "Withdraw cauldron fees and distribute or bridge them"),
    ("spell-swapper", "Swap MIM for SPELL within bounds"),
    ("stargate-v1", "Swap STG to LP and harvest"),
    ("stargate-v2", "Swap rewards to LP through an aggregator and harvest"),
    ("velodrome-op-usdc", "Harvest the Velodrome wrapper and strategy"),
    ("gm", "Compound rewards into GMX v2 GM tokens"),
    ("xf33d", "Push an oracle feed to another chain"),
    ("lusd", "Swap stability pool gains back into LUSD"),
    ("wrapped-glp", "Swap wrapped GLP rewards into the output token"),
];

impl KeeperSpec {
    pub fn kind(&self) -> &'static str {
        match self {
            KeeperSpec::MagicGlp(_) => "magic-glp",
            KeeperSpec::MagicApe(_) => "magic-ape",
            KeeperSpec::MagicLvl(_) => "magic-lvl",
            KeeperSpec::MagicCurveLp(_) => "magic-curve-lp",
            KeeperSpec::MagicUsd0pp(_) => "magic-usd0pp",
            KeeperSpec::RewardDistributor(_) => "reward-distributor",
            KeeperSpec::ProcessLocks(_) => "process-locks",
            KeeperSpec::NegativeInterests(_) => "negative-interests",
            KeeperSpec::Interest(_) => "interest",
            KeeperSpec::SpellStaking(_) => "spell-staking",
            KeeperSpec::SpellSwapper(_) => "spell-swapper",
            KeeperSpec::StargateV1(_) => "stargate-v1",
            KeeperSpec::StargateV2(_) => "stargate-v2",
            KeeperSpec::VelodromeOpUsdc(_) => "velodrome-op-usdc",
            KeeperSpec::Gm(_) => "gm",
            KeeperSpec::Xf33d(_) => "xf33d",
            KeeperSpec::Lusd(_) => "lusd",
            KeeperSpec::WrappedGlp(_) => "wrapped-glp",
        }
    }

    pub fn validate(&self) -> Result<(), KeeperError> {
        match self {
            KeeperSpec::MagicGlp(a) => a.validate(),
            KeeperSpec::MagicApe(a) => a.validate(),
            KeeperSpec::MagicLvl(a) => a.validate(),
            KeeperSpec::MagicCurveLp(a) => a.validate(),
            KeeperSpec::MagicUsd0pp(a) => a.validate(),
            KeeperSpec::RewardDistributor(a) => a.validate(),
            KeeperSpec::ProcessLocks(a) => a.validate(),
            KeeperSpec::NegativeInterests(a) => a.validate(),
            KeeperSpec::Interest(a) => a.validate(),
            KeeperSpec::SpellStaking(a) => a.validate(),
            KeeperSpec::SpellSwapper(a) => a.validate(),
            KeeperSpec::StargateV1(a) => a.validate(),
            KeeperSpec::StargateV2(a) => a.validate(),
            KeeperSpec::VelodromeOpUsdc(a) => a.validate(),
            KeeperSpec::Gm(a) => a.validate(),
            KeeperSpec::Xf33d(a) => a.validate(),
            KeeperSpec::Lusd(a) => a.validate(),
            KeeperSpec::WrappedGlp(a) => a.validate(),
        }
    }

    /// Validate and wire a function to real HTTP upstreams
    pub fn build(&self, timeout: Duration) -> Result<Box<dyn Keeper>, KeeperError> {
        self.validate()?;

        let keeper: Box<dyn Keeper> = match self.clone() {
            KeeperSpec::MagicGlp(a) => Box::new(magic_glp::MagicGlpKeeper::new(a)),
            KeeperSpec::MagicApe(a) => Box::new(magic_ape::MagicApeKeeper::new(a)),
            KeeperSpec::MagicLvl(a) => {
                let quoter = a.quote.build(timeout)?;
                Box::new(magic_lvl::MagicLvlKeeper::new(a, quoter))
            }
            KeeperSpec::MagicCurveLp(a) => {
                let quoter = a.quote.build(timeout)?;
                Box::new(magic_curve_lp::MagicCurveLpKeeper::new(a, quoter))
            }
            KeeperSpec::MagicUsd0pp(a) => {
                let api = magic_usd0pp::UsualApi::new(http_client(timeout)?, &a.usual_api_endpoint);
                Box::new(magic_usd0pp::MagicUsd0ppKeeper::new(a, Arc::new(api)))
            }
            KeeperSpec::RewardDistributor(a) => Box::new(reward_distributor::RewardDistributorKeeper::new(a)),
            KeeperSpec::ProcessLocks(a) => {
                let subgraph = SubgraphClient::new(http_client(timeout)?, &a.subgraph_url);
                Box::new(process_locks::ProcessLocksKeeper::new(a, Arc::new(subgraph)))
            }
            KeeperSpec::NegativeInterests(a) => {
                let quoter = match a.fee_swap_endpoint() {
                    Some(endpoint) => Some(build_quoter(Aggregator::Odos, Some(endpoint), timeout)?),
                    None => None,
                };
                let curve = negative_interests::CurveApi::new(http_client(timeout)?, negative_interests::CURVE_POOLS_URL);
                Box::new(negative_interests::NegativeInterestsKeeper::new(a, quoter, Arc::new(curve)))
            }
            KeeperSpec::Interest(a) => {
                let quoter = a.quote.build(timeout)?;
                Box::new(interest::InterestKeeper::new(a, quoter))
            }
            KeeperSpec::SpellStaking(a) => Box::new(spell_staking::SpellStakingKeeper::new(a)),
            KeeperSpec::SpellSwapper(a) => {
                let quoter = spell_swapper::build_quoter(&a, timeout)?;
                Box::new(spell_swapper::SpellSwapperKeeper::new(a, quoter))
            }
            KeeperSpec::StargateV1(a) => Box::new(stargate_v1::StargateV1Keeper::new(a)),
            KeeperSpec::StargateV2(a) => {
                let quoter = a.quote.build(timeout)?;
                Box::new(stargate_v2::StargateV2Keeper::new(a, quoter))
            }
            KeeperSpec::VelodromeOpUsdc(a) => Box::new(velodrome_op_usdc::VelodromeKeeper::new(a)),
            KeeperSpec::Gm(a) => {
                let quoter = gm::build_quoter(&a, timeout)?;
                let tickers = GmApi::new(http_client(timeout)?, &a.gm_api_endpoint);
                Box::new(gm::GmKeeper::new(a, quoter, Arc::new(tickers)))
            }
            KeeperSpec::Xf33d(a) => Box::new(xf33d::Xf33dKeeper::new(a)),
            KeeperSpec::Lusd(a) => {
                let quoter = a.quote.build(timeout)?;
                Box::new(lusd::LusdKeeper::new(a, quoter))
            }
            KeeperSpec::WrappedGlp(a) => {
                let quoter = a.quote.build(timeout)?;
                Box::new(wrapped_glp::WrappedGlpKeeper::new(a, quoter))
            }
        };
        Ok(keeper)
    }
}

/// Build a function, optionally relayed from the task's chain to `relay_to`
pub fn build_keeper(
    spec: &KeeperSpec,
    relay_to: Option<u64>,
    timeout: Duration,
) -> Result<Box<dyn Keeper>, KeeperError> {
    let keeper = spec.build(timeout)?;
    Ok(match relay_to {
        Some(destination) => {
            registry::lz_chain_id(destination)?;
            Box::new(Relayed::new(keeper, destination))
        }
        None => keeper,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::testing::test_context;

    struct Failing;

    #[async_trait]
    impl Keeper for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn evaluate(&self, _ctx: &KeeperContext) -> Result<KeeperResult, KeeperError> {
            Err(KeeperError::http("0x", "operation timed out"))
        }
    }

    #[tokio::test]
    async fn test_errors_become_skip_results() {
        let t = test_context(1, 1_000);
        let result = run_keeper(&Failing, &t.ctx).await;
        assert!(!result.can_exec());
        assert!(result.message().unwrap().contains("failed"));
    }

    #[test]
    fn test_kinds_cover_every_variant() {
        let spec: KeeperSpec = toml::from_str(
            r#"
            kind = "magic-ape"
            [args]
            execAddress = "0x588d402C868aDD9053f8F0098c2DC3443c991d17"
            intervalInSeconds = 3600
            "#,
        )
        .unwrap();
        assert_eq!(spec.kind(), "magic-ape");
        assert!(KINDS.iter().any(|(k, _)| *k == spec.kind()));
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_interest_kind_builds_with_zero_ex() {
        let spec: KeeperSpec = toml::from_str(
            r#"
            kind = "interest"
            [args]
            execAddress = "0x762d06bB0E45f5ACaEEA716336142a39376E596E"
            strategy = "0xcc0d7aF1f809dD3A589756Bba36Be04D19e9C6c5"
            "#,
        )
        .unwrap();
        assert_eq!(spec.kind(), "interest");
        assert!(KINDS.iter().any(|(k, _)| *k == "interest"));
        let keeper = spec.build(Duration::from_secs(5)).unwrap();
        assert_eq!(keeper.name(), "interest");
    }

    #[test]
    fn test_relay_requires_known_destination() {
        let spec: KeeperSpec = toml::from_str(
            r#"
            kind = "magic-ape"
            [args]
            execAddress = "0x588d402C868aDD9053f8F0098c2DC3443c991d17"
            intervalInSeconds = 3600
            "#,
        )
        .unwrap();
        assert!(build_keeper(&spec, Some(registry::KAVA), Duration::from_secs(5)).is_ok());
        assert!(matches!(
            build_keeper(&spec, Some(31337), Duration::from_secs(5)),
            Err(KeeperError::UnsupportedChain(31337))
        ));
    }

    #[derive(Deserialize)]
    struct Amounts {
        #[serde(deserialize_with = "de_u256")]
        wei: U256,
        #[serde(deserialize_with = "de_ether")]
        ether: U256,
    }

    #[test]
    fn test_amount_arguments() {
        let parsed: Amounts = toml::from_str(
            r#"
            wei = "1000000000000000000000"
            ether = "2.5"
            "#,
        )
        .unwrap();
        assert_eq!(parsed.wei, U256::from(10u64).pow(U256::from(21u64)));
        assert_eq!(parsed.ether, U256::from(2_500_000_000_000_000_000u64));

        assert!(toml::from_str::<Amounts>("wei = \"12abc\"\nether = \"1\"").is_err());
    }

    #[test]
    fn test_zero_exec_address_is_rejected() {
        let spec: KeeperSpec = toml::from_str(
            r#"
            kind = "magic-ape"
            [args]
            execAddress = "0x0000000000000000000000000000000000000000"
            intervalInSeconds = 3600
            "#,
        )
        .unwrap();
        assert!(spec.validate().is_err());
    }
}
