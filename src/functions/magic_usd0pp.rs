//! magicUSD0++ off-chain distribution claim
//!
//! The Usual API lists every merkle distribution for the vault; only the
//! one matching the on-chain root can be claimed. No interval gate: the
//! claimed amount makes the call idempotent.

use super::{require_address, require_endpoint, Keeper};
use crate::chain::abi::IMagicUsd0ppDistribution;
use crate::context::KeeperContext;
use crate::error::KeeperError;
use crate::quotes::{de_amount, join_url, send_json};
use crate::result::{CallData, KeeperResult};
use alloy_primitives::{Address, B256, U256};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

const SOURCE: &str = "usual";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MagicUsd0ppArgs {
    pub exec_address: Address,
    pub usual_api_endpoint: String,
    pub magic_usd0pp_address: Address,
}

impl MagicUsd0ppArgs {
    pub fn validate(&self) -> Result<(), KeeperError> {
        require_address("execAddress", self.exec_address)?;
        require_address("magicUsd0ppAddress", self.magic_usd0pp_address)?;
        require_endpoint("usualApiEndpoint", &self.usual_api_endpoint)
    }
}

// ============================================
// DISTRIBUTIONS API
// ============================================

/// One published merkle distribution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Distribution {
    pub merkle_root: B256,
    /// Cumulative amount claimable under this root
    pub value: U256,
    pub merkle_proof: Vec<B256>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DistributionResponse {
    merkle_root: Option<B256>,
    #[serde(default, deserialize_with = "de_amount")]
    value: Option<U256>,
    #[serde(default)]
    merkle_proof: Vec<B256>,
}

impl TryFrom<DistributionResponse> for Distribution {
    type Error = KeeperError;

    fn try_from(response: DistributionResponse) -> Result<Self, Self::Error> {
        Ok(Distribution {
            merkle_root: response.merkle_root.ok_or_else(|| KeeperError::missing(SOURCE, "merkleRoot"))?,
            value: response.value.ok_or_else(|| KeeperError::missing(SOURCE, "value"))?,
            merkle_proof: response.merkle_proof,
        })
    }
}

#[async_trait]
pub trait DistributionSource: Send + Sync {
    async fn distributions(&self, account: Address) -> Result<Vec<Distribution>, KeeperError>;
}

/// `GET {endpoint}/rewards/{account}`
pub struct UsualApi {
    client: Client,
    endpoint: String,
}

impl UsualApi {
    pub fn new(client: Client, endpoint: &str) -> Self {
        Self { client, endpoint: endpoint.to_string() }
    }

    fn url(&self, account: Address) -> String {
        join_url(&self.endpoint, &format!("rewards/{}", account))
    }
}

#[async_trait]
impl DistributionSource for UsualApi {
    async fn distributions(&self, account: Address) -> Result<Vec<Distribution>, KeeperError> {
        let url = self.url(account);
        debug!("GET {}", url);
        let response: Vec<DistributionResponse> = send_json(SOURCE, self.client.get(url)).await?;
        response.into_iter().map(Distribution::try_from).collect()
    }
}

// ============================================
// FUNCTION
// ============================================

pub struct MagicUsd0ppKeeper {
    args: MagicUsd0ppArgs,
    distributions: Arc<dyn DistributionSource>,
}

impl MagicUsd0ppKeeper {
    pub fn new(args: MagicUsd0ppArgs, distributions: Arc<dyn DistributionSource>) -> Self {
        Self { args, distributions }
    }
}

#[async_trait]
impl Keeper for MagicUsd0ppKeeper {
    fn name(&self) -> &'static str {
        "magic-usd0pp"
    }

    async fn evaluate(&self, ctx: &KeeperContext) -> Result<KeeperResult, KeeperError> {
        let chain = ctx.provider()?;
        let distributor = self.args.exec_address;
        let account = self.args.magic_usd0pp_address;

        let (data, claimed, distributions) = futures::try_join!(
            chain.read(distributor, IMagicUsd0ppDistribution::getOffChainDistributionDataCall {}),
            chain.read(distributor, IMagicUsd0ppDistribution::getOffChainTokensClaimedCall { account }),
            self.distributions.distributions(account),
        )?;

        if distributions.is_empty() {
            return Ok(KeeperResult::skip("No distributions"));
        }

        let Some(current) = distributions.into_iter().find(|d| d.merkle_root == data.merkleRoot) else {
            return Ok(KeeperResult::skip("No matching distribution"));
        };
        info!("root {}: claimable {}, claimed {}", current.merkle_root, current.value, claimed);

        if claimed >= current.value {
            return Ok(KeeperResult::skip("Already claimed latest distribution"));
        }

        let data = IMagicUsd0ppDistribution::claimOffChainDistributionCall {
            account,
            amount: current.value,
            proof: current.merkle_proof,
        }
        .abi_encode();
        Ok(KeeperResult::exec(vec![CallData::new(distributor, data)]))
    }
}
