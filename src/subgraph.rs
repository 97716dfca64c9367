//! GraphQL client for expired staking locks
//!
//! One POST per evaluation. A non-empty `errors` array is an upstream
//! failure even when the status is 200.

use crate::error::KeeperError;
use crate::quotes::send_json;
use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::{debug, info};

const SOURCE: &str = "subgraph";

const USER_LOCKS_QUERY: &str = r#"
query($lockLimit: Int, $minimumUnlockTime: BigInt) {
  userLocks(first: $lockLimit, where: { unlockTime_lte: $minimumUnlockTime }, orderBy: unlockTime, orderDirection: asc) {
    user {
      id
    }
    lockIndex
  }
}"#;

/// One expired lock of one user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserLock {
    pub user: Address,
    pub lock_index: U256,
}

/// Where expired locks come from
#[async_trait]
pub trait UserLockSource: Send + Sync {
    /// Up to `limit` locks with `unlockTime <= unlocked_before`, oldest first
    async fn expired_locks(&self, limit: u32, unlocked_before: u64) -> Result<Vec<UserLock>, KeeperError>;
}

// ============================================
// WIRE TYPES
// ============================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Variables {
    lock_limit: u32,
    /// BigInt scalars travel as strings
    minimum_unlock_time: String,
}

#[derive(Debug, Serialize)]
struct GraphQlRequest<'a> {
    query: &'a str,
    variables: Variables,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<UserLocksData>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserLocksData {
    #[serde(default)]
    user_locks: Vec<RawUserLock>,
}

#[derive(Debug, Deserialize)]
struct RawUser {
    id: Address,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawUserLock {
    user: RawUser,
    lock_index: String,
}

// ============================================
// CLIENT
// ============================================

pub struct SubgraphClient {
    client: Client,
    url: String,
}

impl SubgraphClient {
    pub fn new(client: Client, url: &str) -> Self {
        Self { client, url: url.to_string() }
    }

    fn decode(response: GraphQlResponse) -> Result<Vec<UserLock>, KeeperError> {
        if !response.errors.is_empty() {
            let message = response.errors.into_iter().map(|e| e.message).collect::<Vec<_>>().join("; ");
            return Err(KeeperError::http(SOURCE, message));
        }

        response
            .data
            .map(|d| d.user_locks)
            .unwrap_or_default()
            .into_iter()
            .map(|raw| {
                let lock_index = U256::from_str(&raw.lock_index)
                    .map_err(|_| KeeperError::missing(SOURCE, "userLocks.lockIndex"))?;
                Ok(UserLock { user: raw.user.id, lock_index })
            })
            .collect()
    }
}

#[async_trait]
impl UserLockSource for SubgraphClient {
    async fn expired_locks(&self, limit: u32, unlocked_before: u64) -> Result<Vec<UserLock>, KeeperError> {
        let body = GraphQlRequest {
            query: USER_LOCKS_QUERY,
            variables: Variables { lock_limit: limit, minimum_unlock_time: unlocked_before.to_string() },
        };
        debug!("subgraph query: {:?}", body.variables);

        let response: GraphQlResponse = send_json(SOURCE, self.client.post(&self.url).json(&body)).await?;
        let locks = Self::decode(response)?;
        info!("{} expired locks", locks.len());
        Ok(locks)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let body = GraphQlRequest {
            query: USER_LOCKS_QUERY,
            variables: Variables { lock_limit: 50, minimum_unlock_time: "1700000000".to_string() },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["variables"]["lockLimit"], 50);
        assert_eq!(json["variables"]["minimumUnlockTime"], "1700000000");
        assert!(json["query"].as_str().unwrap().contains("unlockTime_lte"));
    }

    #[test]
    fn test_decode_locks() {
        let response: GraphQlResponse = serde_json::from_str(
            r#"{"data": {"userLocks": [
                {"user": {"id": "0x1111111111111111111111111111111111111111"}, "lockIndex": "3"},
                {"user": {"id": "0x2222222222222222222222222222222222222222"}, "lockIndex": "0"}
            ]}}"#,
        )
        .unwrap();
        let locks = SubgraphClient::decode(response).unwrap();
        assert_eq!(locks.len(), 2);
        assert_eq!(locks[0].user, Address::repeat_byte(0x11));
        assert_eq!(locks[0].lock_index, U256::from(3u64));
    }

    #[test]
    fn test_graphql_errors_are_failures() {
        let response: GraphQlResponse =
            serde_json::from_str(r#"{"data": null, "errors": [{"message": "indexing_error"}]}"#).unwrap();
        let err = SubgraphClient::decode(response).unwrap_err();
        assert!(err.to_string().contains("indexing_error"));
        assert!(err.to_string().contains("failed"));
    }
}
