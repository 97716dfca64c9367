//! Invocation results
//!
//! The automation network expects exactly one of:
//! - `{"canExec": false, "message": "..."}`
//! - `{"canExec": true, "callData": [{"to", "data", "value"?}, ...]}`

use alloy_primitives::{Address, Bytes, U256};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use tracing::debug;

/// Tenderly simulator base used for operator debug links
const TENDERLY_SIMULATOR_URL: &str =
    "https://dashboard.tenderly.co/abracadabra/magic-internet-money/simulator/new";

/// One call the automation network should execute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallData {
    pub to: Address,
    pub data: Bytes,
    /// Native value attached to the call, serialized as a decimal string
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_value"
    )]
    pub value: Option<U256>,
}

fn serialize_value<S: Serializer>(value: &Option<U256>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(v) => serializer.serialize_str(&v.to_string()),
        None => serializer.serialize_none(),
    }
}

impl CallData {
    pub fn new(to: Address, data: impl Into<Bytes>) -> Self {
        Self { to, data: data.into(), value: None }
    }

    /// Attach native value to the call
    pub fn with_value(mut self, value: U256) -> Self {
        self.value = Some(value);
        self
    }

    /// Value to forward, zero when unset
    pub fn value_or_zero(&self) -> U256 {
        self.value.unwrap_or(U256::ZERO)
    }

    /// Tenderly simulator link for this call sent from `from` on `chain_id`
    pub fn simulation_url(&self, from: Address, chain_id: u64) -> String {
        format!(
            "{}?blockIndex=0&from={}&value={}&contractAddress={}&rawFunctionInput={}&network={}",
            TENDERLY_SIMULATOR_URL,
            from,
            self.value_or_zero(),
            self.to,
            self.data,
            chain_id
        )
    }
}

/// Outcome of one keeper evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeeperResult {
    /// Nothing to execute this round
    Skip { message: String },
    /// Execute these calls, in order
    Exec { calls: Vec<CallData> },
}

impl KeeperResult {
    pub fn skip(message: impl Into<String>) -> Self {
        KeeperResult::Skip { message: message.into() }
    }

    pub fn exec(calls: Vec<CallData>) -> Self {
        KeeperResult::Exec { calls }
    }

    pub fn can_exec(&self) -> bool {
        matches!(self, KeeperResult::Exec { .. })
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            KeeperResult::Skip { message } => Some(message),
            KeeperResult::Exec { .. } => None,
        }
    }

    pub fn calls(&self) -> &[CallData] {
        match self {
            KeeperResult::Exec { calls } => calls,
            KeeperResult::Skip { .. } => &[],
        }
    }

    /// Log simulation links for every call at debug level
    pub fn log_simulations(&self, from: Address, chain_id: u64) {
        for call in self.calls() {
            debug!("Simulate: {}", call.simulation_url(from, chain_id));
        }
    }
}

impl Serialize for KeeperResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        match self {
            KeeperResult::Skip { message } => {
                map.serialize_entry("canExec", &false)?;
                map.serialize_entry("message", message)?;
            }
            KeeperResult::Exec { calls } => {
                map.serialize_entry("canExec", &true)?;
                map.serialize_entry("callData", calls)?;
            }
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    #[test]
    fn test_skip_serializes_to_automation_shape() {
        let result = KeeperResult::skip("Nothing to harvest");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json, serde_json::json!({"canExec": false, "message": "Nothing to harvest"}));
    }

    #[test]
    fn test_exec_serializes_value_as_decimal_string() {
        let to = address!("518d6B079884Ca6Ff12c398F68Ac31516813b1A5");
        let plain = CallData::new(to, vec![0xde, 0xad]);
        let paid = CallData::new(to, vec![0xbe, 0xef]).with_value(U256::from(1_000u64));
        let json = serde_json::to_value(KeeperResult::exec(vec![plain, paid])).unwrap();

        assert_eq!(json["canExec"], true);
        let calls = json["callData"].as_array().unwrap();
        assert_eq!(calls[0]["data"], "0xdead");
        assert!(calls[0].get("value").is_none());
        assert_eq!(calls[1]["value"], "1000");
    }

    #[test]
    fn test_simulation_url_contains_call() {
        let to = address!("518d6B079884Ca6Ff12c398F68Ac31516813b1A5");
        let call = CallData::new(to, vec![0x01]);
        let url = call.simulation_url(Address::ZERO, 42161);
        assert!(url.contains("rawFunctionInput=0x01"));
        assert!(url.ends_with("network=42161"));
    }
}
