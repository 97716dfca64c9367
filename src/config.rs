//! Runner configuration
//!
//! One TOML file lists the RPC endpoint of every chain a task touches and
//! the tasks themselves. Task arguments mirror the automation network's
//! `userArgs` (camelCase keys). Secrets never live here: they come from the
//! environment, `.env` included.
//!
//! ```toml
//! httpTimeoutSecs = 10
//!
//! [rpc]
//! 42161 = "https://arb1.arbitrum.io/rpc"
//!
//! [[tasks]]
//! name = "magic-glp-arbitrum"
//! chainId = 42161
//! kind = "magic-glp"
//! [tasks.args]
//! execAddress = "0x..."
//! ```

use crate::functions::{build_keeper, Keeper, KeeperSpec};
use eyre::{eyre, Result, WrapErr};
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Upstream HTTP timeout bounds, in seconds
const MIN_HTTP_TIMEOUT_SECS: u64 = 5;
const MAX_HTTP_TIMEOUT_SECS: u64 = 10;

fn default_http_timeout() -> u64 {
    MAX_HTTP_TIMEOUT_SECS
}

// ============================================
// TASKS
// ============================================

/// One configured keeper function
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskConfig {
    pub name: String,
    pub chain_id: u64,
    /// Wrap the produced calls in a LayerZero relay to this chain
    #[serde(default)]
    pub relay_to: Option<u64>,
    #[serde(flatten)]
    pub spec: KeeperSpec,
}

impl TaskConfig {
    /// Chains this task reads from
    pub fn chains(&self) -> Vec<u64> {
        let mut chains = vec![self.chain_id];
        if let Some(destination) = self.relay_to {
            chains.push(destination);
        }
        chains
    }

    pub fn build(&self, timeout: Duration) -> Result<Box<dyn Keeper>> {
        build_keeper(&self.spec, self.relay_to, timeout).wrap_err_with(|| format!("task {}", self.name))
    }
}

// ============================================
// MAIN CONFIGURATION
// ============================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunnerConfig {
    /// RPC URL per chain id; `RPC_URL_<chainId>` in the environment wins
    #[serde(default)]
    pub rpc: BTreeMap<String, String>,

    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    #[serde(default)]
    pub tasks: Vec<TaskConfig>,
}

impl RunnerConfig {
    /// Load `.env`, then parse the TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        dotenvy::dotenv().ok();

        let path = path.as_ref();
        let content = fs::read_to_string(path).wrap_err_with(|| format!("reading {}", path.display()))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn task(&self, name: &str) -> Result<&TaskConfig> {
        self.tasks
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| eyre!("no task named {:?} (known: {})", name, self.task_names().join(", ")))
    }

    pub fn task_names(&self) -> Vec<&str> {
        self.tasks.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn rpc_url(&self, chain_id: u64) -> Result<String> {
        if let Ok(url) = env::var(format!("RPC_URL_{}", chain_id)) {
            if !url.trim().is_empty() {
                return Ok(url);
            }
        }
        self.rpc
            .get(&chain_id.to_string())
            .cloned()
            .ok_or_else(|| eyre!("no RPC URL for chain {} (set [rpc].{} or RPC_URL_{})", chain_id, chain_id, chain_id))
    }

    /// Check every task's arguments and that each chain it needs has an RPC
    pub fn validate(&self) -> Result<()> {
        if !(MIN_HTTP_TIMEOUT_SECS..=MAX_HTTP_TIMEOUT_SECS).contains(&self.http_timeout_secs) {
            return Err(eyre!(
                "httpTimeoutSecs must be within {}..={} (currently {})",
                MIN_HTTP_TIMEOUT_SECS,
                MAX_HTTP_TIMEOUT_SECS,
                self.http_timeout_secs
            ));
        }

        let mut names = HashSet::new();
        for task in &self.tasks {
            if !names.insert(task.name.as_str()) {
                return Err(eyre!("duplicate task name {:?}", task.name));
            }
            task.spec.validate().wrap_err_with(|| format!("task {}", task.name))?;
            for chain in task.chains() {
                self.rpc_url(chain).wrap_err_with(|| format!("task {}", task.name))?;
            }
        }
        Ok(())
    }

    pub fn print_summary(&self) {
        println!("╔════════════════════════════════════════════════════════════╗");
        println!("║                  KEEPERS - CONFIGURATION                   ║");
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ HTTP Timeout:      {:<40} ║", format!("{}s", self.http_timeout_secs));
        println!("║ Chains:            {:<40} ║", self.rpc.keys().cloned().collect::<Vec<_>>().join(", "));
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ TASKS                                                      ║");
        for task in &self.tasks {
            let target = match task.relay_to {
                Some(destination) => format!("{} -> {}", task.chain_id, destination),
                None => task.chain_id.to_string(),
            };
            println!("║ • {:<28} {:<18} {:>8} ║", task.name, task.spec.kind(), target);
        }
        println!("╚════════════════════════════════════════════════════════════╝");
    }
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    const CONFIG: &str = r#"
        httpTimeoutSecs = 8

        [rpc]
        1 = "https://eth.llamarpc.com"
        42161 = "https://arb1.arbitrum.io/rpc"

        [[tasks]]
        name = "magic-ape"
        chainId = 1
        kind = "magic-ape"
        [tasks.args]
        execAddress = "0x588d402C868aDD9053f8F0098c2DC3443c991d17"
        intervalInSeconds = 3600

        [[tasks]]
        name = "xf33d-kava"
        chainId = 42161
        relayTo = 1
        kind = "xf33d"
        [tasks.args]
        intervalInSeconds = 86400
        destinationChain = 177
        chainlinkOracle = "0x639Fe6ab55C921f74e7fac1ee960C0B6293ba612"
    "#;

    #[test]
    fn test_parses_tasks() {
        let config = RunnerConfig::from_toml(CONFIG).unwrap();
        assert_eq!(config.http_timeout(), Duration::from_secs(8));
        assert_eq!(config.task_names(), vec!["magic-ape", "xf33d-kava"]);

        let task = config.task("xf33d-kava").unwrap();
        assert_eq!(task.spec.kind(), "xf33d");
        assert_eq!(task.chains(), vec![42161, 1]);
        assert_ok!(config.validate());
    }

    #[test]
    fn test_unknown_task_lists_known_ones() {
        let config = RunnerConfig::from_toml(CONFIG).unwrap();
        let err = config.task("nope").unwrap_err().to_string();
        assert!(err.contains("magic-ape"));
    }

    #[test]
    fn test_missing_rpc_is_rejected() {
        let mut config = RunnerConfig::from_toml(CONFIG).unwrap();
        config.rpc.remove("1");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_timeout_bounds() {
        let mut config = RunnerConfig::from_toml(CONFIG).unwrap();
        config.http_timeout_secs = 30;
        assert!(config.validate().is_err());

        let defaults = RunnerConfig::from_toml("").unwrap();
        assert_eq!(defaults.http_timeout_secs, 10);
        assert!(defaults.tasks.is_empty());
    }

    #[test]
    fn test_invalid_args_name_the_task() {
        let config = RunnerConfig::from_toml(
            r#"
            [rpc]
            1 = "https://eth.llamarpc.com"

            [[tasks]]
            name = "bad-ape"
            chainId = 1
            kind = "magic-ape"
            [tasks.args]
            execAddress = "0x0000000000000000000000000000000000000000"
            intervalInSeconds = 3600
            "#,
        )
        .unwrap();
        let err = format!("{:#}", config.validate().unwrap_err());
        assert!(err.contains("bad-ape"));
    }
}
