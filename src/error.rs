//! Error types for keeper evaluation
//!
//! Every variant ends up as the `message` of a non-executable result, so the
//! `Display` text is what an operator reads in the automation logs.

/// An error raised while evaluating a keeper function
#[derive(Debug, Clone, thiserror::Error)]
pub enum KeeperError {
    /// A read-only chain call failed
    #[error("rpc call failed: {0}")]
    Rpc(String),
    /// The node executed the call and it reverted
    #[error("rpc call failed (reverted): {0}")]
    Revert(String),
    /// A return value could not be decoded
    #[error("abi decoding failed: {0}")]
    Abi(String),
    /// An HTTP request failed (transport, timeout or status)
    #[error("{source_name} request failed: {message}")]
    Http {
        /// The upstream service (0x, odos, subgraph, ...)
        source_name: &'static str,
        /// The underlying error text
        message: String,
    },
    /// A swap aggregator refused or failed to quote
    #[error("{provider} quote failed: {message}")]
    Quote {
        /// The aggregator that was asked
        provider: &'static str,
        /// What the aggregator reported
        message: String,
    },
    /// An upstream response was missing a required field
    #[error("{source_name} response malformed: missing field `{field}`")]
    MalformedResponse {
        /// The upstream service
        source_name: &'static str,
        /// The field that was absent or unparsable
        field: &'static str,
    },
    /// A secret the function needs was never provisioned
    #[error("{0} not set in secrets")]
    MissingSecret(String),
    /// Invalid or missing configuration
    #[error("invalid configuration: {0}")]
    Config(String),
    /// A per-chain lookup has no entry for this chain
    #[error("chain {0} not supported")]
    UnsupportedChain(u64),
    /// The persistent store rejected a read or write
    #[error("storage error: {0}")]
    Storage(String),
}

impl KeeperError {
    /// Create a new rpc error
    #[allow(clippy::needless_pass_by_value)]
    pub fn rpc<T: ToString>(e: T) -> Self {
        KeeperError::Rpc(e.to_string())
    }

    /// Create a new revert error
    #[allow(clippy::needless_pass_by_value)]
    pub fn revert<T: ToString>(e: T) -> Self {
        KeeperError::Revert(e.to_string())
    }

    /// Whether the call itself reverted, as opposed to never reaching a node
    pub fn is_revert(&self) -> bool {
        matches!(self, KeeperError::Revert(_))
    }

    /// Create a new abi error
    #[allow(clippy::needless_pass_by_value)]
    pub fn abi<T: ToString>(e: T) -> Self {
        KeeperError::Abi(e.to_string())
    }

    /// Create a new http error for the given upstream
    #[allow(clippy::needless_pass_by_value)]
    pub fn http<T: ToString>(source_name: &'static str, e: T) -> Self {
        KeeperError::Http { source_name, message: e.to_string() }
    }

    /// Create a new quote error for the given aggregator
    #[allow(clippy::needless_pass_by_value)]
    pub fn quote<T: ToString>(provider: &'static str, e: T) -> Self {
        KeeperError::Quote { provider, message: e.to_string() }
    }

    /// Create a new config error
    #[allow(clippy::needless_pass_by_value)]
    pub fn config<T: ToString>(e: T) -> Self {
        KeeperError::Config(e.to_string())
    }

    /// Create a new storage error
    #[allow(clippy::needless_pass_by_value)]
    pub fn storage<T: ToString>(e: T) -> Self {
        KeeperError::Storage(e.to_string())
    }

    /// Shorthand for a missing response field
    pub fn missing(source_name: &'static str, field: &'static str) -> Self {
        KeeperError::MalformedResponse { source_name, field }
    }
}
