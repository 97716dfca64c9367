//! Keepers
//!
//! Off-chain keeper functions for a DeFi protocol. Each function reads chain
//! state, optionally prices a swap through an aggregator, applies guards and
//! answers whether the automation network should execute calls now.
//!
//! - `functions`: one module per keeper function
//! - `guards`: readiness gate, slippage and APY cap
//! - `quotes`: swap aggregator clients
//! - `chain`: read-only chain access and contract interfaces
//! - `crosschain`: LayerZero relay of produced calls

pub mod chain;
pub mod config;
pub mod context;
pub mod crosschain;
pub mod error;
pub mod functions;
pub mod gm;
pub mod guards;
pub mod quotes;
pub mod registry;
pub mod result;
pub mod store;
pub mod subgraph;

pub use context::KeeperContext;
pub use error::KeeperError;
pub use functions::{build_keeper, run_keeper, Keeper, KeeperSpec};
pub use result::{CallData, KeeperResult};
