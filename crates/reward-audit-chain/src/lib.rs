// crates/reward-audit-chain/src/lib.rs
//
// Live collaborators for the audit engine: an archive-node reader and a
// Chopsticks-backed replay fork.

pub mod chopsticks;
pub mod decode;
pub mod dev_rpc;
pub mod substrate;

pub use chopsticks::{ChopsticksBackend, ChopsticksConfig, ChopsticksFork, ForkProcess};
pub use dev_rpc::DevRpcClient;
pub use substrate::{SubstrateClient, SubstrateReader, SubstrateState, CODE_KEY};
