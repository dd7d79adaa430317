//! DeepBook pool discovery, state reads and refresh tasks.

pub mod directory;
pub mod registry;
pub mod state;
pub mod store;
pub mod tx;
pub mod watcher;

pub use directory::PoolDirectory;
pub use registry::{
    DevInspectRegistry, FallbackRegistry, PoolRegistry, RegistryCall, RegistryCallEncoder,
    StaticRegistry,
};
pub use state::{PoolStateReader, PoolStatus};
pub use store::{FilePairStore, MemoryPairStore, PairStore, StoredPairs};
pub use tx::BcsCallEncoder;
pub use watcher::{Feed, Versioned, spawn_balance_watcher, spawn_pool_watcher};
