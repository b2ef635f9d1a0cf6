pub mod memory;
pub mod registry;

pub use memory::{MemoryStore, StoreError, StoreLimits, UserRecord};
