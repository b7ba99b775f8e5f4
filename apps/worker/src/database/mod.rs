/// Storage of check records
///
/// Records are opaque JSON values to the store; only the validator gives
/// them meaning.
pub mod persister;
pub mod repository;

pub use persister::StatePersister;
pub use repository::{CheckStore, FileCheckStore};

/// Category holding check definitions
pub const CHECKS: &str = "checks";
