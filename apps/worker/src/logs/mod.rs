/// Per-check probe logs
///
/// - `store`: the append/list/compress/truncate backend
/// - `logger`: writes one line per completed probe
/// - `rotation`: archives and truncates logs on its own cadence
pub mod logger;
pub mod rotation;
pub mod store;

pub use logger::CheckLogger;
pub use rotation::{LogRotator, RotationReport};
pub use store::{FileLogStore, LogStore};
