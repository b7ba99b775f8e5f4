/// Monitoring engine module - handles one probe cycle per check
///
/// This module is responsible for:
/// - Validating stored check records
/// - Probing HTTP/HTTPS targets
/// - Classifying outcomes into up/down and deciding on alerts
/// - Scheduling a pipeline per check on every cycle
pub mod checker;
pub mod classifier;
pub mod pipeline;
pub mod scheduler;
pub mod types;
pub mod validation;


pub use checker::{HttpProber, OutcomeLatch, Prober};
pub use classifier::{Classification, classify};
pub use pipeline::{CheckPipeline, PipelineReport};
pub use scheduler::{CycleReport, MonitoringScheduler};
pub use types::{CheckOutcome, CheckRecord, CheckState, LogEntry};
pub use validation::validate_check;
