mod tracing;

pub use crate::tracing::{LogFormat, init_with};
