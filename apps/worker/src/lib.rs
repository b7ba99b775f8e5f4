//! Periodic HTTP/HTTPS health-check worker.
//!
//! Every cycle the worker reads all stored checks, probes each target,
//! classifies the result as up or down, persists the new state, alerts the
//! owner on transitions and appends the probe to the check's log. Logs are
//! compressed and truncated on a separate, slower cadence.

pub mod alerts;
pub mod clock;
pub mod config;
pub mod database;
pub mod error;
pub mod logs;
pub mod monitoring;
pub mod service;
pub mod sync;

#[cfg(test)]
mod testing;
