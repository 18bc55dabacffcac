//! # Workflows Module
//!
//! End-to-end procedures built from the lower layers.
//!
//! ## Overview
//!
//! A workflow takes a validated [`RunConfig`](crate::engine::config::RunConfig) (or a log
//! directory of a previous run) and carries it through every stage: dataset
//! provisioning, model assembly, training and evaluation. Collaborators that touch the
//! outside world (the remote content store and the sample validator) are passed in, as is
//! the device the backend computes on.
//!
//! - **Training Workflow** ([`train`]) - Provision, build or restore the potential, train,
//!   then evaluate the best snapshot on the test split
//! - **Test Workflow** ([`test`]) - Re-evaluate a finished run from its log directory

pub mod test;
pub mod train;

#[cfg(test)]
pub(crate) mod testing;

/// Resolved run configuration written to the log directory.
pub const INPUT_FILE: &str = "input.toml";
/// Model hyperparameters needed to rebuild a snapshot's architecture.
pub const MODEL_CONFIG_FILE: &str = "model-config.json";
/// Split indices of the run.
pub const SPLITS_FILE: &str = "splits.json";
