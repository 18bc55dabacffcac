//! # cathnet Core Library
//!
//! Training and evaluation of neural network potentials on the mdCATH dataset of
//! protein domain molecular dynamics trajectories.
//!
//! ## Architectural Philosophy
//!
//! The library keeps a strict layering so that each stage of the pipeline can be tested
//! in isolation.
//!
//! - **[`core`]: The Foundation.** Stateless data models for per-domain trajectory
//!   records, the on-disk container format, and neighbor-list geometry.
//!
//! - **[`data`]: Dataset Provisioning.** Resolves and fetches domain files, filters and
//!   validates frames, partitions them into train/validation/test splits, computes
//!   normalization statistics and prepares batches on a worker pool.
//!
//! - **[`model`]: The Potential.** A `burn` module mapping atomic numbers and positions to
//!   molecular energies and forces.
//!
//! - **[`engine`]: The Logic Core.** Typed run configuration, the training loop, snapshot
//!   retention, the metric log, evaluation and error types.
//!
//! - **[`workflows`]: The Public API.** End-to-end procedures (`train`, `test`) that tie the
//!   layers together in the order configuration → dataset → model → train → evaluate.

pub mod core;
pub mod data;
pub mod engine;
pub mod model;
pub mod workflows;
