//! # Engine Module
//!
//! Training orchestration and evaluation of the potential.
//!
//! ## Overview
//!
//! The engine owns everything that happens between a provisioned dataset and a set of
//! test metrics: the typed run configuration, the epoch loop with its optimizer and
//! learning rate schedule, snapshot retention, the append-only metric log and the final
//! evaluation pass.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Builders and eager validation for the dataset, model
//!   and training sections of a run
//! - **Training** ([`trainer`]) - Epochs of AdamW updates followed by validation passes,
//!   driven by the [`state::TrainState`] machine
//! - **Schedule** ([`schedule`]) - Learning rate warmup and reduce-on-plateau
//! - **Snapshots** ([`checkpoint`]) - Top-K retention by validation loss and restoration
//! - **Run Log** ([`metrics`]) - `metrics.csv` rows and error accumulators
//! - **Evaluation** ([`evaluator`]) - Test metrics from the reverse-mode predictor
//! - **Devices** ([`device`]) - Backend aliases and accelerator visibility
//! - **Progress Monitoring** ([`progress`]) - Events for front ends
//! - **Error Handling** ([`error`]) - Engine-level error types

pub mod checkpoint;
pub mod config;
pub mod device;
pub mod error;
pub mod evaluator;
pub mod metrics;
pub mod progress;
pub mod schedule;
pub mod state;
pub mod trainer;
