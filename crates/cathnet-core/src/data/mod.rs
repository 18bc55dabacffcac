//! # Data Module
//!
//! Dataset provisioning for the mdCATH collection.
//!
//! The entry point is [`provision::provision`], which resolves each requested domain file
//! (fetching it through a [`store::RemoteStore`] when absent), applies the configured
//! filters, validates every frame with a [`validity::SampleValidator`], partitions the
//! valid frames into train/validation/test splits and computes the energy normalization
//! statistics of the training split. Batches are then streamed by a
//! [`loader::BatchLoader`], which prepares neighbor lists on a worker pool.

pub mod batch;
pub mod dataset;
pub mod error;
pub mod loader;
pub mod provision;
pub mod split;
pub mod stats;
pub mod store;
pub mod validity;
