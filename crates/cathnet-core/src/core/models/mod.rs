//! # Core Models Module
//!
//! Data structures describing the mdCATH source collection.
//!
//! A domain file holds one [`domain::DomainRecord`]: the static topology of a CATH domain
//! (atomic numbers, residue and chain counts) and, per simulation temperature and replica,
//! the trajectory arrays together with the per-replica descriptors the dataset filters use.
//! A [`sample::SampleView`] is a borrowed view of a single frame.

pub mod domain;
pub mod sample;
