//! # Core Module
//!
//! Fundamental building blocks shared by every other layer.
//!
//! - **Trajectory Records** ([`models`]) - Per-domain records of atomic numbers, coordinates,
//!   forces and energies grouped by temperature and replica
//! - **File I/O** ([`io`]) - Reading and writing the compressed domain container format
//! - **Geometry** ([`geometry`]) - Cell-list neighbor search and structural descriptors

pub mod geometry;
pub mod io;
pub mod models;
