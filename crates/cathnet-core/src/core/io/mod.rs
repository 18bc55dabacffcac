//! Provides input/output functionality for mdCATH domain source files.
//!
//! Each CATH domain is stored in its own compressed container file. This module defines
//! the trait-based interface for reading and writing such files and the container format
//! itself.

pub mod container;
pub mod traits;
