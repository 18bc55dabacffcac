//! # Model Module
//!
//! The neural network potential and the pieces it is built from.
//!
//! - **Hyperparameters** ([`config`]) - `burn` configuration for the potential, including
//!   the radial basis and activation choices
//! - **Radial Basis** ([`radial`]) - Distance expansions and the cosine cutoff envelope,
//!   evaluated together with their derivatives
//! - **Activations** ([`activation`]) - Nonlinearities paired with their derivatives
//! - **Potential** ([`potential`]) - The trainable module, producing molecular energies and
//!   analytic forces in one pass
//! - **Predictor** ([`predictor`]) - Query interface that derives forces by reverse-mode
//!   differentiation with respect to atomic positions

pub mod activation;
pub mod config;
pub mod potential;
pub mod predictor;
pub mod radial;
