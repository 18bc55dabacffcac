//! Spatial queries over atomic coordinates.
//!
//! Graph construction for the potential needs every atom pair inside the radial cutoff
//! window, and frame validation needs the closest contact in a frame. Both are answered by
//! the cell list in [`neighbors`].

pub mod neighbors;
