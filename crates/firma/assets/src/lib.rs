//! Firma Assets
//!
//! Retrieval of remote documents, credentials and logos, and logo
//! normalization for raster embedding.

mod fetch;
mod logo;
#[cfg(any(test, feature = "test-util"))]
mod memory;

pub use fetch::*;
pub use logo::*;
#[cfg(any(test, feature = "test-util"))]
pub use memory::*;
