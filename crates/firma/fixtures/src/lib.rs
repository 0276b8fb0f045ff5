//! Test fixtures: signing identities, PDFs and logo images.
//!
//! Only used from tests, so failures panic.

mod identity;
mod images;
mod pdf;

pub use identity::*;
pub use images::*;
pub use pdf::*;
