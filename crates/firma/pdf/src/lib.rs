//! Firma PDF
//!
//! Renders the visible signature block, merges it onto the last page of a
//! source document, and records signature metadata.

mod compose;
mod metadata;
mod overlay;
mod text;
mod xobject;

pub use compose::*;
pub use metadata::*;
pub use overlay::*;
pub use text::*;

pub use lopdf;
