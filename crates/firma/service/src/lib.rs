//! Firma Service Layer
//!
//! Sequences fetching, credential loading, rendering, composing and signing
//! into one operation per request.

mod pipeline;

pub use pipeline::*;
