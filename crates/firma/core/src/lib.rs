//! Firma Core Types
//!
//! Error taxonomy, pipeline state machine, request model, document metadata
//! schema and configuration shared by the signing crates.

mod config;
mod error;
mod metadata;
mod request;
mod state;

pub use config::*;
pub use error::*;
pub use metadata::*;
pub use request::*;
pub use state::*;
