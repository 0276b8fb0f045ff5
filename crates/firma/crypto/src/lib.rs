//! Firma Crypto
//!
//! PKCS#12 credential loading and RSA signatures over document payloads.

mod credential;
mod signature;

pub use credential::*;
pub use signature::*;
