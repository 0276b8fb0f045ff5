//! RSA PKCS#1 v1.5 / SHA-256 signatures.

use firma_core::{PipelineError, PipelineResult};
use openssl::hash::MessageDigest;
use openssl::pkey::{HasPublic, Id, PKeyRef, Private};
use openssl::rsa::Padding;
use openssl::sign::{Signer, Verifier};
use sha2::{Digest, Sha256};

/// Algorithm identifier recorded alongside every signature.
pub const SIGNATURE_ALGORITHM: &str = "sha256WithRSAEncryption";

/// A signature over a byte payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureRecord {
    bytes: Vec<u8>,
    payload_digest: [u8; 32],
}

impl SignatureRecord {
    /// Sign `payload` with an RSA key.
    ///
    /// Fails with a signing error for any non-RSA key.
    pub fn sign(key: &PKeyRef<Private>, payload: &[u8]) -> PipelineResult<Self> {
        if key.id() != Id::RSA {
            return Err(PipelineError::Signing(format!(
                "unsupported {} key, expected RSA",
                key_type_name(key.id())
            )));
        }

        let mut signer = Signer::new(MessageDigest::sha256(), key).map_err(signing_error)?;
        signer
            .set_rsa_padding(Padding::PKCS1)
            .map_err(signing_error)?;
        signer.update(payload).map_err(signing_error)?;
        let bytes = signer.sign_to_vec().map_err(signing_error)?;

        tracing::debug!(
            payload_len = payload.len(),
            signature_len = bytes.len(),
            "payload signed"
        );

        Ok(Self {
            bytes,
            payload_digest: Sha256::digest(payload).into(),
        })
    }

    /// Check the signature against `payload` with `public_key`.
    pub fn verify<T: HasPublic>(
        &self,
        public_key: &PKeyRef<T>,
        payload: &[u8],
    ) -> PipelineResult<bool> {
        let mut verifier =
            Verifier::new(MessageDigest::sha256(), public_key).map_err(signing_error)?;
        verifier
            .set_rsa_padding(Padding::PKCS1)
            .map_err(signing_error)?;
        verifier.update(payload).map_err(signing_error)?;
        verifier.verify(&self.bytes).map_err(signing_error)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Signature as lowercase hex.
    pub fn hex(&self) -> String {
        hex_encode(&self.bytes)
    }

    /// SHA-256 of the signed payload as lowercase hex.
    pub fn payload_digest_hex(&self) -> String {
        hex_encode(&self.payload_digest)
    }

    pub fn algorithm(&self) -> &'static str {
        SIGNATURE_ALGORITHM
    }
}

/// Encode bytes as lowercase hex.
pub fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Decode a hex string. Returns `None` on odd length or non-hex input.
pub fn hex_decode(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok())
        .collect()
}

fn key_type_name(id: Id) -> &'static str {
    if id == Id::EC {
        "EC"
    } else if id == Id::DSA {
        "DSA"
    } else if id == Id::ED25519 {
        "Ed25519"
    } else {
        "unknown"
    }
}

fn signing_error(err: openssl::error::ErrorStack) -> PipelineError {
    PipelineError::Signing(err.to_string())
}
