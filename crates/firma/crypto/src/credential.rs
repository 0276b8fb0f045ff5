//! PKCS#12 credential loading.

use firma_core::{PipelineError, PipelineResult};
use openssl::pkcs12::Pkcs12;
use openssl::pkey::{PKey, Private, Public};
use openssl::x509::X509;
use x509_parser::prelude::*;

/// A signing key and its certificate, decrypted from a PKCS#12 container.
///
/// Request-scoped: build one per request and drop it when the request ends.
pub struct Credential {
    key: PKey<Private>,
    certificate: X509,
    common_name: String,
}

impl Credential {
    /// Decrypt a PKCS#12 blob with `passphrase`.
    ///
    /// Only the leaf key and certificate are kept; chain certificates are
    /// ignored. The passphrase is not retained.
    pub fn from_pkcs12(der: &[u8], passphrase: &str) -> PipelineResult<Self> {
        let pkcs12 = Pkcs12::from_der(der)
            .map_err(|e| credential_error("malformed PKCS#12 container", e))?;

        let parsed = pkcs12
            .parse2(passphrase)
            .map_err(|e| credential_error("failed to decrypt PKCS#12 container", e))?;

        let key = parsed.pkey.ok_or_else(|| {
            PipelineError::Credential("PKCS#12 container holds no private key".into())
        })?;
        let certificate = parsed.cert.ok_or_else(|| {
            PipelineError::Credential("PKCS#12 container holds no certificate".into())
        })?;

        Self::from_parts(key, certificate)
    }

    /// Pair a key with its certificate, rejecting keys the certificate does
    /// not certify.
    pub fn from_parts(key: PKey<Private>, certificate: X509) -> PipelineResult<Self> {
        let cert_public = certificate
            .public_key()
            .map_err(|e| credential_error("failed to read certificate public key", e))?;
        if !cert_public.public_eq(&key) {
            return Err(PipelineError::Credential(
                "private key does not match certificate".into(),
            ));
        }

        let certificate_der = certificate
            .to_der()
            .map_err(|e| credential_error("failed to encode certificate", e))?;
        let common_name = subject_common_name(&certificate_der)?;

        tracing::debug!(signer = %common_name, key_bits = key.bits(), "loaded credential");

        Ok(Self {
            key,
            certificate,
            common_name,
        })
    }

    pub fn key(&self) -> &PKey<Private> {
        &self.key
    }

    pub fn certificate(&self) -> &X509 {
        &self.certificate
    }

    /// Subject common name, or the full subject when it has none.
    pub fn common_name(&self) -> &str {
        &self.common_name
    }

    /// The certificate's public key.
    pub fn public_key(&self) -> PipelineResult<PKey<Public>> {
        self.certificate
            .public_key()
            .map_err(|e| credential_error("failed to read certificate public key", e))
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("common_name", &self.common_name)
            .field("key_bits", &self.key.bits())
            .finish_non_exhaustive()
    }
}

/// Extract the subject CN from a DER certificate.
pub fn subject_common_name(cert_der: &[u8]) -> PipelineResult<String> {
    let (_, cert) = X509Certificate::from_der(cert_der)
        .map_err(|e| credential_error("failed to parse certificate DER", e))?;

    let subject = cert.subject();
    let common_name = subject
        .iter_common_name()
        .next()
        .and_then(|attr| attr.as_str().ok())
        .map(|cn| cn.trim().to_string())
        .filter(|cn| !cn.is_empty());

    Ok(common_name.unwrap_or_else(|| subject.to_string()))
}

fn credential_error(context: &str, err: impl std::fmt::Display) -> PipelineError {
    PipelineError::Credential(format!("{context}: {err}"))
}
