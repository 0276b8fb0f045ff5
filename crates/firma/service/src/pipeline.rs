//! Signing pipeline orchestration.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use firma_assets::{Fetcher, normalize_image};
use firma_core::{
    ConfigError, DocumentMetadata, MetadataKey, MetadataValue, OverlayConfig, PLACEHOLDER_PAYLOAD,
    PdfSource, PipelineError, PipelineFailure, PipelineResult, PipelineRun, PipelineState,
    SignRequest, SignedPayload, SignerConfig, signed_file_name,
};
use firma_crypto::{Credential, SignatureRecord};
use firma_pdf::{Overlay, OverlayContent, append_metadata, compose, load_document, save_document};

/// Value of the `/Producer` entry on signed documents.
const PRODUCER: &str = concat!("firmador ", env!("CARGO_PKG_VERSION"));

/// A signed document ready to be returned to the caller.
#[derive(Debug, Clone)]
pub struct SignedDocument {
    pub bytes: Vec<u8>,
    /// Download name: the source name with `_signed` before the extension.
    pub file_name: String,
    pub page_count: usize,
    pub signer: String,
    pub signature: SignatureRecord,
    /// Length of the prefix of `bytes` the signature covers; `None` when a
    /// placeholder payload was signed.
    pub signed_len: Option<usize>,
}

/// Runs signing requests.
///
/// Holds only configuration and the fetcher; every call builds its own
/// credential, overlay and document.
pub struct SigningPipeline<F> {
    fetcher: F,
    config: Arc<SignerConfig>,
    time_zone: FixedOffset,
}

impl<F: Fetcher> SigningPipeline<F> {
    pub fn new(fetcher: F, config: SignerConfig) -> Result<Self, ConfigError> {
        let time_zone = config.overlay.time_zone()?;
        Ok(Self {
            fetcher,
            config: Arc::new(config),
            time_zone,
        })
    }

    pub fn config(&self) -> &SignerConfig {
        &self.config
    }

    /// Sign a document, stamping the current time.
    pub async fn sign(&self, request: SignRequest) -> Result<SignedDocument, PipelineFailure> {
        self.sign_at(request, Utc::now()).await
    }

    /// Sign a document, stamping `now` in the configured time zone.
    pub async fn sign_at(
        &self,
        request: SignRequest,
        now: DateTime<Utc>,
    ) -> Result<SignedDocument, PipelineFailure> {
        let result = self.run(request, now).await;

        match &result {
            Ok(signed) => tracing::info!(
                file_name = %signed.file_name,
                pages = signed.page_count,
                signer = %signed.signer,
                bytes = signed.bytes.len(),
                "document signed"
            ),
            Err(failure) => tracing::error!(
                stage = %failure.stage,
                kind = %failure.kind(),
                error = %failure.error,
                "signing pipeline failed"
            ),
        }

        result
    }

    async fn run(
        &self,
        request: SignRequest,
        now: DateTime<Utc>,
    ) -> Result<SignedDocument, PipelineFailure> {
        let mut run = PipelineRun::new();
        run.advance();

        let file_name = signed_file_name(&request.pdf.file_name());
        let SignRequest {
            pdf,
            p12_url,
            p12_password,
            logo_url,
        } = request;

        let assets = match self.fetch_assets(pdf, &p12_url, logo_url.as_deref()).await {
            Ok(assets) => assets,
            Err(error) => return Err(run.fail(error)),
        };

        let job = SigningJob {
            assets,
            passphrase: p12_password,
            file_name,
            signed_at: now.with_timezone(&self.time_zone),
            overlay: self.config.overlay.clone(),
            payload: self.config.signature.payload,
        };

        tokio::task::spawn_blocking(move || job.run(run))
            .await
            .map_err(|e| PipelineFailure {
                stage: PipelineState::Failed,
                error: PipelineError::Render(format!("signing task aborted: {e}")),
            })?
    }

    /// Fetch the document, credential and logo concurrently; each once.
    async fn fetch_assets(
        &self,
        pdf: PdfSource,
        p12_url: &str,
        logo_url: Option<&str>,
    ) -> PipelineResult<Assets> {
        let pdf = async {
            match pdf {
                PdfSource::Url(url) => self.fetcher.fetch(&url).await,
                PdfSource::Inline { bytes, .. } => Ok(bytes),
            }
        };
        let logo = async {
            match logo_url {
                Some(url) => self.fetcher.fetch(url).await.map(Some),
                None => Ok(None),
            }
        };

        let (pdf, p12, logo) = tokio::try_join!(pdf, self.fetcher.fetch(p12_url), logo)?;
        tracing::debug!(
            pdf_len = pdf.len(),
            p12_len = p12.len(),
            logo_len = logo.as_ref().map(Vec::len),
            "assets fetched"
        );

        Ok(Assets { pdf, p12, logo })
    }
}

struct Assets {
    pdf: Vec<u8>,
    p12: Vec<u8>,
    logo: Option<Vec<u8>>,
}

/// The CPU-bound part of one run. Owns everything it touches.
struct SigningJob {
    assets: Assets,
    passphrase: String,
    file_name: String,
    signed_at: DateTime<FixedOffset>,
    overlay: OverlayConfig,
    payload: SignedPayload,
}

impl SigningJob {
    fn run(self, mut run: PipelineRun) -> Result<SignedDocument, PipelineFailure> {
        let credential = run.stage(PipelineState::LoadingCredential, || {
            Credential::from_pkcs12(&self.assets.p12, &self.passphrase)
        })?;

        let overlay = run.stage(PipelineState::Rendering, || {
            let logo = self
                .assets
                .logo
                .as_deref()
                .map(normalize_image)
                .transpose()?;
            Overlay::render(&OverlayContent {
                signer_name: credential.common_name(),
                logo: logo.as_ref(),
                signed_at: self.signed_at,
                label: &self.overlay.label,
                qr_marker: &self.overlay.qr_marker,
            })
        })?;

        let mut document = run.stage(PipelineState::Composing, || {
            compose(load_document(&self.assets.pdf)?, overlay)
        })?;
        let page_count = document.get_pages().len();

        let (bytes, signature, signed_len) = run.stage(PipelineState::Signing, || {
            let composed = save_document(&mut document)?;
            let (payload, signed_len) = match self.payload {
                SignedPayload::Document => (composed.as_slice(), Some(composed.len())),
                SignedPayload::Placeholder => (PLACEHOLDER_PAYLOAD, None),
            };
            let signature = SignatureRecord::sign(credential.key(), payload)?;

            let mut metadata = DocumentMetadata::new()
                .with(MetadataKey::Signature, MetadataValue::Hex(signature.hex()))
                .with(
                    MetadataKey::SignatureAlgorithm,
                    MetadataValue::Text(signature.algorithm().to_string()),
                )
                .with(
                    MetadataKey::SignedPayloadDigest,
                    MetadataValue::Hex(signature.payload_digest_hex()),
                )
                .with(
                    MetadataKey::Signer,
                    MetadataValue::Text(credential.common_name().to_string()),
                )
                .with(MetadataKey::SigningTime, MetadataValue::Date(self.signed_at))
                .with(MetadataKey::Producer, MetadataValue::Text(PRODUCER.to_string()));
            if let Some(len) = signed_len {
                metadata = metadata.with(MetadataKey::SignedLength, MetadataValue::Count(len as u64));
            }

            // The signed serialization stays the untouched prefix of the output.
            Ok((append_metadata(composed, &metadata)?, signature, signed_len))
        })?;

        run.advance();

        Ok(SignedDocument {
            bytes,
            file_name: self.file_name,
            page_count,
            signer: credential.common_name().to_string(),
            signature,
            signed_len,
        })
    }
}
