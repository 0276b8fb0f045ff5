//! Signing HTTP handlers.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use firma_assets::Fetcher;
use firma_core::PipelineFailure;
use firma_service::{SignedDocument, SigningPipeline};
use serde::Serialize;
use tracing::Instrument as _;
use uuid::Uuid;

use crate::SignForm;

/// Content type of signed documents.
const PDF_CONTENT_TYPE: &str = "application/pdf";

/// Errors returned to HTTP clients as `{"error": "..."}`.
#[derive(Debug)]
pub enum ApiError {
    /// The request is incomplete or malformed; nothing was fetched.
    BadRequest(String),
    /// The signing pipeline failed.
    Pipeline(PipelineFailure),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<&'static str>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Self::BadRequest(error) => (StatusCode::BAD_REQUEST, ErrorBody { error, kind: None }),
            Self::Pipeline(failure) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody {
                    error: failure.to_string(),
                    kind: Some(failure.kind().as_str()),
                },
            ),
        };
        (status, Json(body)).into_response()
    }
}

/// Handle `POST /sign_pdf`.
pub async fn sign_handler<F>(
    State(pipeline): State<Arc<SigningPipeline<F>>>,
    form: SignForm,
) -> Result<Response, ApiError>
where
    F: Fetcher + 'static,
{
    let request_id = Uuid::new_v4();
    let span = tracing::info_span!("sign_pdf", %request_id);

    async move {
        let request = form.into_sign_request().inspect_err(|e| {
            tracing::warn!(error = ?e, "rejected sign request");
        })?;
        tracing::info!(?request, "sign request accepted");

        let signed = pipeline.sign(request).await.map_err(ApiError::Pipeline)?;
        Ok(pdf_response(signed))
    }
    .instrument(span)
    .await
}

/// Handle `GET /hola`.
pub async fn hello_handler() -> &'static str {
    "Hola, el servicio de firma está activo."
}

fn pdf_response(signed: SignedDocument) -> Response {
    let mut response = signed.bytes.into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(PDF_CONTENT_TYPE),
    );
    if let Ok(value) = HeaderValue::from_str(&content_disposition(&signed.file_name)) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    response
}

/// `attachment` disposition with an ASCII `filename` and, for names that
/// need it, an RFC 5987 `filename*`.
pub fn content_disposition(file_name: &str) -> String {
    let fallback: String = file_name
        .chars()
        .map(|c| match c {
            ' '..='~' if c != '"' && c != '\\' => c,
            _ => '_',
        })
        .collect();

    if fallback == file_name {
        format!("attachment; filename=\"{file_name}\"")
    } else {
        format!(
            "attachment; filename=\"{fallback}\"; filename*=UTF-8''{}",
            urlencoding::encode(file_name)
        )
    }
}
