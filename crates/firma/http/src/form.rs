//! Sign request form parsing.

use std::collections::HashMap;

use axum::extract::{Form, FromRequest, Multipart, Request};
use axum::http::header;
use firma_core::{PdfSource, SignRequest};

use crate::ApiError;

const PDF_URL_FIELDS: &[&str] = &["pdf_url"];
const P12_URL_FIELDS: &[&str] = &["P12_URL", "p12_url"];
const P12_PASSWORD_FIELDS: &[&str] = &["P12_PASSWORD", "p12_password"];
const LOGO_URL_FIELDS: &[&str] = &["logo_url", "LOGO_URL"];

/// Multipart part carrying an uploaded source document.
pub const PDF_FILE_FIELD: &str = "pdf_file";

/// Raw fields of a `POST /sign_pdf` body, form-encoded or multipart.
#[derive(Debug, Default)]
pub struct SignForm {
    fields: HashMap<String, String>,
    upload: Option<Upload>,
}

#[derive(Debug)]
struct Upload {
    file_name: String,
    bytes: Vec<u8>,
}

impl SignForm {
    /// Validate the fields into a request. No I/O happens here.
    pub fn into_sign_request(mut self) -> Result<SignRequest, ApiError> {
        let pdf = match self.upload.take() {
            Some(upload) if !upload.bytes.is_empty() => PdfSource::Inline {
                file_name: upload.file_name,
                bytes: upload.bytes,
            },
            _ => PdfSource::Url(required(self.value(PDF_URL_FIELDS), "pdf_url")?),
        };
        let p12_url = required(self.value(P12_URL_FIELDS), "P12_URL")?;
        // Empty passphrases are valid for PKCS#12.
        let p12_password = self
            .raw(P12_PASSWORD_FIELDS)
            .map(str::to_owned)
            .ok_or_else(|| missing("P12_PASSWORD"))?;
        let logo_url = self.value(LOGO_URL_FIELDS).map(str::to_owned);

        Ok(SignRequest {
            pdf,
            p12_url,
            p12_password,
            logo_url,
        })
    }

    /// First alias present, as sent.
    fn raw(&self, names: &[&str]) -> Option<&str> {
        names
            .iter()
            .find_map(|name| self.fields.get(*name))
            .map(String::as_str)
    }

    /// First alias with a non-blank value, trimmed.
    fn value(&self, names: &[&str]) -> Option<&str> {
        names
            .iter()
            .filter_map(|name| self.fields.get(*name))
            .map(|value| value.trim())
            .find(|value| !value.is_empty())
    }

    async fn from_multipart(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await.map_err(bad_body)? {
            let Some(name) = field.name().map(str::to_owned) else {
                continue;
            };

            if name == PDF_FILE_FIELD {
                let file_name = field.file_name().unwrap_or_default().to_owned();
                let bytes = field.bytes().await.map_err(bad_body)?;
                form.upload = Some(Upload {
                    file_name,
                    bytes: bytes.to_vec(),
                });
            } else {
                let value = field.text().await.map_err(bad_body)?;
                form.fields.insert(name, value);
            }
        }

        Ok(form)
    }
}

impl<S> FromRequest<S> for SignForm
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("multipart/form-data"));

        if is_multipart {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| ApiError::BadRequest(e.body_text()))?;
            Self::from_multipart(multipart).await
        } else {
            let Form(fields) = Form::<HashMap<String, String>>::from_request(req, state)
                .await
                .map_err(|e| ApiError::BadRequest(e.body_text()))?;
            Ok(Self {
                fields,
                upload: None,
            })
        }
    }
}

fn required(value: Option<&str>, name: &str) -> Result<String, ApiError> {
    value.map(str::to_owned).ok_or_else(|| missing(name))
}

fn missing(name: &str) -> ApiError {
    ApiError::BadRequest(format!("missing required field: {name}"))
}

fn bad_body(e: axum::extract::multipart::MultipartError) -> ApiError {
    ApiError::BadRequest(e.body_text())
}
