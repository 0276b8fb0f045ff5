//! Sign request model.

/// Default name used when the source carries no usable file name.
const FALLBACK_FILE_NAME: &str = "document.pdf";

/// Where the source document comes from.
#[derive(Clone)]
pub enum PdfSource {
    /// Fetched over HTTP.
    Url(String),
    /// Uploaded with the request.
    Inline { file_name: String, bytes: Vec<u8> },
}

impl PdfSource {
    /// File name of the source document.
    pub fn file_name(&self) -> String {
        match self {
            Self::Url(url) => file_name_from_url(url),
            Self::Inline { file_name, .. } if !file_name.trim().is_empty() => {
                sanitize_file_name(file_name)
            }
            Self::Inline { .. } => FALLBACK_FILE_NAME.to_string(),
        }
    }
}

impl std::fmt::Debug for PdfSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Url(url) => f.debug_tuple("Url").field(url).finish(),
            Self::Inline { file_name, bytes } => f
                .debug_struct("Inline")
                .field("file_name", file_name)
                .field("len", &bytes.len())
                .finish(),
        }
    }
}

/// A validated signing request.
///
/// Constructed per inbound request and dropped when it completes.
#[derive(Clone)]
pub struct SignRequest {
    pub pdf: PdfSource,
    pub p12_url: String,
    pub p12_password: String,
    pub logo_url: Option<String>,
}

impl std::fmt::Debug for SignRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignRequest")
            .field("pdf", &self.pdf)
            .field("p12_url", &self.p12_url)
            .field("p12_password", &"<redacted>")
            .field("logo_url", &self.logo_url)
            .finish()
    }
}

/// Output file name for a signed document: `_signed` inserted before the
/// extension of `source`.
pub fn signed_file_name(source: &str) -> String {
    let name = if source.trim().is_empty() {
        FALLBACK_FILE_NAME
    } else {
        source
    };

    match name.rfind('.') {
        Some(dot) if dot > 0 => format!("{}_signed{}", &name[..dot], &name[dot..]),
        _ => format!("{name}_signed"),
    }
}

/// Base name of the path component of a URL, percent-decoded.
pub fn file_name_from_url(url: &str) -> String {
    let without_fragment = url.split('#').next().unwrap_or_default();
    let path = without_fragment.split('?').next().unwrap_or_default();
    let path = match path.find("://") {
        Some(scheme_end) => {
            let rest = &path[scheme_end + 3..];
            rest.find('/').map(|slash| &rest[slash..]).unwrap_or("")
        }
        None => path,
    };

    let segment = path.rsplit('/').next().unwrap_or_default();
    let decoded = urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| segment.to_string());

    if decoded.trim().is_empty() {
        FALLBACK_FILE_NAME.to_string()
    } else {
        sanitize_file_name(&decoded)
    }
}

/// Strip characters that would break a `Content-Disposition` header or a path.
fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    base.chars()
        .filter(|c| !c.is_control() && *c != '"')
        .collect()
}
