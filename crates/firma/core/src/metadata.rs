//! Document metadata schema.
//!
//! The signed document carries its signature as plain entries of the
//! document information dictionary. Only the keys below are ever written.

use chrono::{DateTime, FixedOffset};

/// Known metadata keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MetadataKey {
    /// Lowercase hex signature bytes.
    Signature,
    /// Signature algorithm identifier.
    SignatureAlgorithm,
    /// SHA-256 of the signed payload, lowercase hex.
    SignedPayloadDigest,
    /// Number of leading output bytes the signature covers. Absent when a
    /// placeholder payload was signed.
    SignedLength,
    /// Signer common name.
    Signer,
    /// Signing time.
    SigningTime,
    /// Producing software.
    Producer,
}

impl MetadataKey {
    pub const ALL: [MetadataKey; 7] = [
        Self::Signature,
        Self::SignatureAlgorithm,
        Self::SignedPayloadDigest,
        Self::SignedLength,
        Self::Signer,
        Self::SigningTime,
        Self::Producer,
    ];

    /// Name of the key in the information dictionary (without the slash).
    pub fn pdf_name(&self) -> &'static str {
        match self {
            Self::Signature => "Signature",
            Self::SignatureAlgorithm => "SignatureAlgorithm",
            Self::SignedPayloadDigest => "SignedPayloadDigest",
            Self::SignedLength => "SignedLength",
            Self::Signer => "Signer",
            Self::SigningTime => "SigningTime",
            Self::Producer => "Producer",
        }
    }
}

/// A typed metadata value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataValue {
    Text(String),
    Hex(String),
    Count(u64),
    Date(DateTime<FixedOffset>),
}

impl MetadataValue {
    /// Render the value as the text stored in the dictionary.
    ///
    /// Dates use the PDF date format `D:YYYYMMDDHHmmSS+HH'mm'`.
    pub fn render(&self) -> String {
        match self {
            Self::Text(text) | Self::Hex(text) => text.clone(),
            Self::Count(count) => count.to_string(),
            Self::Date(date) => pdf_date(date),
        }
    }
}

/// The metadata entries written to a signed document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentMetadata {
    entries: std::collections::BTreeMap<MetadataKey, MetadataValue>,
}

impl DocumentMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: MetadataKey, value: MetadataValue) -> Self {
        self.entries.insert(key, value);
        self
    }

    pub fn get(&self, key: MetadataKey) -> Option<&MetadataValue> {
        self.entries.get(&key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (MetadataKey, &MetadataValue)> {
        self.entries.iter().map(|(k, v)| (*k, v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn pdf_date(date: &DateTime<FixedOffset>) -> String {
    let offset = date.offset().local_minus_utc();
    let sign = if offset < 0 { '-' } else { '+' };
    let offset = offset.abs();
    format!(
        "D:{}{}{:02}'{:02}'",
        date.format("%Y%m%d%H%M%S"),
        sign,
        offset / 3600,
        (offset % 3600) / 60
    )
}
