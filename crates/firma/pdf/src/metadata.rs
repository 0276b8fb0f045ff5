//! Document information dictionary entries.

use firma_core::{DocumentMetadata, MetadataKey, PipelineError, PipelineResult};
use lopdf::{Dictionary, Document, IncrementalDocument, Object};

use crate::text::{decode_text_string, text_string};

/// Write `metadata` into the document information dictionary, creating it
/// if the document has none. Existing entries with other keys are kept.
pub fn attach_metadata(doc: &mut Document, metadata: &DocumentMetadata) -> PipelineResult<()> {
    let info_id = match doc.trailer.get(b"Info").ok().cloned() {
        Some(Object::Reference(id)) if doc.get_dictionary(id).is_ok() => id,
        Some(Object::Dictionary(dict)) => doc.add_object(dict),
        _ => doc.add_object(Dictionary::new()),
    };
    doc.trailer.set("Info", info_id);

    let info = doc
        .get_object_mut(info_id)
        .and_then(|object| object.as_dict_mut())
        .map_err(|e| PipelineError::Signing(format!("failed to update document info: {e}")))?;

    for (key, value) in metadata.iter() {
        info.set(key.pdf_name(), text_string(&value.render()));
    }

    tracing::debug!(entries = metadata.len(), "metadata attached");
    Ok(())
}

/// Append `metadata` to a serialized document as an incremental update.
///
/// `signed` is the exact prefix of the returned bytes, so a signature over it
/// stays verifiable against the output.
pub fn append_metadata(signed: Vec<u8>, metadata: &DocumentMetadata) -> PipelineResult<Vec<u8>> {
    let previous = Document::load_mem(&signed)
        .map_err(|e| PipelineError::Signing(format!("failed to reload signed document: {e}")))?;
    let info_id = match previous.trailer.get(b"Info") {
        Ok(Object::Reference(id)) if previous.get_dictionary(*id).is_ok() => Some(*id),
        _ => None,
    };
    let version = previous.version.clone();
    let signed_len = signed.len();

    let mut update = IncrementalDocument::create_from(signed, previous);
    update.new_document.version = version;
    if let Some(id) = info_id {
        update
            .opt_clone_object_to_new_document(id)
            .map_err(|e| PipelineError::Signing(format!("failed to copy document info: {e}")))?;
    }
    attach_metadata(&mut update.new_document, metadata)?;

    let mut buf = Vec::with_capacity(signed_len + 1024);
    update
        .save_to(&mut buf)
        .map_err(|e| PipelineError::Signing(format!("failed to append document info: {e}")))?;

    tracing::debug!(signed_len, total_len = buf.len(), "metadata appended");
    Ok(buf)
}

/// Read a metadata entry back from the information dictionary.
pub fn read_metadata(doc: &Document, key: MetadataKey) -> Option<String> {
    let info = match doc.trailer.get(b"Info").ok()? {
        Object::Reference(id) => doc.get_dictionary(*id).ok()?,
        Object::Dictionary(dict) => dict,
        _ => return None,
    };
    match info.get(key.pdf_name().as_bytes()).ok()? {
        Object::String(bytes, _) => Some(decode_text_string(bytes)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_document;
    use crate::save_document;
    use firma_core::MetadataValue;
    use firma_fixtures::{page_marker, sample_pdf, sample_pdf_with_title};

    fn metadata() -> DocumentMetadata {
        DocumentMetadata::new()
            .with(MetadataKey::Signature, MetadataValue::Hex("deadbeef".into()))
            .with(MetadataKey::Signer, MetadataValue::Text("José Peña".into()))
    }

    #[test]
    fn test_creates_info_dictionary() {
        let mut doc = load_document(&sample_pdf(1)).unwrap();
        assert!(doc.trailer.get(b"Info").is_err());

        attach_metadata(&mut doc, &metadata()).unwrap();
        let doc = load_document(&save_document(&mut doc).unwrap()).unwrap();

        assert_eq!(
            read_metadata(&doc, MetadataKey::Signature).as_deref(),
            Some("deadbeef")
        );
        assert_eq!(
            read_metadata(&doc, MetadataKey::Signer).as_deref(),
            Some("José Peña")
        );
        assert_eq!(read_metadata(&doc, MetadataKey::Producer), None);
    }

    #[test]
    fn test_keeps_existing_entries() {
        let mut doc = load_document(&sample_pdf_with_title(2, "Contrato")).unwrap();
        attach_metadata(&mut doc, &metadata()).unwrap();
        let doc = load_document(&save_document(&mut doc).unwrap()).unwrap();

        let info_id = doc.trailer.get(b"Info").unwrap().as_reference().unwrap();
        let info = doc.get_dictionary(info_id).unwrap();
        let Object::String(title, _) = info.get(b"Title").unwrap() else {
            panic!("title should be a string");
        };
        assert_eq!(title, b"Contrato");
        assert!(info.has(b"Signature"));
    }

    #[test]
    fn test_append_keeps_signed_prefix() {
        let signed = sample_pdf_with_title(3, "Contrato");

        let out = append_metadata(signed.clone(), &metadata()).unwrap();

        assert!(out.len() > signed.len());
        assert_eq!(&out[..signed.len()], signed.as_slice());

        let doc = load_document(&out).unwrap();
        assert_eq!(doc.get_pages().len(), 3);
        assert_eq!(
            read_metadata(&doc, MetadataKey::Signature).as_deref(),
            Some("deadbeef")
        );
        let info_id = doc.trailer.get(b"Info").unwrap().as_reference().unwrap();
        assert!(doc.get_dictionary(info_id).unwrap().has(b"Title"));
        assert!(String::from_utf8_lossy(&out).contains(&page_marker(3)));
    }

    #[test]
    fn test_append_creates_info_when_absent() {
        let signed = sample_pdf(1);

        let out = append_metadata(signed.clone(), &metadata()).unwrap();

        assert_eq!(&out[..signed.len()], signed.as_slice());
        let doc = load_document(&out).unwrap();
        assert_eq!(
            read_metadata(&doc, MetadataKey::Signer).as_deref(),
            Some("José Peña")
        );
    }

    #[test]
    fn test_append_rejects_garbage() {
        assert!(append_metadata(b"not a pdf".to_vec(), &metadata()).is_err());
    }
}
