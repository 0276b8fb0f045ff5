//! Merging the signature block onto the last page.

use std::collections::BTreeSet;

use firma_core::{PipelineError, PipelineResult};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};

use crate::Overlay;
use crate::overlay::media_box;

/// Name under which the overlay form is registered on the last page.
pub const OVERLAY_XOBJECT_NAME: &str = "FirmaSello";

/// Guard against cyclic `/Parent` chains.
const MAX_PAGE_TREE_DEPTH: usize = 64;

/// Parse a source document.
///
/// Encrypted documents and documents without pages are rejected.
pub fn load_document(bytes: &[u8]) -> PipelineResult<Document> {
    let doc = Document::load_mem(bytes)
        .map_err(|e| PipelineError::DocumentParse(format!("failed to parse PDF: {e}")))?;

    if doc.trailer.get(b"Encrypt").is_ok() {
        return Err(PipelineError::DocumentParse("document is encrypted".into()));
    }
    if doc.get_pages().is_empty() {
        return Err(PipelineError::DocumentParse("document has no pages".into()));
    }

    Ok(doc)
}

/// Serialize a document.
pub fn save_document(doc: &mut Document) -> PipelineResult<Vec<u8>> {
    let mut buf = Vec::new();
    doc.save_to(&mut buf)
        .map_err(|e| PipelineError::DocumentParse(format!("failed to serialize PDF: {e}")))?;
    Ok(buf)
}

/// Draw `overlay` on top of the last page of `doc`.
///
/// All other pages, and the original content streams of the last page, are
/// left untouched. The page count does not change.
pub fn compose(mut doc: Document, overlay: Overlay) -> PipelineResult<Document> {
    let pages = doc.get_pages();
    let (&page_number, &page_id) = pages
        .iter()
        .next_back()
        .ok_or_else(|| PipelineError::DocumentParse("document has no pages".into()))?;

    let form_id = import_overlay(&mut doc, overlay)?;

    let mut resources = inherited_resources(&doc, page_id)?;
    let mut xobjects = match resources.get(b"XObject") {
        Ok(object) => resolve_dictionary(&doc, object)?,
        Err(_) => Dictionary::new(),
    };
    let name = unique_name(&xobjects);
    xobjects.set(name.as_str(), form_id);
    resources.set("XObject", xobjects);

    let contents = existing_contents(&doc, page_id)?;
    let prefix_id = doc.add_object(Stream::new(dictionary! {}, b"q\n".to_vec()));
    let suffix_id = doc.add_object(Stream::new(dictionary! {}, draw_form(&name)?));

    let mut new_contents = Vec::with_capacity(contents.len() + 2);
    new_contents.push(Object::Reference(prefix_id));
    new_contents.extend(contents);
    new_contents.push(Object::Reference(suffix_id));

    let page = doc
        .get_object_mut(page_id)
        .and_then(|object| object.as_dict_mut())
        .map_err(structure_error)?;
    page.set("Resources", resources);
    page.set("Contents", new_contents);

    tracing::debug!(
        page = page_number,
        pages = pages.len(),
        xobject = %name,
        "overlay merged onto last page"
    );

    Ok(doc)
}

/// Copy the overlay page into `doc` as a Form XObject.
fn import_overlay(doc: &mut Document, overlay: Overlay) -> PipelineResult<ObjectId> {
    let mut source = overlay.into_document();
    source.renumber_objects_with(doc.max_id + 1);

    let page_id = *source
        .get_pages()
        .values()
        .next()
        .ok_or_else(|| PipelineError::Render("overlay has no page".into()))?;
    let content = source.get_page_content(page_id).map_err(render_error)?;

    let page = source.get_dictionary(page_id).map_err(render_error)?;
    let resources = match page.get(b"Resources") {
        Ok(object) => resolve_dictionary(&source, object)?,
        Err(_) => Dictionary::new(),
    };

    let mut referenced = BTreeSet::new();
    for (_, value) in resources.iter() {
        collect_references(&source, value, &mut referenced);
    }
    for id in referenced {
        let object = source.get_object(id).map_err(render_error)?.clone();
        doc.objects.insert(id, object);
        doc.max_id = doc.max_id.max(id.0);
    }

    let form = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Form",
            "FormType" => 1,
            "BBox" => media_box(),
            "Resources" => resources,
        },
        content,
    );
    Ok(doc.add_object(form))
}

/// Every object reachable from `object` through references.
fn collect_references(doc: &Document, object: &Object, seen: &mut BTreeSet<ObjectId>) {
    match object {
        Object::Reference(id) => {
            if seen.insert(*id) {
                if let Ok(target) = doc.get_object(*id) {
                    collect_references(doc, target, seen);
                }
            }
        }
        Object::Array(items) => {
            for item in items {
                collect_references(doc, item, seen);
            }
        }
        Object::Dictionary(dict) => {
            for (_, value) in dict.iter() {
                collect_references(doc, value, seen);
            }
        }
        Object::Stream(stream) => {
            for (_, value) in stream.dict.iter() {
                collect_references(doc, value, seen);
            }
        }
        _ => {}
    }
}

/// The resources in effect for a page, following `/Parent` inheritance.
fn inherited_resources(doc: &Document, page_id: ObjectId) -> PipelineResult<Dictionary> {
    let mut current = Some(page_id);
    for _ in 0..MAX_PAGE_TREE_DEPTH {
        let Some(id) = current else { break };
        let node = doc.get_dictionary(id).map_err(structure_error)?;
        if let Ok(resources) = node.get(b"Resources") {
            return resolve_dictionary(doc, resources);
        }
        current = node.get(b"Parent").and_then(|parent| parent.as_reference()).ok();
    }
    Ok(Dictionary::new())
}

fn resolve_dictionary(doc: &Document, object: &Object) -> PipelineResult<Dictionary> {
    match object {
        Object::Dictionary(dict) => Ok(dict.clone()),
        Object::Reference(id) => doc
            .get_dictionary(*id)
            .cloned()
            .map_err(structure_error),
        _ => Err(PipelineError::DocumentParse(
            "expected a dictionary in page resources".into(),
        )),
    }
}

/// The page's content stream references, in drawing order.
fn existing_contents(doc: &Document, page_id: ObjectId) -> PipelineResult<Vec<Object>> {
    let page = doc.get_dictionary(page_id).map_err(structure_error)?;
    Ok(match page.get(b"Contents") {
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Array(items)) => items.clone(),
            _ => vec![Object::Reference(*id)],
        },
        Ok(Object::Array(items)) => items.clone(),
        _ => Vec::new(),
    })
}

fn unique_name(xobjects: &Dictionary) -> String {
    let mut name = OVERLAY_XOBJECT_NAME.to_string();
    let mut suffix = 1;
    while xobjects.has(name.as_bytes()) {
        name = format!("{OVERLAY_XOBJECT_NAME}{suffix}");
        suffix += 1;
    }
    name
}

/// Close the state saved around the original content, then draw the form.
fn draw_form(name: &str) -> PipelineResult<Vec<u8>> {
    Content {
        operations: vec![
            Operation::new("Q", vec![]),
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![1.into(), 0.into(), 0.into(), 1.into(), 0.into(), 0.into()],
            ),
            Operation::new("Do", vec![Object::Name(name.as_bytes().to_vec())]),
            Operation::new("Q", vec![]),
        ],
    }
    .encode()
    .map(|mut bytes| {
        bytes.insert(0, b'\n');
        bytes
    })
    .map_err(render_error)
}

fn structure_error(err: lopdf::Error) -> PipelineError {
    PipelineError::DocumentParse(format!("malformed page tree: {err}"))
}

fn render_error(err: lopdf::Error) -> PipelineError {
    PipelineError::Render(format!("malformed overlay: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::OverlayContent;
    use chrono::{FixedOffset, TimeZone as _};
    use firma_core::ErrorKind;
    use firma_fixtures::{encrypted_pdf, page_marker, sample_pdf};

    fn overlay() -> Overlay {
        let signed_at = FixedOffset::west_opt(5 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 3, 7, 9, 5, 0)
            .unwrap();
        let logo = image::RgbImage::from_pixel(20, 10, image::Rgb([0, 0, 200]));
        Overlay::render(&OverlayContent {
            signer_name: "Maria Gomez",
            logo: Some(&logo),
            signed_at,
            label: "Firmado por:",
            qr_marker: "FIRMADO",
        })
        .unwrap()
    }

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    #[test]
    fn test_page_count_and_untouched_pages() {
        let source_bytes = sample_pdf(3);
        let source = load_document(&source_bytes).unwrap();
        let mut composed = compose(load_document(&source_bytes).unwrap(), overlay()).unwrap();

        let reloaded = load_document(&save_document(&mut composed).unwrap()).unwrap();
        let before = source.get_pages();
        let after = reloaded.get_pages();
        assert_eq!(after.len(), 3);

        for number in 1..=2u32 {
            assert_eq!(
                source.get_page_content(before[&number]).unwrap(),
                reloaded.get_page_content(after[&number]).unwrap(),
            );
        }

        let last = reloaded.get_page_content(after[&3]).unwrap();
        let original_last = source.get_page_content(before[&3]).unwrap();
        assert!(contains(&last, &original_last));
        assert!(contains(&last, b"/FirmaSello Do"));
        assert!(contains(&last, page_marker(3).as_bytes()));
        // Original content is drawn first.
        let original_at = last.windows(original_last.len()).position(|w| w == original_last.as_slice());
        let overlay_at = last.windows(14).position(|w| w == b"/FirmaSello Do");
        assert!(original_at < overlay_at);
    }

    #[test]
    fn test_last_page_keeps_inherited_font() {
        let mut composed = compose(load_document(&sample_pdf(1)).unwrap(), overlay()).unwrap();
        let doc = load_document(&save_document(&mut composed).unwrap()).unwrap();
        let page_id = doc.get_pages()[&1];

        let resources = inherited_resources(&doc, page_id).unwrap();
        let fonts = resolve_dictionary(&doc, resources.get(b"Font").unwrap()).unwrap();
        assert!(fonts.has(b"F1"));

        let xobjects = resolve_dictionary(&doc, resources.get(b"XObject").unwrap()).unwrap();
        let form_id = xobjects.get(b"FirmaSello").unwrap().as_reference().unwrap();
        let form = doc.get_object(form_id).unwrap().as_stream().unwrap();
        assert_eq!(form.dict.get(b"Subtype").unwrap().as_name().unwrap(), b"Form");

        let form_resources = form.dict.get(b"Resources").unwrap().as_dict().unwrap();
        let form_xobjects = form_resources.get(b"XObject").unwrap().as_dict().unwrap();
        for (_, image) in form_xobjects.iter() {
            let image_id = image.as_reference().unwrap();
            assert!(doc.get_object(image_id).unwrap().as_stream().is_ok());
        }
    }

    #[test]
    fn test_name_collision_gets_suffix() {
        let once = compose(load_document(&sample_pdf(1)).unwrap(), overlay()).unwrap();
        let mut twice = compose(once, overlay()).unwrap();
        let doc = load_document(&save_document(&mut twice).unwrap()).unwrap();
        let page_id = doc.get_pages()[&1];

        let content = doc.get_page_content(page_id).unwrap();
        assert!(contains(&content, b"/FirmaSello Do"));
        assert!(contains(&content, b"/FirmaSello1 Do"));
    }

    #[test]
    fn test_rejects_garbage() {
        let err = load_document(b"this is not a pdf").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DocumentParse);
    }

    #[test]
    fn test_rejects_encrypted() {
        let err = load_document(&encrypted_pdf()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DocumentParse);
    }

    #[test]
    fn test_rejects_empty_document() {
        let err = load_document(&sample_pdf(0)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DocumentParse);
    }
}
