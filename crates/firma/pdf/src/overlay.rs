//! Signature block rendering.
//!
//! The block is a one-page PDF the size of a US Letter page:
//!
//! ```text
//!  +--------+ +------+  Firmado electrónicamente por:
//!  |   QR   | | logo |  Juan Carlos
//!  |        | +------+  Perez Lopez
//!  +--------+           07/03/2024 09:05
//! ```
//!
//! All positions are fixed, in points from the bottom-left corner.

use chrono::{DateTime, FixedOffset};
use firma_core::{PipelineError, PipelineResult};
use image::{GrayImage, Luma, RgbImage};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, StringFormat, Stream, dictionary};
use qrcode::{EcLevel, QrCode};

use crate::text::win_ansi_bytes;
use crate::xobject;

/// US Letter, in points.
pub const PAGE_WIDTH: f32 = 612.0;
pub const PAGE_HEIGHT: f32 = 792.0;

const QR_X: f32 = 40.0;
const QR_Y: f32 = 40.0;
const QR_SIZE: f32 = 90.0;
/// Pixels per QR module.
const QR_BOX_SIZE: usize = 10;
/// Quiet zone, in modules.
const QR_BORDER: usize = 4;

const LOGO_X: f32 = QR_X + QR_SIZE + 6.0;
const LOGO_Y: f32 = QR_Y + 15.0;
const LOGO_MAX_WIDTH: f32 = 80.0;
const LOGO_MAX_HEIGHT: f32 = 60.0;

const TEXT_X: f32 = LOGO_X + LOGO_MAX_WIDTH + 6.0;
const FONT_SIZE: f32 = 9.0;
const LINE_HEIGHT: f32 = 12.0;
const LABEL_Y: f32 = QR_Y + 70.0;
const NAME_Y: f32 = QR_Y + 56.0;

const FONT_NAME: &str = "FirmaF1";
const QR_NAME: &str = "FirmaQR";
const LOGO_NAME: &str = "FirmaLogo";

/// Inputs to the signature block.
#[derive(Debug, Clone)]
pub struct OverlayContent<'a> {
    pub signer_name: &'a str,
    /// Opaque logo, already flattened.
    pub logo: Option<&'a RgbImage>,
    pub signed_at: DateTime<FixedOffset>,
    pub label: &'a str,
    /// Text encoded into the QR symbol.
    pub qr_marker: &'a str,
}

/// A rendered signature block: a one-page document.
#[derive(Debug, Clone)]
pub struct Overlay {
    document: Document,
    page_id: ObjectId,
}

impl Overlay {
    /// Render the signature block.
    pub fn render(content: &OverlayContent<'_>) -> PipelineResult<Self> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let qr_id = doc.add_object(xobject::gray_image(&qr_image(content.qr_marker)?)?);
        let mut xobjects = Dictionary::new();
        xobjects.set(QR_NAME, qr_id);

        let mut operations = place_image(QR_NAME, QR_X, QR_Y, QR_SIZE, QR_SIZE);

        if let Some(logo) = content.logo {
            let logo_id = doc.add_object(xobject::rgb_image(logo)?);
            xobjects.set(LOGO_NAME, logo_id);

            let (width, height) = fit_logo(logo.width(), logo.height());
            let y = LOGO_Y + (LOGO_MAX_HEIGHT - height) / 2.0;
            operations.extend(place_image(LOGO_NAME, LOGO_X, y, width, height));
        }

        for (text, y) in text_lines(content) {
            operations.extend(text_line(&text, TEXT_X, y));
        }

        let encoded = Content { operations }
            .encode()
            .map_err(|e| PipelineError::Render(format!("failed to encode overlay content: {e}")))?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));

        let resources = dictionary! {
            "Font" => dictionary! {
                FONT_NAME => dictionary! {
                    "Type" => "Font",
                    "Subtype" => "Type1",
                    "BaseFont" => "Times-Bold",
                    "Encoding" => "WinAnsiEncoding",
                },
            },
            "XObject" => xobjects,
        };

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::Reference(page_id)],
                "Count" => 1,
                "MediaBox" => media_box(),
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        tracing::debug!(
            signer = %content.signer_name,
            has_logo = content.logo.is_some(),
            "rendered signature overlay"
        );

        Ok(Self {
            document: doc,
            page_id,
        })
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn page_id(&self) -> ObjectId {
        self.page_id
    }

    pub fn into_document(self) -> Document {
        self.document
    }
}

/// Split a signer name into two display lines.
///
/// Four or more words: the first two go on the first line (given names),
/// the rest on the second (surnames). Otherwise the first word goes on the
/// first line and the rest, possibly nothing, on the second.
pub fn split_signer_name(name: &str) -> (String, String) {
    let tokens: Vec<&str> = name.split_whitespace().collect();
    let head = if tokens.len() >= 4 { 2 } else { tokens.len().min(1) };
    (tokens[..head].join(" "), tokens[head..].join(" "))
}

/// Format a signing time as `DD/MM/YYYY HH:MM`.
pub fn format_timestamp(signed_at: &DateTime<FixedOffset>) -> String {
    signed_at.format("%d/%m/%Y %H:%M").to_string()
}

/// `[0 0 612 792]`
pub fn media_box() -> Vec<Object> {
    vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()]
}

/// Label, name lines and timestamp with their baselines. The second name
/// line is dropped when empty.
fn text_lines(content: &OverlayContent<'_>) -> Vec<(String, f32)> {
    let (first, second) = split_signer_name(content.signer_name);

    let mut lines = vec![(content.label.to_string(), LABEL_Y), (first, NAME_Y)];
    let mut y = NAME_Y - LINE_HEIGHT;
    if !second.is_empty() {
        lines.push((second, y));
        y -= LINE_HEIGHT;
    }
    lines.push((format_timestamp(&content.signed_at), y));
    lines
}

fn qr_image(data: &str) -> PipelineResult<GrayImage> {
    let code = QrCode::with_error_correction_level(data.as_bytes(), EcLevel::L)
        .map_err(|e| PipelineError::Render(format!("QR encoding failed: {e}")))?;

    let modules = code.width();
    let colors = code.to_colors();
    let side = ((modules + 2 * QR_BORDER) * QR_BOX_SIZE) as u32;

    Ok(GrayImage::from_fn(side, side, |x, y| {
        let mx = (x as usize / QR_BOX_SIZE).wrapping_sub(QR_BORDER);
        let my = (y as usize / QR_BOX_SIZE).wrapping_sub(QR_BORDER);
        let dark = mx < modules && my < modules && colors[my * modules + mx] == qrcode::Color::Dark;
        Luma([if dark { 0 } else { 255 }])
    }))
}

/// Scale a logo to fit the logo box, keeping its aspect ratio.
fn fit_logo(width: u32, height: u32) -> (f32, f32) {
    if width == 0 || height == 0 {
        return (0.0, 0.0);
    }
    let (w, h) = (width as f32, height as f32);
    let scale = (LOGO_MAX_WIDTH / w).min(LOGO_MAX_HEIGHT / h);
    (w * scale, h * scale)
}

fn place_image(name: &str, x: f32, y: f32, width: f32, height: f32) -> Vec<Operation> {
    vec![
        Operation::new("q", vec![]),
        Operation::new(
            "cm",
            vec![
                width.into(),
                0.into(),
                0.into(),
                height.into(),
                x.into(),
                y.into(),
            ],
        ),
        Operation::new("Do", vec![Object::Name(name.as_bytes().to_vec())]),
        Operation::new("Q", vec![]),
    ]
}

fn text_line(text: &str, x: f32, y: f32) -> Vec<Operation> {
    vec![
        Operation::new("BT", vec![]),
        Operation::new(
            "Tf",
            vec![Object::Name(FONT_NAME.as_bytes().to_vec()), FONT_SIZE.into()],
        ),
        Operation::new("Td", vec![x.into(), y.into()]),
        Operation::new(
            "Tj",
            vec![Object::String(win_ansi_bytes(text), StringFormat::Literal)],
        ),
        Operation::new("ET", vec![]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone as _;

    fn signed_at() -> DateTime<FixedOffset> {
        FixedOffset::west_opt(5 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 3, 7, 9, 5, 0)
            .unwrap()
    }

    fn content<'a>(name: &'a str, logo: Option<&'a RgbImage>) -> OverlayContent<'a> {
        OverlayContent {
            signer_name: name,
            logo,
            signed_at: signed_at(),
            label: "Firmado electrónicamente por:",
            qr_marker: "FIRMADO ELECTRONICAMENTE",
        }
    }

    fn page_text(overlay: &Overlay) -> Vec<u8> {
        overlay
            .document()
            .get_page_content(overlay.page_id())
            .unwrap()
    }

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    #[test]
    fn test_split_signer_name() {
        assert_eq!(
            split_signer_name("Juan Carlos Perez Lopez"),
            ("Juan Carlos".to_string(), "Perez Lopez".to_string())
        );
        assert_eq!(
            split_signer_name("Maria Gomez"),
            ("Maria".to_string(), "Gomez".to_string())
        );
        assert_eq!(
            split_signer_name("Ana"),
            ("Ana".to_string(), String::new())
        );
        assert_eq!(
            split_signer_name("Maria Jose Gomez"),
            ("Maria".to_string(), "Jose Gomez".to_string())
        );
        assert_eq!(
            split_signer_name("Luis  Alberto De La Torre"),
            ("Luis Alberto".to_string(), "De La Torre".to_string())
        );
        assert_eq!(split_signer_name("  "), (String::new(), String::new()));
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(&signed_at()), "07/03/2024 09:05");
    }

    #[test]
    fn test_render_single_letter_page() {
        let overlay = Overlay::render(&content("Juan Carlos Perez Lopez", None)).unwrap();
        let doc = overlay.document();

        assert_eq!(doc.get_pages().len(), 1);
        let pages_id = doc
            .get_dictionary(overlay.page_id())
            .unwrap()
            .get(b"Parent")
            .unwrap()
            .as_reference()
            .unwrap();
        let media_box = doc
            .get_dictionary(pages_id)
            .unwrap()
            .get(b"MediaBox")
            .unwrap()
            .as_array()
            .unwrap();
        assert_eq!(media_box.len(), 4);

        let text = page_text(&overlay);
        assert!(contains(&text, b"(Juan Carlos)"));
        assert!(contains(&text, b"(Perez Lopez)"));
        assert!(contains(&text, b"(07/03/2024 09:05)"));
        assert!(contains(&text, b"/FirmaQR Do"));
        assert!(!contains(&text, b"/FirmaLogo Do"));
    }

    #[test]
    fn test_single_word_name_omits_second_line() {
        let overlay = Overlay::render(&content("Ana", None)).unwrap();
        let text = page_text(&overlay);
        let text_objects = text.windows(2).filter(|w| w == b"BT").count();
        // label, one name line, timestamp
        assert_eq!(text_objects, 3);
    }

    #[test]
    fn test_render_with_logo() {
        let logo = RgbImage::from_pixel(200, 50, image::Rgb([0, 0, 200]));
        let overlay = Overlay::render(&content("Maria Gomez", Some(&logo))).unwrap();
        assert!(contains(&page_text(&overlay), b"/FirmaLogo Do"));
    }

    #[test]
    fn test_fit_logo_keeps_aspect() {
        let close = |(a, b): (f32, f32), (x, y): (f32, f32)| (a - x).abs() < 1e-3 && (b - y).abs() < 1e-3;
        assert!(close(fit_logo(200, 50), (80.0, 20.0)));
        assert!(close(fit_logo(50, 100), (30.0, 60.0)));
        assert_eq!(fit_logo(0, 10), (0.0, 0.0));
    }

    #[test]
    fn test_qr_has_quiet_zone() {
        let img = qr_image("FIRMADO ELECTRONICAMENTE").unwrap();
        assert_eq!(img.width() as usize % QR_BOX_SIZE, 0);
        assert_eq!(img.get_pixel(0, 0), &Luma([255]));
        // Top-left finder pattern starts right after the border.
        let first_module = (QR_BORDER * QR_BOX_SIZE) as u32;
        assert_eq!(img.get_pixel(first_module, first_module), &Luma([0]));
    }
}
