//! Raster image XObjects.

use std::io::Write as _;

use firma_core::{PipelineError, PipelineResult};
use flate2::Compression;
use flate2::write::ZlibEncoder;
use image::{GrayImage, RgbImage};
use lopdf::{Stream, dictionary};

/// Image XObject for an 8-bit RGB image.
pub(crate) fn rgb_image(image: &RgbImage) -> PipelineResult<Stream> {
    image_stream(image.width(), image.height(), "DeviceRGB", image.as_raw())
}

/// Image XObject for an 8-bit grayscale image.
pub(crate) fn gray_image(image: &GrayImage) -> PipelineResult<Stream> {
    image_stream(image.width(), image.height(), "DeviceGray", image.as_raw())
}

fn image_stream(width: u32, height: u32, color_space: &str, raw: &[u8]) -> PipelineResult<Stream> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(raw)
        .map_err(|e| PipelineError::Render(format!("image compression failed: {e}")))?;
    let compressed = encoder
        .finish()
        .map_err(|e| PipelineError::Render(format!("image compression failed: {e}")))?;

    Ok(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => i64::from(width),
            "Height" => i64::from(height),
            "ColorSpace" => color_space,
            "BitsPerComponent" => 8,
            "Filter" => "FlateDecode",
        },
        compressed,
    ))
}
