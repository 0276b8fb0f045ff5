//! Logo normalization.

use firma_core::{PipelineError, PipelineResult};
use image::{Rgb, RgbImage};

/// Decode an image and flatten it onto opaque white.
///
/// Images with an alpha channel are blended onto a white canvas of the same
/// size; the result never carries transparency.
pub fn normalize_image(bytes: &[u8]) -> PipelineResult<RgbImage> {
    let decoded =
        image::load_from_memory(bytes).map_err(|e| PipelineError::ImageDecode(e.to_string()))?;

    if !decoded.color().has_alpha() {
        return Ok(decoded.to_rgb8());
    }

    let rgba = decoded.to_rgba8();
    let flattened = RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        Rgb([over_white(r, a), over_white(g, a), over_white(b, a)])
    });

    tracing::debug!(
        width = flattened.width(),
        height = flattened.height(),
        "flattened transparent logo"
    );
    Ok(flattened)
}

/// Blend one channel onto white: `a*c + (1-a)*255`, with `a` in 0..=255.
fn over_white(channel: u8, alpha: u8) -> u8 {
    let c = u32::from(channel);
    let a = u32::from(alpha);
    ((c * a + 255 * (255 - a) + 127) / 255) as u8
}
