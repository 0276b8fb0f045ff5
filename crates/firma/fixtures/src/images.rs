//! Logo images.

use image::{ImageFormat, Rgba, RgbaImage};

/// Left half fully transparent, right half opaque `color`.
pub fn half_transparent_logo(width: u32, height: u32, color: [u8; 3]) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, _| {
        if x < width / 2 {
            Rgba([0, 0, 0, 0])
        } else {
            Rgba([color[0], color[1], color[2], 255])
        }
    })
}

/// Encode an image as PNG.
pub fn png_bytes(image: &RgbaImage) -> Vec<u8> {
    let mut buf = Vec::new();
    image
        .write_to(&mut std::io::Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

/// A 40x20 PNG logo, half transparent, half blue.
pub fn logo_png() -> Vec<u8> {
    png_bytes(&half_transparent_logo(40, 20, [0, 0, 200]))
}
