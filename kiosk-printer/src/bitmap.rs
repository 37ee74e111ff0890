//! Bitmap helpers shared by every printer backend
//!
//! - alpha flattening onto white paper
//! - "cover" crop: center-crop to the page aspect ratio, no letterboxing
//! - BGRA row conversion for GDI device-independent bitmaps

use image::{DynamicImage, RgbImage, RgbaImage, imageops};

/// Source rectangle selected from a bitmap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Center-crop `img_w` x `img_h` to the aspect ratio of `page_w` x `page_h`
///
/// The longer axis (relative to the page) is trimmed equally on both
/// sides so that a later stretch fills the page exactly.
pub fn cover_crop(img_w: u32, img_h: u32, page_w: u32, page_h: u32) -> CropRect {
    let iw = img_w.max(1) as f64;
    let ih = img_h.max(1) as f64;
    let page_ratio = page_w.max(1) as f64 / page_h.max(1) as f64;

    if iw / ih > page_ratio {
        let width = ((ih * page_ratio) as u32).clamp(1, img_w.max(1));
        CropRect {
            x: (img_w.saturating_sub(width)) / 2,
            y: 0,
            width,
            height: img_h.max(1),
        }
    } else {
        let height = ((iw / page_ratio) as u32).clamp(1, img_h.max(1));
        CropRect {
            x: 0,
            y: (img_h.saturating_sub(height)) / 2,
            width: img_w.max(1),
            height,
        }
    }
}

/// Composite any image onto an opaque white background
pub fn flatten_on_white(img: &DynamicImage) -> RgbImage {
    match img {
        DynamicImage::ImageRgb8(rgb) => rgb.clone(),
        other => flatten_rgba(&other.to_rgba8()),
    }
}

/// Composite straight (non-premultiplied) RGBA onto white
pub fn flatten_rgba(rgba: &RgbaImage) -> RgbImage {
    let mut out = RgbImage::new(rgba.width(), rgba.height());
    for (src, dst) in rgba.pixels().zip(out.pixels_mut()) {
        let [r, g, b, a] = src.0;
        let a = a as u32;
        let blend = |c: u8| ((c as u32 * a + 255 * (255 - a) + 127) / 255) as u8;
        dst.0 = [blend(r), blend(g), blend(b)];
    }
    out
}

/// Apply [`cover_crop`] for a page and return the cropped copy
pub fn crop_to_page(img: &RgbImage, page_w: u32, page_h: u32) -> RgbImage {
    let rect = cover_crop(img.width(), img.height(), page_w, page_h);
    imageops::crop_imm(img, rect.x, rect.y, rect.width, rect.height).to_image()
}

/// Top-down 32-bit BGRX rows, as expected by `StretchDIBits` with a
/// negative `biHeight`
pub fn to_bgra(img: &RgbImage) -> Vec<u8> {
    let mut out = Vec::with_capacity(img.width() as usize * img.height() as usize * 4);
    for px in img.pixels() {
        let [r, g, b] = px.0;
        out.extend_from_slice(&[b, g, r, 255]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, Rgba};

    #[test]
    fn test_cover_crop_wide_image() {
        let rect = cover_crop(2000, 1000, 1000, 1000);
        assert_eq!(
            rect,
            CropRect {
                x: 500,
                y: 0,
                width: 1000,
                height: 1000
            }
        );
    }

    #[test]
    fn test_cover_crop_tall_image() {
        // A5 portrait page, square photo: trim top and bottom
        let rect = cover_crop(1000, 1000, 1000, 500);
        assert_eq!(rect.width, 1000);
        assert_eq!(rect.height, 500);
        assert_eq!(rect.y, 250);
    }

    #[test]
    fn test_cover_crop_same_ratio_is_identity() {
        let rect = cover_crop(600, 800, 3000, 4000);
        assert_eq!(
            rect,
            CropRect {
                x: 0,
                y: 0,
                width: 600,
                height: 800
            }
        );
    }

    #[test]
    fn test_flatten_transparent_is_white() {
        let mut rgba = RgbaImage::new(2, 1);
        rgba.put_pixel(0, 0, Rgba([0, 0, 0, 0]));
        rgba.put_pixel(1, 0, Rgba([10, 20, 30, 255]));
        let rgb = flatten_rgba(&rgba);
        assert_eq!(*rgb.get_pixel(0, 0), Rgb([255, 255, 255]));
        assert_eq!(*rgb.get_pixel(1, 0), Rgb([10, 20, 30]));
    }

    #[test]
    fn test_crop_to_page_dimensions() {
        let img = RgbImage::new(300, 100);
        let cropped = crop_to_page(&img, 210, 148);
        assert_eq!(cropped.height(), 100);
        assert_eq!(cropped.width(), 141);
    }

    #[test]
    fn test_bgra_order() {
        let mut img = RgbImage::new(1, 1);
        img.put_pixel(0, 0, Rgb([1, 2, 3]));
        assert_eq!(to_bgra(&img), vec![3, 2, 1, 255]);
    }
}
