//! Pixel packers for `.ithmb` slots
//!
//! Each packer fills a `width × height` canvas in the format's pixel
//! layout, placing the (possibly smaller) decoded image at the given
//! padding offsets. The byte-order variant is a property of the format,
//! not of the database byte order.

use crate::device::{ArtworkFormat, PixelFormat};
use image::RgbaImage;

/// Pack `img` into the format's canvas. `img` must not exceed the
/// canvas; the padding offsets position it.
pub fn pack(
    img: &RgbaImage,
    format: &ArtworkFormat,
    horizontal_padding: u32,
    vertical_padding: u32,
) -> Vec<u8> {
    match format.pixel_format {
        PixelFormat::Rgb565Le => pack_rgb565(img, format, horizontal_padding, vertical_padding, false),
        PixelFormat::Rgb565Be => pack_rgb565(img, format, horizontal_padding, vertical_padding, true),
        PixelFormat::Rgb555Le => pack_rgb555(img, format, horizontal_padding, vertical_padding, false),
        PixelFormat::Rgb555Be => pack_rgb555(img, format, horizontal_padding, vertical_padding, true),
        PixelFormat::RecRgb555Le => {
            let flat = pack_rgb555(img, format, horizontal_padding, vertical_padding, false);
            rearrange(&flat, format.width as usize)
        }
        PixelFormat::RecRgb555Be => {
            let flat = pack_rgb555(img, format, horizontal_padding, vertical_padding, true);
            rearrange(&flat, format.width as usize)
        }
        PixelFormat::Rgb888 => pack_rgb888(img, format, horizontal_padding, vertical_padding),
        PixelFormat::UyvyLe => pack_uyvy(img, format, horizontal_padding, vertical_padding),
        PixelFormat::UyvyBe => pack_uyvy(img, format, horizontal_padding, vertical_padding),
    }
}

fn put16(out: &mut [u8], index: usize, value: u16, be: bool) {
    let bytes = if be {
        value.to_be_bytes()
    } else {
        value.to_le_bytes()
    };
    out[2 * index] = bytes[0];
    out[2 * index + 1] = bytes[1];
}

fn pack_rgb565(
    img: &RgbaImage,
    format: &ArtworkFormat,
    hpad: u32,
    vpad: u32,
    be: bool,
) -> Vec<u8> {
    let canvas_w = format.width as u32;
    let mut out = vec![0u8; format.pixel_bytes() as usize];
    for (y, row) in img.rows().enumerate() {
        let line = (y as u32 + vpad) * canvas_w;
        for (x, px) in row.enumerate() {
            let r = (px.0[0] as u16) >> 3;
            let g = (px.0[1] as u16) >> 2;
            let b = (px.0[2] as u16) >> 3;
            let v = (r << 11) | (g << 5) | b;
            put16(&mut out, (line + x as u32 + hpad) as usize, v, be);
        }
    }
    out
}

fn pack_rgb555(
    img: &RgbaImage,
    format: &ArtworkFormat,
    hpad: u32,
    vpad: u32,
    be: bool,
) -> Vec<u8> {
    let canvas_w = format.width as u32;
    let mut out = vec![0u8; format.pixel_bytes() as usize];
    for (y, row) in img.rows().enumerate() {
        let line = (y as u32 + vpad) * canvas_w;
        for (x, px) in row.enumerate() {
            let r = (px.0[0] as u16) >> 3;
            let g = (px.0[1] as u16) >> 3;
            let b = (px.0[2] as u16) >> 3;
            // Highest bit looks like an alpha channel; the firmware
            // expects it set.
            let v = 0x8000 | (r << 10) | (g << 5) | b;
            put16(&mut out, (line + x as u32 + hpad) as usize, v, be);
        }
    }
    out
}

fn pack_rgb888(img: &RgbaImage, format: &ArtworkFormat, hpad: u32, vpad: u32) -> Vec<u8> {
    let canvas_w = format.width as u32;
    let mut out = vec![0u8; format.pixel_bytes() as usize];
    for (y, row) in img.rows().enumerate() {
        let line = (y as u32 + vpad) * canvas_w;
        for (x, px) in row.enumerate() {
            let at = 3 * (line + x as u32 + hpad) as usize;
            out[at] = px.0[0];
            out[at + 1] = px.0[1];
            out[at + 2] = px.0[2];
        }
    }
    out
}

/// Recursive quad-tree raster order used by the mobile-phone firmware:
/// the square canvas is split into quadrants, each quadrant stored
/// contiguously, recursively down to single pixels.
fn rearrange(flat: &[u8], width: usize) -> Vec<u8> {
    debug_assert_eq!(flat.len(), width * width * 2);
    let mut out = vec![0u8; flat.len()];
    let mut cursor = 0usize;
    derange(flat, width, 0, 0, width, &mut out, &mut cursor);
    out
}

fn derange(
    flat: &[u8],
    row_stride: usize,
    x: usize,
    y: usize,
    side: usize,
    out: &mut [u8],
    cursor: &mut usize,
) {
    if side == 1 {
        let at = 2 * (y * row_stride + x);
        out[*cursor] = flat[at];
        out[*cursor + 1] = flat[at + 1];
        *cursor += 2;
        return;
    }
    let half = side / 2;
    derange(flat, row_stride, x, y, half, out, cursor);
    derange(flat, row_stride, x, y + half, half, out, cursor);
    derange(flat, row_stride, x + half, y, half, out, cursor);
    derange(flat, row_stride, x + half, y + half, half, out, cursor);
}

/// UYVY 4:2:2 as the 6G photo firmware expects it: even scanlines fill
/// the first half of the slot, odd scanlines the second half.
fn pack_uyvy(img: &RgbaImage, format: &ArtworkFormat, hpad: u32, vpad: u32) -> Vec<u8> {
    let width = format.width as usize;
    let height = format.height as usize;

    // Copy onto the padded canvas first; chroma is subsampled across
    // pixel pairs so padding has to be applied before packing.
    let mut canvas = RgbaImage::new(width as u32, height as u32);
    image::imageops::overlay(&mut canvas, img, hpad as i64, vpad as i64);

    let size = width * 2 * height;
    let half = size / 2;
    let mut out = vec![0u8; size];
    let mut even = 0usize;
    let mut odd = 0usize;

    for (y, row) in canvas.rows().enumerate() {
        let pixels: Vec<_> = row.collect();
        for pair in pixels.chunks(2) {
            let (p0, p1) = (pair[0], pair.get(1).copied().unwrap_or(pair[0]));
            let (r0, g0, b0) = (p0.0[0] as i32, p0.0[1] as i32, p0.0[2] as i32);
            let (r1, g1, b1) = (p1.0[0] as i32, p1.0[1] as i32, p1.0[2] as i32);
            let u = (((r0 * -38 + g0 * -74 + b0 * 112 + 128) >> 8) + 128) as u8;
            let y0 = (((r0 * 66 + g0 * 129 + b0 * 25 + 128) >> 8) + 16) as u8;
            let v = (((r0 * 112 + g0 * -94 + b0 * -18 + 128) >> 8) + 128) as u8;
            let y1 = (((r1 * 66 + g1 * 129 + b1 * 25 + 128) >> 8) + 16) as u8;
            if y % 2 == 0 {
                out[even] = u;
                out[even + 1] = y0;
                out[even + 2] = v;
                out[even + 3] = y1;
                even += 4;
            } else {
                out[half + odd] = u;
                out[half + odd + 1] = y0;
                out[half + odd + 2] = v;
                out[half + odd + 3] = y1;
                odd += 4;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::ThumbKind;

    fn fmt(width: u16, height: u16, pixel_format: PixelFormat) -> ArtworkFormat {
        ArtworkFormat {
            kind: ThumbKind::CoverSmall,
            width,
            height,
            correlation_id: 999,
            pixel_format,
            padding: 0,
        }
    }

    fn solid(width: u32, height: u32, rgba: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(width, height, image::Rgba(rgba))
    }

    #[test]
    fn test_rgb565_white_and_black() {
        let format = fmt(2, 1, PixelFormat::Rgb565Le);
        let white = pack(&solid(2, 1, [255, 255, 255, 255]), &format, 0, 0);
        assert_eq!(white, vec![0xff, 0xff, 0xff, 0xff]);

        let black = pack(&solid(2, 1, [0, 0, 0, 255]), &format, 0, 0);
        assert_eq!(black, vec![0, 0, 0, 0]);

        let red = pack(&solid(2, 1, [255, 0, 0, 255]), &format, 0, 0);
        // 0xF800 little-endian
        assert_eq!(red, vec![0x00, 0xf8, 0x00, 0xf8]);
    }

    #[test]
    fn test_rgb565_byte_order() {
        let format = fmt(1, 1, PixelFormat::Rgb565Be);
        let red = pack(&solid(1, 1, [255, 0, 0, 255]), &format, 0, 0);
        assert_eq!(red, vec![0xf8, 0x00]);
    }

    #[test]
    fn test_rgb555_sets_alpha_bit() {
        let format = fmt(1, 1, PixelFormat::Rgb555Le);
        let black = pack(&solid(1, 1, [0, 0, 0, 255]), &format, 0, 0);
        assert_eq!(u16::from_le_bytes([black[0], black[1]]), 0x8000);
    }

    #[test]
    fn test_padding_centres_pixel() {
        let format = fmt(3, 3, PixelFormat::Rgb565Le);
        let out = pack(&solid(1, 1, [255, 255, 255, 255]), &format, 1, 1);
        // Only the middle of the 3x3 canvas is lit.
        for index in 0..9 {
            let v = u16::from_le_bytes([out[2 * index], out[2 * index + 1]]);
            if index == 4 {
                assert_eq!(v, 0xffff);
            } else {
                assert_eq!(v, 0);
            }
        }
    }

    #[test]
    fn test_rearrange_quadrants() {
        // 2x2 canvas: quad order is TL, BL, TR, BR.
        let format = fmt(2, 2, PixelFormat::RecRgb555Le);
        let mut img = RgbaImage::new(2, 2);
        img.put_pixel(0, 0, image::Rgba([255, 0, 0, 255])); // TL red
        img.put_pixel(1, 0, image::Rgba([0, 0, 255, 255])); // TR blue
        img.put_pixel(0, 1, image::Rgba([0, 255, 0, 255])); // BL green
        img.put_pixel(1, 1, image::Rgba([0, 0, 0, 255])); // BR black

        let out = pack(&img, &format, 0, 0);
        let words: Vec<u16> = out
            .chunks(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();
        assert_eq!(words[0], 0x8000 | (0x1f << 10)); // red
        assert_eq!(words[1], 0x8000 | (0x1f << 5)); // green (bottom-left)
        assert_eq!(words[2], 0x8000 | 0x1f); // blue (top-right)
        assert_eq!(words[3], 0x8000); // black
    }

    #[test]
    fn test_uyvy_split_rows() {
        let format = fmt(2, 2, PixelFormat::UyvyBe);
        let out = pack(&solid(2, 2, [255, 255, 255, 255]), &format, 0, 0);
        assert_eq!(out.len(), 2 * 2 * 2);
        // White: Y ≈ 235, U/V ≈ 128.
        assert!(out[1] > 200);
        assert!((out[0] as i32 - 128).abs() < 10);
    }

    #[test]
    fn test_rgb888_bytes() {
        let format = fmt(1, 1, PixelFormat::Rgb888);
        let out = pack(&solid(1, 1, [1, 2, 3, 255]), &format, 0, 0);
        assert_eq!(out, vec![1, 2, 3]);
    }
}
