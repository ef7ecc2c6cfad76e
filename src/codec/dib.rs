//! Packed device-independent bitmaps and alpha conversion.
//!
//! A packed DIB (`CF_DIB`) is a BITMAPINFO header, an optional color table
//! or bit masks, and the pixel rows, all in one block. Decoding follows the
//! documented layout:
//!
//! - header sizes 12 (BITMAPCOREHEADER), 40, 52, 56, 108 and 124
//! - 1/4/8 bpp through the color table, 16/24/32 bpp direct
//! - `BI_BITFIELDS` / `BI_ALPHABITFIELDS` masks after a 40-byte header or
//!   inside a larger one
//! - `BI_JPEG` / `BI_PNG` embedded images
//! - rows padded to 4 bytes, bottom-up for positive heights and top-down for
//!   negative ones
//!
//! 32bpp `BI_RGB` pixels are premultiplied, which is what GDI produces and
//! what [`encode_dib`] writes. Masked 32bpp pixels with an alpha mask are
//! straight. A bitmap whose alpha channel is entirely zero was produced by
//! code that ignores alpha and is decoded as opaque.

use bytes::{BufMut, BytesMut};
use image::RgbaImage;

use super::{read_i32, read_u16, read_u32};
use crate::{ClipError, ClipResult};

const BI_RGB: u32 = 0;
const BI_BITFIELDS: u32 = 3;
const BI_JPEG: u32 = 4;
const BI_PNG: u32 = 5;
const BI_ALPHABITFIELDS: u32 = 6;

/// Size of BITMAPINFOHEADER
pub const BITMAPINFOHEADER_SIZE: usize = 40;

/// How the alpha byte of 32bpp BGRA pixels is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlphaMode {
    /// Alpha is meaningless; every pixel is opaque
    Ignore,
    /// Color channels are premultiplied by alpha
    Premultiplied,
    /// Color channels are independent of alpha
    Straight,
}

#[derive(Debug, Clone, Copy)]
struct Masks {
    red: u32,
    green: u32,
    blue: u32,
    alpha: u32,
}

#[derive(Debug)]
struct DibHeader {
    header_size: usize,
    width: i32,
    height: i32,
    bit_count: u16,
    compression: u32,
    masks: Option<Masks>,
    palette_entries: usize,
    palette_entry_size: usize,
    mask_bytes: usize,
}

impl DibHeader {
    fn parse(data: &[u8]) -> ClipResult<Self> {
        if data.len() < 12 {
            return Err(ClipError::malformed("DIB", "header too small"));
        }

        let header_size = read_u32(data, 0) as usize;
        if header_size > data.len() {
            return Err(ClipError::malformed(
                "DIB",
                format!("header size {} exceeds {} byte block", header_size, data.len()),
            ));
        }

        if header_size == 12 {
            let bit_count = read_u16(data, 10);
            return Ok(Self {
                header_size,
                width: i32::from(read_u16(data, 4)),
                height: i32::from(read_u16(data, 6)),
                bit_count,
                compression: BI_RGB,
                masks: None,
                palette_entries: if bit_count <= 8 { 1 << bit_count } else { 0 },
                palette_entry_size: 3,
                mask_bytes: 0,
            });
        }

        if header_size < BITMAPINFOHEADER_SIZE {
            return Err(ClipError::malformed("DIB", format!("unknown header size {}", header_size)));
        }

        let bit_count = read_u16(data, 14);
        let compression = read_u32(data, 16);
        let clr_used = read_u32(data, 32) as usize;

        // Masks live inside V2+ headers, or directly after a plain info header
        let mut mask_bytes = 0;
        let masks = match compression {
            BI_BITFIELDS | BI_ALPHABITFIELDS => {
                let alpha_in_table = compression == BI_ALPHABITFIELDS;
                if header_size == BITMAPINFOHEADER_SIZE {
                    mask_bytes = if alpha_in_table { 16 } else { 12 };
                }
                let needed = BITMAPINFOHEADER_SIZE + if alpha_in_table || header_size >= 56 { 16 } else { 12 };
                if data.len() < needed {
                    return Err(ClipError::malformed("DIB", "bit masks truncated"));
                }
                let has_alpha = alpha_in_table || header_size >= 56;
                Some(Masks {
                    red: read_u32(data, 40),
                    green: read_u32(data, 44),
                    blue: read_u32(data, 48),
                    alpha: if has_alpha { read_u32(data, 52) } else { 0 },
                })
            }
            _ => None,
        };

        let palette_entries = match (clr_used, bit_count) {
            (0, 1 | 4 | 8) => 1 << bit_count,
            (n, _) => n,
        };

        Ok(Self {
            header_size,
            width: read_i32(data, 4),
            height: read_i32(data, 8),
            bit_count,
            compression,
            masks,
            palette_entries,
            palette_entry_size: 4,
            mask_bytes,
        })
    }

    fn palette_offset(&self) -> usize {
        self.header_size + self.mask_bytes
    }

    fn pixel_offset(&self) -> usize {
        self.palette_offset() + self.palette_entries * self.palette_entry_size
    }
}

/// Decode a packed DIB into straight RGBA
pub fn decode_dib(data: &[u8]) -> ClipResult<RgbaImage> {
    let header = DibHeader::parse(data)?;

    match header.compression {
        BI_JPEG | BI_PNG => {
            let embedded = data
                .get(header.header_size..)
                .ok_or_else(|| ClipError::malformed("DIB", "missing embedded image"))?;
            return Ok(image::load_from_memory(embedded)?.to_rgba8());
        }
        BI_RGB | BI_BITFIELDS | BI_ALPHABITFIELDS => {}
        other => {
            return Err(ClipError::malformed("DIB", format!("compression {} not supported", other)));
        }
    }

    if header.width <= 0 || header.height == 0 {
        return Err(ClipError::malformed(
            "DIB",
            format!("dimensions {}x{}", header.width, header.height),
        ));
    }

    let width = header.width.unsigned_abs() as usize;
    let height = header.height.unsigned_abs() as usize;
    let top_down = header.height < 0;
    let bpp = header.bit_count as usize;

    if !matches!(bpp, 1 | 4 | 8 | 16 | 24 | 32) {
        return Err(ClipError::malformed("DIB", format!("{} bits per pixel", bpp)));
    }

    let palette = read_palette(data, &header)?;
    let stride = width
        .checked_mul(bpp)
        .map(|bits| (bits + 31) / 32 * 4)
        .ok_or_else(|| ClipError::malformed("DIB", "row size overflows"))?;
    let pixels = data.get(header.pixel_offset()..).unwrap_or_default();
    let needed = stride
        .checked_mul(height)
        .ok_or_else(|| ClipError::malformed("DIB", "image size overflows"))?;
    if pixels.len() < needed {
        return Err(ClipError::malformed(
            "DIB",
            format!("{} bytes of pixels, need {}", pixels.len(), needed),
        ));
    }

    let masks = header.masks.unwrap_or(match bpp {
        16 => Masks {
            red: 0x7C00,
            green: 0x03E0,
            blue: 0x001F,
            alpha: 0,
        },
        _ => Masks {
            red: 0x00FF_0000,
            green: 0x0000_FF00,
            blue: 0x0000_00FF,
            alpha: 0xFF00_0000,
        },
    });

    let mut rgba = vec![0u8; width * height * 4];
    for y in 0..height {
        let src = if top_down { y } else { height - 1 - y };
        let row = &pixels[src * stride..(src + 1) * stride];
        for x in 0..width {
            let pixel = match bpp {
                1 | 4 | 8 => {
                    let index = palette_index(row, x, bpp);
                    palette.get(index).copied().unwrap_or([0, 0, 0, 255])
                }
                16 => unpack_masked(u32::from(read_u16(row, x * 2)), &masks, false),
                24 => [row[x * 3 + 2], row[x * 3 + 1], row[x * 3], 255],
                _ => unpack_masked(read_u32(row, x * 4), &masks, true),
            };
            rgba[(y * width + x) * 4..][..4].copy_from_slice(&pixel);
        }
    }

    if bpp == 32 {
        let mode = match header.masks {
            None => AlphaMode::Premultiplied,
            Some(m) if m.alpha != 0 => AlphaMode::Straight,
            Some(_) => AlphaMode::Ignore,
        };
        fix_alpha(&mut rgba, mode);
    }

    RgbaImage::from_raw(width as u32, height as u32, rgba)
        .ok_or_else(|| ClipError::malformed("DIB", "pixel buffer size mismatch"))
}

fn read_palette(data: &[u8], header: &DibHeader) -> ClipResult<Vec<[u8; 4]>> {
    if header.bit_count > 8 {
        return Ok(Vec::new());
    }
    let start = header.palette_offset();
    let end = header.pixel_offset();
    let table = data
        .get(start..end)
        .ok_or_else(|| ClipError::malformed("DIB", "color table truncated"))?;
    Ok(table
        .chunks_exact(header.palette_entry_size)
        .map(|entry| [entry[2], entry[1], entry[0], 255])
        .collect())
}

fn palette_index(row: &[u8], x: usize, bpp: usize) -> usize {
    match bpp {
        8 => row[x] as usize,
        4 => {
            let byte = row[x / 2];
            (if x % 2 == 0 { byte >> 4 } else { byte & 0x0F }) as usize
        }
        _ => ((row[x / 8] >> (7 - x % 8)) & 1) as usize,
    }
}

fn unpack_masked(pixel: u32, masks: &Masks, with_alpha: bool) -> [u8; 4] {
    let alpha = if with_alpha && masks.alpha != 0 {
        channel(pixel, masks.alpha)
    } else {
        255
    };
    [
        channel(pixel, masks.red),
        channel(pixel, masks.green),
        channel(pixel, masks.blue),
        alpha,
    ]
}

fn channel(pixel: u32, mask: u32) -> u8 {
    if mask == 0 {
        return 0;
    }
    let shift = mask.trailing_zeros();
    let max = u64::from(mask >> shift);
    let value = u64::from((pixel & mask) >> shift);
    ((value * 255 + max / 2) / max) as u8
}

// =============================================================================
// Alpha Conversion
// =============================================================================

/// Normalize the alpha channel of RGBA pixels in place
///
/// With [`AlphaMode::Premultiplied`] the color channels are divided back out;
/// with [`AlphaMode::Ignore`], or when every alpha byte is zero, all pixels
/// become opaque.
pub fn fix_alpha(rgba: &mut [u8], mode: AlphaMode) {
    let all_zero = rgba.chunks_exact(4).all(|p| p[3] == 0);
    if mode == AlphaMode::Ignore || all_zero {
        rgba.chunks_exact_mut(4).for_each(|p| p[3] = 255);
        return;
    }

    if mode == AlphaMode::Premultiplied {
        for p in rgba.chunks_exact_mut(4) {
            let a = u32::from(p[3]);
            if a == 0 {
                p[..3].fill(0);
            } else if a < 255 {
                for c in &mut p[..3] {
                    *c = ((u32::from(*c) * 255 + a / 2) / a).min(255) as u8;
                }
            }
        }
    }
}

/// Premultiplied top-down BGRA rows for `image`
pub fn to_premultiplied_bgra(image: &RgbaImage) -> Vec<u8> {
    let mut out = Vec::with_capacity(image.as_raw().len());
    for p in image.pixels() {
        let [r, g, b, a] = p.0;
        let scale = |c: u8| ((u32::from(c) * u32::from(a) + 127) / 255) as u8;
        out.extend_from_slice(&[scale(b), scale(g), scale(r), a]);
    }
    out
}

/// Build an RGBA image from top-down 32bpp BGRA rows
pub fn from_bgra(width: u32, height: u32, bgra: &[u8], mode: AlphaMode) -> ClipResult<RgbaImage> {
    let expected = width as usize * height as usize * 4;
    if bgra.len() < expected {
        return Err(ClipError::malformed(
            "bitmap bits",
            format!("{} bytes for {}x{}", bgra.len(), width, height),
        ));
    }

    let mut rgba: Vec<u8> = bgra[..expected]
        .chunks_exact(4)
        .flat_map(|p| [p[2], p[1], p[0], p[3]])
        .collect();
    fix_alpha(&mut rgba, mode);

    RgbaImage::from_raw(width, height, rgba)
        .ok_or_else(|| ClipError::malformed("bitmap bits", "pixel buffer size mismatch"))
}

/// Encode `image` as a packed 32bpp `BI_RGB` DIB with premultiplied alpha
pub fn encode_dib(image: &RgbaImage) -> Vec<u8> {
    let (width, height) = image.dimensions();
    let bits = to_premultiplied_bgra(image);

    let mut dib = BytesMut::with_capacity(BITMAPINFOHEADER_SIZE + bits.len());
    dib.put_u32_le(BITMAPINFOHEADER_SIZE as u32);
    dib.put_i32_le(i32::try_from(width).unwrap_or(i32::MAX));
    dib.put_i32_le(-i32::try_from(height).unwrap_or(i32::MAX)); // top-down
    dib.put_u16_le(1);
    dib.put_u16_le(32);
    dib.put_u32_le(BI_RGB);
    dib.put_u32_le(bits.len() as u32);
    dib.put_i32_le(0);
    dib.put_i32_le(0);
    dib.put_u32_le(0);
    dib.put_u32_le(0);
    dib.put_slice(&bits);
    dib.to_vec()
}

/// Width and height recorded in a DIB header
pub fn dib_dimensions(data: &[u8]) -> ClipResult<(u32, u32)> {
    let header = DibHeader::parse(data)?;
    Ok((header.width.unsigned_abs(), header.height.unsigned_abs()))
}

#[cfg(test)]
mod tests {
    use image::Rgba;

    use super::*;

    fn info_header(width: i32, height: i32, bpp: u16, compression: u32, clr_used: u32) -> BytesMut {
        let mut h = BytesMut::new();
        h.put_u32_le(40);
        h.put_i32_le(width);
        h.put_i32_le(height);
        h.put_u16_le(1);
        h.put_u16_le(bpp);
        h.put_u32_le(compression);
        h.put_u32_le(0);
        h.put_i32_le(0);
        h.put_i32_le(0);
        h.put_u32_le(clr_used);
        h.put_u32_le(0);
        h
    }

    #[test]
    fn test_encode_decode_keeps_alpha() {
        let mut image = RgbaImage::from_pixel(3, 2, Rgba([200, 100, 50, 255]));
        image.put_pixel(1, 1, Rgba([255, 0, 0, 128]));
        image.put_pixel(2, 0, Rgba([10, 20, 30, 0]));

        let dib = encode_dib(&image);
        assert_eq!(dib_dimensions(&dib).unwrap(), (3, 2));

        let decoded = decode_dib(&dib).unwrap();
        assert_eq!(decoded.get_pixel(0, 0), &Rgba([200, 100, 50, 255]));
        assert_eq!(decoded.get_pixel(1, 1), &Rgba([255, 0, 0, 128]));
        assert_eq!(decoded.get_pixel(2, 0)[3], 0);
    }

    #[test]
    fn test_bottom_up_24bpp() {
        // 2x2, rows padded to 8 bytes; bottom row first
        let mut dib = info_header(2, 2, 24, BI_RGB, 0);
        dib.put_slice(&[0, 0, 255, 0, 255, 0, 0, 0]); // bottom: red, green
        dib.put_slice(&[255, 0, 0, 255, 255, 255, 0, 0]); // top: blue, white

        let image = decode_dib(&dib).unwrap();
        assert_eq!(image.get_pixel(0, 0), &Rgba([0, 0, 255, 255]));
        assert_eq!(image.get_pixel(1, 0), &Rgba([255, 255, 255, 255]));
        assert_eq!(image.get_pixel(0, 1), &Rgba([255, 0, 0, 255]));
        assert_eq!(image.get_pixel(1, 1), &Rgba([0, 255, 0, 255]));
    }

    #[test]
    fn test_8bpp_palette() {
        let mut dib = info_header(2, -1, 8, BI_RGB, 2);
        dib.put_slice(&[0, 0, 0, 0, 0, 255, 0, 0]); // black, green
        dib.put_slice(&[1, 0, 0, 0]);

        let image = decode_dib(&dib).unwrap();
        assert_eq!(image.get_pixel(0, 0), &Rgba([0, 255, 0, 255]));
        assert_eq!(image.get_pixel(1, 0), &Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_1bpp_default_palette_size() {
        let mut dib = info_header(3, -1, 1, BI_RGB, 0);
        dib.put_slice(&[0, 0, 0, 0, 255, 255, 255, 0]);
        dib.put_slice(&[0b1010_0000, 0, 0, 0]);

        let image = decode_dib(&dib).unwrap();
        assert_eq!(image.get_pixel(0, 0), &Rgba([255, 255, 255, 255]));
        assert_eq!(image.get_pixel(1, 0), &Rgba([0, 0, 0, 255]));
        assert_eq!(image.get_pixel(2, 0), &Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn test_16bpp_565_bitfields() {
        let mut dib = info_header(1, 1, 16, BI_BITFIELDS, 0);
        dib.put_u32_le(0xF800);
        dib.put_u32_le(0x07E0);
        dib.put_u32_le(0x001F);
        dib.put_u16_le(0xF800);
        dib.put_u16_le(0);

        let image = decode_dib(&dib).unwrap();
        assert_eq!(image.get_pixel(0, 0), &Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn test_16bpp_default_555() {
        let mut dib = info_header(1, 1, 16, BI_RGB, 0);
        dib.put_u16_le(0x03E0);
        dib.put_u16_le(0);

        let image = decode_dib(&dib).unwrap();
        assert_eq!(image.get_pixel(0, 0), &Rgba([0, 255, 0, 255]));
    }

    #[test]
    fn test_32bpp_zero_alpha_is_opaque() {
        let mut dib = info_header(1, 1, 32, BI_RGB, 0);
        dib.put_slice(&[10, 20, 30, 0]);

        let image = decode_dib(&dib).unwrap();
        assert_eq!(image.get_pixel(0, 0), &Rgba([30, 20, 10, 255]));
    }

    #[test]
    fn test_truncated_pixels() {
        let mut dib = info_header(4, 4, 32, BI_RGB, 0);
        dib.put_slice(&[0; 8]);
        assert!(matches!(decode_dib(&dib), Err(ClipError::Malformed { .. })));
    }

    #[test]
    fn test_rle_rejected() {
        let mut dib = info_header(1, 1, 8, 1, 0);
        dib.put_slice(&[0; 64]);
        assert!(decode_dib(&dib).is_err());
    }

    #[test]
    fn test_premultiply_round_trip() {
        let image = RgbaImage::from_pixel(1, 1, Rgba([255, 128, 0, 128]));
        let bgra = to_premultiplied_bgra(&image);
        assert_eq!(bgra, vec![0, 64, 128, 128]);

        let back = from_bgra(1, 1, &bgra, AlphaMode::Premultiplied).unwrap();
        assert_eq!(back.get_pixel(0, 0), &Rgba([255, 128, 0, 128]));

        let flat = from_bgra(1, 1, &bgra, AlphaMode::Ignore).unwrap();
        assert_eq!(flat.get_pixel(0, 0), &Rgba([128, 64, 0, 255]));
    }
}
