//! Image XObject → `DynamicImage` conversion.
//!
//! JPEG streams go straight to the `image` decoder. Everything else is
//! decompressed by lopdf and the raw samples are mapped through the
//! image's color space. Rows are padded to a byte boundary.

use std::borrow::Cow;

use image::{DynamicImage, GrayImage, ImageBuffer, ImageFormat, Luma, Rgb, RgbImage};
use lopdf::{Dictionary, Object, Stream};

use extract_core::error::{ExtractError, Result};

use crate::colorspace::{stream_data, ColorSpace};

/// Sample layout read from the image dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleLayout {
    pub width: u32,
    pub height: u32,
    pub bits_per_component: u8,
    /// `/Decode [1 0]` on a single-component image or stencil mask.
    pub inverted: bool,
}

impl SampleLayout {
    pub fn from_dict(dict: &Dictionary) -> Result<Self> {
        let width = dimension(dict, b"Width")?;
        let height = dimension(dict, b"Height")?;

        let image_mask = is_image_mask(dict);
        let bits_per_component = if image_mask {
            1
        } else {
            match dict.get(b"BitsPerComponent").and_then(Object::as_i64) {
                Ok(bits @ (1 | 2 | 4 | 8 | 16)) => bits as u8,
                Ok(other) => {
                    return Err(ExtractError::UnsupportedImage(format!(
                        "{} bits per component",
                        other
                    )))
                }
                Err(_) => 8,
            }
        };

        Ok(Self {
            width,
            height,
            bits_per_component,
            inverted: decode_is_inverted(dict),
        })
    }

    /// Bytes in one row of `components`-channel samples.
    pub fn row_bytes(&self, components: usize) -> Result<usize> {
        (self.width as usize)
            .checked_mul(components)
            .and_then(|n| n.checked_mul(usize::from(self.bits_per_component)))
            .map(|bits| bits.div_ceil(8))
            .ok_or_else(|| dimension_overflow(self))
    }

    /// Samples in the whole image for `components`-channel pixels.
    fn sample_count(&self, components: usize) -> Result<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)
            .and_then(|n| n.checked_mul(components))
            .ok_or_else(|| dimension_overflow(self))
    }
}

fn dimension_overflow(layout: &SampleLayout) -> ExtractError {
    ExtractError::Image(format!(
        "Image dimensions overflow: {}x{}",
        layout.width, layout.height
    ))
}

fn dimension(dict: &Dictionary, key: &[u8]) -> Result<u32> {
    let value = dict.get(key).and_then(Object::as_i64).map_err(|e| {
        ExtractError::Image(format!(
            "Missing /{}: {}",
            String::from_utf8_lossy(key),
            e
        ))
    })?;
    u32::try_from(value)
        .ok()
        .filter(|v| *v > 0)
        .ok_or_else(|| {
            ExtractError::Image(format!(
                "Invalid /{} {}",
                String::from_utf8_lossy(key),
                value
            ))
        })
}

pub(crate) fn is_image_mask(dict: &Dictionary) -> bool {
    dict.get(b"ImageMask")
        .and_then(Object::as_bool)
        .unwrap_or(false)
}

fn decode_is_inverted(dict: &Dictionary) -> bool {
    let Ok(Object::Array(decode)) = dict.get(b"Decode") else {
        return false;
    };
    match (
        decode.first().and_then(number),
        decode.get(1).and_then(number),
    ) {
        (Some(lo), Some(hi)) => lo > hi,
        _ => false,
    }
}

fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(f64::from(*r)),
        _ => None,
    }
}

/// Filter names in application order.
pub fn filter_names(dict: &Dictionary) -> Vec<String> {
    match dict.get(b"Filter") {
        Ok(Object::Name(name)) => vec![String::from_utf8_lossy(name).to_string()],
        Ok(Object::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Object::Name(name) => Some(String::from_utf8_lossy(name).to_string()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Decode an image XObject stream.
///
/// `color_space` is `None` for stencil masks and for JPEG streams without a
/// `/ColorSpace` entry.
pub fn decode_image(stream: &Stream, color_space: Option<&ColorSpace>) -> Result<DynamicImage> {
    let filters = filter_names(&stream.dict);

    match filters.last().map(String::as_str) {
        Some("DCTDecode") | Some("DCT") => {
            let jpeg = match filters.split_last() {
                Some((_, outer)) if !outer.is_empty() => {
                    Cow::Owned(strip_outer_filters(stream, outer)?)
                }
                _ => Cow::Borrowed(stream.content.as_slice()),
            };
            return image::load_from_memory_with_format(&jpeg, ImageFormat::Jpeg)
                .map_err(|e| ExtractError::Image(format!("JPEG decode failed: {}", e)));
        }
        Some(f @ ("JPXDecode" | "CCITTFaxDecode" | "CCF" | "JBIG2Decode")) => {
            return Err(ExtractError::UnsupportedImage(format!("{} filter", f)));
        }
        _ => {}
    }

    let layout = SampleLayout::from_dict(&stream.dict)?;
    let data = stream_data(stream)?;

    let color_space = match color_space {
        Some(cs) => cs,
        None if is_image_mask(&stream.dict) => &ColorSpace::Gray,
        None => {
            return Err(ExtractError::Image(
                "Image has no /ColorSpace".to_string(),
            ))
        }
    };

    samples_to_image(&data, &layout, color_space)
}

/// Undo the filters applied on top of an embedded JPEG, e.g. the
/// `/FlateDecode` in `[/FlateDecode /DCTDecode]`.
fn strip_outer_filters(stream: &Stream, outer: &[String]) -> Result<Vec<u8>> {
    let mut dict = stream.dict.clone();
    dict.set(
        "Filter",
        outer
            .iter()
            .map(|name| Object::Name(name.as_bytes().to_vec()))
            .collect::<Vec<_>>(),
    );
    // lopdf takes a single parameter dictionary for the whole chain.
    if let Ok(Object::Array(params)) = stream.dict.get(b"DecodeParms") {
        match params.first() {
            Some(first @ Object::Dictionary(_)) => dict.set("DecodeParms", first.clone()),
            _ => {
                dict.remove(b"DecodeParms");
            }
        }
    }

    stream_data(&Stream::new(dict, stream.content.clone()))
}

/// Map raw, unfiltered samples to pixels.
pub fn samples_to_image(
    data: &[u8],
    layout: &SampleLayout,
    color_space: &ColorSpace,
) -> Result<DynamicImage> {
    if let ColorSpace::Unsupported(name) = color_space {
        return Err(ExtractError::UnsupportedImage(format!(
            "{} color space",
            name
        )));
    }

    let components = color_space.components();
    let row_bytes = layout.row_bytes(components)?;
    let expected = row_bytes
        .checked_mul(layout.height as usize)
        .ok_or_else(|| dimension_overflow(layout))?;
    if data.len() < expected {
        return Err(ExtractError::Image(format!(
            "Image data too short: expected {} bytes for {}x{}, got {}",
            expected,
            layout.width,
            layout.height,
            data.len()
        )));
    }

    let rows = data[..expected].chunks_exact(row_bytes);
    let samples_per_row = layout.width as usize * components;
    let sample_count = layout.sample_count(components)?;
    let bits = layout.bits_per_component;

    match color_space {
        ColorSpace::Gray if bits == 16 => {
            let mut pixels = Vec::with_capacity(sample_count);
            for row in rows {
                pixels.extend(unpack_row(row, bits, samples_per_row).map(|v| {
                    if layout.inverted {
                        u16::MAX - v
                    } else {
                        v
                    }
                }));
            }
            ImageBuffer::<Luma<u16>, Vec<u16>>::from_raw(layout.width, layout.height, pixels)
                .map(DynamicImage::ImageLuma16)
                .ok_or_else(|| buffer_error(layout))
        }
        ColorSpace::Gray => {
            let mut pixels = Vec::with_capacity(sample_count);
            for row in rows {
                pixels.extend(unpack_row(row, bits, samples_per_row).map(|v| {
                    let v = scale_to_u8(v, bits);
                    if layout.inverted {
                        255 - v
                    } else {
                        v
                    }
                }));
            }
            GrayImage::from_raw(layout.width, layout.height, pixels)
                .map(DynamicImage::ImageLuma8)
                .ok_or_else(|| buffer_error(layout))
        }
        ColorSpace::Rgb if bits == 16 => {
            let mut pixels = Vec::with_capacity(sample_count);
            for row in rows {
                pixels.extend(unpack_row(row, bits, samples_per_row));
            }
            ImageBuffer::<Rgb<u16>, Vec<u16>>::from_raw(layout.width, layout.height, pixels)
                .map(DynamicImage::ImageRgb16)
                .ok_or_else(|| buffer_error(layout))
        }
        ColorSpace::Rgb => {
            let mut pixels = Vec::with_capacity(sample_count);
            for row in rows {
                pixels.extend(unpack_row(row, bits, samples_per_row).map(|v| scale_to_u8(v, bits)));
            }
            RgbImage::from_raw(layout.width, layout.height, pixels)
                .map(DynamicImage::ImageRgb8)
                .ok_or_else(|| buffer_error(layout))
        }
        ColorSpace::Cmyk => {
            let mut cmyk = Vec::with_capacity(sample_count);
            for row in rows {
                cmyk.extend(unpack_row(row, bits, samples_per_row).map(|v| scale_to_u8(v, bits)));
            }
            RgbImage::from_raw(layout.width, layout.height, cmyk_to_rgb(&cmyk))
                .map(DynamicImage::ImageRgb8)
                .ok_or_else(|| buffer_error(layout))
        }
        ColorSpace::Indexed {
            base,
            hival,
            lookup,
        } => {
            let mut rgb = Vec::with_capacity(layout.sample_count(3)?);
            for row in rows {
                for index in unpack_row(row, bits, samples_per_row) {
                    let index = usize::from(index.min(u16::from(*hival)));
                    rgb.extend_from_slice(&palette_rgb(base, lookup, index)?);
                }
            }
            RgbImage::from_raw(layout.width, layout.height, rgb)
                .map(DynamicImage::ImageRgb8)
                .ok_or_else(|| buffer_error(layout))
        }
        ColorSpace::Unsupported(_) => unreachable!("rejected above"),
    }
}

/// Unpack the first `count` samples of a row. Values are left at their native
/// bit depth.
fn unpack_row(row: &[u8], bits: u8, count: usize) -> impl Iterator<Item = u16> + '_ {
    (0..count).map(move |i| match bits {
        8 => u16::from(row[i]),
        16 => u16::from_be_bytes([row[2 * i], row[2 * i + 1]]),
        _ => {
            let bit = i * bits as usize;
            let byte = row[bit / 8];
            let shift = 8 - bits as usize - (bit % 8);
            u16::from((byte >> shift) & ((1u8 << bits) - 1))
        }
    })
}

fn scale_to_u8(value: u16, bits: u8) -> u8 {
    match bits {
        8 => value as u8,
        16 => (value >> 8) as u8,
        _ => {
            let max = (1u32 << bits) - 1;
            (u32::from(value) * 255 / max) as u8
        }
    }
}

fn palette_rgb(base: &ColorSpace, lookup: &[u8], index: usize) -> Result<[u8; 3]> {
    let n = base.components();
    let entry = lookup.get(index * n..index * n + n);
    let Some(entry) = entry else {
        return Ok([0, 0, 0]);
    };

    match base {
        ColorSpace::Gray => Ok([entry[0]; 3]),
        ColorSpace::Rgb => Ok([entry[0], entry[1], entry[2]]),
        ColorSpace::Cmyk => {
            let rgb = cmyk_to_rgb(entry);
            Ok([rgb[0], rgb[1], rgb[2]])
        }
        ColorSpace::Indexed { .. } | ColorSpace::Unsupported(_) => {
            Err(ExtractError::UnsupportedImage(format!(
                "Indexed base color space {:?}",
                base
            )))
        }
    }
}

/// Convert CMYK bytes to RGB.
fn cmyk_to_rgb(cmyk: &[u8]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity((cmyk.len() / 4) * 3);
    for chunk in cmyk.chunks_exact(4) {
        let c = f32::from(chunk[0]) / 255.0;
        let m = f32::from(chunk[1]) / 255.0;
        let y = f32::from(chunk[2]) / 255.0;
        let k = f32::from(chunk[3]) / 255.0;

        rgb.push((255.0 * (1.0 - c) * (1.0 - k)).round() as u8);
        rgb.push((255.0 * (1.0 - m) * (1.0 - k)).round() as u8);
        rgb.push((255.0 * (1.0 - y) * (1.0 - k)).round() as u8);
    }
    rgb
}

fn buffer_error(layout: &SampleLayout) -> ExtractError {
    ExtractError::Image(format!(
        "Cannot build {}x{} image buffer",
        layout.width, layout.height
    ))
}
