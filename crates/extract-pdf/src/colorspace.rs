//! Resolve an image's `/ColorSpace` entry into something the raster layer can
//! map samples through.

use lopdf::{Document, Object, Stream};

use extract_core::error::{ExtractError, Result};

/// Color spaces image samples can be mapped from.
#[derive(Debug, Clone, PartialEq)]
pub enum ColorSpace {
    /// DeviceGray and CalGray.
    Gray,
    /// DeviceRGB and CalRGB.
    Rgb,
    Cmyk,
    /// Palette lookup. `lookup` holds `hival + 1` entries of `base` colors.
    Indexed {
        base: Box<ColorSpace>,
        hival: u8,
        lookup: Vec<u8>,
    },
    /// Anything else (Lab, Separation, DeviceN, named resources...).
    Unsupported(String),
}

impl ColorSpace {
    /// Number of color components per sample.
    pub fn components(&self) -> usize {
        match self {
            ColorSpace::Gray | ColorSpace::Indexed { .. } | ColorSpace::Unsupported(_) => 1,
            ColorSpace::Rgb => 3,
            ColorSpace::Cmyk => 4,
        }
    }

    fn from_name(name: &[u8]) -> ColorSpace {
        match name {
            b"DeviceGray" | b"G" | b"CalGray" => ColorSpace::Gray,
            b"DeviceRGB" | b"RGB" | b"CalRGB" => ColorSpace::Rgb,
            b"DeviceCMYK" | b"CMYK" => ColorSpace::Cmyk,
            other => ColorSpace::Unsupported(String::from_utf8_lossy(other).to_string()),
        }
    }
}

/// Resolve a `/ColorSpace` value, following references into the document.
pub fn resolve(doc: &Document, obj: &Object) -> Result<ColorSpace> {
    match deref(doc, obj)? {
        Object::Name(name) => Ok(ColorSpace::from_name(name)),
        Object::Array(items) => resolve_array(doc, items),
        other => Err(ExtractError::Pdf(format!(
            "Invalid color space object: {:?}",
            other
        ))),
    }
}

fn resolve_array(doc: &Document, items: &[Object]) -> Result<ColorSpace> {
    let family = match items.first().map(|o| deref(doc, o)).transpose()? {
        Some(Object::Name(name)) => name.as_slice(),
        _ => return Err(ExtractError::Pdf("Empty color space array".to_string())),
    };

    match family {
        b"CalGray" | b"CalRGB" | b"DeviceGray" | b"DeviceRGB" | b"DeviceCMYK" => {
            Ok(ColorSpace::from_name(family))
        }
        b"ICCBased" => {
            let profile = items
                .get(1)
                .ok_or_else(|| ExtractError::Pdf("ICCBased without profile stream".to_string()))?;
            let profile = deref(doc, profile)?
                .as_stream()
                .map_err(|e| ExtractError::Pdf(format!("ICC profile is not a stream: {}", e)))?;
            resolve_icc(doc, profile)
        }
        b"Indexed" | b"I" => resolve_indexed(doc, items),
        other => Ok(ColorSpace::Unsupported(
            String::from_utf8_lossy(other).to_string(),
        )),
    }
}

/// ICC profiles are not applied; the component count picks the device space.
fn resolve_icc(doc: &Document, profile: &Stream) -> Result<ColorSpace> {
    let n = profile
        .dict
        .get(b"N")
        .ok()
        .and_then(|o| o.as_i64().ok());

    match n {
        Some(1) => Ok(ColorSpace::Gray),
        Some(3) => Ok(ColorSpace::Rgb),
        Some(4) => Ok(ColorSpace::Cmyk),
        _ => match profile.dict.get(b"Alternate") {
            Ok(alternate) => resolve(doc, alternate),
            Err(_) => Ok(ColorSpace::Unsupported(format!("ICCBased N={:?}", n))),
        },
    }
}

fn resolve_indexed(doc: &Document, items: &[Object]) -> Result<ColorSpace> {
    if items.len() < 4 {
        return Err(ExtractError::Pdf(format!(
            "Indexed color space needs 4 entries, got {}",
            items.len()
        )));
    }

    let base = resolve(doc, &items[1])?;
    if matches!(base, ColorSpace::Indexed { .. }) {
        return Err(ExtractError::Pdf(
            "Indexed color space cannot have an Indexed base".to_string(),
        ));
    }

    let hival = deref(doc, &items[2])?
        .as_i64()
        .map_err(|e| ExtractError::Pdf(format!("Invalid Indexed hival: {}", e)))?
        .clamp(0, 255) as u8;

    let lookup = match deref(doc, &items[3])? {
        Object::String(bytes, _) => bytes.clone(),
        Object::Stream(stream) => stream_data(stream)?,
        other => {
            return Err(ExtractError::Pdf(format!(
                "Invalid Indexed lookup table: {:?}",
                other
            )))
        }
    };

    Ok(ColorSpace::Indexed {
        base: Box::new(base),
        hival,
        lookup,
    })
}

/// Follow a single indirect reference.
pub(crate) fn deref<'a>(doc: &'a Document, obj: &'a Object) -> Result<&'a Object> {
    match obj {
        Object::Reference(id) => doc
            .get_object(*id)
            .map_err(|e| ExtractError::Pdf(format!("Cannot resolve object {:?}: {}", id, e))),
        other => Ok(other),
    }
}

/// Stream content with its filters removed.
pub(crate) fn stream_data(stream: &Stream) -> Result<Vec<u8>> {
    if stream.dict.has(b"Filter") {
        stream
            .decompressed_content()
            .map_err(|e| ExtractError::Pdf(format!("Failed to decompress stream: {}", e)))
    } else {
        Ok(stream.content.clone())
    }
}
