//! lopdf-backed document, page and image handles.

use std::collections::{BTreeMap, HashSet};

use image::DynamicImage;
use lopdf::encryption::DecryptionError;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

use extract_core::backend::{ImageExtractor, PageImage, PdfDocument};
use extract_core::error::{ExtractError, Result};

use crate::colorspace::{self, deref, ColorSpace};
use crate::raster;

/// An opened PDF.
pub struct LopdfDocument {
    inner: Document,
    /// 1-based page number → page object.
    pages: BTreeMap<u32, ObjectId>,
}

impl LopdfDocument {
    pub fn new(inner: Document) -> Self {
        let pages = inner.get_pages();
        Self { inner, pages }
    }
}

/// A page of a [`LopdfDocument`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LopdfPage {
    pub number: u32,
    pub id: ObjectId,
}

impl PdfDocument for LopdfDocument {
    type Page = LopdfPage;
    type Image = LopdfImage;
    type Extractor<'a> = LopdfImageExtractor<'a>;

    fn is_encrypted(&self) -> Result<bool> {
        Ok(self.inner.is_encrypted())
    }

    fn decrypt(&mut self, password: &str) -> Result<bool> {
        match self.inner.decrypt(password) {
            Ok(()) => {
                self.pages = self.inner.get_pages();
                Ok(true)
            }
            Err(lopdf::Error::Decryption(DecryptionError::IncorrectPassword)) => Ok(false),
            Err(e) => Err(ExtractError::Encryption(e.to_string())),
        }
    }

    fn page_count(&self) -> Result<u32> {
        Ok(self.pages.len() as u32)
    }

    fn page(&self, number: u32) -> Result<LopdfPage> {
        self.pages
            .get(&number)
            .map(|&id| LopdfPage { number, id })
            .ok_or_else(|| {
                ExtractError::Pdf(format!(
                    "Page {} not found ({} pages)",
                    number,
                    self.pages.len()
                ))
            })
    }

    fn image_extractor(&self, page: &LopdfPage) -> Result<LopdfImageExtractor<'_>> {
        let resources = match inherited(&self.inner, page.id, b"Resources")? {
            Some(obj) => Some(deref(&self.inner, obj)?.as_dict().map_err(|e| {
                ExtractError::Pdf(format!("Page {} /Resources: {}", page.number, e))
            })?),
            None => None,
        };

        Ok(LopdfImageExtractor {
            doc: &self.inner,
            page: *page,
            resources,
        })
    }
}

/// Look up `key` on a page, walking up the page tree via `/Parent`.
fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Result<Option<&'a Object>> {
    let mut visited = HashSet::new();
    let mut current_id = page_id;
    loop {
        if !visited.insert(current_id) {
            return Err(ExtractError::Pdf(format!(
                "Reference cycle in page tree at object {} {} R",
                current_id.0, current_id.1
            )));
        }
        let dict = doc
            .get_dictionary(current_id)
            .map_err(|e| ExtractError::Pdf(format!("Cannot read page tree node: {}", e)))?;

        if let Ok(value) = dict.get(key) {
            return Ok(Some(value));
        }

        match dict.get(b"Parent").and_then(Object::as_reference) {
            Ok(parent) => current_id = parent,
            Err(_) => return Ok(None),
        }
    }
}

/// Collects the image XObjects listed in a page's resources.
pub struct LopdfImageExtractor<'a> {
    doc: &'a Document,
    page: LopdfPage,
    resources: Option<&'a Dictionary>,
}

impl ImageExtractor for LopdfImageExtractor<'_> {
    type Image = LopdfImage;

    fn extract_page_images(&self) -> Result<Vec<LopdfImage>> {
        let Some(resources) = self.resources else {
            return Ok(Vec::new());
        };
        let xobjects = match resources.get(b"XObject") {
            Ok(obj) => deref(self.doc, obj)?.as_dict().map_err(|e| {
                ExtractError::Pdf(format!("Page {} /XObject: {}", self.page.number, e))
            })?,
            Err(_) => return Ok(Vec::new()),
        };

        let mut images = Vec::new();
        for (name, value) in xobjects.iter() {
            let name = String::from_utf8_lossy(name).to_string();
            let id = value.as_reference().map_err(|e| {
                ExtractError::Pdf(format!("XObject /{} is not a reference: {}", name, e))
            })?;
            let stream = self
                .doc
                .get_object(id)
                .and_then(Object::as_stream)
                .map_err(|e| ExtractError::Pdf(format!("XObject /{}: {}", name, e)))?;

            if !is_image(&stream.dict) {
                log::debug!("Page {}: skipping non-image XObject /{}", self.page.number, name);
                continue;
            }

            let color_space = match stream.dict.get(b"ColorSpace") {
                Ok(cs) => Some(colorspace::resolve(self.doc, cs)?),
                Err(_) => None,
            };

            images.push(LopdfImage {
                id,
                name,
                stream: stream.clone(),
                color_space,
            });
        }

        Ok(images)
    }
}

fn is_image(dict: &Dictionary) -> bool {
    matches!(dict.get(b"Subtype"), Ok(Object::Name(subtype)) if subtype.as_slice() == b"Image")
}

/// An image XObject pulled off a page.
#[derive(Debug, Clone)]
pub struct LopdfImage {
    id: ObjectId,
    name: String,
    stream: Stream,
    color_space: Option<ColorSpace>,
}

impl LopdfImage {
    /// Resource name the page refers to the image by.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn filters(&self) -> Vec<String> {
        raster::filter_names(&self.stream.dict)
    }

    pub fn color_space(&self) -> Option<&ColorSpace> {
        self.color_space.as_ref()
    }

    /// Soft masks are not applied; the PNG carries the base image only.
    pub fn has_soft_mask(&self) -> bool {
        self.stream.dict.has(b"SMask")
    }
}

impl PageImage for LopdfImage {
    fn describe(&self) -> String {
        format!(
            "/{} ({} {} R, filters={:?}, color space={:?})",
            self.name,
            self.id.0,
            self.id.1,
            self.filters(),
            self.color_space
        )
    }

    fn to_raster(&self) -> Result<DynamicImage> {
        raster::decode_image(&self.stream, self.color_space.as_ref())
    }
}
