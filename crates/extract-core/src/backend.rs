//! Capability traits for the PDF library the extractor runs on.
//!
//! The orchestrator only ever talks to these traits, so any PDF library that
//! can open a document, handle a blank-password decrypt, enumerate pages and
//! hand back page images can drive it.

use std::fs::File;

use image::DynamicImage;

use crate::error::Result;

/// Entry point into a PDF library: turns an opened file into a document.
pub trait PdfBackend {
    type Document: PdfDocument;

    /// Human-readable name of this backend.
    fn name(&self) -> &str;

    /// Parse the PDF object model from an already opened file.
    fn load(&self, file: File) -> Result<Self::Document>;
}

/// An opened PDF document.
pub trait PdfDocument {
    /// Handle for a single page.
    type Page;

    /// An image pulled out of a page.
    type Image: PageImage;

    /// Per-page image extractor. Borrows the document it extracts from.
    type Extractor<'a>: ImageExtractor<Image = Self::Image>
    where
        Self: 'a;

    /// Whether the document carries an encryption dictionary.
    fn is_encrypted(&self) -> Result<bool>;

    /// Try to decrypt with `password`.
    ///
    /// `Ok(false)` means the call itself worked but the password was not
    /// accepted. `Err` is reserved for documents whose encryption cannot be
    /// processed at all.
    fn decrypt(&mut self, password: &str) -> Result<bool>;

    /// Total number of pages.
    fn page_count(&self) -> Result<u32>;

    /// Look up a page by its 1-based number.
    fn page(&self, number: u32) -> Result<Self::Page>;

    /// Build the image extractor for `page`.
    fn image_extractor(&self, page: &Self::Page) -> Result<Self::Extractor<'_>>;
}

/// Pulls the raster images placed on one page.
pub trait ImageExtractor {
    type Image: PageImage;

    /// All images on the page, in the order the library reports them.
    fn extract_page_images(&self) -> Result<Vec<Self::Image>>;
}

/// A single image found on a page.
pub trait PageImage {
    /// Short description used in log output.
    fn describe(&self) -> String;

    /// Decode into a standard raster image.
    fn to_raster(&self) -> Result<DynamicImage>;
}
