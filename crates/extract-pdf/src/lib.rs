//! PDF backend built on lopdf. Opens documents, handles the blank-password
//! decrypt and pulls image XObjects off each page.

mod colorspace;
mod document;
pub mod raster;

use std::fs::File;
use std::io::{BufReader, Read};

use lopdf::Document;

use extract_core::backend::PdfBackend;
use extract_core::error::{ExtractError, Result};

pub use colorspace::ColorSpace;
pub use document::{LopdfDocument, LopdfImage, LopdfImageExtractor, LopdfPage};

pub struct LopdfBackend;

impl PdfBackend for LopdfBackend {
    type Document = LopdfDocument;

    fn name(&self) -> &str {
        "lopdf"
    }

    fn load(&self, file: File) -> Result<LopdfDocument> {
        let mut bytes = Vec::new();
        BufReader::new(file)
            .read_to_end(&mut bytes)
            .map_err(|e| ExtractError::Pdf(format!("Failed to read PDF: {}", e)))?;

        let doc = Document::load_mem(&bytes)
            .map_err(|e| ExtractError::Pdf(format!("Failed to load PDF: {}", e)))?;
        log::debug!("Loaded PDF {} ({} bytes)", doc.version, bytes.len());

        Ok(LopdfDocument::new(doc))
    }
}
