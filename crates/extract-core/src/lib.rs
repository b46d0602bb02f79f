//! Core of the PDF image extractor: configuration, error type, the PDF backend
//! traits and the page-by-page extraction orchestrator.

pub mod backend;
pub mod config;
pub mod error;
pub mod pipeline;

pub use config::Config;
pub use error::{ExtractError, Result};
pub use pipeline::{extract_images, ExtractionEvent, ExtractionReport, Extractor, Outcome};
