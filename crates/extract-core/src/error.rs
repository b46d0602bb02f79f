use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("PDF error: {0}")]
    Pdf(String),

    #[error("Decryption error: {0}")]
    Encryption(String),

    #[error("Image processing error: {0}")]
    Image(String),

    #[error("Unsupported image: {0}")]
    UnsupportedImage(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl ExtractError {
    /// Wrap an I/O error together with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ExtractError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<image::ImageError> for ExtractError {
    fn from(e: image::ImageError) -> Self {
        ExtractError::Image(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ExtractError>;
