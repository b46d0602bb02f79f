//! List the image XObjects on every page of a PDF without writing anything.
//!
//! cargo run -p extract-pdf --example inspect_images -- file.pdf

use std::fs::File;

use extract_core::backend::{ImageExtractor, PageImage, PdfBackend, PdfDocument};
use extract_pdf::LopdfBackend;

fn main() -> extract_core::Result<()> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "input.pdf".to_string());
    let file = File::open(&path).map_err(|e| extract_core::ExtractError::io(&path, e))?;

    let mut doc = LopdfBackend.load(file)?;
    if doc.is_encrypted()? && !doc.decrypt("")? {
        println!("{}: needs a password", path);
        return Ok(());
    }

    for number in 1..=doc.page_count()? {
        let page = doc.page(number)?;
        let images = doc.image_extractor(&page)?.extract_page_images()?;
        println!("\n=== Page {} ({} images) ===", number, images.len());

        for (i, img) in images.iter().enumerate() {
            println!("  img[{}] {}", i, img.describe());
            println!("    SMask={}", img.has_soft_mask());
            match img.to_raster() {
                Ok(raster) => println!(
                    "    decoded {}x{} {:?}",
                    raster.width(),
                    raster.height(),
                    raster.color()
                ),
                Err(e) => println!("    cannot decode: {}", e),
            }
        }
    }

    Ok(())
}
