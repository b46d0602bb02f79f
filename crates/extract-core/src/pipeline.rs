//! Extraction orchestrator: walks a document page by page and writes every
//! image it finds as a PNG file.
//!
//! The run is strictly sequential:
//!   1. open the input file and load it through the backend
//!   2. if the document is encrypted, try an empty password
//!   3. for each page: extract images, convert, write `page_<n>_<i>.png`
//!
//! The first error aborts the run. Files written for earlier pages stay on
//! disk.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use image::ImageFormat;
use log::{debug, info};

use crate::backend::{ImageExtractor, PageImage, PdfBackend, PdfDocument};
use crate::error::{ExtractError, Result};

/// Progress reporter callback type.
pub type ProgressReporter = Box<dyn Fn(&ExtractionEvent) + Send + Sync>;

/// Progress notifications emitted while a run is in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionEvent {
    /// The document is encrypted and the empty password was rejected.
    PasswordRequired,
    PageCount(u32),
    PageStarted(u32),
    PageImages { page: u32, count: usize },
    ImageWritten { page: u32, index: usize, path: PathBuf },
    Finished { total_images: usize },
}

/// What a completed run produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionReport {
    pub page_count: u32,
    /// Image count for each page, in page order.
    pub images_per_page: Vec<usize>,
    pub written: Vec<PathBuf>,
}

impl ExtractionReport {
    pub fn total_images(&self) -> usize {
        self.images_per_page.iter().sum()
    }
}

/// Successful end states of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Completed(ExtractionReport),
    /// Encrypted with a non-empty password; nothing was extracted.
    PasswordRequired,
}

/// File name for the `index`-th image (0-based) on page `page` (1-based).
pub fn output_file_name(page: u32, index: usize) -> String {
    format!("page_{}_{}.png", page, index)
}

/// Runs extraction against a PDF backend.
pub struct Extractor<B> {
    backend: B,
    progress_reporter: Option<ProgressReporter>,
}

impl<B: PdfBackend> Extractor<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            progress_reporter: None,
        }
    }

    pub fn progress_reporter(mut self, reporter: ProgressReporter) -> Self {
        self.progress_reporter = Some(reporter);
        self
    }

    /// Extract every image of `input_path` into `output_dir`.
    ///
    /// `output_dir` must already exist.
    pub fn run(&self, input_path: &Path, output_dir: &Path) -> Result<Outcome> {
        let file = File::open(input_path).map_err(|e| ExtractError::io(input_path, e))?;

        info!(
            "Reading PDF with {}: {}",
            self.backend.name(),
            input_path.display()
        );
        let mut doc = self.backend.load(file)?;

        if doc.is_encrypted()? {
            info!("Document is encrypted, trying empty password");
            if !doc.decrypt("")? {
                info!("Empty password rejected, nothing to extract");
                self.report(ExtractionEvent::PasswordRequired);
                return Ok(Outcome::PasswordRequired);
            }
        }

        let page_count = doc.page_count()?;
        info!("PDF has {} pages", page_count);
        self.report(ExtractionEvent::PageCount(page_count));

        let mut report = ExtractionReport {
            page_count,
            ..Default::default()
        };

        for page_number in 1..=page_count {
            self.report(ExtractionEvent::PageStarted(page_number));

            let page = doc.page(page_number)?;
            let extractor = doc.image_extractor(&page)?;
            let images = extractor.extract_page_images()?;

            debug!("Page {}: {} images", page_number, images.len());
            self.report(ExtractionEvent::PageImages {
                page: page_number,
                count: images.len(),
            });

            for (index, image) in images.iter().enumerate() {
                let path = output_dir.join(output_file_name(page_number, index));
                debug!("Writing {} -> {}", image.describe(), path.display());
                write_png(image, &path)?;

                self.report(ExtractionEvent::ImageWritten {
                    page: page_number,
                    index,
                    path: path.clone(),
                });
                report.written.push(path);
            }

            report.images_per_page.push(images.len());
        }

        let total_images = report.total_images();
        info!("Extracted {} images from {} pages", total_images, page_count);
        self.report(ExtractionEvent::Finished { total_images });

        Ok(Outcome::Completed(report))
    }

    fn report(&self, event: ExtractionEvent) {
        if let Some(ref reporter) = self.progress_reporter {
            reporter(&event);
        }
    }
}

/// Extract every image of `input_path` into `output_dir` without progress
/// reporting.
pub fn extract_images<B: PdfBackend>(
    backend: B,
    input_path: &Path,
    output_dir: &Path,
) -> Result<Outcome> {
    Extractor::new(backend).run(input_path, output_dir)
}

/// Convert one page image and encode it as PNG at `path`.
fn write_png<I: PageImage>(image: &I, path: &Path) -> Result<()> {
    let raster = image.to_raster()?;

    let file = File::create(path).map_err(|e| ExtractError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    raster.write_to(&mut writer, ImageFormat::Png)?;
    writer.flush().map_err(|e| ExtractError::io(path, e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgb, RgbImage};
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, Copy, Default, PartialEq)]
    enum Encryption {
        #[default]
        None,
        EmptyPassword,
        NeedsPassword,
        Broken,
    }

    #[derive(Debug, Clone)]
    struct TestImage {
        width: u32,
        height: u32,
        shade: u8,
        corrupt: bool,
    }

    impl TestImage {
        fn new(width: u32, height: u32, shade: u8) -> Self {
            Self {
                width,
                height,
                shade,
                corrupt: false,
            }
        }

        fn corrupt() -> Self {
            Self {
                corrupt: true,
                ..Self::new(1, 1, 0)
            }
        }
    }

    impl PageImage for TestImage {
        fn describe(&self) -> String {
            format!("{}x{} test image", self.width, self.height)
        }

        fn to_raster(&self) -> Result<DynamicImage> {
            if self.corrupt {
                return Err(ExtractError::Image("corrupt sample data".to_string()));
            }
            let shade = self.shade;
            Ok(DynamicImage::ImageRgb8(RgbImage::from_pixel(
                self.width,
                self.height,
                Rgb([shade, shade / 2, 255 - shade]),
            )))
        }
    }

    #[derive(Debug, Clone, Default)]
    struct TestBackend {
        pages: Vec<Vec<TestImage>>,
        encryption: Encryption,
        missing_page: Option<u32>,
    }

    struct TestDocument {
        backend: TestBackend,
    }

    struct TestExtractor<'a> {
        images: &'a [TestImage],
    }

    impl ImageExtractor for TestExtractor<'_> {
        type Image = TestImage;

        fn extract_page_images(&self) -> Result<Vec<TestImage>> {
            Ok(self.images.to_vec())
        }
    }

    impl PdfBackend for TestBackend {
        type Document = TestDocument;

        fn name(&self) -> &str {
            "Test Backend"
        }

        fn load(&self, _file: File) -> Result<TestDocument> {
            Ok(TestDocument {
                backend: self.clone(),
            })
        }
    }

    impl PdfDocument for TestDocument {
        type Page = u32;
        type Image = TestImage;
        type Extractor<'a> = TestExtractor<'a>;

        fn is_encrypted(&self) -> Result<bool> {
            Ok(self.backend.encryption != Encryption::None)
        }

        fn decrypt(&mut self, password: &str) -> Result<bool> {
            match self.backend.encryption {
                Encryption::Broken => {
                    Err(ExtractError::Encryption("bad /Encrypt dictionary".to_string()))
                }
                Encryption::NeedsPassword => Ok(false),
                Encryption::EmptyPassword | Encryption::None => Ok(password.is_empty()),
            }
        }

        fn page_count(&self) -> Result<u32> {
            Ok(self.backend.pages.len() as u32)
        }

        fn page(&self, number: u32) -> Result<u32> {
            if self.backend.missing_page == Some(number) {
                return Err(ExtractError::Pdf(format!("page {} not found", number)));
            }
            Ok(number)
        }

        fn image_extractor(&self, page: &u32) -> Result<TestExtractor<'_>> {
            Ok(TestExtractor {
                images: &self.backend.pages[(*page - 1) as usize],
            })
        }
    }

    fn setup() -> (tempfile::TempDir, PathBuf, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input.pdf");
        std::fs::write(&input, b"%PDF-1.5\n").unwrap();
        let output = dir.path().join("out");
        std::fs::create_dir(&output).unwrap();
        (dir, input, output)
    }

    fn sorted_listing(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_output_file_name() {
        assert_eq!(output_file_name(1, 0), "page_1_0.png");
        assert_eq!(output_file_name(12, 3), "page_12_3.png");
    }

    #[test]
    fn test_writes_one_file_per_image() {
        let (_dir, input, output) = setup();
        let backend = TestBackend {
            pages: vec![
                vec![TestImage::new(4, 3, 10), TestImage::new(2, 2, 200)],
                vec![],
                vec![TestImage::new(1, 5, 90)],
            ],
            ..Default::default()
        };

        let outcome = extract_images(backend, &input, &output).unwrap();
        let report = match outcome {
            Outcome::Completed(report) => report,
            other => panic!("expected completed run, got {:?}", other),
        };

        assert_eq!(report.page_count, 3);
        assert_eq!(report.images_per_page, vec![2, 0, 1]);
        assert_eq!(report.total_images(), 3);
        assert_eq!(
            sorted_listing(&output),
            vec!["page_1_0.png", "page_1_1.png", "page_3_0.png"]
        );

        let decoded = image::open(output.join("page_1_0.png")).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (4, 3));
        assert_eq!(decoded.to_rgb8().get_pixel(0, 0), &Rgb([10, 5, 245]));
    }

    #[test]
    fn test_missing_input_fails_before_pages() {
        let (dir, _input, output) = setup();
        let events = Arc::new(Mutex::new(Vec::new()));
        let events_clone = events.clone();

        let backend = TestBackend {
            pages: vec![vec![TestImage::new(1, 1, 0)]],
            ..Default::default()
        };
        let err = Extractor::new(backend)
            .progress_reporter(Box::new(move |e| {
                events_clone.lock().unwrap().push(e.clone());
            }))
            .run(&dir.path().join("missing.pdf"), &output)
            .unwrap_err();

        assert!(matches!(err, ExtractError::Io { .. }));
        assert!(events.lock().unwrap().is_empty());
        assert!(sorted_listing(&output).is_empty());
    }

    #[test]
    fn test_password_required_is_soft_stop() {
        let (_dir, input, output) = setup();
        let events = Arc::new(Mutex::new(Vec::new()));
        let events_clone = events.clone();

        let backend = TestBackend {
            pages: vec![vec![TestImage::new(1, 1, 0)]],
            encryption: Encryption::NeedsPassword,
            ..Default::default()
        };
        let outcome = Extractor::new(backend)
            .progress_reporter(Box::new(move |e| {
                events_clone.lock().unwrap().push(e.clone());
            }))
            .run(&input, &output)
            .unwrap();

        assert_eq!(outcome, Outcome::PasswordRequired);
        assert_eq!(
            *events.lock().unwrap(),
            vec![ExtractionEvent::PasswordRequired]
        );
        assert!(sorted_listing(&output).is_empty());
    }

    #[test]
    fn test_empty_password_unlocks_document() {
        let (_dir, input, output) = setup();
        let backend = TestBackend {
            pages: vec![vec![TestImage::new(2, 2, 50)]],
            encryption: Encryption::EmptyPassword,
            ..Default::default()
        };

        let outcome = extract_images(backend, &input, &output).unwrap();
        assert!(matches!(outcome, Outcome::Completed(ref r) if r.total_images() == 1));
        assert_eq!(sorted_listing(&output), vec!["page_1_0.png"]);
    }

    #[test]
    fn test_broken_encryption_is_fatal() {
        let (_dir, input, output) = setup();
        let backend = TestBackend {
            pages: vec![vec![TestImage::new(1, 1, 0)]],
            encryption: Encryption::Broken,
            ..Default::default()
        };

        let err = extract_images(backend, &input, &output).unwrap_err();
        assert!(matches!(err, ExtractError::Encryption(_)));
        assert!(sorted_listing(&output).is_empty());
    }

    #[test]
    fn test_conversion_error_aborts_but_keeps_earlier_files() {
        let (_dir, input, output) = setup();
        let backend = TestBackend {
            pages: vec![
                vec![TestImage::new(1, 1, 0)],
                vec![TestImage::new(1, 1, 0), TestImage::corrupt()],
                vec![TestImage::new(1, 1, 0)],
            ],
            ..Default::default()
        };

        let err = extract_images(backend, &input, &output).unwrap_err();
        assert!(matches!(err, ExtractError::Image(_)));
        assert_eq!(sorted_listing(&output), vec!["page_1_0.png", "page_2_0.png"]);
    }

    #[test]
    fn test_missing_page_aborts() {
        let (_dir, input, output) = setup();
        let backend = TestBackend {
            pages: vec![vec![TestImage::new(1, 1, 0)], vec![TestImage::new(1, 1, 0)]],
            missing_page: Some(2),
            ..Default::default()
        };

        let err = extract_images(backend, &input, &output).unwrap_err();
        assert!(matches!(err, ExtractError::Pdf(_)));
        assert_eq!(sorted_listing(&output), vec!["page_1_0.png"]);
    }

    #[test]
    fn test_missing_output_dir_is_fatal() {
        let (dir, input, _output) = setup();
        let backend = TestBackend {
            pages: vec![vec![TestImage::new(1, 1, 0)]],
            ..Default::default()
        };

        let err = extract_images(backend, &input, &dir.path().join("absent")).unwrap_err();
        match err {
            ExtractError::Io { path, .. } => assert!(path.ends_with("page_1_0.png")),
            other => panic!("expected I/O error, got {:?}", other),
        }
    }

    #[test]
    fn test_rerun_overwrites_with_identical_files() {
        let (_dir, input, output) = setup();
        let backend = TestBackend {
            pages: vec![vec![TestImage::new(3, 3, 7), TestImage::new(5, 1, 99)]],
            ..Default::default()
        };

        extract_images(backend.clone(), &input, &output).unwrap();
        let first: Vec<Vec<u8>> = sorted_listing(&output)
            .iter()
            .map(|n| std::fs::read(output.join(n)).unwrap())
            .collect();

        extract_images(backend, &input, &output).unwrap();
        let second: Vec<Vec<u8>> = sorted_listing(&output)
            .iter()
            .map(|n| std::fs::read(output.join(n)).unwrap())
            .collect();

        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
    }

    #[test]
    fn test_event_order() {
        let (_dir, input, output) = setup();
        let events = Arc::new(Mutex::new(Vec::new()));
        let events_clone = events.clone();

        let backend = TestBackend {
            pages: vec![vec![], vec![TestImage::new(1, 1, 0)]],
            ..Default::default()
        };
        Extractor::new(backend)
            .progress_reporter(Box::new(move |e| {
                events_clone.lock().unwrap().push(e.clone());
            }))
            .run(&input, &output)
            .unwrap();

        let events = events.lock().unwrap();
        assert_eq!(
            *events,
            vec![
                ExtractionEvent::PageCount(2),
                ExtractionEvent::PageStarted(1),
                ExtractionEvent::PageImages { page: 1, count: 0 },
                ExtractionEvent::PageStarted(2),
                ExtractionEvent::PageImages { page: 2, count: 1 },
                ExtractionEvent::ImageWritten {
                    page: 2,
                    index: 0,
                    path: output.join("page_2_0.png"),
                },
                ExtractionEvent::Finished { total_images: 1 },
            ]
        );
    }
}
