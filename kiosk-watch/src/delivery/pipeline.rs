//! Per-key delivery: fetch -> (decode + render) -> submit -> record
//!
//! Any failure skips the key for this iteration. Rendering and printing run
//! on the blocking pool; the loop still waits for them, one key at a time.

use std::path::Path;
use std::sync::Arc;

use chrono::Local;
use image::RgbImage;
use kiosk_printer::{
    BitmapPrinter, PaperSize, PrintError, PrintJob, RenderError, TextComposer, TextEncoding,
    Undecodable, decode_text, flatten_on_white, flatten_rgba,
};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::source::{ItemSource, SourceError, TempItem};
use crate::tracking::Ledger;

/// Step of the delivery that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStage {
    Fetch,
    Decode,
    Render,
    Submit,
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error(transparent)]
    Fetch(#[from] SourceError),

    #[error("Reading fetched item failed: {0}")]
    Read(#[source] std::io::Error),

    #[error(transparent)]
    Undecodable(#[from] Undecodable),

    #[error("Image decode failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("Render failed: {0}")]
    Render(#[from] RenderError),

    #[error("No text renderer configured for {0}")]
    NoRenderer(String),

    #[error("Print submission failed: {0}")]
    Submit(#[from] PrintError),

    #[error("Delivery task failed: {0}")]
    Task(String),
}

impl DeliveryError {
    pub fn stage(&self) -> DeliveryStage {
        match self {
            Self::Fetch(_) => DeliveryStage::Fetch,
            Self::Read(_) | Self::Undecodable(_) | Self::Image(_) => DeliveryStage::Decode,
            Self::Render(_) | Self::NoRenderer(_) => DeliveryStage::Render,
            Self::Submit(_) | Self::Task(_) => DeliveryStage::Submit,
        }
    }
}

/// Text items are rendered onto the template; everything else is an image
pub fn is_text_key(key: &str) -> bool {
    key.to_lowercase().ends_with(".txt")
}

pub struct Pipeline {
    source: Arc<dyn ItemSource>,
    printer: Arc<dyn BitmapPrinter>,
    composer: Option<Arc<dyn TextComposer>>,
    encodings: Arc<[TextEncoding]>,
    paper: Option<PaperSize>,
    doc_prefix: String,
}

impl Pipeline {
    pub fn new(source: Arc<dyn ItemSource>, printer: Arc<dyn BitmapPrinter>) -> Self {
        Self {
            source,
            printer,
            composer: None,
            encodings: TextEncoding::default_chain().into(),
            paper: None,
            doc_prefix: String::new(),
        }
    }

    /// Enable `.txt` items
    pub fn with_text(mut self, composer: Arc<dyn TextComposer>, encodings: Vec<TextEncoding>) -> Self {
        self.composer = Some(composer);
        self.encodings = encodings.into();
        self
    }

    pub fn with_paper(mut self, paper: Option<PaperSize>) -> Self {
        self.paper = paper;
        self
    }

    /// Prepended to the key to form the spooler document name
    pub fn with_doc_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.doc_prefix = prefix.into();
        self
    }

    pub fn printer_target(&self) -> String {
        self.printer.target()
    }

    /// Deliver one key and record it in the ledger
    ///
    /// A failed ledger append is logged only: the page is already printed.
    #[instrument(skip(self, ledger))]
    pub async fn deliver(&self, key: &str, ledger: &mut Ledger) -> Result<(), DeliveryError> {
        let item = self.source.fetch(key).await?;
        debug!(path = %item.path().display(), "Fetched");

        let composer = self.composer.clone();
        let encodings = Arc::clone(&self.encodings);
        let bitmap = tokio::task::spawn_blocking(move || {
            // `item` is dropped (temp file removed) when this closure returns
            prepare_bitmap(&item, composer.as_deref(), &encodings)
        })
        .await
        .map_err(|e| DeliveryError::Task(e.to_string()))??;

        let printer = Arc::clone(&self.printer);
        let job = PrintJob::new(format!("{}{}", self.doc_prefix, key)).with_paper(self.paper);
        tokio::task::spawn_blocking(move || printer.submit(&bitmap, &job))
            .await
            .map_err(|e| DeliveryError::Task(e.to_string()))??;

        if let Err(e) = ledger.record(key, Local::now()) {
            warn!(error = %e, "Printed but not persisted, continuing in memory only");
        }
        Ok(())
    }
}

/// Turn a fetched item into an opaque bitmap
fn prepare_bitmap(
    item: &TempItem,
    composer: Option<&dyn TextComposer>,
    encodings: &[TextEncoding],
) -> Result<RgbImage, DeliveryError> {
    if is_text_key(item.key()) {
        let composer = composer.ok_or_else(|| DeliveryError::NoRenderer(item.key().to_string()))?;
        let bytes = std::fs::read(item.path()).map_err(DeliveryError::Read)?;
        let decoded = decode_text(&bytes, encodings)?;
        debug!(encoding = decoded.encoding, "Text decoded");
        let rendered = composer.compose(&decoded.text)?;
        Ok(flatten_rgba(&rendered))
    } else {
        Ok(flatten_on_white(&open_image(item.path())?))
    }
}

fn open_image(path: &Path) -> Result<image::DynamicImage, DeliveryError> {
    let reader = image::ImageReader::open(path)
        .map_err(DeliveryError::Read)?
        .with_guessed_format()
        .map_err(DeliveryError::Read)?;
    Ok(reader.decode()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::FolderSource;
    use image::{Rgba, RgbaImage};
    use std::sync::Mutex;

    /// Records submitted bitmap sizes; fails while `fail` is set
    #[derive(Default)]
    struct RecordingPrinter {
        jobs: Mutex<Vec<(String, u32, u32)>>,
        fail: bool,
    }

    impl BitmapPrinter for RecordingPrinter {
        fn target(&self) -> String {
            "recording".to_string()
        }

        fn submit(&self, bitmap: &RgbImage, job: &PrintJob) -> kiosk_printer::PrintResult<()> {
            if self.fail {
                return Err(PrintError::Offline("recording".to_string()));
            }
            self.jobs
                .lock()
                .unwrap()
                .push((job.doc_name.clone(), bitmap.width(), bitmap.height()));
            Ok(())
        }
    }

    /// Blank 10x20 page regardless of the text
    struct BlankComposer;

    impl TextComposer for BlankComposer {
        fn compose(&self, _text: &str) -> kiosk_printer::RenderResult<RgbaImage> {
            Ok(RgbaImage::from_pixel(10, 20, Rgba([255, 255, 255, 255])))
        }
    }

    fn write_png(dir: &Path, name: &str) {
        RgbaImage::from_pixel(4, 3, Rgba([0, 0, 0, 128]))
            .save(dir.join(name))
            .unwrap();
    }

    fn setup(printer: Arc<RecordingPrinter>) -> (tempfile::TempDir, Pipeline, Ledger) {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(FolderSource::open(dir.path().join("in")).unwrap());
        let pipeline = Pipeline::new(source, printer).with_doc_prefix("kiosk: ");
        let ledger = Ledger::load(dir.path().join("printed_files.txt"));
        (dir, pipeline, ledger)
    }

    #[tokio::test]
    async fn test_image_delivered_and_recorded() {
        let printer = Arc::new(RecordingPrinter::default());
        let (dir, pipeline, mut ledger) = setup(printer.clone());
        write_png(&dir.path().join("in"), "photo.png");

        pipeline.deliver("photo.png", &mut ledger).await.unwrap();

        assert!(ledger.contains("photo.png"));
        let jobs = printer.jobs.lock().unwrap();
        assert_eq!(jobs.as_slice(), &[("kiosk: photo.png".to_string(), 4, 3)]);
    }

    #[tokio::test]
    async fn test_text_rendered_through_composer() {
        let printer = Arc::new(RecordingPrinter::default());
        let (dir, pipeline, mut ledger) = setup(printer.clone());
        let pipeline = pipeline.with_text(Arc::new(BlankComposer), TextEncoding::default_chain());
        std::fs::write(dir.path().join("in").join("note.TXT"), "Привет").unwrap();

        pipeline.deliver("note.TXT", &mut ledger).await.unwrap();
        assert_eq!(printer.jobs.lock().unwrap()[0].1, 10);
    }

    #[tokio::test]
    async fn test_text_without_renderer_is_skipped() {
        let printer = Arc::new(RecordingPrinter::default());
        let (dir, pipeline, mut ledger) = setup(printer.clone());
        std::fs::write(dir.path().join("in").join("note.txt"), "hi").unwrap();

        let err = pipeline.deliver("note.txt", &mut ledger).await.unwrap_err();
        assert_eq!(err.stage(), DeliveryStage::Render);
        assert!(!ledger.contains("note.txt"));
    }

    #[tokio::test]
    async fn test_undecodable_text_is_skipped() {
        let printer = Arc::new(RecordingPrinter::default());
        let (dir, pipeline, mut ledger) = setup(printer.clone());
        let pipeline = pipeline.with_text(Arc::new(BlankComposer), TextEncoding::default_chain());
        std::fs::write(dir.path().join("in").join("bin.txt"), [0u8, 1, 2]).unwrap();

        let err = pipeline.deliver("bin.txt", &mut ledger).await.unwrap_err();
        assert!(matches!(err, DeliveryError::Undecodable(_)));
        assert!(printer.jobs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_failure_not_recorded() {
        let printer = Arc::new(RecordingPrinter::default());
        let (_dir, pipeline, mut ledger) = setup(printer);

        let err = pipeline.deliver("missing.png", &mut ledger).await.unwrap_err();
        assert_eq!(err.stage(), DeliveryStage::Fetch);
        assert!(!ledger.contains("missing.png"));
    }

    #[tokio::test]
    async fn test_submit_failure_not_recorded() {
        let printer = Arc::new(RecordingPrinter {
            fail: true,
            ..Default::default()
        });
        let (dir, pipeline, mut ledger) = setup(printer);
        write_png(&dir.path().join("in"), "photo.png");

        let err = pipeline.deliver("photo.png", &mut ledger).await.unwrap_err();
        assert_eq!(err.stage(), DeliveryStage::Submit);
        assert!(!ledger.contains("photo.png"));
    }

    #[tokio::test]
    async fn test_corrupt_image_is_skipped() {
        let printer = Arc::new(RecordingPrinter::default());
        let (dir, pipeline, mut ledger) = setup(printer);
        std::fs::write(dir.path().join("in").join("broken.jpg"), b"not a jpeg").unwrap();

        let err = pipeline.deliver("broken.jpg", &mut ledger).await.unwrap_err();
        assert_eq!(err.stage(), DeliveryStage::Decode);
    }

    #[tokio::test]
    async fn test_ledger_append_failure_still_printed() {
        let printer = Arc::new(RecordingPrinter::default());
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(FolderSource::open(dir.path().join("in")).unwrap());
        let pipeline = Pipeline::new(source, printer.clone());
        let mut ledger = Ledger::load(dir.path().join("no-such-dir").join("ledger.txt"));
        write_png(&dir.path().join("in"), "photo.png");

        pipeline.deliver("photo.png", &mut ledger).await.unwrap();
        assert!(ledger.contains("photo.png"));
        assert!(!ledger.is_durable());
        assert_eq!(printer.jobs.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_text_key_detection() {
        assert!(is_text_key("a/b/Note.TXT"));
        assert!(!is_text_key("a/b/photo.jpg"));
        assert!(!is_text_key("txt"));
    }
}
