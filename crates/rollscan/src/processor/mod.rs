pub mod image;
pub mod pdf;

pub use pdf::PdfPageSource;

use crate::error::ProcessError;

/// One rendered page, ready for extraction.
#[derive(Debug, Clone)]
pub struct PageImage {
    /// 0-based page index within the document.
    pub index: usize,
    /// PNG-encoded page raster.
    pub png: Vec<u8>,
}

/// A source of rendered pages for one document.
///
/// The pipeline depends on this seam rather than on PDF tooling directly,
/// so tests can inject synthetic pages.
pub trait PageSource: Send + Sync {
    /// Display label for the document, typically its file name.
    fn label(&self) -> &str;

    /// Renders every page in order. Fails at the document level if the
    /// source is unreadable or contains no pages.
    fn render_pages(&self) -> Result<Vec<PageImage>, ProcessError>;
}
