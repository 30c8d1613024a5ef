use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::ProcessError;

use super::{PageImage, PageSource};

/// Renders the pages of a scanned PDF with poppler's `pdftoppm`.
///
/// Page counting goes through lopdf first; when lopdf cannot parse the
/// file (e.g. a damaged cross-reference table), `pdfinfo` handles more
/// PDF variants.
pub struct PdfPageSource {
    path: PathBuf,
    label: String,
    dpi: u32,
}

impl PdfPageSource {
    pub fn new(path: PathBuf, dpi: u32) -> Self {
        let label = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("document.pdf")
            .to_string();
        Self { path, label, dpi }
    }

    fn count_pages(&self, pdf_bytes: &[u8]) -> Result<usize, ProcessError> {
        match lopdf::Document::load_mem(pdf_bytes) {
            Ok(doc) => Ok(doc.get_pages().len()),
            Err(e) => {
                tracing::warn!(
                    "lopdf failed to parse {}: {}. Falling back to pdfinfo.",
                    self.path.display(),
                    e
                );
                count_pages_with_pdfinfo(pdf_bytes)
            }
        }
    }
}

impl PageSource for PdfPageSource {
    fn label(&self) -> &str {
        &self.label
    }

    fn render_pages(&self) -> Result<Vec<PageImage>, ProcessError> {
        let _span = tracing::info_span!("processor.pdf", file = %self.label).entered();

        let pdf_bytes = std::fs::read(&self.path).map_err(|e| ProcessError::ReadDocument {
            path: self.path.to_path_buf(),
            source: e,
        })?;

        let page_count = self.count_pages(&pdf_bytes)?;
        if page_count == 0 {
            return Err(ProcessError::EmptyDocument(self.path.to_path_buf()));
        }

        let mut pages = Vec::with_capacity(page_count);
        for index in 0..page_count {
            let png = render_pdf_page_to_png(&pdf_bytes, index as u32 + 1, self.dpi)?;
            pages.push(PageImage { index, png });
        }

        tracing::debug!("rendered {} page(s) from {}", pages.len(), self.label);
        Ok(pages)
    }
}

/// Get the page count of a PDF using pdfinfo (poppler-utils).
/// Used as fallback when lopdf can't parse the PDF structure.
fn count_pages_with_pdfinfo(pdf_bytes: &[u8]) -> Result<usize, ProcessError> {
    let temp_dir = std::env::temp_dir();
    let pdf_path = temp_dir.join(format!("rollscan_pagecount_{}.pdf", uuid::Uuid::new_v4()));

    std::fs::write(&pdf_path, pdf_bytes)
        .map_err(|e| ProcessError::PdfProcessing(format!("Failed to write temp PDF: {}", e)))?;

    let output = Command::new("pdfinfo").arg(&pdf_path).output().map_err(|e| {
        let _ = std::fs::remove_file(&pdf_path);
        ProcessError::PdfProcessing(format!(
            "Failed to run pdfinfo: {}. Make sure poppler-utils is installed.",
            e
        ))
    })?;

    let _ = std::fs::remove_file(&pdf_path);

    if !output.status.success() {
        return Err(ProcessError::PdfProcessing(format!(
            "pdfinfo failed: {}",
            String::from_utf8_lossy(&output.stderr)
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    for line in stdout.lines() {
        if let Some(count_str) = line.strip_prefix("Pages:") {
            if let Ok(count) = count_str.trim().parse::<usize>() {
                return Ok(count);
            }
        }
    }

    Err(ProcessError::PdfProcessing(
        "pdfinfo output did not report a page count".to_string(),
    ))
}

/// Renders one page (1-based) to PNG bytes via pdftoppm.
fn render_pdf_page_to_png(
    pdf_bytes: &[u8],
    page_num: u32,
    dpi: u32,
) -> Result<Vec<u8>, ProcessError> {
    let temp_dir = std::env::temp_dir();
    let pdf_path = temp_dir.join(format!("rollscan_temp_{}.pdf", uuid::Uuid::new_v4()));
    let output_prefix = temp_dir.join(format!("rollscan_page_{}", uuid::Uuid::new_v4()));

    std::fs::write(&pdf_path, pdf_bytes)
        .map_err(|e| ProcessError::PdfProcessing(format!("Failed to write temp PDF: {}", e)))?;

    let output = Command::new("pdftoppm")
        .args([
            "-png",
            "-r",
            &dpi.to_string(),
            "-f",
            &page_num.to_string(),
            "-l",
            &page_num.to_string(),
            &pdf_path.to_string_lossy(),
            &output_prefix.to_string_lossy(),
        ])
        .output()
        .map_err(|e| {
            ProcessError::PdfProcessing(format!(
                "Failed to run pdftoppm: {}. Make sure poppler-utils is installed.",
                e
            ))
        });

    let _ = std::fs::remove_file(&pdf_path);
    let output = output?;

    if !output.status.success() {
        return Err(ProcessError::PdfProcessing(format!(
            "pdftoppm failed on page {}: {}",
            page_num,
            String::from_utf8_lossy(&output.stderr)
        )));
    }

    // pdftoppm pads the page number suffix depending on the page count.
    let candidates = [
        format!("{}-{}.png", output_prefix.display(), page_num),
        format!("{}-{:02}.png", output_prefix.display(), page_num),
        format!("{}-{:03}.png", output_prefix.display(), page_num),
    ];
    let image_path = candidates
        .iter()
        .find(|p| Path::new(p).exists())
        .ok_or_else(|| {
            ProcessError::PdfProcessing("Failed to find rendered page image".to_string())
        })?;

    let png = std::fs::read(image_path).map_err(|e| {
        ProcessError::PdfProcessing(format!("Failed to read rendered image: {}", e))
    })?;

    let _ = std::fs::remove_file(image_path);

    Ok(png)
}
