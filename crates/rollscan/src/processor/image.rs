use std::io::Cursor;

use image::{GenericImageView, ImageFormat};

use crate::error::ProcessError;

/// Splits a rendered page into top and bottom halves.
///
/// Dense record pages overload single vision calls; extracting each half
/// separately recovers entries the model would otherwise skip. Returns
/// `(top, bottom)` as PNG bytes.
pub fn split_page_png(png: &[u8]) -> Result<(Vec<u8>, Vec<u8>), ProcessError> {
    let page = image::load_from_memory(png)
        .map_err(|e| ProcessError::ImageProcessing(format!("Failed to decode page: {}", e)))?;

    let width = page.width();
    let height = page.height();
    if height < 2 {
        return Err(ProcessError::ImageProcessing(format!(
            "Page too small to split ({}x{})",
            width, height
        )));
    }

    let midpoint = height / 2;
    let top = page.crop_imm(0, 0, width, midpoint);
    let bottom = page.crop_imm(0, midpoint, width, height - midpoint);

    Ok((encode_png(&top)?, encode_png(&bottom)?))
}

fn encode_png(img: &image::DynamicImage) -> Result<Vec<u8>, ProcessError> {
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png)
        .map_err(|e| ProcessError::ImageProcessing(format!("Failed to encode half: {}", e)))?;
    Ok(buf.into_inner())
}
