//! QR rendering and discovery.
//!
//! Stamping rasterizes the QR matrix directly into the rectangle computed
//! by [`crate::geometry`], so the stamped pixels and the exclusion zone can
//! never disagree about where the seal sits. Locating runs `rqrr` over the
//! whole image, or over a caller-supplied sub-rectangle as a manual assist
//! when automatic detection fails.

use image::{GrayImage, Rgba, RgbaImage};
use qrcode::{EcLevel, QrCode};

use crate::error::{Result, SealError};
use crate::geometry::{PixelRect, SealGeometry};
use crate::hash::{blank_region, parse_fill_color};

/// Quiet-zone width in modules on each side of the QR code.
const QUIET_ZONE_MODULES: u32 = 2;

/// Stamp the seal onto the image: blank the exclusion zone with the fill
/// color, then draw the QR code centered in its computed rectangle. The
/// caption band beneath the QR stays blank for the presentation layer to
/// render into.
pub fn stamp_seal(
    pixels: &mut RgbaImage,
    payload: &str,
    geometry: &SealGeometry,
    fill_color: &str,
) -> Result<()> {
    if !geometry.exclusion.fits_within(pixels.width(), pixels.height()) {
        return Err(SealError::QrError(format!(
            "seal geometry does not fit a {}x{} image",
            pixels.width(),
            pixels.height()
        )));
    }

    let fill = parse_fill_color(fill_color)?;
    blank_region(pixels, geometry.exclusion, fill);

    let code = QrCode::with_error_correction_level(payload.as_bytes(), EcLevel::M)
        .map_err(|e| SealError::QrError(format!("failed to build QR code: {}", e)))?;
    let modules = code.width() as u32;
    let total = modules + 2 * QUIET_ZONE_MODULES;

    let scale = geometry.qr.width / total;
    if scale == 0 {
        return Err(SealError::QrError(format!(
            "payload needs {} modules but the {}px seal cannot render them; \
             enlarge the seal or shorten the payload",
            total, geometry.qr.width
        )));
    }

    // Center the rendered code within the QR rectangle.
    let rendered = total * scale;
    let offset_x = geometry.qr.x + (geometry.qr.width - rendered) / 2 + QUIET_ZONE_MODULES * scale;
    let offset_y = geometry.qr.y + (geometry.qr.height - rendered) / 2 + QUIET_ZONE_MODULES * scale;

    let dark = Rgba([0, 0, 0, 255]);
    let colors = code.to_colors();
    for my in 0..modules {
        for mx in 0..modules {
            if colors[(my * modules + mx) as usize] == qrcode::Color::Dark {
                let rect = PixelRect::new(
                    offset_x + mx * scale,
                    offset_y + my * scale,
                    scale,
                    scale,
                );
                blank_region(pixels, rect, dark);
            }
        }
    }

    Ok(())
}

/// Locate and decode a QR payload in an image.
///
/// When `region` is given, detection is constrained to that sub-rectangle.
/// Returns the decoded payload of the first readable QR code.
pub fn locate_and_decode(image_bytes: &[u8], region: Option<PixelRect>) -> Result<String> {
    let image = image::load_from_memory(image_bytes)
        .map_err(|e| SealError::ImageError(format!("failed to decode image: {}", e)))?;
    let gray = image.to_luma8();

    let search: GrayImage = match region {
        Some(rect) => {
            if !rect.fits_within(gray.width(), gray.height()) {
                return Err(SealError::QrError(format!(
                    "selection {}x{}+{}+{} lies outside a {}x{} image",
                    rect.width,
                    rect.height,
                    rect.x,
                    rect.y,
                    gray.width(),
                    gray.height()
                )));
            }
            image::imageops::crop_imm(&gray, rect.x, rect.y, rect.width, rect.height).to_image()
        }
        None => gray,
    };

    let mut prepared = rqrr::PreparedImage::prepare(search);
    let grids = prepared.detect_grids();
    if grids.is_empty() {
        return Err(SealError::QrError(
            "no QR code found; try selecting the seal area manually".into(),
        ));
    }

    let mut last_error = None;
    for grid in grids {
        match grid.decode() {
            Ok((_meta, content)) => return Ok(content),
            Err(e) => last_error = Some(e),
        }
    }

    Err(SealError::QrError(format!(
        "QR code detected but could not be decoded: {}",
        last_error.map(|e| e.to_string()).unwrap_or_default()
    )))
}
