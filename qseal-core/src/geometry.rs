//! Seal placement geometry.
//!
//! Converts a relative QR placement (position %, size %) plus the target
//! image's pixel dimensions into absolute pixel rectangles. The same
//! function is the single source of geometry at seal time and at verify
//! time: any drift between the two would silently break every sealed
//! document, so nothing here may depend on ambient state, floating-point
//! environment flags, or the direction of the call.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SealError};

/// Minimum allowed seal size, as a percentage of the shorter image edge.
pub const MIN_SIZE_PCT: f64 = 5.0;

/// Maximum allowed seal size, as a percentage of the shorter image edge.
pub const MAX_SIZE_PCT: f64 = 30.0;

/// Smallest QR side that remains reliably scannable after printing.
pub const MIN_QR_SIDE_PX: u32 = 48;

/// Caption band height under the QR, as a fraction of the QR side.
const CAPTION_RATIO: f64 = 0.22;

/// Pixels of padding added around the seal footprint when blanking,
/// absorbing anti-aliasing bleed at the seal edge.
const EXCLUSION_PADDING_PX: u32 = 4;

/// Relative seal placement chosen by the user.
///
/// `x_pct`/`y_pct` position the seal within the span the image leaves
/// available after margins (0 = flush left/top, 100 = flush right/bottom).
/// `size_pct` is the QR side relative to the shorter image edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SealPlacement {
    pub x_pct: f64,
    pub y_pct: f64,
    pub size_pct: f64,
}

impl SealPlacement {
    pub fn new(x_pct: f64, y_pct: f64, size_pct: f64) -> Self {
        Self {
            x_pct,
            y_pct,
            size_pct,
        }
    }
}

/// An absolute pixel rectangle within an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Whether this rectangle lies entirely within an image of the given
    /// dimensions.
    pub fn fits_within(&self, image_width: u32, image_height: u32) -> bool {
        self.width > 0
            && self.height > 0
            && self.x.checked_add(self.width).is_some_and(|r| r <= image_width)
            && self.y.checked_add(self.height).is_some_and(|b| b <= image_height)
    }

    /// Whether the given pixel coordinate falls inside this rectangle.
    pub fn contains(&self, px: u32, py: u32) -> bool {
        px >= self.x && px < self.x + self.width && py >= self.y && py < self.y + self.height
    }
}

/// Complete pixel geometry of a seal on a specific image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SealGeometry {
    /// The QR code square itself.
    pub qr: PixelRect,
    /// The full visual seal: QR plus the caption band beneath it.
    pub footprint: PixelRect,
    /// The rectangle blanked before hashing (footprint plus padding,
    /// clamped to the image bounds).
    pub exclusion: PixelRect,
}

/// Compute the seal geometry for a placement on an image of the given
/// pixel dimensions.
///
/// Deterministic: identical inputs always yield bit-identical rectangles.
/// The size percentage is clamped to `[MIN_SIZE_PCT, MAX_SIZE_PCT]` and the
/// edge margin grows with the chosen size so the seal can never overflow
/// the document.
pub fn compute_geometry(
    placement: &SealPlacement,
    image_width: u32,
    image_height: u32,
) -> Result<SealGeometry> {
    if image_width == 0 || image_height == 0 {
        return Err(SealError::GeometryError(format!(
            "invalid image dimensions {}x{}",
            image_width, image_height
        )));
    }
    if !placement.x_pct.is_finite()
        || !placement.y_pct.is_finite()
        || !placement.size_pct.is_finite()
        || !(0.0..=100.0).contains(&placement.x_pct)
        || !(0.0..=100.0).contains(&placement.y_pct)
    {
        return Err(SealError::GeometryError(format!(
            "placement out of range: x={} y={} size={}",
            placement.x_pct, placement.y_pct, placement.size_pct
        )));
    }

    let size_pct = placement.size_pct.clamp(MIN_SIZE_PCT, MAX_SIZE_PCT);
    let min_dim = f64::from(image_width.min(image_height));

    let qr_side = (min_dim * size_pct / 100.0).round() as u32;
    if qr_side < MIN_QR_SIDE_PX {
        return Err(SealError::GeometryError(format!(
            "seal side {}px is below the scannable minimum of {}px; use a larger image or size",
            qr_side, MIN_QR_SIDE_PX
        )));
    }

    let caption_height = (f64::from(qr_side) * CAPTION_RATIO).round() as u32;
    let footprint_width = qr_side;
    let footprint_height = qr_side + caption_height;

    // Safe margin scales with the seal size: a bigger seal keeps a wider
    // distance from the document edges.
    let margin_pct = 1.0 + size_pct / 10.0;
    let margin = (min_dim * margin_pct / 100.0).round() as u32;

    let span_x = image_width
        .checked_sub(footprint_width + 2 * margin)
        .ok_or_else(|| {
            SealError::GeometryError(format!(
                "seal {}x{} with margin {} does not fit a {}x{} image",
                footprint_width, footprint_height, margin, image_width, image_height
            ))
        })?;
    let span_y = image_height
        .checked_sub(footprint_height + 2 * margin)
        .ok_or_else(|| {
            SealError::GeometryError(format!(
                "seal {}x{} with margin {} does not fit a {}x{} image",
                footprint_width, footprint_height, margin, image_width, image_height
            ))
        })?;

    let x = margin + (f64::from(span_x) * placement.x_pct / 100.0).round() as u32;
    let y = margin + (f64::from(span_y) * placement.y_pct / 100.0).round() as u32;

    let qr = PixelRect::new(x, y, qr_side, qr_side);
    let footprint = PixelRect::new(x, y, footprint_width, footprint_height);

    let ex = x.saturating_sub(EXCLUSION_PADDING_PX);
    let ey = y.saturating_sub(EXCLUSION_PADDING_PX);
    let exclusion = PixelRect::new(
        ex,
        ey,
        (footprint_width + 2 * EXCLUSION_PADDING_PX).min(image_width - ex),
        (footprint_height + 2 * EXCLUSION_PADDING_PX).min(image_height - ey),
    );

    Ok(SealGeometry {
        qr,
        footprint,
        exclusion,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry_is_deterministic() {
        let placement = SealPlacement::new(90.0, 90.0, 20.0);
        let a = compute_geometry(&placement, 1000, 800).unwrap();
        let b = compute_geometry(&placement, 1000, 800).unwrap();
        assert_eq!(a.qr, b.qr);
        assert_eq!(a.footprint, b.footprint);
        assert_eq!(a.exclusion, b.exclusion);
    }

    #[test]
    fn test_qr_side_scales_with_shorter_edge() {
        let placement = SealPlacement::new(50.0, 50.0, 20.0);
        let geometry = compute_geometry(&placement, 1000, 800).unwrap();
        // 20% of the 800px edge
        assert_eq!(geometry.qr.width, 160);
        assert_eq!(geometry.qr.height, 160);
        // Footprint adds the caption band
        assert!(geometry.footprint.height > geometry.qr.height);
        assert_eq!(geometry.footprint.width, geometry.qr.width);
    }

    #[test]
    fn test_size_is_clamped_to_configured_range() {
        let over = compute_geometry(&SealPlacement::new(50.0, 50.0, 95.0), 2000, 2000).unwrap();
        let max = compute_geometry(&SealPlacement::new(50.0, 50.0, MAX_SIZE_PCT), 2000, 2000)
            .unwrap();
        assert_eq!(over.qr, max.qr);

        let under = compute_geometry(&SealPlacement::new(50.0, 50.0, 0.1), 2000, 2000).unwrap();
        let min = compute_geometry(&SealPlacement::new(50.0, 50.0, MIN_SIZE_PCT), 2000, 2000)
            .unwrap();
        assert_eq!(under.qr, min.qr);
    }

    #[test]
    fn test_seal_never_overflows_bounds() {
        for &(w, h) in &[(1000u32, 800u32), (800, 1000), (640, 640), (3000, 400)] {
            for &pct in &[0.0, 25.0, 50.0, 75.0, 100.0] {
                let placement = SealPlacement::new(pct, pct, 20.0);
                let g = match compute_geometry(&placement, w, h) {
                    Ok(g) => g,
                    // Too small to host a scannable seal is a valid outcome
                    Err(SealError::GeometryError(_)) => continue,
                    Err(e) => panic!("unexpected error: {e}"),
                };
                assert!(g.footprint.fits_within(w, h), "{w}x{h} at {pct}%");
                assert!(g.exclusion.fits_within(w, h), "{w}x{h} at {pct}%");
            }
        }
    }

    #[test]
    fn test_exclusion_covers_footprint() {
        let placement = SealPlacement::new(90.0, 90.0, 20.0);
        let g = compute_geometry(&placement, 1000, 800).unwrap();
        assert!(g.exclusion.x <= g.footprint.x);
        assert!(g.exclusion.y <= g.footprint.y);
        assert!(g.exclusion.x + g.exclusion.width >= g.footprint.x + g.footprint.width);
        assert!(g.exclusion.y + g.exclusion.height >= g.footprint.y + g.footprint.height);
    }

    #[test]
    fn test_tiny_image_rejected() {
        let placement = SealPlacement::new(50.0, 50.0, 10.0);
        assert!(compute_geometry(&placement, 100, 100).is_err());
        assert!(compute_geometry(&placement, 0, 800).is_err());
    }

    #[test]
    fn test_placement_out_of_range_rejected() {
        assert!(compute_geometry(&SealPlacement::new(101.0, 50.0, 20.0), 1000, 800).is_err());
        assert!(compute_geometry(&SealPlacement::new(50.0, -1.0, 20.0), 1000, 800).is_err());
        assert!(compute_geometry(&SealPlacement::new(f64::NAN, 50.0, 20.0), 1000, 800).is_err());
    }

    #[test]
    fn test_rect_contains() {
        let rect = PixelRect::new(10, 10, 5, 5);
        assert!(rect.contains(10, 10));
        assert!(rect.contains(14, 14));
        assert!(!rect.contains(15, 10));
        assert!(!rect.contains(9, 10));
    }
}
