//! Conversion between preview-canvas pixels and physical page millimetres.
//!
//! The placement editor works on a scaled preview of the backdrop. The box the
//! user draws there is mapped to the page with one scale factor per axis, so a
//! preview whose aspect ratio differs from the page stretches the box the same
//! way the backdrop is stretched.

use crate::error::{CertificateError, Result};
use crate::model::{CanvasSize, MmBox, PageSize, PxBox};

/// Points per millimetre.
pub const MM_TO_PT: f32 = 72.0 / 25.4;

/// Millimetres per point.
pub const PT_TO_MM: f32 = 25.4 / 72.0;

/// Convert a canvas-pixel box into page millimetres.
pub fn to_physical(px: &PxBox, canvas: &CanvasSize, page: &PageSize) -> Result<MmBox> {
    let (sx, sy) = scale(canvas, page)?;
    Ok(MmBox::new(
        px.x * sx,
        px.y * sy,
        px.width * sx,
        px.height * sy,
    ))
}

/// Convert a page-millimetre box back into canvas pixels.
pub fn to_pixels(mm: &MmBox, canvas: &CanvasSize, page: &PageSize) -> Result<PxBox> {
    let (sx, sy) = scale(canvas, page)?;
    Ok(PxBox::new(
        mm.x_mm / sx,
        mm.y_mm / sy,
        mm.width_mm / sx,
        mm.height_mm / sy,
    ))
}

fn scale(canvas: &CanvasSize, page: &PageSize) -> Result<(f32, f32)> {
    let dims = [
        ("canvas width", canvas.width_px),
        ("canvas height", canvas.height_px),
        ("page width", page.width_mm),
        ("page height", page.height_mm),
    ];
    for (label, value) in dims {
        if !value.is_finite() || value <= 0.0 {
            return Err(CertificateError::validation(format!(
                "{} must be a positive number, got {}",
                label, value
            )));
        }
    }
    Ok((
        page.width_mm / canvas.width_px,
        page.height_mm / canvas.height_px,
    ))
}
