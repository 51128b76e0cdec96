//! Fitting a name into its box.
//!
//! The fitter looks for the largest font size (on a fixed grid between the
//! configured floor and ceiling) at which the greedily wrapped text fits the
//! padded box in both directions. Placement is computed in page millimetres
//! and drawing is a separate step so layouts can be inspected without a canvas.

use crate::canvas::PageCanvas;
use crate::color::Rgb;
use crate::config::LayoutConfig;
use crate::fonts::{ResolvedFont, TextMeasure};
use crate::geometry::{MM_TO_PT, PT_TO_MM};
use crate::model::{MmBox, TextAlign};
use std::collections::HashMap;

/// One placed line.
#[derive(Debug, Clone, PartialEq)]
pub struct FittedLine {
    pub text: String,
    /// Measured width at the chosen size.
    pub width_mm: f32,
    /// Left edge of the line.
    pub x_mm: f32,
    /// Baseline, measured from the top of the page.
    pub baseline_mm: f32,
}

/// Result of fitting text into a box.
#[derive(Debug, Clone, PartialEq)]
pub struct FittedText {
    /// Chosen size in points.
    pub font_size: f32,
    pub line_height_mm: f32,
    pub lines: Vec<FittedLine>,
    /// True when even the smallest size did not fit and the text overflows.
    pub overflow: bool,
}

/// Widths at 1 pt, memoised per line string for the duration of one search.
struct WidthCache<'a, M: ?Sized> {
    measure: &'a M,
    widths: HashMap<String, f32>,
}

impl<'a, M: TextMeasure + ?Sized> WidthCache<'a, M> {
    fn new(measure: &'a M) -> Self {
        Self {
            measure,
            widths: HashMap::new(),
        }
    }

    fn width(&mut self, text: &str, size: f32) -> f32 {
        if let Some(w) = self.widths.get(text) {
            return w * size;
        }
        let w = self.measure.text_width_pt(text, 1.0);
        self.widths.insert(text.to_string(), w);
        w * size
    }
}

/// Greedy wrap. A word wider than the line stays whole on its own line.
fn wrap<M: TextMeasure + ?Sized>(
    words: &[&str],
    size: f32,
    max_width_pt: f32,
    cache: &mut WidthCache<'_, M>,
) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in words {
        if current.is_empty() {
            current.push_str(word);
            continue;
        }
        let candidate = format!("{} {}", current, word);
        if cache.width(&candidate, size) <= max_width_pt {
            current = candidate;
        } else {
            lines.push(std::mem::replace(&mut current, word.to_string()));
        }
    }
    lines.push(current);
    lines
}

/// Fit `text` into `area`.
///
/// `max_size` lowers the ceiling of the search; it is clamped into the
/// configured range.
pub fn fit_text<M: TextMeasure + ?Sized>(
    text: &str,
    area: &MmBox,
    measure: &M,
    align: TextAlign,
    config: &LayoutConfig,
    max_size: Option<f32>,
) -> FittedText {
    let min = config.min_font_size;
    let ceiling = match max_size {
        Some(cap) if cap.is_finite() => cap.clamp(min, config.max_font_size),
        _ => config.max_font_size,
    };
    let step = config.size_step;
    let steps = ((ceiling - min) / step + 1e-4).floor().max(0.0) as usize;
    let size_at = |i: usize| min + i as f32 * step;

    let avail_w_pt = (area.width_mm - 2.0 * config.padding_mm).max(0.0) * MM_TO_PT;
    let avail_h_pt = (area.height_mm - 2.0 * config.padding_mm).max(0.0) * MM_TO_PT;

    let words: Vec<&str> = text.split_whitespace().collect();
    let mut cache = WidthCache::new(measure);

    let fits = |size: f32, cache: &mut WidthCache<'_, M>| -> Option<Vec<String>> {
        let lines = wrap(&words, size, avail_w_pt, cache);
        let too_wide = lines.iter().any(|l| cache.width(l, size) > avail_w_pt);
        let block_h = lines.len() as f32 * size * config.line_height_factor;
        if too_wide || block_h > avail_h_pt {
            None
        } else {
            Some(lines)
        }
    };

    // Largest fitting grid index, by binary search over a monotone predicate.
    let mut best: Option<(usize, Vec<String>)> = None;
    let (mut lo, mut hi) = (0usize, steps);
    while lo <= hi {
        let mid = lo + (hi - lo) / 2;
        match fits(size_at(mid), &mut cache) {
            Some(lines) => {
                best = Some((mid, lines));
                lo = mid + 1;
            }
            None => {
                if mid == 0 {
                    break;
                }
                hi = mid - 1;
            }
        }
    }

    let (font_size, lines, overflow) = match best {
        Some((i, lines)) => (size_at(i), lines, false),
        None => (min, wrap(&words, min, avail_w_pt, &mut cache), true),
    };

    let line_height_mm = font_size * config.line_height_factor * PT_TO_MM;
    let block_h_mm = lines.len() as f32 * line_height_mm;
    let top_mm = area.y_mm + (area.height_mm - block_h_mm) / 2.0;
    let glyph_shift_mm = (measure.ascent() + measure.descent()) / 2.0 * font_size * PT_TO_MM;

    let placed = lines
        .into_iter()
        .enumerate()
        .map(|(i, text)| {
            let width_mm = cache.width(&text, font_size) * PT_TO_MM;
            let x_mm = match align {
                TextAlign::Left => area.x_mm + config.padding_mm,
                TextAlign::Right => area.x_mm + area.width_mm - config.padding_mm - width_mm,
                TextAlign::Center => area.x_mm + (area.width_mm - width_mm) / 2.0,
            };
            let slot_center = top_mm + (i as f32 + 0.5) * line_height_mm;
            FittedLine {
                text,
                width_mm,
                x_mm,
                baseline_mm: slot_center + glyph_shift_mm,
            }
        })
        .collect();

    FittedText {
        font_size,
        line_height_mm,
        lines: placed,
        overflow,
    }
}

/// Draw a fitted layout onto the canvas.
pub fn draw_fitted(canvas: &mut PageCanvas, fitted: &FittedText, font: &ResolvedFont, color: Rgb) {
    for line in &fitted.lines {
        canvas.draw_text(
            font,
            fitted.font_size,
            line.x_mm,
            line.baseline_mm,
            &line.text,
            color,
        );
    }
}

/// Fit and draw in one step.
#[allow(clippy::too_many_arguments)]
pub fn fit_and_draw(
    canvas: &mut PageCanvas,
    text: &str,
    area: &MmBox,
    font: &ResolvedFont,
    align: TextAlign,
    config: &LayoutConfig,
    max_size: Option<f32>,
    color: Rgb,
) -> FittedText {
    let fitted = fit_text(text, area, font, align, config, max_size);
    draw_fitted(canvas, &fitted, font, color);
    fitted
}
