//! Composing one certificate page.
//!
//! A [`PreparedTemplate`] holds everything that is identical for every
//! participant of a batch (decoded backdrop, resolved font and colour, the
//! name box in millimetres), so a batch pays for image decoding and font
//! parsing once. [`compose`] is the one-off convenience wrapper.

use crate::canvas::{BackdropImage, PageCanvas};
use crate::color::{resolve_color, Rgb};
use crate::config::GeneratorConfig;
use crate::error::{CertificateError, Result};
use crate::fonts::{BuiltinFont, ResolvedFont, TextMeasure};
use crate::geometry::{to_physical, PT_TO_MM};
use crate::model::{EventInfo, MmBox, OrgInfo, Participant, TemplateSpec, TextAlign};
use crate::text_fit::fit_and_draw;
use chrono::{DateTime, Local, NaiveDate};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

const DISPLAY_DATE_FORMAT: &str = "%B %-d, %Y";

const EVENT_DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d/%m/%Y", "%B %d, %Y"];

/// Template data resolved once per batch.
#[derive(Debug, Clone)]
pub struct PreparedTemplate {
    backdrop: Option<Arc<BackdropImage>>,
    font: ResolvedFont,
    color: Rgb,
    name_box: MmBox,
    align: TextAlign,
    font_size_cap: Option<f32>,
}

impl PreparedTemplate {
    /// Resolve a template against a page.
    ///
    /// Only an unusable canvas or page size is an error. A bad backdrop, font or
    /// colour degrades to a blank page, Helvetica-Bold or black respectively.
    pub fn prepare(template: &TemplateSpec, config: &GeneratorConfig) -> Result<Self> {
        let name_box = to_physical(&template.name_box_px, &template.canvas_size, &config.page)?;

        let backdrop = if template.backdrop.is_empty() {
            debug!("Template has no backdrop, using a blank page");
            None
        } else {
            match BackdropImage::decode(&template.backdrop) {
                Ok(image) => Some(Arc::new(image)),
                Err(e) => {
                    warn!("{}; continuing on a blank page", e);
                    None
                }
            }
        };

        Ok(Self {
            backdrop,
            font: ResolvedFont::resolve(&template.font),
            color: resolve_color(template.text_color.as_deref()),
            name_box,
            align: template.text_align,
            font_size_cap: template.font_size,
        })
    }

    /// The name box in page millimetres.
    pub fn name_box(&self) -> &MmBox {
        &self.name_box
    }

    pub fn font(&self) -> &ResolvedFont {
        &self.font
    }

    pub fn color(&self) -> Rgb {
        self.color
    }

    pub fn has_backdrop(&self) -> bool {
        self.backdrop.is_some()
    }
}

/// Compose one certificate and return the PDF bytes.
pub fn compose(
    participant: &Participant,
    event: &EventInfo,
    org: &OrgInfo,
    template: &TemplateSpec,
    config: &GeneratorConfig,
) -> Result<Vec<u8>> {
    let prepared = PreparedTemplate::prepare(template, config)?;
    compose_prepared(participant, event, org, &prepared, config)
}

/// Compose one certificate from a prepared template.
pub fn compose_prepared(
    participant: &Participant,
    event: &EventInfo,
    org: &OrgInfo,
    template: &PreparedTemplate,
    config: &GeneratorConfig,
) -> Result<Vec<u8>> {
    let name = participant.name.trim();
    if name.is_empty() {
        return Err(CertificateError::Render {
            participant_id: participant.id.clone(),
            message: "participant name is empty".to_string(),
        });
    }

    let mut canvas = PageCanvas::new(config.page);
    if let Some(backdrop) = &template.backdrop {
        canvas.draw_backdrop(backdrop.clone());
    }

    let fitted = fit_and_draw(
        &mut canvas,
        name,
        &template.name_box,
        &template.font,
        template.align,
        &config.layout,
        template.font_size_cap,
        template.color,
    );
    if fitted.overflow {
        warn!(
            "Name of participant '{}' does not fit its box even at {} pt",
            participant.id, fitted.font_size
        );
    }

    draw_fixed_text(&mut canvas, event, org, template, config);

    debug!(
        "Composed certificate for '{}' at {} pt over {} line(s)",
        participant.id,
        fitted.font_size,
        fitted.lines.len()
    );
    Ok(canvas.finish())
}

fn draw_fixed_text(
    canvas: &mut PageCanvas,
    event: &EventInfo,
    org: &OrgInfo,
    template: &PreparedTemplate,
    config: &GeneratorConfig,
) {
    let layout = &config.certificate;
    let page = config.page;
    let regular = ResolvedFont::Builtin(BuiltinFont::Helvetica);
    let bold = ResolvedFont::Builtin(BuiltinFont::HelveticaBold);
    let ink = template.color;

    let centered = |canvas: &mut PageCanvas, font: &ResolvedFont, size: f32, baseline: f32, text: &str| {
        let width_mm = font.text_width_pt(text, size) * PT_TO_MM;
        canvas.draw_text(font, size, (page.width_mm - width_mm) / 2.0, baseline, text, ink);
    };

    centered(canvas, &bold, layout.title_font_size, layout.title_baseline_mm, &layout.title);

    let event_baseline = template.name_box.bottom() + layout.event_offset_mm;
    centered(canvas, &bold, layout.event_title_font_size, event_baseline, &event.title);

    let date = format_event_date(&event.date);
    let details = match (date.is_empty(), event.location.trim().is_empty()) {
        (false, false) => format!("{} • {}", date, event.location.trim()),
        (false, true) => date,
        (true, _) => event.location.trim().to_string(),
    };
    let details_baseline = event_baseline + layout.event_detail_font_size * 1.6 * PT_TO_MM;
    centered(canvas, &regular, layout.event_detail_font_size, details_baseline, &details);

    let footer = page.height_mm - layout.footer_baseline_mm;
    let size = layout.footer_font_size;
    canvas.draw_text(&regular, size, layout.footer_margin_mm, footer, org.name.trim(), ink);

    let issued = format!("Issued: {}", Local::now().format(DISPLAY_DATE_FORMAT));
    centered(canvas, &regular, size, footer, &issued);

    let id_text = format!("ID: {}", certificate_id());
    let id_width = regular.text_width_pt(&id_text, size) * PT_TO_MM;
    canvas.draw_text(
        &regular,
        size,
        page.width_mm - layout.footer_margin_mm - id_width,
        footer,
        &id_text,
        ink,
    );

    let inset = layout.border_inset_mm;
    if layout.border_width_pt > 0.0 && inset * 2.0 < page.width_mm.min(page.height_mm) {
        let border = MmBox::new(
            inset,
            inset,
            page.width_mm - 2.0 * inset,
            page.height_mm - 2.0 * inset,
        );
        canvas.stroke_rect(&border, layout.border_width_pt, ink);
    }
}

/// Render an event date for display.
///
/// Accepts `YYYY-MM-DD`, RFC 3339, `DD/MM/YYYY` and `Month D, YYYY`; anything
/// else is returned as given.
pub fn format_event_date(date: &str) -> String {
    let date = date.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(date) {
        return parsed.date_naive().format(DISPLAY_DATE_FORMAT).to_string();
    }
    EVENT_DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date, fmt).ok())
        .map(|d| d.format(DISPLAY_DATE_FORMAT).to_string())
        .unwrap_or_else(|| date.to_string())
}

/// A fresh certificate identifier: `CERT-` and 12 upper-case hex digits.
pub fn certificate_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("CERT-{}", hex[..12].to_ascii_uppercase())
}
