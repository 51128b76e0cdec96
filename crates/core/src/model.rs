//! Domain types shared by the composer, the batch orchestrator and the packager.

use serde::{Deserialize, Serialize};

/// A rectangle in canvas pixel space, as drawn by the placement editor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PxBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl PxBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// A rectangle in physical page units (millimetres), top-left origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MmBox {
    pub x_mm: f32,
    pub y_mm: f32,
    pub width_mm: f32,
    pub height_mm: f32,
}

impl MmBox {
    pub fn new(x_mm: f32, y_mm: f32, width_mm: f32, height_mm: f32) -> Self {
        Self {
            x_mm,
            y_mm,
            width_mm,
            height_mm,
        }
    }

    /// Bottom edge (y grows downwards).
    pub fn bottom(&self) -> f32 {
        self.y_mm + self.height_mm
    }
}

/// Pixel size of the preview canvas the box was drawn on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CanvasSize {
    pub width_px: f32,
    pub height_px: f32,
}

impl CanvasSize {
    pub fn new(width_px: f32, height_px: f32) -> Self {
        Self {
            width_px,
            height_px,
        }
    }
}

/// Physical page size in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width_mm: f32,
    pub height_mm: f32,
}

impl PageSize {
    pub const A4_LANDSCAPE: PageSize = PageSize {
        width_mm: 297.0,
        height_mm: 210.0,
    };

    pub const A4_PORTRAIT: PageSize = PageSize {
        width_mm: 210.0,
        height_mm: 297.0,
    };

    pub const LETTER_LANDSCAPE: PageSize = PageSize {
        width_mm: 279.4,
        height_mm: 215.9,
    };

    pub fn new(width_mm: f32, height_mm: f32) -> Self {
        Self {
            width_mm,
            height_mm,
        }
    }
}

impl Default for PageSize {
    fn default() -> Self {
        PageSize::A4_LANDSCAPE
    }
}

/// One certificate recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Participant {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// The event a certificate is issued for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventInfo {
    pub id: String,
    pub title: String,
    /// Free-form date string; see [`crate::composer::format_event_date`].
    pub date: String,
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// The issuing organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
}

/// Horizontal alignment of the name inside its box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    Left,
    #[default]
    Center,
    Right,
}

/// Where the name font comes from.
#[derive(Clone, PartialEq, Eq)]
pub enum FontSource {
    /// A built-in PDF font family, e.g. "Helvetica" or "Courier".
    Builtin(String),
    /// TrueType/OpenType bytes supplied by the caller, with a declared family name.
    Embedded { name: String, data: Vec<u8> },
}

impl Default for FontSource {
    fn default() -> Self {
        FontSource::Builtin("Helvetica".to_string())
    }
}

impl std::fmt::Debug for FontSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FontSource::Builtin(name) => f.debug_tuple("Builtin").field(name).finish(),
            FontSource::Embedded { name, data } => f
                .debug_struct("Embedded")
                .field("name", name)
                .field("bytes", &data.len())
                .finish(),
        }
    }
}

/// Everything the placement editor hands over for one certificate design.
#[derive(Clone, Default)]
pub struct TemplateSpec {
    /// Encoded backdrop image (PNG, JPEG, ...). May be empty.
    pub backdrop: Vec<u8>,
    /// Name box in canvas pixels.
    pub name_box_px: PxBox,
    /// Size of the canvas the box was drawn on.
    pub canvas_size: CanvasSize,
    pub font: FontSource,
    /// Preferred name size in points; caps the fitting search when set.
    pub font_size: Option<f32>,
    /// Hex colour, black when absent or unparseable.
    pub text_color: Option<String>,
    pub text_align: TextAlign,
}

impl Default for PxBox {
    fn default() -> Self {
        PxBox::new(0.0, 0.0, 0.0, 0.0)
    }
}

impl Default for CanvasSize {
    fn default() -> Self {
        CanvasSize::new(1122.0, 794.0)
    }
}

impl std::fmt::Debug for TemplateSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateSpec")
            .field("backdrop_bytes", &self.backdrop.len())
            .field("name_box_px", &self.name_box_px)
            .field("canvas_size", &self.canvas_size)
            .field("font", &self.font)
            .field("font_size", &self.font_size)
            .field("text_color", &self.text_color)
            .field("text_align", &self.text_align)
            .finish()
    }
}

impl TemplateSpec {
    /// Create a template with the given name box and canvas, no backdrop.
    pub fn new(name_box_px: PxBox, canvas_size: CanvasSize) -> Self {
        Self {
            name_box_px,
            canvas_size,
            ..Default::default()
        }
    }

    /// Set the backdrop image bytes.
    pub fn with_backdrop(mut self, backdrop: Vec<u8>) -> Self {
        self.backdrop = backdrop;
        self
    }

    /// Set the name font.
    pub fn with_font(mut self, font: FontSource) -> Self {
        self.font = font;
        self
    }

    /// Set the preferred name size.
    pub fn with_font_size(mut self, size: f32) -> Self {
        self.font_size = Some(size);
        self
    }

    /// Set the text colour.
    pub fn with_text_color(mut self, color: impl Into<String>) -> Self {
        self.text_color = Some(color.into());
        self
    }

    /// Set the alignment.
    pub fn with_text_align(mut self, align: TextAlign) -> Self {
        self.text_align = align;
        self
    }
}

/// Outcome of composing one participant's certificate.
#[derive(Debug, Clone)]
pub struct GenerationResult {
    pub participant_id: String,
    pub participant_name: String,
    /// PDF bytes on success, error description on failure.
    pub outcome: std::result::Result<Vec<u8>, String>,
}

impl GenerationResult {
    pub fn success(participant: &Participant, document: Vec<u8>) -> Self {
        Self {
            participant_id: participant.id.clone(),
            participant_name: participant.name.clone(),
            outcome: Ok(document),
        }
    }

    pub fn failure(participant: &Participant, message: impl Into<String>) -> Self {
        Self {
            participant_id: participant.id.clone(),
            participant_name: participant.name.clone(),
            outcome: Err(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_size_default_is_a4_landscape() {
        let page = PageSize::default();
        assert_eq!(page.width_mm, 297.0);
        assert_eq!(page.height_mm, 210.0);
    }

    #[test]
    fn test_participant_builder() {
        let p = Participant::new("u1", "John Doe").with_email("john@example.com");
        assert_eq!(p.id, "u1");
        assert_eq!(p.email.as_deref(), Some("john@example.com"));
    }

    #[test]
    fn test_participant_deserialize_without_email() {
        let p: Participant = serde_json::from_str(r#"{"id":"u2","name":"Ana"}"#).unwrap();
        assert_eq!(p, Participant::new("u2", "Ana"));
    }

    #[test]
    fn test_text_align_serde_lowercase() {
        let align: TextAlign = serde_json::from_str("\"right\"").unwrap();
        assert_eq!(align, TextAlign::Right);
        assert_eq!(TextAlign::default(), TextAlign::Center);
    }

    #[test]
    fn test_template_builder_pattern() {
        let template = TemplateSpec::new(
            PxBox::new(10.0, 20.0, 300.0, 60.0),
            CanvasSize::new(800.0, 600.0),
        )
        .with_font_size(40.0)
        .with_text_color("#336699")
        .with_text_align(TextAlign::Left);

        assert!(template.backdrop.is_empty());
        assert_eq!(template.font_size, Some(40.0));
        assert_eq!(template.text_color.as_deref(), Some("#336699"));
        assert_eq!(template.text_align, TextAlign::Left);
    }

    #[test]
    fn test_font_source_debug_hides_bytes() {
        let font = FontSource::Embedded {
            name: "Brand".to_string(),
            data: vec![0; 4096],
        };
        let debug = format!("{:?}", font);
        assert!(debug.contains("Brand"));
        assert!(debug.contains("4096"));
    }

    #[test]
    fn test_generation_result_constructors() {
        let p = Participant::new("u1", "John Doe");
        assert!(GenerationResult::success(&p, vec![1, 2, 3]).is_success());

        let failed = GenerationResult::failure(&p, "boom");
        assert!(!failed.is_success());
        assert_eq!(failed.outcome.unwrap_err(), "boom");
    }
}
