//! Single-page PDF canvas.
//!
//! All drawing coordinates are millimetres from the top-left corner of the
//! page, matching the placement editor. The canvas converts them to PDF user
//! space (points, bottom-left origin) when emitting operators.

use crate::color::Rgb;
use crate::error::{CertificateError, Result};
use crate::fonts::{BuiltinFont, EmbeddedFont, ResolvedFont};
use crate::geometry::MM_TO_PT;
use crate::model::{MmBox, PageSize};
use image::RgbaImage;
use miniz_oxide::deflate::compress_to_vec_zlib;
use pdf_writer::{Content, Filter, Finish, Name, Pdf, Rect, Ref, Str};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

const BACKDROP_NAME: Name<'static> = Name(b"Im1");

/// A decoded backdrop, flattened onto white and ready to embed.
pub struct BackdropImage {
    width: u32,
    height: u32,
    /// Zlib-compressed 8-bit RGB samples.
    data: Vec<u8>,
}

impl std::fmt::Debug for BackdropImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackdropImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("compressed_bytes", &self.data.len())
            .finish()
    }
}

impl BackdropImage {
    /// Decode an encoded image (PNG, JPEG, ...).
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Err(CertificateError::InvalidConfig(
                "backdrop image is empty".to_string(),
            ));
        }
        let decoded = image::load_from_memory(bytes).map_err(|e| {
            CertificateError::InvalidConfig(format!("backdrop image could not be decoded: {}", e))
        })?;
        Ok(Self::from_rgba(decoded.to_rgba8()))
    }

    /// Build from raw RGBA pixels.
    pub fn from_rgba(image: RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        let rgb = flatten_onto_white(&image);
        Self {
            width,
            height,
            data: compress_to_vec_zlib(&rgb, 6),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Blend every pixel over an opaque white background and drop the alpha channel.
fn flatten_onto_white(image: &RgbaImage) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(image.width() as usize * image.height() as usize * 3);
    for pixel in image.pixels() {
        let alpha = pixel[3] as f32 / 255.0;
        let inv_alpha = 1.0 - alpha;
        for channel in 0..3 {
            let blended = pixel[channel] as f32 * alpha + 255.0 * inv_alpha;
            rgb.push(blended.round().clamp(0.0, 255.0) as u8);
        }
    }
    rgb
}

/// One page being drawn.
pub struct PageCanvas {
    page: PageSize,
    content: Content,
    builtin_fonts: HashSet<BuiltinFont>,
    embedded: Option<(Arc<EmbeddedFont>, BTreeSet<char>)>,
    backdrop: Option<Arc<BackdropImage>>,
}

impl PageCanvas {
    pub fn new(page: PageSize) -> Self {
        Self {
            page,
            content: Content::new(),
            builtin_fonts: HashSet::new(),
            embedded: None,
            backdrop: None,
        }
    }

    pub fn page(&self) -> PageSize {
        self.page
    }

    fn width_pt(&self) -> f32 {
        self.page.width_mm * MM_TO_PT
    }

    fn height_pt(&self) -> f32 {
        self.page.height_mm * MM_TO_PT
    }

    fn y_pt(&self, y_mm: f32) -> f32 {
        self.height_pt() - y_mm * MM_TO_PT
    }

    /// Stretch the backdrop over the whole page.
    pub fn draw_backdrop(&mut self, backdrop: Arc<BackdropImage>) {
        let (w, h) = (self.width_pt(), self.height_pt());
        self.content.save_state();
        self.content.transform([w, 0.0, 0.0, h, 0.0, 0.0]);
        self.content.x_object(BACKDROP_NAME);
        self.content.restore_state();
        self.backdrop = Some(backdrop);
    }

    /// Draw one line of text with its baseline `baseline_mm` below the top edge.
    pub fn draw_text(
        &mut self,
        font: &ResolvedFont,
        size: f32,
        x_mm: f32,
        baseline_mm: f32,
        text: &str,
        color: Rgb,
    ) {
        if text.is_empty() {
            return;
        }
        self.register(font, text);
        let encoded = font.encode(text);
        let (x, y) = (x_mm * MM_TO_PT, self.y_pt(baseline_mm));

        self.content.set_fill_rgb(color.r, color.g, color.b);
        self.content.begin_text();
        self.content.set_font(font.resource_name(), size);
        self.content.next_line(x, y);
        self.content.show(Str(&encoded));
        self.content.end_text();
    }

    /// Stroke the outline of a rectangle.
    pub fn stroke_rect(&mut self, rect: &MmBox, line_width_pt: f32, color: Rgb) {
        let x = rect.x_mm * MM_TO_PT;
        let y = self.y_pt(rect.bottom());
        self.content.save_state();
        self.content.set_stroke_rgb(color.r, color.g, color.b);
        self.content.set_line_width(line_width_pt);
        self.content
            .rect(x, y, rect.width_mm * MM_TO_PT, rect.height_mm * MM_TO_PT);
        self.content.stroke();
        self.content.restore_state();
    }

    fn register(&mut self, font: &ResolvedFont, text: &str) {
        match font {
            ResolvedFont::Builtin(builtin) => {
                self.builtin_fonts.insert(*builtin);
            }
            ResolvedFont::Embedded(embedded) => {
                let (_, used) = self
                    .embedded
                    .get_or_insert_with(|| (embedded.clone(), BTreeSet::new()));
                used.extend(text.chars());
            }
        }
    }

    /// Serialize the page into a complete single-page PDF document.
    pub fn finish(self) -> Vec<u8> {
        let mut next_id = 1;
        let mut next_ref = move || {
            let id = Ref::new(next_id);
            next_id += 1;
            id
        };

        let catalog_id = next_ref();
        let page_tree_id = next_ref();
        let page_id = next_ref();
        let content_id = next_ref();

        let mut pdf = Pdf::new();
        pdf.catalog(catalog_id).pages(page_tree_id);
        pdf.pages(page_tree_id).kids([page_id]).count(1);

        let mut font_refs: Vec<(Name<'static>, Ref)> = Vec::new();
        for builtin in BuiltinFont::ALL {
            if self.builtin_fonts.contains(&builtin) {
                let id = next_ref();
                builtin.write(&mut pdf, id);
                font_refs.push((builtin.resource_name(), id));
            }
        }
        if let Some((font, used)) = &self.embedded {
            let id = next_ref();
            font.write(&mut pdf, id, used, &mut next_ref);
            font_refs.push((font.resource_name(), id));
        }

        let image_ref = self.backdrop.as_ref().map(|backdrop| {
            let id = next_ref();
            let mut xobject = pdf.image_xobject(id, &backdrop.data);
            xobject.filter(Filter::FlateDecode);
            xobject.width(backdrop.width as i32);
            xobject.height(backdrop.height as i32);
            xobject.color_space().device_rgb();
            xobject.bits_per_component(8);
            xobject.finish();
            id
        });

        {
            let mut page = pdf.page(page_id);
            page.media_box(Rect::new(0.0, 0.0, self.width_pt(), self.height_pt()))
                .parent(page_tree_id)
                .contents(content_id);
            let mut resources = page.resources();
            if !font_refs.is_empty() {
                let mut fonts = resources.fonts();
                for (name, id) in &font_refs {
                    fonts.pair(*name, *id);
                }
            }
            if let Some(id) = image_ref {
                resources.x_objects().pair(BACKDROP_NAME, id);
            }
            resources.finish();
            page.finish();
        }

        pdf.stream(content_id, &self.content.finish());
        pdf.finish()
    }
}
