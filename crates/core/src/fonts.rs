//! Fonts: metrics for measuring text and the PDF objects that carry them.
//!
//! Two kinds of fonts are supported:
//!
//! - **Built-in** PDF base fonts (Helvetica and Courier families). Widths come
//!   from the standard AFM metrics and text is encoded as WinAnsi.
//! - **Embedded** TrueType/OpenType fonts supplied by the caller. The font is
//!   parsed once with `ttf-parser`, embedded as a Type0 font with Identity-H
//!   encoding, and text is written as 2-byte glyph ids.

use crate::error::{CertificateError, Result};
use crate::model::FontSource;
use miniz_oxide::deflate::compress_to_vec_zlib;
use pdf_writer::types::{CidFontType, FontFlags, SystemInfo};
use pdf_writer::{Filter, Name, Pdf, Rect, Ref, Str};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, warn};

/// Font measurement seam used by the text fitter.
pub trait TextMeasure {
    /// Advance width of `text` set at `size` points, in points.
    fn text_width_pt(&self, text: &str, size: f32) -> f32;

    /// Ascent above the baseline as a fraction of the em (positive).
    fn ascent(&self) -> f32;

    /// Descent below the baseline as a fraction of the em (negative).
    fn descent(&self) -> f32;
}

// Helvetica advance widths for U+0020..=U+007E, 1/1000 em.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '../
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // 0..?
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // @..O
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // P.._
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // `..o
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // p..~
];

// Helvetica-Bold advance widths for U+0020..=U+007E, 1/1000 em.
const HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278, // ' '../
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611, // 0..?
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778, // @..O
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556, // P.._
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611, // `..o
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584, // p..~
];

const COURIER_WIDTH: u16 = 600;

/// The built-in PDF base fonts this crate knows metrics for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinFont {
    Helvetica,
    HelveticaBold,
    Courier,
    CourierBold,
}

impl BuiltinFont {
    /// Every built-in font, in resource order.
    pub const ALL: [BuiltinFont; 4] = [
        BuiltinFont::Helvetica,
        BuiltinFont::HelveticaBold,
        BuiltinFont::Courier,
        BuiltinFont::CourierBold,
    ];

    /// Pick the bold face of the family a name refers to.
    ///
    /// Returns `None` for names outside the Helvetica and Courier families.
    pub fn bold_for_family(name: &str) -> Option<Self> {
        let lower = name.trim().to_ascii_lowercase();
        if lower.contains("courier") || lower.contains("mono") {
            Some(BuiltinFont::CourierBold)
        } else if lower.contains("helvetica")
            || lower.contains("arial")
            || lower.contains("sans")
        {
            Some(BuiltinFont::HelveticaBold)
        } else {
            None
        }
    }

    /// PostScript name of the base font.
    pub fn base_font(self) -> &'static str {
        match self {
            BuiltinFont::Helvetica => "Helvetica",
            BuiltinFont::HelveticaBold => "Helvetica-Bold",
            BuiltinFont::Courier => "Courier",
            BuiltinFont::CourierBold => "Courier-Bold",
        }
    }

    /// Name under which the font is registered in page resources.
    pub fn resource_name(self) -> Name<'static> {
        match self {
            BuiltinFont::Helvetica => Name(b"F1"),
            BuiltinFont::HelveticaBold => Name(b"F2"),
            BuiltinFont::Courier => Name(b"F3"),
            BuiltinFont::CourierBold => Name(b"F4"),
        }
    }

    fn char_width(self, ch: char) -> u16 {
        if matches!(self, BuiltinFont::Courier | BuiltinFont::CourierBold) {
            return COURIER_WIDTH;
        }
        let table = match self {
            BuiltinFont::HelveticaBold => &HELVETICA_BOLD_WIDTHS,
            _ => &HELVETICA_WIDTHS,
        };
        let ch = latin1_base_letter(ch).unwrap_or(ch);
        match ch {
            ' '..='~' => table[ch as usize - 0x20],
            '\u{a0}' => 278,
            '•' => 350,
            '—' => 1000,
            _ => 556,
        }
    }

    /// Encode text as WinAnsi bytes. Characters outside the encoding become `?`.
    pub fn encode(self, text: &str) -> Vec<u8> {
        text.chars().map(winansi_byte).collect()
    }

    pub(crate) fn write(self, pdf: &mut Pdf, id: Ref) {
        pdf.type1_font(id)
            .base_font(Name(self.base_font().as_bytes()))
            .encoding_predefined(Name(b"WinAnsiEncoding"));
    }
}

impl TextMeasure for BuiltinFont {
    fn text_width_pt(&self, text: &str, size: f32) -> f32 {
        let units: u32 = text.chars().map(|c| self.char_width(c) as u32).sum();
        units as f32 * size / 1000.0
    }

    fn ascent(&self) -> f32 {
        match self {
            BuiltinFont::Courier | BuiltinFont::CourierBold => 0.629,
            _ => 0.718,
        }
    }

    fn descent(&self) -> f32 {
        match self {
            BuiltinFont::Courier | BuiltinFont::CourierBold => -0.157,
            _ => -0.207,
        }
    }
}

fn latin1_base_letter(ch: char) -> Option<char> {
    let base = match ch {
        'À'..='Å' => 'A',
        'Ç' => 'C',
        'È'..='Ë' => 'E',
        'Ì'..='Ï' => 'I',
        'Ñ' => 'N',
        'Ò'..='Ö' | 'Ø' => 'O',
        'Ù'..='Ü' => 'U',
        'Ý' => 'Y',
        'à'..='å' => 'a',
        'ç' => 'c',
        'è'..='ë' => 'e',
        'ì'..='ï' => 'i',
        'ñ' => 'n',
        'ò'..='ö' | 'ø' => 'o',
        'ù'..='ü' => 'u',
        'ý' | 'ÿ' => 'y',
        _ => return None,
    };
    Some(base)
}

fn winansi_byte(ch: char) -> u8 {
    match ch {
        ' '..='~' => ch as u8,
        '\u{a0}'..='\u{ff}' => ch as u32 as u8,
        '€' => 0x80,
        '‚' => 0x82,
        '„' => 0x84,
        '…' => 0x85,
        '‘' => 0x91,
        '’' => 0x92,
        '“' => 0x93,
        '”' => 0x94,
        '•' => 0x95,
        '–' => 0x96,
        '—' => 0x97,
        'Š' => 0x8A,
        'Œ' => 0x8C,
        'Ž' => 0x8E,
        'š' => 0x9A,
        'œ' => 0x9C,
        'ž' => 0x9E,
        'Ÿ' => 0x9F,
        _ => b'?',
    }
}

#[derive(Debug, Clone, Copy)]
struct GlyphInfo {
    gid: u16,
    advance: u16,
}

/// A caller-supplied TrueType/OpenType font.
pub struct EmbeddedFont {
    family: String,
    data: Vec<u8>,
    glyphs: HashMap<char, GlyphInfo>,
    notdef_advance: u16,
    units_per_em: f32,
    ascender: f32,
    descender: f32,
    cap_height: f32,
    bbox: [f32; 4],
}

impl std::fmt::Debug for EmbeddedFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddedFont")
            .field("family", &self.family)
            .field("bytes", &self.data.len())
            .field("glyphs", &self.glyphs.len())
            .finish()
    }
}

impl EmbeddedFont {
    /// Parse font bytes and index every glyph in the Basic Multilingual Plane.
    pub fn parse(family: &str, data: Vec<u8>) -> Result<Self> {
        let face = ttf_parser::Face::parse(&data, 0).map_err(|e| {
            CertificateError::InvalidConfig(format!("font '{}' could not be parsed: {}", family, e))
        })?;

        let units_per_em = face.units_per_em() as f32;
        let mut glyphs = HashMap::new();
        for code_point in 0x20u32..=0xFFFF {
            let Some(ch) = char::from_u32(code_point) else {
                continue;
            };
            if let Some(glyph_id) = face.glyph_index(ch) {
                let advance = face.glyph_hor_advance(glyph_id).unwrap_or(0);
                glyphs.insert(
                    ch,
                    GlyphInfo {
                        gid: glyph_id.0,
                        advance,
                    },
                );
            }
        }
        if glyphs.is_empty() {
            return Err(CertificateError::InvalidConfig(format!(
                "font '{}' maps no Unicode characters",
                family
            )));
        }

        let notdef_advance = face
            .glyph_hor_advance(ttf_parser::GlyphId(0))
            .unwrap_or(0);
        let bbox = face.global_bounding_box();
        let to_em = |v: i16| v as f32 / units_per_em;

        debug!("Parsed font '{}' with {} mapped characters", family, glyphs.len());

        Ok(Self {
            family: family.to_string(),
            glyphs,
            notdef_advance,
            units_per_em,
            ascender: to_em(face.ascender()),
            descender: to_em(face.descender()),
            cap_height: to_em(face.capital_height().unwrap_or(face.ascender())),
            bbox: [
                to_em(bbox.x_min),
                to_em(bbox.y_min),
                to_em(bbox.x_max),
                to_em(bbox.y_max),
            ],
            data,
        })
    }

    /// Declared family name.
    pub fn family(&self) -> &str {
        &self.family
    }

    /// Whether the font has a glyph for `ch`.
    pub fn has_glyph(&self, ch: char) -> bool {
        self.glyphs.contains_key(&ch)
    }

    pub fn resource_name(&self) -> Name<'static> {
        Name(b"F5")
    }

    fn glyph(&self, ch: char) -> GlyphInfo {
        self.glyphs.get(&ch).copied().unwrap_or(GlyphInfo {
            gid: 0,
            advance: self.notdef_advance,
        })
    }

    /// Encode text as big-endian 2-byte glyph ids.
    pub fn encode(&self, text: &str) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(text.len() * 2);
        for ch in text.chars() {
            bytes.extend_from_slice(&self.glyph(ch).gid.to_be_bytes());
        }
        bytes
    }

    fn postscript_name(&self) -> String {
        let name: String = self
            .family
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
            .collect();
        if name.is_empty() {
            "EmbeddedFont".to_string()
        } else {
            name
        }
    }

    /// Write the Type0 font tree. `next_ref` hands out fresh object ids.
    ///
    /// Widths and the ToUnicode map only cover the characters in `used`.
    pub(crate) fn write(
        &self,
        pdf: &mut Pdf,
        font_id: Ref,
        used: &BTreeSet<char>,
        next_ref: &mut impl FnMut() -> Ref,
    ) {
        let descriptor_id = next_ref();
        let cid_font_id = next_ref();
        let font_file_id = next_ref();
        let to_unicode_id = next_ref();

        let ps_name = self.postscript_name();
        let base_font = Name(ps_name.as_bytes());
        let scale = 1000.0 / self.units_per_em;

        let compressed = compress_to_vec_zlib(&self.data, 6);
        pdf.stream(font_file_id, &compressed)
            .filter(Filter::FlateDecode)
            .pair(Name(b"Length1"), self.data.len() as i32);

        pdf.font_descriptor(descriptor_id)
            .name(base_font)
            .flags(FontFlags::SYMBOLIC)
            .bbox(Rect::new(
                self.bbox[0] * 1000.0,
                self.bbox[1] * 1000.0,
                self.bbox[2] * 1000.0,
                self.bbox[3] * 1000.0,
            ))
            .italic_angle(0.0)
            .ascent(self.ascender * 1000.0)
            .descent(self.descender * 1000.0)
            .cap_height(self.cap_height * 1000.0)
            .stem_v(80.0)
            .font_file2(font_file_id);

        let mut widths: BTreeMap<u16, f32> = BTreeMap::new();
        let mut unicode: BTreeMap<u16, char> = BTreeMap::new();
        for &ch in used {
            let glyph = self.glyph(ch);
            widths.insert(glyph.gid, (glyph.advance as f32 * scale).round());
            if glyph.gid != 0 {
                unicode.entry(glyph.gid).or_insert(ch);
            }
        }

        {
            let mut cid_font = pdf.cid_font(cid_font_id);
            cid_font
                .subtype(CidFontType::Type2)
                .base_font(base_font)
                .system_info(SystemInfo {
                    registry: Str(b"Adobe"),
                    ordering: Str(b"Identity"),
                    supplement: 0,
                })
                .font_descriptor(descriptor_id)
                .default_width((self.notdef_advance as f32 * scale).round())
                .cid_to_gid_map_predefined(Name(b"Identity"));

            let mut writer = cid_font.widths();
            let mut iter = widths.into_iter().peekable();
            while let Some((start, width)) = iter.next() {
                let mut run = vec![width];
                let mut last = start;
                while let Some(&(next, next_width)) = iter.peek() {
                    if next != last.wrapping_add(1) {
                        break;
                    }
                    run.push(next_width);
                    last = next;
                    iter.next();
                }
                writer.consecutive(start, run);
            }
        }

        pdf.stream(to_unicode_id, to_unicode_cmap(&unicode).as_bytes());

        pdf.type0_font(font_id)
            .base_font(base_font)
            .encoding_predefined(Name(b"Identity-H"))
            .descendant_font(cid_font_id)
            .to_unicode(to_unicode_id);
    }
}

impl TextMeasure for EmbeddedFont {
    fn text_width_pt(&self, text: &str, size: f32) -> f32 {
        let units: u32 = text.chars().map(|c| self.glyph(c).advance as u32).sum();
        units as f32 * size / self.units_per_em
    }

    fn ascent(&self) -> f32 {
        self.ascender
    }

    fn descent(&self) -> f32 {
        self.descender
    }
}

fn to_unicode_cmap(map: &BTreeMap<u16, char>) -> String {
    let mut sections = String::new();
    let pairs: Vec<_> = map.iter().collect();
    for chunk in pairs.chunks(100) {
        let _ = writeln!(sections, "{} beginbfchar", chunk.len());
        for (gid, ch) in chunk {
            let mut units = [0u16; 2];
            let hex: String = ch
                .encode_utf16(&mut units)
                .iter()
                .map(|u| format!("{:04X}", u))
                .collect();
            let _ = writeln!(sections, "<{:04X}> <{}>", gid, hex);
        }
        sections.push_str("endbfchar\n");
    }

    format!(
        "/CIDInit /ProcSet findresource begin\n\
         12 dict begin\n\
         begincmap\n\
         /CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n\
         /CMapName /Adobe-Identity-UCS def\n\
         /CMapType 2 def\n\
         1 begincodespacerange\n\
         <0000> <FFFF>\n\
         endcodespacerange\n\
         {}endcmap\n\
         CMapName currentdict /CMap defineresource pop\n\
         end\n\
         end\n",
        sections
    )
}

/// The font actually used for the name, after fallbacks.
#[derive(Debug, Clone)]
pub enum ResolvedFont {
    Builtin(BuiltinFont),
    Embedded(Arc<EmbeddedFont>),
}

impl ResolvedFont {
    /// Resolve a template font source. Never fails: anything unusable falls
    /// back to Helvetica-Bold with a warning.
    pub fn resolve(source: &FontSource) -> Self {
        match source {
            FontSource::Builtin(name) => match BuiltinFont::bold_for_family(name) {
                Some(font) => ResolvedFont::Builtin(font),
                None => {
                    warn!("Unknown built-in font '{}', using Helvetica-Bold", name);
                    ResolvedFont::Builtin(BuiltinFont::HelveticaBold)
                }
            },
            FontSource::Embedded { name, data } => {
                match EmbeddedFont::parse(name, data.clone()) {
                    Ok(font) => ResolvedFont::Embedded(Arc::new(font)),
                    Err(e) => {
                        warn!("{}; using Helvetica-Bold", e);
                        ResolvedFont::Builtin(BuiltinFont::HelveticaBold)
                    }
                }
            }
        }
    }

    pub fn resource_name(&self) -> Name<'static> {
        match self {
            ResolvedFont::Builtin(font) => font.resource_name(),
            ResolvedFont::Embedded(font) => font.resource_name(),
        }
    }

    /// Encode text for a `Tj` operator in this font.
    pub fn encode(&self, text: &str) -> Vec<u8> {
        match self {
            ResolvedFont::Builtin(font) => font.encode(text),
            ResolvedFont::Embedded(font) => font.encode(text),
        }
    }

    pub fn is_embedded(&self) -> bool {
        matches!(self, ResolvedFont::Embedded(_))
    }
}

impl TextMeasure for ResolvedFont {
    fn text_width_pt(&self, text: &str, size: f32) -> f32 {
        match self {
            ResolvedFont::Builtin(font) => font.text_width_pt(text, size),
            ResolvedFont::Embedded(font) => font.text_width_pt(text, size),
        }
    }

    fn ascent(&self) -> f32 {
        match self {
            ResolvedFont::Builtin(font) => font.ascent(),
            ResolvedFont::Embedded(font) => font.ascent(),
        }
    }

    fn descent(&self) -> f32 {
        match self {
            ResolvedFont::Builtin(font) => font.descent(),
            ResolvedFont::Embedded(font) => font.descent(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SYSTEM_FONT: &str = "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf";

    #[test]
    fn test_helvetica_widths() {
        let font = BuiltinFont::Helvetica;
        // H=722 e=556 l=222 l=222 o=556
        assert!((font.text_width_pt("Hello", 10.0) - 22.78).abs() < 1e-3);
        assert_eq!(font.text_width_pt("", 10.0), 0.0);
    }

    #[test]
    fn test_bold_is_wider_than_regular() {
        let text = "John Doe";
        assert!(
            BuiltinFont::HelveticaBold.text_width_pt(text, 12.0)
                > BuiltinFont::Helvetica.text_width_pt(text, 12.0)
        );
    }

    #[test]
    fn test_width_scales_linearly() {
        let font = BuiltinFont::HelveticaBold;
        let one = font.text_width_pt("Certificate", 1.0);
        let forty = font.text_width_pt("Certificate", 40.0);
        assert!((one * 40.0 - forty).abs() < 1e-3);
    }

    #[test]
    fn test_courier_is_monospace() {
        let font = BuiltinFont::Courier;
        assert_eq!(font.text_width_pt("iiii", 10.0), font.text_width_pt("WWWW", 10.0));
        assert!((font.text_width_pt("abc", 10.0) - 18.0).abs() < 1e-4);
    }

    #[test]
    fn test_accented_letters_use_base_width() {
        let font = BuiltinFont::Helvetica;
        assert_eq!(font.text_width_pt("é", 10.0), font.text_width_pt("e", 10.0));
        assert_eq!(font.text_width_pt("Ñ", 10.0), font.text_width_pt("N", 10.0));
    }

    #[test]
    fn test_bold_for_family() {
        assert_eq!(
            BuiltinFont::bold_for_family("Helvetica"),
            Some(BuiltinFont::HelveticaBold)
        );
        assert_eq!(
            BuiltinFont::bold_for_family("courier new"),
            Some(BuiltinFont::CourierBold)
        );
        assert_eq!(BuiltinFont::bold_for_family("Comic Sans"), Some(BuiltinFont::HelveticaBold));
        assert_eq!(BuiltinFont::bold_for_family("Garamond"), None);
    }

    #[test]
    fn test_winansi_encoding() {
        let font = BuiltinFont::Helvetica;
        assert_eq!(font.encode("Hi!"), b"Hi!".to_vec());
        assert_eq!(font.encode("José"), vec![b'J', b'o', b's', 0xE9]);
        assert_eq!(font.encode("a • b"), vec![b'a', b' ', 0x95, b' ', b'b']);
        assert_eq!(font.encode("日"), vec![b'?']);
    }

    #[test]
    fn test_resource_names_are_distinct() {
        let mut names: Vec<_> = BuiltinFont::ALL.iter().map(|f| f.resource_name().0).collect();
        names.push(b"F5");
        let count = names.len();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), count);
    }

    #[test]
    fn test_embedded_font_rejects_garbage() {
        let result = EmbeddedFont::parse("Broken", vec![0, 1, 2, 3, 4, 5]);
        match result {
            Err(CertificateError::InvalidConfig(msg)) => assert!(msg.contains("Broken")),
            _ => panic!("Expected InvalidConfig"),
        }
    }

    #[test]
    fn test_resolve_falls_back_to_helvetica_bold() {
        let garbage = FontSource::Embedded {
            name: "Broken".to_string(),
            data: b"not a font".to_vec(),
        };
        match ResolvedFont::resolve(&garbage) {
            ResolvedFont::Builtin(BuiltinFont::HelveticaBold) => (),
            other => panic!("Expected Helvetica-Bold fallback, got {:?}", other),
        }

        match ResolvedFont::resolve(&FontSource::Builtin("Papyrus".to_string())) {
            ResolvedFont::Builtin(BuiltinFont::HelveticaBold) => (),
            other => panic!("Expected Helvetica-Bold fallback, got {:?}", other),
        }

        match ResolvedFont::resolve(&FontSource::Builtin("Courier".to_string())) {
            ResolvedFont::Builtin(BuiltinFont::CourierBold) => (),
            other => panic!("Expected Courier-Bold, got {:?}", other),
        }
    }

    #[test]
    fn test_to_unicode_cmap_lists_pairs() {
        let mut map = BTreeMap::new();
        map.insert(36u16, 'A');
        map.insert(70u16, 'é');
        let cmap = to_unicode_cmap(&map);
        assert!(cmap.contains("2 beginbfchar"));
        assert!(cmap.contains("<0024> <0041>"));
        assert!(cmap.contains("<0046> <00E9>"));
    }

    #[test]
    fn test_embedded_system_font_if_present() {
        let Ok(data) = std::fs::read(SYSTEM_FONT) else {
            return;
        };
        let font = EmbeddedFont::parse("DejaVu Sans", data).unwrap();
        assert!(font.has_glyph('A'));
        assert!(font.ascent() > 0.0);
        assert!(font.descent() < 0.0);
        assert!(font.text_width_pt("Hello", 10.0) > 0.0);
        assert_eq!(font.encode("AB").len(), 4);
        assert_eq!(font.postscript_name(), "DejaVuSans");
    }
}
