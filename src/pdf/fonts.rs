//! Fonts used for the overlays.
//!
//! Overlays are set in the standard Helvetica Type1 font with
//! WinAnsiEncoding, which covers Latin text (Portuguese included).
//! Text outside WinAnsi falls back to a system TrueType font embedded
//! as a Type0 / CIDFontType2 font with Identity-H encoding.

use anyhow::Result;
use fontdb::Database;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use std::collections::BTreeMap;
use std::path::Path;
use ttf_parser::Face;

use super::content::compress_data;

/// Metrics and encoding of a font an overlay can be drawn with.
///
/// Widths and ascent are in thousandths of an em.
pub trait TextFont {
    fn advance(&self, c: char) -> f64;

    fn ascent(&self) -> f64;

    fn encode(&self, text: &str) -> Object;

    fn string_width(&self, text: &str, font_size: f64) -> f64 {
        text.chars().map(|c| self.advance(c)).sum::<f64>() * font_size / 1000.0
    }
}

/// Helvetica advance widths for WinAnsi codes 32..=126.
const HELVETICA_ASCII_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // '0'..'9'
    278, 278, 584, 584, 584, 556, 1015, // ':'..'@'
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, // 'A'..'M'
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, // 'N'..'Z'
    278, 278, 278, 469, 556, 333, // '['..'`'
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, // 'a'..'m'
    556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, // 'n'..'z'
    334, 260, 334, 584, // '{'..'~'
];

/// The standard Helvetica font, resource `/F1`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Helvetica;

impl Helvetica {
    pub const RESOURCE_NAME: &'static str = "F1";

    /// Add the font dictionary to `doc`.
    pub fn create(doc: &mut Document) -> ObjectId {
        let mut font_dict = Dictionary::new();
        font_dict.set("Type", "Font");
        font_dict.set("Subtype", "Type1");
        font_dict.set("BaseFont", "Helvetica");
        font_dict.set("Encoding", "WinAnsiEncoding");
        doc.add_object(Object::Dictionary(font_dict))
    }
}

impl TextFont for Helvetica {
    fn advance(&self, c: char) -> f64 {
        let width = match c {
            ' '..='~' => HELVETICA_ASCII_WIDTHS[c as usize - 32],
            '\t' | '\u{A0}' => 278,
            '—' | '…' | '‰' => 1000,
            '“' | '”' | '«' | '»' => 333,
            '‘' | '’' | '‚' => 222,
            '•' => 350,
            '°' => 400,
            _ => match base_letter(c) {
                Some(base) => HELVETICA_ASCII_WIDTHS[base as usize - 32],
                None => 556,
            },
        };
        width as f64
    }

    fn ascent(&self) -> f64 {
        718.0
    }

    fn encode(&self, text: &str) -> Object {
        let bytes = text
            .chars()
            .map(|c| match c {
                '\t' => b' ',
                _ => win_ansi_code(c).unwrap_or(b'?'),
            })
            .collect();
        Object::String(bytes, StringFormat::Literal)
    }
}

/// Unaccented letter of a Latin-1 accented letter, used for width lookup.
fn base_letter(c: char) -> Option<char> {
    let base = match c {
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

/// WinAnsiEncoding code of `c`, if it has one.
pub fn win_ansi_code(c: char) -> Option<u8> {
    let code = match c {
        ' '..='~' | '\u{A0}'..='\u{FF}' => c as u8,
        '€' => 0x80,
        '‚' => 0x82,
        'ƒ' => 0x83,
        '„' => 0x84,
        '…' => 0x85,
        '†' => 0x86,
        '‡' => 0x87,
        'ˆ' => 0x88,
        '‰' => 0x89,
        'Š' => 0x8A,
        '‹' => 0x8B,
        'Œ' => 0x8C,
        'Ž' => 0x8E,
        '‘' => 0x91,
        '’' => 0x92,
        '“' => 0x93,
        '”' => 0x94,
        '•' => 0x95,
        '–' => 0x96,
        '—' => 0x97,
        '˜' => 0x98,
        '™' => 0x99,
        'š' => 0x9A,
        '›' => 0x9B,
        'œ' => 0x9C,
        'ž' => 0x9E,
        'Ÿ' => 0x9F,
        _ => return None,
    };
    Some(code)
}

/// Whether every drawable character of `text` is representable in WinAnsi.
pub fn is_win_ansi(text: &str) -> bool {
    text.chars()
        .filter(|c| !c.is_control())
        .all(|c| win_ansi_code(c).is_some())
}

/// A TrueType font loaded from the system.
///
/// Only the glyphs of the characters it was loaded for are mapped. CIDs are
/// assigned from 1 in order of first use, so any Unicode scalar value the
/// font has a glyph for can be drawn. CID 0 is `.notdef`.
pub struct UnicodeFont {
    family: String,
    data: Vec<u8>,
    units_per_em: f64,
    ascender: f64,
    descender: f64,
    bbox: [i64; 4],
    cids: BTreeMap<char, u16>,
    /// (glyph id, advance in 1/1000 em), indexed by CID - 1
    glyphs: Vec<(u16, f64)>,
}

impl UnicodeFont {
    /// Parse `data` and map the glyphs for `text`.
    ///
    /// Returns `None` if the font is not a TrueType-outline font or
    /// lacks a glyph for any character of `text`.
    pub fn load(family: &str, data: Vec<u8>, text: &str) -> Option<Self> {
        let face = Face::parse(&data, 0).ok()?;
        face.tables().glyf.as_ref()?;

        let units_per_em = face.units_per_em() as f64;
        let scale = 1000.0 / units_per_em;
        let mut cids = BTreeMap::new();
        let mut glyphs = Vec::new();
        for c in text.chars().filter(|c| !c.is_control()) {
            if cids.contains_key(&c) {
                continue;
            }
            let gid = face.glyph_index(c)?;
            let advance = face.glyph_hor_advance(gid).unwrap_or(0) as f64 * scale;
            glyphs.push((gid.0, advance));
            cids.insert(c, u16::try_from(glyphs.len()).ok()?);
        }

        let rect = face.global_bounding_box();
        let bbox = [
            (rect.x_min as f64 * scale) as i64,
            (rect.y_min as f64 * scale) as i64,
            (rect.x_max as f64 * scale) as i64,
            (rect.y_max as f64 * scale) as i64,
        ];
        let ascender = face.ascender() as f64 * scale;
        let descender = face.descender() as f64 * scale;

        Some(Self {
            family: family.to_string(),
            data,
            units_per_em,
            ascender,
            descender,
            bbox,
            cids,
            glyphs,
        })
    }

    pub fn family(&self) -> &str {
        &self.family
    }

    /// Embed the font in `doc` as a Type0 font.
    ///
    /// Returns the object id of the Type0 font dictionary.
    pub fn embed(&self, doc: &mut Document) -> Result<ObjectId> {
        let base_font = self.family.replace(' ', "-");

        let mut font_descriptor = Dictionary::new();
        font_descriptor.set("Type", "FontDescriptor");
        font_descriptor.set("FontName", base_font.as_str());
        font_descriptor.set("Flags", 4i64); // Symbolic
        font_descriptor.set(
            "FontBBox",
            self.bbox.iter().map(|v| Object::Integer(*v)).collect::<Vec<_>>(),
        );
        font_descriptor.set("ItalicAngle", 0i64);
        font_descriptor.set("Ascent", self.ascender as i64);
        font_descriptor.set("Descent", self.descender as i64);
        font_descriptor.set("CapHeight", (self.ascender * 0.7) as i64);
        font_descriptor.set("StemV", 80i64);

        let mut font_file = Dictionary::new();
        font_file.set("Length1", self.data.len() as i64);
        font_file.set("Filter", "FlateDecode");
        let font_file_id = doc.add_object(Stream::new(font_file, compress_data(&self.data)?));
        font_descriptor.set("FontFile2", Object::Reference(font_file_id));
        let descriptor_id = doc.add_object(Object::Dictionary(font_descriptor));

        let mut cid_to_gid = Dictionary::new();
        cid_to_gid.set("Filter", "FlateDecode");
        let cid_to_gid_id =
            doc.add_object(Stream::new(cid_to_gid, compress_data(&self.cid_to_gid_map())?));

        let mut cid_system = Dictionary::new();
        cid_system.set("Registry", Object::string_literal("Adobe"));
        cid_system.set("Ordering", Object::string_literal("Identity"));
        cid_system.set("Supplement", 0i64);

        let mut cid_font = Dictionary::new();
        cid_font.set("Type", "Font");
        cid_font.set("Subtype", "CIDFontType2");
        cid_font.set("BaseFont", base_font.as_str());
        cid_font.set("CIDSystemInfo", Object::Dictionary(cid_system));
        cid_font.set("FontDescriptor", Object::Reference(descriptor_id));
        cid_font.set("CIDToGIDMap", Object::Reference(cid_to_gid_id));
        cid_font.set("DW", 1000i64);
        cid_font.set("W", self.widths_array());
        let cid_font_id = doc.add_object(Object::Dictionary(cid_font));

        let mut type0_font = Dictionary::new();
        type0_font.set("Type", "Font");
        type0_font.set("Subtype", "Type0");
        type0_font.set("BaseFont", base_font.as_str());
        type0_font.set("Encoding", "Identity-H");
        type0_font.set("DescendantFonts", vec![Object::Reference(cid_font_id)]);

        Ok(doc.add_object(Object::Dictionary(type0_font)))
    }

    /// CIDToGIDMap stream data: big-endian GID per CID, CID 0 mapped to glyph 0.
    fn cid_to_gid_map(&self) -> Vec<u8> {
        let mut map = vec![0u8; 2];
        for (gid, _) in &self.glyphs {
            map.extend_from_slice(&gid.to_be_bytes());
        }
        map
    }

    /// `/W` array in the `1 [w1 w2 ...]` form.
    fn widths_array(&self) -> Vec<Object> {
        if self.glyphs.is_empty() {
            return Vec::new();
        }
        let widths = self
            .glyphs
            .iter()
            .map(|(_, advance)| Object::Integer(advance.round() as i64))
            .collect();
        vec![Object::Integer(1), Object::Array(widths)]
    }

    fn cid(&self, c: char) -> u16 {
        self.cids.get(&c).copied().unwrap_or(0)
    }
}

impl TextFont for UnicodeFont {
    fn advance(&self, c: char) -> f64 {
        match self.cid(c) {
            0 => self.units_per_em.min(1000.0) / 2.0,
            cid => self.glyphs[cid as usize - 1].1,
        }
    }

    fn ascent(&self) -> f64 {
        self.ascender
    }

    /// Identity-H: two bytes per character, the CID big-endian.
    fn encode(&self, text: &str) -> Object {
        let bytes = text.chars().flat_map(|c| self.cid(c).to_be_bytes()).collect();
        Object::String(bytes, StringFormat::Hexadecimal)
    }
}

/// Sans-serif families with wide Unicode coverage, in order of preference.
const UNICODE_FAMILIES: [&str; 7] = [
    "Noto Sans",
    "DejaVu Sans",
    "Liberation Sans",
    "Arial",
    "Arial Unicode MS",
    "Helvetica Neue",
    "FreeSans",
];

/// Font database of the fonts installed on this system.
pub fn system_fonts() -> Database {
    let mut db = Database::new();
    db.load_system_fonts();
    db
}

/// Find a system TrueType font with glyphs for every character of `text`.
pub fn find_unicode_font(db: &Database, text: &str) -> Option<UnicodeFont> {
    let families = UNICODE_FAMILIES
        .iter()
        .map(|name| fontdb::Family::Name(*name))
        .chain(std::iter::once(fontdb::Family::SansSerif));

    for family in families {
        let query = fontdb::Query {
            families: &[family],
            ..Default::default()
        };
        let Some(id) = db.query(&query) else {
            continue;
        };
        let Some((source, index)) = db.face_source(id) else {
            continue;
        };
        // Collections cannot be embedded as FontFile2.
        if index != 0 {
            continue;
        }

        let family_name = db
            .face(id)
            .and_then(|face| face.families.first().map(|(name, _)| name.clone()))
            .unwrap_or_else(|| "UnicodeFont".to_string());

        let data = match source {
            fontdb::Source::File(path) => read_font_file(&path),
            fontdb::Source::Binary(data) => {
                let bytes: &[u8] = data.as_ref().as_ref();
                Some(bytes.to_vec())
            }
            _ => None,
        };

        if let Some(font) = data.and_then(|data| UnicodeFont::load(&family_name, data, text)) {
            tracing::debug!("Using system font {:?} for non-WinAnsi text", font.family());
            return Some(font);
        }
    }

    None
}

fn read_font_file(path: &Path) -> Option<Vec<u8>> {
    let is_ttf = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("ttf"));
    if !is_ttf {
        return None;
    }
    std::fs::read(path).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_win_ansi_covers_portuguese() {
        assert!(is_win_ansi("15 de Março de 2024"));
        assert!(is_win_ansi("Prescrição: João, 2× ao dia – 7 dias"));
        assert_eq!(win_ansi_code('ç'), Some(0xE7));
        assert_eq!(win_ansi_code('€'), Some(0x80));
        assert_eq!(win_ansi_code('—'), Some(0x97));
    }

    #[test]
    fn test_win_ansi_rejects_other_scripts() {
        assert!(!is_win_ansi("Аспирин"));
        assert!(!is_win_ansi("処方箋"));
        assert_eq!(win_ansi_code('→'), None);
    }

    #[test]
    fn test_control_characters_do_not_require_fallback() {
        assert!(is_win_ansi("line one\nline two\t"));
    }

    fn literal_bytes(object: Object) -> Vec<u8> {
        match object {
            Object::String(bytes, StringFormat::Literal) => bytes,
            other => panic!("expected literal string, got {:?}", other),
        }
    }

    #[test]
    fn test_helvetica_encode() {
        assert_eq!(literal_bytes(Helvetica.encode("Março (2024)")), b"Mar\xE7o (2024)");
        assert_eq!(literal_bytes(Helvetica.encode("a→b")), b"a?b");
        assert_eq!(literal_bytes(Helvetica.encode("1.\tDipirona")), b"1. Dipirona");
    }

    #[test]
    fn test_helvetica_widths() {
        assert_eq!(Helvetica.advance(' '), 278.0);
        assert_eq!(Helvetica.advance('W'), 944.0);
        assert_eq!(Helvetica.advance('i'), 222.0);
        assert_eq!(Helvetica.advance('~'), 584.0);
        assert_eq!(Helvetica.advance('ç'), Helvetica.advance('c'));
        assert_eq!(Helvetica.advance('Ã'), Helvetica.advance('A'));
        // "Hello" = 722 + 556 + 222 + 222 + 556 = 2278 thousandths
        assert!((Helvetica.string_width("Hello", 12.0) - 27.336).abs() < 1e-9);
    }

    fn hex_bytes(object: Object) -> Vec<u8> {
        match object {
            Object::String(bytes, StringFormat::Hexadecimal) => bytes,
            other => panic!("expected hex string, got {:?}", other),
        }
    }

    /// A font mapping 'И' and an emoji, without real font data.
    fn mapped_font() -> UnicodeFont {
        UnicodeFont {
            family: "Test Sans".to_string(),
            data: Vec::new(),
            units_per_em: 2048.0,
            ascender: 900.0,
            descender: -200.0,
            bbox: [0, -200, 1000, 900],
            cids: BTreeMap::from([('И', 1), ('😀', 2)]),
            glyphs: vec![(37, 722.0), (1204, 1000.0)],
        }
    }

    #[test]
    fn test_unicode_font_cids_cover_supplementary_planes() {
        let font = mapped_font();
        assert_eq!(hex_bytes(font.encode("И😀")), vec![0, 1, 0, 2]);
        // Unmapped characters fall to .notdef rather than a stray glyph.
        assert_eq!(hex_bytes(font.encode("x")), vec![0, 0]);
        assert_eq!(font.advance('😀'), 1000.0);
        assert_eq!(font.advance('x'), 500.0);
    }

    #[test]
    fn test_unicode_font_maps() {
        let font = mapped_font();
        assert_eq!(font.cid_to_gid_map(), vec![0, 0, 0, 37, 0x04, 0xB4]);

        let widths = font.widths_array();
        assert_eq!(widths.len(), 2);
        assert_eq!(widths[0].as_i64().unwrap(), 1);
        let widths: Vec<i64> = widths[1]
            .as_array()
            .unwrap()
            .iter()
            .map(|w| w.as_i64().unwrap())
            .collect();
        assert_eq!(widths, vec![722, 1000]);
    }

    #[test]
    fn test_unicode_font_rejects_garbage() {
        assert!(UnicodeFont::load("Broken", vec![0u8; 64], "abc").is_none());
    }

    #[test]
    fn test_unicode_font_from_system() {
        // Depends on the fonts installed on the machine running the tests.
        let Some(font) = find_unicode_font(&system_fonts(), "Ação") else {
            return;
        };
        assert!(font.advance('A') > 0.0);
        assert!(font.ascent() > 0.0);
        assert_eq!(hex_bytes(font.encode("Aço")), vec![0, 1, 0, 2, 0, 4]);

        let mut doc = Document::with_version("1.5");
        let font_id = font.embed(&mut doc).unwrap();
        let dict = doc.get_dictionary(font_id).unwrap();
        assert_eq!(dict.get(b"Subtype").unwrap().as_name().unwrap(), b"Type0");
        assert_eq!(dict.get(b"Encoding").unwrap().as_name().unwrap(), b"Identity-H");
    }
}
