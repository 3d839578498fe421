//! Font metrics and character decoding for text extraction.

use std::collections::HashMap;

use lopdf::{Dictionary, Document, Object};

use super::cmap::ToUnicodeMap;
use crate::pdf::{number, resolve};

/// Width used for codes a simple font gives no width for.
const DEFAULT_SIMPLE_WIDTH: f64 = 500.0;

/// Default `/DW` of a CID font.
const DEFAULT_CID_WIDTH: f64 = 1000.0;

/// What the interpreter needs to know about a font: how to split a string
/// into character codes, how far each code advances, and what text it means.
#[derive(Debug, Clone)]
pub struct FontMetrics {
    /// Base font name, for logging
    pub name: String,
    /// Two-byte codes (Type0 fonts)
    composite: bool,
    /// Glyph widths in 1/1000 text space units
    widths: HashMap<u32, f64>,
    default_width: f64,
    to_unicode: Option<ToUnicodeMap>,
}

impl Default for FontMetrics {
    fn default() -> Self {
        Self {
            name: "Unknown".to_string(),
            composite: false,
            widths: HashMap::new(),
            default_width: DEFAULT_SIMPLE_WIDTH,
            to_unicode: None,
        }
    }
}

impl FontMetrics {
    /// Read metrics from a font dictionary.
    pub fn from_dict(doc: &Document, font: &Dictionary) -> Self {
        let name = font
            .get(b"BaseFont")
            .ok()
            .and_then(|o| o.as_name().ok())
            .map(|n| String::from_utf8_lossy(n).to_string())
            .unwrap_or_else(|| "Unknown".to_string());

        let composite = font
            .get(b"Subtype")
            .ok()
            .and_then(|o| o.as_name().ok())
            .is_some_and(|s| s == b"Type0");

        let to_unicode = font
            .get(b"ToUnicode")
            .ok()
            .and_then(|o| resolve(doc, o))
            .and_then(|o| o.as_stream().ok())
            .and_then(|s| s.decompressed_content().ok().or_else(|| Some(s.content.clone())))
            .map(|data| ToUnicodeMap::parse(&data))
            .filter(|cmap| !cmap.is_empty());

        let mut metrics = Self {
            name,
            composite,
            to_unicode,
            ..Self::default()
        };

        if composite {
            metrics.read_cid_widths(doc, font);
        } else {
            metrics.read_simple_widths(doc, font);
        }
        metrics
    }

    fn read_simple_widths(&mut self, doc: &Document, font: &Dictionary) {
        let first_char = font
            .get(b"FirstChar")
            .ok()
            .and_then(number)
            .unwrap_or(0.0) as u32;

        if let Some(widths) = font
            .get(b"Widths")
            .ok()
            .and_then(|o| resolve(doc, o))
            .and_then(|o| o.as_array().ok())
        {
            for (offset, width) in widths.iter().enumerate() {
                if let Some(w) = resolve(doc, width).and_then(number) {
                    self.widths.insert(first_char + offset as u32, w);
                }
            }
        }

        if let Some(missing) = font
            .get(b"FontDescriptor")
            .ok()
            .and_then(|o| resolve(doc, o))
            .and_then(|o| o.as_dict().ok())
            .and_then(|d| d.get(b"MissingWidth").ok())
            .and_then(number)
        {
            self.default_width = missing;
        }
    }

    fn read_cid_widths(&mut self, doc: &Document, font: &Dictionary) {
        self.default_width = DEFAULT_CID_WIDTH;

        let Some(descendant) = font
            .get(b"DescendantFonts")
            .ok()
            .and_then(|o| resolve(doc, o))
            .and_then(|o| o.as_array().ok())
            .and_then(|a| a.first())
            .and_then(|o| resolve(doc, o))
            .and_then(|o| o.as_dict().ok())
        else {
            return;
        };

        if let Some(dw) = descendant.get(b"DW").ok().and_then(number) {
            self.default_width = dw;
        }

        let Some(w) = descendant
            .get(b"W")
            .ok()
            .and_then(|o| resolve(doc, o))
            .and_then(|o| o.as_array().ok())
        else {
            return;
        };

        // Entries are either `c [w1 w2 ...]` or `c_first c_last w`.
        let mut i = 0;
        while i < w.len() {
            let Some(start) = number(&w[i]) else {
                i += 1;
                continue;
            };
            match w.get(i + 1).and_then(|o| resolve(doc, o)) {
                Some(Object::Array(list)) => {
                    for (offset, width) in list.iter().enumerate() {
                        if let Some(width) = number(width) {
                            self.widths
                                .insert((start as u32).saturating_add(offset as u32), width);
                        }
                    }
                    i += 2;
                }
                Some(end) => {
                    let (Some(end), Some(width)) = (number(end), w.get(i + 2).and_then(number))
                    else {
                        break;
                    };
                    let first = start as u32;
                    for code in first..=(end as u32).min(first.saturating_add(0xFFFF)) {
                        self.widths.insert(code, width);
                    }
                    i += 3;
                }
                None => break,
            }
        }
    }

    /// Split a string operand into character codes.
    pub fn codes(&self, bytes: &[u8]) -> Vec<u32> {
        let len = if self.composite {
            self.to_unicode
                .as_ref()
                .and_then(ToUnicodeMap::code_len)
                .unwrap_or(2)
        } else {
            1
        };
        bytes
            .chunks(len.max(1))
            .map(|c| c.iter().fold(0u32, |acc, &b| (acc << 8) | b as u32))
            .collect()
    }

    /// Horizontal advance of a code in 1/1000 text space units.
    pub fn width(&self, code: u32) -> f64 {
        self.widths
            .get(&code)
            .copied()
            .unwrap_or(self.default_width)
    }

    /// Word spacing applies to the single-byte code 32 only.
    pub fn is_word_space(&self, bytes_len: usize, code: u32) -> bool {
        !self.composite && bytes_len > 0 && code == 32
    }

    /// Unicode text of a string operand.
    pub fn decode(&self, bytes: &[u8]) -> String {
        let codes = self.codes(bytes);
        let mut text = String::new();
        for code in codes {
            match self.to_unicode.as_ref().and_then(|m| m.get(code)) {
                Some(s) => text.push_str(s),
                None if self.composite => {
                    if let Some(c) = char::from_u32(code).filter(|c| !c.is_control()) {
                        text.push(c);
                    }
                }
                None => text.push(win_ansi_char(code as u8)),
            }
        }
        text
    }
}

/// Map a WinAnsiEncoding byte to a character; undefined bytes fall back to Latin-1.
pub fn win_ansi_char(byte: u8) -> char {
    const HIGH: [char; 32] = [
        '\u{20AC}', '\u{FFFD}', '\u{201A}', '\u{0192}', '\u{201E}', '\u{2026}', '\u{2020}',
        '\u{2021}', '\u{02C6}', '\u{2030}', '\u{0160}', '\u{2039}', '\u{0152}', '\u{FFFD}',
        '\u{017D}', '\u{FFFD}', '\u{FFFD}', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}',
        '\u{2022}', '\u{2013}', '\u{2014}', '\u{02DC}', '\u{2122}', '\u{0161}', '\u{203A}',
        '\u{0153}', '\u{FFFD}', '\u{017E}', '\u{0178}',
    ];
    match byte {
        0x80..=0x9F => HIGH[(byte - 0x80) as usize],
        _ => byte as char,
    }
}

/// Fonts of a resource dictionary, keyed by resource name.
#[derive(Debug, Default)]
pub struct FontSet {
    fonts: HashMap<Vec<u8>, FontMetrics>,
    fallback: FontMetrics,
}

impl FontSet {
    pub fn from_resources(doc: &Document, resources: &Dictionary) -> Self {
        let mut fonts = HashMap::new();
        if let Some(font_dict) = resources
            .get(b"Font")
            .ok()
            .and_then(|o| resolve(doc, o))
            .and_then(|o| o.as_dict().ok())
        {
            for (name, font) in font_dict.iter() {
                if let Some(font) = resolve(doc, font).and_then(|o| o.as_dict().ok()) {
                    fonts.insert(name.clone(), FontMetrics::from_dict(doc, font));
                }
            }
        }
        Self {
            fonts,
            fallback: FontMetrics::default(),
        }
    }

    /// Metrics for a resource name; unknown names get default metrics.
    pub fn get(&self, name: &[u8]) -> &FontMetrics {
        self.fonts.get(name).unwrap_or(&self.fallback)
    }

    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Stream};

    #[test]
    fn test_simple_font_widths() {
        let doc = Document::with_version("1.5");
        let font = dictionary! {
            "Type" => "Font",
            "Subtype" => "TrueType",
            "BaseFont" => "Arial",
            "FirstChar" => 65,
            "Widths" => vec![600.into(), 700.into()],
        };
        let metrics = FontMetrics::from_dict(&doc, &font);
        assert_eq!(metrics.name, "Arial");
        assert_eq!(metrics.width(65), 600.0);
        assert_eq!(metrics.width(66), 700.0);
        assert_eq!(metrics.width(67), DEFAULT_SIMPLE_WIDTH);
        assert_eq!(metrics.codes(b"AB"), vec![65, 66]);
        assert_eq!(metrics.decode(b"AB"), "AB");
    }

    #[test]
    fn test_win_ansi_specials() {
        let metrics = FontMetrics::default();
        assert_eq!(metrics.decode(&[0x93, b'x', 0x94]), "\u{201C}x\u{201D}");
        assert_eq!(metrics.decode(&[0xE9]), "\u{e9}");
    }

    #[test]
    fn test_type0_font_with_to_unicode() {
        let mut doc = Document::with_version("1.5");
        let cmap_id = doc.add_object(Stream::new(
            dictionary! {},
            b"begincmap 1 beginbfchar <0005> <0048> endbfchar 1 beginbfrange <0006> <0007> <0069> endbfrange endcmap"
                .to_vec(),
        ));
        let descendant_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "CIDFontType2",
            "DW" => 800,
            "W" => vec![5.into(), vec![Object::Integer(300)].into(), 6.into(), 7.into(), 450.into()],
        });
        let font = dictionary! {
            "Type" => "Font",
            "Subtype" => "Type0",
            "BaseFont" => "NotoSans",
            "DescendantFonts" => vec![Object::Reference(descendant_id)],
            "ToUnicode" => cmap_id,
        };

        let metrics = FontMetrics::from_dict(&doc, &font);
        assert_eq!(metrics.codes(&[0, 5, 0, 6]), vec![5, 6]);
        assert_eq!(metrics.decode(&[0, 5, 0, 6, 0, 7]), "Hij");
        assert_eq!(metrics.width(5), 300.0);
        assert_eq!(metrics.width(7), 450.0);
        assert_eq!(metrics.width(9), 800.0);
        assert!(!metrics.is_word_space(2, 32));
    }

    #[test]
    fn test_cid_widths_at_top_of_code_range() {
        let mut doc = Document::with_version("1.5");
        let top = Object::Integer(u32::MAX as i64);
        let descendant_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "CIDFontType0",
            "W" => vec![
                top.clone(), top.clone(), 500.into(),
                top.clone(), vec![Object::Integer(600), Object::Integer(700)].into(),
            ],
        });
        let font = dictionary! {
            "Type" => "Font",
            "Subtype" => "Type0",
            "DescendantFonts" => vec![Object::Reference(descendant_id)],
        };

        let metrics = FontMetrics::from_dict(&doc, &font);
        assert_eq!(metrics.width(u32::MAX), 700.0);
        assert_eq!(metrics.width(0), DEFAULT_CID_WIDTH);
    }

    #[test]
    fn test_font_set_fallback() {
        let doc = Document::with_version("1.5");
        let resources = dictionary! {
            "Font" => dictionary! {
                "F1" => dictionary! { "Type" => "Font", "Subtype" => "Type1", "BaseFont" => "Helvetica" },
            },
        };
        let fonts = FontSet::from_resources(&doc, &resources);
        assert_eq!(fonts.len(), 1);
        assert_eq!(fonts.get(b"F1").name, "Helvetica");
        assert_eq!(fonts.get(b"F9").name, "Unknown");
    }
}
