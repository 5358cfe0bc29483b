//! Content stream generation for the canvas page.
//!
//! This module provides:
//! - Drawing the imported template page (a Form XObject)
//! - Text overlays clipped to their box, wrapped at the box width
//! - Stream compression

use anyhow::Result;
use lopdf::content::{Content, Operation};
use lopdf::Object;
use std::io::Write;

use crate::config::OverlaySpec;
use super::fonts::TextFont;

/// Line height as a multiple of font size.
const LINE_HEIGHT_FACTOR: f64 = 1.2;

/// Builder for the canvas page's content stream.
#[derive(Default)]
pub struct ContentBuilder {
    pub operations: Vec<Operation>,
}

impl ContentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Paint the XObject `name` at the page origin.
    pub fn draw_form(&mut self, name: &str) {
        self.operations.push(Operation::new("q", vec![]));
        self.operations.push(Operation::new("Do", vec![name.into()]));
        self.operations.push(Operation::new("Q", vec![]));
    }

    /// Draw `value` upright in the box of `spec`, in black.
    ///
    /// The first baseline sits one ascent below the top edge of the box;
    /// anything outside the box is clipped. Empty text draws nothing.
    pub fn add_text(
        &mut self,
        value: &str,
        spec: &OverlaySpec,
        font: &dyn TextFont,
        font_resource: &str,
        font_size: f64,
    ) {
        let x = spec.x.as_points();
        let top = spec.y.as_points();
        let w = spec.w.as_points();
        let h = spec.h.as_points();

        let lines = wrap_lines(value, w, font, font_size);
        if lines.is_empty() {
            return;
        }
        let baseline = top - font.ascent() * font_size / 1000.0;

        let ops = &mut self.operations;
        ops.push(Operation::new("q", vec![]));
        ops.push(Operation::new("re", vec![real(x), real(top - h), real(w), real(h)]));
        ops.push(Operation::new("W", vec![]));
        ops.push(Operation::new("n", vec![]));
        ops.push(Operation::new("g", vec![0.into()]));
        ops.push(Operation::new("BT", vec![]));
        ops.push(Operation::new("Tf", vec![font_resource.into(), real(font_size)]));
        ops.push(Operation::new("TL", vec![real(font_size * LINE_HEIGHT_FACTOR)]));
        ops.push(Operation::new("Td", vec![real(x), real(baseline)]));
        for (i, line) in lines.iter().enumerate() {
            if i > 0 {
                ops.push(Operation::new("T*", vec![]));
            }
            if !line.is_empty() {
                ops.push(Operation::new("Tj", vec![font.encode(line)]));
            }
        }
        ops.push(Operation::new("ET", vec![]));
        ops.push(Operation::new("Q", vec![]));
    }

    pub fn build_content_bytes(self) -> Result<Vec<u8>> {
        let content = Content {
            operations: self.operations,
        };
        Ok(content.encode()?)
    }
}

fn real(value: f64) -> Object {
    Object::Real(value as f32)
}

/// Break `text` into lines no wider than `max_width` points.
///
/// Explicit newlines always break. Spacing is kept as typed, except the
/// whitespace at a wrap point, which is dropped. Words wider than the box
/// are split between characters. Returns no lines for empty text.
pub fn wrap_lines(text: &str, max_width: f64, font: &dyn TextFont, font_size: f64) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }

    let mut lines = Vec::new();

    for paragraph in text.split('\n') {
        let paragraph = paragraph.trim_end_matches('\r');
        let mut line = String::new();
        let mut line_width = 0.0;
        // Whitespace run waiting for the word after it.
        let mut gap = "";
        let mut wrapped = false;

        for (is_space, run) in whitespace_runs(paragraph) {
            if is_space {
                gap = run;
                continue;
            }
            let gap_width = font.string_width(gap, font_size);
            let word_width = font.string_width(run, font_size);

            // Leading indentation only counts on the first line.
            let joins = !line.is_empty() || !wrapped;
            if joins && line_width + gap_width + word_width <= max_width {
                line.push_str(gap);
                line.push_str(run);
                line_width += gap_width + word_width;
                gap = "";
                continue;
            }
            if !line.is_empty() {
                lines.push(std::mem::take(&mut line));
                line_width = 0.0;
            }
            gap = "";
            wrapped = true;

            if word_width <= max_width {
                line.push_str(run);
                line_width = word_width;
                continue;
            }

            for c in run.chars() {
                let char_width = font.advance(c) * font_size / 1000.0;
                if !line.is_empty() && line_width + char_width > max_width {
                    lines.push(std::mem::take(&mut line));
                    line_width = 0.0;
                }
                line.push(c);
                line_width += char_width;
            }
        }

        line.push_str(gap);
        lines.push(line);
    }

    lines
}

/// Split `text` into alternating runs of whitespace and non-whitespace.
fn whitespace_runs(text: &str) -> Vec<(bool, &str)> {
    let mut runs = Vec::new();
    let mut start = 0;
    let mut current: Option<bool> = None;

    for (i, c) in text.char_indices() {
        let is_space = c.is_whitespace();
        match current {
            Some(prev) if prev != is_space => {
                runs.push((prev, &text[start..i]));
                start = i;
                current = Some(is_space);
            }
            Some(_) => {}
            None => current = Some(is_space),
        }
    }
    if let Some(is_space) = current {
        runs.push((is_space, &text[start..]));
    }
    runs
}

/// Compress data using zlib/flate2
pub fn compress_data(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::fonts::Helvetica;

    fn operators(builder: &ContentBuilder) -> Vec<&str> {
        builder.operations.iter().map(|op| op.operator.as_str()).collect()
    }

    #[test]
    fn test_wrap_short_text_is_one_line() {
        let lines = wrap_lines("Maria Silva", 400.0, &Helvetica, 12.0);
        assert_eq!(lines, vec!["Maria Silva"]);
    }

    #[test]
    fn test_wrap_empty_text() {
        assert!(wrap_lines("", 400.0, &Helvetica, 12.0).is_empty());
    }

    #[test]
    fn test_wrap_breaks_on_words() {
        // "aaaa" is 4 * 556 * 12 / 1000 = 26.688pt wide, a space 3.336pt.
        let lines = wrap_lines("aaaa aaaa aaaa", 60.0, &Helvetica, 12.0);
        assert_eq!(lines, vec!["aaaa aaaa", "aaaa"]);
    }

    #[test]
    fn test_wrap_keeps_explicit_newlines_and_blank_lines() {
        let lines = wrap_lines("Amoxicilina 500mg\r\n\n1x ao dia", 400.0, &Helvetica, 12.0);
        assert_eq!(lines, vec!["Amoxicilina 500mg", "", "1x ao dia"]);
    }

    #[test]
    fn test_wrap_keeps_spacing_as_typed() {
        let lines = wrap_lines("  Amoxicilina   500mg", 400.0, &Helvetica, 12.0);
        assert_eq!(lines, vec!["  Amoxicilina   500mg"]);
        assert_eq!(wrap_lines("Maria  Silva ", 400.0, &Helvetica, 12.0), vec!["Maria  Silva "]);
    }

    #[test]
    fn test_wrap_drops_whitespace_at_break() {
        // "aaaa" is 26.688pt, a space 3.336pt: three spaces push the second
        // word past 60pt, a single one does not.
        let lines = wrap_lines("aaaa   aaaa aaaa", 60.0, &Helvetica, 12.0);
        assert_eq!(lines, vec!["aaaa", "aaaa aaaa"]);
    }

    #[test]
    fn test_whitespace_runs() {
        assert_eq!(
            whitespace_runs(" ab  c"),
            vec![(true, " "), (false, "ab"), (true, "  "), (false, "c")]
        );
        assert!(whitespace_runs("").is_empty());
    }

    #[test]
    fn test_wrap_splits_long_words() {
        // Each 'm' is 833 * 10 / 1000 = 8.33pt.
        let lines = wrap_lines("mmmmmmmmmm", 25.0, &Helvetica, 10.0);
        assert_eq!(lines, vec!["mmm", "mmm", "mmm", "m"]);
    }

    #[test]
    fn test_draw_form_operations() {
        let mut builder = ContentBuilder::new();
        builder.draw_form("Tpl");
        assert_eq!(operators(&builder), vec!["q", "Do", "Q"]);
    }

    #[test]
    fn test_add_text_operations() {
        let mut builder = ContentBuilder::new();
        builder.add_text("Hello", &OverlaySpec::at(130.0, 621.0), &Helvetica, "F1", 12.0);

        assert_eq!(
            operators(&builder),
            vec!["q", "re", "W", "n", "g", "BT", "Tf", "TL", "Td", "Tj", "ET", "Q"]
        );

        let td = &builder.operations[8];
        let x = td.operands[0].as_float().unwrap();
        let y = td.operands[1].as_float().unwrap();
        assert!((x - 130.0).abs() < 1e-3);
        // 621 - 718 * 12 / 1000
        assert!((y - 612.384).abs() < 1e-3);

        let clip = &builder.operations[1];
        assert!((clip.operands[1].as_float().unwrap() - 421.0).abs() < 1e-3);
        assert!((clip.operands[2].as_float().unwrap() - 400.0).abs() < 1e-3);
    }

    #[test]
    fn test_add_text_multiline_uses_next_line_operator() {
        let mut builder = ContentBuilder::new();
        builder.add_text("one\ntwo", &OverlaySpec::at(140.0, 570.0), &Helvetica, "F1", 12.0);
        let ops = operators(&builder);
        assert_eq!(ops.iter().filter(|op| **op == "Tj").count(), 2);
        assert_eq!(ops.iter().filter(|op| **op == "T*").count(), 1);
    }

    #[test]
    fn test_add_empty_text_draws_nothing() {
        let mut builder = ContentBuilder::new();
        builder.add_text("", &OverlaySpec::at(130.0, 621.0), &Helvetica, "F1", 12.0);
        assert!(builder.operations.is_empty());
    }

    #[test]
    fn test_build_content_bytes() {
        let mut builder = ContentBuilder::new();
        builder.draw_form("Tpl");
        builder.add_text("(a) \\ b", &OverlaySpec::at(10.0, 100.0), &Helvetica, "F1", 12.0);
        let bytes = builder.build_content_bytes().unwrap();

        let decoded = Content::decode(&bytes).unwrap();
        let shown: Vec<Vec<u8>> = decoded
            .operations
            .iter()
            .filter(|op| op.operator == "Tj")
            .map(|op| op.operands[0].as_str().unwrap().to_vec())
            .collect();
        assert_eq!(shown, vec![b"(a) \\ b".to_vec()]);
    }

    #[test]
    fn test_compress_data_round_trips() {
        use flate2::read::ZlibDecoder;
        use std::io::Read;

        let compressed = compress_data(b"0 g BT ET").unwrap();
        let mut decoded = Vec::new();
        ZlibDecoder::new(&compressed[..]).read_to_end(&mut decoded).unwrap();
        assert_eq!(decoded, b"0 g BT ET");
    }
}
