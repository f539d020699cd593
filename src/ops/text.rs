use ab_glyph::{point, Font, FontArc, GlyphId, ScaleFont};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::{EditorError, Result};
use crate::{log_info, log_warn};

// ============================================================================
// FONT BOOK: fonts keyed by family name
// ============================================================================

/// Fonts available to text elements, keyed by lower-cased family name.
///
/// Families come from font file stems (`DejaVuSans.ttf` → `dejavusans`).
/// Lookups for an unknown family fall back to the first family in name order
/// so text always renders when at least one font is loaded.
#[derive(Clone, Default)]
pub struct FontBook {
    fonts: BTreeMap<String, FontArc>,
}

impl FontBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `.ttf` / `.otf` file in `dir` (non-recursive). Files that
    /// fail to parse are skipped with a warning.
    pub fn load_dir(dir: &Path) -> Result<Self> {
        let mut book = FontBook::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            let is_font = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.eq_ignore_ascii_case("ttf") || e.eq_ignore_ascii_case("otf"))
                .unwrap_or(false);
            if !is_font {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match fs::read(&path).map_err(EditorError::from).and_then(|b| book.insert_bytes(stem, b)) {
                Ok(()) => {}
                Err(e) => log_warn!("Skipping font {}: {}", path.display(), e),
            }
        }
        log_info!("Loaded {} font(s) from {}", book.len(), dir.display());
        Ok(book)
    }

    pub fn insert(&mut self, family: &str, font: FontArc) {
        self.fonts.insert(family.to_ascii_lowercase(), font);
    }

    pub fn insert_bytes(&mut self, family: &str, bytes: Vec<u8>) -> Result<()> {
        let font = FontArc::try_from_vec(bytes)
            .map_err(|e| EditorError::Decode(format!("font '{family}': {e}")))?;
        self.insert(family, font);
        Ok(())
    }

    /// Font for `family`, or the fallback font when the family is unknown.
    pub fn get(&self, family: &str) -> Option<&FontArc> {
        self.fonts
            .get(&family.to_ascii_lowercase())
            .or_else(|| self.fonts.values().next())
    }

    pub fn families(&self) -> impl Iterator<Item = &str> {
        self.fonts.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }
}

// ============================================================================
// LAYOUT + RASTERISATION
// ============================================================================

/// Text drawing options.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextStyle {
    /// Pixel height of the em square.
    pub px_size: f32,
    pub color: [u8; 4],
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
}

/// Lay out one line left-aligned from x = 0 on the baseline.
/// Returns `(glyphs, advance_width)`.
pub fn layout_line(font: &FontArc, text: &str, px_size: f32) -> (Vec<(GlyphId, f32)>, f32) {
    let scaled = font.as_scaled(px_size);
    let mut glyphs = Vec::with_capacity(text.len());
    let mut cursor_x = 0.0f32;
    let mut last: Option<GlyphId> = None;
    for ch in text.chars() {
        let id = font.glyph_id(ch);
        if let Some(prev) = last {
            cursor_x += scaled.kern(prev, id);
        }
        glyphs.push((id, cursor_x));
        cursor_x += scaled.h_advance(id);
        last = Some(id);
    }
    (glyphs, cursor_x)
}

/// RGBA coverage image for a block of text.
pub struct RasterizedText {
    pub buf: Vec<u8>,
    pub buf_w: u32,
    pub buf_h: u32,
    pub off_x: i32,
    pub off_y: i32,
}

impl RasterizedText {
    fn empty() -> Self {
        RasterizedText { buf: Vec::new(), buf_w: 0, buf_h: 0, off_x: 0, off_y: 0 }
    }
}

/// Rasterise `text` with the first line's baseline at `(origin_x, origin_y)`.
///
/// Lines split on `'\n'` advance by the font's line height. Bold is a one
/// pixel horizontal smear, italic a 0.2 shear about each baseline. The result
/// is clipped to `canvas_w`×`canvas_h`.
pub fn rasterize_text(
    font: &FontArc,
    text: &str,
    style: &TextStyle,
    origin_x: f32,
    origin_y: f32,
    canvas_w: u32,
    canvas_h: u32,
) -> RasterizedText {
    let px_size = style.px_size.max(1.0);
    let scaled = font.as_scaled(px_size);
    let line_height = scaled.height() + scaled.line_gap();

    let mut lines = Vec::new();
    for (i, line) in text.split('\n').enumerate() {
        let (glyphs, width) = layout_line(font, line, px_size);
        lines.push((glyphs, width, origin_y + i as f32 * line_height));
    }

    // Bounds in canvas space.
    let (mut min_x, mut min_y) = (f32::MAX, f32::MAX);
    let (mut max_x, mut max_y) = (f32::MIN, f32::MIN);
    for (glyphs, width, baseline) in &lines {
        for &(id, gx) in glyphs {
            let g = id.with_scale_and_position(px_size, point(origin_x + gx, *baseline));
            let b = font.glyph_bounds(&g);
            min_x = min_x.min(b.min.x);
            min_y = min_y.min(b.min.y);
            max_x = max_x.max(b.max.x);
            max_y = max_y.max(b.max.y);
        }
        if style.underline && *width > 0.1 {
            min_x = min_x.min(origin_x);
            max_x = max_x.max(origin_x + width);
            max_y = max_y.max(baseline + px_size * 0.2);
        }
    }
    if min_x >= max_x || min_y >= max_y {
        return RasterizedText::empty();
    }

    // Room for italic shear and bold smear.
    let pad = 2.0 + if style.italic { (max_y - min_y) * 0.2 } else { 0.0 };
    let x0 = ((min_x - pad).floor() as i32).max(0);
    let y0 = ((min_y - 2.0).floor() as i32).max(0);
    let x1 = ((max_x + pad).ceil() as i32).min(canvas_w as i32);
    let y1 = ((max_y + 2.0).ceil() as i32).min(canvas_h as i32);
    if x0 >= x1 || y0 >= y1 {
        return RasterizedText::empty();
    }
    let buf_w = (x1 - x0) as u32;
    let buf_h = (y1 - y0) as u32;
    let mut coverage = vec![0.0f32; buf_w as usize * buf_h as usize];

    for (glyphs, width, baseline) in &lines {
        for &(id, gx) in glyphs {
            let g = id.with_scale_and_position(px_size, point(origin_x + gx, *baseline));
            let Some(outlined) = font.outline_glyph(g) else {
                continue;
            };
            let b = outlined.px_bounds();
            outlined.draw(|px, py, cov| {
                let mut cx = px as f32 + b.min.x;
                let cy = py as f32 + b.min.y;
                if style.italic {
                    cx += (baseline - cy) * 0.2;
                }
                let ix = cx.round() as i32 - x0;
                let iy = cy.round() as i32 - y0;
                if ix >= 0 && iy >= 0 && (ix as u32) < buf_w && (iy as u32) < buf_h {
                    let idx = iy as usize * buf_w as usize + ix as usize;
                    coverage[idx] = coverage[idx].max(cov);
                    if style.bold && ix + 1 < buf_w as i32 {
                        coverage[idx + 1] = coverage[idx + 1].max(cov);
                    }
                }
            });
        }

        if style.underline && *width > 0.1 {
            let thickness = (px_size * 0.06).max(1.0);
            let line_y = baseline + px_size * 0.1;
            let ly0 = ((line_y - thickness * 0.5).floor() as i32 - y0).max(0);
            let ly1 = ((line_y + thickness * 0.5).ceil() as i32 - y0).min(buf_h as i32);
            let lx0 = (origin_x.floor() as i32 - x0).max(0);
            let lx1 = ((origin_x + width).ceil() as i32 - x0).min(buf_w as i32);
            for ly in ly0..ly1 {
                for lx in lx0..lx1 {
                    coverage[ly as usize * buf_w as usize + lx as usize] = 1.0;
                }
            }
        }
    }

    let mut buf = vec![0u8; coverage.len() * 4];
    for (i, &cov) in coverage.iter().enumerate() {
        if cov > 0.001 {
            let o = i * 4;
            buf[o] = style.color[0];
            buf[o + 1] = style.color[1];
            buf[o + 2] = style.color[2];
            buf[o + 3] = (style.color[3] as f32 * cov.min(1.0)).round() as u8;
        }
    }

    RasterizedText { buf, buf_w, buf_h, off_x: x0, off_y: y0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Any TrueType font installed on the test machine.
    /// First loadable TrueType font installed on the machine.
    fn system_font() -> FontArc {
        for pattern in ["/usr/share/fonts/**/*.ttf", "/Library/Fonts/*.ttf", "C:/Windows/Fonts/*.ttf"] {
            let Ok(paths) = glob::glob(pattern) else { continue };
            for path in paths.flatten() {
                if let Ok(bytes) = fs::read(&path) {
                    if let Ok(font) = FontArc::try_from_vec(bytes) {
                        return font;
                    }
                }
            }
        }
        panic!("no system TrueType font found");
    }

    fn style() -> TextStyle {
        TextStyle { px_size: 32.0, color: [0, 0, 0, 255], bold: false, italic: false, underline: false }
    }

    #[test]
    fn invalid_font_bytes_are_rejected() {
        let mut book = FontBook::new();
        let err = book.insert_bytes("broken", vec![1, 2, 3]).unwrap_err();
        assert!(matches!(err, EditorError::Decode(_)));
        assert!(book.is_empty());
        assert!(book.get("anything").is_none());
    }

    #[test]
    fn empty_directory_gives_empty_book() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("notes.txt"), "not a font").unwrap();
        fs::write(dir.path().join("bad.ttf"), [0u8; 16]).unwrap();
        let book = FontBook::load_dir(dir.path()).unwrap();
        assert!(book.is_empty());
    }

    #[test]
    #[ignore = "needs a system TrueType font"]
    fn unknown_family_falls_back() {
        let font = system_font();
        let mut book = FontBook::new();
        book.insert("Sans", font);
        assert!(book.get("sans").is_some());
        assert!(book.get("Nonexistent").is_some());
        assert_eq!(book.families().collect::<Vec<_>>(), vec!["sans"]);
    }

    #[test]
    #[ignore = "needs a system TrueType font"]
    fn glyphs_sit_above_the_baseline() {
        let font = system_font();
        let r = rasterize_text(&font, "H", &style(), 20.0, 60.0, 200, 200);
        assert!(r.buf_w > 0 && r.buf_h > 0);
        let mut lowest_inked = 0;
        for y in 0..r.buf_h as usize {
            for x in 0..r.buf_w as usize {
                if r.buf[(y * r.buf_w as usize + x) * 4 + 3] > 128 {
                    lowest_inked = lowest_inked.max(y as i32 + r.off_y);
                }
            }
        }
        assert!(lowest_inked <= 61, "ink below baseline at {lowest_inked}");
        assert!(lowest_inked >= 55);
    }

    #[test]
    #[ignore = "needs a system TrueType font"]
    fn underline_extends_below_baseline() {
        let font = system_font();
        let mut s = style();
        s.underline = true;
        let r = rasterize_text(&font, "H", &s, 20.0, 60.0, 200, 200);
        assert!(r.off_y + r.buf_h as i32 > 63);
    }

    #[test]
    #[ignore = "needs a system TrueType font"]
    fn clipped_text_is_empty() {
        let font = system_font();
        let r = rasterize_text(&font, "Hi", &style(), 500.0, 500.0, 100, 100);
        assert_eq!(r.buf_w, 0);
        assert!(r.buf.is_empty());
    }
}
