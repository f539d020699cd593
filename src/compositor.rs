// ============================================================================
// COMPOSITOR: full rebuild of the canvas buffer from scene state
// ============================================================================
//
// Draw order is fixed: background, elements (list order), the in-progress
// element, objects (list order), selection outline, pending crop outline.
// Nothing is cached between frames.
// ============================================================================

use image::Rgba;

use crate::canvas::{Channels, PixelBuffer};
use crate::geometry::Rect;
use crate::ops::shapes::stroke_polyline;
use crate::ops::text::{rasterize_text, FontBook, TextStyle};
use crate::ops::transform::rotate_about_center;
use crate::scene::{Element, Object, Scene};

/// Point → pixel conversion for text at 96 DPI.
pub const PX_PER_PT: f32 = 4.0 / 3.0;

/// Overlay colours and widths.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OverlayStyle {
    pub highlight: Rgba<u8>,
    pub selection_width: i32,
    pub crop_outline: Rgba<u8>,
    pub crop_width: i32,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            highlight: Rgba([255, 0, 0, 255]),
            selection_width: 2,
            crop_outline: Rgba([255, 0, 0, 255]),
            crop_width: 1,
        }
    }
}

/// Transient, non-persisted things drawn on top of the scene.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Overlay {
    /// Crop rectangle being dragged, canvas coordinates.
    pub crop: Option<Rect>,
    /// Stroke or shape still being drawn.
    pub pending: Option<Element>,
}

#[derive(Clone, Default)]
pub struct Compositor {
    pub fonts: FontBook,
    pub style: OverlayStyle,
}

impl Compositor {
    pub fn new(fonts: FontBook, style: OverlayStyle) -> Self {
        Self { fonts, style }
    }

    /// Render `scene` into a fresh RGBA buffer of the canvas size.
    pub fn render(&self, scene: &Scene, overlay: &Overlay) -> PixelBuffer {
        let mut buf = scene.canvas.blank();

        for el in scene.elements() {
            self.draw_element(&mut buf, el);
        }
        if let Some(el) = &overlay.pending {
            self.draw_element(&mut buf, el);
        }

        for obj in scene.objects() {
            draw_object(&mut buf, obj);
        }

        if let Some(sel) = scene.selected() {
            let r = sel.rect();
            buf.stroke_rect(r.x, r.y, r.w, r.h, self.style.selection_width, self.style.highlight);
        }
        if let Some(r) = overlay.crop {
            buf.stroke_rect(r.x, r.y, r.w, r.h, self.style.crop_width, self.style.crop_outline);
        }
        buf
    }

    /// Replace the scene's canvas buffer with a fresh render.
    pub fn redraw(&self, scene: &mut Scene, overlay: &Overlay) {
        let buf = self.render(scene, overlay);
        scene.canvas.buffer = buf;
    }

    fn draw_element(&self, buf: &mut PixelBuffer, el: &Element) {
        match el {
            Element::Stroke { pen, path } | Element::Shape { pen, path } => {
                stroke_polyline(buf, path, pen.width.max(1) as f64, pen.color);
            }
            Element::Text { font, color, position, text } => {
                let Some(face) = self.fonts.get(&font.family) else {
                    return;
                };
                let style = TextStyle {
                    px_size: font.size * PX_PER_PT,
                    color: color.0,
                    bold: font.bold,
                    italic: font.italic,
                    underline: font.underline,
                };
                let r = rasterize_text(
                    face,
                    text,
                    &style,
                    position.x as f32,
                    position.y as f32,
                    buf.width(),
                    buf.height(),
                );
                if let Some(layer) = PixelBuffer::from_raw(r.buf_w, r.buf_h, Channels::Rgba, r.buf) {
                    buf.composite_over(&layer, r.off_x, r.off_y);
                }
            }
        }
    }
}

/// Composite one object, rotated about its rect centre when needed.
fn draw_object(buf: &mut PixelBuffer, obj: &Object) {
    if obj.rotation.rem_euclid(360.0) == 0.0 {
        buf.composite_over(&obj.pixmap, obj.x, obj.y);
        return;
    }
    let rotated = rotate_about_center(&obj.pixmap, obj.rotation);
    let c = obj.rect().center();
    let dx = (c.x - rotated.width() as f64 / 2.0).round() as i32;
    let dy = (c.y - rotated.height() as f64 / 2.0).round() as i32;
    buf.composite_over(&rotated, dx, dy);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::rgb;
    use crate::geometry::PointF;
    use crate::scene::Pen;

    const BG: Rgba<u8> = Rgba([240, 240, 240, 255]);

    fn halves(w: u32, h: u32) -> PixelBuffer {
        let mut buf = PixelBuffer::filled(w, h, Channels::Rgb, rgb(0, 0, 255));
        for y in 0..h {
            for x in 0..w / 2 {
                buf.put_pixel(x, y, rgb(255, 0, 0));
            }
        }
        buf
    }

    #[test]
    fn empty_scene_is_background() {
        let s = Scene::new(40, 30, BG);
        let out = Compositor::default().render(&s, &Overlay::default());
        assert_eq!(out.dimensions(), (40, 30));
        assert!(out.as_raw().chunks_exact(4).all(|p| p == BG.0));
    }

    #[test]
    fn render_is_deterministic() {
        let mut s = Scene::new(100, 100, BG);
        s.add_object(halves(20, 20));
        let c = Compositor::default();
        let a = c.render(&s, &Overlay::default());
        c.redraw(&mut s, &Overlay::default());
        assert_eq!(a, s.canvas.buffer);
        assert_eq!(c.render(&s, &Overlay::default()), a);
    }

    #[test]
    fn objects_draw_above_elements() {
        let mut s = Scene::new(300, 300, BG);
        s.add_element(Element::Stroke {
            pen: Pen::new(rgb(0, 255, 0), 10),
            path: vec![PointF::new(0.0, 100.0), PointF::new(300.0, 100.0)],
        });
        s.add_object(PixelBuffer::filled(50, 100, Channels::Rgb, rgb(0, 0, 0)));
        let out = Compositor::default().render(&s, &Overlay::default());
        assert_eq!(out.get_pixel(75, 100), rgb(0, 0, 0));
        assert_eq!(out.get_pixel(200, 100), rgb(0, 255, 0));
        assert_eq!(out.get_pixel(200, 150), BG);
    }

    #[test]
    fn rotated_object_keeps_rect_and_turns_pixels() {
        let mut s = Scene::new(800, 600, BG);
        let a = s.add_object(halves(200, 200));
        s.select(a).unwrap();
        s.set_rotation(90.0).unwrap();
        let c = Compositor::default();
        c.redraw(&mut s, &Overlay::default());
        assert_eq!(s.object(a).unwrap().rect(), Rect::new(50, 50, 200, 200));

        let out = &s.canvas.buffer;
        // left half (red) now on top, right half (blue) at the bottom
        assert_eq!(out.get_pixel(150, 80), rgb(255, 0, 0));
        assert_eq!(out.get_pixel(150, 220), rgb(0, 0, 255));
        assert_eq!(out.get_pixel(60, 80), rgb(255, 0, 0));
        assert_eq!(out.get_pixel(240, 220), rgb(0, 0, 255));
    }

    #[test]
    fn selection_outline_uses_highlight() {
        let mut s = Scene::new(200, 200, BG);
        let a = s.add_object(PixelBuffer::filled(50, 50, Channels::Rgb, rgb(0, 0, 0)));
        s.select(a).unwrap();
        let out = Compositor::default().render(&s, &Overlay::default());
        assert_eq!(out.get_pixel(49, 49), rgb(255, 0, 0));
        assert_eq!(out.get_pixel(50, 50), rgb(255, 0, 0));
        assert_eq!(out.get_pixel(75, 75), rgb(0, 0, 0));
        s.deselect();
        let out = Compositor::default().render(&s, &Overlay::default());
        assert_eq!(out.get_pixel(49, 49), BG);
    }

    #[test]
    fn crop_and_pending_overlays() {
        let s = Scene::new(100, 100, BG);
        let overlay = Overlay {
            crop: Some(Rect::new(10, 10, 30, 30)),
            pending: Some(Element::Shape {
                pen: Pen::new(rgb(0, 0, 255), 2),
                path: vec![PointF::new(60.0, 80.0), PointF::new(90.0, 80.0)],
            }),
        };
        let out = Compositor::default().render(&s, &overlay);
        assert_eq!(out.get_pixel(10, 20), rgb(255, 0, 0));
        assert_eq!(out.get_pixel(20, 20), BG);
        assert_eq!(out.get_pixel(75, 79), rgb(0, 0, 255));
        assert_eq!(out.get_pixel(75, 80), rgb(0, 0, 255));
    }

    #[test]
    fn text_without_fonts_is_skipped() {
        let mut s = Scene::new(50, 50, BG);
        s.add_element(Element::Text {
            font: crate::scene::FontSpec::new("sans", 12.0),
            color: rgb(0, 0, 0),
            position: PointF::new(5.0, 30.0),
            text: "hello".into(),
        });
        let out = Compositor::default().render(&s, &Overlay::default());
        assert!(out.as_raw().chunks_exact(4).all(|p| p == BG.0));
    }
}
