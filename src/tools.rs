// ============================================================================
// TOOLS: editor mode machine translating pointer/key input into scene calls
// ============================================================================

use image::Rgba;

use crate::compositor::{Compositor, Overlay};
use crate::error::{EditorError, Result};
use crate::geometry::{PointF, Rect};
use crate::ops::shapes::ShapeKind;
use crate::scene::{Element, FontSpec, Pen, Scene};
use crate::{log_err, log_info};

/// Freehand brush presets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BrushTool {
    Pen,
    Marker,
    Highlighter,
    Pencil,
    Eraser,
}

impl BrushTool {
    pub fn all() -> &'static [BrushTool] {
        &[
            BrushTool::Pen,
            BrushTool::Marker,
            BrushTool::Highlighter,
            BrushTool::Pencil,
            BrushTool::Eraser,
        ]
    }

    /// Pen for this brush given the chosen colour, size and canvas background.
    pub fn pen(&self, color: Rgba<u8>, size: u32, background: Rgba<u8>) -> Pen {
        let size = size.max(1);
        match self {
            BrushTool::Pen => Pen::new(color, size),
            BrushTool::Marker => Pen::new(color, size * 2),
            BrushTool::Highlighter => Pen::new(Rgba([color[0], color[1], color[2], 128]), size * 2),
            BrushTool::Pencil => Pen::new(Rgba([128, 128, 128, 255]), (size / 2).max(1)),
            BrushTool::Eraser => Pen::new(background, size),
        }
    }
}

/// What pointer and key input currently means, with that mode's transient
/// state. Exactly one mode is active at a time.
#[derive(Clone, Debug, PartialEq)]
pub enum EditorMode {
    /// Primary press selects the object under the pointer.
    Idle,
    /// Freehand drawing; `stroke` holds the points of the stroke in progress.
    Draw { tool: BrushTool, stroke: Vec<PointF> },
    /// Shape dragging; `start` is set while the pointer is down.
    Shape { kind: ShapeKind, start: Option<PointF>, end: PointF },
    /// Text entry; `anchor` is the baseline start once placed.
    Text { anchor: Option<PointF>, buffer: String },
    /// Crop rectangle dragging over the selected object.
    Crop { start: Option<PointF>, rect: Option<Rect> },
    /// Move the object under the pointer; `last` is set while dragging.
    Drag { last: Option<PointF> },
    /// Rotate the selection to face the pointer while `grabbed`.
    Rotate { grabbed: bool },
    /// The next press flood-fills the canvas with `color`.
    Recolor { color: Rgba<u8> },
}

impl EditorMode {
    pub fn draw(tool: BrushTool) -> Self {
        EditorMode::Draw { tool, stroke: Vec::new() }
    }

    pub fn shape(kind: ShapeKind) -> Self {
        EditorMode::Shape { kind, start: None, end: PointF::default() }
    }

    pub fn text() -> Self {
        EditorMode::Text { anchor: None, buffer: String::new() }
    }

    pub fn crop() -> Self {
        EditorMode::Crop { start: None, rect: None }
    }

    pub fn drag() -> Self {
        EditorMode::Drag { last: None }
    }

    pub fn rotate() -> Self {
        EditorMode::Rotate { grabbed: false }
    }
}

/// Scene plus compositor plus the active mode.
pub struct Editor {
    pub scene: Scene,
    pub compositor: Compositor,
    mode: EditorMode,
    pub color: Rgba<u8>,
    pub brush_size: u32,
    pub font: FontSpec,
    /// Bumped on every successful mutation.
    revision: u64,
}

impl Editor {
    pub fn new(scene: Scene, compositor: Compositor) -> Self {
        let mut editor = Self {
            scene,
            compositor,
            mode: EditorMode::Idle,
            color: Rgba([0, 0, 0, 255]),
            brush_size: 3,
            font: FontSpec::new("sans", 12.0),
            revision: 0,
        };
        editor.refresh();
        editor
    }

    pub fn mode(&self) -> &EditorMode {
        &self.mode
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Switch modes, dropping any unfinished transient state.
    pub fn set_mode(&mut self, mode: EditorMode) {
        self.mode = mode;
        self.refresh();
    }

    /// Replace the whole scene (document load) and re-render.
    pub fn replace_scene(&mut self, scene: Scene) {
        self.scene = scene;
        self.mode = EditorMode::Idle;
        self.revision += 1;
        self.refresh();
    }

    /// Transient drawing derived from the current mode.
    pub fn overlay(&self) -> Overlay {
        match &self.mode {
            EditorMode::Draw { tool, stroke } if !stroke.is_empty() => Overlay {
                crop: None,
                pending: Some(Element::Stroke {
                    pen: tool.pen(self.color, self.brush_size, self.scene.canvas.background),
                    path: stroke.clone(),
                }),
            },
            EditorMode::Shape { kind, start: Some(start), end } => Overlay {
                crop: None,
                pending: Some(Element::Shape {
                    pen: Pen::new(self.color, self.brush_size.max(1)),
                    path: kind.path(*start, *end),
                }),
            },
            EditorMode::Crop { rect: Some(r), .. } => Overlay { crop: Some(*r), pending: None },
            _ => Overlay::default(),
        }
    }

    /// Full re-render of the canvas buffer.
    pub fn refresh(&mut self) {
        let overlay = self.overlay();
        self.compositor.redraw(&mut self.scene, &overlay);
    }

    /// Run a scene operation and re-render on success.
    ///
    /// Silent error kinds (no selection, empty crop, unknown colour mode)
    /// become `Ok(None)`; anything else is logged and returned.
    pub fn run<T>(&mut self, op: impl FnOnce(&mut Scene) -> Result<T>) -> Result<Option<T>> {
        match op(&mut self.scene) {
            Ok(v) => {
                self.revision += 1;
                self.refresh();
                Ok(Some(v))
            }
            Err(e) if e.is_silent() => {
                log_info!("Ignored: {}", e);
                Ok(None)
            }
            Err(e) => {
                log_err!("{}", e);
                Err(e)
            }
        }
    }

    // ---- pointer input ------------------------------------------------------

    pub fn press(&mut self, p: PointF) {
        match &mut self.mode {
            EditorMode::Idle => {
                self.scene.select_at(p);
            }
            EditorMode::Draw { stroke, .. } => {
                stroke.clear();
                stroke.push(p);
            }
            EditorMode::Shape { start, end, .. } => {
                *start = Some(p);
                *end = p;
            }
            EditorMode::Text { anchor, buffer } => {
                let pending = anchor.take().filter(|_| !buffer.is_empty()).map(|a| (a, std::mem::take(buffer)));
                *anchor = Some(p);
                if let Some((a, text)) = pending {
                    self.commit_text(a, text);
                }
            }
            EditorMode::Crop { start, rect } => {
                if self.scene.selection().is_none() {
                    log_info!("Crop needs a selected object");
                    return;
                }
                *start = Some(p);
                *rect = Some(Rect::from_corners(p, p));
            }
            EditorMode::Drag { last } => {
                *last = self.scene.select_at(p).map(|_| p);
            }
            EditorMode::Rotate { grabbed } => {
                *grabbed = self.scene.selection().is_some();
                if *grabbed {
                    let _ = self.run(|s| s.rotate_towards(p));
                    return;
                }
            }
            EditorMode::Recolor { color } => {
                let color = *color;
                let n = self.scene.flood_fill(p, color);
                log_info!("Recoloured {} pixels at ({:.0}, {:.0})", n, p.x, p.y);
                // The fill lives in the canvas buffer only; skip the redraw.
                self.mode = EditorMode::Idle;
                return;
            }
        }
        self.refresh();
    }

    pub fn motion(&mut self, p: PointF) {
        match &mut self.mode {
            EditorMode::Draw { stroke, .. } if !stroke.is_empty() => {
                if stroke.last() != Some(&p) {
                    stroke.push(p);
                }
            }
            EditorMode::Shape { start: Some(_), end, .. } => *end = p,
            EditorMode::Crop { start: Some(s), rect } => *rect = Some(Rect::from_corners(*s, p)),
            EditorMode::Drag { last: Some(prev) } => {
                let dx = (p.x - prev.x).round() as i32;
                let dy = (p.y - prev.y).round() as i32;
                if dx == 0 && dy == 0 {
                    return;
                }
                // Advance by the applied whole-pixel delta so rounding never drifts.
                *prev = PointF::new(prev.x + dx as f64, prev.y + dy as f64);
                let _ = self.run(|s| s.move_selected(dx, dy));
                return;
            }
            EditorMode::Rotate { grabbed: true } => {
                let _ = self.run(|s| s.rotate_towards(p));
                return;
            }
            _ => return,
        }
        self.refresh();
    }

    pub fn release(&mut self, p: PointF) {
        match &mut self.mode {
            EditorMode::Draw { tool, stroke } if !stroke.is_empty() => {
                if stroke.last() != Some(&p) {
                    stroke.push(p);
                }
                let path = std::mem::take(stroke);
                let pen = tool.pen(self.color, self.brush_size, self.scene.canvas.background);
                self.commit_element(Element::Stroke { pen, path });
            }
            EditorMode::Shape { kind, start, .. } => {
                if let Some(s) = start.take() {
                    let pen = Pen::new(self.color, self.brush_size.max(1));
                    let path = kind.path(s, p);
                    self.commit_element(Element::Shape { pen, path });
                }
            }
            EditorMode::Crop { start: Some(s), .. } => {
                let rect = Rect::from_corners(*s, p);
                self.mode = EditorMode::Idle;
                if !rect.is_empty() {
                    let _ = self.run(|scene| scene.crop_selected(rect));
                }
                self.refresh();
            }
            EditorMode::Drag { last } => *last = None,
            EditorMode::Rotate { grabbed } => *grabbed = false,
            _ => {}
        }
    }

    /// Secondary click: toggle selection of the object under the pointer.
    pub fn secondary_press(&mut self, p: PointF) {
        self.scene.toggle_select_at(p);
        self.refresh();
    }

    // ---- keyboard input -----------------------------------------------------

    pub fn key_char(&mut self, c: char) {
        if let EditorMode::Text { anchor: Some(_), buffer } = &mut self.mode {
            buffer.push(c);
        }
    }

    pub fn key_backspace(&mut self) {
        if let EditorMode::Text { anchor: Some(_), buffer } = &mut self.mode {
            buffer.pop();
        }
    }

    /// Finish the text being typed.
    pub fn key_enter(&mut self) {
        if let EditorMode::Text { anchor, buffer } = &mut self.mode {
            if let (Some(a), false) = (anchor.take(), buffer.is_empty()) {
                let text = std::mem::take(buffer);
                self.commit_text(a, text);
            }
        }
    }

    /// Drop unfinished input and go back to idle.
    pub fn key_escape(&mut self) {
        self.set_mode(EditorMode::Idle);
    }

    pub fn key_delete(&mut self) -> Result<Option<()>> {
        self.run(|s| s.delete_selected().map(|_| ()))
    }

    fn commit_text(&mut self, anchor: PointF, text: String) {
        let el = Element::Text {
            font: self.font.clone(),
            color: self.color,
            position: anchor,
            text,
        };
        self.commit_element(el);
    }

    fn commit_element(&mut self, el: Element) {
        let _ = self.run(|s| {
            s.add_element(el);
            Ok::<(), EditorError>(())
        });
    }
}
