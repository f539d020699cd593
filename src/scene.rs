// ============================================================================
// SCENE MODEL: objects, elements, selection and every mutation on them
// ============================================================================

use image::Rgba;

use crate::canvas::{Canvas, Channels, PixelBuffer};
use crate::error::{EditorError, Result};
use crate::geometry::{angle_towards, PointF, Rect};
use crate::ops::color::{self, BitwiseOp, ColorMode, Histogram};
use crate::ops::fill;
use crate::ops::merge::{merge_buffers, MergeOrientation};
use crate::ops::transform;
use crate::{log_info, log_warn};

/// Default zoom multiplier per step.
pub const DEFAULT_ZOOM_STEP: f64 = 1.1;

/// Where new objects land, in unzoomed canvas coordinates.
pub const DEFAULT_OBJECT_POSITION: (i32, i32) = (50, 50);

/// Stable handle to an [`Object`]. Never reused within a scene.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u64);

// ---------------------------------------------------------------------------
//  Elements
// ---------------------------------------------------------------------------

/// Line colour and width.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pen {
    pub color: Rgba<u8>,
    pub width: u32,
}

impl Pen {
    pub fn new(color: Rgba<u8>, width: u32) -> Self {
        Self { color, width }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FontSpec {
    pub family: String,
    /// Point size. Fractional while zoomed; persisted rounded.
    pub size: f32,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
}

impl FontSpec {
    pub fn new(family: impl Into<String>, size: f32) -> Self {
        Self { family: family.into(), size, bold: false, italic: false, underline: false }
    }
}

/// Vector annotation drawn beneath all objects, in canvas coordinates.
#[derive(Clone, Debug, PartialEq)]
pub enum Element {
    Stroke { pen: Pen, path: Vec<PointF> },
    Shape { pen: Pen, path: Vec<PointF> },
    Text { font: FontSpec, color: Rgba<u8>, position: PointF, text: String },
}

impl Element {
    /// Scale every coordinate (and font size) by `ratio` about the origin.
    pub fn rescale(&mut self, ratio: f64) {
        match self {
            Element::Stroke { path, .. } | Element::Shape { path, .. } => {
                for p in path.iter_mut() {
                    *p = p.scaled(ratio);
                }
            }
            Element::Text { font, position, .. } => {
                *position = position.scaled(ratio);
                font.size = (font.size as f64 * ratio) as f32;
            }
        }
    }
}

// ---------------------------------------------------------------------------
//  Objects
// ---------------------------------------------------------------------------

/// A placed raster image.
///
/// `base` is the pixmap as first placed (or last flipped). `pixmap` is what
/// gets drawn: `base` resampled by the last zoom or scale slider change with
/// the colour mode applied, plus any destructive edits made since.
#[derive(Clone, Debug)]
pub struct Object {
    pub id: ObjectId,
    pub base: PixelBuffer,
    pub pixmap: PixelBuffer,
    pub x: i32,
    pub y: i32,
    /// Degrees, clockwise-positive, about the rect centre. Draw-time only.
    pub rotation: f64,
    pub color_mode: Option<ColorMode>,
    /// Scale slider value (100 = original size).
    pub scale_percent: f64,
    /// Resample factor from `base` behind the current pixmap.
    factor: f64,
    /// Position at zoom 1.0, used to reposition on zoom changes.
    home: PointF,
}

impl Object {
    fn new(id: ObjectId, base: PixelBuffer, x: i32, y: i32, canvas_scale: f64) -> Self {
        Object {
            id,
            pixmap: base.clone(),
            base,
            x,
            y,
            rotation: 0.0,
            color_mode: None,
            scale_percent: 100.0,
            factor: 1.0,
            home: PointF::new(x as f64 / canvas_scale, y as f64 / canvas_scale),
        }
    }

    /// Bounding rectangle; always `(x, y, pixmap.width, pixmap.height)`.
    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.pixmap.width() as i32, self.pixmap.height() as i32)
    }

    /// Recompute `pixmap` from `base` resampled by `factor`, then reapply the
    /// colour mode. Returns `false` and changes nothing when the result would
    /// exceed [`crate::canvas::MAX_CANVAS_DIM`].
    fn rebuild(&mut self, factor: f64) -> bool {
        let Some((w, h)) = transform::checked_scaled_dims(self.base.width(), self.base.height(), factor) else {
            return false;
        };
        let mut pm = self.base.resized(w, h);
        if let Some(mode) = self.color_mode {
            pm = color::convert(&pm, mode);
        }
        self.pixmap = pm;
        self.factor = factor;
        true
    }

    fn fits_zoom(&self, canvas_scale: f64) -> bool {
        transform::checked_scaled_dims(self.base.width(), self.base.height(), canvas_scale).is_some()
    }

    fn set_position(&mut self, x: i32, y: i32, canvas_scale: f64) {
        self.x = x;
        self.y = y;
        self.home = PointF::new(x as f64 / canvas_scale, y as f64 / canvas_scale);
    }

    fn apply_zoom(&mut self, canvas_scale: f64) {
        self.rebuild(canvas_scale);
        self.x = (self.home.x * canvas_scale).round() as i32;
        self.y = (self.home.y * canvas_scale).round() as i32;
    }

    pub fn info(&self) -> ObjectInfo {
        ObjectInfo {
            id: self.id,
            width: self.pixmap.width(),
            height: self.pixmap.height(),
            channels: self.pixmap.channels().count() as u8,
            x: self.x,
            y: self.y,
            rotation: self.rotation,
            color_mode: self.color_mode,
        }
    }
}

/// Read-only summary shown by an object properties panel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ObjectInfo {
    pub id: ObjectId,
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub x: i32,
    pub y: i32,
    pub rotation: f64,
    pub color_mode: Option<ColorMode>,
}

// ---------------------------------------------------------------------------
//  Scene
// ---------------------------------------------------------------------------

/// One document: canvas, elements and objects in draw order, and selection.
#[derive(Clone, Debug)]
pub struct Scene {
    pub canvas: Canvas,
    elements: Vec<Element>,
    objects: Vec<Object>,
    selection: Option<ObjectId>,
    next_id: u64,
    pub zoom_step: f64,
    /// Placement for new objects at zoom 1.0.
    pub default_position: (i32, i32),
}

impl Scene {
    pub fn new(width: u32, height: u32, background: Rgba<u8>) -> Self {
        Self {
            canvas: Canvas::new(width, height, background),
            elements: Vec::new(),
            objects: Vec::new(),
            selection: None,
            next_id: 1,
            zoom_step: DEFAULT_ZOOM_STEP,
            default_position: DEFAULT_OBJECT_POSITION,
        }
    }

    // ---- accessors ------------------------------------------------------------

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn objects(&self) -> &[Object] {
        &self.objects
    }

    pub fn object(&self, id: ObjectId) -> Option<&Object> {
        self.objects.iter().find(|o| o.id == id)
    }

    pub fn selection(&self) -> Option<ObjectId> {
        self.selection
    }

    pub fn selected(&self) -> Option<&Object> {
        self.selection.and_then(|id| self.object(id))
    }

    pub fn scale(&self) -> f64 {
        self.canvas.scale
    }

    fn selected_mut(&mut self) -> Result<&mut Object> {
        let id = self.selection.ok_or(EditorError::InvalidSelection)?;
        self.objects
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or(EditorError::InvalidSelection)
    }

    fn alloc_id(&mut self) -> ObjectId {
        let id = ObjectId(self.next_id);
        self.next_id += 1;
        id
    }

    // ---- insertion ------------------------------------------------------------

    /// Add `pixmap` on top of the z-order at the default position.
    pub fn add_object(&mut self, pixmap: PixelBuffer) -> ObjectId {
        let (dx, dy) = self.default_position;
        let scale = self.canvas.scale;
        let x = (dx as f64 * scale).round() as i32;
        let y = (dy as f64 * scale).round() as i32;
        self.add_object_at(pixmap, x, y)
    }

    /// Add `pixmap` on top of the z-order with its top-left at `(x, y)`.
    pub fn add_object_at(&mut self, pixmap: PixelBuffer, x: i32, y: i32) -> ObjectId {
        let id = self.alloc_id();
        let obj = Object::new(id, pixmap, x, y, self.canvas.scale);
        log_info!("Added object {} ({}x{}) at ({}, {})", id.0, obj.pixmap.width(), obj.pixmap.height(), x, y);
        self.objects.push(obj);
        id
    }

    /// Fit an imported image inside the canvas (aspect preserved) and add it.
    /// RGBA images keep their alpha; anything else is stored as RGB.
    pub fn place_image(&mut self, image: PixelBuffer) -> ObjectId {
        let fitted = transform::fit_within(&image, self.canvas.original_width, self.canvas.original_height);
        self.add_object(fitted)
    }

    pub fn add_element(&mut self, element: Element) {
        self.elements.push(element);
    }

    pub(crate) fn push_loaded(&mut self, elements: Vec<Element>, objects: Vec<(PixelBuffer, i32, i32)>) {
        self.elements = elements;
        for (pixmap, x, y) in objects {
            self.add_object_at(pixmap, x, y);
        }
    }

    // ---- selection ------------------------------------------------------------

    /// Select the top-most object containing `point`. Clears the selection
    /// when nothing is hit.
    pub fn select_at(&mut self, point: PointF) -> Option<ObjectId> {
        self.selection = self.hit_test(point);
        self.selection
    }

    pub fn hit_test(&self, point: PointF) -> Option<ObjectId> {
        self.objects
            .iter()
            .rev()
            .find(|o| o.rect().contains(point))
            .map(|o| o.id)
    }

    pub fn select(&mut self, id: ObjectId) -> Result<()> {
        if self.object(id).is_none() {
            return Err(EditorError::InvalidSelection);
        }
        self.selection = Some(id);
        Ok(())
    }

    pub fn deselect(&mut self) {
        self.selection = None;
    }

    /// Secondary click: deselect when the click lands on the current
    /// selection or on empty canvas, otherwise select what was hit.
    pub fn toggle_select_at(&mut self, point: PointF) -> Option<ObjectId> {
        match self.hit_test(point) {
            Some(id) if self.selection != Some(id) => self.selection = Some(id),
            _ => self.selection = None,
        }
        self.selection
    }

    pub fn delete_selected(&mut self) -> Result<ObjectId> {
        let id = self.selection.ok_or(EditorError::InvalidSelection)?;
        let idx = self
            .objects
            .iter()
            .position(|o| o.id == id)
            .ok_or(EditorError::InvalidSelection)?;
        self.objects.remove(idx);
        self.selection = None;
        log_info!("Deleted object {}", id.0);
        Ok(id)
    }

    // ---- geometry -------------------------------------------------------------

    pub fn move_selected(&mut self, dx: i32, dy: i32) -> Result<()> {
        let scale = self.canvas.scale;
        let obj = self.selected_mut()?;
        let (x, y) = (obj.x + dx, obj.y + dy);
        obj.set_position(x, y, scale);
        Ok(())
    }

    pub fn set_position(&mut self, x: i32, y: i32) -> Result<()> {
        let scale = self.canvas.scale;
        self.selected_mut()?.set_position(x, y, scale);
        Ok(())
    }

    pub fn set_rotation(&mut self, degrees: f64) -> Result<()> {
        self.selected_mut()?.rotation = degrees;
        Ok(())
    }

    /// Point the selected object at `target`: angle from its rect centre.
    pub fn rotate_towards(&mut self, target: PointF) -> Result<f64> {
        let obj = self.selected_mut()?;
        let angle = angle_towards(obj.rect().center(), target);
        obj.rotation = angle;
        Ok(angle)
    }

    /// Rescale the selected object to `percent` of its base, independent of
    /// the canvas zoom. Non-positive values and sizes past
    /// [`crate::canvas::MAX_CANVAS_DIM`] are ignored.
    pub fn set_scale_percent(&mut self, percent: f64) -> Result<()> {
        let obj = self.selected_mut()?;
        if !(percent.is_finite() && percent > 0.0) {
            return Ok(());
        }
        if obj.rebuild(percent / 100.0) {
            obj.scale_percent = percent;
        } else {
            log_warn!("Ignoring scale {}% for object {}: over the size limit", percent, obj.id.0);
        }
        Ok(())
    }

    /// Mirror the selected object. Flips are permanent: the base is replaced too.
    pub fn flip_selected(&mut self, horizontal: bool) -> Result<()> {
        let obj = self.selected_mut()?;
        let flip: fn(&PixelBuffer) -> PixelBuffer =
            if horizontal { transform::flip_horizontal } else { transform::flip_vertical };
        obj.base = flip(&obj.base);
        obj.pixmap = flip(&obj.pixmap);
        Ok(())
    }

    /// Crop the selected object to `rect` (canvas coordinates).
    ///
    /// Only the displayed pixmap is cut; the base keeps the full image, so a
    /// later rescale or zoom brings the cropped-away area back.
    pub fn crop_selected(&mut self, rect: Rect) -> Result<()> {
        let scale = self.canvas.scale;
        let obj = self.selected_mut()?;
        let local = rect.translated(-obj.x, -obj.y);
        let bounds = Rect::new(0, 0, obj.pixmap.width() as i32, obj.pixmap.height() as i32);
        let r = bounds.intersect(&local).ok_or(EditorError::EmptyCropRegion)?;
        let cropped = transform::crop(&obj.pixmap, r).ok_or(EditorError::EmptyCropRegion)?;
        let (x, y) = (obj.x + r.x, obj.y + r.y);
        obj.pixmap = cropped;
        obj.set_position(x, y, scale);
        Ok(())
    }

    // ---- colour ---------------------------------------------------------------

    /// Convert the selected object from its base into `mode`.
    pub fn set_color_mode(&mut self, mode: ColorMode) -> Result<()> {
        let obj = self.selected_mut()?;
        obj.color_mode = Some(mode);
        let factor = obj.factor;
        obj.rebuild(factor);
        Ok(())
    }

    /// Parse and apply a colour-mode tag. Unknown tags change nothing.
    pub fn set_color_mode_tag(&mut self, tag: &str) -> Result<()> {
        let mode: ColorMode = tag.parse()?;
        self.set_color_mode(mode)
    }

    pub fn apply_gamma(&mut self, gamma: f64) -> Result<()> {
        let obj = self.selected_mut()?;
        obj.pixmap = color::gamma_correct(&obj.pixmap, gamma);
        Ok(())
    }

    pub fn apply_bitwise(&mut self, op: BitwiseOp) -> Result<()> {
        let obj = self.selected_mut()?;
        obj.pixmap = color::bitwise_with_gray(&obj.pixmap, op);
        Ok(())
    }

    pub fn apply_negative(&mut self) -> Result<()> {
        let obj = self.selected_mut()?;
        obj.pixmap = color::negative(&obj.pixmap);
        Ok(())
    }

    pub fn fill_selected(&mut self, color: Rgba<u8>) -> Result<()> {
        let obj = self.selected_mut()?;
        obj.pixmap = color::fill_solid(&obj.pixmap, color);
        Ok(())
    }

    pub fn selected_histogram(&self) -> Result<Histogram> {
        let obj = self.selected().ok_or(EditorError::InvalidSelection)?;
        Ok(color::histogram(&obj.pixmap))
    }

    pub fn selected_info(&self) -> Result<ObjectInfo> {
        self.selected().map(Object::info).ok_or(EditorError::InvalidSelection)
    }

    // ---- merge ----------------------------------------------------------------

    /// Concatenate the current pixmaps of `ids` into a new object at the
    /// default position. The sources are left in place.
    pub fn merge(&mut self, ids: &[ObjectId], orientation: MergeOrientation) -> Result<ObjectId> {
        let mut sources = Vec::with_capacity(ids.len());
        for id in ids {
            let obj = self
                .object(*id)
                .ok_or_else(|| EditorError::MergeInput(format!("no object with id {}", id.0)))?;
            sources.push(&obj.pixmap);
        }
        let merged = merge_buffers(&sources, orientation)?;
        let (dx, dy) = self.default_position;
        let id = self.alloc_id();
        let scale = self.canvas.scale;
        let x = (dx as f64 * scale).round() as i32;
        let y = (dy as f64 * scale).round() as i32;
        let obj = Object::new(id, merged, x, y, scale);
        log_info!("Merged {} objects into {} ({}x{})", ids.len(), id.0, obj.pixmap.width(), obj.pixmap.height());
        self.objects.push(obj);
        Ok(id)
    }

    // ---- zoom -----------------------------------------------------------------

    pub fn zoom_in(&mut self) {
        let step = self.zoom_step;
        self.zoom_by(step);
    }

    pub fn zoom_out(&mut self) {
        let step = self.zoom_step;
        self.zoom_by(1.0 / step);
    }

    /// Multiply the cumulative zoom by `factor` and rescale everything.
    pub fn zoom_by(&mut self, factor: f64) {
        if !(factor.is_finite() && factor > 0.0) {
            log_warn!("Ignoring zoom factor {}", factor);
            return;
        }
        let old = self.canvas.scale;
        self.set_zoom(old * factor);
    }

    /// Back to zoom 1.0 with the original canvas size.
    pub fn reset_zoom(&mut self) {
        self.set_zoom(1.0);
    }

    /// Every object is resampled from its base at `scale`. A zoom that would
    /// push the canvas or any object past [`crate::canvas::MAX_CANVAS_DIM`] is ignored.
    fn set_zoom(&mut self, scale: f64) {
        if self.canvas.size_at(scale).is_none() || !self.objects.iter().all(|o| o.fits_zoom(scale)) {
            log_warn!("Ignoring zoom to {:.3}: over the size limit", scale);
            return;
        }
        let ratio = scale / self.canvas.scale;
        self.canvas.scale = scale;
        self.canvas.apply_scale();
        for obj in &mut self.objects {
            obj.apply_zoom(scale);
        }
        for el in &mut self.elements {
            el.rescale(ratio);
        }
    }

    // ---- canvas pixel edits ---------------------------------------------------
    //
    // These touch the composited buffer only; the next redraw discards them.

    pub fn flood_fill(&mut self, seed: PointF, color: Rgba<u8>) -> usize {
        fill::flood_fill(&mut self.canvas.buffer, seed.x.floor() as i32, seed.y.floor() as i32, color)
    }

    pub fn set_canvas_pixel(&mut self, x: i32, y: i32, color: Rgba<u8>) -> bool {
        fill::set_pixel(&mut self.canvas.buffer, x, y, color)
    }

    pub fn fill_canvas_region(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, color: Rgba<u8>) -> usize {
        fill::fill_region(&mut self.canvas.buffer, x0, y0, x1, y1, color)
    }

    /// RGBA copy of the current canvas buffer.
    pub fn snapshot(&self) -> PixelBuffer {
        self.canvas.buffer.to_channels(Channels::Rgba)
    }
}
