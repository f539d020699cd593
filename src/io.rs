use bincode::Options;
use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder, ImageFormat};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::canvas::{Channels, PixelBuffer, MAX_CANVAS_DIM};
use crate::error::{EditorError, Result};
use crate::geometry::PointF;
use crate::scene::{Element, FontSpec, Pen, Scene};
use crate::{log_err, log_info, log_warn};
use image::Rgba;

// ============================================================================
// .canvas DOCUMENT FORMAT
// ============================================================================
//
// bincode container (fixed-width integers, little endian). Objects are stored
// flattened: their current pixmap as PNG plus position. Rotation, colour mode,
// scale slider and the unscaled base image are not part of the format.
// ============================================================================

/// Magic header for the document format.
pub const DOC_MAGIC: &str = "CNV1";

/// Maximum number of objects in a document.
const MAX_OBJECTS: usize = 4096;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DocumentFile {
    magic: String,
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub elements: Vec<ElementRecord>,
    pub objects: Vec<ObjectRecord>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum ElementRecord {
    Stroke(PathRecord),
    Shape(PathRecord),
    Text(TextRecord),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PathRecord {
    pub pen_color: [u8; 4],
    pub pen_width: u32,
    pub path: Vec<(f64, f64)>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FontRecord {
    pub family: String,
    pub size: i32,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TextRecord {
    pub font: FontRecord,
    pub pen_color: [u8; 4],
    pub position: (f64, f64),
    pub text: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ObjectRecord {
    /// PNG-encoded pixmap.
    pub pixel_data: Vec<u8>,
    pub x: i32,
    pub y: i32,
    pub rect: (i32, i32, i32, i32),
}

fn codec(limit: u64) -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .allow_trailing_bytes()
        .with_limit(limit)
}

// ---------------------------------------------------------------------------
//  Element ↔ record
// ---------------------------------------------------------------------------

fn path_record(pen: &Pen, path: &[PointF]) -> PathRecord {
    PathRecord {
        pen_color: pen.color.0,
        pen_width: pen.width,
        path: path.iter().map(|p| (p.x, p.y)).collect(),
    }
}

fn element_to_record(el: &Element) -> ElementRecord {
    match el {
        Element::Stroke { pen, path } => ElementRecord::Stroke(path_record(pen, path)),
        Element::Shape { pen, path } => ElementRecord::Shape(path_record(pen, path)),
        Element::Text { font, color, position, text } => ElementRecord::Text(TextRecord {
            font: FontRecord {
                family: font.family.clone(),
                size: font.size.round() as i32,
                bold: font.bold,
                italic: font.italic,
                underline: font.underline,
            },
            pen_color: color.0,
            position: (position.x, position.y),
            text: text.clone(),
        }),
    }
}

fn record_to_element(rec: ElementRecord) -> Element {
    let to_path = |r: &PathRecord| -> Vec<PointF> {
        r.path.iter().map(|&(x, y)| PointF::new(x, y)).collect()
    };
    match rec {
        ElementRecord::Stroke(r) => Element::Stroke {
            pen: Pen::new(Rgba(r.pen_color), r.pen_width),
            path: to_path(&r),
        },
        ElementRecord::Shape(r) => Element::Shape {
            pen: Pen::new(Rgba(r.pen_color), r.pen_width),
            path: to_path(&r),
        },
        ElementRecord::Text(t) => Element::Text {
            font: FontSpec {
                family: t.font.family,
                size: t.font.size as f32,
                bold: t.font.bold,
                italic: t.font.italic,
                underline: t.font.underline,
            },
            color: Rgba(t.pen_color),
            position: PointF::new(t.position.0, t.position.1),
            text: t.text,
        },
    }
}

// ---------------------------------------------------------------------------
//  Save
// ---------------------------------------------------------------------------

/// Snapshot `scene` into its serialisable form. Canvas size is the current
/// (possibly zoomed) size, matching the stored pixmaps and coordinates.
pub fn build_document(scene: &Scene) -> Result<DocumentFile> {
    let objects = scene
        .objects()
        .iter()
        .map(|obj| -> Result<ObjectRecord> {
            let r = obj.rect();
            Ok(ObjectRecord {
                pixel_data: encode_png(&obj.pixmap)?,
                x: obj.x,
                y: obj.y,
                rect: (r.x, r.y, r.w, r.h),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(DocumentFile {
        magic: DOC_MAGIC.to_string(),
        canvas_width: scene.canvas.width(),
        canvas_height: scene.canvas.height(),
        elements: scene.elements().iter().map(element_to_record).collect(),
        objects,
    })
}

/// Serialise to bytes.
pub fn encode_document(doc: &DocumentFile) -> Result<Vec<u8>> {
    codec(u64::MAX)
        .serialize(doc)
        .map_err(|e| EditorError::Encode(e.to_string()))
}

/// Save a scene as a .canvas document.
///
/// The bytes go to a sibling temp file that is renamed over `path` once
/// fully written, so a failed save never leaves a truncated document.
pub fn save_document(scene: &Scene, path: &Path) -> Result<()> {
    let bytes = build_document(scene).and_then(|doc| encode_document(&doc))?;
    let tmp = temp_path(path);
    let written = (|| -> std::io::Result<()> {
        let mut w = BufWriter::new(File::create(&tmp)?);
        w.write_all(&bytes)?;
        w.flush()?;
        Ok(())
    })();
    if let Err(e) = written.and_then(|_| fs::rename(&tmp, path)) {
        let _ = fs::remove_file(&tmp);
        log_err!("Saving {} failed: {}", path.display(), e);
        return Err(e.into());
    }
    log_info!("Saved {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

// ---------------------------------------------------------------------------
//  Load
// ---------------------------------------------------------------------------

/// Parse and validate a document. Nothing outside the returned value is
/// touched, so a failed decode leaves the caller's scene as it was.
pub fn decode_document(raw: &[u8]) -> Result<DocumentFile> {
    if raw.len() < 12 {
        return Err(EditorError::Decode("file too small".into()));
    }
    // bincode encodes a String as an 8-byte length prefix + UTF-8 data, so
    // the 4-byte magic sits at 8..12.
    let magic = std::str::from_utf8(&raw[8..12]).unwrap_or("");
    if magic != DOC_MAGIC {
        return Err(EditorError::Decode(format!("unknown magic '{}'", magic)));
    }

    let doc: DocumentFile = codec(raw.len() as u64)
        .deserialize(raw)
        .map_err(|e| EditorError::Decode(e.to_string()))?;

    if doc.canvas_width == 0 || doc.canvas_height == 0 {
        return Err(EditorError::Decode("canvas dimensions cannot be zero".into()));
    }
    if doc.canvas_width > MAX_CANVAS_DIM || doc.canvas_height > MAX_CANVAS_DIM {
        return Err(EditorError::Decode(format!(
            "canvas size {}x{} exceeds maximum allowed {}x{}",
            doc.canvas_width, doc.canvas_height, MAX_CANVAS_DIM, MAX_CANVAS_DIM
        )));
    }
    if doc.objects.len() > MAX_OBJECTS {
        return Err(EditorError::Decode(format!(
            "document contains {} objects, which exceeds the maximum of {}",
            doc.objects.len(),
            MAX_OBJECTS
        )));
    }
    Ok(doc)
}

/// Rebuild a scene from a decoded document. Object pixmaps become their own
/// base images.
pub fn scene_from_document(doc: DocumentFile, background: Rgba<u8>) -> Result<Scene> {
    let mut objects = Vec::with_capacity(doc.objects.len());
    for (i, rec) in doc.objects.into_iter().enumerate() {
        let pixmap = decode_png(&rec.pixel_data)
            .map_err(|e| EditorError::Decode(format!("object {}: {}", i, e)))?;
        if pixmap.width() > MAX_CANVAS_DIM || pixmap.height() > MAX_CANVAS_DIM {
            return Err(EditorError::Decode(format!(
                "object {} is {}x{}, larger than allowed",
                i,
                pixmap.width(),
                pixmap.height()
            )));
        }
        let (_, _, rw, rh) = rec.rect;
        if (rw, rh) != (pixmap.width() as i32, pixmap.height() as i32) {
            log_warn!(
                "Object {} rect {}x{} does not match its {}x{} image; using the image size",
                i,
                rw,
                rh,
                pixmap.width(),
                pixmap.height()
            );
        }
        objects.push((pixmap, rec.x, rec.y));
    }

    let mut scene = Scene::new(doc.canvas_width, doc.canvas_height, background);
    scene.push_loaded(doc.elements.into_iter().map(record_to_element).collect(), objects);
    Ok(scene)
}

/// Load a .canvas document into a new scene.
pub fn load_document(path: &Path, background: Rgba<u8>) -> Result<Scene> {
    let raw = fs::read(path)?;
    let scene = decode_document(&raw).and_then(|doc| scene_from_document(doc, background));
    match &scene {
        Ok(s) => log_info!(
            "Loaded {} ({}x{}, {} elements, {} objects)",
            path.display(),
            s.canvas.width(),
            s.canvas.height(),
            s.elements().len(),
            s.objects().len()
        ),
        Err(e) => log_err!("Loading {} failed: {}", path.display(), e),
    }
    scene
}

// ============================================================================
// RASTER I/O
// ============================================================================

/// Lossless PNG bytes for a buffer (RGB or RGBA as stored).
pub fn encode_png(buf: &PixelBuffer) -> Result<Vec<u8>> {
    let color = match buf.channels() {
        Channels::Rgb => ColorType::Rgb8,
        Channels::Rgba => ColorType::Rgba8,
    };
    let mut out = Vec::new();
    PngEncoder::new(&mut out)
        .write_image(buf.as_raw(), buf.width(), buf.height(), color)
        .map_err(|e| EditorError::Encode(e.to_string()))?;
    Ok(out)
}

pub fn decode_png(bytes: &[u8]) -> Result<PixelBuffer> {
    let img = image::load_from_memory_with_format(bytes, ImageFormat::Png)
        .map_err(|e| EditorError::Decode(e.to_string()))?;
    Ok(PixelBuffer::from_dynamic(img))
}

/// Write the canvas buffer as PNG.
pub fn export_png(buf: &PixelBuffer, path: &Path) -> Result<()> {
    let bytes = encode_png(buf)?;
    fs::write(path, &bytes)?;
    log_info!("Exported {}x{} PNG to {}", buf.width(), buf.height(), path.display());
    Ok(())
}

/// Decode any supported raster file (PNG, JPEG, BMP).
pub fn import_image(path: &Path) -> Result<PixelBuffer> {
    let img = image::open(path)?;
    log_info!("Imported {} ({}x{})", path.display(), img.width(), img.height());
    Ok(PixelBuffer::from_dynamic(img))
}
