// ============================================================================
// TRANSFORM OPERATIONS: flip, crop, scale and rotate object pixmaps
// ============================================================================

use image::Rgba;
use rayon::prelude::*;

use crate::canvas::{Channels, PixelBuffer, MAX_CANVAS_DIM};
use crate::geometry::{rotated_bounds, Rect};

// ---------------------------------------------------------------------------
//  Flips
// ---------------------------------------------------------------------------

/// Mirror left↔right.
pub fn flip_horizontal(src: &PixelBuffer) -> PixelBuffer {
    let n = src.channels().count();
    let stride = src.stride();
    let mut out = src.clone();
    out.as_raw_mut()
        .par_chunks_mut(stride.max(1))
        .zip(src.as_raw().par_chunks(stride.max(1)))
        .for_each(|(dst_row, src_row)| {
            let w = src_row.len() / n;
            for x in 0..w {
                let s = (w - 1 - x) * n;
                dst_row[x * n..x * n + n].copy_from_slice(&src_row[s..s + n]);
            }
        });
    out
}

/// Mirror top↔bottom.
pub fn flip_vertical(src: &PixelBuffer) -> PixelBuffer {
    let stride = src.stride();
    let h = src.height() as usize;
    let raw = src.as_raw();
    let mut out = src.clone();
    out.as_raw_mut()
        .par_chunks_mut(stride.max(1))
        .enumerate()
        .for_each(|(y, row)| {
            let s = (h - 1 - y) * stride;
            row.copy_from_slice(&raw[s..s + stride]);
        });
    out
}

// ---------------------------------------------------------------------------
//  Crop
// ---------------------------------------------------------------------------

/// Copy the sub-region `local` (in buffer coordinates). `None` when the
/// region does not overlap the buffer at all.
pub fn crop(src: &PixelBuffer, local: Rect) -> Option<PixelBuffer> {
    let bounds = Rect::new(0, 0, src.width() as i32, src.height() as i32);
    let r = bounds.intersect(&local)?;
    let n = src.channels().count();
    let stride = src.stride();
    let row_bytes = r.w as usize * n;
    let mut data = Vec::with_capacity(row_bytes * r.h as usize);
    for y in r.y..r.bottom() {
        let start = y as usize * stride + r.x as usize * n;
        data.extend_from_slice(&src.as_raw()[start..start + row_bytes]);
    }
    PixelBuffer::from_raw(r.w as u32, r.h as u32, src.channels(), data)
}

// ---------------------------------------------------------------------------
//  Scaling
// ---------------------------------------------------------------------------

/// Dimensions of `w`×`h` scaled by `factor`, truncated, at least 1×1.
/// A tiny epsilon absorbs drift from repeated zoom multiplications.
pub fn scaled_dims(w: u32, h: u32, factor: f64) -> (u32, u32) {
    let dim = |v: u32| ((v as f64 * factor + 1e-7) as u32).max(1);
    (dim(w), dim(h))
}

/// [`scaled_dims`], or `None` when either side would exceed [`MAX_CANVAS_DIM`].
pub fn checked_scaled_dims(w: u32, h: u32, factor: f64) -> Option<(u32, u32)> {
    let dim = |v: u32| {
        let scaled = v as f64 * factor + 1e-7;
        (scaled.is_finite() && scaled < MAX_CANVAS_DIM as f64 + 1.0).then(|| (scaled as u32).max(1))
    };
    Some((dim(w)?, dim(h)?))
}

/// Uniformly scale by `factor` with smooth filtering.
pub fn scale_by(src: &PixelBuffer, factor: f64) -> PixelBuffer {
    let (w, h) = scaled_dims(src.width(), src.height(), factor);
    src.resized(w, h)
}

/// Scale to `percent` of the source size. 100 returns an exact copy.
pub fn scale_percent(src: &PixelBuffer, percent: f64) -> PixelBuffer {
    scale_by(src, percent / 100.0)
}

/// Largest aspect-preserving size of `w`×`h` that fits inside `max_w`×`max_h`.
/// Scales up as well as down.
pub fn fit_dims(w: u32, h: u32, max_w: u32, max_h: u32) -> (u32, u32) {
    if w == 0 || h == 0 {
        return (max_w.max(1), max_h.max(1));
    }
    let factor = (max_w as f64 / w as f64).min(max_h as f64 / h as f64);
    scaled_dims(w, h, factor)
}

/// Resize to fit inside `max_w`×`max_h`, aspect preserved.
pub fn fit_within(src: &PixelBuffer, max_w: u32, max_h: u32) -> PixelBuffer {
    let (w, h) = fit_dims(src.width(), src.height(), max_w, max_h);
    src.resized(w, h)
}

/// Preview-sized copy. Images already smaller than `max` are left as they are.
pub fn thumbnail(src: &PixelBuffer, max: u32) -> PixelBuffer {
    if src.width() <= max && src.height() <= max {
        return src.clone();
    }
    fit_within(src, max, max)
}

// ---------------------------------------------------------------------------
//  Rotation
// ---------------------------------------------------------------------------

/// Rotate `src` by `degrees` (clockwise-positive, y-down) about its centre.
///
/// The result is RGBA and sized to the rotated bounding box; pixels that map
/// outside the source are transparent. Each destination pixel centre is
/// mapped back into the source and sampled bilinearly.
pub fn rotate_about_center(src: &PixelBuffer, degrees: f64) -> PixelBuffer {
    let src = src.to_channels(Channels::Rgba);
    if degrees.rem_euclid(360.0) == 0.0 {
        return src;
    }

    let (bw, bh) = rotated_bounds(src.width(), src.height(), degrees);
    let mut dst = PixelBuffer::new(bw, bh, Channels::Rgba);

    let (sin, cos) = degrees.to_radians().sin_cos();
    let (scx, scy) = (src.width() as f64 * 0.5, src.height() as f64 * 0.5);
    let (dcx, dcy) = (bw as f64 * 0.5, bh as f64 * 0.5);

    let row_bytes = bw as usize * 4;
    dst.as_raw_mut()
        .par_chunks_mut(row_bytes)
        .enumerate()
        .for_each(|(dy, row)| {
            let v = dy as f64 + 0.5 - dcy;
            for dx in 0..bw as usize {
                let u = dx as f64 + 0.5 - dcx;
                // Inverse rotation back into source pixel space.
                let sx = cos * u + sin * v + scx - 0.5;
                let sy = -sin * u + cos * v + scy - 0.5;
                let px = bilinear_sample(&src, sx, sy);
                row[dx * 4..dx * 4 + 4].copy_from_slice(&px.0);
            }
        });
    dst
}

/// Bilinear interpolation with a transparent border.
pub fn bilinear_sample(img: &PixelBuffer, x: f64, y: f64) -> Rgba<u8> {
    let x0 = x.floor() as i64;
    let y0 = y.floor() as i64;
    let fx = x - x0 as f64;
    let fy = y - y0 as f64;
    let (w, h) = (img.width() as i64, img.height() as i64);

    if x0 < -1 || y0 < -1 || x0 >= w || y0 >= h {
        return Rgba([0, 0, 0, 0]);
    }

    let sample = |sx: i64, sy: i64| -> [f64; 4] {
        if sx < 0 || sy < 0 || sx >= w || sy >= h {
            [0.0; 4]
        } else {
            let p = img.get_pixel(sx as u32, sy as u32);
            [p[0] as f64, p[1] as f64, p[2] as f64, p[3] as f64]
        }
    };

    let tl = sample(x0, y0);
    let tr = sample(x0 + 1, y0);
    let bl = sample(x0, y0 + 1);
    let br = sample(x0 + 1, y0 + 1);

    let lerp = |a: f64, b: f64, t: f64| a + (b - a) * t;
    let mut out = [0u8; 4];
    for c in 0..4 {
        let top = lerp(tl[c], tr[c], fx);
        let bot = lerp(bl[c], br[c], fx);
        out[c] = lerp(top, bot, fy).round().clamp(0.0, 255.0) as u8;
    }
    Rgba(out)
}
