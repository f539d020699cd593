use image::{imageops, DynamicImage, RgbImage, Rgba, RgbaImage};
use rayon::prelude::*;

use crate::ops::transform::checked_scaled_dims;

// ============================================================================
// PIXEL BUFFER: flat row-major RGB / RGBA storage
// ============================================================================

/// Sample layout of a [`PixelBuffer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Channels {
    Rgb,
    Rgba,
}

impl Channels {
    pub fn count(self) -> usize {
        match self {
            Channels::Rgb => 3,
            Channels::Rgba => 4,
        }
    }
}

/// A mutable 2D grid of 8-bit samples.
///
/// Invariant: `data.len() == width * height * channels`. Every constructor
/// enforces it, so indexing helpers never bounds-check the buffer itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    channels: Channels,
    data: Vec<u8>,
}

impl PixelBuffer {
    // ---- construction -------------------------------------------------------

    /// Zero-filled buffer (black, and fully transparent for RGBA).
    pub fn new(width: u32, height: u32, channels: Channels) -> Self {
        let len = width as usize * height as usize * channels.count();
        Self { width, height, channels, data: vec![0; len] }
    }

    /// Buffer where every pixel is `color` (alpha dropped for RGB).
    pub fn filled(width: u32, height: u32, channels: Channels, color: Rgba<u8>) -> Self {
        let n = channels.count();
        let px = &color.0[..n];
        let mut data = Vec::with_capacity(width as usize * height as usize * n);
        for _ in 0..(width as usize * height as usize) {
            data.extend_from_slice(px);
        }
        Self { width, height, channels, data }
    }

    /// Wrap raw samples; `None` when the length does not match the dimensions.
    pub fn from_raw(width: u32, height: u32, channels: Channels, data: Vec<u8>) -> Option<Self> {
        if data.len() != width as usize * height as usize * channels.count() {
            return None;
        }
        Some(Self { width, height, channels, data })
    }

    pub fn from_rgb_image(img: RgbImage) -> Self {
        let (width, height) = img.dimensions();
        Self { width, height, channels: Channels::Rgb, data: img.into_raw() }
    }

    pub fn from_rgba_image(img: RgbaImage) -> Self {
        let (width, height) = img.dimensions();
        Self { width, height, channels: Channels::Rgba, data: img.into_raw() }
    }

    /// Keep alpha when the decoded image has it, otherwise store RGB.
    pub fn from_dynamic(img: DynamicImage) -> Self {
        if img.color().has_alpha() {
            Self::from_rgba_image(img.into_rgba8())
        } else {
            Self::from_rgb_image(img.into_rgb8())
        }
    }

    pub fn to_rgba_image(&self) -> RgbaImage {
        let rgba = self.to_channels(Channels::Rgba);
        // Length invariant guarantees the conversion succeeds.
        RgbaImage::from_raw(rgba.width, rgba.height, rgba.data)
            .unwrap_or_else(|| RgbaImage::new(self.width, self.height))
    }

    pub fn to_rgb_image(&self) -> RgbImage {
        let rgb = self.to_channels(Channels::Rgb);
        RgbImage::from_raw(rgb.width, rgb.height, rgb.data)
            .unwrap_or_else(|| RgbImage::new(self.width, self.height))
    }

    // ---- accessors ------------------------------------------------------------

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn channels(&self) -> Channels {
        self.channels
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Bytes per row.
    pub fn stride(&self) -> usize {
        self.width as usize * self.channels.count()
    }

    pub fn as_raw(&self) -> &[u8] {
        &self.data
    }

    pub fn as_raw_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }

    #[inline]
    fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * self.channels.count()
    }

    /// Pixel at `(x, y)` as RGBA (alpha 255 for RGB buffers).
    ///
    /// Panics when out of bounds, like `image::ImageBuffer::get_pixel`.
    pub fn get_pixel(&self, x: u32, y: u32) -> Rgba<u8> {
        assert!(x < self.width && y < self.height, "pixel ({x}, {y}) out of bounds");
        let o = self.offset(x, y);
        match self.channels {
            Channels::Rgb => Rgba([self.data[o], self.data[o + 1], self.data[o + 2], 255]),
            Channels::Rgba => Rgba([self.data[o], self.data[o + 1], self.data[o + 2], self.data[o + 3]]),
        }
    }

    pub fn put_pixel(&mut self, x: u32, y: u32, color: Rgba<u8>) {
        assert!(x < self.width && y < self.height, "pixel ({x}, {y}) out of bounds");
        let o = self.offset(x, y);
        let n = self.channels.count();
        self.data[o..o + n].copy_from_slice(&color.0[..n]);
    }

    // ---- conversions ----------------------------------------------------------

    /// Same pixels with a different sample layout. RGB→RGBA adds opaque alpha;
    /// RGBA→RGB drops alpha without premultiplying.
    pub fn to_channels(&self, channels: Channels) -> PixelBuffer {
        if channels == self.channels {
            return self.clone();
        }
        let src_n = self.channels.count();
        let dst_n = channels.count();
        let mut data = Vec::with_capacity(self.width as usize * self.height as usize * dst_n);
        for px in self.data.chunks_exact(src_n) {
            data.extend_from_slice(&px[..3]);
            if dst_n == 4 {
                data.push(255);
            }
        }
        PixelBuffer { width: self.width, height: self.height, channels, data }
    }

    /// Smoothly resampled copy (bilinear / triangle filter). Zero target
    /// dimensions are raised to 1; identical dimensions return an exact copy.
    pub fn resized(&self, width: u32, height: u32) -> PixelBuffer {
        let width = width.max(1);
        let height = height.max(1);
        if (width, height) == self.dimensions() {
            return self.clone();
        }
        match self.channels {
            Channels::Rgb => {
                let img: RgbImage = self.to_rgb_image();
                Self::from_rgb_image(imageops::resize(&img, width, height, imageops::FilterType::Triangle))
            }
            Channels::Rgba => {
                let img: RgbaImage = self.to_rgba_image();
                Self::from_rgba_image(imageops::resize(&img, width, height, imageops::FilterType::Triangle))
            }
        }
    }

    // ---- compositing ----------------------------------------------------------

    /// Source-over blend of one pixel, clipped to the buffer.
    pub fn blend_pixel(&mut self, x: i32, y: i32, top: Rgba<u8>) {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return;
        }
        let base = self.get_pixel(x as u32, y as u32);
        self.put_pixel(x as u32, y as u32, blend_over(base, top));
    }

    /// Draw `src` with its top-left corner at `(dx, dy)`, source-over, clipped.
    pub fn composite_over(&mut self, src: &PixelBuffer, dx: i32, dy: i32) {
        let x0 = dx.max(0);
        let y0 = dy.max(0);
        let x1 = (dx + src.width as i32).min(self.width as i32);
        let y1 = (dy + src.height as i32).min(self.height as i32);
        if x0 >= x1 || y0 >= y1 {
            return;
        }

        let dst_n = self.channels.count();
        let stride = self.stride();
        self.data
            .par_chunks_mut(stride)
            .enumerate()
            .skip(y0 as usize)
            .take((y1 - y0) as usize)
            .for_each(|(y, row)| {
                let sy = (y as i32 - dy) as u32;
                for x in x0..x1 {
                    let top = src.get_pixel((x - dx) as u32, sy);
                    let o = x as usize * dst_n;
                    let base = if dst_n == 4 {
                        Rgba([row[o], row[o + 1], row[o + 2], row[o + 3]])
                    } else {
                        Rgba([row[o], row[o + 1], row[o + 2], 255])
                    };
                    let out = blend_over(base, top);
                    row[o..o + dst_n].copy_from_slice(&out.0[..dst_n]);
                }
            });
    }

    /// Paint an axis-aligned outline `thickness` pixels wide centred on the
    /// rectangle's edges.
    pub fn stroke_rect(&mut self, x: i32, y: i32, w: i32, h: i32, thickness: i32, color: Rgba<u8>) {
        if w <= 0 || h <= 0 || thickness <= 0 {
            return;
        }
        let lo = thickness / 2;
        let hi = thickness - lo;
        let bands = [
            (x - lo, y - lo, x + w + hi, y + hi),
            (x - lo, y + h - lo, x + w + hi, y + h + hi),
            (x - lo, y - lo, x + hi, y + h + hi),
            (x + w - lo, y - lo, x + w + hi, y + h + hi),
        ];
        for (bx0, by0, bx1, by1) in bands {
            for py in by0..by1 {
                for px in bx0..bx1 {
                    self.blend_pixel(px, py, color);
                }
            }
        }
    }
}

/// Source-over blend of straight (non-premultiplied) RGBA colours.
pub fn blend_over(base: Rgba<u8>, top: Rgba<u8>) -> Rgba<u8> {
    if top[3] == 0 {
        return base;
    }
    if top[3] == 255 {
        return top;
    }
    let ta = top[3] as f32 / 255.0;
    let ba = base[3] as f32 / 255.0;
    let out_a = ta + ba * (1.0 - ta);
    if out_a <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }
    let ch = |t: u8, b: u8| -> u8 {
        let v = (t as f32 * ta + b as f32 * ba * (1.0 - ta)) / out_a;
        v.round().clamp(0.0, 255.0) as u8
    };
    Rgba([
        ch(top[0], base[0]),
        ch(top[1], base[1]),
        ch(top[2], base[2]),
        (out_a * 255.0).round().clamp(0.0, 255.0) as u8,
    ])
}

/// Convenience for RGB literals in tests and defaults.
pub fn rgb(r: u8, g: u8, b: u8) -> Rgba<u8> {
    Rgba([r, g, b, 255])
}

// ============================================================================
// CANVAS: the composited display buffer plus zoom state
// ============================================================================

/// Largest width or height of any canvas or object buffer, in pixels.
pub const MAX_CANVAS_DIM: u32 = 32_768;

/// The display surface. `buffer` is replaced on every redraw; `original_*`
/// and `background` describe the blank canvas restored by a zoom reset.
#[derive(Clone, Debug)]
pub struct Canvas {
    pub buffer: PixelBuffer,
    pub original_width: u32,
    pub original_height: u32,
    /// Cumulative zoom factor relative to the original size.
    pub scale: f64,
    pub background: Rgba<u8>,
}

impl Canvas {
    pub fn new(width: u32, height: u32, background: Rgba<u8>) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            buffer: PixelBuffer::filled(width, height, Channels::Rgba, background),
            original_width: width,
            original_height: height,
            scale: 1.0,
            background,
        }
    }

    pub fn width(&self) -> u32 {
        self.buffer.width()
    }

    pub fn height(&self) -> u32 {
        self.buffer.height()
    }

    /// A fresh background-filled buffer of the current size.
    pub fn blank(&self) -> PixelBuffer {
        PixelBuffer::filled(self.width(), self.height(), Channels::Rgba, self.background)
    }

    /// Canvas size at zoom `scale`: `original * scale`, truncated. `None`
    /// past [`MAX_CANVAS_DIM`].
    pub fn size_at(&self, scale: f64) -> Option<(u32, u32)> {
        checked_scaled_dims(self.original_width, self.original_height, scale)
    }

    /// Resize the display buffer to match the current zoom. Returns `false`
    /// and keeps the old buffer when the zoomed size is over the limit.
    pub fn apply_scale(&mut self) -> bool {
        let Some((w, h)) = self.size_at(self.scale) else {
            return false;
        };
        self.buffer = PixelBuffer::filled(w, h, Channels::Rgba, self.background);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_invariant_is_enforced() {
        assert!(PixelBuffer::from_raw(2, 2, Channels::Rgb, vec![0; 12]).is_some());
        assert!(PixelBuffer::from_raw(2, 2, Channels::Rgb, vec![0; 11]).is_none());
        assert!(PixelBuffer::from_raw(2, 2, Channels::Rgba, vec![0; 12]).is_none());
        let buf = PixelBuffer::new(7, 5, Channels::Rgba);
        assert_eq!(buf.as_raw().len(), 7 * 5 * 4);
    }

    #[test]
    fn get_put_roundtrip_rgb() {
        let mut buf = PixelBuffer::new(4, 3, Channels::Rgb);
        buf.put_pixel(2, 1, Rgba([10, 20, 30, 99]));
        assert_eq!(buf.get_pixel(2, 1), Rgba([10, 20, 30, 255]));
        assert_eq!(buf.get_pixel(0, 0), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn channel_conversion_keeps_color() {
        let buf = PixelBuffer::filled(3, 3, Channels::Rgb, rgb(1, 2, 3));
        let rgba = buf.to_channels(Channels::Rgba);
        assert_eq!(rgba.channels(), Channels::Rgba);
        assert_eq!(rgba.get_pixel(1, 1), Rgba([1, 2, 3, 255]));
        assert_eq!(rgba.to_channels(Channels::Rgb), buf);
    }

    #[test]
    fn resize_same_size_is_exact_copy() {
        let mut buf = PixelBuffer::new(5, 4, Channels::Rgb);
        buf.put_pixel(3, 2, rgb(200, 100, 50));
        assert_eq!(buf.resized(5, 4), buf);
        let half = buf.resized(2, 2);
        assert_eq!(half.dimensions(), (2, 2));
    }

    #[test]
    fn blend_over_extremes() {
        let base = rgb(10, 10, 10);
        assert_eq!(blend_over(base, Rgba([200, 0, 0, 0])), base);
        assert_eq!(blend_over(base, rgb(200, 0, 0)), rgb(200, 0, 0));
        let half = blend_over(rgb(0, 0, 0), Rgba([255, 255, 255, 128]));
        assert!(half[0] > 120 && half[0] < 135);
        assert_eq!(half[3], 255);
    }

    #[test]
    fn composite_over_clips() {
        let mut dst = PixelBuffer::filled(4, 4, Channels::Rgba, rgb(255, 255, 255));
        let src = PixelBuffer::filled(3, 3, Channels::Rgb, rgb(0, 0, 0));
        dst.composite_over(&src, 2, -1);
        assert_eq!(dst.get_pixel(2, 0), rgb(0, 0, 0));
        assert_eq!(dst.get_pixel(3, 1), rgb(0, 0, 0));
        assert_eq!(dst.get_pixel(3, 2), rgb(255, 255, 255));
        assert_eq!(dst.get_pixel(1, 0), rgb(255, 255, 255));
    }

    #[test]
    fn stroke_rect_two_pixels() {
        let mut buf = PixelBuffer::filled(20, 20, Channels::Rgba, rgb(255, 255, 255));
        buf.stroke_rect(5, 5, 10, 10, 2, rgb(255, 0, 0));
        assert_eq!(buf.get_pixel(4, 4), rgb(255, 0, 0));
        assert_eq!(buf.get_pixel(5, 5), rgb(255, 0, 0));
        assert_eq!(buf.get_pixel(6, 6), rgb(255, 255, 255));
        assert_eq!(buf.get_pixel(15, 10), rgb(255, 0, 0));
        assert_eq!(buf.get_pixel(10, 10), rgb(255, 255, 255));
    }

    #[test]
    fn canvas_scaled_size_truncates() {
        let mut c = Canvas::new(800, 600, rgb(255, 255, 255));
        c.scale = 1.1;
        assert_eq!(c.size_at(c.scale), Some((880, 660)));
        assert!(c.apply_scale());
        assert_eq!(c.buffer.dimensions(), (880, 660));
        c.scale = 1e9;
        assert!(!c.apply_scale());
        assert_eq!(c.buffer.dimensions(), (880, 660));
    }
}
