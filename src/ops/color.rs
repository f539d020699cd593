// ============================================================================
// COLOR PIPELINE: colour-space conversion, gamma, bitwise masks, negative
// ============================================================================
//
// Every function takes a source buffer and returns a new buffer of the same
// dimensions and channel layout. Alpha, when present, is passed through.
// Conversions emit the common 8-bit encodings (hue halved to fit 0..180,
// Lab and chroma channels offset by 128) so the result is directly viewable.
// ============================================================================

use std::fmt;
use std::str::FromStr;

use image::Rgba;
use rayon::prelude::*;

use crate::canvas::PixelBuffer;
use crate::error::EditorError;

/// Colour-space tag remembered on an object so rescaling can reapply it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ColorMode {
    Rgb,
    Hsv,
    Gray,
    Cie,
    Hls,
    YCrCb,
}

impl ColorMode {
    pub fn all() -> &'static [ColorMode] {
        &[
            ColorMode::Rgb,
            ColorMode::Hsv,
            ColorMode::Gray,
            ColorMode::Cie,
            ColorMode::Hls,
            ColorMode::YCrCb,
        ]
    }

    pub fn tag(&self) -> &'static str {
        match self {
            ColorMode::Rgb => "RGB",
            ColorMode::Hsv => "HSV",
            ColorMode::Gray => "GRAY",
            ColorMode::Cie => "CIE",
            ColorMode::Hls => "HLS",
            ColorMode::YCrCb => "YCrCb",
        }
    }
}

impl fmt::Display for ColorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for ColorMode {
    type Err = EditorError;

    /// Case-insensitive; `LAB` is accepted for `CIE`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "RGB" => Ok(ColorMode::Rgb),
            "HSV" => Ok(ColorMode::Hsv),
            "GRAY" | "GREY" => Ok(ColorMode::Gray),
            "CIE" | "LAB" => Ok(ColorMode::Cie),
            "HLS" => Ok(ColorMode::Hls),
            "YCRCB" => Ok(ColorMode::YCrCb),
            _ => Err(EditorError::UnsupportedColorMode(s.to_string())),
        }
    }
}

/// Bitwise combinator used with the derived grayscale mask.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BitwiseOp {
    And,
    Or,
    Xor,
}

impl BitwiseOp {
    #[inline]
    fn apply(self, a: u8, b: u8) -> u8 {
        match self {
            BitwiseOp::And => a & b,
            BitwiseOp::Or => a | b,
            BitwiseOp::Xor => a ^ b,
        }
    }
}

impl FromStr for BitwiseOp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "and" => Ok(BitwiseOp::And),
            "or" => Ok(BitwiseOp::Or),
            "xor" => Ok(BitwiseOp::Xor),
            other => Err(format!("unknown bitwise operation '{other}' (expected and, or, xor)")),
        }
    }
}

// ============================================================================
// HELPER: parallel per-pixel map
// ============================================================================

/// Apply `f` to the RGB part of every pixel, row-parallel. Alpha is untouched.
fn map_rgb<F>(src: &PixelBuffer, f: F) -> PixelBuffer
where
    F: Fn(u8, u8, u8) -> [u8; 3] + Sync,
{
    let mut out = src.clone();
    if out.is_empty() {
        return out;
    }
    let n = src.channels().count();
    let stride = src.stride();
    out.as_raw_mut().par_chunks_mut(stride).for_each(|row| {
        for px in row.chunks_exact_mut(n) {
            let [r, g, b] = f(px[0], px[1], px[2]);
            px[0] = r;
            px[1] = g;
            px[2] = b;
        }
    });
    out
}

#[inline]
fn to_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

#[inline]
fn luma(r: u8, g: u8, b: u8) -> u8 {
    to_u8(0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32)
}

/// Hue in degrees `[0, 360)` for normalised RGB with precomputed max/min.
fn hue_degrees(r: f32, g: f32, b: f32, max: f32, diff: f32) -> f32 {
    if diff <= 0.0 {
        return 0.0;
    }
    let h = if max == r {
        60.0 * (g - b) / diff
    } else if max == g {
        120.0 + 60.0 * (b - r) / diff
    } else {
        240.0 + 60.0 * (r - g) / diff
    };
    if h < 0.0 { h + 360.0 } else { h }
}

// ============================================================================
// PER-PIXEL CONVERSIONS (RGB in, encoded triple out)
// ============================================================================

pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> [u8; 3] {
    let (rf, gf, bf) = (r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0);
    let max = rf.max(gf).max(bf);
    let min = rf.min(gf).min(bf);
    let diff = max - min;
    let s = if max > 0.0 { diff / max } else { 0.0 };
    let h = hue_degrees(rf, gf, bf, max, diff);
    [to_u8(h / 2.0), to_u8(s * 255.0), to_u8(max * 255.0)]
}

pub fn rgb_to_hls(r: u8, g: u8, b: u8) -> [u8; 3] {
    let (rf, gf, bf) = (r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0);
    let max = rf.max(gf).max(bf);
    let min = rf.min(gf).min(bf);
    let diff = max - min;
    let l = (max + min) / 2.0;
    let s = if diff <= 0.0 {
        0.0
    } else if l < 0.5 {
        diff / (max + min)
    } else {
        diff / (2.0 - max - min)
    };
    let h = hue_degrees(rf, gf, bf, max, diff);
    [to_u8(h / 2.0), to_u8(l * 255.0), to_u8(s * 255.0)]
}

pub fn rgb_to_ycrcb(r: u8, g: u8, b: u8) -> [u8; 3] {
    let (rf, gf, bf) = (r as f32, g as f32, b as f32);
    let y = 0.299 * rf + 0.587 * gf + 0.114 * bf;
    let cr = (rf - y) * 0.713 + 128.0;
    let cb = (bf - y) * 0.564 + 128.0;
    [to_u8(y), to_u8(cr), to_u8(cb)]
}

/// sRGB → CIE L*a*b* (D65), L scaled to 0..255, a/b offset by 128.
pub fn rgb_to_lab(r: u8, g: u8, b: u8) -> [u8; 3] {
    fn linear(c: u8) -> f32 {
        let c = c as f32 / 255.0;
        if c <= 0.04045 { c / 12.92 } else { ((c + 0.055) / 1.055).powf(2.4) }
    }
    fn f(t: f32) -> f32 {
        if t > 0.008856 { t.cbrt() } else { 7.787 * t + 16.0 / 116.0 }
    }

    let (rl, gl, bl) = (linear(r), linear(g), linear(b));
    let x = (0.412453 * rl + 0.357580 * gl + 0.180423 * bl) / 0.950456;
    let y = 0.212671 * rl + 0.715160 * gl + 0.072169 * bl;
    let z = (0.019334 * rl + 0.119193 * gl + 0.950227 * bl) / 1.088754;

    let l = if y > 0.008856 { 116.0 * y.cbrt() - 16.0 } else { 903.3 * y };
    let a = 500.0 * (f(x) - f(y)) + 128.0;
    let bb = 200.0 * (f(y) - f(z)) + 128.0;
    [to_u8(l * 255.0 / 100.0), to_u8(a), to_u8(bb)]
}

// ============================================================================
// BUFFER OPERATIONS
// ============================================================================

/// Convert `src` (RGB storage) into `mode`. GRAY is expanded back to three
/// identical channels so the buffer layout never changes.
pub fn convert(src: &PixelBuffer, mode: ColorMode) -> PixelBuffer {
    match mode {
        ColorMode::Rgb => src.clone(),
        ColorMode::Gray => map_rgb(src, |r, g, b| {
            let l = luma(r, g, b);
            [l, l, l]
        }),
        ColorMode::Hsv => map_rgb(src, rgb_to_hsv),
        ColorMode::Hls => map_rgb(src, rgb_to_hls),
        ColorMode::Cie => map_rgb(src, rgb_to_lab),
        ColorMode::YCrCb => map_rgb(src, rgb_to_ycrcb),
    }
}

/// `table[i] = clamp(255 * (i/255)^(1/gamma))`.
pub fn gamma_lut(gamma: f64) -> [u8; 256] {
    let inv = 1.0 / gamma;
    let mut table = [0u8; 256];
    for (i, slot) in table.iter_mut().enumerate() {
        *slot = (255.0 * (i as f64 / 255.0).powf(inv)).clamp(0.0, 255.0) as u8;
    }
    table
}

/// Gamma correction through a lookup table. Non-positive or non-finite
/// gamma leaves the buffer unchanged.
pub fn gamma_correct(src: &PixelBuffer, gamma: f64) -> PixelBuffer {
    if !(gamma.is_finite() && gamma > 0.0) {
        return src.clone();
    }
    let lut = gamma_lut(gamma);
    map_rgb(src, |r, g, b| [lut[r as usize], lut[g as usize], lut[b as usize]])
}

/// Combine each channel with the pixel's own grayscale value.
pub fn bitwise_with_gray(src: &PixelBuffer, op: BitwiseOp) -> PixelBuffer {
    map_rgb(src, |r, g, b| {
        let m = luma(r, g, b);
        [op.apply(r, m), op.apply(g, m), op.apply(b, m)]
    })
}

/// Per-channel `255 - v`.
pub fn negative(src: &PixelBuffer) -> PixelBuffer {
    map_rgb(src, |r, g, b| [255 - r, 255 - g, 255 - b])
}

/// Paint every pixel with `color` (alpha written only for RGBA buffers).
pub fn fill_solid(src: &PixelBuffer, color: Rgba<u8>) -> PixelBuffer {
    PixelBuffer::filled(src.width(), src.height(), src.channels(), color)
}

/// Per-channel 256-bin histograms.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Histogram {
    pub red: [u32; 256],
    pub green: [u32; 256],
    pub blue: [u32; 256],
    /// Present only for RGBA buffers.
    pub alpha: Option<[u32; 256]>,
}

pub fn histogram(src: &PixelBuffer) -> Histogram {
    let n = src.channels().count();
    let mut hist = Histogram {
        red: [0; 256],
        green: [0; 256],
        blue: [0; 256],
        alpha: if n == 4 { Some([0; 256]) } else { None },
    };
    for px in src.as_raw().chunks_exact(n) {
        hist.red[px[0] as usize] += 1;
        hist.green[px[1] as usize] += 1;
        hist.blue[px[2] as usize] += 1;
        if let Some(alpha) = hist.alpha.as_mut() {
            alpha[px[3] as usize] += 1;
        }
    }
    hist
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{rgb, Channels};

    #[test]
    fn parse_tags() {
        assert_eq!("hsv".parse::<ColorMode>().unwrap(), ColorMode::Hsv);
        assert_eq!("YCrCb".parse::<ColorMode>().unwrap(), ColorMode::YCrCb);
        assert_eq!("Lab".parse::<ColorMode>().unwrap(), ColorMode::Cie);
        let err = "XYZ".parse::<ColorMode>().unwrap_err();
        assert!(err.is_silent());
        for mode in ColorMode::all() {
            assert_eq!(mode.tag().parse::<ColorMode>().unwrap(), *mode);
        }
        assert!("nand".parse::<BitwiseOp>().is_err());
    }

    #[test]
    fn hsv_primaries() {
        assert_eq!(rgb_to_hsv(255, 0, 0), [0, 255, 255]);
        assert_eq!(rgb_to_hsv(0, 255, 0), [60, 255, 255]);
        assert_eq!(rgb_to_hsv(0, 0, 255), [120, 255, 255]);
        assert_eq!(rgb_to_hsv(0, 0, 0), [0, 0, 0]);
    }

    #[test]
    fn hls_gray_has_no_saturation() {
        assert_eq!(rgb_to_hls(128, 128, 128), [0, 128, 0]);
        assert_eq!(rgb_to_hls(255, 0, 0), [0, 128, 255]);
    }

    #[test]
    fn ycrcb_neutral_chroma() {
        assert_eq!(rgb_to_ycrcb(200, 200, 200), [200, 128, 128]);
    }

    #[test]
    fn lab_white_and_black() {
        assert_eq!(rgb_to_lab(255, 255, 255), [255, 128, 128]);
        assert_eq!(rgb_to_lab(0, 0, 0), [0, 128, 128]);
    }

    #[test]
    fn gray_expands_to_three_channels() {
        let src = PixelBuffer::filled(3, 2, Channels::Rgb, rgb(255, 0, 0));
        let out = convert(&src, ColorMode::Gray);
        assert_eq!(out.channels(), Channels::Rgb);
        assert_eq!(out.get_pixel(1, 1), rgb(76, 76, 76));
        assert_eq!(convert(&src, ColorMode::Rgb), src);
    }

    #[test]
    fn alpha_passes_through() {
        let src = PixelBuffer::filled(2, 2, Channels::Rgba, Rgba([10, 20, 30, 77]));
        assert_eq!(negative(&src).get_pixel(0, 0), Rgba([245, 235, 225, 77]));
    }

    #[test]
    fn gamma_table_endpoints() {
        let lut = gamma_lut(2.2);
        assert_eq!(lut[0], 0);
        assert_eq!(lut[255], 255);
        assert!(lut[64] > 64);
        assert_eq!(gamma_lut(1.0)[100], 100);
        let src = PixelBuffer::filled(1, 1, Channels::Rgb, rgb(64, 64, 64));
        assert_eq!(gamma_correct(&src, 0.0), src);
    }

    #[test]
    fn bitwise_uses_gray_mask() {
        let src = PixelBuffer::filled(1, 1, Channels::Rgb, rgb(255, 0, 0));
        // gray of pure red is 76
        assert_eq!(bitwise_with_gray(&src, BitwiseOp::And).get_pixel(0, 0), rgb(76, 0, 0));
        assert_eq!(bitwise_with_gray(&src, BitwiseOp::Or).get_pixel(0, 0), rgb(255, 76, 76));
        assert_eq!(bitwise_with_gray(&src, BitwiseOp::Xor).get_pixel(0, 0), rgb(255 ^ 76, 76, 76));
    }

    #[test]
    fn negative_twice_is_identity() {
        let mut src = PixelBuffer::new(4, 4, Channels::Rgb);
        src.put_pixel(1, 2, rgb(3, 140, 250));
        assert_eq!(negative(&negative(&src)), src);
    }

    #[test]
    fn histogram_counts_pixels() {
        let mut src = PixelBuffer::filled(4, 2, Channels::Rgb, rgb(0, 0, 0));
        src.put_pixel(0, 0, rgb(255, 10, 0));
        let h = histogram(&src);
        assert_eq!(h.red[0], 7);
        assert_eq!(h.red[255], 1);
        assert_eq!(h.green[10], 1);
        assert!(h.alpha.is_none());
    }
}
