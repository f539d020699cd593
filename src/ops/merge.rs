// ============================================================================
// MERGE: concatenate several pixmaps into one
// ============================================================================

use std::str::FromStr;

use crate::canvas::{Channels, PixelBuffer};
use crate::error::{EditorError, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MergeOrientation {
    /// Left to right, all normalised to the smallest height.
    SideBySide,
    /// Top to bottom, all normalised to the smallest width.
    Stacked,
}

impl FromStr for MergeOrientation {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "side" | "side-by-side" | "horizontal" => Ok(MergeOrientation::SideBySide),
            "stacked" | "stack" | "vertical" => Ok(MergeOrientation::Stacked),
            other => Err(format!("unknown merge orientation '{other}' (expected side, stacked)")),
        }
    }
}

/// Concatenate `sources` in input order. Every source is converted to RGB
/// and resized, aspect preserved, to the shared minimum extent.
pub fn merge_buffers(sources: &[&PixelBuffer], orientation: MergeOrientation) -> Result<PixelBuffer> {
    if sources.len() < 2 {
        return Err(EditorError::MergeInput(format!(
            "need at least 2 images, got {}",
            sources.len()
        )));
    }
    if let Some(i) = sources.iter().position(|s| s.is_empty()) {
        return Err(EditorError::MergeInput(format!("image {} is empty", i + 1)));
    }

    let parts: Vec<PixelBuffer> = match orientation {
        MergeOrientation::SideBySide => {
            let th = sources.iter().map(|s| s.height()).min().unwrap_or(1);
            sources
                .iter()
                .map(|s| {
                    let w = (s.width() as u64 * th as u64 / s.height() as u64) as u32;
                    s.to_channels(Channels::Rgb).resized(w, th)
                })
                .collect()
        }
        MergeOrientation::Stacked => {
            let tw = sources.iter().map(|s| s.width()).min().unwrap_or(1);
            sources
                .iter()
                .map(|s| {
                    let h = (s.height() as u64 * tw as u64 / s.width() as u64) as u32;
                    s.to_channels(Channels::Rgb).resized(tw, h)
                })
                .collect()
        }
    };

    let merged = match orientation {
        MergeOrientation::SideBySide => hconcat(&parts),
        MergeOrientation::Stacked => vconcat(&parts),
    };
    merged.ok_or_else(|| EditorError::MergeInput("concatenated image has mismatched extents".into()))
}

fn hconcat(parts: &[PixelBuffer]) -> Option<PixelBuffer> {
    let h = parts.first()?.height();
    if parts.iter().any(|p| p.height() != h) {
        return None;
    }
    let w: u32 = parts.iter().map(|p| p.width()).sum();
    let mut data = Vec::with_capacity(w as usize * h as usize * 3);
    for y in 0..h as usize {
        for p in parts {
            let stride = p.stride();
            data.extend_from_slice(&p.as_raw()[y * stride..(y + 1) * stride]);
        }
    }
    PixelBuffer::from_raw(w, h, Channels::Rgb, data)
}

fn vconcat(parts: &[PixelBuffer]) -> Option<PixelBuffer> {
    let w = parts.first()?.width();
    if parts.iter().any(|p| p.width() != w) {
        return None;
    }
    let h: u32 = parts.iter().map(|p| p.height()).sum();
    let mut data = Vec::with_capacity(w as usize * h as usize * 3);
    for p in parts {
        data.extend_from_slice(p.as_raw());
    }
    PixelBuffer::from_raw(w, h, Channels::Rgb, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::rgb;

    #[test]
    fn side_by_side_uses_min_height() {
        let a = PixelBuffer::filled(50, 100, Channels::Rgb, rgb(255, 0, 0));
        let b = PixelBuffer::filled(300, 200, Channels::Rgba, rgb(0, 0, 255));
        let out = merge_buffers(&[&a, &b], MergeOrientation::SideBySide).unwrap();
        assert_eq!(out.height(), 100);
        assert_eq!(out.width(), 50 + 150);
        assert_eq!(out.channels(), Channels::Rgb);
        assert_eq!(out.get_pixel(10, 50), rgb(255, 0, 0));
        assert_eq!(out.get_pixel(120, 50), rgb(0, 0, 255));
    }

    #[test]
    fn stacked_uses_min_width() {
        let a = PixelBuffer::filled(100, 40, Channels::Rgb, rgb(1, 1, 1));
        let b = PixelBuffer::filled(200, 100, Channels::Rgb, rgb(2, 2, 2));
        let c = PixelBuffer::filled(100, 10, Channels::Rgb, rgb(3, 3, 3));
        let out = merge_buffers(&[&a, &b, &c], MergeOrientation::Stacked).unwrap();
        assert_eq!(out.dimensions(), (100, 40 + 50 + 10));
        assert_eq!(out.get_pixel(0, 0), rgb(1, 1, 1));
        assert_eq!(out.get_pixel(0, 60), rgb(2, 2, 2));
        assert_eq!(out.get_pixel(99, 99), rgb(3, 3, 3));
    }

    #[test]
    fn single_source_is_rejected() {
        let a = PixelBuffer::filled(10, 10, Channels::Rgb, rgb(0, 0, 0));
        let err = merge_buffers(&[&a], MergeOrientation::SideBySide).unwrap_err();
        assert!(matches!(err, EditorError::MergeInput(_)));
        assert!(!err.is_silent());
    }

    #[test]
    fn orientation_parses() {
        assert_eq!("side".parse::<MergeOrientation>(), Ok(MergeOrientation::SideBySide));
        assert_eq!("Stacked".parse::<MergeOrientation>(), Ok(MergeOrientation::Stacked));
        assert!("diagonal".parse::<MergeOrientation>().is_err());
    }
}
