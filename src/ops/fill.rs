// ============================================================================
// FILL OPERATIONS: flood fill and direct pixel edits on a buffer
// ============================================================================

use image::Rgba;

use crate::canvas::PixelBuffer;

/// Recolour the 4-connected region of pixels exactly equal to the seed pixel.
///
/// Returns the number of pixels changed. Out-of-bounds seeds and fills whose
/// replacement already equals the target colour change nothing.
pub fn flood_fill(buf: &mut PixelBuffer, seed_x: i32, seed_y: i32, replacement: Rgba<u8>) -> usize {
    let (w, h) = (buf.width() as usize, buf.height() as usize);
    if seed_x < 0 || seed_y < 0 || seed_x as usize >= w || seed_y as usize >= h {
        return 0;
    }

    let n = buf.channels().count();
    let data = buf.as_raw_mut();
    let seed = seed_y as usize * w + seed_x as usize;

    let mut target = [0u8; 4];
    target[..n].copy_from_slice(&data[seed * n..seed * n + n]);
    let target = &target[..n];
    let repl = &replacement.0[..n];
    if target == repl {
        return 0;
    }

    // DFS over flat pixel indices; a pixel is set before its neighbours are
    // pushed, so it never matches `target` again.
    let mut stack: Vec<usize> = Vec::with_capacity(4096);
    stack.push(seed);
    let mut filled = 0;

    while let Some(idx) = stack.pop() {
        let o = idx * n;
        if &data[o..o + n] != target {
            continue;
        }
        data[o..o + n].copy_from_slice(repl);
        filled += 1;

        let x = idx % w;
        let y = idx / w;
        if x > 0 {
            stack.push(idx - 1);
        }
        if x + 1 < w {
            stack.push(idx + 1);
        }
        if y > 0 {
            stack.push(idx - w);
        }
        if y + 1 < h {
            stack.push(idx + w);
        }
    }
    filled
}

/// Set one pixel; `false` when the coordinate lies outside the buffer.
pub fn set_pixel(buf: &mut PixelBuffer, x: i32, y: i32, color: Rgba<u8>) -> bool {
    if x < 0 || y < 0 || x as u32 >= buf.width() || y as u32 >= buf.height() {
        return false;
    }
    buf.put_pixel(x as u32, y as u32, color);
    true
}

/// Paint the inclusive rectangle spanned by two corners, clipped to the
/// buffer. Returns the number of pixels written.
pub fn fill_region(buf: &mut PixelBuffer, x0: i32, y0: i32, x1: i32, y1: i32, color: Rgba<u8>) -> usize {
    let (w, h) = (buf.width() as i32, buf.height() as i32);
    let left = x0.min(x1).max(0);
    let right = x0.max(x1).min(w - 1);
    let top = y0.min(y1).max(0);
    let bottom = y0.max(y1).min(h - 1);
    if left > right || top > bottom {
        return 0;
    }

    let n = buf.channels().count();
    let stride = buf.stride();
    let px = &color.0[..n];
    let data = buf.as_raw_mut();
    for y in top..=bottom {
        let row = y as usize * stride;
        for x in left..=right {
            let o = row + x as usize * n;
            data[o..o + n].copy_from_slice(px);
        }
    }
    ((right - left + 1) * (bottom - top + 1)) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{rgb, Channels};

    /// 6×5 white buffer split by a black vertical wall at x = 3.
    fn walled() -> PixelBuffer {
        let mut buf = PixelBuffer::filled(6, 5, Channels::Rgba, rgb(255, 255, 255));
        for y in 0..5 {
            buf.put_pixel(3, y, rgb(0, 0, 0));
        }
        buf
    }

    #[test]
    fn fill_stays_inside_region() {
        let mut buf = walled();
        let before = buf.clone();
        let n = flood_fill(&mut buf, 0, 0, rgb(255, 0, 0));
        assert_eq!(n, 15);
        for y in 0..5 {
            for x in 0..6 {
                let expected = if x < 3 { rgb(255, 0, 0) } else { before.get_pixel(x, y) };
                assert_eq!(buf.get_pixel(x, y), expected, "pixel ({x}, {y})");
            }
        }
    }

    #[test]
    fn fill_is_idempotent() {
        let mut buf = walled();
        flood_fill(&mut buf, 1, 1, rgb(0, 128, 0));
        let once = buf.clone();
        assert_eq!(flood_fill(&mut buf, 1, 1, rgb(0, 128, 0)), 0);
        assert_eq!(buf, once);
    }

    #[test]
    fn diagonal_neighbours_are_not_connected() {
        let mut buf = PixelBuffer::filled(3, 3, Channels::Rgb, rgb(0, 0, 0));
        buf.put_pixel(0, 0, rgb(9, 9, 9));
        buf.put_pixel(1, 1, rgb(9, 9, 9));
        assert_eq!(flood_fill(&mut buf, 0, 0, rgb(1, 1, 1)), 1);
        assert_eq!(buf.get_pixel(1, 1), rgb(9, 9, 9));
    }

    #[test]
    fn out_of_bounds_seed_is_ignored() {
        let mut buf = walled();
        let before = buf.clone();
        assert_eq!(flood_fill(&mut buf, -1, 2, rgb(1, 2, 3)), 0);
        assert_eq!(flood_fill(&mut buf, 6, 0, rgb(1, 2, 3)), 0);
        assert_eq!(buf, before);
    }

    #[test]
    fn large_fill_terminates() {
        let mut buf = PixelBuffer::filled(300, 300, Channels::Rgba, rgb(240, 240, 240));
        assert_eq!(flood_fill(&mut buf, 150, 150, rgb(0, 0, 0)), 90_000);
    }

    #[test]
    fn region_fill_is_inclusive_and_clipped() {
        let mut buf = PixelBuffer::filled(4, 4, Channels::Rgb, rgb(0, 0, 0));
        assert_eq!(fill_region(&mut buf, 2, 2, 1, 1, rgb(5, 5, 5)), 4);
        assert_eq!(buf.get_pixel(1, 1), rgb(5, 5, 5));
        assert_eq!(buf.get_pixel(2, 2), rgb(5, 5, 5));
        assert_eq!(buf.get_pixel(3, 3), rgb(0, 0, 0));
        assert_eq!(fill_region(&mut buf, 3, 3, 10, 10, rgb(7, 7, 7)), 1);
        assert_eq!(fill_region(&mut buf, 5, 5, 10, 10, rgb(7, 7, 7)), 0);
        assert!(set_pixel(&mut buf, 0, 3, rgb(1, 1, 1)));
        assert!(!set_pixel(&mut buf, 0, 4, rgb(1, 1, 1)));
    }
}
