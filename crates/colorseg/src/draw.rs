//! Annotating images with straight lines.
//!
//! Lines are walked DDA-style: `max(|dx|, |dy|)` equal steps from start to end,
//! each point rounded half-to-even, with a square brush stamped at every point.

use crate::{InputImageError, validate_buffer};

/// A mutable view over row-major pixel bytes.
#[derive(Debug)]
pub struct Canvas<'a> {
    width: u16,
    height: u16,
    channels: usize,
    buf: &'a mut [u8],
}

impl<'a> Canvas<'a> {
    /// Wraps an RGBRGBRGB… buffer.
    pub fn from_bytes(
        width: u16,
        height: u16,
        buf: &'a mut [u8],
    ) -> Result<Canvas<'a>, InputImageError> {
        Self::from_bytes_with_channels(width, height, 3, buf)
    }

    pub fn from_bytes_with_channels(
        width: u16,
        height: u16,
        channels: usize,
        buf: &'a mut [u8],
    ) -> Result<Canvas<'a>, InputImageError> {
        validate_buffer(width, height, channels, buf.len())?;
        Ok(Canvas {
            width,
            height,
            channels,
            buf,
        })
    }

    #[inline]
    fn contains(&self, x: i32, y: i32) -> bool {
        (0..self.width as i32).contains(&x) && (0..self.height as i32).contains(&y)
    }

    #[inline]
    fn put(&mut self, x: i32, y: i32, color: &[u8]) {
        let offset = (y as usize * self.width as usize + x as usize) * self.channels;
        self.buf[offset..offset + self.channels].copy_from_slice(color);
    }

    /// Paints a `thickness`-wide square centered on `(x, y)`, clipped to the
    /// canvas. Nothing is painted when the center itself is off-canvas.
    ///
    /// The square spans offsets `floor(-thickness / 2)..=floor(thickness / 2)`,
    /// so even sizes extend one pixel further up and left.
    pub fn stamp(&mut self, x: i32, y: i32, color: &[u8], thickness: u32) {
        assert_eq!(color.len(), self.channels);
        if !self.contains(x, y) {
            return;
        }

        let t = thickness as i64;
        let lo = (-t).div_euclid(2);
        let hi = t / 2;

        // Clip the brush to the canvas before walking it
        let (x, y) = (x as i64, y as i64);
        let x_range = (x + lo).max(0)..=(x + hi).min(self.width as i64 - 1);
        let y_range = (y + lo).max(0)..=(y + hi).min(self.height as i64 - 1);
        for py in y_range {
            for px in x_range.clone() {
                self.put(px as i32, py as i32, color);
            }
        }
    }

    /// Draws a line from `start` to `end` (both `(x, y)`, inclusive).
    /// Endpoints may lie outside the canvas.
    pub fn line(&mut self, start: (i32, i32), end: (i32, i32), color: &[u8], thickness: u32) {
        let (x1, y1) = start;
        let (x2, y2) = end;
        let dx = x2 as i64 - x1 as i64;
        let dy = y2 as i64 - y1 as i64;
        let steps = dx.abs().max(dy.abs());

        if steps == 0 {
            self.stamp(x1, y1, color, thickness);
            return;
        }

        let x_inc = dx as f64 / steps as f64;
        let y_inc = dy as f64 / steps as f64;
        let (mut x, mut y) = (x1 as f64, y1 as f64);
        for _ in 0..=steps {
            self.stamp(
                x.round_ties_even() as i32,
                y.round_ties_even() as i32,
                color,
                thickness,
            );
            x += x_inc;
            y += y_inc;
        }
    }
}
