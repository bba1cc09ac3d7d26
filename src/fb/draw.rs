//! Drawing primitives for calibration patterns
//!
//! Shapes are clipped to the visible area, so partially off-screen shapes
//! draw their visible part and never fail on bounds.

use super::device::FramebufferDevice;
use crate::constants::CONTRAST_BRIGHTNESS_LEVELS;
use crate::error::Result;

/// Pack an sRGB colour (0-255 per component) as 32-bit XRGB
pub fn colour(red: u8, green: u8, blue: u8) -> u32 {
    (red as u32) << 16 | (green as u32) << 8 | blue as u32
}

impl FramebufferDevice {
    /// Fill a rectangle with `colour`
    pub fn fill_rectangle(
        &mut self,
        colour: u32,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> Result<()> {
        let x_end = x.saturating_add(width).min(self.width());
        let y_end = y.saturating_add(height).min(self.height());
        for py in y..y_end {
            for px in x..x_end {
                self.write_pixel(px, py, colour)?;
            }
        }
        Ok(())
    }

    /// Draw a horizontal line segment of `length` pixels starting at (x, y)
    pub fn draw_horizontal_line(&mut self, colour: u32, x: u32, y: u32, length: u32) -> Result<()> {
        self.fill_rectangle(colour, x, y, length, 1)
    }

    /// Draw a vertical line segment of `length` pixels starting at (x, y)
    pub fn draw_vertical_line(&mut self, colour: u32, x: u32, y: u32, length: u32) -> Result<()> {
        self.fill_rectangle(colour, x, y, 1, length)
    }

    /// Paint the contrast/brightness pattern over the whole screen
    ///
    /// Four bands (grey, red, green, blue) top to bottom, each split into
    /// one bar per level, darkest on the left. Bar and band edges are
    /// proportional, so the bars tile the screen exactly.
    pub fn draw_level_bars(&mut self) -> Result<()> {
        let (width, height) = (self.width(), self.height());
        let bands: [fn(u8) -> u32; 4] = [
            |l| colour(l, l, l),
            |l| colour(l, 0, 0),
            |l| colour(0, l, 0),
            |l| colour(0, 0, l),
        ];
        let levels = CONTRAST_BRIGHTNESS_LEVELS.len();

        for (row, band) in bands.iter().enumerate() {
            let y0 = edge(row, bands.len(), height);
            let y1 = edge(row + 1, bands.len(), height);
            for (column, &level) in CONTRAST_BRIGHTNESS_LEVELS.iter().enumerate() {
                let x0 = edge(column, levels, width);
                let x1 = edge(column + 1, levels, width);
                self.fill_rectangle(band(level), x0, y0, x1 - x0, y1 - y0)?;
            }
        }
        Ok(())
    }
}

/// Start of division `i` when `total` pixels are split into `parts`
fn edge(i: usize, parts: usize, total: u32) -> u32 {
    (i as u64 * total as u64 / parts as u64) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fb::device::tests::scratch_framebuffer;

    #[test]
    fn test_colour() {
        assert_eq!(colour(0xFF, 0x80, 0x01), 0x00FF_8001);
        assert_eq!(colour(0, 0, 0), 0);
    }

    #[test]
    fn test_fill_rectangle() {
        let mut fb = scratch_framebuffer("rect", 6, 5);
        fb.fill_rectangle(7, 1, 1, 3, 2).unwrap();
        for y in 0..5 {
            for x in 0..6 {
                let inside = (1..4).contains(&x) && (1..3).contains(&y);
                assert_eq!(fb.read_pixel(x, y), Some(if inside { 7 } else { 0 }));
            }
        }
    }

    #[test]
    fn test_fill_rectangle_clips() {
        let mut fb = scratch_framebuffer("clip", 4, 4);
        fb.fill_rectangle(9, 2, 2, 100, u32::MAX).unwrap();
        assert_eq!(fb.read_pixel(3, 3), Some(9));
        assert_eq!(fb.read_pixel(1, 3), Some(0));
        fb.fill_rectangle(9, 10, 10, 2, 2).unwrap();
    }

    #[test]
    fn test_lines() {
        let mut fb = scratch_framebuffer("lines", 5, 5);
        fb.draw_horizontal_line(1, 0, 2, 5).unwrap();
        fb.draw_vertical_line(2, 4, 0, 5).unwrap();
        assert_eq!(fb.read_pixel(0, 2), Some(1));
        assert_eq!(fb.read_pixel(3, 2), Some(1));
        assert_eq!(fb.read_pixel(4, 2), Some(2));
        assert_eq!(fb.read_pixel(4, 0), Some(2));
        assert_eq!(fb.read_pixel(0, 0), Some(0));
    }

    #[test]
    fn test_level_bars_cover_screen() {
        // 62 is not a multiple of 21, 7 is not a multiple of 4
        let mut fb = scratch_framebuffer("bars", 62, 7);
        fb.draw_level_bars().unwrap();
        // Grey band rows 0..1, first bar 0..2
        assert_eq!(fb.read_pixel(0, 0), Some(0));
        assert_eq!(fb.read_pixel(3, 0), Some(colour(17, 17, 17)));
        // Last bar reaches the right edge
        assert_eq!(fb.read_pixel(61, 0), Some(colour(255, 255, 255)));
        assert_eq!(fb.read_pixel(59, 2), Some(colour(255, 0, 0)));
        assert_eq!(fb.read_pixel(58, 2), Some(colour(241, 0, 0)));
        assert_eq!(fb.read_pixel(2, 4), Some(colour(0, 17, 0)));
        // Blue band reaches the bottom edge
        assert_eq!(fb.read_pixel(3, 6), Some(colour(0, 0, 17)));
        assert_eq!(fb.read_pixel(61, 6), Some(colour(0, 0, 255)));
    }

    #[test]
    fn test_edge() {
        assert_eq!(edge(0, 21, 62), 0);
        assert_eq!(edge(1, 21, 62), 2);
        assert_eq!(edge(21, 21, 62), 62);
        assert_eq!(edge(4, 4, u32::MAX), u32::MAX);
    }
}
