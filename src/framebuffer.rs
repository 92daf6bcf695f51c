//! Page-addressed monochrome framebuffer for the 128x32 SSD1306 panel.
//!
//! The panel's pixel memory is organized as horizontal pages of 8 rows each;
//! every byte covers one column within a page, LSB at the top. The buffer
//! here mirrors that layout exactly so a page can be streamed to the display
//! with a single DMA transfer and no repacking.
//!
//! The buffer implements [`DrawTarget`] so all text and line drawing goes
//! through embedded-graphics. It is owned exclusively by the display task;
//! nothing else writes to it.

use embedded_graphics::Pixel;
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;

/// Panel width in pixels (one byte column per pixel column).
pub const WIDTH: usize = 128;

/// Panel height in pixels.
pub const HEIGHT: usize = 32;

/// Number of 8-row pages.
pub const PAGES: usize = HEIGHT / 8;

const BUFFER_SIZE: usize = WIDTH * PAGES;

/// In-memory copy of the panel contents, in the panel's own page layout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Framebuffer {
    buf: [u8; BUFFER_SIZE],
}

impl Framebuffer {
    /// Create a blank (all pixels off) framebuffer.
    pub const fn new() -> Self {
        Self {
            buf: [0u8; BUFFER_SIZE],
        }
    }

    /// Turn every pixel off.
    pub fn clear_buffer(&mut self) {
        self.buf.fill(0);
    }

    /// One page as a `WIDTH`-byte column run, ready for a bulk page write.
    ///
    /// # Panics
    /// Panics if `page >= PAGES`.
    pub fn page(&self, page: usize) -> &[u8] {
        &self.buf[page * WIDTH..(page + 1) * WIDTH]
    }

    /// Read back a single pixel. Out-of-bounds coordinates read as off.
    pub fn pixel(&self, x: i32, y: i32) -> bool {
        if x < 0 || x >= WIDTH as i32 || y < 0 || y >= HEIGHT as i32 {
            return false;
        }
        let idx = (y as usize / 8) * WIDTH + x as usize;
        self.buf[idx] & (1 << (y as usize % 8)) != 0
    }

    /// Set a pixel. Out-of-bounds coordinates are silently clipped, which is
    /// what clamps the proportional bar to the panel width.
    #[inline]
    fn set_pixel(&mut self, x: i32, y: i32, on: bool) {
        if x >= 0 && x < WIDTH as i32 && y >= 0 && y < HEIGHT as i32 {
            let idx = (y as usize / 8) * WIDTH + x as usize;
            let bit = 1 << (y as usize % 8);
            if on {
                self.buf[idx] |= bit;
            } else {
                self.buf[idx] &= !bit;
            }
        }
    }
}

impl Default for Framebuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl OriginDimensions for Framebuffer {
    fn size(&self) -> Size {
        Size::new(WIDTH as u32, HEIGHT as u32)
    }
}

impl DrawTarget for Framebuffer {
    type Color = BinaryColor;
    type Error = core::convert::Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            self.set_pixel(point.x, point.y, color.is_on());
        }
        Ok(())
    }
}
