//! Frame containers.
//!
//! - `Frame`: owned 8-bit, three-channel raster with an explicit channel order.
//! - `ChannelOrder`: RGB or BGR, as delivered by the frame source.
//! - `FrameFault`: why a frame could not be analyzed.
//!
//! The motion analyzer only ever looks at the luma projection of a frame;
//! the color planes are kept so that annotations can be drawn on a copy.

use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Order of the three color channels in each pixel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelOrder {
    #[default]
    Rgb,
    Bgr,
}

impl ChannelOrder {
    /// Encode an RGB color into this channel order.
    pub fn encode(self, rgb: [u8; 3]) -> Rgb<u8> {
        match self {
            ChannelOrder::Rgb => Rgb(rgb),
            ChannelOrder::Bgr => Rgb([rgb[2], rgb[1], rgb[0]]),
        }
    }

    /// Decode a stored pixel back into RGB order.
    pub fn decode(self, pixel: Rgb<u8>) -> [u8; 3] {
        let [a, b, c] = pixel.0;
        match self {
            ChannelOrder::Rgb => [a, b, c],
            ChannelOrder::Bgr => [c, b, a],
        }
    }
}

/// Reasons a frame is skipped by the analyzer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FrameFault {
    /// Zero width or zero height.
    Empty { width: u32, height: u32 },
    /// Buffer length does not match `width * height * 3`.
    ShapeMismatch { expected: usize, actual: usize },
    /// `width * height * 3` does not fit in memory arithmetic.
    DimensionsOverflow { width: u32, height: u32 },
    /// Resolution differs from the previous frame of the same stream.
    ResolutionChanged {
        previous: (u32, u32),
        current: (u32, u32),
    },
}

impl fmt::Display for FrameFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameFault::Empty { width, height } => {
                write!(f, "empty frame ({}x{})", width, height)
            }
            FrameFault::ShapeMismatch { expected, actual } => write!(
                f,
                "frame buffer length mismatch: expected {}, got {}",
                expected, actual
            ),
            FrameFault::DimensionsOverflow { width, height } => {
                write!(f, "frame dimensions overflow ({}x{})", width, height)
            }
            FrameFault::ResolutionChanged { previous, current } => write!(
                f,
                "frame resolution changed from {}x{} to {}x{}",
                previous.0, previous.1, current.0, current.1
            ),
        }
    }
}

impl std::error::Error for FrameFault {}

/// Owned raster frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    pixels: RgbImage,
    order: ChannelOrder,
}

impl Frame {
    /// Wrap a packed `width * height * 3` byte buffer.
    pub fn from_raw(
        width: u32,
        height: u32,
        order: ChannelOrder,
        data: Vec<u8>,
    ) -> Result<Self, FrameFault> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or(FrameFault::DimensionsOverflow { width, height })?;
        let actual = data.len();
        if actual != expected {
            return Err(FrameFault::ShapeMismatch { expected, actual });
        }
        let pixels = RgbImage::from_raw(width, height, data)
            .ok_or(FrameFault::ShapeMismatch { expected, actual })?;
        Ok(Self { pixels, order })
    }

    pub fn from_rgb(pixels: RgbImage) -> Self {
        Self {
            pixels,
            order: ChannelOrder::Rgb,
        }
    }

    /// Wrap a decoded image; alpha is dropped.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self::from_rgb(image.into_rgb8())
    }

    /// The same picture re-stored in `order`.
    pub fn into_order(self, order: ChannelOrder) -> Self {
        if self.order == order {
            return self;
        }
        let mut pixels = self.pixels;
        for px in pixels.pixels_mut() {
            px.0.swap(0, 2);
        }
        Self { pixels, order }
    }

    /// Frame filled with one RGB color.
    pub fn filled(width: u32, height: u32, order: ChannelOrder, rgb: [u8; 3]) -> Self {
        Self {
            pixels: RgbImage::from_pixel(width, height, order.encode(rgb)),
            order,
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    pub fn order(&self) -> ChannelOrder {
        self.order
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Pixels in the frame's own channel order.
    pub fn pixels(&self) -> &RgbImage {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut RgbImage {
        &mut self.pixels
    }

    /// Set one pixel from an RGB color, honoring the channel order.
    pub fn put_rgb(&mut self, x: u32, y: u32, rgb: [u8; 3]) {
        let px = self.order.encode(rgb);
        self.pixels.put_pixel(x, y, px);
    }

    /// Fill an axis-aligned rectangle (clipped to the frame) with an RGB color.
    pub fn fill_rect(&mut self, x: u32, y: u32, width: u32, height: u32, rgb: [u8; 3]) {
        let x_end = x.saturating_add(width).min(self.width());
        let y_end = y.saturating_add(height).min(self.height());
        for py in y.min(y_end)..y_end {
            for px in x.min(x_end)..x_end {
                self.put_rgb(px, py, rgb);
            }
        }
    }

    /// Copy of the pixels in RGB order.
    pub fn to_rgb(&self) -> RgbImage {
        match self.order {
            ChannelOrder::Rgb => self.pixels.clone(),
            ChannelOrder::Bgr => {
                let mut out = self.pixels.clone();
                for px in out.pixels_mut() {
                    px.0.swap(0, 2);
                }
                out
            }
        }
    }

    /// Rec.601 luma projection (0.299 R + 0.587 G + 0.114 B), rounded.
    pub fn luma(&self) -> GrayImage {
        let order = self.order;
        GrayImage::from_fn(self.width(), self.height(), |x, y| {
            let [r, g, b] = order.decode(*self.pixels.get_pixel(x, y));
            let weighted = 299 * r as u32 + 587 * g as u32 + 114 * b as u32;
            Luma([((weighted + 500) / 1000) as u8])
        })
    }
}
