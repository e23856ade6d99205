//! Synthetic frame source (`stub://`) for tests and demos.
//!
//! The scene is a dark background with a bright square sweeping left to
//! right. Every `scene_period` frames the background level flips, which the
//! analyzer sees as whole-frame motion. Optional uniform sensor noise comes
//! from a seeded RNG so runs are reproducible.

use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::normalize::{normalize_to_frame, PixelFormat};
use super::{FrameSource, SourceStats};
use crate::frame::{ChannelOrder, Frame};

const BACKGROUND_LEVELS: [u8; 2] = [30, 90];
const SQUARE_LEVEL: u8 = 230;

#[derive(Clone, Debug)]
pub struct SyntheticConfig {
    pub uri: String,
    pub width: u32,
    pub height: u32,
    pub order: ChannelOrder,
    /// Layout the frames are generated in before normalization.
    pub format: PixelFormat,
    pub square_size: u32,
    /// Pixels the square advances per frame.
    pub square_step: u32,
    /// Frames between background flips; 0 disables flipping.
    pub scene_period: u64,
    /// Max absolute noise added per pixel.
    pub noise: u8,
    pub seed: u64,
    /// Stop after this many frames.
    pub max_frames: Option<u64>,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            uri: "stub://camera".to_string(),
            width: 640,
            height: 480,
            order: ChannelOrder::Rgb,
            format: PixelFormat::Rgb24,
            square_size: 48,
            square_step: 8,
            scene_period: 50,
            noise: 0,
            seed: 7,
            max_frames: None,
        }
    }
}

pub struct SyntheticSource {
    config: SyntheticConfig,
    rng: StdRng,
    frame_count: u64,
    scene_state: usize,
}

impl SyntheticSource {
    pub fn new(config: SyntheticConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            config,
            rng,
            frame_count: 0,
            scene_state: 0,
        }
    }

    /// Top-left corner of the square in the next frame.
    fn square_origin(&self) -> (u32, u32) {
        let span = self
            .config
            .width
            .saturating_sub(self.config.square_size)
            .max(1);
        let travel = self.frame_count.saturating_mul(self.config.square_step as u64);
        let x = (travel % span as u64) as u32;
        let y = self.config.height.saturating_sub(self.config.square_size) / 2;
        (x, y)
    }

    fn generate_levels(&mut self) -> Vec<u8> {
        let SyntheticConfig {
            width,
            height,
            square_size,
            noise,
            ..
        } = self.config;
        let background = BACKGROUND_LEVELS[self.scene_state % BACKGROUND_LEVELS.len()];
        let (sx, sy) = self.square_origin();
        let mut levels = Vec::with_capacity((width * height) as usize);
        for y in 0..height {
            for x in 0..width {
                let inside = x >= sx && x < sx + square_size && y >= sy && y < sy + square_size;
                let base = if inside { SQUARE_LEVEL } else { background };
                let level = if noise > 0 {
                    let jitter = self.rng.gen_range(-(noise as i16)..=noise as i16);
                    (base as i16 + jitter).clamp(0, 255) as u8
                } else {
                    base
                };
                levels.push(level);
            }
        }
        levels
    }

    fn encode(&self, levels: &[u8]) -> Vec<u8> {
        match self.config.format {
            PixelFormat::Rgb24 | PixelFormat::Bgr24 => {
                levels.iter().flat_map(|&l| [l, l, l]).collect()
            }
            PixelFormat::Nv12 => {
                let chroma = levels.len() / 2;
                let mut out = Vec::with_capacity(levels.len() + chroma);
                out.extend_from_slice(levels);
                out.resize(levels.len() + chroma, 128);
                out
            }
        }
    }
}

impl FrameSource for SyntheticSource {
    fn connect(&mut self) -> Result<()> {
        log::info!(
            "SyntheticSource: connected to {} ({}x{})",
            self.config.uri,
            self.config.width,
            self.config.height
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self
            .config
            .max_frames
            .is_some_and(|max| self.frame_count >= max)
        {
            return Ok(None);
        }
        if self.config.scene_period > 0
            && self.frame_count > 0
            && self.frame_count % self.config.scene_period == 0
        {
            self.scene_state += 1;
        }
        let levels = self.generate_levels();
        let raw = self.encode(&levels);
        self.frame_count += 1;
        let frame = normalize_to_frame(&raw, self.config.width, self.config.height, self.config.format)?;
        // Gray scenes look the same in either order; only the tag changes.
        Ok(Some(frame.into_order(self.config.order)))
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            frames_skipped: 0,
            uri: self.config.uri.clone(),
        }
    }
}
