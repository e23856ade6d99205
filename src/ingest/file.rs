//! Local image directory source.
//!
//! `ImageDirSource` replays still images from a local directory as a frame
//! stream:
//! - only `.png`, `.jpg` and `.jpeg` files are read (case-insensitive)
//! - files are visited in lexicographic path order
//! - decoding happens lazily, one file per `next_frame`
//! - a file that fails to decode is logged, counted and skipped
//!
//! The source never fetches remote URLs and never writes to disk.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};

use super::{FrameSource, SourceStats};
use crate::frame::{ChannelOrder, Frame};

const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

pub struct ImageDirSource {
    dir: PathBuf,
    order: ChannelOrder,
    files: Vec<PathBuf>,
    cursor: usize,
    frames_captured: u64,
    frames_skipped: u64,
}

impl ImageDirSource {
    pub fn new(dir: impl AsRef<Path>, order: ChannelOrder) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        if !dir.is_dir() {
            return Err(anyhow!(
                "image source {} is not a directory",
                dir.display()
            ));
        }
        Ok(Self {
            dir,
            order,
            files: Vec::new(),
            cursor: 0,
            frames_captured: 0,
            frames_skipped: 0,
        })
    }

    /// Image files found by `connect`, in replay order.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }
}

impl FrameSource for ImageDirSource {
    fn connect(&mut self) -> Result<()> {
        let entries = std::fs::read_dir(&self.dir)
            .map_err(|e| anyhow!("failed to list {}: {}", self.dir.display(), e))?;
        let mut files = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.is_file() && has_image_extension(&path) {
                files.push(path);
            }
        }
        files.sort();
        log::info!(
            "ImageDirSource: {} image(s) in {}",
            files.len(),
            self.dir.display()
        );
        self.files = files;
        self.cursor = 0;
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        while let Some(path) = self.files.get(self.cursor) {
            self.cursor += 1;
            match image::open(path) {
                Ok(image) => {
                    self.frames_captured += 1;
                    return Ok(Some(Frame::from_dynamic(image).into_order(self.order)));
                }
                Err(e) => {
                    self.frames_skipped += 1;
                    log::warn!("ImageDirSource: skipping {}: {}", path.display(), e);
                }
            }
        }
        Ok(None)
    }

    fn is_healthy(&self) -> bool {
        self.dir.is_dir()
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frames_captured,
            frames_skipped: self.frames_skipped,
            uri: self.dir.display().to_string(),
        }
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}
