//! Frame ingestion sources.
//!
//! This module provides sources for frames:
//! - Image directories (`.png`, `.jpg`, `.jpeg`, replayed in name order)
//! - Synthetic scenes (`stub://` URIs, for tests and demos)
//!
//! Every source yields `Frame`s that feed a `SecurityMonitor` through
//! `FrameLoop`. Network sources are out of scope; URIs with any other scheme
//! are rejected.

mod file;
mod frame_loop;
mod normalize;
mod synthetic;

use anyhow::{anyhow, Result};

use crate::frame::{ChannelOrder, Frame};

pub use file::ImageDirSource;
pub use frame_loop::{FrameLoop, LoopStats, PauseSwitch, Step};
pub use normalize::{normalize_to_frame, PixelFormat};
pub use synthetic::{SyntheticConfig, SyntheticSource};

/// A stream of frames from one camera-like source.
pub trait FrameSource: Send {
    /// Prepare the source. Called once before the first frame.
    fn connect(&mut self) -> Result<()>;

    /// Next frame, or `None` once the source is exhausted.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    fn is_healthy(&self) -> bool {
        true
    }

    fn stats(&self) -> SourceStats;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceStats {
    pub frames_captured: u64,
    /// Inputs the source could not decode and skipped.
    pub frames_skipped: u64,
    pub uri: String,
}

/// Build a source from a configured URI.
///
/// `stub://<name>` yields a synthetic scene; a plain path must be a directory
/// of images.
pub fn open_source(uri: &str, order: ChannelOrder) -> Result<Box<dyn FrameSource>> {
    let uri = uri.trim();
    if uri.is_empty() {
        return Err(anyhow!("frame source URI is empty"));
    }
    if uri.starts_with("stub://") {
        let config = SyntheticConfig {
            uri: uri.to_string(),
            order,
            ..SyntheticConfig::default()
        };
        return Ok(Box::new(SyntheticSource::new(config)));
    }
    if uri.contains("://") {
        return Err(anyhow!(
            "unsupported frame source '{}': only local image directories and stub:// are supported",
            uri
        ));
    }
    Ok(Box::new(ImageDirSource::new(uri, order)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_uri_opens_synthetic_source() {
        let mut source = open_source("stub://camera", ChannelOrder::Rgb).unwrap();
        source.connect().unwrap();
        assert!(source.next_frame().unwrap().is_some());
        assert_eq!(source.stats().uri, "stub://camera");
    }

    #[test]
    fn network_uris_are_rejected() {
        assert!(open_source("rtsp://cam/1", ChannelOrder::Rgb).is_err());
        assert!(open_source("   ", ChannelOrder::Rgb).is_err());
    }
}
