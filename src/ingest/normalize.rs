use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::frame::{ChannelOrder, Frame};

/// Raw buffer layouts accepted from capture backends.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    #[default]
    Rgb24,
    Bgr24,
    Nv12,
}

/// Wrap or convert a raw buffer into a `Frame`.
///
/// Packed formats keep their channel order; NV12 is converted to RGB.
pub fn normalize_to_frame(
    pixels: &[u8],
    width: u32,
    height: u32,
    format: PixelFormat,
) -> Result<Frame> {
    let frame = match format {
        PixelFormat::Rgb24 => Frame::from_raw(width, height, ChannelOrder::Rgb, pixels.to_vec())?,
        PixelFormat::Bgr24 => Frame::from_raw(width, height, ChannelOrder::Bgr, pixels.to_vec())?,
        PixelFormat::Nv12 => Frame::from_raw(
            width,
            height,
            ChannelOrder::Rgb,
            nv12_to_rgb(pixels, width, height)?,
        )?,
    };
    Ok(frame)
}

fn nv12_to_rgb(pixels: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let w = width as usize;
    let h = height as usize;
    if w % 2 != 0 || h % 2 != 0 {
        return Err(anyhow!("NV12 frame dimensions must be even, got {}x{}", w, h));
    }
    let y_plane = w
        .checked_mul(h)
        .ok_or_else(|| anyhow!("NV12 frame dimensions overflow"))?;
    let expected = y_plane
        .checked_add(y_plane / 2)
        .ok_or_else(|| anyhow!("NV12 frame dimensions overflow"))?;
    if pixels.len() != expected {
        return Err(anyhow!(
            "NV12 frame length mismatch: expected {}, got {}",
            expected,
            pixels.len()
        ));
    }

    let mut rgb = vec![0u8; y_plane * 3];
    for j in 0..h {
        for i in 0..w {
            let y = pixels[j * w + i] as f32;
            let uv_index = y_plane + (j / 2) * w + (i / 2) * 2;
            let u = pixels[uv_index] as f32 - 128.0;
            let v = pixels[uv_index + 1] as f32 - 128.0;

            let r = y + 1.402_f32 * v;
            let g = y - 0.344_136_f32 * u - 0.714_136_f32 * v;
            let b = y + 1.772_f32 * u;

            let offset = (j * w + i) * 3;
            rgb[offset] = clamp_to_u8(r);
            rgb[offset + 1] = clamp_to_u8(g);
            rgb[offset + 2] = clamp_to_u8(b);
        }
    }

    Ok(rgb)
}

fn clamp_to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nv12_neutral_chroma_is_gray() -> Result<()> {
        let nv12 = [vec![128u8; 4], vec![128u8; 2]].concat();
        let frame = normalize_to_frame(&nv12, 2, 2, PixelFormat::Nv12)?;
        assert_eq!(frame.order(), ChannelOrder::Rgb);
        assert!(frame.pixels().pixels().all(|p| p.0 == [128, 128, 128]));
        Ok(())
    }

    #[test]
    fn bgr_keeps_storage_order() -> Result<()> {
        let frame = normalize_to_frame(&[1, 2, 3], 1, 1, PixelFormat::Bgr24)?;
        assert_eq!(frame.order(), ChannelOrder::Bgr);
        assert_eq!(frame.pixels().get_pixel(0, 0).0, [1, 2, 3]);
        assert_eq!(frame.to_rgb().get_pixel(0, 0).0, [3, 2, 1]);
        Ok(())
    }

    #[test]
    fn length_mismatch_is_an_error() {
        assert!(normalize_to_frame(&[0u8; 8], 1, 3, PixelFormat::Rgb24).is_err());
        assert!(normalize_to_frame(&[0u8; 5], 2, 2, PixelFormat::Nv12).is_err());
        assert!(normalize_to_frame(&[0u8; 9], 3, 2, PixelFormat::Nv12).is_err());
    }
}
