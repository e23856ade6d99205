use std::collections::HashMap;

use image::{GrayImage, Luma};
use imageproc::distance_transform::Norm;
use imageproc::morphology::dilate;
use imageproc::region_labelling::{connected_components, Connectivity};
use serde::Serialize;

use super::zones::zone_for_point;

/// One contiguous changed region that survived the area filter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct MotionRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Changed pixels in the (dilated) region.
    pub area: u32,
    pub zone: u8,
}

impl MotionRegion {
    /// Center of the bounding box.
    pub fn center(&self) -> (u32, u32) {
        (self.x + self.width / 2, self.y + self.height / 2)
    }
}

struct RegionAccumulator {
    area: u32,
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
}

/// Absolute per-pixel difference of two equally sized luma planes.
pub(crate) fn absolute_difference(previous: &GrayImage, current: &GrayImage) -> GrayImage {
    GrayImage::from_fn(current.width(), current.height(), |x, y| {
        let a = previous.get_pixel(x, y)[0];
        let b = current.get_pixel(x, y)[0];
        Luma([a.abs_diff(b)])
    })
}

/// Binarize `delta` at `> threshold`, grow the mask by `dilate_radius`, label
/// 8-connected regions and keep those with at least `min_area` pixels.
///
/// Regions come back sorted top-to-bottom, left-to-right.
pub(crate) fn changed_regions(
    delta: &GrayImage,
    threshold: u8,
    min_area: u32,
    dilate_radius: u8,
) -> Vec<MotionRegion> {
    let (width, height) = delta.dimensions();
    let mut mask = GrayImage::from_fn(width, height, |x, y| {
        if delta.get_pixel(x, y)[0] > threshold {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    });
    if dilate_radius > 0 {
        mask = dilate(&mask, Norm::LInf, dilate_radius);
    }

    let labels = connected_components(&mask, Connectivity::Eight, Luma([0u8]));

    let mut by_label: HashMap<u32, RegionAccumulator> = HashMap::new();
    for (x, y, label) in labels.enumerate_pixels() {
        let label = label[0];
        if label == 0 {
            continue;
        }
        by_label
            .entry(label)
            .and_modify(|acc| {
                acc.area += 1;
                acc.min_x = acc.min_x.min(x);
                acc.min_y = acc.min_y.min(y);
                acc.max_x = acc.max_x.max(x);
                acc.max_y = acc.max_y.max(y);
            })
            .or_insert(RegionAccumulator {
                area: 1,
                min_x: x,
                min_y: y,
                max_x: x,
                max_y: y,
            });
    }

    let mut regions: Vec<MotionRegion> = by_label
        .into_values()
        .filter(|acc| acc.area >= min_area)
        .map(|acc| {
            let region_w = acc.max_x - acc.min_x + 1;
            let region_h = acc.max_y - acc.min_y + 1;
            let cx = acc.min_x + region_w / 2;
            let cy = acc.min_y + region_h / 2;
            MotionRegion {
                x: acc.min_x,
                y: acc.min_y,
                width: region_w,
                height: region_h,
                area: acc.area,
                zone: zone_for_point(cx, cy, width, height),
            }
        })
        .collect();
    regions.sort_by_key(|r| (r.y, r.x));
    regions
}
