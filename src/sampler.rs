use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::color::Channel;

/// Rectangle of the frame that is examined for color content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Default for Region {
    fn default() -> Self {
        Region {
            x: 130,
            y: 365,
            width: 80,
            height: 80,
        }
    }
}

/// Pixel bounds of a region after clipping, as half-open ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl Bounds {
    pub fn area(&self) -> u64 {
        u64::from(self.x1 - self.x0) * u64::from(self.y1 - self.y0)
    }
}

impl Region {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Region {
            x,
            y,
            width,
            height,
        }
    }

    /// Area as configured, before any clipping. Negative sizes count as zero.
    pub fn area(&self) -> u64 {
        let width = i64::from(self.width).max(0) as u64;
        let height = i64::from(self.height).max(0) as u64;
        width * height
    }

    /// Clips the region to a `frame_width` x `frame_height` frame. Returns
    /// `None` when nothing of the region is left.
    pub fn clip(&self, frame_width: u32, frame_height: u32) -> Option<Bounds> {
        // i64 so that x + width can never overflow
        let x0 = i64::from(self.x).max(0);
        let y0 = i64::from(self.y).max(0);
        let x1 = (i64::from(self.x) + i64::from(self.width)).min(i64::from(frame_width));
        let y1 = (i64::from(self.y) + i64::from(self.height)).min(i64::from(frame_height));

        if x1 <= x0 || y1 <= y0 {
            return None;
        }

        Some(Bounds {
            x0: x0 as u32,
            y0: y0 as u32,
            x1: x1 as u32,
            y1: y1 as u32,
        })
    }
}

/// Per-channel cutoffs; a pixel counts for a channel when its value is
/// strictly greater than the cutoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Thresholds {
    pub fn uniform(threshold: u8) -> Self {
        Thresholds {
            red: threshold,
            green: threshold,
            blue: threshold,
        }
    }

    pub fn get(&self, channel: Channel) -> u8 {
        match channel {
            Channel::Red => self.red,
            Channel::Green => self.green,
            Channel::Blue => self.blue,
        }
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Thresholds::uniform(100)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ChannelStats {
    pub mean: f64,
    pub exceeding: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionStats {
    pub channels: [ChannelStats; 3],
    pub pixels: u64,
}

impl RegionStats {
    pub fn channel(&self, channel: Channel) -> &ChannelStats {
        &self.channels[channel.index()]
    }

    pub fn mean(&self, channel: Channel) -> f64 {
        self.channel(channel).mean
    }

    pub fn exceeding(&self, channel: Channel) -> u64 {
        self.channel(channel).exceeding
    }
}

/// Computes per-channel means and threshold counts over `region` of `frame`.
///
/// Returns `None` when the region clips to nothing; callers treat that frame
/// as having no color.
pub fn sample(frame: &RgbImage, region: &Region, thresholds: &Thresholds) -> Option<RegionStats> {
    let bounds = region.clip(frame.width(), frame.height())?;

    let cutoffs = [thresholds.red, thresholds.green, thresholds.blue];
    let mut sums = [0u64; 3];
    let mut counts = [0u64; 3];

    for y in bounds.y0..bounds.y1 {
        for x in bounds.x0..bounds.x1 {
            let pixel = frame.get_pixel(x, y);

            for (idx, &value) in pixel.0.iter().enumerate() {
                sums[idx] += u64::from(value);
                if value > cutoffs[idx] {
                    counts[idx] += 1;
                }
            }
        }
    }

    let pixels = bounds.area();
    let mut channels = [ChannelStats::default(); 3];

    for idx in 0..3 {
        channels[idx] = ChannelStats {
            mean: sums[idx] as f64 / pixels as f64,
            exceeding: counts[idx],
        };
    }

    Some(RegionStats { channels, pixels })
}
