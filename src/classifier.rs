use crate::{
    color::{Channel, Color},
    sampler::{Region, RegionStats},
};

/// Picks the dominant color of a sampled region.
///
/// Channels are tried in the order red, green, blue and the first one that
/// qualifies wins, so red is reported if red and green both qualify.
pub fn classify(stats: &RegionStats, min_required_pixels: f64, min_color_distance: Option<f64>) -> Color {
    pick(|channel| is_dominant(stats, channel, min_required_pixels, min_color_distance))
}

/// First channel, in priority order, accepted by `qualifies`.
fn pick<F>(mut qualifies: F) -> Color
where
    F: FnMut(Channel) -> bool,
{
    Channel::ALL
        .iter()
        .copied()
        .find(|&channel| qualifies(channel))
        .map(Color::from)
        .unwrap_or(Color::None)
}

fn is_dominant(
    stats: &RegionStats,
    channel: Channel,
    min_required_pixels: f64,
    min_color_distance: Option<f64>,
) -> bool {
    if stats.exceeding(channel) as f64 <= min_required_pixels {
        return false;
    }

    let mean = stats.mean(channel);

    channel.others().iter().all(|&other| {
        let other_mean = stats.mean(other);
        let separated = match min_color_distance {
            Some(distance) => (mean - other_mean).abs() > distance,
            None => true,
        };

        mean > other_mean && separated
    })
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorClassifier {
    min_area_percent: f64,
    min_color_distance: Option<f64>,
}

impl ColorClassifier {
    pub fn new(min_area_percent: f64, min_color_distance: Option<f64>) -> Self {
        ColorClassifier {
            min_area_percent,
            min_color_distance,
        }
    }

    /// Pixel count a channel must exceed, as a share of the configured region.
    pub fn min_required_pixels(&self, region: &Region) -> f64 {
        region.area() as f64 * self.min_area_percent / 100.
    }

    /// `None` stats (an empty region) classify as [`Color::None`].
    pub fn classify(&self, stats: Option<&RegionStats>, region: &Region) -> Color {
        match stats {
            Some(stats) => classify(stats, self.min_required_pixels(region), self.min_color_distance),
            None => Color::None,
        }
    }
}
