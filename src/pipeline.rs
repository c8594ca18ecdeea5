use anyhow::{Context, Result};
use image::imageops;
use log::{debug, error, info};
use std::{
    sync::atomic::{AtomicBool, Ordering},
    thread,
    time::{Duration, Instant},
};

use crate::{
    camera::FrameSource,
    classifier::ColorClassifier,
    color::{Channel, Color},
    dispatch::Dispatcher,
    sampler::{self, Region, RegionStats, Thresholds},
};

/// Sample, classify and dispatch, once per frame.
pub struct ColorPipeline<Source, D> {
    source: Source,
    dispatcher: D,
    region: Region,
    thresholds: Thresholds,
    classifier: ColorClassifier,
    mirror: bool,
}

/// How the sampling loop is stopped and paced.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub frame_interval: Duration,
    pub max_frames: Option<u64>,
}

impl<Source, D> ColorPipeline<Source, D>
where
    Source: FrameSource,
    D: Dispatcher,
{
    pub fn new(
        source: Source,
        dispatcher: D,
        region: Region,
        thresholds: Thresholds,
        classifier: ColorClassifier,
    ) -> Self {
        ColorPipeline {
            source,
            dispatcher,
            region,
            thresholds,
            classifier,
            mirror: false,
        }
    }

    pub fn with_mirror(mut self, mirror: bool) -> Self {
        self.mirror = mirror;
        self
    }

    pub fn dispatcher(&self) -> &D {
        &self.dispatcher
    }

    /// Processes one frame and returns its classification.
    pub fn run(&mut self) -> Result<Color> {
        let mut frame = self
            .source
            .grab_frame()
            .context("Failed to read frame from camera")?;

        if self.mirror {
            imageops::flip_horizontal_in_place(&mut frame);
        }

        let stats = sampler::sample(&frame, &self.region, &self.thresholds);
        let color = self.classifier.classify(stats.as_ref(), &self.region);

        match &stats {
            Some(stats) => debug!("{} | {}", describe(stats), color),
            None => debug!("Region {:?} is outside the frame", self.region),
        }

        self.dispatcher.apply(color, Instant::now());

        Ok(color)
    }

    /// Runs until `stop` is set, `max_frames` frames were processed, or the
    /// source fails. Shutdown runs in every case.
    pub fn run_until(&mut self, stop: &AtomicBool, options: RunOptions) -> Result<u64> {
        info!("Sampling {:?} from {}", self.region, self.source.name());

        let mut frames = 0;
        let mut last_color = Color::None;

        let outcome = loop {
            if stop.load(Ordering::Relaxed) || options.max_frames.map_or(false, |max| frames >= max) {
                break Ok(frames);
            }

            match self.run() {
                Ok(color) => {
                    if color != last_color {
                        info!("Detected {}", color);
                        last_color = color;
                    }
                }
                Err(err) => {
                    error!("{:#}", err);
                    break Err(err);
                }
            }

            frames += 1;

            if !options.frame_interval.is_zero() {
                thread::sleep(options.frame_interval);
            }
        };

        // A read failure outranks a release failure.
        if let Err(err) = self.shutdown() {
            error!("{:#}", err);
            outcome?;
            return Err(err);
        }

        outcome
    }

    pub fn shutdown(&mut self) -> Result<()> {
        self.dispatcher.shutdown();
        self.source
            .release()
            .with_context(|| format!("Failed to release {}", self.source.name()))
    }
}

fn describe(stats: &RegionStats) -> String {
    Channel::ALL
        .iter()
        .map(|&channel| {
            let channel_stats = stats.channel(channel);
            format!(
                "{}: {:.1} (pixels: {})",
                channel, channel_stats.mean, channel_stats.exceeding
            )
        })
        .collect::<Vec<_>>()
        .join(" | ")
}
