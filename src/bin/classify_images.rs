use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use color_signal::{classifier::ColorClassifier, config::Config, sampler};
use image::imageops;

/// Runs the region sampler and classifier over still images.
#[derive(Debug, Parser)]
#[command(about)]
struct Args {
    #[arg(long, default_value = "config.json")]
    config: PathBuf,

    #[arg(required = true)]
    image_paths: Vec<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    let config = Config::load(&args.config)?;
    let classifier: ColorClassifier = config.detection.classifier();

    println!(
        "region {:?}, at least {:.0} pixels per color",
        config.region,
        classifier.min_required_pixels(&config.region)
    );

    for path in args.image_paths {
        let mut frame = image::open(&path)
            .with_context(|| format!("reading {} from disk", path.display()))?
            .to_rgb8();

        if config.camera.mirror {
            imageops::flip_horizontal_in_place(&mut frame);
        }

        let stats = sampler::sample(&frame, &config.region, &config.detection.thresholds);
        let color = classifier.classify(stats.as_ref(), &config.region);

        match stats {
            Some(stats) => println!(
                "{}: {} (means {:.1}/{:.1}/{:.1}, counts {}/{}/{})",
                path.display(),
                color,
                stats.channels[0].mean,
                stats.channels[1].mean,
                stats.channels[2].mean,
                stats.channels[0].exceeding,
                stats.channels[1].exceeding,
                stats.channels[2].exceeding,
            ),
            None => println!("{}: {} (region outside image)", path.display(), color),
        }
    }

    Ok(())
}
