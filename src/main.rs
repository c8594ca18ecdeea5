use anyhow::Result;
use clap::{Parser, ValueEnum};
use color_signal::{
    camera::{FrameSource, ImageDirectory, SyntheticSource},
    config::{Config, PolicyConfig},
    control::{ControlClient, HttpSink, LogSink},
    dispatch::{CommandSink, Dispatcher, PerChannelDispatcher, TwoBitDispatcher},
    pipeline::{ColorPipeline, RunOptions},
};
use log::info;
use std::{
    io::{self, BufRead},
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SourceKind {
    Camera,
    Images,
    Synthetic,
}

/// Watches a region of a video feed and drives output pins from its color.
#[derive(Debug, Parser)]
#[command(about)]
struct Args {
    /// JSON configuration file
    #[arg(long, default_value = "config.json")]
    config: PathBuf,

    #[arg(long, value_enum, default_value_t = SourceKind::Camera)]
    source: SourceKind,

    /// Directory of frames for `--source images`
    #[arg(long, required_if_eq("source", "images"))]
    images: Option<PathBuf>,

    /// Stop after this many frames
    #[arg(long)]
    max_frames: Option<u64>,

    /// Log commands instead of sending them
    #[arg(long)]
    dry_run: bool,
}

fn open_source(args: &Args, config: &Config) -> Result<Box<dyn FrameSource>> {
    Ok(match args.source {
        SourceKind::Camera => open_camera(config.camera.index)?,
        SourceKind::Images => match &args.images {
            Some(dir) => Box::new(ImageDirectory::open(dir)?),
            None => anyhow::bail!("--images is required for the images source"),
        },
        SourceKind::Synthetic => Box::new(SyntheticSource::new(640, 480, 50)),
    })
}

#[cfg(feature = "opencv")]
fn open_camera(index: i32) -> Result<Box<dyn FrameSource>> {
    Ok(Box::new(color_signal::camera::OpenCvCamera::new(index)?))
}

#[cfg(not(feature = "opencv"))]
fn open_camera(_index: i32) -> Result<Box<dyn FrameSource>> {
    anyhow::bail!("Camera support requires building with the `opencv` feature")
}

fn make_dispatcher(sink: Box<dyn CommandSink>, policy: &PolicyConfig) -> Box<dyn Dispatcher> {
    match policy {
        PolicyConfig::TwoBit(addresses) => Box::new(TwoBitDispatcher::new(sink, addresses.clone())),
        PolicyConfig::PerChannel(policy) => Box::new(PerChannelDispatcher::new(
            sink,
            policy.addresses.clone(),
            policy.deactivate_delay(),
        )),
    }
}

/// Sets the returned flag once a line is read from stdin.
fn stop_on_enter() -> Arc<AtomicBool> {
    let stop = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&stop);

    thread::spawn(move || {
        let mut line = String::new();
        // EOF means there is no operator, not a stop request.
        if let Ok(n) = io::stdin().lock().read_line(&mut line) {
            if n > 0 {
                flag.store(true, Ordering::Relaxed);
            }
        }
    });

    stop
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = Config::load(&args.config)?;

    let sink: Box<dyn CommandSink> = if args.dry_run {
        Box::new(LogSink)
    } else {
        Box::new(HttpSink::new(ControlClient::connect(&config.api)?))
    };

    let source = open_source(&args, &config)?;
    let dispatcher = make_dispatcher(sink, &config.policy);

    let mut pipeline = ColorPipeline::new(
        source,
        dispatcher,
        config.region,
        config.detection.thresholds,
        config.detection.classifier(),
    )
    .with_mirror(config.camera.mirror);

    info!("Press Enter to stop.");
    let stop = stop_on_enter();

    let frames = pipeline.run_until(
        &stop,
        RunOptions {
            frame_interval: config.camera.frame_interval(),
            max_frames: args.max_frames,
        },
    )?;

    info!("Stopped after {} frames", frames);

    Ok(())
}
