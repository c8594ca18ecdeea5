use std::{
    cell::RefCell,
    collections::VecDeque,
    rc::Rc,
    sync::atomic::AtomicBool,
    time::Duration,
};

use anyhow::{anyhow, Result};
use image::{Rgb, RgbImage};

use color_signal::{
    camera::FrameSource,
    classifier::ColorClassifier,
    color::Color,
    dispatch::{
        ChannelAddresses, CommandSink, OutboundCommand, PerChannelDispatcher, TwoBitAddresses,
        TwoBitDispatcher,
    },
    pipeline::{ColorPipeline, RunOptions},
    sampler::{Region, Thresholds},
};

#[derive(Debug, Clone, PartialEq)]
enum Sent {
    Now(OutboundCommand),
    Later(OutboundCommand, Duration),
}

#[derive(Clone, Default)]
struct SharedSink(Rc<RefCell<Vec<Sent>>>);

impl CommandSink for SharedSink {
    fn send(&self, command: OutboundCommand) {
        self.0.borrow_mut().push(Sent::Now(command));
    }

    fn send_after(&self, command: OutboundCommand, delay: Duration) {
        self.0.borrow_mut().push(Sent::Later(command, delay));
    }
}

struct Frames(VecDeque<RgbImage>);

impl FrameSource for Frames {
    fn grab_frame(&mut self) -> Result<RgbImage> {
        self.0.pop_front().ok_or_else(|| anyhow!("end of stream"))
    }

    fn name(&self) -> String {
        "scripted frames".to_string()
    }
}

const REGION: Region = Region {
    x: 5,
    y: 5,
    width: 30,
    height: 20,
};

/// 550 region pixels at (210, 50, 40) and 50 at (90, 50, 40): red mean 200,
/// green mean 50, blue mean 40, 550 red pixels over the threshold.
fn mostly_red() -> RgbImage {
    RgbImage::from_fn(40, 30, |x, y| {
        if !((5..35).contains(&x) && (5..25).contains(&y)) {
            return Rgb([0, 0, 0]);
        }

        let index = (y - 5) * 30 + (x - 5);
        if index < 50 {
            Rgb([90, 50, 40])
        } else {
            Rgb([210, 50, 40])
        }
    })
}

fn solid(rgb: [u8; 3]) -> RgbImage {
    RgbImage::from_pixel(40, 30, Rgb(rgb))
}

fn now(address: &str, value: i32) -> Sent {
    Sent::Now(OutboundCommand::new(address, value))
}

#[test]
fn red_region_activates_red_and_schedules_one_deactivation() {
    let frame = mostly_red();
    let stats = color_signal::sampler::sample(&frame, &REGION, &Thresholds::uniform(100)).unwrap();
    assert_eq!(stats.pixels, 600);
    assert_eq!(stats.channels[0].exceeding, 550);
    assert_eq!(stats.channels[0].mean, 200.);
    assert_eq!(stats.channels[1].mean, 50.);
    assert_eq!(stats.channels[2].mean, 40.);

    let classifier = ColorClassifier::new(80., Some(2.));
    assert_eq!(classifier.min_required_pixels(&REGION), 480.);

    let sink = SharedSink::default();
    let dispatcher = PerChannelDispatcher::new(
        sink.clone(),
        ChannelAddresses::default(),
        Duration::from_secs(5),
    );
    let mut pipeline = ColorPipeline::new(
        Frames(vec![frame.clone(), frame].into()),
        dispatcher,
        REGION,
        Thresholds::uniform(100),
        classifier,
    );

    assert_eq!(pipeline.run().unwrap(), Color::Red);
    assert_eq!(pipeline.run().unwrap(), Color::Red);

    assert_eq!(
        *sink.0.borrow(),
        vec![
            now("%QX0.0", 1),
            Sent::Later(OutboundCommand::new("%QX0.0", 0), Duration::from_secs(5)),
        ]
    );
}

#[test]
fn two_bit_policy_over_a_color_sequence() {
    let sink = SharedSink::default();
    let frames = vec![
        solid([10, 10, 10]),
        solid([220, 20, 20]),
        solid([220, 20, 20]),
        solid([20, 220, 20]),
        solid([10, 10, 10]),
    ];
    let mut pipeline = ColorPipeline::new(
        Frames(frames.into()),
        TwoBitDispatcher::new(sink.clone(), TwoBitAddresses::default()),
        REGION,
        Thresholds::default(),
        ColorClassifier::new(30., Some(2.)),
    );

    let options = RunOptions {
        max_frames: Some(5),
        ..RunOptions::default()
    };
    assert_eq!(pipeline.run_until(&AtomicBool::new(false), options).unwrap(), 5);

    let sent = sink.0.borrow();
    let payloads = sent
        .chunks(2)
        .map(|pair| match pair {
            [Sent::Now(pin1), Sent::Now(pin2)] => {
                assert_eq!((pin1.address.as_str(), pin2.address.as_str()), ("%QX0.4", "%QX0.6"));
                (pin1.value, pin2.value)
            }
            other => panic!("unexpected commands {:?}", other),
        })
        .collect::<Vec<_>>();

    assert_eq!(payloads, vec![(1, 0), (0, 1), (0, 0)]);
}

#[test]
fn per_channel_policy_cleans_up_when_the_stream_ends() {
    let sink = SharedSink::default();
    let frames = vec![solid([20, 20, 220]), solid([20, 20, 220])];
    let mut pipeline = ColorPipeline::new(
        Frames(frames.into()),
        PerChannelDispatcher::new(sink.clone(), ChannelAddresses::default(), Duration::from_secs(5)),
        REGION,
        Thresholds::default(),
        ColorClassifier::new(30., None),
    );

    assert!(pipeline
        .run_until(&AtomicBool::new(false), RunOptions::default())
        .is_err());

    assert_eq!(
        *sink.0.borrow(),
        vec![
            now("%QX0.2", 1),
            now("%QX0.0", 0),
            now("%QX0.1", 0),
            now("%QX0.2", 0),
        ]
    );
}

#[test]
fn region_outside_the_frame_is_treated_as_no_color() {
    let sink = SharedSink::default();
    let mut pipeline = ColorPipeline::new(
        Frames(vec![solid([220, 20, 20])].into()),
        PerChannelDispatcher::new(sink.clone(), ChannelAddresses::default(), Duration::from_secs(5)),
        Region::new(100, 100, 30, 20),
        Thresholds::default(),
        ColorClassifier::new(30., Some(2.)),
    );

    assert_eq!(pipeline.run().unwrap(), Color::None);
    assert!(sink.0.borrow().is_empty());
}
