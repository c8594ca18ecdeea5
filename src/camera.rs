use anyhow::{anyhow, Context, Result};
use image::{Rgb, RgbImage};
use rand::{rngs::ThreadRng, thread_rng, Rng};
use std::{
    collections::VecDeque,
    fs,
    path::{Path, PathBuf},
};

/// Anything that produces frames for the sampling loop.
pub trait FrameSource {
    /// Returns the next frame in RGB order. An error ends the loop.
    fn grab_frame(&mut self) -> Result<RgbImage>;

    fn name(&self) -> String;

    fn release(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn grab_frame(&mut self) -> Result<RgbImage> {
        (**self).grab_frame()
    }

    fn name(&self) -> String {
        (**self).name()
    }

    fn release(&mut self) -> Result<()> {
        (**self).release()
    }
}

/// Replays still images from a directory, in file name order.
pub struct ImageDirectory {
    dir: PathBuf,
    paths: VecDeque<PathBuf>,
}

impl ImageDirectory {
    const EXTENSIONS: &'static [&'static str] = &["png", "jpg", "jpeg", "bmp"];

    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();

        let mut paths = fs::read_dir(&dir)
            .with_context(|| format!("Failed to list {}", dir.display()))?
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| path.is_file() && Self::is_image(path))
            .collect::<Vec<_>>();
        paths.sort();

        Ok(ImageDirectory {
            dir,
            paths: paths.into(),
        })
    }

    fn is_image(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| Self::EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false)
    }

    pub fn remaining(&self) -> usize {
        self.paths.len()
    }
}

impl FrameSource for ImageDirectory {
    fn grab_frame(&mut self) -> Result<RgbImage> {
        let path = self
            .paths
            .pop_front()
            .ok_or_else(|| anyhow!("No more images in {}", self.dir.display()))?;

        let image = image::open(&path).with_context(|| format!("Failed to decode {}", path.display()))?;

        Ok(image.to_rgb8())
    }

    fn name(&self) -> String {
        format!("images in {}", self.dir.display())
    }
}

/// Noisy frames whose dominant color changes every `hold` frames. Useful for
/// exercising the control endpoint without a camera.
pub struct SyntheticSource {
    width: u32,
    height: u32,
    hold: u32,
    noise: u8,
    frame_index: u64,
    rng: ThreadRng,
}

impl SyntheticSource {
    const PALETTE: [[u8; 3]; 4] = [[30, 30, 30], [220, 40, 40], [40, 220, 40], [40, 40, 220]];

    pub fn new(width: u32, height: u32, hold: u32) -> Self {
        SyntheticSource {
            width,
            height,
            hold: hold.max(1),
            noise: 20,
            frame_index: 0,
            rng: thread_rng(),
        }
    }

    fn base_color(&self) -> [u8; 3] {
        let step = self.frame_index / u64::from(self.hold);
        Self::PALETTE[(step % Self::PALETTE.len() as u64) as usize]
    }
}

impl FrameSource for SyntheticSource {
    fn grab_frame(&mut self) -> Result<RgbImage> {
        let base = self.base_color();
        let noise = i16::from(self.noise);
        let mut frame = RgbImage::new(self.width, self.height);

        for pixel in frame.pixels_mut() {
            let mut value = [0u8; 3];
            for (idx, channel) in base.iter().enumerate() {
                let jitter = self.rng.gen_range(-noise..=noise);
                value[idx] = (i16::from(*channel) + jitter).max(0).min(255) as u8;
            }
            *pixel = Rgb(value);
        }

        self.frame_index += 1;
        Ok(frame)
    }

    fn name(&self) -> String {
        format!("synthetic {}x{}", self.width, self.height)
    }
}

#[cfg(feature = "opencv")]
pub use self::opencv_camera::OpenCvCamera;

#[cfg(feature = "opencv")]
mod opencv_camera {
    use super::FrameSource;
    use anyhow::{bail, Context, Result};
    use image::RgbImage;
    use opencv::{core::Mat, imgproc, prelude::*, videoio};

    pub struct OpenCvCamera {
        index: i32,
        capture: videoio::VideoCapture,
    }

    impl OpenCvCamera {
        pub fn new(index: i32) -> Result<Self> {
            let capture = videoio::VideoCapture::new(index, videoio::CAP_ANY)
                .with_context(|| format!("Failed to open camera {}", index))?;

            if !capture.is_opened()? {
                bail!("Camera {} is not available", index);
            }

            Ok(OpenCvCamera { index, capture })
        }
    }

    impl FrameSource for OpenCvCamera {
        fn grab_frame(&mut self) -> Result<RgbImage> {
            let mut bgr = Mat::default();
            if !self.capture.read(&mut bgr)? || bgr.rows() == 0 {
                bail!("Camera {} returned no frame", self.index);
            }

            let mut rgb = Mat::default();
            imgproc::cvt_color_def(&bgr, &mut rgb, imgproc::COLOR_BGR2RGB)?;

            let width = rgb.cols() as u32;
            let height = rgb.rows() as u32;
            let data = rgb.data_bytes()?.to_vec();

            RgbImage::from_raw(width, height, data)
                .with_context(|| format!("Camera {} returned a malformed frame", self.index))
        }

        fn name(&self) -> String {
            format!("camera {}", self.index)
        }

        fn release(&mut self) -> Result<()> {
            self.capture.release()?;
            Ok(())
        }
    }
}
