//! OpenCV camera and video capture.

use driftscope::prelude::v1::{Result, *};
use log::*;
use opencv::core::Vec3b;
use opencv::prelude::*;
use opencv::videoio::*;

pub struct CvCapture {
    capture: VideoCapture,
    frame: Mat,
}

impl CvCapture {
    /// Open a camera by its index.
    pub fn camera(index: i32) -> Result<Self> {
        Self::from_capture(VideoCapture::new(index, CAP_ANY)?, &format!("camera {}", index))
    }

    /// Open a video file or stream URL.
    pub fn file(stream: &str) -> Result<Self> {
        Self::from_capture(VideoCapture::from_file(stream, CAP_ANY)?, stream)
    }

    fn from_capture(capture: VideoCapture, name: &str) -> Result<Self> {
        ensure!(capture.is_opened()?, "failed to open {}", name);

        info!("Opened capture {}", name);

        Ok(Self {
            capture,
            frame: Default::default(),
        })
    }
}

impl FrameSource for CvCapture {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if !self.capture.read(&mut self.frame)? || self.frame.empty() {
            return Ok(None);
        }

        let (w, h) = (self.frame.cols() as usize, self.frame.rows() as usize);
        let mut pixels = Vec::with_capacity(w * h);

        for y in 0..self.frame.rows() {
            for x in 0..self.frame.cols() {
                let bgr: &Vec3b = self.frame.at_2d(y, x)?;
                pixels.push(RGBA::from_rgb_slice(&[bgr[2], bgr[1], bgr[0]]));
            }
        }

        Frame::new(w, h, pixels).map(Some)
    }

    fn get_framerate(&self) -> Option<f64> {
        self.capture.get(CAP_PROP_FPS).ok().filter(|&fps| fps > 0.0)
    }

    fn get_aspect(&self) -> Option<(usize, usize)> {
        if self.frame.empty() {
            None
        } else {
            Some((self.frame.cols() as _, self.frame.rows() as _))
        }
    }
}

impl Drop for CvCapture {
    fn drop(&mut self) {
        if let Err(e) = self.capture.release() {
            warn!("Failed to release capture: {}", e);
        } else {
            info!("Capture released");
        }
    }
}
