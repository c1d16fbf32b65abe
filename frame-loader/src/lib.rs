//! Common `FrameSource` instance loader.

use driftscope::prelude::v1::*;
use std::path::Path;

#[cfg(feature = "opencv")]
mod capture;
mod image_sequence;

#[cfg(feature = "opencv")]
pub use capture::CvCapture;
pub use image_sequence::ImageSequence;

/// Create a frame source depending on the input.
///
/// If the input is a directory, every image file inside it is played back in name order.
///
/// `cam:N` opens camera with index `N`, and any other path is opened as a video file. Both of
/// these need the crate to be built with the `opencv` feature.
pub fn create_source(input: &str) -> Result<Box<dyn FrameSource + Send>> {
    if Path::new(input).is_dir() {
        return Ok(Box::new(ImageSequence::open(input)?));
    }

    if let Some(index) = input.strip_prefix("cam:") {
        let index: i32 = index
            .parse()
            .map_err(|_| anyhow!("invalid camera index in {}", input))?;
        return open_camera(index);
    }

    ensure!(Path::new(input).exists(), "input {} does not exist", input);

    open_video(input)
}

#[cfg(feature = "opencv")]
fn open_camera(index: i32) -> Result<Box<dyn FrameSource + Send>> {
    Ok(Box::new(CvCapture::camera(index)?))
}

#[cfg(not(feature = "opencv"))]
fn open_camera(index: i32) -> Result<Box<dyn FrameSource + Send>> {
    bail!("camera {} requested, but OpenCV support is not built in", index)
}

#[cfg(feature = "opencv")]
fn open_video(input: &str) -> Result<Box<dyn FrameSource + Send>> {
    Ok(Box::new(CvCapture::file(input)?))
}

#[cfg(not(feature = "opencv"))]
fn open_video(input: &str) -> Result<Box<dyn FrameSource + Send>> {
    bail!("video input {} needs OpenCV support, which is not built in", input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_inputs() {
        assert!(create_source("cam:front").is_err());
        assert!(create_source("/definitely/not/here.mp4").is_err());
    }

    #[cfg(not(feature = "opencv"))]
    #[test]
    fn capture_needs_opencv() {
        let err = create_source("cam:0").err().unwrap();
        assert!(err.to_string().contains("OpenCV"));
    }
}
