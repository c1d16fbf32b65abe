//! Directory of still images played back as a video stream.

use driftscope::prelude::v1::*;
use log::*;
use std::path::{Path, PathBuf};

const EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "gif", "tif", "tiff", "pnm", "webp"];

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Plays back image files of a directory in name order.
///
/// Once every image was read the sequence keeps returning `Ok(None)`.
pub struct ImageSequence {
    paths: Vec<PathBuf>,
    next: usize,
    aspect: Option<(usize, usize)>,
}

impl ImageSequence {
    /// Open a directory and collect all image files in it.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();

        let mut paths = std::fs::read_dir(dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file() && is_image(p))
            .collect::<Vec<_>>();

        ensure!(!paths.is_empty(), "no images found in {}", dir.display());

        paths.sort();

        info!("Opened {} images from {}", paths.len(), dir.display());

        Ok(Self {
            paths,
            next: 0,
            aspect: None,
        })
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Number of images not yet read.
    pub fn remaining(&self) -> usize {
        self.paths.len() - self.next
    }
}

impl FrameSource for ImageSequence {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let path = match self.paths.get(self.next) {
            Some(path) => path,
            None => return Ok(None),
        };

        // Skip unreadable files instead of retrying them forever.
        self.next += 1;

        let img = image::open(path)
            .map_err(|e| anyhow!("failed to read {}: {}", path.display(), e))?
            .to_rgba8();

        let (w, h) = (img.width() as usize, img.height() as usize);

        let frame = Frame::new(
            w,
            h,
            img.as_raw()
                .chunks_exact(4)
                .map(RGBA::from_rgba_slice)
                .collect(),
        )?;

        self.aspect = Some((w, h));

        Ok(Some(frame))
    }

    fn get_aspect(&self) -> Option<(usize, usize)> {
        self.aspect
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "frame-loader-{}-{}",
            name,
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_png(dir: &Path, name: &str, value: u8) {
        RgbImage::from_fn(8, 4, |x, _| Rgb([value, x as u8, 0]))
            .save(dir.join(name))
            .unwrap();
    }

    #[test]
    fn plays_images_in_order() {
        let dir = scratch_dir("order");

        write_png(&dir, "002.png", 20);
        write_png(&dir, "000.png", 0);
        write_png(&dir, "001.png", 10);
        std::fs::write(dir.join("notes.txt"), "not an image").unwrap();

        let mut seq = ImageSequence::open(&dir).unwrap();
        assert_eq!(seq.len(), 3);
        assert_eq!(seq.get_aspect(), None);

        let reds = (0..3)
            .map(|_| seq.next_frame().unwrap().unwrap())
            .map(|f| {
                assert_eq!(f.dim(), (8, 4));
                assert_eq!(f.pixels()[3].g, 3);
                f.pixels()[0].r
            })
            .collect::<Vec<_>>();

        assert_eq!(reds, vec![0, 10, 20]);
        assert_eq!(seq.get_aspect(), Some((8, 4)));
        assert_eq!(seq.remaining(), 0);

        // End of stream is not an error.
        assert!(seq.next_frame().unwrap().is_none());
        assert!(seq.next_frame().unwrap().is_none());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn broken_image_is_skipped() {
        let dir = scratch_dir("broken");

        std::fs::write(dir.join("000.png"), "garbage").unwrap();
        write_png(&dir, "001.png", 7);

        let mut seq = ImageSequence::open(&dir).unwrap();
        assert!(seq.next_frame().is_err());
        assert_eq!(seq.next_frame().unwrap().unwrap().pixels()[0].r, 7);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn empty_directory_fails() {
        let dir = scratch_dir("empty");
        assert!(ImageSequence::open(&dir).is_err());
        assert!(crate::create_source(dir.to_str().unwrap()).is_err());
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
