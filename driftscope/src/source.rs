//! # Frame acquisition

use crate::prelude::v1::*;
use std::collections::VecDeque;

/// Source of video frames, typically a camera.
pub trait FrameSource {
    /// Acquire the next frame in the stream.
    ///
    /// Returns `Ok(Some(frame))` when a frame was read. `Ok(None)` means that no frame is
    /// available right now (end of stream, or a transient hiccup of a live camera), and `Err`
    /// reports an acquisition failure. Neither of the latter are fatal to the caller, which simply
    /// tries again on its next iteration.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Get the framerate of the stream.
    ///
    /// This will return `Some(framerate)` if it is known. On realtime streams it may
    /// not always be known. In such cases, `None` is returned.
    fn get_framerate(&self) -> Option<f64> {
        None
    }

    /// Get the frame dimensions of the stream.
    ///
    /// This will return `Some((width, height))` if they are known. They may only become known
    /// after the first frame is read.
    fn get_aspect(&self) -> Option<(usize, usize)> {
        None
    }
}

impl<T: FrameSource + ?Sized> FrameSource for Box<T> {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        (**self).next_frame()
    }

    fn get_framerate(&self) -> Option<f64> {
        (**self).get_framerate()
    }

    fn get_aspect(&self) -> Option<(usize, usize)> {
        (**self).get_aspect()
    }
}

/// In-memory frame source.
///
/// Replays a fixed set of frames, optionally looping over them forever.
#[derive(Clone, Debug, Default)]
pub struct FrameQueue {
    frames: VecDeque<Frame>,
    looping: bool,
}

impl FrameQueue {
    pub fn new(frames: impl IntoIterator<Item = Frame>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
            looping: false,
        }
    }

    /// Make the queue loop back to its first frame once exhausted.
    pub fn looping(self, looping: bool) -> Self {
        Self { looping, ..self }
    }

    pub fn push(&mut self, frame: Frame) {
        self.frames.push_back(frame);
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl FrameSource for FrameQueue {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let frame = self.frames.pop_front();

        if self.looping {
            if let Some(frame) = &frame {
                self.frames.push_back(frame.clone());
            }
        }

        Ok(frame)
    }

    fn get_aspect(&self) -> Option<(usize, usize)> {
        self.frames.front().map(Frame::dim)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_drains() {
        let mut queue = FrameQueue::new([Frame::from_fn(2, 2, |_, _| RGBA::gray(1))]);
        assert_eq!(queue.get_aspect(), Some((2, 2)));
        assert!(queue.next_frame().unwrap().is_some());
        assert!(queue.next_frame().unwrap().is_none());
        assert!(queue.is_empty());
    }

    #[test]
    fn queue_loops() {
        let frames = (0..3).map(|i| Frame::from_fn(1, 1, move |_, _| RGBA::gray(i)));
        let mut queue = FrameQueue::new(frames).looping(true);

        let seen = (0..7)
            .map(|_| queue.next_frame().unwrap().unwrap().pixels()[0].r)
            .collect::<Vec<_>>();

        assert_eq!(seen, vec![0, 1, 2, 0, 1, 2, 0]);
    }
}
