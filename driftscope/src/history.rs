//! # Recent estimate history
//!
//! Bounded window of the latest estimates kept by a presentation consumer.

use crate::prelude::v1::*;
use std::collections::VecDeque;
use std::sync::mpsc::Receiver;

/// Samples kept by default.
pub const DEFAULT_HISTORY: usize = 100;

/// Scalar part of an estimate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sample {
    pub frame: u64,
    /// Angle published for the frame, if any.
    pub angle: Option<f32>,
    pub direction: Option<Direction>,
}

impl From<&Estimate> for Sample {
    fn from(estimate: &Estimate) -> Self {
        Self {
            frame: estimate.frame,
            angle: estimate.angle,
            direction: estimate.direction,
        }
    }
}

/// Ring buffer of the most recent samples.
#[derive(Clone, Debug)]
pub struct AngleHistory {
    samples: VecDeque<Sample>,
    capacity: usize,
}

impl Default for AngleHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY)
    }
}

impl AngleHistory {
    /// Create a history keeping at most `capacity` samples, at least one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Append a sample, evicting the oldest one when full.
    pub fn push(&mut self, sample: Sample) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    /// Move every pending estimate out of the receiver without blocking.
    ///
    /// Returns the number of samples added.
    pub fn drain(&mut self, rx: &Receiver<Estimate>) -> usize {
        rx.try_iter().fold(0, |count, estimate| {
            self.push((&estimate).into());
            count + 1
        })
    }

    /// Samples from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &Sample> + '_ {
        self.samples.iter()
    }

    pub fn latest(&self) -> Option<&Sample> {
        self.samples.back()
    }

    /// Most recent published direction, if any sample carries one.
    pub fn last_direction(&self) -> Option<Direction> {
        self.samples.iter().rev().find_map(|s| s.direction)
    }

    /// Most recent published angle, if any sample carries one.
    pub fn last_angle(&self) -> Option<f32> {
        self.samples.iter().rev().find_map(|s| s.angle)
    }

    /// Smallest and largest published angle in the window.
    pub fn range(&self) -> Option<(f32, f32)> {
        self.samples.iter().filter_map(|s| s.angle).fold(None, |acc, a| {
            Some(match acc {
                None => (a, a),
                Some((lo, hi)) => (lo.min(a), hi.max(a)),
            })
        })
    }
}
