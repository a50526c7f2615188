use serde_derive::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct TrajectorySample {
    pub x: f32,
    pub y: f32,
    pub timestamp: f64,
}

/// Rolling window of ball centers bounded by time, oldest first.
/// All samples belong to a single ball track.
#[derive(Debug, Clone)]
pub struct TrajectoryBuffer {
    retention: f64,
    track_id: Option<u32>,
    samples: VecDeque<TrajectorySample>,
}

impl TrajectoryBuffer {
    pub fn new(retention: f64) -> Self {
        Self {
            retention,
            track_id: None,
            samples: VecDeque::with_capacity(256),
        }
    }

    pub fn clear(&mut self) {
        self.track_id = None;
        self.samples.clear();
    }

    /// Ball track the samples come from
    #[inline]
    pub fn track_id(&self) -> Option<u32> {
        self.track_id
    }

    /// Switches to another ball track, dropping samples of the previous one.
    /// Returns true when a different track was being followed.
    pub fn follow(&mut self, track_id: u32) -> bool {
        if self.track_id == Some(track_id) {
            return false;
        }

        let switched = self.track_id.is_some();
        self.samples.clear();
        self.track_id = Some(track_id);

        switched
    }

    pub fn sample(&mut self, timestamp: f64, x: f32, y: f32) {
        self.samples.push_back(TrajectorySample { x, y, timestamp });

        while let Some(front) = self.samples.front() {
            if timestamp - front.timestamp > self.retention {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }

    /// Samples within the trailing `seconds`, measured from the newest sample
    pub fn window(&self, seconds: f64) -> Vec<TrajectorySample> {
        let newest = match self.samples.back() {
            Some(s) => s.timestamp,
            None => return Vec::new(),
        };

        let skip = self
            .samples
            .iter()
            .take_while(|s| newest - s.timestamp > seconds)
            .count();

        self.samples.iter().skip(skip).copied().collect()
    }

    #[inline]
    pub fn latest(&self) -> Option<&TrajectorySample> {
        self.samples.back()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &TrajectorySample> {
        self.samples.iter()
    }
}
