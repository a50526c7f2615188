//! Frame-to-frame identity assignment by greedy IoU matching

use nalgebra as na;
use serde_derive::Serialize;
use std::collections::HashSet;
use tracing::debug;

use crate::bbox::{BBox, Ltwh};
use crate::circular_queue::CircularQueue;
use crate::config::Config;
use crate::detection::{Detection, ObjectClass};
use crate::error::Error;
use crate::track::{Track, TrackState};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackSample {
    pub timestamp: f64,
    pub bbox: BBox<Ltwh>,
    pub confidence: f32,
}

#[derive(Debug, Clone)]
pub struct TrackedObject {
    pub id: u32,
    pub class: ObjectClass,
    pub history: CircularQueue<TrackSample>,
    pub velocity: na::Vector2<f32>,
    pub state: TrackState,
    last: TrackSample,
}

impl TrackedObject {
    fn new(id: u32, ts: f64, det: &Detection, history_len: usize) -> Self {
        let sample = TrackSample {
            timestamp: ts,
            bbox: det.bbox,
            confidence: det.confidence,
        };

        let mut history = CircularQueue::with_capacity(history_len);
        history.push(sample);

        Self {
            id,
            class: det.class,
            history,
            velocity: na::Vector2::zeros(),
            state: TrackState::Active,
            last: sample,
        }
    }

    fn update(&mut self, ts: f64, det: &Detection) {
        self.last = TrackSample {
            timestamp: ts,
            bbox: det.bbox,
            confidence: det.confidence,
        };
        self.history.push(self.last);
        self.state = TrackState::Active;

        if let Some(prev) = self.history.previous() {
            let dt = (ts - prev.timestamp) as f32;
            if dt > 0.0 {
                self.velocity = (self.last.bbox.center() - prev.bbox.center()) / dt;
            }
        }
    }

    #[inline]
    pub fn last(&self) -> &TrackSample {
        &self.last
    }

    #[inline]
    pub fn center(&self) -> na::Point2<f32> {
        self.last.bbox.center()
    }

    #[inline]
    pub fn confidence(&self) -> f32 {
        self.last.confidence
    }

    #[inline]
    pub fn last_update(&self) -> f64 {
        self.last.timestamp
    }

    #[inline]
    pub fn active(&self) -> bool {
        self.state != TrackState::Inactive
    }

    pub fn to_track(&self, now: f64) -> Track {
        Track {
            track_id: self.id,
            class: self.class,
            state: self.state,
            confidence: self.last.confidence,
            bbox: self.last.bbox,
            last_update: self.last.timestamp,
            time_since_update: (now - self.last.timestamp).max(0.0),
            velocity: (self.velocity.x, self.velocity.y),
        }
    }
}

/// Result of matching one frame's detections against the registry
#[derive(Debug, Clone)]
pub struct DetectionsMapping {
    pub timestamp: f64,
    // (track index, detection index, iou)
    pub matched: Vec<(usize, usize, f32)>,
    pub missed: Vec<usize>,
}

/// Active tracks of one frame partitioned by class
#[derive(Serialize, Debug, Clone, Default)]
pub struct FrameSnapshot {
    pub timestamp: f64,
    pub balls: Vec<Track>,
    pub hoops: Vec<Track>,
    pub players: Vec<Track>,
    pub primary_ball: Option<u32>,
    pub primary_hoop: Option<u32>,
}

impl FrameSnapshot {
    pub fn primary_ball(&self) -> Option<&Track> {
        let id = self.primary_ball?;
        self.balls.iter().find(|t| t.track_id == id)
    }

    pub fn primary_hoop(&self) -> Option<&Track> {
        let id = self.primary_hoop?;
        self.hoops.iter().find(|t| t.track_id == id)
    }

    pub fn len(&self) -> usize {
        self.balls.len() + self.hoops.len() + self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        self.balls
            .iter()
            .chain(self.hoops.iter())
            .chain(self.players.iter())
    }
}

pub struct MultiObjectTracker {
    tracks: Vec<TrackedObject>,
    next_id: u32,
    last_timestamp: Option<f64>,
    iou_threshold: f32,
    stale_after: f64,
    history_len: usize,
    track_retention: f64,
}

impl MultiObjectTracker {
    pub fn new(config: &Config) -> Self {
        Self {
            tracks: Vec::with_capacity(32),
            next_id: 1,
            last_timestamp: None,
            iou_threshold: config.iou_threshold,
            stale_after: config.stale_after,
            history_len: config.history_len,
            track_retention: config.track_retention,
        }
    }

    pub fn reset(&mut self) {
        self.tracks.clear();
        self.next_id = 1;
        self.last_timestamp = None;
    }

    #[inline]
    pub fn last_timestamp(&self) -> Option<f64> {
        self.last_timestamp
    }

    /// Number of retained tracks, inactive ones included
    #[inline]
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    #[inline]
    pub fn tracks(&self) -> impl Iterator<Item = &TrackedObject> {
        self.tracks.iter()
    }

    pub fn get(&self, id: u32) -> Option<&TrackedObject> {
        self.tracks.iter().find(|t| t.id == id)
    }

    /// Rejects timestamps that would corrupt track history
    pub fn check_timestamp(&self, ts: f64) -> Result<(), Error> {
        if !ts.is_finite() || ts < 0.0 {
            return Err(Error::InvalidTimestamp(ts));
        }

        match self.last_timestamp {
            Some(last) if ts < last => Err(Error::TimestampRegression { last, got: ts }),
            _ => Ok(()),
        }
    }

    #[inline]
    fn is_matchable(&self, track: &TrackedObject, ts: f64) -> bool {
        ts - track.last_update() <= self.stale_after
    }

    /// Greedy matching in detection order. A track takes at most one
    /// detection per frame, ties go to the lower id.
    pub fn map_detections(&self, ts: f64, detections: &[Detection]) -> DetectionsMapping {
        let mut taken = vec![false; self.tracks.len()];
        let mut matched = Vec::with_capacity(detections.len());
        let mut missed = Vec::new();

        for (j, det) in detections.iter().enumerate() {
            let mut best: Option<(usize, f32)> = None;

            for (i, track) in self.tracks.iter().enumerate() {
                if taken[i] || track.class != det.class || !self.is_matchable(track, ts) {
                    continue;
                }

                let iou = det.iou(&track.last().bbox);
                if iou <= self.iou_threshold {
                    continue;
                }

                match best {
                    Some((_, best_iou)) if iou <= best_iou => {}
                    _ => best = Some((i, iou)),
                }
            }

            if let Some((i, iou)) = best {
                taken[i] = true;
                matched.push((i, j, iou));
            } else {
                missed.push(j);
            }
        }

        DetectionsMapping {
            timestamp: ts,
            matched,
            missed,
        }
    }

    pub fn update(&mut self, mapping: DetectionsMapping, detections: &[Detection]) {
        let ts = mapping.timestamp;
        let existing = self.tracks.len();
        let mut updated = vec![false; existing];

        for (i, j, iou) in mapping.matched {
            let track = &mut self.tracks[i];
            track.update(ts, &detections[j]);
            updated[i] = true;

            debug!(track = track.id, class = %track.class, iou, "track matched");
        }

        for (i, track) in self.tracks.iter_mut().enumerate().take(existing) {
            if updated[i] {
                continue;
            }

            let state = if ts - track.last_update() <= self.stale_after {
                TrackState::Coasting
            } else {
                TrackState::Inactive
            };

            if state == TrackState::Inactive && track.state != TrackState::Inactive {
                debug!(track = track.id, class = %track.class, "track went stale");
            }

            track.state = state;
        }

        for j in mapping.missed {
            let id = self.next_id;
            self.next_id = self.next_id.wrapping_add(1).max(1);

            let det = &detections[j];
            debug!(track = id, class = %det.class, confidence = det.confidence, "new track");

            self.tracks
                .push(TrackedObject::new(id, ts, det, self.history_len));
        }

        self.last_timestamp = Some(ts);
    }

    /// Runs matching and the staleness sweep for one frame.
    /// Nothing is mutated when the timestamp is rejected.
    pub fn process_frame(
        &mut self,
        ts: f64,
        detections: &[Detection],
    ) -> Result<FrameSnapshot, Error> {
        self.check_timestamp(ts)?;

        let mapping = self.map_detections(ts, detections);
        self.update(mapping, detections);

        Ok(self.snapshot())
    }

    /// Active track with the highest confidence, tracks matched this frame
    /// outrank coasting ones, ties go to the lower id.
    pub fn primary(&self, class: ObjectClass) -> Option<&TrackedObject> {
        let outranks = |t: &TrackedObject, b: &TrackedObject| {
            let (ta, ba) = (t.state == TrackState::Active, b.state == TrackState::Active);
            (ta && !ba) || (ta == ba && t.confidence() > b.confidence())
        };

        let mut best: Option<&TrackedObject> = None;
        for track in self.tracks.iter().filter(|t| t.class == class && t.active()) {
            best = match best {
                Some(b) if !outranks(track, b) => Some(b),
                _ => Some(track),
            };
        }

        best
    }

    pub fn snapshot(&self) -> FrameSnapshot {
        let now = self.last_timestamp.unwrap_or(0.0);
        let mut snapshot = FrameSnapshot {
            timestamp: now,
            primary_ball: self.primary(ObjectClass::Ball).map(|t| t.id),
            primary_hoop: self.primary(ObjectClass::Hoop).map(|t| t.id),
            ..Default::default()
        };

        for track in self.tracks.iter().filter(|t| t.active()) {
            let bucket = match track.class {
                ObjectClass::Ball => &mut snapshot.balls,
                ObjectClass::Hoop => &mut snapshot.hoops,
                ObjectClass::Player => &mut snapshot.players,
            };

            bucket.push(track.to_track(now));
        }

        snapshot
    }

    /// Drops inactive tracks past the retention window unless pinned
    pub fn prune(&mut self, now: f64, pinned: &HashSet<u32>) {
        let retention = self.track_retention;
        let before = self.tracks.len();

        self.tracks.retain(|t| {
            t.active() || now - t.last_update() <= retention || pinned.contains(&t.id)
        });

        let dropped = before - self.tracks.len();
        if dropped > 0 {
            debug!(dropped, remaining = self.tracks.len(), "pruned stale tracks");
        }
    }
}
