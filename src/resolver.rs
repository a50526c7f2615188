use std::collections::HashSet;
use tracing::{debug, info};

use crate::config::Config;
use crate::shot::{ShotEvent, ShotOutcome};
use crate::track::TrackState;
use crate::tracker::FrameSnapshot;

#[derive(Debug)]
struct PendingShot {
    event: ShotEvent,
    observations: u32,
    hits: u32,
}

impl PendingShot {
    fn settle(mut self) -> ShotEvent {
        self.event.outcome = if self.hits > 0 {
            ShotOutcome::Made
        } else {
            ShotOutcome::Missed
        };

        info!(
            shot = self.event.id,
            outcome = ?self.event.outcome,
            observations = self.observations,
            hits = self.hits,
            "shot resolved"
        );

        self.event
    }
}

/// Owns shots until their outcome is known. Driven purely by frame
/// timestamps, never by wall clock.
pub struct OutcomeResolver {
    open: Vec<PendingShot>,
    settle_delay: f64,
    rim_margin: f32,
}

impl OutcomeResolver {
    pub fn new(config: &Config) -> Self {
        Self {
            open: Vec::new(),
            settle_delay: config.settle_delay,
            rim_margin: config.rim_margin,
        }
    }

    pub fn reset(&mut self) {
        self.open.clear();
    }

    pub fn open(&mut self, event: ShotEvent) {
        debug!(shot = event.id, ts = event.timestamp, "shot awaiting outcome");

        self.open.push(PendingShot {
            event,
            observations: 0,
            hits: 0,
        });
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.open.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }

    pub fn open_events(&self) -> impl Iterator<Item = &ShotEvent> {
        self.open.iter().map(|p| &p.event)
    }

    /// Track ids referenced by unresolved shots
    pub fn pinned_tracks(&self) -> HashSet<u32> {
        self.open
            .iter()
            .flat_map(|p| {
                let e = &p.event;
                vec![e.shooter_track_id, e.ball_track_id, e.hoop_track_id]
            })
            .collect()
    }

    /// Records whether the freshly detected ball sits inside the hoop for
    /// every shot whose settle window covers this frame.
    pub fn observe(&mut self, frame: &FrameSnapshot) {
        let ts = frame.timestamp;
        let ball = frame
            .primary_ball()
            .filter(|b| b.state == TrackState::Active)
            .map(|b| b.bbox.center());

        for pending in self.open.iter_mut() {
            let shot_ts = pending.event.timestamp;
            if ts <= shot_ts || ts > shot_ts + self.settle_delay {
                continue;
            }

            pending.observations += 1;

            let hoop = frame
                .hoops
                .iter()
                .find(|h| h.track_id == pending.event.hoop_track_id)
                .or_else(|| frame.primary_hoop());

            if let (Some(ball), Some(hoop)) = (ball, hoop) {
                if hoop.bbox.expand(self.rim_margin).as_ltrb().contains(&ball) {
                    if pending.hits == 0 {
                        debug!(shot = pending.event.id, ts, "ball inside hoop region");
                    }
                    pending.hits += 1;
                }
            }
        }
    }

    /// Settles every shot whose delay has elapsed, oldest first
    pub fn tick(&mut self, ts: f64) -> Vec<ShotEvent> {
        let settle_delay = self.settle_delay;
        let (due, open): (Vec<_>, Vec<_>) = self
            .open
            .drain(..)
            .partition(|p| ts > p.event.timestamp + settle_delay);

        self.open = open;
        due.into_iter().map(PendingShot::settle).collect()
    }

    /// Settles everything still open with the evidence gathered so far
    pub fn flush(&mut self) -> Vec<ShotEvent> {
        self.open.drain(..).map(PendingShot::settle).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bbox::BBox;
    use crate::detection::ObjectClass;
    use crate::shot::{clip_window, ShotType};
    use crate::track::Track;

    fn event(id: u64, ts: f64) -> ShotEvent {
        let (clip_start, clip_end) = clip_window(ts, 5.0, 3.0);

        ShotEvent {
            id,
            timestamp: ts,
            confidence: 0.9,
            shot_type: ShotType::JumpShot,
            shooter_track_id: 3,
            ball_track_id: 1,
            hoop_track_id: 2,
            trajectory_snapshot: Vec::new(),
            outcome: ShotOutcome::InProgress,
            clip_start,
            clip_end,
        }
    }

    fn track(id: u32, class: ObjectClass, state: TrackState, cx: f32, cy: f32) -> Track {
        Track {
            track_id: id,
            class,
            state,
            confidence: 0.9,
            bbox: BBox::ltwh(cx - 20.0, cy - 20.0, 40.0, 40.0),
            last_update: 0.0,
            time_since_update: 0.0,
            velocity: (0.0, 0.0),
        }
    }

    fn frame(ts: f64, ball: Option<(f32, f32)>, ball_state: TrackState) -> FrameSnapshot {
        FrameSnapshot {
            timestamp: ts,
            balls: ball
                .map(|(x, y)| vec![track(1, ObjectClass::Ball, ball_state, x, y)])
                .unwrap_or_default(),
            hoops: vec![track(2, ObjectClass::Hoop, TrackState::Active, 400.0, 300.0)],
            players: Vec::new(),
            primary_ball: ball.map(|_| 1),
            primary_hoop: Some(2),
        }
    }

    #[test]
    fn test_stays_open_until_delay_passes() {
        let mut r = OutcomeResolver::new(&Config::default());
        r.open(event(1, 10.0));

        assert!(r.tick(11.0).is_empty());
        assert!(r.tick(12.0).is_empty());
        assert_eq!(r.len(), 1);

        let done = r.tick(12.01);
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].outcome, ShotOutcome::Missed);
        assert!(r.is_empty());
    }

    #[test]
    fn test_made_when_ball_enters_hoop() {
        let mut r = OutcomeResolver::new(&Config::default());
        r.open(event(1, 10.0));

        r.observe(&frame(10.5, Some((400.0, 200.0)), TrackState::Active));
        r.observe(&frame(11.0, Some((405.0, 298.0)), TrackState::Active));
        r.observe(&frame(11.5, Some((410.0, 380.0)), TrackState::Active));

        let done = r.tick(12.5);
        assert_eq!(done[0].outcome, ShotOutcome::Made);
    }

    #[test]
    fn test_ignores_coasting_ball_and_frames_outside_window() {
        let mut r = OutcomeResolver::new(&Config::default());
        r.open(event(1, 10.0));

        // at the attempt itself and after the window do not count
        r.observe(&frame(10.0, Some((400.0, 300.0)), TrackState::Active));
        r.observe(&frame(11.0, Some((400.0, 300.0)), TrackState::Coasting));
        r.observe(&frame(12.2, Some((400.0, 300.0)), TrackState::Active));

        let done = r.tick(12.2);
        assert_eq!(done[0].outcome, ShotOutcome::Missed);
    }

    #[test]
    fn test_tick_is_idempotent() {
        let mut r = OutcomeResolver::new(&Config::default());
        r.open(event(1, 10.0));
        r.observe(&frame(11.0, Some((400.0, 300.0)), TrackState::Active));

        let done = r.tick(13.0);
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].outcome, ShotOutcome::Made);

        for ts in [13.5, 14.0, 20.0].iter() {
            r.observe(&frame(*ts, None, TrackState::Active));
            assert!(r.tick(*ts).is_empty());
        }
        assert!(r.is_empty());
    }

    #[test]
    fn test_resolves_in_attempt_order() {
        let mut r = OutcomeResolver::new(&Config::default());
        r.open(event(1, 10.0));
        r.open(event(2, 14.0));

        let done = r.tick(16.5);
        assert_eq!(done.len(), 2);
        assert_eq!(done[0].id, 1);
        assert_eq!(done[1].id, 2);
    }

    #[test]
    fn test_clip_window_survives_resolution() {
        let mut r = OutcomeResolver::new(&Config::default());
        r.open(event(1, 3.0));

        let done = r.tick(9.0);
        assert_eq!(done[0].clip_start, 0.0);
        assert_eq!(done[0].clip_end, 6.0);
    }

    #[test]
    fn test_flush_and_pins() {
        let mut r = OutcomeResolver::new(&Config::default());
        r.open(event(1, 10.0));

        let pins = r.pinned_tracks();
        assert!(pins.contains(&1) && pins.contains(&2) && pins.contains(&3));

        let done = r.flush();
        assert_eq!(done.len(), 1);
        assert!(done[0].is_resolved());
        assert!(r.pinned_tracks().is_empty());
    }
}
