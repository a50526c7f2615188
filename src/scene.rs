//! One video analysis: detections in, shot events out

use serde_derive::Serialize;
use tracing::{debug, warn};

use crate::config::Config;
use crate::detection::{Detection, ObjectClass, RawDetection};
use crate::error::Error;
use crate::frame::Frame;
use crate::resolver::OutcomeResolver;
use crate::shot::{ShotDetector, ShotEvent};
use crate::track::TrackState;
use crate::tracker::{FrameSnapshot, MultiObjectTracker};
use crate::trajectory::TrajectoryBuffer;

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct FrameReport {
    pub timestamp: f64,
    pub active_tracks: FrameSnapshot,
    pub new_shot_events: Vec<ShotEvent>,
    pub resolved_shot_events: Vec<ShotEvent>,
    pub discarded_detections: usize,
}

pub struct Scene {
    config: Config,
    tracker: MultiObjectTracker,
    trajectory: TrajectoryBuffer,
    detector: ShotDetector,
    resolver: OutcomeResolver,
}

impl Scene {
    pub fn new(config: Config) -> Self {
        Self {
            tracker: MultiObjectTracker::new(&config),
            trajectory: TrajectoryBuffer::new(config.trajectory_retention),
            detector: ShotDetector::new(&config),
            resolver: OutcomeResolver::new(&config),
            config,
        }
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[inline]
    pub fn tracker(&self) -> &MultiObjectTracker {
        &self.tracker
    }

    #[inline]
    pub fn trajectory(&self) -> &TrajectoryBuffer {
        &self.trajectory
    }

    pub fn open_shots(&self) -> impl Iterator<Item = &ShotEvent> {
        self.resolver.open_events()
    }

    #[inline]
    pub fn open_shot_count(&self) -> usize {
        self.resolver.len()
    }

    /// Retained tracks, inactive ones included
    #[inline]
    pub fn track_count(&self) -> usize {
        self.tracker.len()
    }

    pub fn reset(&mut self) {
        self.tracker.reset();
        self.trajectory.clear();
        self.detector.reset();
        self.resolver.reset();
    }

    /// Malformed detections are dropped, the rest go through
    fn adapt(&self, raw: &[RawDetection]) -> (Vec<Detection>, usize) {
        let mut detections = Vec::with_capacity(raw.len());
        let mut discarded = 0;

        for r in raw {
            match Detection::try_from(r) {
                Ok(det) if det.confidence >= self.config.min_confidence => detections.push(det),
                Ok(det) => {
                    debug!(class = %det.class, confidence = det.confidence, "below min confidence");
                }
                Err(err) => {
                    warn!("{}", err);
                    discarded += 1;
                }
            }
        }

        (detections, discarded)
    }

    pub fn process(&mut self, frame: &Frame) -> Result<FrameReport, Error> {
        self.process_frame(frame.timestamp, &frame.detections)
    }

    pub fn process_frame(
        &mut self,
        ts: f64,
        detections: &[RawDetection],
    ) -> Result<FrameReport, Error> {
        if let Err(err) = self.tracker.check_timestamp(ts) {
            warn!("frame rejected: {}", err);
            return Err(err);
        }

        let (detections, discarded) = self.adapt(detections);
        let snapshot = self.tracker.process_frame(ts, &detections)?;

        if let Some(ball) = self
            .tracker
            .primary(ObjectClass::Ball)
            .filter(|b| b.state == TrackState::Active)
        {
            if self.trajectory.follow(ball.id) {
                debug!(ball = ball.id, "primary ball changed, trajectory restarted");
            }

            let c = ball.center();
            self.trajectory.sample(ts, c.x, c.y);
        }

        self.resolver.observe(&snapshot);
        let resolved_shot_events = self.resolver.tick(ts);

        let mut new_shot_events = Vec::new();
        if let Some(event) = self.detector.detect(&snapshot, &self.trajectory) {
            new_shot_events.push(event.clone());
            self.resolver.open(event);
        }

        self.tracker.prune(ts, &self.resolver.pinned_tracks());

        Ok(FrameReport {
            timestamp: ts,
            active_tracks: snapshot,
            new_shot_events,
            resolved_shot_events,
            discarded_detections: discarded,
        })
    }

    /// End of stream: settles shots that never saw their full delay
    pub fn flush(&mut self) -> Vec<ShotEvent> {
        self.resolver.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bad_detection_does_not_stop_frame() {
        let mut scene = Scene::new(Config::default());
        let dets = vec![
            RawDetection::new(ObjectClass::Ball, 0.9, 10.0, 10.0, 0.0, 30.0),
            RawDetection::new(ObjectClass::Hoop, 0.9, 300.0, 100.0, 60.0, 40.0),
        ];

        let report = scene.process_frame(0.0, &dets).unwrap();
        assert_eq!(report.discarded_detections, 1);
        assert_eq!(report.active_tracks.hoops.len(), 1);
        assert_eq!(scene.track_count(), 1);
    }

    #[test]
    fn test_regression_is_rejected() {
        let mut scene = Scene::new(Config::default());
        let ball = RawDetection::new(ObjectClass::Ball, 0.9, 10.0, 10.0, 30.0, 30.0);

        scene.process_frame(2.0, &[ball]).unwrap();
        assert!(matches!(
            scene.process_frame(1.0, &[ball]),
            Err(Error::TimestampRegression { .. })
        ));
        assert_eq!(scene.trajectory().len(), 1);
        assert_eq!(scene.track_count(), 1);
    }

    #[test]
    fn test_min_confidence_filter() {
        let mut config = Config::default();
        config.min_confidence = 0.5;
        let mut scene = Scene::new(config);

        let weak = RawDetection::new(ObjectClass::Player, 0.3, 10.0, 10.0, 30.0, 90.0);
        let report = scene.process_frame(0.0, &[weak]).unwrap();
        assert!(report.active_tracks.is_empty());
        assert_eq!(report.discarded_detections, 0);
    }

    #[test]
    fn test_trajectory_follows_matched_ball_only() {
        let mut scene = Scene::new(Config::default());
        let ball = RawDetection::new(ObjectClass::Ball, 0.9, 10.0, 10.0, 30.0, 30.0);

        scene.process_frame(0.0, &[ball]).unwrap();
        scene.process_frame(0.1, &[]).unwrap();
        scene.process_frame(0.2, &[ball]).unwrap();
        assert_eq!(scene.trajectory().len(), 2);
    }

    #[test]
    fn test_brief_ball_switch_does_not_fake_arc() {
        let mut scene = Scene::new(Config::default());
        let hoop = RawDetection::new(ObjectClass::Hoop, 0.9, 360.0, 380.0, 80.0, 40.0);
        let player = RawDetection::new(ObjectClass::Player, 0.9, 400.0, 340.0, 60.0, 160.0);
        let ball = RawDetection::new(ObjectClass::Ball, 0.7, 370.0, 470.0, 60.0, 60.0);
        let stray = RawDetection::new(ObjectClass::Ball, 0.95, 370.0, 270.0, 60.0, 60.0);

        let mut shots = 0;
        for i in 0..12 {
            let mut dets = vec![hoop, player, ball];
            if i == 6 {
                dets.push(stray);
            }

            let report = scene.process_frame(i as f64 * 0.1, &dets).unwrap();
            shots += report.new_shot_events.len();
        }

        assert_eq!(shots, 0);
        assert_eq!(scene.trajectory().track_id(), Some(3));
        assert_eq!(scene.trajectory().len(), 5);
        assert!(scene.trajectory().iter().all(|s| s.y == 500.0));
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut scene = Scene::new(Config::default());
        let ball = RawDetection::new(ObjectClass::Ball, 0.9, 10.0, 10.0, 30.0, 30.0);
        scene.process_frame(5.0, &[ball]).unwrap();

        scene.reset();
        assert_eq!(scene.track_count(), 0);
        assert_eq!(scene.open_shot_count(), 0);
        assert!(scene.trajectory().is_empty());
        assert!(scene.process_frame(0.0, &[]).is_ok());
    }
}
