//! Shot attempt recognition: arc heuristic, shooter attribution and
//! shot type classification.

use nalgebra as na;
use serde_derive::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::{debug, info};

use crate::config::Config;
use crate::track::Track;
use crate::tracker::FrameSnapshot;
use crate::trajectory::{TrajectoryBuffer, TrajectorySample};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ShotType {
    Layup,
    JumpShot,
    ThreePointer,
    Dunk,
    FreeThrow,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ShotOutcome {
    InProgress,
    Made,
    Missed,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ShotEvent {
    pub id: u64,
    /// Attempt time, seconds of stream time
    pub timestamp: f64,
    pub confidence: f32,
    pub shot_type: ShotType,
    pub shooter_track_id: u32,
    pub ball_track_id: u32,
    pub hoop_track_id: u32,
    pub trajectory_snapshot: Vec<TrajectorySample>,
    pub outcome: ShotOutcome,
    pub clip_start: f64,
    pub clip_end: f64,
}

impl ShotEvent {
    #[inline]
    pub fn is_resolved(&self) -> bool {
        self.outcome != ShotOutcome::InProgress
    }
}

/// Highlight bounds depend on the attempt time only
#[inline]
pub fn clip_window(timestamp: f64, lead: f64, tail: f64) -> (f64, f64) {
    ((timestamp - lead).max(0.0), timestamp + tail)
}

/// Rise then fall around the single highest sample (smallest image y).
/// Steps smaller than `min_step` are ignored as noise.
pub fn is_arc(samples: &[TrajectorySample], min_step: f32) -> bool {
    let peak = match samples
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.y.partial_cmp(&b.1.y).unwrap_or(Ordering::Equal))
    {
        Some((idx, _)) => idx,
        None => return false,
    };

    let rising = samples[..=peak]
        .windows(2)
        .any(|w| w[1].y - w[0].y < -min_step);

    let falling = samples[peak..]
        .windows(2)
        .any(|w| w[1].y - w[0].y > min_step);

    rising && falling
}

/// Distance checks come first, the dunk height test only applies in the
/// mid range.
pub fn classify(shooter: &Track, hoop: &Track, config: &Config) -> ShotType {
    let shooter_center = shooter.bbox.center();
    let hoop_center = hoop.bbox.center();
    let distance = na::distance(&shooter_center, &hoop_center);

    if distance < config.layup_distance {
        ShotType::Layup
    } else if distance > config.three_point_distance {
        ShotType::ThreePointer
    } else if shooter.bbox.bottom() <= hoop_center.y + config.dunk_height_margin {
        ShotType::Dunk
    } else {
        ShotType::JumpShot
    }
}

pub fn shot_confidence(ball: f32, hoop: f32, shooter: f32, high: f32) -> f32 {
    let mut confidence = 0.5;

    if ball > high {
        confidence += 0.2;
    }

    if hoop > high {
        confidence += 0.2;
    }

    if shooter > high {
        confidence += 0.1;
    }

    f32::min(confidence, 1.0)
}

/// Nearest player whose center lies within `radius` of `ball`
pub fn nearest_player<'a>(
    players: &'a [Track],
    ball: na::Point2<f32>,
    radius: f32,
) -> Option<&'a Track> {
    let mut best: Option<(&Track, f32)> = None;

    for p in players {
        let d = na::distance(&p.bbox.center(), &ball);
        if d > radius {
            continue;
        }

        match best {
            Some((_, bd)) if d >= bd => {}
            _ => best = Some((p, d)),
        }
    }

    best.map(|(p, _)| p)
}

pub struct ShotDetector {
    config: Config,
    last_shot: Option<f64>,
    next_id: u64,
}

impl ShotDetector {
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.clone(),
            last_shot: None,
            next_id: 1,
        }
    }

    pub fn reset(&mut self) {
        self.last_shot = None;
        self.next_id = 1;
    }

    #[inline]
    pub fn last_shot(&self) -> Option<f64> {
        self.last_shot
    }

    fn in_cooldown(&self, ts: f64) -> bool {
        match self.last_shot {
            Some(last) => ts - last < self.config.shot_cooldown,
            None => false,
        }
    }

    /// Raises at most one new attempt for the frame
    pub fn detect(
        &mut self,
        frame: &FrameSnapshot,
        trajectory: &TrajectoryBuffer,
    ) -> Option<ShotEvent> {
        let ts = frame.timestamp;
        let ball = frame.primary_ball()?;
        let hoop = frame.primary_hoop()?;

        if frame.players.is_empty() || self.in_cooldown(ts) {
            return None;
        }

        let samples = trajectory.window(self.config.arc_window);
        if samples.len() < self.config.arc_min_samples
            || !is_arc(&samples, self.config.arc_min_step)
        {
            return None;
        }

        let ball_center = ball.bbox.center();
        let shooter =
            match nearest_player(&frame.players, ball_center, self.config.shooter_radius) {
                Some(p) => p,
                None => {
                    debug!(ts, ball = ball.track_id, "arc without a shooter in range");
                    return None;
                }
            };

        let shot_type = classify(shooter, hoop, &self.config);
        let confidence = shot_confidence(
            ball.confidence,
            hoop.confidence,
            shooter.confidence,
            self.config.high_confidence,
        );
        let (clip_start, clip_end) =
            clip_window(ts, self.config.clip_lead, self.config.clip_tail);

        let event = ShotEvent {
            id: self.next_id,
            timestamp: ts,
            confidence,
            shot_type,
            shooter_track_id: shooter.track_id,
            ball_track_id: ball.track_id,
            hoop_track_id: hoop.track_id,
            trajectory_snapshot: samples,
            outcome: ShotOutcome::InProgress,
            clip_start,
            clip_end,
        };

        self.next_id = self.next_id.wrapping_add(1).max(1);
        self.last_shot = Some(ts);

        info!(
            shot = event.id,
            ts,
            shooter = event.shooter_track_id,
            shot_type = ?event.shot_type,
            confidence,
            "shot attempt"
        );

        Some(event)
    }
}
