//! Tunables for the tracking and shot pipeline

use serde_derive::{Deserialize, Serialize};

use crate::error::Error;

/// Every threshold used by the pipeline. Distances are in image pixels,
/// durations in seconds of stream time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Minimum IoU (exclusive) for a detection to continue a track
    pub iou_threshold: f32,
    /// A track not updated for longer than this is inactive and unmatchable
    pub stale_after: f64,
    /// Samples kept per track
    pub history_len: usize,
    /// Inactive tracks older than this are pruned unless an open shot holds them
    pub track_retention: f64,
    /// Detections under this confidence are ignored
    pub min_confidence: f32,

    /// Time span kept in the ball trajectory buffer
    pub trajectory_retention: f64,
    /// Trailing span inspected for an arc
    pub arc_window: f64,
    pub arc_min_samples: usize,
    /// Per-sample vertical move that counts as rising / falling
    pub arc_min_step: f32,

    /// Global gap between two shot attempts
    pub shot_cooldown: f64,
    /// Max ball-to-player distance for attribution
    pub shooter_radius: f32,
    pub layup_distance: f32,
    pub three_point_distance: f32,
    /// Shooter bbox bottom must be within this of the hoop center y for a dunk
    pub dunk_height_margin: f32,
    /// Detection confidence above which a shot gains confidence
    pub high_confidence: f32,

    /// Stream time after the attempt before the outcome is settled
    pub settle_delay: f64,
    /// Hoop box growth used by the made test
    pub rim_margin: f32,
    pub clip_lead: f64,
    pub clip_tail: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            iou_threshold: 0.3,
            stale_after: 1.0,
            history_len: 30,
            track_retention: 10.0,
            min_confidence: 0.0,

            trajectory_retention: 5.0,
            arc_window: 2.0,
            arc_min_samples: 5,
            arc_min_step: 10.0,

            shot_cooldown: 3.0,
            shooter_radius: 200.0,
            layup_distance: 150.0,
            three_point_distance: 500.0,
            dunk_height_margin: 50.0,
            high_confidence: 0.8,

            settle_delay: 2.0,
            rim_margin: 0.0,
            clip_lead: 5.0,
            clip_tail: 3.0,
        }
    }
}

impl Config {
    pub fn from_json(s: &str) -> Result<Self, Error> {
        let config: Config = serde_json::from_str(s)?;
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if !(self.iou_threshold > 0.0 && self.iou_threshold < 1.0) {
            return Err(Error::Config(
                "iou_threshold must be between 0 and 1".to_string(),
            ));
        }

        if self.history_len < 2 {
            return Err(Error::Config(
                "history_len must hold at least two samples".to_string(),
            ));
        }

        if self.arc_min_samples < 3 {
            return Err(Error::Config(
                "arc_min_samples must be at least 3".to_string(),
            ));
        }

        let durations = [
            ("stale_after", self.stale_after),
            ("track_retention", self.track_retention),
            ("trajectory_retention", self.trajectory_retention),
            ("arc_window", self.arc_window),
            ("settle_delay", self.settle_delay),
        ];

        for (name, value) in durations.iter() {
            if !(value.is_finite() && *value > 0.0) {
                return Err(Error::Config(format!("{} must be positive", name)));
            }
        }

        if self.arc_window > self.trajectory_retention {
            return Err(Error::Config(
                "arc_window cannot exceed trajectory_retention".to_string(),
            ));
        }

        if self.shot_cooldown < 0.0 || self.clip_lead < 0.0 || self.clip_tail < 0.0 {
            return Err(Error::Config(
                "shot_cooldown and clip bounds must not be negative".to_string(),
            ));
        }

        if self.layup_distance >= self.three_point_distance {
            return Err(Error::Config(
                "layup_distance must be below three_point_distance".to_string(),
            ));
        }

        if !(self.arc_min_step.is_finite() && self.arc_min_step > 0.0) {
            return Err(Error::Config(
                "arc_min_step must be positive".to_string(),
            ));
        }

        if !self.dunk_height_margin.is_finite() {
            return Err(Error::Config(
                "dunk_height_margin must be finite".to_string(),
            ));
        }

        let confidences = [
            ("min_confidence", self.min_confidence),
            ("high_confidence", self.high_confidence),
        ];

        for (name, value) in confidences.iter() {
            if !(0.0..=1.0).contains(value) {
                return Err(Error::Config(format!("{} must be between 0 and 1", name)));
            }
        }

        if self.rim_margin < 0.0 || self.shooter_radius <= 0.0 {
            return Err(Error::Config(
                "rim_margin must not be negative and shooter_radius must be positive".to_string(),
            ));
        }

        Ok(())
    }
}
