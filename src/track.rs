use serde_derive::{Deserialize, Serialize};

use crate::bbox::{BBox, Ltwh};
use crate::detection::ObjectClass;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TrackState {
    /// Matched in the current frame
    Active,
    /// Missed this frame but still inside the staleness window
    Coasting,
    Inactive,
}

/// Read-only copy of a tracked object handed out to callers
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Track {
    pub track_id: u32,
    pub class: ObjectClass,
    pub state: TrackState,
    pub confidence: f32,
    pub bbox: BBox<Ltwh>,

    // seconds
    pub last_update: f64,
    pub time_since_update: f64,

    // px per second, (dx/dt, dy/dt)
    pub velocity: (f32, f32),
}

impl Track {
    #[inline]
    pub fn center(&self) -> (f32, f32) {
        let c = self.bbox.center();
        (c.x, c.y)
    }
}
