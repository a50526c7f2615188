use nalgebra as na;
use serde_derive::{Deserialize, Serialize};
use std::fmt;

use crate::bbox::{BBox, Ltwh};
use crate::error::Error;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum ObjectClass {
    Ball,
    Hoop,
    Player,
}

impl ObjectClass {
    /// Classes with at most one primary track at a time
    #[inline]
    pub fn is_singleton(&self) -> bool {
        matches!(self, ObjectClass::Ball | ObjectClass::Hoop)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectClass::Ball => "ball",
            ObjectClass::Hoop => "hoop",
            ObjectClass::Player => "player",
        }
    }
}

impl fmt::Display for ObjectClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct RawBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Detector output as received on the wire
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct RawDetection {
    pub class: ObjectClass,
    pub confidence: f32,
    pub bbox: RawBox,
}

impl RawDetection {
    pub fn new(class: ObjectClass, confidence: f32, x: f32, y: f32, w: f32, h: f32) -> Self {
        Self {
            class,
            confidence,
            bbox: RawBox {
                x,
                y,
                width: w,
                height: h,
            },
        }
    }
}

/// Canonical detection record, lives for a single frame
#[derive(Debug, Clone, Copy)]
pub struct Detection {
    pub class: ObjectClass,
    pub confidence: f32,
    pub bbox: BBox<Ltwh>,
    pub center: na::Point2<f32>,
}

impl Detection {
    pub fn new(class: ObjectClass, confidence: f32, bbox: BBox<Ltwh>) -> Result<Self, Error> {
        if !bbox.is_valid() {
            return Err(Error::InvalidDetection(format!(
                "{} bbox {:?} must be finite with positive size",
                class,
                bbox.as_slice()
            )));
        }

        if !confidence.is_finite() {
            return Err(Error::InvalidDetection(format!(
                "{} confidence {} is not finite",
                class, confidence
            )));
        }

        Ok(Self {
            class,
            confidence: confidence.clamp(0.0, 1.0),
            center: bbox.center(),
            bbox,
        })
    }

    #[inline]
    pub fn iou(&self, other: &BBox<Ltwh>) -> f32 {
        self.bbox.iou(other)
    }
}

impl<'a> TryFrom<&'a RawDetection> for Detection {
    type Error = Error;

    fn try_from(raw: &'a RawDetection) -> Result<Self, Error> {
        let b = &raw.bbox;

        Detection::new(
            raw.class,
            raw.confidence,
            BBox::ltwh(b.x, b.y, b.width, b.height),
        )
    }
}
