pub mod bbox;
pub mod config;
pub mod detection;
pub mod error;
pub mod frame;
pub mod resolver;
pub mod scene;
pub mod shot;
pub mod tracker;
pub mod trajectory;

mod circular_queue;
mod track;

pub use config::Config;
pub use detection::{Detection, ObjectClass, RawDetection};
pub use error::Error;
pub use frame::Frame;
pub use scene::{FrameReport, Scene};
pub use shot::{ShotEvent, ShotOutcome, ShotType};
pub use track::{Track, TrackState};

use std::collections::HashMap;

pub trait Analysis {
    /// Feeds frames in timestamp order, stops at the first rejected frame
    fn update(&mut self, frames: &[Frame], src: &str) -> Result<Vec<FrameReport>, Error>;
    /// Settles the shots still open for `src`
    fn finish(&mut self, src: &str) -> Vec<ShotEvent>;
    fn reset(&mut self, src: &str);
}

/// Independent analyses keyed by source name
pub struct ShotAnalyzer {
    config: Config,
    scenes: HashMap<String, Scene>,
}

impl ShotAnalyzer {
    pub fn new(config: Config) -> Result<Self, Error> {
        config.validate()?;

        Ok(Self {
            config,
            scenes: HashMap::new(),
        })
    }

    #[inline]
    pub fn scene(&self, src: &str) -> Option<&Scene> {
        self.scenes.get(src)
    }

    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.scenes.keys().map(String::as_str)
    }
}

impl Default for ShotAnalyzer {
    fn default() -> Self {
        Self {
            config: Config::default(),
            scenes: HashMap::new(),
        }
    }
}

impl crate::Analysis for ShotAnalyzer {
    fn update(&mut self, frames: &[Frame], src: &str) -> Result<Vec<FrameReport>, Error> {
        let config = &self.config;
        let scene = self
            .scenes
            .entry(src.to_string())
            .or_insert_with(|| Scene::new(config.clone()));

        let mut reports = Vec::with_capacity(frames.len());
        for frame in frames {
            reports.push(scene.process(frame)?);
        }

        Ok(reports)
    }

    fn finish(&mut self, src: &str) -> Vec<ShotEvent> {
        self.scenes
            .get_mut(src)
            .map(Scene::flush)
            .unwrap_or_default()
    }

    #[inline]
    fn reset(&mut self, src: &str) {
        self.scenes.remove(src);
    }
}
