use nalgebra as na;
use serde_derive::{Deserialize, Serialize};

/// A candidate observation produced by the detector for a single frame.
///
/// Carries no identity of its own; it becomes part of a track only once
/// the manager assigns it.
#[derive(Serialize, Deserialize, Debug, Clone, Copy)]
pub struct Spot {
    /// Centroid of the maximum-intensity sub-region, in pixels.
    pub x: f32,
    pub y: f32,
    pub mean_intensity: f32,
    pub max_intensity: f32,
    /// Pixel count of the connected component.
    pub area: u32,
    /// Signal-to-background ratio against the frame's robust statistics.
    pub quality: f32,
}

impl Spot {
    #[inline(always)]
    pub fn position(&self) -> na::Point2<f32> {
        na::Point2::new(self.x, self.y)
    }

    #[inline(always)]
    pub fn distance_to(&self, other: na::Point2<f32>) -> f32 {
        na::distance(&self.position(), &other)
    }
}
