use nalgebra as na;
use serde_derive::{Deserialize, Serialize};

use crate::spot::Spot;

/// Identity of a track. Assigned in strictly increasing order and never
/// reused, even after the track terminates.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct TrackId(pub u64);

impl std::fmt::Display for TrackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackState {
    Active,
    Terminated,
}

/// One matched detection in a track's history.
#[derive(Serialize, Deserialize, Debug, Clone, Copy)]
pub struct Observation {
    pub frame_index: u64,
    pub timestamp: f64,
    pub x: f32,
    pub y: f32,
    pub mean_intensity: f32,
    pub max_intensity: f32,
    pub area: u32,
}

/// A persistent identity linking spot observations across frames.
///
/// The observation sequence is insertion-ordered by frame index and
/// append-only while the track is active. All mutation goes through the
/// crate-private transition methods so the manager is the only writer.
#[derive(Debug, Clone)]
pub struct Track {
    id: TrackId,
    observations: Vec<Observation>,
    missed: u32,
    state: TrackState,
}

impl Track {
    pub(crate) fn spawn(id: TrackId, frame_index: u64, timestamp: f64, spot: &Spot) -> Self {
        let mut track = Self {
            id,
            observations: Vec::new(),
            missed: 0,
            state: TrackState::Active,
        };
        track.record_match(frame_index, timestamp, spot);

        track
    }

    #[inline]
    pub fn id(&self) -> TrackId {
        self.id
    }

    #[inline]
    pub fn state(&self) -> TrackState {
        self.state
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.state == TrackState::Active
    }

    /// Consecutive frames without a match since the last one.
    #[inline]
    pub fn missed(&self) -> u32 {
        self.missed
    }

    #[inline]
    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    /// Position of the most recent observation.
    pub fn last_position(&self) -> na::Point2<f32> {
        let last = self
            .observations
            .last()
            .expect("track has at least one observation");

        na::Point2::new(last.x, last.y)
    }

    /// Append a matched observation and reset the missed counter.
    ///
    /// Panics if the track is terminated or the frame index does not
    /// advance; both indicate a manager logic defect.
    pub(crate) fn record_match(&mut self, frame_index: u64, timestamp: f64, spot: &Spot) {
        assert!(
            self.state == TrackState::Active,
            "track {} matched after termination",
            self.id
        );

        if let Some(last) = self.observations.last() {
            assert!(
                frame_index > last.frame_index,
                "track {} observation frame index did not advance",
                self.id
            );
        }

        self.observations.push(Observation {
            frame_index,
            timestamp,
            x: spot.x,
            y: spot.y,
            mean_intensity: spot.mean_intensity,
            max_intensity: spot.max_intensity,
            area: spot.area,
        });
        self.missed = 0;
    }

    /// Count an unmatched frame. The track terminates exactly when the
    /// counter reaches `limit`; the returned state reflects the outcome.
    pub(crate) fn record_miss(&mut self, limit: u32) -> TrackState {
        assert!(
            self.state == TrackState::Active,
            "track {} missed after termination",
            self.id
        );

        self.missed += 1;
        if self.missed >= limit {
            self.state = TrackState::Terminated;
        }

        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn spot(x: f32, y: f32) -> Spot {
        Spot {
            x,
            y,
            mean_intensity: 120.0,
            max_intensity: 200.0,
            area: 12,
            quality: 8.0,
        }
    }

    #[test]
    fn test_spawn_has_one_observation() {
        let track = Track::spawn(TrackId(3), 0, 0.0, &spot(4.0, 5.0));

        assert_eq!(track.id(), TrackId(3));
        assert_eq!(track.observations().len(), 1);
        assert_eq!(track.missed(), 0);
        assert!(track.is_active());
        assert_relative_eq!(track.last_position().x, 4.0);
        assert_relative_eq!(track.last_position().y, 5.0);
    }

    #[test]
    fn test_match_resets_missed() {
        let mut track = Track::spawn(TrackId(0), 0, 0.0, &spot(1.0, 1.0));

        assert_eq!(track.record_miss(5), TrackState::Active);
        assert_eq!(track.record_miss(5), TrackState::Active);
        assert_eq!(track.missed(), 2);

        track.record_match(3, 0.3, &spot(2.0, 2.0));
        assert_eq!(track.missed(), 0);
        assert_eq!(track.observations().len(), 2);
    }

    #[test]
    fn test_terminates_exactly_at_limit() {
        let mut track = Track::spawn(TrackId(0), 0, 0.0, &spot(1.0, 1.0));

        for _ in 0..4 {
            assert_eq!(track.record_miss(5), TrackState::Active);
        }
        assert_eq!(track.record_miss(5), TrackState::Terminated);
        assert_eq!(track.missed(), 5);
    }

    #[test]
    #[should_panic(expected = "matched after termination")]
    fn test_match_after_termination_panics() {
        let mut track = Track::spawn(TrackId(0), 0, 0.0, &spot(1.0, 1.0));
        track.record_miss(1);
        track.record_match(2, 0.2, &spot(1.0, 1.0));
    }

    #[test]
    #[should_panic(expected = "did not advance")]
    fn test_stale_frame_index_panics() {
        let mut track = Track::spawn(TrackId(0), 4, 0.4, &spot(1.0, 1.0));
        track.record_match(4, 0.5, &spot(1.0, 1.0));
    }
}
