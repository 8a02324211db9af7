use log::debug;
use nalgebra as na;

use crate::assignment;
use crate::spot::Spot;
use crate::store::TrackStore;
use crate::track::{Track, TrackId, TrackState};

/// Owns the track store and applies one atomic lifecycle step per frame:
/// assign, gate, match, miss, spawn. Sole writer to the store.
pub struct TrackManager {
    store: TrackStore,
    next_id: u64,
    distance_threshold: f32,
    missed_frame_limit: u32,
}

impl TrackManager {
    pub fn new(distance_threshold: f32, missed_frame_limit: u32) -> Self {
        Self {
            store: TrackStore::new(),
            next_id: 0,
            distance_threshold,
            missed_frame_limit,
        }
    }

    #[inline]
    pub fn store(&self) -> &TrackStore {
        &self.store
    }

    /// Apply one frame's detections to the track set.
    ///
    /// Returns `(track_id, spot_index)` for every spot of the frame:
    /// matched spots carry their existing track's id, the rest spawn new
    /// tracks. Active tracks left unmatched accrue a miss and terminate
    /// once the configured limit is reached.
    pub fn update(
        &mut self,
        frame_index: u64,
        timestamp: f64,
        spots: &[Spot],
    ) -> Vec<(TrackId, usize)> {
        // Ascending id order fixes the solver's row order, which the
        // tie-break guarantee depends on.
        let active_ids: Vec<TrackId> = self.store.active_ids().collect();
        let positions: Vec<na::Point2<f32>> = active_ids
            .iter()
            .map(|&id| self.store.get(id).expect("active id present").last_position())
            .collect();
        let spot_positions: Vec<na::Point2<f32>> = spots.iter().map(Spot::position).collect();

        let pairing = assignment::solve(&positions, &spot_positions, self.distance_threshold);

        let mut assignments = Vec::with_capacity(spots.len());

        for &(track_idx, spot_idx, _cost) in &pairing.matches {
            let id = active_ids[track_idx];
            let track = self.store.get_mut(id).expect("matched id present");
            track.record_match(frame_index, timestamp, &spots[spot_idx]);
            assignments.push((id, spot_idx));
        }

        let mut terminated = 0usize;
        for &track_idx in &pairing.unmatched_tracks {
            let id = active_ids[track_idx];
            let track = self.store.get_mut(id).expect("unmatched id present");
            if track.record_miss(self.missed_frame_limit) == TrackState::Terminated {
                self.store.retire(id);
                terminated += 1;
            }
        }

        let spawned = pairing.unmatched_spots.len();
        for &spot_idx in &pairing.unmatched_spots {
            let id = self.allocate_id();
            self.store
                .insert(Track::spawn(id, frame_index, timestamp, &spots[spot_idx]));
            assignments.push((id, spot_idx));
        }

        debug!(
            "frame {}: {} spots, {} matched, {} spawned, {} terminated, {} active",
            frame_index,
            spots.len(),
            pairing.matches.len(),
            spawned,
            terminated,
            self.store.active_count(),
        );

        assignments.sort_unstable_by_key(|&(id, _)| id);

        assignments
    }

    /// Next track id; strictly increasing, never reused.
    fn allocate_id(&mut self) -> TrackId {
        let id = TrackId(self.next_id);
        self.next_id += 1;

        id
    }
}
